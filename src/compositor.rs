//! Cell compositing onto the object plane
//!
//! Renders a cell's objects onto a 512x256 canvas the way the hardware
//! layers them: entries are walked back to front so the first entry ends up
//! on top, coordinates wrap around the plane, and color index 0 stays
//! transparent. Affine entries sample through a caller-supplied 2x2 matrix
//! about their center; regular entries honor their flip and disable bits.

use crate::cell::{Cell, VramTransfer};
use crate::models::{Palette, Tileset};
use crate::oam::{ObjectDescriptor, Transform};
use image::{Rgba, RgbaImage};

/// Object plane width in pixels.
pub const CANVAS_WIDTH: u32 = 512;
/// Object plane height in pixels.
pub const CANVAS_HEIGHT: u32 = 256;

/// Marker color used for highlight outlines; not a real palette color.
pub const OUTLINE_MARKER: Rgba<u8> = Rgba([0, 0, 0, 0xFE]);

const CHECKER_LIGHT: Rgba<u8> = Rgba([255, 255, 255, 255]);
const CHECKER_DARK: Rgba<u8> = Rgba([192, 192, 192, 255]);

/// 2x2 transform applied to affine entries, row-major (a b / c d).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineMatrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
}

impl Default for AffineMatrix {
    fn default() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
        }
    }
}

/// Which entries get a highlight outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineTarget {
    All,
    Object(usize),
}

/// Rendering options shared by a whole cell pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Added to every object position before wrapping.
    pub offset: (i32, i32),
    pub outline: Option<OutlineTarget>,
    /// Fill still-transparent canvas pixels with a checkerboard afterwards.
    pub checker: bool,
    pub matrix: AffineMatrix,
}

/// Creates a fully transparent object plane canvas.
pub fn blank_canvas() -> RgbaImage {
    RgbaImage::new(CANVAS_WIDTH, CANVAS_HEIGHT)
}

/// Renders one object's tile block to a `width x height` image.
///
/// Tile indexing follows the tileset's mapping mode: 2-D mode walks the
/// tileset grid from the object's scaled starting tile, 1-D mode reads
/// tiles linearly. When a VRAM transfer descriptor is given, tiles resolve
/// through its window instead of straight into the tileset.
pub fn render_object(
    obj: &ObjectDescriptor,
    tileset: &Tileset,
    palette: &Palette,
    transfer: Option<VramTransfer>,
    checker: bool,
) -> RgbaImage {
    let mut out = RgbaImage::new(obj.width, obj.height);
    let tiles_x = obj.width / 8;
    let tiles_y = obj.height / 8;
    let per_tile = tileset.bytes_per_tile();
    let start = tileset.mapping().boundary_bytes() * usize::from(obj.tile_index) / per_tile;

    for ty in 0..tiles_y as usize {
        for tx in 0..tiles_x as usize {
            let index = if tileset.mapping().is_two_d() {
                let grid_w = tileset.width_tiles().max(1);
                let gx = tx + start % grid_w;
                let gy = ty + start / grid_w;
                gx + grid_w * gy
            } else {
                start + tx + ty * tiles_x as usize
            };
            let index = match transfer {
                Some(window) => {
                    let window_tiles = window.size as usize / per_tile;
                    if index >= window_tiles {
                        continue; // outside the transferred window
                    }
                    window.src_offset as usize / per_tile + index
                }
                None => index,
            };

            let block = tileset.tile_rgba(palette, index, obj.palette);
            for (i, color) in block.iter().enumerate() {
                out.put_pixel((tx * 8 + i % 8) as u32, (ty * 8 + i / 8) as u32, *color);
            }
        }
    }

    if checker {
        apply_checker(&mut out);
    }
    out
}

/// Composites a cell onto `canvas` (must be 512x256).
///
/// Objects are walked in reverse so entry 0 is composited last and wins
/// overlaps, matching hardware priority within a cell.
pub fn render_cell(
    canvas: &mut RgbaImage,
    cell: &Cell,
    tileset: &Tileset,
    palette: &Palette,
    transfer: Option<VramTransfer>,
    options: &RenderOptions,
) {
    let (dx, dy) = options.offset;
    for index in (0..cell.objects.len()).rev() {
        let obj = cell.objects[index].decode();
        let mut block = render_object(&obj, tileset, palette, transfer, false);

        if let Transform::Flip { h, v, disable } = obj.transform {
            if disable {
                continue;
            }
            if v {
                block = image::imageops::flip_vertical(&block);
            }
            if h {
                block = image::imageops::flip_horizontal(&block);
            }
        }

        let width = obj.width as i32;
        let height = obj.height as i32;
        let double = obj.transform.double_size();
        let mut x = i32::from(obj.x);
        let mut y = i32::from(obj.y);
        if double {
            x += width / 2;
            y += height / 2;
        }

        match obj.transform {
            Transform::Flip { .. } => {
                for j in 0..height {
                    for k in 0..width {
                        let color = *block.get_pixel(k as u32, j as u32);
                        if color[3] != 0 {
                            put_wrapped(canvas, x + k + dx, y + j + dy, color);
                        }
                    }
                }
            }
            Transform::Affine { .. } => {
                // Sample about the center of the (possibly doubled)
                // footprint; outside the original bounds is transparent.
                let real_w = width << u32::from(double);
                let real_h = height << u32::from(double);
                let cx = real_w / 2;
                let cy = real_h / 2;
                let real_x = x - (real_w - width) / 2;
                let real_y = y - (real_h - height) / 2;
                let m = options.matrix;
                for j in 0..real_h {
                    for k in 0..real_w {
                        let mut src_x =
                            ((k - cx) as f32 * m.a + (j - cy) as f32 * m.b) as i32 + cx;
                        let mut src_y =
                            ((k - cx) as f32 * m.c + (j - cy) as f32 * m.d) as i32 + cy;
                        if double {
                            src_x -= real_w / 4;
                            src_y -= real_h / 4;
                        }
                        if (0..width).contains(&src_x) && (0..height).contains(&src_y) {
                            let color = *block.get_pixel(src_x as u32, src_y as u32);
                            if color[3] != 0 {
                                put_wrapped(canvas, real_x + k + dx, real_y + j + dy, color);
                            }
                        }
                    }
                }
            }
        }

        let outline_hit = match options.outline {
            Some(OutlineTarget::All) => true,
            Some(OutlineTarget::Object(target)) => target == index,
            None => false,
        };
        if outline_hit {
            let ow = width << u32::from(double);
            let oh = height << u32::from(double);
            let ox = i32::from(obj.x) + dx;
            let oy = i32::from(obj.y) + dy;
            for j in 0..ow {
                put_wrapped(canvas, ox + j, oy, OUTLINE_MARKER);
                put_wrapped(canvas, ox + j, oy + oh - 1, OUTLINE_MARKER);
            }
            for j in 0..oh {
                put_wrapped(canvas, ox, oy + j, OUTLINE_MARKER);
                put_wrapped(canvas, ox + ow - 1, oy + j, OUTLINE_MARKER);
            }
        }
    }

    if options.checker {
        apply_checker(canvas);
    }
}

fn put_wrapped(canvas: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>) {
    canvas.put_pixel((x & 0x1FF) as u32, (y & 0xFF) as u32, color);
}

/// Fills fully transparent pixels with the 4x4 two-tone pattern.
fn apply_checker(image: &mut RgbaImage) {
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        if pixel[3] == 0 {
            *pixel = if ((x >> 2) ^ (y >> 2)) & 1 == 1 {
                CHECKER_LIGHT
            } else {
                CHECKER_DARK
            };
        }
    }
}
