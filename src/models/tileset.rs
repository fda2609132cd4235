//! Tileset (character graphics) resource

use crate::models::Palette;
use image::Rgba;
use serde::{Deserialize, Serialize};

/// Pixels per tile (tiles are always 8x8).
pub const TILE_PIXELS: usize = 64;

/// Addressing scheme used to resolve an object's tile index to tileset data.
///
/// One-dimensional modes differ only in page granularity: an object's raw
/// tile index is multiplied by the mode's byte boundary to find its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MappingMode {
    TwoD,
    OneD32K,
    OneD64K,
    OneD128K,
    OneD256K,
}

impl MappingMode {
    /// Decodes the hardware register constant stored by sectioned formats.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0x000000 => Some(MappingMode::TwoD),
            0x000010 => Some(MappingMode::OneD32K),
            0x100010 => Some(MappingMode::OneD64K),
            0x200010 => Some(MappingMode::OneD128K),
            0x300010 => Some(MappingMode::OneD256K),
            _ => None,
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            MappingMode::TwoD => 0x000000,
            MappingMode::OneD32K => 0x000010,
            MappingMode::OneD64K => 0x100010,
            MappingMode::OneD128K => 0x200010,
            MappingMode::OneD256K => 0x300010,
        }
    }

    pub fn is_two_d(self) -> bool {
        self == MappingMode::TwoD
    }

    /// Byte granularity of one tile-index step.
    pub fn boundary_bytes(self) -> usize {
        1 << (((self.raw() >> 20) & 7) + 5)
    }
}

/// A bank of 8x8 indexed-color tiles.
///
/// Tiles are stored expanded, one byte per pixel, regardless of stored bit
/// depth; `to_bytes` re-packs nibbles for 4bpp data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tileset {
    tiles: Vec<[u8; TILE_PIXELS]>,
    width_tiles: usize,
    height_tiles: usize,
    bit_depth: u8,
    mapping: MappingMode,
}

impl Tileset {
    /// Creates an empty tileset for a new asset.
    pub fn new(bit_depth: u8, mapping: MappingMode) -> Self {
        Self {
            tiles: Vec::new(),
            width_tiles: 0,
            height_tiles: 0,
            bit_depth,
            mapping,
        }
    }

    /// Appends a tile of expanded pixel values.
    pub fn push_tile(&mut self, tile: [u8; TILE_PIXELS]) {
        self.tiles.push(tile);
    }

    /// Decodes `count` tiles of packed character data.
    ///
    /// Returns `None` when the buffer is too small for the declared count.
    pub fn from_bytes(
        data: &[u8],
        count: usize,
        bit_depth: u8,
        mapping: MappingMode,
    ) -> Option<Self> {
        let per_tile = bytes_per_tile(bit_depth);
        if data.len() < count * per_tile {
            return None;
        }
        let mut tiles = Vec::with_capacity(count);
        for i in 0..count {
            let raw = &data[i * per_tile..(i + 1) * per_tile];
            let mut tile = [0u8; TILE_PIXELS];
            if bit_depth == 8 {
                tile.copy_from_slice(raw);
            } else {
                for (j, &byte) in raw.iter().enumerate() {
                    tile[j * 2] = byte & 0xF;
                    tile[j * 2 + 1] = byte >> 4;
                }
            }
            tiles.push(tile);
        }
        let width_tiles = guess_width(count);
        let height_tiles = if width_tiles == 0 { 0 } else { count / width_tiles };
        Some(Self {
            tiles,
            width_tiles,
            height_tiles,
            bit_depth,
            mapping,
        })
    }

    /// Packs the tiles back into stored character data.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.pack_tiles(self.tiles.len())
    }

    /// Packs only the first `count` tiles; formats that trim their tile
    /// table to the highest referenced index use this.
    pub fn pack_tiles(&self, count: usize) -> Vec<u8> {
        let count = count.min(self.tiles.len());
        let mut out = Vec::with_capacity(count * self.bytes_per_tile());
        for tile in &self.tiles[..count] {
            if self.bit_depth == 8 {
                out.extend_from_slice(tile);
            } else {
                for pair in tile.chunks_exact(2) {
                    out.push((pair[0] & 0xF) | (pair[1] << 4));
                }
            }
        }
        out
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn tile(&self, index: usize) -> Option<&[u8; TILE_PIXELS]> {
        self.tiles.get(index)
    }

    pub fn tile_mut(&mut self, index: usize) -> Option<&mut [u8; TILE_PIXELS]> {
        self.tiles.get_mut(index)
    }

    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    /// Changes the stored bit depth. Pixel values above 15 will clip when
    /// a 4bpp tileset is packed.
    pub fn set_bit_depth(&mut self, bit_depth: u8) {
        self.bit_depth = bit_depth;
    }

    pub fn bytes_per_tile(&self) -> usize {
        bytes_per_tile(self.bit_depth)
    }

    pub fn mapping(&self) -> MappingMode {
        self.mapping
    }

    pub fn set_mapping(&mut self, mapping: MappingMode) {
        self.mapping = mapping;
    }

    pub fn width_tiles(&self) -> usize {
        self.width_tiles
    }

    pub fn height_tiles(&self) -> usize {
        self.height_tiles
    }

    pub fn set_layout(&mut self, width_tiles: usize, height_tiles: usize) {
        self.width_tiles = width_tiles;
        self.height_tiles = height_tiles;
    }

    /// Renders one tile through `palette`, color index 0 transparent.
    ///
    /// For 4bpp tiles `bank` selects a 16-color sub-palette; 8bpp tiles
    /// index the palette directly.
    pub fn tile_rgba(
        &self,
        palette: &Palette,
        index: usize,
        bank: u8,
    ) -> [Rgba<u8>; TILE_PIXELS] {
        let mut out = [Rgba([0, 0, 0, 0]); TILE_PIXELS];
        let Some(tile) = self.tile(index) else {
            return out;
        };
        for (px, &value) in out.iter_mut().zip(tile.iter()) {
            if value == 0 {
                continue;
            }
            let color_index = if self.bit_depth == 4 {
                usize::from(bank) * 16 + usize::from(value)
            } else {
                usize::from(value)
            };
            *px = palette.rgba(color_index);
        }
        out
    }
}

fn bytes_per_tile(bit_depth: u8) -> usize {
    8 * usize::from(bit_depth)
}

/// Guesses a display width (in tiles) for a bank that stores only a count.
///
/// Prefers the widest layout whose divisor pair is closest to square.
fn guess_width(count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    let mut divisor = 1;
    let mut i = 1;
    while i * i <= count {
        if count % i == 0 {
            divisor = i;
        }
        i += 1;
    }
    // divisor <= sqrt(count); return the wide side
    count / divisor
}
