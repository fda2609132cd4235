//! Fixed-layout background container with a leading bitness flag
//!
//! Layout: u32 bitness (0 = 4bpp, 1 = 8bpp), 256 palette colors, a
//! reserved zero word, a fixed 256x256 screen, a tile count, then tile
//! data. No magic anywhere; the sniffer leans on the exact-size equation
//! and the palette's reserved bits.

use crate::bytes::{Cursor, Writer};
use crate::color;
use crate::container::{Container, ContainerError, ContainerFormat, ExtraMetadata, LinkedResource};
use crate::models::{MappingMode, Palette, TileMap, Tileset};

/// Byte offset of the screen data.
const SCREEN_OFFSET: usize = 0x208;
/// Byte offset of the tile count.
const TILE_COUNT_OFFSET: usize = 0xA08;
/// Fixed header size: flag + palette + reserved + screen + count.
const HEADER_SIZE: usize = 0xA0C;

pub(crate) fn matches(bytes: &[u8]) -> bool {
    if bytes.len() < HEADER_SIZE {
        return false;
    }
    let mut cursor = Cursor::new(bytes);
    let Ok(bitness) = cursor.read_u32() else {
        return false;
    };
    if bitness > 1 {
        return false;
    }

    let tile_count = match Cursor::at(bytes, TILE_COUNT_OFFSET).and_then(|mut c| c.read_u32()) {
        Ok(count) => count as u64,
        Err(_) => return false,
    };
    let tile_size: u64 = if bitness == 1 { 0x40 } else { 0x20 };
    if HEADER_SIZE as u64 + tile_count * tile_size != bytes.len() as u64 {
        return false;
    }

    // The 256 palette entries must keep their reserved bit clear; random
    // data that happens to satisfy the size equation almost never does.
    let Ok(colors) = Cursor::at(bytes, 4).and_then(|mut c| c.read_u16_array(256)) else {
        return false;
    };
    colors.into_iter().all(color::is_valid)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Container, ContainerError> {
    let mut cursor = Cursor::new(bytes);
    let bitness = cursor.read_u32()?;
    let bit_depth = if bitness == 1 { 8 } else { 4 };
    let colors = cursor.read_u16_array(256)?;

    cursor.seek(SCREEN_OFFSET)?;
    let screen = cursor.read_u16_array(32 * 32)?;

    cursor.seek(TILE_COUNT_OFFSET)?;
    let tile_count = cursor.read_u32()? as usize;
    let tileset = Tileset::from_bytes(
        &bytes[HEADER_SIZE..],
        tile_count,
        bit_depth,
        MappingMode::TwoD,
    )
    .ok_or_else(|| ContainerError::Structural("tile data shorter than declared count".into()))?;

    let map = TileMap::from_entries(256, 256, screen)
        .expect("screen word count is fixed by the layout");

    let mut container = Container::with_extra(ContainerFormat::TimeAce, ExtraMetadata::None);
    container.link(LinkedResource::Palette(Palette::from_colors(colors, 4)));
    container.link(LinkedResource::Tileset(tileset));
    container.link(LinkedResource::TileMap(map));
    Ok(container)
}

pub(crate) fn encode(container: &Container) -> Result<Vec<u8>, ContainerError> {
    let palette = container.require_palette()?;
    let tileset = container.require_tileset()?;

    let mut writer = Writer::new();
    writer.write_u32(u32::from(tileset.bit_depth() == 8));
    writer.write_u16_array(palette.colors());
    writer.write_u32(0);
    match container.tile_maps().next() {
        Some(map) => writer.write_u16_array(map.entries()),
        // The format's screen region is fixed-size; an absent map is an
        // empty screen.
        None => writer.write_bytes(&[0u8; 0x800]),
    }
    writer.write_u32(tileset.tile_count() as u32);
    writer.write_bytes(&tileset.to_bytes());
    Ok(writer.into_bytes())
}
