//! Multi-BG bank container
//!
//! An offset-table format holding one 256-color palette, one tileset and up
//! to four optional screens. Which of the four slots are populated is
//! recorded as a presence bitmap in the decoded metadata so the encoder can
//! reproduce the original slot assignment.

use crate::bytes::{Cursor, Writer};
use crate::container::{Container, ContainerError, ContainerFormat, ExtraMetadata, LinkedResource};
use crate::models::{MappingMode, Palette, TileMap, Tileset};
use serde::Serialize;

/// Header size; all payload offsets must point at or past it.
const HEADER_SIZE: usize = 0x74;
/// Lowest offset a payload field may carry.
const MIN_OFFSET: u32 = 0x70;
/// Screen info blocks: 16 bytes per slot starting here.
const SLOT_INFO_OFFSET: usize = 0x18;
/// Flag byte distinguishing 8bpp banks.
const DEPTH_FLAG_OFFSET: usize = 0x59;
/// Char data size in 0x20-byte units.
const CHAR_SIZE_OFFSET: usize = 0x60;

/// Screen-slot presence bitmap (low four bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MbbInfo {
    pub screen_bitmap: u8,
}

impl MbbInfo {
    pub fn slot_count(self) -> usize {
        usize::from(self.screen_bitmap.count_ones() as u8)
    }

    pub fn has_slot(self, slot: usize) -> bool {
        slot < 4 && self.screen_bitmap & (1 << slot) != 0
    }
}

fn slot_dimensions(bytes: &[u8], slot: usize) -> Option<(u16, u16)> {
    let base = SLOT_INFO_OFFSET + slot * 0x10;
    let mut cursor = Cursor::at(bytes, base + 0x8).ok()?;
    let width = cursor.read_u16().ok()?;
    let height = cursor.read_u16().ok()?;
    Some((width, height))
}

pub(crate) fn matches(bytes: &[u8]) -> bool {
    if bytes.len() < HEADER_SIZE {
        return false;
    }
    let size = bytes.len() as u32;
    let mut cursor = Cursor::new(bytes);
    let Ok(palette_offset) = cursor.read_u32() else {
        return false;
    };
    let Ok(char_offset) = cursor.read_u32() else {
        return false;
    };
    if palette_offset < MIN_OFFSET || palette_offset >= size {
        return false;
    }
    if char_offset < MIN_OFFSET || char_offset >= size {
        return false;
    }
    // Palette is always 256 colors.
    if palette_offset as usize + 0x200 > bytes.len() {
        return false;
    }

    let mut screen_offsets = [0u32; 4];
    for slot in screen_offsets.iter_mut() {
        match cursor.read_u32() {
            Ok(offset) if offset < size => *slot = offset,
            _ => return false,
        }
    }
    if screen_offsets.iter().all(|&offset| offset == 0) {
        return false;
    }

    for (slot, &offset) in screen_offsets.iter().enumerate() {
        if offset == 0 {
            continue;
        }
        let Some((width, height)) = slot_dimensions(bytes, slot) else {
            return false;
        };
        if width == 0 || height == 0 || width % 8 != 0 || height % 8 != 0 {
            return false;
        }
        let data_size = u32::from(width / 8) * u32::from(height / 8) * 2;
        if offset + data_size > size {
            return false;
        }
    }
    true
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Container, ContainerError> {
    let mut cursor = Cursor::new(bytes);
    let palette_offset = cursor.read_u32()? as usize;
    let char_offset = cursor.read_u32()? as usize;
    let mut screen_offsets = [0usize; 4];
    for slot in screen_offsets.iter_mut() {
        *slot = cursor.read_u32()? as usize;
    }

    let bit_depth = if bytes[DEPTH_FLAG_OFFSET] == 0x80 { 8 } else { 4 };
    let char_units = Cursor::at(bytes, CHAR_SIZE_OFFSET)?.read_u16()? as usize;
    let tile_count = char_units * 0x20 / (8 * bit_depth as usize);

    let colors = Cursor::at(bytes, palette_offset)?.read_u16_array(256)?;
    let tileset = Tileset::from_bytes(
        &bytes[char_offset..],
        tile_count,
        bit_depth,
        MappingMode::OneD32K,
    )
    .ok_or_else(|| ContainerError::Structural("char data shorter than declared size".into()))?;

    let mut info = MbbInfo { screen_bitmap: 0 };
    let mut maps = Vec::new();
    for (slot, &offset) in screen_offsets.iter().enumerate() {
        if offset == 0 {
            continue;
        }
        let (width, height) = slot_dimensions(bytes, slot)
            .ok_or_else(|| ContainerError::Structural("screen info out of bounds".into()))?;
        let cells = usize::from(width / 8) * usize::from(height / 8);
        let entries = Cursor::at(bytes, offset)?.read_u16_array(cells)?;
        let map = TileMap::from_entries(u32::from(width), u32::from(height), entries)
            .expect("entry count derived from dimensions");
        maps.push(map);
        info.screen_bitmap |= 1 << slot;
    }

    let mut container =
        Container::with_extra(ContainerFormat::MultiBgBank, ExtraMetadata::Mbb(info));
    container.link(LinkedResource::Palette(Palette::from_colors(colors, bit_depth)));
    container.link(LinkedResource::Tileset(tileset));
    for map in maps {
        container.link(LinkedResource::TileMap(map));
    }
    Ok(container)
}

pub(crate) fn encode(container: &Container) -> Result<Vec<u8>, ContainerError> {
    let ExtraMetadata::Mbb(info) = container.extra() else {
        return Err(ContainerError::MissingMetadata("multi-bg bank"));
    };
    let palette = container.require_palette()?;
    let tileset = container.require_tileset()?;
    let maps: Vec<&TileMap> = container.tile_maps().collect();
    if maps.len() < info.slot_count() {
        return Err(ContainerError::SlotMismatch {
            expected: info.slot_count(),
            actual: maps.len(),
        });
    }

    let char_bytes = tileset.tile_count() * tileset.bytes_per_tile();
    let mut writer = Writer::new();
    writer.write_u32(HEADER_SIZE as u32);
    writer.write_u32((HEADER_SIZE + 0x200) as u32);

    // Slots are laid out consecutively after the char data, in slot order;
    // absent slots keep offset zero.
    let mut offset = (HEADER_SIZE + 0x200 + char_bytes) as u32;
    let mut next_map = 0usize;
    for slot in 0..4 {
        if !info.has_slot(slot) {
            continue;
        }
        let map = maps[next_map];
        next_map += 1;
        writer.seek(0x08 + slot * 4);
        writer.write_u32(offset);
        writer.seek(SLOT_INFO_OFFSET + slot * 0x10 + 0x8);
        writer.write_u16(map.width() as u16);
        writer.write_u16(map.height() as u16);
        offset += map.data_size() as u32;
    }

    writer.seek(DEPTH_FLAG_OFFSET);
    writer.write_u8(if tileset.bit_depth() == 8 { 0x80 } else { 0 });
    writer.seek(CHAR_SIZE_OFFSET);
    writer.write_u16((char_bytes / 0x20) as u16);

    writer.seek(HEADER_SIZE);
    writer.write_u16_array(palette.colors());
    writer.write_bytes(&tileset.to_bytes());
    for map in maps.iter().take(info.slot_count()) {
        writer.write_u16_array(map.entries());
    }
    Ok(writer.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container;
    use crate::models::ResourceKind;

    fn sample_container(bitmap: u8, map_dims: &[(u32, u32)]) -> Container {
        let mut container = Container::with_extra(
            ContainerFormat::MultiBgBank,
            ExtraMetadata::Mbb(MbbInfo {
                screen_bitmap: bitmap,
            }),
        );
        container.link(LinkedResource::Palette(Palette::from_colors(
            vec![0x03E0; 256],
            4,
        )));
        container.link(LinkedResource::Tileset(
            Tileset::from_bytes(&vec![0x22u8; 0x40], 2, 4, MappingMode::OneD32K).unwrap(),
        ));
        for &(w, h) in map_dims {
            let mut map = TileMap::new(w, h);
            map.entries_mut()[0] = 0x0001;
            container.link(LinkedResource::TileMap(map));
        }
        container
    }

    #[test]
    fn test_slot_layout_for_sparse_bitmap() {
        // Bitmap 0b0101: slot 0 right after the char block, slot 2 right
        // after slot 0's data, slots 1 and 3 left at offset zero.
        let container = sample_container(0b0101, &[(8, 8), (16, 8)]);
        let (bytes, warnings) = container.encode().unwrap();
        assert!(warnings.is_empty());

        let mut cursor = Cursor::at(&bytes, 0x08).unwrap();
        let slot0 = cursor.read_u32().unwrap();
        let slot1 = cursor.read_u32().unwrap();
        let slot2 = cursor.read_u32().unwrap();
        let slot3 = cursor.read_u32().unwrap();
        let char_end = (HEADER_SIZE + 0x200 + 0x40) as u32;
        assert_eq!(slot0, char_end);
        assert_eq!(slot1, 0);
        assert_eq!(slot2, char_end + 2); // slot 0 is one 8x8 cell = 2 bytes
        assert_eq!(slot3, 0);
    }

    #[test]
    fn test_classifies_and_roundtrips() {
        let container = sample_container(0b0011, &[(8, 8), (8, 16)]);
        let (bytes, _) = container.encode().unwrap();
        assert_eq!(
            container::classify(&bytes),
            Some(ContainerFormat::MultiBgBank)
        );

        let decoded = decode(&bytes).unwrap();
        let ExtraMetadata::Mbb(info) = decoded.extra() else {
            panic!("expected mbb metadata");
        };
        assert_eq!(info.screen_bitmap, 0b0011);
        assert_eq!(decoded.count_of(ResourceKind::TileMap), 2);
        let maps: Vec<_> = decoded.tile_maps().collect();
        assert_eq!((maps[0].width(), maps[0].height()), (8, 8));
        assert_eq!((maps[1].width(), maps[1].height()), (8, 16));
        assert_eq!(maps[0].entries()[0], 1);

        let (again, _) = decoded.encode().unwrap();
        assert_eq!(again, bytes);
    }

    #[test]
    fn test_bitmap_with_missing_maps_is_an_error() {
        let container = sample_container(0b0111, &[(8, 8)]);
        match container.encode() {
            Err(ContainerError::SlotMismatch { expected, actual }) => {
                assert_eq!((expected, actual), (3, 1));
            }
            other => panic!("expected SlotMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_all_zero_offsets() {
        let container = sample_container(0b0001, &[(8, 8)]);
        let (mut bytes, _) = container.encode().unwrap();
        // Zero out the only populated slot offset.
        bytes[0x08..0x0C].fill(0);
        assert!(!matches(&bytes));
    }

    #[test]
    fn test_rejects_unaligned_screen_dims() {
        let container = sample_container(0b0001, &[(8, 8)]);
        let (mut bytes, _) = container.encode().unwrap();
        bytes[SLOT_INFO_OFFSET + 0x8] = 9; // width not a multiple of 8
        assert!(!matches(&bytes));
    }
}
