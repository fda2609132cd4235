//! Sectioned background container (magic `NTBG`)
//!
//! The only self-describing container format: palette, background data and
//! optional per-tile palette attributes live in tagged sections. Bit depth
//! is not stored directly; a bank is 4bpp exactly when the attribute
//! section is present.

use crate::bytes::{Cursor, Writer};
use crate::container::{Container, ContainerError, ContainerFormat, ExtraMetadata, LinkedResource};
use crate::models::{MappingMode, Palette, TileMap, Tileset};
use crate::sectioned::{SectionWriter, SectionedFile};

const MAGIC: [u8; 4] = *b"NTBG";
const PALETTE_TAG: [u8; 4] = *b"PALT";
const BG_DATA_TAG: [u8; 4] = *b"BGDT";
const ATTRIBUTE_TAG: [u8; 4] = *b"DFPL";

pub(crate) fn matches(bytes: &[u8]) -> bool {
    let Some(file) = SectionedFile::parse(bytes) else {
        return false;
    };
    file.section(PALETTE_TAG).is_some() && file.section(BG_DATA_TAG).is_some()
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Container, ContainerError> {
    let file = SectionedFile::parse(bytes)
        .ok_or_else(|| ContainerError::Structural("not a sectioned file".into()))?;
    let palt = file
        .section(PALETTE_TAG)
        .ok_or_else(|| ContainerError::Structural("missing palette section".into()))?;
    let bgdt = file
        .section(BG_DATA_TAG)
        .ok_or_else(|| ContainerError::Structural("missing background section".into()))?;
    let bit_depth = if file.section(ATTRIBUTE_TAG).is_some() {
        4
    } else {
        8
    };

    let mut cursor = Cursor::new(palt);
    let color_count = cursor.read_u32()? as usize;
    let colors = cursor.read_u16_array(color_count)?;

    let mut cursor = Cursor::new(bgdt);
    let mapping_raw = cursor.read_u32()?;
    let mapping = MappingMode::from_raw(mapping_raw).ok_or_else(|| {
        ContainerError::Structural(format!("unknown mapping constant {mapping_raw:#x}"))
    })?;
    let screen_size = cursor.read_u32()? as usize;
    let screen_w = cursor.read_u16()?;
    let screen_h = cursor.read_u16()?;
    let char_w = cursor.read_u16()?;
    let char_h = cursor.read_u16()?;
    let char_size = cursor.read_u32()? as usize;

    let entries = cursor.read_u16_array(usize::from(screen_w) * usize::from(screen_h))?;
    let map = TileMap::from_entries(u32::from(screen_w) * 8, u32::from(screen_h) * 8, entries)
        .expect("entry count derived from dimensions");

    // Char data sits after the declared screen size, which normally equals
    // the screen dimensions. The stored char byte size bounds the tile
    // count; encoders trim it below the allocated grid.
    let char_offset = 0x14 + screen_size;
    let per_tile = 8 * bit_depth as usize;
    let tile_count = char_size / per_tile;
    let char_data = bgdt
        .get(char_offset..)
        .ok_or_else(|| ContainerError::Structural("char data offset out of bounds".into()))?;
    let mut tileset = Tileset::from_bytes(char_data, tile_count, bit_depth, mapping)
        .ok_or_else(|| ContainerError::Structural("char data shorter than declared size".into()))?;
    tileset.set_layout(usize::from(char_w), usize::from(char_h));

    let mut container = Container::with_extra(ContainerFormat::FiveBg, ExtraMetadata::None);
    container.link(LinkedResource::Palette(Palette::from_colors(colors, 4)));
    container.link(LinkedResource::Tileset(tileset));
    container.link(LinkedResource::TileMap(map));
    Ok(container)
}

pub(crate) fn encode(container: &Container) -> Result<Vec<u8>, ContainerError> {
    let palette = container.require_palette()?;
    let tileset = container.require_tileset()?;
    let map = container
        .tile_maps()
        .next()
        .ok_or(ContainerError::Incomplete(crate::models::ResourceKind::TileMap))?;

    // Write only the tiles the screen actually references.
    let tiles_used = map
        .highest_tile_index()
        .map_or(0, |highest| usize::from(highest) + 1)
        .min(tileset.tile_count());

    let mut palt = Writer::new();
    palt.write_u32(palette.color_count() as u32);
    palt.write_u16_array(palette.colors());

    let mut bgdt = Writer::new();
    bgdt.write_u32(tileset.mapping().raw());
    bgdt.write_u32(map.data_size() as u32);
    bgdt.write_u16(map.width_tiles() as u16);
    bgdt.write_u16(map.height_tiles() as u16);
    bgdt.write_u16(tileset.width_tiles() as u16);
    bgdt.write_u16(tileset.height_tiles() as u16);
    bgdt.write_u32((tiles_used * tileset.bytes_per_tile()) as u32);
    bgdt.write_u16_array(map.entries());
    bgdt.write_bytes(&tileset.pack_tiles(tiles_used));

    let mut writer = SectionWriter::new(MAGIC);
    writer.add(PALETTE_TAG, palt.into_bytes());
    writer.add(BG_DATA_TAG, bgdt.into_bytes());

    if tileset.bit_depth() == 4 {
        // Per-tile palette attributes, regenerated from the screen.
        let mut attrs = vec![0u8; tileset.tile_count()];
        for &raw in map.entries() {
            let entry = crate::models::MapEntry(raw);
            if let Some(slot) = attrs.get_mut(usize::from(entry.tile_index())) {
                *slot = entry.palette();
            }
        }
        let mut dfpl = Writer::new();
        dfpl.write_u32(tileset.tile_count() as u32);
        dfpl.write_bytes(&attrs);
        writer.add(ATTRIBUTE_TAG, dfpl.into_bytes());
    }

    Ok(writer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container;

    fn sample_container(bit_depth: u8) -> Container {
        let mut container = Container::with_extra(ContainerFormat::FiveBg, ExtraMetadata::None);
        container.link(LinkedResource::Palette(Palette::from_colors(
            vec![0x7C00; 32],
            4,
        )));
        let per_tile = 8 * bit_depth as usize;
        let tiles = Tileset::from_bytes(
            &vec![0x33u8; per_tile * 3],
            3,
            bit_depth,
            MappingMode::TwoD,
        )
        .unwrap();
        container.link(LinkedResource::Tileset(tiles));
        let mut map = TileMap::new(16, 8);
        map.entries_mut()[0] = 0x2002; // tile 2, palette 2
        map.entries_mut()[1] = 0x0001;
        container.link(LinkedResource::TileMap(map));
        container
    }

    #[test]
    fn test_encode_classifies_as_five_bg() {
        let (bytes, _) = sample_container(4).encode().unwrap();
        assert_eq!(container::classify(&bytes), Some(ContainerFormat::FiveBg));
    }

    #[test]
    fn test_bit_depth_follows_attribute_section() {
        let (bytes4, _) = sample_container(4).encode().unwrap();
        assert_eq!(decode(&bytes4).unwrap().tileset().unwrap().bit_depth(), 4);

        let (bytes8, _) = sample_container(8).encode().unwrap();
        assert!(SectionedFile::parse(&bytes8)
            .unwrap()
            .section(ATTRIBUTE_TAG)
            .is_none());
        assert_eq!(decode(&bytes8).unwrap().tileset().unwrap().bit_depth(), 8);
    }

    #[test]
    fn test_roundtrip() {
        let (bytes, _) = sample_container(4).encode().unwrap();
        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded.palette().unwrap().color_count(), 32);
        // The screen references tiles 0..=2, so all three survive.
        assert_eq!(decoded.tileset().unwrap().tile_count(), 3);
        let map = decoded.tile_maps().next().unwrap();
        assert_eq!((map.width(), map.height()), (16, 8));
        assert_eq!(map.entries()[0], 0x2002);

        let (again, _) = decoded.encode().unwrap();
        assert_eq!(again, bytes);
    }

    #[test]
    fn test_encode_trims_unreferenced_tiles() {
        // A blank screen references only tile 0; tiles 1 and 2 are dead
        // weight and must not be written.
        let mut container = Container::with_extra(ContainerFormat::FiveBg, ExtraMetadata::None);
        container.link(LinkedResource::Palette(Palette::from_colors(
            vec![0x7C00; 32],
            4,
        )));
        container.link(LinkedResource::Tileset(
            Tileset::from_bytes(&vec![0x33u8; 32 * 3], 3, 4, MappingMode::TwoD).unwrap(),
        ));
        container.link(LinkedResource::TileMap(TileMap::new(16, 8)));
        let (bytes, _) = container.encode().unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.tileset().unwrap().tile_count(), 1);
    }
}
