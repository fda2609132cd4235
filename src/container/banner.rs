//! Icon/title banner container
//!
//! A checksummed record holding a 32x32 4bpp icon and localized titles.
//! The header stores one CRC per title revision: the base region covers the
//! icon, palette and the six original titles; versions 2 and 3 extend the
//! checksummed region over the Chinese and Korean titles respectively.

use crate::bytes::{Cursor, Writer};
use crate::color;
use crate::container::{Container, ContainerError, ContainerFormat, ExtraMetadata, LinkedResource};
use crate::crc::crc16;
use crate::models::{MappingMode, Palette, Tileset};
use serde::{Serialize, Serializer};

/// Icon character data offset (16 tiles, 4bpp).
const CHAR_OFFSET: usize = 0x20;
/// Icon palette offset (16 colors).
const PALETTE_OFFSET: usize = 0x220;
/// First title offset; titles are 0x100 bytes each.
const TITLE_OFFSET: usize = 0x240;
/// Smallest well-formed banner.
const MIN_SIZE: usize = 0x840;
/// CRC seed used by every revision.
const CRC_SEED: u16 = 0xFFFF;

/// UTF-16 units per title field.
pub const TITLE_UNITS: usize = 128;

/// A fixed-length UTF-16 title field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WideTitle(pub [u16; TITLE_UNITS]);

impl Default for WideTitle {
    fn default() -> Self {
        Self([0; TITLE_UNITS])
    }
}

impl WideTitle {
    fn read(cursor: &mut Cursor<'_>) -> Result<Self, crate::bytes::ByteError> {
        let units = cursor.read_u16_array(TITLE_UNITS)?;
        let mut title = [0u16; TITLE_UNITS];
        title.copy_from_slice(&units);
        Ok(Self(title))
    }

    /// Decodes up to the first NUL, replacing invalid sequences.
    pub fn to_string_lossy(&self) -> String {
        let end = self.0.iter().position(|&u| u == 0).unwrap_or(TITLE_UNITS);
        String::from_utf16_lossy(&self.0[..end])
    }

    /// Builds a title from text, truncating to what fits.
    pub fn from_str(text: &str) -> Self {
        let mut title = [0u16; TITLE_UNITS];
        for (slot, unit) in title.iter_mut().zip(text.encode_utf16()) {
            *slot = unit;
        }
        // Leave room for the terminator.
        title[TITLE_UNITS - 1] = 0;
        Self(title)
    }
}

impl Serialize for WideTitle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string_lossy())
    }
}

/// Banner metadata: version and the localized title blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BannerInfo {
    pub version: u16,
    pub title_japanese: WideTitle,
    pub title_english: WideTitle,
    pub title_french: WideTitle,
    pub title_german: WideTitle,
    pub title_italian: WideTitle,
    pub title_spanish: WideTitle,
    /// Present in the file only when `version >= 2`.
    pub title_chinese: WideTitle,
    /// Present in the file only when `version >= 3`.
    pub title_korean: WideTitle,
}

impl BannerInfo {
    fn base_titles_mut(&mut self) -> [&mut WideTitle; 6] {
        [
            &mut self.title_japanese,
            &mut self.title_english,
            &mut self.title_french,
            &mut self.title_german,
            &mut self.title_italian,
            &mut self.title_spanish,
        ]
    }

    fn base_titles(&self) -> [&WideTitle; 6] {
        [
            &self.title_japanese,
            &self.title_english,
            &self.title_french,
            &self.title_german,
            &self.title_italian,
            &self.title_spanish,
        ]
    }
}

fn version_sizes(version: u16) -> Option<&'static [usize]> {
    match version {
        1 => Some(&[0x840, 0xA00]),
        2 => Some(&[0x940, 0xA00]),
        3 => Some(&[0xA40, 0xC00]),
        // The animated revision has no fixed size table.
        0x103 => Some(&[]),
        _ => None,
    }
}

pub(crate) fn matches(bytes: &[u8]) -> bool {
    if bytes.len() < MIN_SIZE {
        return false;
    }
    let version = u16::from_le_bytes([bytes[0], bytes[1]]);
    let Some(sizes) = version_sizes(version) else {
        return false;
    };
    if !sizes.is_empty() && !sizes.contains(&bytes.len()) {
        return false;
    }

    let stored_crc = u16::from_le_bytes([bytes[2], bytes[3]]);
    if stored_crc != crc16(&bytes[CHAR_OFFSET..CHAR_OFFSET + 0x820], CRC_SEED) {
        return false;
    }

    // 22 reserved bytes after the CRC block must be zero.
    if bytes[0xA..0x20].iter().any(|&b| b != 0) {
        return false;
    }

    let Ok(colors) = Cursor::at(bytes, PALETTE_OFFSET).and_then(|mut c| c.read_u16_array(16))
    else {
        return false;
    };
    colors.into_iter().all(color::is_valid)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Container, ContainerError> {
    let version = u16::from_le_bytes([bytes[0], bytes[1]]);

    let mut info = BannerInfo {
        version,
        ..BannerInfo::default()
    };
    let mut cursor = Cursor::at(bytes, TITLE_OFFSET)?;
    for title in info.base_titles_mut() {
        *title = WideTitle::read(&mut cursor)?;
    }
    if version >= 2 {
        let mut cursor = Cursor::at(bytes, 0x840)?;
        info.title_chinese = WideTitle::read(&mut cursor)?;
    }
    if version >= 3 {
        let mut cursor = Cursor::at(bytes, 0x940)?;
        info.title_korean = WideTitle::read(&mut cursor)?;
    }

    let colors = Cursor::at(bytes, PALETTE_OFFSET)?.read_u16_array(16)?;
    let mut tileset = Tileset::from_bytes(
        &bytes[CHAR_OFFSET..CHAR_OFFSET + 0x200],
        16,
        4,
        MappingMode::OneD32K,
    )
    .expect("icon region size is fixed");
    tileset.set_layout(4, 4);

    let mut container =
        Container::with_extra(ContainerFormat::Banner, ExtraMetadata::Banner(info));
    container.link(LinkedResource::Palette(Palette::from_colors(colors, 4)));
    container.link(LinkedResource::Tileset(tileset));
    Ok(container)
}

pub(crate) fn encode(container: &Container) -> Result<Vec<u8>, ContainerError> {
    let ExtraMetadata::Banner(info) = container.extra() else {
        return Err(ContainerError::MissingMetadata("banner"));
    };
    let palette = container.require_palette()?;
    let tileset = container.require_tileset()?;

    let mut writer = Writer::new();
    writer.write_bytes(&[0u8; CHAR_OFFSET]);
    writer.write_bytes(&tileset.to_bytes());
    for i in 0..16 {
        writer.write_u16(palette.color(i).unwrap_or(0));
    }
    for title in info.base_titles() {
        writer.write_u16_array(&title.0);
    }
    if info.version >= 2 {
        writer.write_u16_array(&info.title_chinese.0);
    }
    if info.version >= 3 {
        writer.write_u16_array(&info.title_korean.0);
    }

    // Checksums cover the body written so far; fill the header last.
    let crc_a = crc16(&writer.as_bytes()[CHAR_OFFSET..CHAR_OFFSET + 0x820], CRC_SEED);
    let crc_b = (info.version >= 2)
        .then(|| crc16(&writer.as_bytes()[CHAR_OFFSET..CHAR_OFFSET + 0x920], CRC_SEED));
    let crc_c = (info.version >= 3)
        .then(|| crc16(&writer.as_bytes()[CHAR_OFFSET..CHAR_OFFSET + 0xA20], CRC_SEED));

    writer.seek(0);
    writer.write_u16(info.version);
    writer.write_u16(crc_a);
    writer.write_u16(crc_b.unwrap_or(0));
    writer.write_u16(crc_c.unwrap_or(0));
    Ok(writer.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container;

    fn sample_container(version: u16) -> Container {
        let mut info = BannerInfo {
            version,
            title_japanese: WideTitle::from_str("サンプル"),
            title_english: WideTitle::from_str("Sample"),
            ..BannerInfo::default()
        };
        if version >= 2 {
            info.title_chinese = WideTitle::from_str("样品");
        }
        let mut container =
            Container::with_extra(ContainerFormat::Banner, ExtraMetadata::Banner(info));
        let mut colors = vec![0u16; 16];
        colors[15] = 0x7FFF;
        container.link(LinkedResource::Palette(Palette::from_colors(colors, 4)));
        let mut chars = vec![0u8; 0x200];
        chars[0] = 0xF0;
        container.link(LinkedResource::Tileset(
            Tileset::from_bytes(&chars, 16, 4, MappingMode::OneD32K).unwrap(),
        ));
        container
    }

    #[test]
    fn test_encode_sizes_by_version() {
        for (version, size) in [(1u16, 0x840), (2, 0x940), (3, 0xA40)] {
            let (bytes, _) = sample_container(version).encode().unwrap();
            assert_eq!(bytes.len(), size, "version {version}");
            assert!(matches(&bytes), "version {version} must re-classify");
        }
    }

    #[test]
    fn test_crc_rejects_any_mutation() {
        let (mut bytes, _) = sample_container(1).encode().unwrap();
        assert!(matches(&bytes));
        bytes[0x300] ^= 1; // inside the checksummed region
        assert!(!matches(&bytes));
    }

    #[test]
    fn test_reserved_bytes_must_be_zero() {
        let (mut bytes, _) = sample_container(1).encode().unwrap();
        bytes[0xC] = 1;
        assert!(!matches(&bytes));
    }

    #[test]
    fn test_roundtrip_preserves_titles_and_graphics() {
        let container = sample_container(2);
        let (bytes, _) = container.encode().unwrap();
        assert_eq!(container::classify(&bytes), Some(ContainerFormat::Banner));

        let decoded = decode(&bytes).unwrap();
        let ExtraMetadata::Banner(info) = decoded.extra() else {
            panic!("expected banner metadata");
        };
        assert_eq!(info.version, 2);
        assert_eq!(info.title_japanese.to_string_lossy(), "サンプル");
        assert_eq!(info.title_chinese.to_string_lossy(), "样品");
        assert_eq!(info.title_korean, WideTitle::default());
        assert_eq!(decoded.palette().unwrap().color(15), Some(0x7FFF));
        assert_eq!(decoded.tileset().unwrap().tile(0).unwrap()[1], 0xF);

        // A second encode must be byte-identical.
        let (again, _) = decoded.encode().unwrap();
        assert_eq!(again, bytes);
    }
}
