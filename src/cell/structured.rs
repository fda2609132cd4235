//! Sectioned cell bank (magic `RECN` on disk)
//!
//! The richest of the three layouts: a bank section carrying the cell
//! records, mapping mode and optional VRAM transfer table, plus optional
//! label and user-extension blobs. Cell records are 8 bytes, or 16 when
//! the bank attribute flag says bounding boxes were stored.

use crate::bytes::{Cursor, Writer};
use crate::cell::{Bounds, Cell, CellBank, CellError, CellFormat, VramTransfer};
use crate::models::MappingMode;
use crate::oam::RawObject;
use crate::sectioned::{SectionWriter, SectionedFile};

const MAGIC: [u8; 4] = *b"RECN";
/// Bank section tag, on-disk spelling.
const BANK_TAG: [u8; 4] = *b"KBEC";
const LABEL_TAG: [u8; 4] = *b"LBAL";
const EXTENSION_TAG: [u8; 4] = *b"TXEU";

/// Cell records start here, relative to the bank payload.
const CELL_DATA_OFFSET: u32 = 0x18;

/// Mapping modes by stored index.
const MAPPING_TABLE: [MappingMode; 5] = [
    MappingMode::OneD32K,
    MappingMode::OneD64K,
    MappingMode::OneD128K,
    MappingMode::OneD256K,
    MappingMode::TwoD,
];

pub(crate) fn matches(bytes: &[u8]) -> bool {
    let Some(file) = SectionedFile::parse(bytes) else {
        return false;
    };
    file.magic() == MAGIC && file.section(BANK_TAG).is_some()
}

pub(crate) fn decode(bytes: &[u8]) -> Result<CellBank, CellError> {
    let file = SectionedFile::parse(bytes)
        .ok_or_else(|| CellError::Structural("not a sectioned file".into()))?;
    let bank = file
        .section(BANK_TAG)
        .ok_or_else(|| CellError::Structural("missing bank section".into()))?;

    let mut cursor = Cursor::new(bank);
    let cell_count = cursor.read_u16()? as usize;
    let bank_attributes = cursor.read_u16()?;
    let cell_data_offset = cursor.read_u32()? as usize;
    let mapping_index = cursor.read_u32()? as usize;
    let transfer_offset = cursor.read_u32()? as usize;

    let mapping = MAPPING_TABLE
        .get(mapping_index)
        .copied()
        .unwrap_or(MappingMode::OneD32K);

    let record_size = if bank_attributes == 1 { 16 } else { 8 };
    let oam_pool_offset = cell_data_offset + cell_count * record_size;

    let mut cells = Vec::with_capacity(cell_count);
    let mut cursor = Cursor::at(bank, cell_data_offset)?;
    for _ in 0..cell_count {
        let object_count = cursor.read_u16()? as usize;
        let attributes = cursor.read_u16()?;
        let oam_offset = cursor.read_u32()? as usize;
        let bounds = if record_size == 16 {
            let max_x = cursor.read_i16()?;
            let max_y = cursor.read_i16()?;
            let min_x = cursor.read_i16()?;
            let min_y = cursor.read_i16()?;
            Some(Bounds {
                min_x,
                max_x,
                min_y,
                max_y,
            })
        } else {
            None
        };

        let mut oam = Cursor::at(bank, oam_pool_offset + oam_offset)?;
        let objects = (0..object_count)
            .map(|_| {
                let words = oam.read_u16_array(3)?;
                Ok(RawObject([words[0], words[1], words[2]]))
            })
            .collect::<Result<Vec<_>, CellError>>()?;

        cells.push(Cell {
            objects,
            attributes,
            bounds,
        });
    }

    let transfers = if transfer_offset != 0 {
        let mut cursor = Cursor::at(bank, transfer_offset)?;
        let _max_size = cursor.read_u32()?;
        let data_offset = cursor.read_u32()? as usize;
        let mut cursor = Cursor::at(bank, transfer_offset + data_offset)?;
        let mut transfers = Vec::with_capacity(cell_count);
        for _ in 0..cell_count {
            let src_offset = cursor.read_u32()?;
            let size = cursor.read_u32()?;
            transfers.push(VramTransfer { src_offset, size });
        }
        Some(transfers)
    } else {
        None
    };

    let mut bank = CellBank::new(CellFormat::Structured);
    bank.set_bank_attributes(bank_attributes);
    bank.set_mapping(mapping);
    *bank.cells_mut() = cells;
    bank.set_transfers(transfers);
    bank.set_label(file.section(LABEL_TAG).map(|s| s.to_vec()));
    bank.set_extension(file.section(EXTENSION_TAG).map(|s| s.to_vec()));
    Ok(bank)
}

pub(crate) fn encode(bank: &CellBank) -> Result<Vec<u8>, CellError> {
    let record_size = if bank.bank_attributes() == 1 { 16 } else { 8 };
    let mapping_index = MAPPING_TABLE
        .iter()
        .position(|&m| m == bank.mapping())
        .unwrap_or(0) as u32;

    let mut payload = Writer::new();
    payload.write_u16(bank.cells().len() as u16);
    payload.write_u16(bank.bank_attributes());
    payload.write_u32(CELL_DATA_OFFSET);
    payload.write_u32(mapping_index);
    payload.write_u32(0); // transfer table offset, patched below
    payload.write_bytes(&[0u8; 8]);

    let mut oam_offset = 0u32;
    for cell in bank.cells() {
        payload.write_u16(cell.objects.len() as u16);
        payload.write_u16(cell.attributes);
        payload.write_u32(oam_offset);
        if record_size == 16 {
            let bounds = cell.bounds.unwrap_or_default();
            payload.write_i16(bounds.max_x);
            payload.write_i16(bounds.max_y);
            payload.write_i16(bounds.min_x);
            payload.write_i16(bounds.min_y);
        }
        oam_offset += cell.objects.len() as u32 * 6;
    }
    for cell in bank.cells() {
        for raw in &cell.objects {
            payload.write_u16_array(&raw.0);
        }
    }
    payload.align(4);

    if let Some(transfers) = bank.transfers() {
        let table_offset = payload.len() as u32;
        payload.write_u32(transfers.iter().map(|t| t.size).max().unwrap_or(0));
        payload.write_u32(8); // entries follow this block directly
        for transfer in transfers {
            payload.write_u32(transfer.src_offset);
            payload.write_u32(transfer.size);
        }
        payload.seek(0xC);
        payload.write_u32(table_offset);
    }

    let mut writer = SectionWriter::new(MAGIC);
    writer.add(BANK_TAG, payload.into_bytes());
    if let Some(label) = bank.label() {
        writer.add(LABEL_TAG, label.to_vec());
    }
    if let Some(extension) = bank.extension() {
        writer.add(EXTENSION_TAG, extension.to_vec());
    }
    Ok(writer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell;

    fn sample_bank(with_bounds: bool, with_transfers: bool) -> CellBank {
        let mut bank = CellBank::new(CellFormat::Structured);
        bank.set_mapping(MappingMode::OneD64K);
        if with_bounds {
            bank.set_bank_attributes(1);
        }
        bank.cells_mut().push(Cell {
            objects: vec![
                RawObject([10, 20, 1]),
                RawObject([0x2000 | 30, 40, 2 | (2 << 12)]),
            ],
            attributes: 5,
            bounds: with_bounds.then(|| Bounds {
                min_x: -4,
                max_x: 20,
                min_y: 0,
                max_y: 16,
            }),
        });
        bank.cells_mut().push(Cell {
            objects: vec![RawObject([0, 0, 0])],
            attributes: 0,
            bounds: with_bounds.then(Bounds::default),
        });
        if with_transfers {
            bank.set_transfers(Some(vec![
                VramTransfer {
                    src_offset: 0,
                    size: 0x80,
                },
                VramTransfer {
                    src_offset: 0x80,
                    size: 0x40,
                },
            ]));
        }
        bank.set_label(Some(b"walk\0idle\0".to_vec()));
        bank
    }

    #[test]
    fn test_encode_classifies_as_structured() {
        let bytes = sample_bank(false, false).encode().unwrap();
        assert_eq!(cell::classify(&bytes), Some(CellFormat::Structured));
    }

    #[test]
    fn test_roundtrip_plain() {
        let bank = sample_bank(false, false);
        let bytes = bank.encode().unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.cells(), bank.cells());
        assert_eq!(decoded.mapping(), MappingMode::OneD64K);
        assert_eq!(decoded.label(), Some(&b"walk\0idle\0"[..]));
        assert_eq!(decoded.extension(), None);
        assert_eq!(decoded.transfers(), None);
        assert_eq!(decoded.encode().unwrap(), bytes);
    }

    #[test]
    fn test_roundtrip_with_bounds_and_transfers() {
        let bank = sample_bank(true, true);
        let bytes = bank.encode().unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.bank_attributes(), 1);
        assert_eq!(decoded.cells()[0].bounds.unwrap().min_x, -4);
        assert_eq!(
            decoded.transfers().unwrap(),
            &[
                VramTransfer {
                    src_offset: 0,
                    size: 0x80
                },
                VramTransfer {
                    src_offset: 0x80,
                    size: 0x40
                },
            ]
        );
        assert_eq!(decoded.encode().unwrap(), bytes);
    }

    #[test]
    fn test_requires_bank_section() {
        let mut writer = SectionWriter::new(MAGIC);
        writer.add(LABEL_TAG, vec![0; 4]);
        assert!(!matches(&writer.finish()));
    }

    #[test]
    fn test_requires_magic() {
        let mut writer = SectionWriter::new(*b"NTBG");
        writer.add(BANK_TAG, vec![0; 24]);
        assert!(!matches(&writer.finish()));
    }
}
