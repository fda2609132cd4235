//! Halfword-offset cell table
//!
//! The most compact layout: a table of 16-bit offsets (in halfwords) where
//! the first entry doubles as the cell count, each pointing at a 16-bit
//! object count followed by bare 6-byte attribute records. Positions are
//! not restated; everything lives in the attribute words.

use crate::bytes::{Cursor, Writer};
use crate::cell::{Cell, CellBank, CellError, CellFormat};
use crate::models::MappingMode;
use crate::oam::RawObject;

pub(crate) fn matches(bytes: &[u8]) -> bool {
    let mut cursor = Cursor::new(bytes);
    let Ok(cell_count) = cursor.read_u16() else {
        return false;
    };
    if cell_count as usize * 2 > bytes.len() {
        return false;
    }

    // The table entries must tile the rest of the buffer exactly.
    let mut covered = 2usize;
    let mut table = Cursor::new(bytes);
    for _ in 0..cell_count {
        let Ok(entry) = table.read_u16() else {
            return false;
        };
        let offset = entry as usize * 2;
        if offset + 2 >= bytes.len() {
            return false;
        }
        let Ok(object_count) = Cursor::at(bytes, offset).and_then(|mut c| c.read_u16()) else {
            return false;
        };
        let end = offset + 2 + 6 * object_count as usize;
        if end > bytes.len() {
            return false;
        }
        covered = covered.max(end);
    }
    covered == bytes.len()
}

pub(crate) fn decode(bytes: &[u8]) -> Result<CellBank, CellError> {
    let mut table = Cursor::new(bytes);
    let cell_count = table.read_u16()? as usize;
    table.seek(0)?;

    let mut cells = Vec::with_capacity(cell_count);
    for _ in 0..cell_count {
        let offset = table.read_u16()? as usize * 2;
        let mut records = Cursor::at(bytes, offset)?;
        let object_count = records.read_u16()? as usize;
        let objects = (0..object_count)
            .map(|_| {
                let words = records.read_u16_array(3)?;
                Ok(RawObject([words[0], words[1], words[2]]))
            })
            .collect::<Result<Vec<_>, CellError>>()?;
        cells.push(Cell {
            objects,
            attributes: 0,
            bounds: None,
        });
    }

    let mut bank = CellBank::new(CellFormat::OffsetTable);
    bank.set_mapping(MappingMode::OneD128K);
    *bank.cells_mut() = cells;
    Ok(bank)
}

pub(crate) fn encode(bank: &CellBank) -> Result<Vec<u8>, CellError> {
    let mut writer = Writer::new();

    // Cell 0 always starts right after the table, so the leading offset is
    // also the cell count.
    let mut offset = bank.cells().len() as u32 * 2;
    for cell in bank.cells() {
        writer.write_u16((offset / 2) as u16);
        offset += 2 + 6 * cell.objects.len() as u32;
    }
    for cell in bank.cells() {
        writer.write_u16(cell.objects.len() as u16);
        for raw in &cell.objects {
            writer.write_u16_array(&raw.0);
        }
    }
    Ok(writer.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell;

    fn sample_bank() -> CellBank {
        let mut bank = CellBank::new(CellFormat::OffsetTable);
        bank.cells_mut().push(Cell {
            objects: vec![RawObject([1, 2, 3])],
            attributes: 0,
            bounds: None,
        });
        bank.cells_mut().push(Cell {
            objects: vec![RawObject([4, 5, 6]), RawObject([7, 8, 9])],
            attributes: 0,
            bounds: None,
        });
        bank
    }

    #[test]
    fn test_leading_offset_doubles_as_count() {
        let bytes = sample_bank().encode().unwrap();
        let mut cursor = Cursor::new(&bytes);
        let first = cursor.read_u16().unwrap();
        assert_eq!(first, 2); // two cells, and cell 0 at halfword 2
    }

    #[test]
    fn test_encode_classifies_as_offset_table() {
        let bytes = sample_bank().encode().unwrap();
        assert_eq!(cell::classify(&bytes), Some(CellFormat::OffsetTable));
    }

    #[test]
    fn test_roundtrip() {
        let bank = sample_bank();
        let bytes = bank.encode().unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.cells(), bank.cells());
        assert_eq!(decoded.mapping(), MappingMode::OneD128K);
        assert_eq!(decoded.encode().unwrap(), bytes);
    }

    #[test]
    fn test_trailing_garbage_defeats_classification() {
        let mut bytes = sample_bank().encode().unwrap();
        bytes.extend_from_slice(&[0xAA; 6]);
        assert!(!matches(&bytes));
    }
}
