//! Legacy fixed-stride cell table
//!
//! A count, a table of 32-bit offsets, then per cell a 16-bit object count
//! followed by 10-byte records: the three attribute words plus the object
//! position repeated as explicitly signed 16-bit values. There is no magic
//! at all, so the classifier additionally demands that the cell data cover
//! the whole buffer; unrelated binary data rarely does.

use crate::bytes::{Cursor, Writer};
use crate::cell::{sign_extend, Cell, CellBank, CellError, CellFormat};
use crate::models::MappingMode;
use crate::oam::RawObject;

pub(crate) fn matches(bytes: &[u8]) -> bool {
    let mut cursor = Cursor::new(bytes);
    let Ok(cell_count) = cursor.read_u32() else {
        return false;
    };
    if cell_count == 0 {
        return false;
    }

    let table_end = match 4usize.checked_add(cell_count as usize * 4) {
        Some(end) => end,
        None => return false,
    };
    let mut highest = table_end;
    for _ in 0..cell_count {
        let Ok(entry) = cursor.read_u32() else {
            return false;
        };
        let offset = entry as usize + 4;
        let Ok(count) = Cursor::at(bytes, offset).and_then(|mut c| c.read_u16()) else {
            return false;
        };
        let end = offset + 2 + 10 * count as usize;
        if end > bytes.len() {
            return false;
        }
        highest = highest.max(end);
    }
    // Real cell files leave no unused tail.
    highest == bytes.len()
}

pub(crate) fn decode(bytes: &[u8]) -> Result<CellBank, CellError> {
    let mut cursor = Cursor::new(bytes);
    let cell_count = cursor.read_u32()? as usize;

    let mut cells = Vec::with_capacity(cell_count);
    for _ in 0..cell_count {
        let offset = cursor.read_u32()? as usize + 4;
        let mut records = Cursor::at(bytes, offset)?;
        let object_count = records.read_u16()? as usize;
        let mut objects = Vec::with_capacity(object_count);
        for _ in 0..object_count {
            let words = records.read_u16_array(5)?;
            // Words 3 and 4 restate the position; the attribute copy wins.
            objects.push(RawObject([words[0], words[1], words[2]]));
        }
        let cell = Cell {
            objects,
            attributes: 0,
            bounds: None,
        };
        let bounds = cell.compute_bounds();
        cells.push(Cell { bounds, ..cell });
    }

    let mut bank = CellBank::new(CellFormat::FixedTable);
    bank.set_mapping(MappingMode::TwoD);
    *bank.cells_mut() = cells;
    Ok(bank)
}

pub(crate) fn encode(bank: &CellBank) -> Result<Vec<u8>, CellError> {
    let mut writer = Writer::new();
    writer.write_u32(bank.cells().len() as u32);

    // Offsets are stored relative to the end of the count word.
    let mut offset = bank.cells().len() as u32 * 4;
    for cell in bank.cells() {
        writer.write_u32(offset);
        offset += 2 + 10 * cell.objects.len() as u32;
    }

    for cell in bank.cells() {
        writer.write_u16(cell.objects.len() as u16);
        for raw in &cell.objects {
            let obj = raw.decode();
            writer.write_u16_array(&raw.0);
            writer.write_i16(sign_extend(obj.x, 9));
            writer.write_i16(sign_extend(obj.y, 8));
        }
    }
    Ok(writer.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell;

    fn sample_bank() -> CellBank {
        let mut bank = CellBank::new(CellFormat::FixedTable);
        bank.cells_mut().push(Cell {
            // 16x8 object at x = -8 (0x1F8), y = 4.
            objects: vec![RawObject([4 | (1 << 14), 0x1F8, 3])],
            attributes: 0,
            bounds: None,
        });
        bank.cells_mut().push(Cell {
            objects: vec![RawObject([0, 0, 0]), RawObject([8, 8, 1])],
            attributes: 0,
            bounds: None,
        });
        bank
    }

    #[test]
    fn test_encode_classifies_as_fixed_table() {
        let bytes = sample_bank().encode().unwrap();
        assert_eq!(cell::classify(&bytes), Some(CellFormat::FixedTable));
    }

    #[test]
    fn test_positions_are_sign_extended_on_write() {
        let bytes = sample_bank().encode().unwrap();
        // Cell 0 data: table(4 + 8) .. count(2) + record; x at record +6.
        let mut cursor = Cursor::at(&bytes, 12 + 2 + 6).unwrap();
        assert_eq!(cursor.read_i16().unwrap(), -8);
        assert_eq!(cursor.read_i16().unwrap(), 4);
    }

    #[test]
    fn test_roundtrip_recomputes_bounds() {
        let bank = sample_bank();
        let bytes = bank.encode().unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.cells().len(), 2);
        assert_eq!(decoded.cells()[0].objects, bank.cells()[0].objects);
        let bounds = decoded.cells()[0].bounds.unwrap();
        assert_eq!((bounds.min_x, bounds.max_x), (-8, 8));
        assert_eq!((bounds.min_y, bounds.max_y), (4, 12));
        assert_eq!(decoded.encode().unwrap(), bytes);
    }

    #[test]
    fn test_trailing_garbage_defeats_classification() {
        let mut bytes = sample_bank().encode().unwrap();
        bytes.extend_from_slice(&[0; 16]);
        assert!(!matches(&bytes));
    }

    #[test]
    fn test_zero_cells_rejected() {
        assert!(!matches(&[0, 0, 0, 0]));
    }
}
