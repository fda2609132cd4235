//! Sprite cell banks and cell-table format dispatch
//!
//! A cell bank is an ordered list of cells, each an ordered list of raw
//! object attribute records. Three table layouts are supported; like the
//! containers, none carries a reliable magic, so classification is
//! structural with a fixed precedence ([`CLASSIFY_ORDER`]).

mod fixed_table;
mod offset_table;
mod structured;

use crate::bytes::ByteError;
use crate::models::MappingMode;
use crate::oam::{ObjectDescriptor, RawObject};
use serde::Serialize;
use thiserror::Error;

/// Error type for cell bank decode/encode failures
#[derive(Debug, Error)]
pub enum CellError {
    /// No cell-table predicate matched the buffer
    #[error("buffer does not match any known cell table format")]
    UnknownFormat,
    /// Offsets or sizes inconsistent after classification passed
    #[error("structural violation: {0}")]
    Structural(String),
    /// Ran off the end of the buffer while decoding
    #[error("structural violation: {0}")]
    Truncated(#[from] ByteError),
}

/// Identified cell table format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CellFormat {
    /// Sectioned bank with labels, extensions and transfer descriptors.
    Structured,
    /// Fixed-stride table of 10-byte records with explicit positions.
    FixedTable,
    /// Halfword offset table of 6-byte records.
    OffsetTable,
}

impl std::fmt::Display for CellFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CellFormat::Structured => "structured",
            CellFormat::FixedTable => "fixed-table",
            CellFormat::OffsetTable => "offset-table",
        };
        write!(f, "{name}")
    }
}

/// Sniffing precedence for cell tables.
pub const CLASSIFY_ORDER: [CellFormat; 3] = [
    CellFormat::Structured,
    CellFormat::FixedTable,
    CellFormat::OffsetTable,
];

/// Classifies a raw buffer, or `None` when nothing matches.
pub fn classify(bytes: &[u8]) -> Option<CellFormat> {
    CLASSIFY_ORDER.into_iter().find(|format| match format {
        CellFormat::Structured => structured::matches(bytes),
        CellFormat::FixedTable => fixed_table::matches(bytes),
        CellFormat::OffsetTable => offset_table::matches(bytes),
    })
}

/// Classifies and decodes a buffer in one step.
pub fn decode(bytes: &[u8]) -> Result<CellBank, CellError> {
    match classify(bytes).ok_or(CellError::UnknownFormat)? {
        CellFormat::Structured => structured::decode(bytes),
        CellFormat::FixedTable => fixed_table::decode(bytes),
        CellFormat::OffsetTable => offset_table::decode(bytes),
    }
}

/// Per-cell bounding box, stored only when the bank's attribute flag says so.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Bounds {
    pub min_x: i16,
    pub max_x: i16,
    pub min_y: i16,
    pub max_y: i16,
}

/// A VRAM transfer descriptor: where a cell's tiles are copied from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VramTransfer {
    pub src_offset: u32,
    pub size: u32,
}

/// One drawable group of sprite objects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    pub objects: Vec<RawObject>,
    pub attributes: u16,
    pub bounds: Option<Bounds>,
}

impl Cell {
    /// Decodes the `index`-th object attribute record.
    pub fn object(&self, index: usize) -> Option<ObjectDescriptor> {
        self.objects.get(index).map(|raw| raw.decode())
    }

    /// Recomputes the bounding box from the object positions, treating the
    /// stored coordinates as signed (9-bit x, 8-bit y).
    pub fn compute_bounds(&self) -> Option<Bounds> {
        let mut bounds: Option<Bounds> = None;
        for raw in &self.objects {
            let obj = raw.decode();
            let x = sign_extend(obj.x, 9);
            let y = sign_extend(obj.y, 8);
            let (right, bottom) = (x + obj.width as i16, y + obj.height as i16);
            bounds = Some(match bounds {
                None => Bounds {
                    min_x: x,
                    max_x: right,
                    min_y: y,
                    max_y: bottom,
                },
                Some(b) => Bounds {
                    min_x: b.min_x.min(x),
                    max_x: b.max_x.max(right),
                    min_y: b.min_y.min(y),
                    max_y: b.max_y.max(bottom),
                },
            });
        }
        bounds
    }
}

/// Sign-extends the low `bits` of a stored coordinate.
pub(crate) fn sign_extend(value: u16, bits: u32) -> i16 {
    let shift = 16 - bits;
    ((value << shift) as i16) >> shift
}

/// An in-memory bank of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct CellBank {
    format: CellFormat,
    cells: Vec<Cell>,
    mapping: MappingMode,
    bank_attributes: u16,
    label: Option<Vec<u8>>,
    extension: Option<Vec<u8>>,
    transfers: Option<Vec<VramTransfer>>,
}

impl CellBank {
    /// Creates an empty bank for a new asset.
    pub fn new(format: CellFormat) -> Self {
        Self {
            format,
            cells: Vec::new(),
            mapping: MappingMode::OneD32K,
            bank_attributes: 0,
            label: None,
            extension: None,
            transfers: None,
        }
    }

    pub fn format(&self) -> CellFormat {
        self.format
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut Vec<Cell> {
        &mut self.cells
    }

    pub fn mapping(&self) -> MappingMode {
        self.mapping
    }

    pub fn set_mapping(&mut self, mapping: MappingMode) {
        self.mapping = mapping;
    }

    /// Bank attribute word; bit 0 marks stored per-cell bounds.
    pub fn bank_attributes(&self) -> u16 {
        self.bank_attributes
    }

    pub fn set_bank_attributes(&mut self, attributes: u16) {
        self.bank_attributes = attributes;
    }

    /// Free-form label blob (structured banks only).
    pub fn label(&self) -> Option<&[u8]> {
        self.label.as_deref()
    }

    pub fn set_label(&mut self, label: Option<Vec<u8>>) {
        self.label = label;
    }

    /// User-extension blob (structured banks only).
    pub fn extension(&self) -> Option<&[u8]> {
        self.extension.as_deref()
    }

    pub fn set_extension(&mut self, extension: Option<Vec<u8>>) {
        self.extension = extension;
    }

    /// Per-cell VRAM transfer descriptors, parallel to `cells`.
    pub fn transfers(&self) -> Option<&[VramTransfer]> {
        self.transfers.as_deref()
    }

    pub fn set_transfers(&mut self, transfers: Option<Vec<VramTransfer>>) {
        self.transfers = transfers;
    }

    /// The transfer descriptor for one cell, if the bank carries any.
    pub fn transfer_for(&self, cell_index: usize) -> Option<VramTransfer> {
        self.transfers
            .as_ref()
            .and_then(|t| t.get(cell_index))
            .copied()
    }

    /// Serializes the bank back to its on-disk format.
    pub fn encode(&self) -> Result<Vec<u8>, CellError> {
        match self.format {
            CellFormat::Structured => structured::encode(self),
            CellFormat::FixedTable => fixed_table::encode(self),
            CellFormat::OffsetTable => offset_table::encode(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_order_is_the_documented_policy() {
        assert_eq!(
            CLASSIFY_ORDER,
            [
                CellFormat::Structured,
                CellFormat::FixedTable,
                CellFormat::OffsetTable,
            ]
        );
    }

    #[test]
    fn test_classify_rejects_junk() {
        assert_eq!(classify(&[]), None);
        assert_eq!(classify(&[0u8; 64]), None);
        assert_eq!(classify(&vec![0xEEu8; 1024]), None);
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0x1FF, 9), -1);
        assert_eq!(sign_extend(0x0FF, 9), 255);
        assert_eq!(sign_extend(0xFF, 8), -1);
        assert_eq!(sign_extend(0x7F, 8), 127);
    }

    #[test]
    fn test_compute_bounds() {
        let mut cell = Cell::default();
        assert_eq!(cell.compute_bounds(), None);
        // 8x8 object at (-2, 3): x = 0x1FE sign-extends to -2.
        cell.objects.push(RawObject([3, 0x1FE, 0]));
        let bounds = cell.compute_bounds().unwrap();
        assert_eq!(
            bounds,
            Bounds {
                min_x: -2,
                max_x: 6,
                min_y: 3,
                max_y: 11
            }
        );
    }
}
