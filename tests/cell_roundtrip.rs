//! End-to-end cell bank codec properties

use tilebank::cell::{self, classify, Cell, CellBank, CellFormat, VramTransfer};
use tilebank::models::MappingMode;
use tilebank::oam::{object_dimensions, RawObject, Transform};

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Hand-built fixed-stride table: two cells, one and two objects.
fn build_fixed_table() -> Vec<u8> {
    let mut out = Vec::new();
    push_u32(&mut out, 2);
    push_u32(&mut out, 8); // cell 0 at 4 + 8
    push_u32(&mut out, 8 + 12); // cell 1 after cell 0's 12 bytes

    push_u16(&mut out, 1);
    for word in [0x4010u16, 0x0008, 0x0002, 0x0008, 0x0010] {
        push_u16(&mut out, word);
    }

    push_u16(&mut out, 2);
    for word in [0u16, 0, 0, 0, 0] {
        push_u16(&mut out, word);
    }
    for word in [0x0004u16, 0x01F0, 0x0001, -16i16 as u16, 0x0004] {
        push_u16(&mut out, word);
    }
    out
}

#[test]
fn fixed_table_decode_encode_is_byte_exact() {
    let bytes = build_fixed_table();
    assert_eq!(classify(&bytes), Some(CellFormat::FixedTable));

    let bank = cell::decode(&bytes).unwrap();
    assert_eq!(bank.cells().len(), 2);
    assert_eq!(bank.cells()[0].objects.len(), 1);
    assert_eq!(bank.cells()[1].objects.len(), 2);
    // Stored positions restate the attribute fields, sign-extended; the
    // second object of cell 1 sits at x = -16 (0x1F0 in 9 bits).
    let obj = bank.cells()[1].object(1).unwrap();
    assert_eq!(obj.x, 0x1F0);
    assert_eq!(obj.y, 4);

    assert_eq!(bank.encode().unwrap(), bytes);
}

/// Hand-built halfword-offset table: two cells.
fn build_offset_table() -> Vec<u8> {
    let mut out = Vec::new();
    push_u16(&mut out, 2); // count, and cell 0 at halfword 2
    push_u16(&mut out, 6); // cell 1 at byte 12
    push_u16(&mut out, 1);
    for word in [0x0005u16, 0x0006, 0x0007] {
        push_u16(&mut out, word);
    }
    push_u16(&mut out, 1);
    for word in [0x0008u16, 0x0009, 0x000A] {
        push_u16(&mut out, word);
    }
    out
}

#[test]
fn offset_table_decode_encode_is_byte_exact() {
    let bytes = build_offset_table();
    assert_eq!(classify(&bytes), Some(CellFormat::OffsetTable));

    let bank = cell::decode(&bytes).unwrap();
    assert_eq!(bank.cells().len(), 2);
    assert_eq!(bank.mapping(), MappingMode::OneD128K);
    assert_eq!(bank.cells()[0].objects[0], RawObject([5, 6, 7]));

    assert_eq!(bank.encode().unwrap(), bytes);
}

#[test]
fn structured_bank_full_roundtrip() {
    let mut bank = CellBank::new(CellFormat::Structured);
    bank.set_mapping(MappingMode::OneD256K);
    bank.set_bank_attributes(1);
    bank.cells_mut().push(Cell {
        objects: vec![RawObject([0x0100, 0x0600, 0x0003])],
        attributes: 2,
        bounds: Some(tilebank::cell::Bounds {
            min_x: -8,
            max_x: 8,
            min_y: -8,
            max_y: 8,
        }),
    });
    bank.set_transfers(Some(vec![VramTransfer {
        src_offset: 0x200,
        size: 0x100,
    }]));
    bank.set_label(Some(b"hero\0".to_vec()));
    bank.set_extension(Some(vec![1, 2, 3, 4]));

    let bytes = bank.encode().unwrap();
    assert_eq!(classify(&bytes), Some(CellFormat::Structured));

    let decoded = cell::decode(&bytes).unwrap();
    assert_eq!(decoded.cells(), bank.cells());
    assert_eq!(decoded.mapping(), MappingMode::OneD256K);
    assert_eq!(decoded.bank_attributes(), 1);
    assert_eq!(decoded.label(), Some(&b"hero\0"[..]));
    assert_eq!(decoded.extension(), Some(&[1u8, 2, 3, 4][..]));
    assert_eq!(decoded.transfers(), bank.transfers());

    assert_eq!(decoded.encode().unwrap(), bytes);
}

#[test]
fn classify_rejects_short_and_zero_buffers() {
    assert_eq!(classify(&[]), None);
    assert_eq!(classify(&[0u8]), None);
    for size in [16usize, 64, 1024] {
        assert_eq!(classify(&vec![0u8; size]), None, "size {size}");
    }
}

#[test]
fn object_dimension_table_spot_checks() {
    // The two entries the size table is most often transcribed wrong on.
    assert_eq!(object_dimensions(1, 2), (32, 8));
    assert_eq!(object_dimensions(2, 0), (8, 16));
}

#[test]
fn affine_flag_flips_field_interpretation() {
    // Identical words except the affine bit: the flip/disable reading must
    // vanish in favor of the matrix slot.
    let plain = RawObject([0x0000, 0x3000, 0]).decode();
    assert_eq!(
        plain.transform,
        Transform::Flip {
            h: true,
            v: true,
            disable: false
        }
    );

    let affine = RawObject([0x0100, 0x3000, 0]).decode();
    match affine.transform {
        Transform::Affine {
            double_size,
            matrix,
        } => {
            assert!(!double_size);
            assert_eq!(matrix, 0x18);
        }
        other => panic!("expected affine transform, got {other:?}"),
    }
}
