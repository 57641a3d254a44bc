//! A blob assembled by hand: a root declaring `compatible = "acme,board"` and a single
//! `uart@1000` child with `phandle = <0x5>` and `reg = <0x1000 0x100>`.

use dtb_parser::{fdt::MAX_DEPTH, DtbParser, Error, FdtError, PropertyValue};

fn words(out: &mut Vec<u8>, words: &[u32]) {
    for w in words {
        out.extend_from_slice(&w.to_be_bytes());
    }
}

fn wrap(structure: &[u8], strings: &[u8]) -> Vec<u8> {
    let off_dt_struct = 40 + 16;
    let off_dt_strings = off_dt_struct + structure.len();
    let total_size = off_dt_strings + strings.len();

    let mut blob = Vec::new();
    words(
        &mut blob,
        &[
            0xd00d_feed,
            total_size as u32,
            off_dt_struct as u32,
            off_dt_strings as u32,
            40,
            17,
            16,
            0,
            strings.len() as u32,
            structure.len() as u32,
            0,
            0,
            0,
            0,
        ],
    );
    blob.extend_from_slice(structure);
    blob.extend_from_slice(strings);
    blob
}

fn minimal_blob() -> Vec<u8> {
    // compatible @ 0, phandle @ 11, reg @ 19
    let strings = b"compatible\0phandle\0reg\0".to_vec();

    let mut structure = Vec::new();
    words(&mut structure, &[1, 0]);
    words(&mut structure, &[3, 11, 0]);
    structure.extend_from_slice(b"acme,board\0\0");
    words(&mut structure, &[1]);
    structure.extend_from_slice(b"uart@1000\0\0\0");
    words(&mut structure, &[3, 4, 11, 0x5]);
    words(&mut structure, &[3, 8, 19, 0x1000, 0x100]);
    words(&mut structure, &[2, 2, 9]);

    wrap(&structure, &strings)
}

#[test]
fn minimal_board() {
    let dtb = DtbParser::from_bytes(&minimal_blob()).unwrap();

    let root = dtb.root();
    assert_eq!(root.children.len(), 1);

    let uart = &root.children[0];
    assert_eq!(uart.name, "uart@1000");
    assert_eq!(uart.path, "/uart@1000");
    assert_eq!(uart.properties.len(), 2);
    assert!(matches!(
        uart.properties.get("reg"),
        Some(PropertyValue::StrList(_))
    ));
    assert!(matches!(
        uart.properties.get("phandle"),
        Some(PropertyValue::Str(_))
    ));

    assert_eq!(dtb.resolve_phandle(5), Some("/uart@1000"));
    assert_eq!(dtb.resolve_phandle(6), None);

    let records = dtb.traverse();
    assert_eq!(records[0].children[0].address.as_deref(), Some("1000"));

    assert_eq!(dtb.compatible_strings(), ["acme,board"]);
}

#[test]
fn root_without_compatible() {
    let mut blob = minimal_blob();

    // Rename the root property so that `compatible` is no longer found
    let strings = blob.len() - 23;
    blob[strings..strings + 10].copy_from_slice(b"compatibl_");

    let dtb = DtbParser::from_bytes(&blob).unwrap();
    assert!(dtb.compatible_strings().is_empty());
    assert_eq!(
        dtb.root().properties.get("compatibl_"),
        Some(&PropertyValue::Str("acme,board".into()))
    );
}

/// `depth` nested nodes named `n`, each level holding a `depth` cell.
fn nested_blob(depth: usize) -> Vec<u8> {
    let mut structure = Vec::new();
    words(&mut structure, &[1, 0]);
    for level in 1..depth {
        words(&mut structure, &[3, 4, 0, level as u32]);
        words(&mut structure, &[1]);
        structure.extend_from_slice(b"n\0\0\0");
    }
    for _ in 0..depth {
        words(&mut structure, &[2]);
    }
    words(&mut structure, &[9]);

    wrap(&structure, b"depth\0")
}

#[test]
fn deepest_accepted_tree() {
    let dtb = DtbParser::from_bytes(&nested_blob(MAX_DEPTH)).unwrap();

    let records = dtb.traverse();
    let mut record = &records[0];
    while let Some(child) = record.children.first() {
        record = child;
    }
    assert_eq!(record.path.matches('/').count(), MAX_DEPTH - 1);
    assert_eq!(dtb.root(), dtb.clone().root());
}

#[test]
fn reject_deeply_nested_tree() {
    for depth in [MAX_DEPTH + 1, 200_000] {
        let err = DtbParser::from_bytes(&nested_blob(depth)).unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FdtError::TooDeep(_, MAX_DEPTH))
        ));
    }
}
