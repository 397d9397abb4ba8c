//! Catalog load, decode, and describe through the facade crate.

use asterix::{DecodeOptions, DescribeError, Framing, decode_buffer, describe, load_definitions};
use test_utils::{fixture_path, hex_bytes};

#[test]
fn load_decode_describe() {
    let definition = load_definitions(&[
        fixture_path("valid", "cat048.xml"),
        fixture_path("valid", "cat001_dual_uap.xml"),
    ])
    .unwrap();

    let buffer = hex_bytes("30 00 08 80 00 01 00 02");
    let options = DecodeOptions::default();
    let results: Vec<_> =
        decode_buffer(&definition, Framing::Raw, &buffer, 0, &options).collect();

    let records: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(records.len(), 1);
    let record = records[0];
    assert_eq!(record.category, 48);
    assert!(record.format_ok);
    assert_eq!(record.item("010").unwrap().field("SIC").unwrap().raw, 1);

    // Static lookups for emitters.
    let cat = describe(&definition, 48, None, None, None).unwrap();
    assert!(cat.contains("CAT048"));
    assert_eq!(
        describe(&definition, 48, Some("010"), None, None).unwrap(),
        "Data Source Identifier"
    );
    assert_eq!(
        describe(&definition, 48, Some("010"), Some("SAC"), None).unwrap(),
        "System Area Code"
    );
    assert_eq!(
        describe(&definition, 48, Some("020"), Some("TYP"), Some(5)).unwrap(),
        "Single ModeS Roll-Call"
    );
    assert_eq!(
        describe(&definition, 62, None, None, None),
        Err(DescribeError::NotFound)
    );
    assert_eq!(
        describe(&definition, 48, Some("999"), None, None),
        Err(DescribeError::NotFound)
    );
}

#[test]
fn definition_is_shareable_across_threads() {
    let definition = load_definitions(&[fixture_path("valid", "cat048.xml")]).unwrap();
    let buffer = hex_bytes("30 00 06 80 00 01");

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let options = DecodeOptions::default();
                let records: Vec<_> =
                    decode_buffer(&definition, Framing::Raw, &buffer, 0, &options)
                        .collect::<Result<_, _>>()
                        .unwrap();
                assert_eq!(records.len(), 1);
            });
        }
    });
}
