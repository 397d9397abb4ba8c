//! End-to-end framing pipelines: each sublayer feeding the record decoder.

use asterix_core::crc16_x25;
use asterix_decode::{DecodeError, DecodeOptions, Framing, FramingError, decode_buffer};
use asterix_spec::{Definition, load_definitions};
use test_utils::{fixture_path, hex_bytes};

fn definition() -> Definition {
    load_definitions(&[
        fixture_path("valid", "cat048.xml"),
        fixture_path("valid", "cat001_dual_uap.xml"),
    ])
    .unwrap()
}

/// One CAT001 plot block: FRN 1 only.
fn cat001_block() -> Vec<u8> {
    hex_bytes("01 00 05 80 20")
}

/// One CAT048 block with I048/010 = SAC 0 / SIC `sic`.
fn cat048_block(sic: u8) -> Vec<u8> {
    let mut block = hex_bytes("30 00 06 80 00");
    block.push(sic);
    block
}

/// Builds a single-packet Ethernet/IPv4/UDP capture around `payload`.
fn pcap_capture(payload: &[u8], ts_sec: u32, ts_usec: u32) -> Vec<u8> {
    let udp_len = 8 + payload.len();
    let ip_len = 20 + udp_len;
    let packet_len = 14 + ip_len;

    let mut out = Vec::new();
    out.extend_from_slice(&[0xA1, 0xB2, 0xC3, 0xD4]);
    out.extend_from_slice(&2u16.to_be_bytes());
    out.extend_from_slice(&4u16.to_be_bytes());
    out.extend_from_slice(&[0; 8]);
    out.extend_from_slice(&65535u32.to_be_bytes());
    out.extend_from_slice(&1u32.to_be_bytes()); // Ethernet

    out.extend_from_slice(&ts_sec.to_be_bytes());
    out.extend_from_slice(&ts_usec.to_be_bytes());
    out.extend_from_slice(&(packet_len as u32).to_be_bytes());
    out.extend_from_slice(&(packet_len as u32).to_be_bytes());

    out.extend_from_slice(&[0u8; 12]);
    out.extend_from_slice(&0x0800u16.to_be_bytes());

    out.push(0x45);
    out.push(0);
    out.extend_from_slice(&(ip_len as u16).to_be_bytes());
    out.extend_from_slice(&[0; 5]);
    out.push(17); // UDP
    out.extend_from_slice(&[0; 2]); // checksum not validated
    out.extend_from_slice(&[10, 0, 0, 1]);
    out.extend_from_slice(&[10, 0, 0, 2]);

    out.extend_from_slice(&8600u16.to_be_bytes());
    out.extend_from_slice(&8600u16.to_be_bytes());
    out.extend_from_slice(&(udp_len as u16).to_be_bytes());
    out.extend_from_slice(&[0; 2]);
    out.extend_from_slice(payload);
    out
}

#[test]
fn pcap_to_raw_pipeline() {
    let def = definition();
    // Three concatenated CAT001 blocks inside one UDP datagram.
    let mut payload = Vec::new();
    for _ in 0..3 {
        payload.extend_from_slice(&cat001_block());
    }
    let capture = pcap_capture(&payload, 100, 250);

    let results: Vec<_> =
        decode_buffer(&def, Framing::Pcap, &capture, 0, &DecodeOptions::default()).collect();

    let records: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(records.len(), 3);
    for record in &records {
        assert_eq!(record.category, 1);
        assert!(record.format_ok);
        // The capture timestamp rides along to every record.
        assert_eq!(record.timestamp_us, 100_000_250);
    }
}

#[test]
fn hdlc_frame_to_record() {
    let def = definition();
    let block = cat048_block(7);

    let fcs = crc16_x25(&block);
    let mut clear = block.clone();
    clear.extend_from_slice(&fcs.to_le_bytes());
    let mut stream = vec![0x7E];
    for b in clear {
        match b {
            0x7E => stream.extend_from_slice(&[0x7D, 0x5E]),
            0x7D => stream.extend_from_slice(&[0x7D, 0x5D]),
            other => stream.push(other),
        }
    }
    stream.push(0x7E);

    let results: Vec<_> =
        decode_buffer(&def, Framing::Hdlc, &stream, 0, &DecodeOptions::default()).collect();
    let records: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].item("010").unwrap().field("SIC").unwrap().raw, 7);
}

#[test]
fn hdlc_corrupt_frame_reported_then_next_recovered() {
    let def = definition();

    let frame = |block: &[u8]| {
        let fcs = crc16_x25(block);
        let mut clear = block.to_vec();
        clear.extend_from_slice(&fcs.to_le_bytes());
        let mut out = vec![0x7E];
        for b in clear {
            match b {
                0x7E => out.extend_from_slice(&[0x7D, 0x5E]),
                0x7D => out.extend_from_slice(&[0x7D, 0x5D]),
                other => out.push(other),
            }
        }
        out.push(0x7E);
        out
    };

    let mut stream = frame(&cat048_block(1));
    stream[2] ^= 0x01; // corrupt one payload byte
    stream.extend_from_slice(&frame(&cat048_block(2)));

    let results: Vec<_> =
        decode_buffer(&def, Framing::Hdlc, &stream, 0, &DecodeOptions::default()).collect();

    assert!(results.iter().any(|r| matches!(
        r,
        Err(DecodeError::Framing(FramingError::CrcMismatch { .. }))
    )));
    let records: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].item("010").unwrap().field("SIC").unwrap().raw, 2);
}

#[test]
fn final_frames_to_records() {
    let def = definition();

    let final_frame = |payload: &[u8]| {
        let sum: u16 = payload
            .iter()
            .fold(0u16, |s, &b| s.wrapping_add(b as u16));
        let mut out = Vec::new();
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        out.extend_from_slice(payload);
        out.extend_from_slice(&sum.to_be_bytes());
        out
    };

    let mut stream = final_frame(&cat048_block(1));
    stream.extend_from_slice(&final_frame(&cat048_block(2)));

    let results: Vec<_> =
        decode_buffer(&def, Framing::Final, &stream, 0, &DecodeOptions::default()).collect();
    let records: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].item("010").unwrap().field("SIC").unwrap().raw, 2);
}

#[test]
fn final_checksum_mismatch_drops_only_that_frame() {
    let def = definition();

    let block = cat048_block(1);
    let mut stream = Vec::new();
    stream.extend_from_slice(&(block.len() as u16).to_be_bytes());
    stream.extend_from_slice(&block);
    stream.extend_from_slice(&0xBEEFu16.to_be_bytes()); // wrong sum

    let good = cat048_block(2);
    let sum: u16 = good.iter().fold(0u16, |s, &b| s.wrapping_add(b as u16));
    stream.extend_from_slice(&(good.len() as u16).to_be_bytes());
    stream.extend_from_slice(&good);
    stream.extend_from_slice(&sum.to_be_bytes());

    let results: Vec<_> =
        decode_buffer(&def, Framing::Final, &stream, 0, &DecodeOptions::default()).collect();

    assert!(results.iter().any(|r| matches!(
        r,
        Err(DecodeError::Framing(FramingError::ChecksumMismatch { .. }))
    )));
    let records: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].item("010").unwrap().field("SIC").unwrap().raw, 2);
}

#[test]
fn gps_timestamp_reaches_records() {
    let def = definition();

    let gps_packet = |ts: u64, payload: &[u8]| {
        let mut out = Vec::new();
        out.extend_from_slice(&ts.to_be_bytes());
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        out.extend_from_slice(payload);
        out
    };

    let mut stream = gps_packet(1_700_000_000_000_000, &cat048_block(1));
    stream.extend_from_slice(&gps_packet(1_700_000_000_250_000, &cat048_block(2)));

    let results: Vec<_> =
        decode_buffer(&def, Framing::Gps, &stream, 0, &DecodeOptions::default()).collect();
    let records: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].timestamp_us, 1_700_000_000_000_000);
    assert_eq!(records[1].timestamp_us, 1_700_000_000_250_000);
}

#[test]
fn oradis_header_is_stripped_before_block_parse() {
    let def = definition();

    let oradis_frame = |seq: u8, payload: &[u8]| {
        let mut out = vec![0xA5, seq];
        out.extend_from_slice(&((payload.len() + 4) as u16).to_be_bytes());
        out.extend_from_slice(payload);
        out
    };

    let mut stream = oradis_frame(1, &cat048_block(1));
    stream.extend_from_slice(&oradis_frame(2, &cat048_block(2)));

    let results: Vec<_> =
        decode_buffer(&def, Framing::Oradis, &stream, 0, &DecodeOptions::default()).collect();
    let records: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].item("010").unwrap().field("SIC").unwrap().raw, 1);
    assert_eq!(records[1].item("010").unwrap().field("SIC").unwrap().raw, 2);
}
