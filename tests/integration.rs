use std::io::Cursor;

use anyhow::Result;
use assert_matches::assert_matches;
use bufr_decode::descriptor::ElementDescriptor;
use bufr_decode::fxy::Fxy;
use bufr_decode::json::to_json;
use bufr_decode::table::DescriptorTable;
use bufr_decode::{decode, Resolver};

fn station_table() -> DescriptorTable {
    let mut table = DescriptorTable::new();
    table.insert_element(ElementDescriptor::new(
        Fxy::new(0, 1, 1),
        7,
        0,
        0,
        "WMO BLOCK NUMBER".into(),
        "NUMERIC".into(),
    ));
    table.insert_element(ElementDescriptor::new(
        Fxy::new(0, 1, 2),
        10,
        0,
        0,
        "WMO STATION NUMBER".into(),
        "NUMERIC".into(),
    ));
    table
}

fn write_dummy_message(descriptors: &[Fxy], n_subsets: u16, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"BUFR");
    bytes.extend_from_slice(&[0, 0, 0]);
    bytes.push(4);

    bytes.extend_from_slice(&[0, 0, 22]);
    bytes.push(0); // master_table_id
    bytes.extend_from_slice(&[0, 98]); // centre
    bytes.extend_from_slice(&[0, 0]); // subcentre
    bytes.push(1); // update_sequence
    bytes.push(0); // optional_section
    bytes.push(0); // data_category
    bytes.push(0); // data_subcategory
    bytes.push(0); // local_subcategory
    bytes.push(13); // master_version
    bytes.push(1); // local_version
    bytes.extend_from_slice(&[0, 107]); // year 2007
    bytes.push(7); // month
    bytes.push(26); // day
    bytes.push(19); // hour
    bytes.push(55); // minute
    bytes.push(0); // second

    let sec3_len = 7 + descriptors.len() * 2;
    bytes.extend_from_slice(&(sec3_len as u32).to_be_bytes()[1..]);
    bytes.push(0); // reserved
    bytes.extend_from_slice(&n_subsets.to_be_bytes());
    bytes.push(0); // flags
    for d in descriptors {
        let code = d.code();
        bytes.push((code >> 8) as u8);
        bytes.push((code & 0xff) as u8);
    }

    let sec4_len = 4 + payload.len();
    bytes.extend_from_slice(&(sec4_len as u32).to_be_bytes()[1..]);
    bytes.push(0);
    bytes.extend_from_slice(payload);

    bytes.extend_from_slice(b"7777");
    bytes
}

#[test]
fn decodes_a_single_subset_station_report() -> Result<()> {
    let _ = env_logger::try_init();

    let table = station_table();
    let descriptors = vec![Fxy::new(0, 1, 1), Fxy::new(0, 1, 2)];
    // 7 bits block number (12) + 10 bits station number (345), byte aligned: 17 bits -> 3 bytes
    // 12 = 0001100, 345 = 0101011001 -> 0001100 0101011001 -> pad to 24 bits
    let bits = "0001100_0101011001_0000000".replace('_', "");
    assert_eq!(bits.len(), 24);
    let mut payload = Vec::new();
    for chunk in bits.as_bytes().chunks(8) {
        let s: String = chunk.iter().map(|&b| b as char).collect();
        payload.push(u8::from_str_radix(&s, 2)?);
    }

    let bytes = write_dummy_message(&descriptors, 1, &payload);
    let message = decode(Cursor::new(bytes), Resolver::Table(&table))?;

    assert_eq!(message.section0.edition, 4);
    assert_eq!(message.subset_count(), 1);
    let subset = &message.subsets[0];
    assert_eq!(subset.len(), 2);
    let block = subset[0].as_leaf().unwrap();
    assert_matches!(block.value, bufr_decode::value::Value::Number(n) if n == 12.0);
    let station = subset[1].as_leaf().unwrap();
    assert_matches!(station.value, bufr_decode::value::Value::Number(n) if n == 345.0);
    Ok(())
}

#[test]
fn multiple_subsets_produce_parallel_blocks() {
    let table = station_table();
    let descriptors = vec![Fxy::new(0, 1, 1)];
    // three subsets, each one 7-bit block number, byte-padded individually is
    // not how BUFR packs bits: they are packed back-to-back across subsets.
    // 3 subsets * 7 bits = 21 bits -> 3 bytes.
    let payload = [0b0000001_0, 0b000001_00, 0b0000011_0];
    let bytes = write_dummy_message(&descriptors, 3, &payload);
    let message = decode(Cursor::new(bytes), Resolver::Table(&table)).unwrap();
    assert_eq!(message.subset_count(), 3);
    for subset in &message.subsets {
        assert_eq!(subset.len(), 1);
    }
}

#[test]
fn json_envelope_round_trips_descriptors_and_values() {
    let table = station_table();
    let descriptors = vec![Fxy::new(0, 1, 1)];
    let payload = [0b0001100_0];
    let bytes = write_dummy_message(&descriptors, 1, &payload);
    let message = decode(Cursor::new(bytes), Resolver::Table(&table)).unwrap();
    let resolved = table.resolve(&descriptors).unwrap();

    let envelope = to_json(&message, &resolved).unwrap();
    let (restored_descriptors, restored_subsets) = bufr_decode::json::from_json(&envelope).unwrap();
    assert_eq!(restored_descriptors.len(), 1);
    assert_eq!(restored_subsets, message.subsets);
}

#[test]
fn wrong_end_token_is_reported() {
    let table = station_table();
    let descriptors = vec![Fxy::new(0, 1, 1)];
    let mut bytes = write_dummy_message(&descriptors, 1, &[0u8]);
    let len = bytes.len();
    bytes[len - 4..].copy_from_slice(b"8888");
    let err = decode(Cursor::new(bytes), Resolver::Table(&table)).unwrap_err();
    assert_matches!(err, bufr_decode::Error::InvalidEndToken(_));
}

#[test]
fn bulk_scan_finds_both_messages_despite_padding() {
    let table = station_table();
    let descriptors = vec![Fxy::new(0, 1, 1)];
    let message_bytes = write_dummy_message(&descriptors, 1, &[0u8]);

    let mut data = Vec::new();
    data.extend_from_slice(b"garbage-prefix-not-a-marker");
    data.extend_from_slice(&message_bytes);
    data.extend_from_slice(b"\0\0\0padding-between-messages");
    data.extend_from_slice(&message_bytes);

    let (messages, errors) = bufr_decode::scan_messages(&data, Resolver::Table(&table));
    assert_eq!(messages.len(), 2);
    assert!(errors.is_empty());
}
