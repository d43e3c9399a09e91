//! Compact descriptor-indexed JSON envelope.
//!
//! `to_json`/`from_json` round-trip section 3's descriptor sequence and
//! section 4's value tree only; framing sections 0/1/2/5 are not part of
//! the envelope.

use std::collections::HashMap;
use std::rc::Rc;

use serde_json::{json, Value as Json};

use crate::descriptor::{Descriptor, ElementDescriptor, OperatorDescriptor, ReplicationDescriptor, SequenceDescriptor};
use crate::fxy::Fxy;
use crate::message::Message;
use crate::result::{Error, Result};
use crate::value::{BufrValue, RawValue, Value, ValueNode};

/// Serialises the message's resolved descriptor sequence and subset value
/// trees into the compact envelope.
///
/// A sequence descriptor's children are spliced flat into the value tree by
/// the decoder, so they never appear as top-level entries of `descriptors`.
/// The descriptor list emitted here is therefore built by walking
/// `descriptors` and recursively substituting a sequence's children for the
/// sequence itself, which is exactly the set of descriptors a leaf can
/// reference.
pub fn to_json(message: &Message, descriptors: &[Rc<Descriptor>]) -> Result<Json> {
    let mut flat = Vec::new();
    let mut index = HashMap::new();
    collect_leaf_descriptors(descriptors, &mut flat, &mut index);

    let descriptor_json: Vec<Json> = flat.iter().map(|d| descriptor_to_json(d)).collect();
    let data = message
        .subsets
        .iter()
        .map(|subset| nodes_to_json(subset, &index))
        .collect::<Result<Vec<Json>>>()?;
    Ok(json!({ "descriptors": descriptor_json, "data": data }))
}

/// Flattens `descriptors` into `flat`, expanding sequences into their
/// children in place, and records each entry's position in `index` keyed by
/// FXY code so leaves can look themselves up directly instead of scanning.
fn collect_leaf_descriptors(descriptors: &[Rc<Descriptor>], flat: &mut Vec<Rc<Descriptor>>, index: &mut HashMap<u16, usize>) {
    for d in descriptors {
        if let Descriptor::Sequence(s) = d.as_ref() {
            collect_leaf_descriptors(s.children(), flat, index);
            continue;
        }
        index.entry(d.code().code()).or_insert_with(|| {
            flat.push(d.clone());
            flat.len() - 1
        });
    }
}

fn descriptor_to_json(descriptor: &Descriptor) -> Json {
    match descriptor {
        Descriptor::Element(e) => json!([e.code().code(), e.length(), e.scale(), e.reference(), e.significance(), e.unit()]),
        Descriptor::Replication(r) => json!([r.code().code(), r.fields(), r.count()]),
        Descriptor::Operator(o) => json!([o.code().code(), o.operation(), o.operand()]),
        Descriptor::Sequence(s) => json!([s.code().code(), s.children().iter().map(|c| c.code().code()).collect::<Vec<_>>()]),
    }
}

fn nodes_to_json(nodes: &[ValueNode], index: &HashMap<u16, usize>) -> Result<Json> {
    let items = nodes.iter().map(|n| node_to_json(n, index)).collect::<Result<Vec<Json>>>()?;
    Ok(Json::Array(items))
}

fn node_to_json(node: &ValueNode, index: &HashMap<u16, usize>) -> Result<Json> {
    match node {
        ValueNode::Leaf(v) => {
            let code = v.descriptor.code().code();
            let idx = index
                .get(&code)
                .copied()
                .ok_or_else(|| Error::Malformed(format!("no descriptor entry for leaf code {}", v.descriptor.code())))?;
            Ok(json!({ "desc": idx, "val": raw_value_to_json(&v.raw_value) }))
        }
        ValueNode::List(items) => nodes_to_json(items, index),
    }
}

fn raw_value_to_json(raw: &RawValue) -> Json {
    match raw {
        RawValue::Unsigned(n) => json!(n),
        RawValue::Hex(s) => json!(s),
    }
}

/// Reconstructs a descriptor table (as a flat, ordered list) and a value
/// tree from the envelope produced by [`to_json`].
pub fn from_json(envelope: &Json) -> Result<(Vec<Descriptor>, Vec<Vec<ValueNode>>)> {
    let descriptors_json = envelope
        .get("descriptors")
        .and_then(Json::as_array)
        .ok_or_else(|| Error::Malformed("JSON envelope missing \"descriptors\" array".into()))?;
    let descriptors: Vec<Descriptor> = descriptors_json.iter().map(descriptor_from_json).collect::<Result<_>>()?;

    let data_json = envelope
        .get("data")
        .and_then(Json::as_array)
        .ok_or_else(|| Error::Malformed("JSON envelope missing \"data\" array".into()))?;
    let subsets = data_json
        .iter()
        .map(|subset| {
            subset
                .as_array()
                .ok_or_else(|| Error::Malformed("JSON envelope subset is not an array".into()))
                .and_then(|nodes| node_list_from_json(nodes, &descriptors))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((descriptors, subsets))
}

fn descriptor_from_json(value: &Json) -> Result<Descriptor> {
    let fields = value
        .as_array()
        .ok_or_else(|| Error::Malformed("descriptor entry is not an array".into()))?;
    let code = fields
        .first()
        .and_then(Json::as_u64)
        .ok_or_else(|| Error::Malformed("descriptor entry missing code".into()))?;
    let code = Fxy::from_code(code as u16);

    match code.f() {
        0 => {
            let length = json_u64(fields, 1)? as u16;
            let scale = json_i64(fields, 2)? as i32;
            let reference = json_i64(fields, 3)?;
            let significance = json_str(fields, 4)?;
            let unit = json_str(fields, 5)?;
            Ok(Descriptor::Element(ElementDescriptor::new(code, length, scale, reference, significance, unit)))
        }
        1 => {
            let fields_count = json_u64(fields, 1)? as u8;
            let count = json_u64(fields, 2)? as u8;
            Ok(Descriptor::Replication(ReplicationDescriptor::new(code, fields_count, count)))
        }
        2 => {
            let operation = json_u64(fields, 1)? as u8;
            let operand = json_u64(fields, 2)? as u8;
            Ok(Descriptor::Operator(OperatorDescriptor::new(code, operation, operand)))
        }
        3 => Ok(Descriptor::Sequence(SequenceDescriptor::new(code, Vec::new()))),
        class => Err(Error::InvalidDescriptorClass { class, fxy: code.to_fxy_string() }),
    }
}

fn json_u64(fields: &[Json], idx: usize) -> Result<u64> {
    fields
        .get(idx)
        .and_then(Json::as_u64)
        .ok_or_else(|| Error::Malformed(format!("descriptor entry missing numeric field {idx}")))
}

fn json_i64(fields: &[Json], idx: usize) -> Result<i64> {
    fields
        .get(idx)
        .and_then(Json::as_i64)
        .ok_or_else(|| Error::Malformed(format!("descriptor entry missing signed field {idx}")))
}

fn json_str(fields: &[Json], idx: usize) -> Result<String> {
    fields
        .get(idx)
        .and_then(Json::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::Malformed(format!("descriptor entry missing text field {idx}")))
}

fn node_list_from_json(nodes: &[Json], descriptors: &[Descriptor]) -> Result<Vec<ValueNode>> {
    nodes.iter().map(|n| node_from_json(n, descriptors)).collect()
}

fn node_from_json(node: &Json, descriptors: &[Descriptor]) -> Result<ValueNode> {
    if let Some(arr) = node.as_array() {
        return Ok(ValueNode::List(node_list_from_json(arr, descriptors)?));
    }
    let idx = node
        .get("desc")
        .and_then(Json::as_u64)
        .ok_or_else(|| Error::Malformed("leaf missing \"desc\" index".into()))? as usize;
    let descriptor = descriptors
        .get(idx)
        .and_then(|d| match d {
            Descriptor::Element(e) => Some(e),
            _ => None,
        })
        .ok_or_else(|| Error::Malformed(format!("leaf references non-element descriptor at index {idx}")))?;

    let val = node.get("val").ok_or_else(|| Error::Malformed("leaf missing \"val\"".into()))?;
    let (raw_value, value) = if descriptor.is_text() {
        let hex = val.as_str().ok_or_else(|| Error::Malformed("textual leaf \"val\" is not a string".into()))?.to_string();
        let decoded = crate::value::decode_hex_text(&hex)?;
        (RawValue::Hex(hex), Value::Text(decoded))
    } else {
        let raw = val.as_u64().ok_or_else(|| Error::Malformed("numeric leaf \"val\" is not a number".into()))?;
        let value = if raw == descriptor.missing_raw() {
            Value::Missing
        } else {
            Value::Number(10f64.powi(-descriptor.scale()) * (raw as f64 + *descriptor.reference() as f64))
        };
        (RawValue::Unsigned(raw), value)
    };

    Ok(ValueNode::Leaf(BufrValue {
        raw_value,
        value,
        descriptor: descriptor.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitio::BitStream;
    use crate::table::DescriptorTable;

    #[test]
    fn round_trips_a_flat_subset() {
        let mut table = DescriptorTable::new();
        let code = Fxy::new(0, 1, 1);
        table.insert_element(ElementDescriptor::new(code, 8, 0, 0, "A".into(), "NUMERIC".into()));
        let descriptors = table.resolve(&[code]).unwrap();

        let data = [42u8];
        let mut bits = BitStream::new(&data);
        let subset = crate::value::decode_sequence(&descriptors, &mut bits).unwrap();

        let message = Message {
            section0: crate::sections::Section0 { total_length: 0, edition: 4 },
            section1: crate::sections::Section1::Edition4 {
                master_table_id: 0,
                centre: 0,
                subcentre: 0,
                update_sequence: 0,
                optional_section: 0,
                data_category: 0,
                data_subcategory: 0,
                local_subcategory: 0,
                master_version: 0,
                local_version: 0,
                year: 0,
                month: 0,
                day: 0,
                hour: 0,
                minute: 0,
                second: 0,
            },
            section2: None,
            n_subsets: 1,
            flags: 0,
            descriptor_codes: vec![code],
            subsets: vec![subset],
        };

        let envelope = to_json(&message, &descriptors).unwrap();
        let (restored_descriptors, restored_subsets) = from_json(&envelope).unwrap();
        assert_eq!(restored_descriptors.len(), 1);
        assert_eq!(restored_subsets.len(), 1);
        assert_eq!(restored_subsets[0], message.subsets[0]);
    }

    #[test]
    fn round_trips_a_subset_containing_a_spliced_sequence() {
        let a = Fxy::new(0, 1, 1);
        let b = Fxy::new(0, 1, 2);
        let mut table = DescriptorTable::new();
        table.insert_element(ElementDescriptor::new(a, 8, 0, 0, "A".into(), "NUMERIC".into()));
        table.insert_element(ElementDescriptor::new(b, 8, 0, 0, "B".into(), "NUMERIC".into()));
        let seq_code = Fxy::new(3, 1, 1);
        table.define_sequence(seq_code, vec![a, b]);
        let descriptors = table.resolve(&[seq_code]).unwrap();

        let data = [11u8, 22u8];
        let mut bits = BitStream::new(&data);
        let subset = crate::value::decode_sequence(&descriptors, &mut bits).unwrap();
        assert_eq!(subset.len(), 2, "sequence children splice flat into the subset");

        let message = Message {
            section0: crate::sections::Section0 { total_length: 0, edition: 4 },
            section1: crate::sections::Section1::Edition4 {
                master_table_id: 0,
                centre: 0,
                subcentre: 0,
                update_sequence: 0,
                optional_section: 0,
                data_category: 0,
                data_subcategory: 0,
                local_subcategory: 0,
                master_version: 0,
                local_version: 0,
                year: 0,
                month: 0,
                day: 0,
                hour: 0,
                minute: 0,
                second: 0,
            },
            section2: None,
            n_subsets: 1,
            flags: 0,
            descriptor_codes: vec![seq_code],
            subsets: vec![subset],
        };

        let envelope = to_json(&message, &descriptors).unwrap();
        let (restored_descriptors, restored_subsets) = from_json(&envelope).unwrap();
        assert_eq!(restored_descriptors.len(), 2);
        assert_eq!(restored_subsets[0], message.subsets[0]);
    }
}
