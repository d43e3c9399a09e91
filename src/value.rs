//! The recursive value decoder: interprets section 4's bitstream against a
//! descriptor sequence, producing a nested value tree.

use std::rc::Rc;

use log::{log_enabled, trace, Level};

use crate::bitio::BitStream;
use crate::descriptor::{Descriptor, ElementDescriptor};
use crate::result::{Error, Result};

/// The decoded representation of a single element: either a number, text,
/// or the missing sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

/// The pre-decoded representation: an unsigned integer for numeric
/// elements, or hex text for textual elements.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Unsigned(u64),
    Hex(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BufrValue {
    pub raw_value: RawValue,
    pub value: Value,
    pub descriptor: ElementDescriptor,
}

/// A node in the decoded value tree: either a leaf or a list (the splice
/// target of a sequence, or the repeated blocks of a replication).
#[derive(Debug, Clone, PartialEq)]
pub enum ValueNode {
    Leaf(BufrValue),
    List(Vec<ValueNode>),
}

impl ValueNode {
    pub fn as_leaf(&self) -> Option<&BufrValue> {
        match self {
            ValueNode::Leaf(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ValueNode]> {
        match self {
            ValueNode::List(v) => Some(v),
            _ => None,
        }
    }
}

/// Decodes one element: reads `descriptor.length` bits, applying the
/// missing-value predicate and scale/reference transform.
pub fn decode_element(descriptor: &ElementDescriptor, bits: &mut BitStream) -> Result<BufrValue> {
    if descriptor.is_text() {
        let hex = bits.read_hex(usize::from(*descriptor.length()))?;
        let decoded = decode_hex_text(&hex)?;
        return Ok(BufrValue {
            raw_value: RawValue::Hex(hex),
            value: Value::Text(decoded),
            descriptor: descriptor.clone(),
        });
    }

    let raw = bits.read_uint(usize::from(*descriptor.length()))?;
    let value = if raw == descriptor.missing_raw() {
        Value::Missing
    } else {
        let scaled = 10f64.powi(-descriptor.scale()) * (raw as f64 + *descriptor.reference() as f64);
        Value::Number(scaled)
    };
    Ok(BufrValue {
        raw_value: RawValue::Unsigned(raw),
        value,
        descriptor: descriptor.clone(),
    })
}

/// Hex-to-bytes-to-ISO-8859-1 decode for textual elements, also used by
/// the JSON codec to re-decode a stored hex `val`.
pub fn decode_hex_text(hex: &str) -> Result<String> {
    hex_to_latin1(hex)
}

fn hex_to_latin1(hex: &str) -> Result<String> {
    if hex.len() % 2 != 0 {
        return Err(Error::Malformed(format!("odd-length hex text {hex:?}")));
    }
    let mut bytes = Vec::with_capacity(hex.len() / 2);
    let chars: Vec<char> = hex.chars().collect();
    for pair in chars.chunks(2) {
        let byte_str: String = pair.iter().collect();
        let byte = u8::from_str_radix(&byte_str, 16).map_err(|_| Error::Malformed(format!("invalid hex {hex:?}")))?;
        bytes.push(byte);
    }
    Ok(bytes.into_iter().map(char::from).collect())
}

/// Walks `descriptors` with a single forward cursor, producing the flat
/// value list for this level. Sequences splice their children in;
/// replications emit a single nested list node.
pub fn decode_sequence(descriptors: &[Rc<Descriptor>], bits: &mut BitStream) -> Result<Vec<ValueNode>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < descriptors.len() {
        match descriptors[i].as_ref() {
            Descriptor::Element(e) => {
                if log_enabled!(Level::Trace) {
                    trace!("decoding element {} at bit {}", e.code(), bits.pos());
                }
                out.push(ValueNode::Leaf(decode_element(e, bits)?));
                i += 1;
            }
            Descriptor::Sequence(s) => {
                let mut spliced = decode_sequence(s.children(), bits)?;
                out.append(&mut spliced);
                i += 1;
            }
            Descriptor::Replication(r) => {
                let mut cursor = i + 1;
                let count = if r.is_delayed() {
                    let count_descriptor =
                        descriptors
                            .get(cursor)
                            .ok_or_else(|| Error::Malformed(format!("delayed replication {} has no count descriptor", r.code())))?;
                    let count_value = match count_descriptor.as_ref() {
                        Descriptor::Element(e) => decode_element(e, bits)?,
                        _ => {
                            return Err(Error::Malformed(format!(
                                "delayed replication {} count descriptor must be an element",
                                r.code()
                            )))
                        }
                    };
                    cursor += 1;
                    count_as_usize(&count_value)?
                } else {
                    usize::from(*r.count())
                };

                let block_start = cursor;
                let block_end = block_start + usize::from(*r.fields());
                let block = descriptors.get(block_start..block_end).ok_or_else(|| {
                    Error::Malformed(format!(
                        "replication {} wants {} descriptors but only {} remain",
                        r.code(),
                        r.fields(),
                        descriptors.len().saturating_sub(block_start)
                    ))
                })?;

                let mut replicated = Vec::with_capacity(count);
                for _ in 0..count {
                    replicated.push(ValueNode::List(decode_sequence(block, bits)?));
                }
                out.push(ValueNode::List(replicated));
                i = block_end;
            }
            Descriptor::Operator(op) => {
                return Err(Error::OperatorNotImplemented(op.code().to_fxy_string()));
            }
        }
    }
    Ok(out)
}

fn count_as_usize(value: &BufrValue) -> Result<usize> {
    match value.value {
        Value::Number(n) if n >= 0.0 => Ok(n.round() as usize),
        _ => Err(Error::Malformed("delayed replication count must be a non-negative number".into())),
    }
}
