//! The descriptor model: a tagged union over element / replication / operator
//! / sequence descriptors.

use std::rc::Rc;

use derive_getters::Getters;

use crate::fxy::Fxy;

#[derive(Debug, Clone)]
pub enum Descriptor {
    Element(ElementDescriptor),
    Replication(ReplicationDescriptor),
    Operator(OperatorDescriptor),
    Sequence(SequenceDescriptor),
}

impl Descriptor {
    pub fn code(&self) -> Fxy {
        match self {
            Descriptor::Element(d) => d.code,
            Descriptor::Replication(d) => d.code,
            Descriptor::Operator(d) => d.code,
            Descriptor::Sequence(d) => d.code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct ElementDescriptor {
    pub(crate) code: Fxy,
    length: u16,
    scale: i32,
    reference: i64,
    significance: String,
    unit: String,
}

impl ElementDescriptor {
    pub fn new(code: Fxy, length: u16, scale: i32, reference: i64, significance: String, unit: String) -> Self {
        Self {
            code,
            length,
            scale,
            reference,
            significance,
            unit,
        }
    }

    /// `CCITTIA5` marks textual encoding; everything else is numeric.
    pub fn is_text(&self) -> bool {
        self.unit == "CCITTIA5"
    }

    /// The raw bit pattern meaning "missing": all ones at `length` bits.
    pub fn missing_raw(&self) -> u64 {
        if self.length >= 64 {
            u64::MAX
        } else {
            (1u64 << self.length) - 1
        }
    }
}

/// Replication descriptor: the next `fields` descriptors repeat `count`
/// times, or `count == 0` means the repeat count is read from the stream
/// (delayed replication).
#[derive(Debug, Clone, Copy, Getters)]
pub struct ReplicationDescriptor {
    pub(crate) code: Fxy,
    fields: u8,
    count: u8,
}

impl ReplicationDescriptor {
    pub fn new(code: Fxy, fields: u8, count: u8) -> Self {
        Self { code, fields, count }
    }

    pub fn is_delayed(&self) -> bool {
        self.count == 0
    }
}

/// Recognised but never executed: decoding one is always an error.
#[derive(Debug, Clone, Copy, Getters)]
pub struct OperatorDescriptor {
    pub(crate) code: Fxy,
    operation: u8,
    operand: u8,
}

impl OperatorDescriptor {
    pub fn new(code: Fxy, operation: u8, operand: u8) -> Self {
        Self {
            code,
            operation,
            operand,
        }
    }
}

/// A named, fixed-order tuple of child descriptors, resolved once at
/// table-load time into an owned DAG.
#[derive(Debug, Clone, Getters)]
pub struct SequenceDescriptor {
    pub(crate) code: Fxy,
    children: Vec<Rc<Descriptor>>,
}

impl SequenceDescriptor {
    pub fn new(code: Fxy, children: Vec<Rc<Descriptor>>) -> Self {
        Self { code, children }
    }

    /// Total bit length, recursively summing children's lengths. Replication
    /// and delayed-count descriptors have no static length and are skipped.
    pub fn static_bit_length(&self) -> Option<u32> {
        let mut total = 0u32;
        for child in &self.children {
            total += match child.as_ref() {
                Descriptor::Element(e) => u32::from(*e.length()),
                Descriptor::Sequence(s) => s.static_bit_length()?,
                Descriptor::Replication(_) | Descriptor::Operator(_) => return None,
            };
        }
        Some(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_raw_for_common_widths() {
        let e = ElementDescriptor::new(Fxy::new(0, 1, 1), 7, 0, 0, "WMO BLOCK NUMBER".into(), "NUMERIC".into());
        assert_eq!(e.missing_raw(), 127);
        let e16 = ElementDescriptor::new(Fxy::new(0, 7, 4), 16, 0, -400, "HEIGHT".into(), "M".into());
        assert_eq!(e16.missing_raw(), 65535);
    }

    #[test]
    fn text_unit_detection() {
        let e = ElementDescriptor::new(Fxy::new(0, 1, 19), 64, 0, 0, "LONG STATION NAME".into(), "CCITTIA5".into());
        assert!(e.is_text());
        let e2 = ElementDescriptor::new(Fxy::new(0, 1, 1), 7, 0, 0, "WMO BLOCK NUMBER".into(), "NUMERIC".into());
        assert!(!e2.is_text());
    }

    #[test]
    fn static_bit_length_sums_children() {
        let a = Rc::new(Descriptor::Element(ElementDescriptor::new(
            Fxy::new(0, 1, 1),
            7,
            0,
            0,
            "A".into(),
            "NUMERIC".into(),
        )));
        let b = Rc::new(Descriptor::Element(ElementDescriptor::new(
            Fxy::new(0, 1, 2),
            9,
            0,
            0,
            "B".into(),
            "NUMERIC".into(),
        )));
        let seq = SequenceDescriptor::new(Fxy::new(3, 1, 1), vec![a, b]);
        assert_eq!(seq.static_bit_length(), Some(16));
    }

    #[test]
    fn static_bit_length_none_with_replication() {
        let rep = Rc::new(Descriptor::Replication(ReplicationDescriptor::new(Fxy::new(1, 1, 0), 1, 0)));
        let seq = SequenceDescriptor::new(Fxy::new(3, 1, 1), vec![rep]);
        assert_eq!(seq.static_bit_length(), None);
    }
}
