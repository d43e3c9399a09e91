//! Top-level message assembly: sections 0-5 plus the resolved descriptor
//! sequence and decoded value tree.

use std::io::Read;
use std::rc::Rc;

use log::{debug, trace};

use crate::bitio::{BitStream, ByteStream};
use crate::descriptor::Descriptor;
use crate::fxy::Fxy;
use crate::result::Result;
use crate::sections::{
    self, read_section0, read_section1, read_section2, read_section3, read_section4_payload, read_section5,
    Section0, Section1,
};
use crate::table::DescriptorTable;
use crate::tables::Template;
use crate::value::{decode_sequence, ValueNode};

/// How section 3's descriptor codes are turned into resolved descriptors:
/// either looked up individually in a table, or validated pointwise
/// against a known template.
pub enum Resolver<'a> {
    Table(&'a DescriptorTable),
    Template(&'a DescriptorTable, &'a Template),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub section0: Section0,
    pub section1: Section1,
    pub section2: Option<Vec<u8>>,
    pub n_subsets: u16,
    pub flags: u8,
    pub descriptor_codes: Vec<Fxy>,
    pub subsets: Vec<Vec<ValueNodeOwned>>,
}

/// `ValueNode` without the `Rc<Descriptor>`-backed intermediate state,
/// stored directly on the message so it owns its tree independent of the
/// table that produced it.
pub type ValueNodeOwned = ValueNode;

impl Message {
    pub fn subset_count(&self) -> usize {
        self.subsets.len()
    }

    pub fn descriptor_codes(&self) -> &[Fxy] {
        &self.descriptor_codes
    }
}

/// Decodes one full message from `reader` using `resolver` to turn section
/// 3's descriptor codes into resolved descriptors.
pub fn decode<R: Read>(reader: R, resolver: Resolver) -> Result<Message> {
    let mut stream = ByteStream::new(reader);

    let section0 = read_section0(&mut stream)?;
    trace!("section 0: edition {}, total length {}", section0.edition, section0.total_length);
    let section1 = read_section1(&mut stream, section0.edition)?;

    let section2 = if section1.optional_section() != 0 {
        Some(read_section2(&mut stream)?)
    } else {
        None
    };

    let section3 = read_section3(&mut stream)?;
    debug!("section 3: {} subsets, {} descriptors", section3.n_subsets, section3.descriptor_codes.len());

    let descriptors: Vec<Rc<Descriptor>> = match resolver {
        Resolver::Table(table) => table.resolve(&section3.descriptor_codes)?,
        Resolver::Template(table, template) => {
            sections::validate_against_template(&section3.descriptor_codes, &template.descriptors)?;
            table.resolve(&section3.descriptor_codes)?
        }
    };

    let payload = read_section4_payload(&mut stream)?;
    let mut bits = BitStream::new(&payload);
    let mut subsets = Vec::with_capacity(usize::from(section3.n_subsets));
    for subset in 0..section3.n_subsets {
        trace!("decoding subset {subset}/{}", section3.n_subsets);
        subsets.push(decode_sequence(&descriptors, &mut bits)?);
    }

    read_section5(&mut stream)?;

    Ok(Message {
        section0,
        section1,
        section2,
        n_subsets: section3.n_subsets,
        flags: section3.flags,
        descriptor_codes: section3.descriptor_codes,
        subsets,
    })
}
