//! Fixed-layout framing sections 0-3 and 5.
//!
//! Each section reads its own 3-byte length first (section 0 and 5 are the
//! fixed-size exceptions), consumes the fields the edition defines, then
//! absorbs whatever padding remains up to the declared length. The layouts
//! vary by edition and carry trailing padding that no derive macro captures
//! cleanly, so they are read directly off `ByteStream`, field by field.

use crate::bitio::ByteStream;
use crate::fxy::Fxy;
use crate::result::{Error, Result};
use std::io::Read;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section0 {
    pub total_length: u32,
    pub edition: u8,
}

pub fn read_section0<R: Read>(stream: &mut ByteStream<R>) -> Result<Section0> {
    let magic = stream.read_bytes(4)?;
    if magic != b"BUFR" {
        return Err(Error::BadMagic(magic));
    }
    let total_length = stream.read_uint(3)?;
    let edition = stream.read_bytes(1)?[0];
    if edition != 3 && edition != 4 {
        return Err(Error::UnsupportedEdition(edition));
    }
    Ok(Section0 { total_length, edition })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section1 {
    Edition3 {
        master_table_id: u8,
        subcentre: u8,
        centre: u8,
        update_sequence: u8,
        optional_section: u8,
        data_category: u8,
        data_subcategory: u8,
        master_version: u8,
        local_version: u8,
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
    },
    Edition4 {
        master_table_id: u8,
        centre: u16,
        subcentre: u16,
        update_sequence: u8,
        optional_section: u8,
        data_category: u8,
        data_subcategory: u8,
        local_subcategory: u8,
        master_version: u8,
        local_version: u8,
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    },
}

impl Section1 {
    pub fn optional_section(&self) -> u8 {
        match self {
            Section1::Edition3 { optional_section, .. } => *optional_section,
            Section1::Edition4 { optional_section, .. } => *optional_section,
        }
    }
}

pub fn read_section1<R: Read>(stream: &mut ByteStream<R>, edition: u8) -> Result<Section1> {
    let length = stream.read_uint(3)?;
    let master_table_id = stream.read_bytes(1)?[0];
    if master_table_id != 0 {
        return Err(Error::InvalidMasterTable(master_table_id));
    }

    let section = if edition == 3 {
        // Edition 3 lays the subcentre byte before the centre byte on the
        // wire; each is read into its own correctly named field, not swapped.
        let subcentre = stream.read_bytes(1)?[0];
        let centre = stream.read_bytes(1)?[0];
        let update_sequence = stream.read_bytes(1)?[0];
        let optional_section = stream.read_bytes(1)?[0];
        let data_category = stream.read_bytes(1)?[0];
        let data_subcategory = stream.read_bytes(1)?[0];
        let master_version = stream.read_bytes(1)?[0];
        let local_version = stream.read_bytes(1)?[0];
        let year = 1900 + u16::from(stream.read_bytes(1)?[0]);
        let month = stream.read_bytes(1)?[0];
        let day = stream.read_bytes(1)?[0];
        let hour = stream.read_bytes(1)?[0];
        let minute = stream.read_bytes(1)?[0];
        Section1::Edition3 {
            master_table_id,
            subcentre,
            centre,
            update_sequence,
            optional_section,
            data_category,
            data_subcategory,
            master_version,
            local_version,
            year,
            month,
            day,
            hour,
            minute,
        }
    } else {
        let centre = stream.read_uint(2)? as u16;
        let subcentre = stream.read_uint(2)? as u16;
        let update_sequence = stream.read_bytes(1)?[0];
        let optional_section = stream.read_bytes(1)?[0];
        let data_category = stream.read_bytes(1)?[0];
        let data_subcategory = stream.read_bytes(1)?[0];
        let local_subcategory = stream.read_bytes(1)?[0];
        let master_version = stream.read_bytes(1)?[0];
        let local_version = stream.read_bytes(1)?[0];
        let year = stream.read_uint(2)? as u16;
        let month = stream.read_bytes(1)?[0];
        let day = stream.read_bytes(1)?[0];
        let hour = stream.read_bytes(1)?[0];
        let minute = stream.read_bytes(1)?[0];
        let second = stream.read_bytes(1)?[0];
        Section1::Edition4 {
            master_table_id,
            centre,
            subcentre,
            update_sequence,
            optional_section,
            data_category,
            data_subcategory,
            local_subcategory,
            master_version,
            local_version,
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    };

    let consumed = if edition == 3 { 17 } else { 22 };
    let pad = usize::try_from(length).unwrap_or(0).saturating_sub(consumed);
    if pad > 0 {
        stream.read_bytes(pad)?;
    }
    Ok(section)
}

pub fn read_section2<R: Read>(stream: &mut ByteStream<R>) -> Result<Vec<u8>> {
    let length = stream.read_uint(3)?;
    let remaining = usize::try_from(length).unwrap_or(0).saturating_sub(3);
    stream.read_bytes(remaining)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section3 {
    pub n_subsets: u16,
    pub flags: u8,
    pub descriptor_codes: Vec<Fxy>,
}

/// Reads section 3's header and 2-byte descriptor codes. Template
/// validation (pointwise match against a known sequence) is left to the
/// caller, who has both this and the resolved template in hand.
pub fn read_section3<R: Read>(stream: &mut ByteStream<R>) -> Result<Section3> {
    let length = stream.read_uint(3)?;
    stream.read_bytes(1)?; // reserved
    let n_subsets = stream.read_uint(2)? as u16;
    let flags = stream.read_bytes(1)?[0];

    let descriptor_count = (usize::try_from(length).unwrap_or(0).saturating_sub(7)) / 2;
    let mut descriptor_codes = Vec::with_capacity(descriptor_count);
    for _ in 0..descriptor_count {
        let code = stream.read_uint(2)? as u16;
        descriptor_codes.push(Fxy::from_code(code));
    }

    let consumed = 7 + descriptor_count * 2;
    if usize::try_from(length).unwrap_or(0) > consumed {
        stream.read_bytes(1)?; // odd trailing pad byte
    }
    Ok(Section3 { n_subsets, flags, descriptor_codes })
}

/// Reads section 4's length and pad byte, returning the raw payload bytes
/// ready to be handed to a `BitStream`.
pub fn read_section4_payload<R: Read>(stream: &mut ByteStream<R>) -> Result<Vec<u8>> {
    let length = stream.read_uint(3)?;
    stream.read_bytes(1)?; // reserved/pad
    let remaining = usize::try_from(length).unwrap_or(0).saturating_sub(4);
    stream.read_bytes(remaining)
}

pub fn read_section5<R: Read>(stream: &mut ByteStream<R>) -> Result<()> {
    let token = stream.read_bytes(4)?;
    if token != b"7777" {
        let text = token.iter().map(|&b| char::from(b)).collect::<String>();
        return Err(Error::InvalidEndToken(text));
    }
    Ok(())
}

pub fn validate_against_template(codes: &[Fxy], template: &[Fxy]) -> Result<()> {
    if codes.len() != template.len() {
        return Err(Error::TemplateMismatch {
            position: codes.len().min(template.len()),
            expected: format!("{} descriptors", template.len()),
            actual: format!("{} descriptors", codes.len()),
        });
    }
    for (i, (actual, expected)) in codes.iter().zip(template.iter()).enumerate() {
        if actual != expected {
            return Err(Error::TemplateMismatch {
                position: i,
                expected: expected.to_fxy_string(),
                actual: actual.to_fxy_string(),
            });
        }
    }
    Ok(())
}
