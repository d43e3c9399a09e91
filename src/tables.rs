//! Table and template loaders: parse B-table and D-table text files, or a
//! SAFNWC template file, into descriptor collections.
//!
//! File opening and line tokenization are left to the caller; these loaders
//! consume anything that implements `BufRead`.

use std::io::BufRead;

use log::{debug, trace};

use crate::descriptor::{ElementDescriptor, OperatorDescriptor};
use crate::fxy::Fxy;
use crate::result::{Error, Result};
use crate::table::DescriptorTable;

/// Parses a libbufr-format B-table into `table`. A class-3 (sequence) line
/// is rejected; sequences belong in the D-table.
pub fn load_b_table<R: BufRead>(reader: R, table: &mut DescriptorTable) -> Result<()> {
    let mut count = 0usize;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        parse_b_table_line(&line, table)?;
        count += 1;
    }
    debug!("loaded B-table: {count} lines, {} elements", table.element_count());
    Ok(())
}

/// Column widths of a libbufr B-table line, in order: separator, FXY,
/// separator, significance, separator, unit, separator, scale, separator,
/// reference, separator, bit width.
const B_TABLE_COLUMNS: [usize; 12] = [1, 6, 1, 64, 1, 24, 1, 3, 1, 12, 1, 3];

fn parse_b_table_line(line: &str, table: &mut DescriptorTable) -> Result<()> {
    let fields = slice_columns(line, &B_TABLE_COLUMNS);
    let fxy_str = fields[1].trim();
    let significance = fields[3].trim().to_string();
    let unit = fields[5].trim().to_string();
    let scale: i32 = fields[7].trim().parse().map_err(|_| Error::Malformed(format!("bad scale in {line:?}")))?;
    let reference: i64 = fields[9].trim().parse().map_err(|_| Error::Malformed(format!("bad reference in {line:?}")))?;
    let length: u16 = fields[11].trim().parse().map_err(|_| Error::Malformed(format!("bad bit width in {line:?}")))?;

    let code = Fxy::parse(fxy_str)?;
    match code.f() {
        0 => table.insert_element(ElementDescriptor::new(code, length, scale, reference, significance, unit)),
        1 => {
            // Real B-tables do not list replication entries; synthesised on
            // lookup regardless, so accepting one here is harmless.
            trace!("B-table line for replication code {code} ignored (synthesised on lookup)");
        }
        2 => table.insert_operator(OperatorDescriptor::new(code, code.x(), code.y())),
        3 => return Err(Error::SequenceInBTable(fxy_str.to_string())),
        class => return Err(Error::InvalidDescriptorClass { class, fxy: fxy_str.to_string() }),
    }
    Ok(())
}

fn slice_columns<'a>(line: &'a str, widths: &[usize]) -> Vec<&'a str> {
    let bytes = line.as_bytes();
    let mut out = Vec::with_capacity(widths.len());
    let mut pos = 0usize;
    for &w in widths {
        let end = (pos + w).min(bytes.len());
        let start = pos.min(bytes.len());
        out.push(std::str::from_utf8(&bytes[start..end]).unwrap_or(""));
        pos += w;
    }
    out
}

/// Parses a libbufr-format D-table into `table`: each line is a sequence
/// code followed by one of its child codes; consecutive lines sharing a
/// leading code belong to the same sequence.
pub fn load_d_table<R: BufRead>(reader: R, table: &mut DescriptorTable) -> Result<()> {
    let mut current: Option<(Fxy, Vec<Fxy>)> = None;
    let mut count = 0usize;
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let seq_token = tokens.next().ok_or_else(|| Error::Malformed(format!("empty D-table line {line:?}")))?;
        let child_token = tokens.next().ok_or_else(|| Error::Malformed(format!("D-table line missing child {line:?}")))?;
        let seq_code = Fxy::parse(seq_token)?;
        let child_code = Fxy::parse(child_token)?;

        match &mut current {
            Some((code, children)) if *code == seq_code => children.push(child_code),
            _ => {
                if let Some((code, children)) = current.take() {
                    table.define_sequence(code, children);
                    count += 1;
                }
                current = Some((seq_code, vec![child_code]));
            }
        }
    }
    if let Some((code, children)) = current.take() {
        table.define_sequence(code, children);
        count += 1;
    }
    debug!("loaded D-table: {count} sequences, {} total", table.sequence_count());
    Ok(())
}

/// A named, ordered sequence of descriptors that section 3 of a message is
/// validated against pointwise.
#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub descriptors: Vec<Fxy>,
}

/// Parses a SAFNWC template file. Lines starting with `#` or `/*` are
/// comments; `NUM` lines are whitespace-separated metadata used to derive
/// the template name; class-3 lines are silently skipped, contributing
/// nothing to the descriptor list, with their constituents assumed to
/// follow directly as ordinary data lines; everything else is a
/// fixed-column data line.
pub fn load_safnwc_template<R: BufRead>(reader: R, table: &mut DescriptorTable) -> Result<Template> {
    let mut metadata = std::collections::HashMap::new();
    let mut descriptors = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.starts_with('#') || line.starts_with("/*") {
            continue;
        }
        if line.starts_with("NUM") {
            let mut parts = line.split_whitespace();
            if let (Some(key), Some(value)) = (parts.next(), parts.next()) {
                metadata.insert(key.to_string(), value.to_string());
            }
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        let fields = safnwc_columns(&line);
        let fxy_str = fields[1].trim();
        if fxy_str.is_empty() {
            continue;
        }
        let code = Fxy::parse(fxy_str)?;
        if code.f() == 3 {
            trace!("SAFNWC template: class-3 line for {code} skipped, constituents follow directly");
            continue;
        }

        let scale: i32 = fields[2].trim().parse().map_err(|_| Error::Malformed(format!("bad scale in {line:?}")))?;
        let reference: i64 = fields[3].trim().parse().map_err(|_| Error::Malformed(format!("bad reference in {line:?}")))?;
        let length: u16 = fields[4].trim().parse().map_err(|_| Error::Malformed(format!("bad bit width in {line:?}")))?;
        let unit = fields[5].trim().to_string();
        let significance = fields[6].trim().to_string();

        match code.f() {
            0 => table.insert_element(ElementDescriptor::new(code, length, scale, reference, significance, unit)),
            2 => table.insert_operator(OperatorDescriptor::new(code, code.x(), code.y())),
            class => return Err(Error::InvalidDescriptorClass { class, fxy: fxy_str.to_string() }),
        }
        descriptors.push(code);
    }

    let name = template_name(&metadata)?;
    debug!("loaded SAFNWC template {name}: {} descriptors", descriptors.len());
    Ok(Template { name, descriptors })
}

/// Column slices of a SAFNWC data line: num, FXY, scale, reference, bit
/// width, unit, significance.
fn safnwc_columns(line: &str) -> Vec<&str> {
    const BOUNDS: [(usize, usize); 7] = [
        (0, 8),
        (8, 14),
        (14, 23),
        (23, 33),
        (33, 47),
        (47, 65),
        (65, usize::MAX),
    ];
    let bytes = line.as_bytes();
    BOUNDS
        .iter()
        .map(|&(start, end)| {
            let start = start.min(bytes.len());
            let end = end.min(bytes.len());
            std::str::from_utf8(&bytes[start..end]).unwrap_or("")
        })
        .collect()
}

fn template_name(metadata: &std::collections::HashMap<String, String>) -> Result<String> {
    let centre = metadata_u32(metadata, "NUM_ORIGINATING_CENTRE")?;
    let main = metadata_u32(metadata, "NUM_BUFR_MAIN_TABLE")?;
    let local = metadata_u32(metadata, "NUM_BUFR_LOCAL_TABLES")?;
    Ok(format!("B0000000000{centre:03}{main:03}{local:03}.TXT"))
}

fn metadata_u32(metadata: &std::collections::HashMap<String, String>, key: &str) -> Result<u32> {
    metadata
        .get(key)
        .ok_or_else(|| Error::Malformed(format!("SAFNWC template missing metadata {key}")))?
        .trim()
        .parse()
        .map_err(|_| Error::Malformed(format!("SAFNWC template metadata {key} is not a number")))
}
