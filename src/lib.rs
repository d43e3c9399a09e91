//! Decoder for WMO FM 94 BUFR meteorological observation messages
//! (editions 3 and 4): framing sections, descriptor-driven bitstream
//! decoding, table/template loading, and a compact JSON envelope.

pub mod bitio;
pub mod descriptor;
pub mod fxy;
pub mod json;
pub mod message;
pub mod result;
pub mod scan;
pub mod sections;
pub mod table;
pub mod tables;
pub mod value;

pub use descriptor::Descriptor;
pub use fxy::Fxy;
pub use message::{decode, Message, Resolver};
pub use result::{Error, Result};
pub use scan::scan_messages;
pub use table::DescriptorTable;
pub use tables::{load_b_table, load_d_table, load_safnwc_template, Template};
