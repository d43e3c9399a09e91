use thiserror::Error;

pub type Result<A, E = Error> = std::result::Result<A, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    IoFailed(#[from] std::io::Error),
    #[error("unexpected end of stream")]
    EndOfStream,
    #[error("bad magic: expected \"BUFR\", got {0:?}")]
    BadMagic(Vec<u8>),
    #[error("unsupported edition {0}")]
    UnsupportedEdition(u8),
    #[error("master table id must be 0, got {0}")]
    InvalidMasterTable(u8),
    #[error("invalid end token: expected \"7777\", got {0:?}")]
    InvalidEndToken(String),
    #[error("section 3 descriptor {position} does not match template: expected {expected}, got {actual}")]
    TemplateMismatch {
        position: usize,
        expected: String,
        actual: String,
    },
    #[error("invalid descriptor class {class} for B-table entry {fxy}")]
    InvalidDescriptorClass { class: u8, fxy: String },
    #[error("sequence descriptor {0} found in B-table")]
    SequenceInBTable(String),
    #[error("unknown descriptor {0}")]
    UnknownDescriptor(String),
    #[error("operator descriptor {0} not implemented")]
    OperatorNotImplemented(String),
    #[error("unknown descriptor variant encountered at {0}")]
    UnknownDescriptorVariant(String),
    #[error("cyclic descriptor graph detected at {0}")]
    CyclicDescriptorGraph(String),
    #[error("invalid FXY string {0:?}")]
    InvalidFxy(String),
    #[error("JSON error: {0}")]
    JsonFailed(#[from] serde_json::Error),
    #[error("{0}")]
    Malformed(String),
}
