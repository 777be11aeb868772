//! Error types for schema building, decoding, validation and container bookkeeping

use thiserror::Error;

use crate::container::SectionId;

/// Errors raised while building the schema registry or resolving a description
#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    /// The schema document could not be parsed
    #[error("failed to parse schema: {0}")]
    Parse(String),

    /// A field used a structure type that was not declared above it
    #[error("structure {name} referenced before definition")]
    UndefinedStructure { name: String },

    /// Two structures share one name
    #[error("structure {name} declared twice")]
    DuplicateStructure { name: String },

    /// Lookup of a structure that the registry does not know
    #[error("unknown structure {0}")]
    UnknownStructure(String),

    /// Lookup of a revision the structure does not declare
    #[error("structure {name} has no version {version}")]
    UnknownVersion { name: String, version: u32 },

    /// Summed field sizes disagree with the declared revision size
    #[error(
        "size mismatch for {structure}V{version}: declared {declared} bytes, fields sum to {computed} bytes\n{layout}"
    )]
    SizeMismatch {
        structure: String,
        version: u32,
        declared: usize,
        computed: usize,
        layout: String,
    },

    /// A default/expected/mask literal that does not parse
    #[error("{structure}.{field}: invalid literal {literal:?}")]
    InvalidLiteral {
        structure: String,
        field: String,
        literal: String,
    },

    /// A `bytes` field without a `size` attribute
    #[error("{structure}.{field}: bytes fields need a size")]
    MissingSize { structure: String, field: String },
}

/// Errors raised while decoding bytes into records
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// A field constrained to a constant held something else
    #[error("{path}: expected {expected} but found {actual}")]
    UnexpectedValue {
        path: String,
        expected: String,
        actual: String,
    },

    /// Not enough bytes for the records being decoded
    #[error("{path}: need {needed} bytes at offset {offset} but only {available} are available")]
    BufferTooShort {
        path: String,
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// File too small to hold the header
    #[error("file too small to contain an M3 header")]
    TooSmall,

    /// Header tag that selects no known dialect
    #[error("unsupported header tag {0:?}")]
    UnknownHeaderTag(String),

    /// Index entry 0 is not the header structure
    #[error("first section is {found} but the header {expected} was expected")]
    MissingHeaderSection { expected: String, found: String },

    /// Index entry tag that is not printable ASCII
    #[error("index entry {index} has an invalid tag {tag:02x?}")]
    InvalidTag { index: usize, tag: [u8; 4] },

    /// A reference pointing outside the section list
    #[error("{site}: reference points at section {index} but only {len} sections exist")]
    DanglingReference {
        site: String,
        index: u32,
        len: usize,
    },
}

/// Errors raised when a value does not fit the field it is stored in
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("{path}: {value} is outside {min}..={max}")]
    OutOfRange {
        path: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("{path}: {value} is outside -1.0..=1.0")]
    Fixed8OutOfRange { path: String, value: f32 },

    #[error("{path}: expected {expected} bytes but got {actual}")]
    WrongLength {
        path: String,
        expected: usize,
        actual: usize,
    },

    #[error("{path}: expected {expected} value but got {actual}")]
    WrongType {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Nested record of a different structure or revision than the field declares
    #[error("{path}: expected a {expected} record but got {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("{path}: record holds {actual} values but its description has {expected} fields")]
    FieldCount {
        path: String,
        expected: usize,
        actual: usize,
    },

    #[error("{path}: no such field")]
    UnknownField { path: String },

    #[error("{path}: no bit named {bit}")]
    UnknownBit { path: String, bit: String },

    /// Text for a `CHAR` section that does not fit signed bytes
    #[error("{path}: {text:?} is not ASCII")]
    NotAscii { path: String, text: String },
}

/// Violations of section-list bookkeeping
#[derive(Debug, Clone, Error)]
pub enum ContainerError {
    /// A section is the target of more than one reference
    #[error("section {position} ({name}) is referenced by {owners} fields but may only have one owner")]
    MultipleOwners {
        position: usize,
        name: String,
        owners: usize,
    },

    /// One reference field registered on two sections
    #[error("reference {site} would be resolved to both section {first} and section {second}")]
    ReferenceResolvedTwice {
        site: String,
        first: usize,
        second: usize,
    },

    /// The write cursor drifted from the offset stored in the index
    #[error("section {position} ({tag}) written at offset {actual} but indexed at {expected}")]
    OffsetMismatch {
        position: usize,
        tag: String,
        expected: u64,
        actual: u64,
    },

    #[error("section position {position} is out of range (list has {len} sections)")]
    SectionOutOfRange { position: usize, len: usize },

    #[error("section {0} is not part of this list")]
    UnknownSection(SectionId),

    #[error("section {section} has no record {record}")]
    RecordOutOfRange { section: usize, record: usize },

    #[error("{path} is not a reference field")]
    NotAReference { path: String },

    /// Structure names written to the index must be four ASCII characters
    #[error("structure name {0:?} cannot be written as a section tag")]
    InvalidTag(String),

    #[error("the header does not reference a model")]
    MissingModel,

    #[error("the source file of this lazily loaded list has been closed")]
    SourceClosed,
}

/// Any failure raised by this crate
#[derive(Debug, Error)]
pub enum M3Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate
pub type Result<T, E = M3Error> = std::result::Result<T, E>;
