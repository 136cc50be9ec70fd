//! Error types for k2geoip.

use thiserror::Error;

use crate::cidr::CidrBlock;
use crate::record::MetadataRecord;

/// Error type for k2geoip operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Address range could not be validated
    #[error(transparent)]
    Range(#[from] RangeError),

    /// Required column absent from the table header
    #[error("missing required field in table header: {0}")]
    MissingField(String),

    /// A table row failed validation
    #[error("row at line {line} ({start_ip} - {end_ip}): {source}")]
    Row {
        line: u64,
        start_ip: String,
        end_ip: String,
        #[source]
        source: RangeError,
    },

    /// The database sink rejected an insertion
    #[error("failed to insert {block} ({record}): {source}")]
    Sink {
        block: CidrBlock,
        record: MetadataRecord,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The database could not be serialized
    #[error("failed to write database: {0}")]
    Write(#[from] SinkError),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Error reading back a generated database
    #[error("database error: {0}")]
    Database(#[from] maxminddb::MaxMindDBError),
}

/// Result type alias for k2geoip operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for address parsing and range validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    /// Text is not a valid IPv4 or IPv6 literal
    #[error("malformed address: {0:?}")]
    MalformedAddress(String),

    /// Start and end belong to different address families
    #[error("address family mismatch: {start} and {end}")]
    FamilyMismatch { start: String, end: String },

    /// Start address is greater than end address
    #[error("inverted range: {start} > {end}")]
    InvertedRange { start: String, end: String },
}

/// Error type for CIDR block construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CidrError {
    /// Invalid CIDR notation
    #[error("invalid CIDR notation: {0}")]
    InvalidCidr(String),

    /// Prefix length larger than the address width
    #[error("prefix length {prefix_len} exceeds {bits}-bit address")]
    PrefixTooLong { prefix_len: u8, bits: u32 },

    /// Network address has host bits set
    #[error("{0} has host bits set")]
    Misaligned(String),
}

/// Error type for the MMDB writer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// IPv6 network inserted into an IPv4-only tree
    #[error("cannot insert IPv6 network into an IPv4 database")]
    Ipv6InIpv4Tree,

    /// A tree record does not fit into the configured record size
    #[error("record value {value} exceeds {record_size}-bit record size")]
    RecordOverflow { value: u64, record_size: u16 },

    /// IPv6 network overlaps a network aliased to the IPv4 subtree
    #[error("cannot insert {network}: overlaps {alias}, which is aliased to IPv4")]
    AliasedNetwork { network: String, alias: String },

    /// Value too large to encode in the data section
    #[error("data section value too large: {0} bytes")]
    ValueTooLarge(usize),
}
