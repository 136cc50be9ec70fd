//! K2GeoIP - Build MaxMind DB GeoIP databases from IP range tables.
//!
//! Country tables are usually published as inclusive address ranges
//! (`start_ip,end_ip,...`), while MMDB search trees are keyed by CIDR
//! networks. This crate converts between the two: every range is split
//! into the minimal list of aligned CIDR blocks covering it exactly, and
//! every block is inserted into the database with the row's metadata.
//!
//! # Features
//!
//! - **Range validation**: IPv4 and IPv6 literals, family and order checks
//! - **Minimal CIDR decomposition**: Lazy, allocation-free block iterator
//! - **CSV ingestion**: Header-driven column lookup, optional gzip input
//! - **MMDB writer**: 24/28/32-bit records, IPv4 aliasing, deduplicated data
//!
//! # Quick Start
//!
//! ```
//! use k2geoip::validate;
//!
//! let range = validate("10.0.0.1", "10.0.0.10")?;
//! let blocks: Vec<String> = range.blocks().map(|b| b.to_string()).collect();
//! assert_eq!(
//!     blocks,
//!     ["10.0.0.1/32", "10.0.0.2/31", "10.0.0.4/30", "10.0.0.8/31", "10.0.0.10/32"]
//! );
//! # Ok::<(), k2geoip::RangeError>(())
//! ```
//!
//! # Building a Database
//!
//! ```
//! use k2geoip::mmdb::{MmdbOptions, MmdbWriter};
//! use k2geoip::{Pipeline, TableReader};
//!
//! let csv = "start_ip,end_ip,country,country_name,continent,continent_name\n\
//!            1.0.0.0,1.0.0.255,AU,Australia,OC,Oceania\n";
//!
//! let table = TableReader::from_reader(csv.as_bytes())?;
//! let mut writer = MmdbWriter::new(MmdbOptions::default());
//! let stats = Pipeline::default().run(table.rows(), &mut writer)?;
//! assert_eq!(stats.blocks, 1);
//!
//! let bytes = writer.write()?;
//! assert!(!bytes.is_empty());
//! # Ok::<(), k2geoip::Error>(())
//! ```

mod error;

pub mod address;
pub mod cidr;
pub mod config;
pub mod mmdb;
pub mod pipeline;
pub mod range;
pub mod record;
pub mod table;

pub use address::{Address, Family};
pub use cidr::{decompose, Blocks, CidrBlock};
pub use config::GeneratorConfig;
pub use error::{CidrError, Error, RangeError, Result, SinkError};
pub use pipeline::{BlockSink, DatasetRow, ErrorPolicy, IngestStats, Pipeline, RawRow};
pub use range::{validate, AddressRange};
pub use record::MetadataRecord;
pub use table::TableReader;
