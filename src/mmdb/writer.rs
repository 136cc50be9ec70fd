//! MMDB file writer.

use std::collections::BTreeMap;
use std::io::Write;

use super::encoder::{DataSection, Value};
use super::format::*;
use super::tree::SearchTree;
use crate::cidr::CidrBlock;
use crate::error::SinkError;
use crate::pipeline::BlockSink;
use crate::record::MetadataRecord;
use crate::Result;

/// Database-level options written into the metadata section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmdbOptions {
    /// `database_type` metadata string
    pub database_type: String,
    /// Description per language
    pub description: BTreeMap<String, String>,
    /// Languages of the `names` maps; the first one is used for records
    pub languages: Vec<String>,
    pub record_size: RecordSize,
    pub ip_version: IpVersion,
    /// Alias `::ffff:0:0/96`, `2001::/32` and `2002::/16` to the IPv4
    /// subtree; IPv6 blocks inside them are rejected
    pub ipv4_aliasing: bool,
    /// Fixed build timestamp; current time when `None`
    pub build_epoch: Option<u64>,
}

impl Default for MmdbOptions {
    fn default() -> Self {
        Self {
            database_type: "ipinfo country.mmdb".to_string(),
            description: BTreeMap::from([(
                "en".to_string(),
                "ipinfo country.mmdb".to_string(),
            )]),
            languages: vec!["en".to_string()],
            record_size: RecordSize::Bits24,
            ip_version: IpVersion::V6,
            ipv4_aliasing: true,
            build_epoch: None,
        }
    }
}

impl MmdbOptions {
    /// Language used for the record `names` maps.
    pub fn name_language(&self) -> &str {
        self.languages.first().map(String::as_str).unwrap_or("en")
    }
}

/// Builds a MaxMind DB from (block, record) insertions.
///
/// # Examples
/// ```
/// use k2geoip::mmdb::{MmdbOptions, MmdbWriter};
/// use k2geoip::{BlockSink, MetadataRecord};
///
/// let mut writer = MmdbWriter::new(MmdbOptions::default());
/// let record = MetadataRecord::new("EU", "Europe", "DE", "Germany");
/// writer.insert(&"192.0.2.0/24".parse().unwrap(), &record).unwrap();
/// let bytes = writer.write().unwrap();
/// assert!(!bytes.is_empty());
/// ```
pub struct MmdbWriter {
    options: MmdbOptions,
    tree: SearchTree,
    data: DataSection,
    inserted: usize,
}

impl MmdbWriter {
    /// Create a new writer.
    pub fn new(options: MmdbOptions) -> Self {
        Self {
            tree: if options.ipv4_aliasing {
                SearchTree::with_ipv4_aliases(options.ip_version)
            } else {
                SearchTree::new(options.ip_version)
            },
            data: DataSection::new(),
            inserted: 0,
            options,
        }
    }

    pub fn options(&self) -> &MmdbOptions {
        &self.options
    }

    /// Number of blocks inserted so far.
    pub fn inserted(&self) -> usize {
        self.inserted
    }

    /// Number of distinct records in the data section.
    pub fn record_count(&self) -> usize {
        self.data.value_count()
    }

    /// Insert an already encoded value for `block`.
    pub fn insert_value(&mut self, block: &CidrBlock, value: &Value) -> std::result::Result<(), SinkError> {
        let offset = self.data.insert(value)?;
        self.tree.insert(block, offset)?;
        self.inserted += 1;
        Ok(())
    }

    /// Serialize the database.
    pub fn write(&self) -> std::result::Result<Vec<u8>, SinkError> {
        let mut tree = self.tree.clone();
        if self.options.ipv4_aliasing {
            tree.alias_ipv4();
        }
        let (tree_bytes, node_count) = tree.serialize(self.options.record_size)?;

        let mut buffer = Vec::with_capacity(
            tree_bytes.len() + DATA_SECTION_SEPARATOR_SIZE + self.data.len() + 512,
        );

        // Search tree
        buffer.extend_from_slice(&tree_bytes);

        // Data section
        buffer.resize(buffer.len() + DATA_SECTION_SEPARATOR_SIZE, 0);
        buffer.extend_from_slice(self.data.as_bytes());

        // Metadata
        buffer.extend_from_slice(METADATA_MARKER);
        self.metadata(node_count).encode(&mut buffer)?;

        log::debug!(
            "Serialized database: {} nodes, {} data bytes, {} total bytes",
            node_count,
            self.data.len(),
            buffer.len()
        );

        Ok(buffer)
    }

    /// Serialize the database into `out`, returning the number of bytes written.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<usize> {
        let bytes = self.write()?;
        out.write_all(&bytes)?;
        Ok(bytes.len())
    }

    fn metadata(&self, node_count: u32) -> Value {
        let build_epoch = self.options.build_epoch.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs()
        });

        let description = self
            .options
            .description
            .iter()
            .map(|(lang, text)| (lang.clone(), Value::from(text.as_str())))
            .collect();

        let languages = self
            .options
            .languages
            .iter()
            .map(|lang| Value::from(lang.as_str()))
            .collect();

        Value::Map(vec![
            (
                "binary_format_major_version".to_string(),
                Value::Uint16(FORMAT_MAJOR_VERSION),
            ),
            (
                "binary_format_minor_version".to_string(),
                Value::Uint16(FORMAT_MINOR_VERSION),
            ),
            ("build_epoch".to_string(), Value::Uint64(build_epoch)),
            (
                "database_type".to_string(),
                Value::from(self.options.database_type.as_str()),
            ),
            ("description".to_string(), Value::Map(description)),
            (
                "ip_version".to_string(),
                Value::Uint16(self.options.ip_version.as_u16()),
            ),
            ("languages".to_string(), Value::Array(languages)),
            ("node_count".to_string(), Value::Uint32(node_count)),
            (
                "record_size".to_string(),
                Value::Uint16(self.options.record_size.bits()),
            ),
        ])
    }
}

impl Default for MmdbWriter {
    fn default() -> Self {
        Self::new(MmdbOptions::default())
    }
}

impl BlockSink for MmdbWriter {
    type Error = SinkError;

    fn insert(&mut self, block: &CidrBlock, record: &MetadataRecord) -> std::result::Result<(), SinkError> {
        let value = record.to_value(self.options.name_language());
        self.insert_value(block, &value)
    }
}
