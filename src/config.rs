//! Generator configuration.
//!
//! All fields are optional in the YAML file:
//!
//! ```yaml
//! database_type: ipinfo country.mmdb
//! description:
//!   en: ipinfo country.mmdb
//! languages: [en]
//! record_size: 24
//! ip_version: 6
//! ipv4_aliasing: true
//! skip_invalid_rows: false
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::mmdb::{IpVersion, MmdbOptions, RecordSize};
use crate::pipeline::ErrorPolicy;

/// Configuration for one database build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// `database_type` metadata string
    pub database_type: String,
    /// Description per language
    pub description: BTreeMap<String, String>,
    /// Metadata languages; the first one names the records
    pub languages: Vec<String>,
    /// Tree record size in bits (24, 28 or 32)
    pub record_size: u16,
    /// 4 or 6
    pub ip_version: u16,
    /// Alias IPv4-embedding IPv6 networks to the IPv4 subtree
    pub ipv4_aliasing: bool,
    /// Log and count invalid rows instead of aborting
    pub skip_invalid_rows: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let options = MmdbOptions::default();
        Self {
            database_type: options.database_type,
            description: options.description,
            languages: options.languages,
            record_size: options.record_size.bits(),
            ip_version: options.ip_version.as_u16(),
            ipv4_aliasing: options.ipv4_aliasing,
            skip_invalid_rows: false,
        }
    }
}

impl GeneratorConfig {
    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if RecordSize::from_bits(self.record_size).is_none() {
            return Err(Error::Config(format!(
                "record_size must be 24, 28 or 32, got {}",
                self.record_size
            )));
        }
        if IpVersion::from_u16(self.ip_version).is_none() {
            return Err(Error::Config(format!(
                "ip_version must be 4 or 6, got {}",
                self.ip_version
            )));
        }
        if self.languages.is_empty() {
            return Err(Error::Config("languages must not be empty".to_string()));
        }
        Ok(())
    }

    /// Writer options for this config.
    pub fn mmdb_options(&self) -> Result<MmdbOptions> {
        self.validate()?;
        Ok(MmdbOptions {
            database_type: self.database_type.clone(),
            description: self.description.clone(),
            languages: self.languages.clone(),
            record_size: RecordSize::from_bits(self.record_size).unwrap_or_default(),
            ip_version: IpVersion::from_u16(self.ip_version).unwrap_or_default(),
            ipv4_aliasing: self.ipv4_aliasing,
            build_epoch: None,
        })
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        if self.skip_invalid_rows {
            ErrorPolicy::Skip
        } else {
            ErrorPolicy::Abort
        }
    }
}
