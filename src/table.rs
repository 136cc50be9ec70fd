//! CSV input tables of address ranges.
//!
//! The header row names the columns; field order in the header is
//! authoritative. Extra columns are ignored.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{StringRecord, StringRecordsIntoIter};
use flate2::read::GzDecoder;

use crate::error::{Error, Result};
use crate::pipeline::RawRow;
use crate::record::MetadataRecord;

pub const START_IP: &str = "start_ip";
pub const END_IP: &str = "end_ip";
pub const COUNTRY: &str = "country";
pub const COUNTRY_NAME: &str = "country_name";
pub const CONTINENT: &str = "continent";
pub const CONTINENT_NAME: &str = "continent_name";

/// Columns every table must declare.
pub const REQUIRED_FIELDS: [&str; 6] = [
    START_IP,
    END_IP,
    COUNTRY,
    COUNTRY_NAME,
    CONTINENT,
    CONTINENT_NAME,
];

/// Positions of the required columns within a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Columns {
    pub start_ip: usize,
    pub end_ip: usize,
    pub country: usize,
    pub country_name: usize,
    pub continent: usize,
    pub continent_name: usize,
}

impl Columns {
    /// Locate the required columns in a header row.
    pub fn from_header(header: &StringRecord) -> Result<Self> {
        let find = |name: &str| -> Result<usize> {
            header
                .iter()
                .position(|field| field.trim() == name)
                .ok_or_else(|| Error::MissingField(name.to_string()))
        };

        Ok(Self {
            start_ip: find(START_IP)?,
            end_ip: find(END_IP)?,
            country: find(COUNTRY)?,
            country_name: find(COUNTRY_NAME)?,
            continent: find(CONTINENT)?,
            continent_name: find(CONTINENT_NAME)?,
        })
    }

    /// Extract a row from a data record.
    fn row(&self, line: u64, record: &StringRecord) -> RawRow {
        let field = |idx: usize| record.get(idx).unwrap_or_default().to_string();
        RawRow {
            line,
            start_ip: field(self.start_ip),
            end_ip: field(self.end_ip),
            metadata: MetadataRecord {
                continent_code: field(self.continent),
                continent_name: field(self.continent_name),
                country_code: field(self.country),
                country_name: field(self.country_name),
            },
        }
    }
}

/// Reader over an input table.
pub struct TableReader<R: Read> {
    reader: csv::Reader<R>,
    header: StringRecord,
    columns: Columns,
}

impl TableReader<Box<dyn Read>> {
    /// Open a table file; `.gz` files are decompressed on the fly.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let is_gzip = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("gz"))
            .unwrap_or(false);

        let source: Box<dyn Read> = if is_gzip {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Self::from_reader(source)
    }
}

impl<R: Read> TableReader<R> {
    /// Read the header and resolve the required columns.
    ///
    /// Fails with [`Error::MissingField`] before any data row is read.
    pub fn from_reader(source: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(source);

        let header = reader.headers()?.clone();
        let columns = Columns::from_header(&header)?;

        Ok(Self {
            reader,
            header,
            columns,
        })
    }

    /// The header row as read.
    pub fn header(&self) -> &StringRecord {
        &self.header
    }

    pub fn columns(&self) -> Columns {
        self.columns
    }

    /// Iterate over the data rows.
    pub fn rows(self) -> Rows<R> {
        Rows {
            records: self.reader.into_records(),
            columns: self.columns,
        }
    }
}

/// Iterator over the data rows of a table.
pub struct Rows<R: Read> {
    records: StringRecordsIntoIter<R>,
    columns: Columns,
}

impl<R: Read> Iterator for Rows<R> {
    type Item = Result<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e.into())),
        };
        let line = record.position().map(|pos| pos.line()).unwrap_or_default();
        Some(Ok(self.columns.row(line, &record)))
    }
}
