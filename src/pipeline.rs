//! Ingestion pipeline: rows to ranges to blocks to the sink.

use std::convert::Infallible;

use crate::address::Family;
use crate::cidr::CidrBlock;
use crate::error::{Error, Result};
use crate::range::{validate, AddressRange};
use crate::record::MetadataRecord;

/// Receiver of decomposed blocks.
pub trait BlockSink {
    /// Error type for rejected insertions.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Store `record` for every address in `block`.
    fn insert(&mut self, block: &CidrBlock, record: &MetadataRecord) -> std::result::Result<(), Self::Error>;
}

/// Collects pairs in memory.
impl BlockSink for Vec<(CidrBlock, MetadataRecord)> {
    type Error = Infallible;

    fn insert(&mut self, block: &CidrBlock, record: &MetadataRecord) -> std::result::Result<(), Infallible> {
        self.push((*block, record.clone()));
        Ok(())
    }
}

/// An input row as read from the table, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based line number in the input
    pub line: u64,
    pub start_ip: String,
    pub end_ip: String,
    pub metadata: MetadataRecord,
}

impl RawRow {
    /// Validate the address fields.
    pub fn resolve(self) -> Result<DatasetRow> {
        match validate(&self.start_ip, &self.end_ip) {
            Ok(range) => Ok(DatasetRow {
                line: self.line,
                range,
                metadata: self.metadata,
            }),
            Err(source) => Err(Error::Row {
                line: self.line,
                start_ip: self.start_ip,
                end_ip: self.end_ip,
                source,
            }),
        }
    }
}

/// A validated input row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRow {
    pub line: u64,
    pub range: AddressRange,
    pub metadata: MetadataRecord,
}

/// What to do with rows that fail validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Stop at the first invalid row
    #[default]
    Abort,
    /// Log and count invalid rows, keep going
    Skip,
}

/// Counters for one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestStats {
    /// Rows read, including skipped ones
    pub rows: u64,
    pub skipped_rows: u64,
    pub blocks: u64,
    pub v4_blocks: u64,
    pub v6_blocks: u64,
}

/// Drives rows through validation and decomposition into a [`BlockSink`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Pipeline {
    policy: ErrorPolicy,
}

impl Pipeline {
    pub fn new(policy: ErrorPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Process every row in order.
    ///
    /// Read errors and sink errors always end the run; validation errors
    /// end it unless the policy is [`ErrorPolicy::Skip`].
    pub fn run<I, S>(&self, rows: I, sink: &mut S) -> Result<IngestStats>
    where
        I: IntoIterator<Item = Result<RawRow>>,
        S: BlockSink,
    {
        let mut stats = IngestStats::default();

        for row in rows {
            let row = row?;
            stats.rows += 1;

            let row = match row.resolve() {
                Ok(row) => row,
                Err(e) if self.policy == ErrorPolicy::Skip => {
                    log::warn!("Skipping {}", e);
                    stats.skipped_rows += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            forward(&row, sink, &mut stats)?;
        }

        if stats.skipped_rows > 0 {
            log::warn!(
                "{} of {} rows were skipped as invalid",
                stats.skipped_rows,
                stats.rows
            );
        }

        Ok(stats)
    }
}

/// Decompose one row and hand each block to the sink.
fn forward<S: BlockSink>(row: &DatasetRow, sink: &mut S, stats: &mut IngestStats) -> Result<()> {
    let mut count = 0u64;
    for block in row.range.blocks() {
        sink.insert(&block, &row.metadata).map_err(|e| Error::Sink {
            block,
            record: row.metadata.clone(),
            source: Box::new(e),
        })?;
        count += 1;
    }

    match row.range.family() {
        Family::V4 => stats.v4_blocks += count,
        Family::V6 => stats.v6_blocks += count,
    }
    stats.blocks += count;

    log::debug!("line {}: {} -> {} blocks", row.line, row.range, count);
    Ok(())
}
