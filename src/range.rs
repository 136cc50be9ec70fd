//! Validated inclusive address ranges.

use std::fmt;

use crate::address::{Address, Family};
use crate::cidr::{decompose, Blocks};
use crate::error::RangeError;

/// An inclusive span of addresses within one family.
///
/// Only constructible through [`validate`] or [`AddressRange::new`], so
/// every value satisfies `start.family == end.family` and `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressRange {
    start: Address,
    end: Address,
}

impl AddressRange {
    /// Build a range from two parsed addresses.
    pub fn new(start: Address, end: Address) -> Result<Self, RangeError> {
        if start.family() != end.family() {
            return Err(RangeError::FamilyMismatch {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        if start.value() > end.value() {
            return Err(RangeError::InvertedRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Address {
        self.start
    }

    pub fn end(&self) -> Address {
        self.end
    }

    pub fn family(&self) -> Family {
        self.start.family()
    }

    /// Whether `addr` lies within the range.
    pub fn contains(&self, addr: &Address) -> bool {
        addr.family() == self.family()
            && self.start.value() <= addr.value()
            && addr.value() <= self.end.value()
    }

    /// The CIDR blocks that exactly tile this range, ascending.
    pub fn blocks(&self) -> Blocks {
        decompose(self)
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Parse and validate a textual `[start, end]` range.
///
/// # Examples
/// ```
/// use k2geoip::validate;
///
/// let range = validate("10.0.0.1", "10.0.0.10").unwrap();
/// assert_eq!(range.blocks().count(), 5);
/// ```
pub fn validate(start: &str, end: &str) -> Result<AddressRange, RangeError> {
    let start: Address = start.parse()?;
    let end: Address = end.parse()?;
    AddressRange::new(start, end)
}
