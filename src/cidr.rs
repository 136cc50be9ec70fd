//! CIDR blocks and range-to-block decomposition.
//!
//! [`decompose`] turns an inclusive [`AddressRange`] into the minimal
//! ascending sequence of aligned power-of-two blocks covering it exactly.
//! At each cursor position the emitted block is as large as both the
//! cursor's alignment and the remaining span allow.

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::fmt;
use std::iter::FusedIterator;
use std::net::IpAddr;
use std::str::FromStr;

use crate::address::{Address, Family};
use crate::error::CidrError;
use crate::range::AddressRange;

/// A power-of-two sized, aligned block of addresses.
///
/// # Examples
/// ```
/// use k2geoip::CidrBlock;
///
/// let block: CidrBlock = "10.0.0.0/24".parse().unwrap();
/// assert_eq!(block.prefix_len(), 24);
/// assert_eq!(block.last().to_string(), "10.0.0.255");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CidrBlock {
    network: Address,
    prefix_len: u8,
}

impl CidrBlock {
    /// Create a block, checking the prefix length and network alignment.
    pub fn new(network: Address, prefix_len: u8) -> Result<Self, CidrError> {
        let bits = network.bits();
        if prefix_len as u32 > bits {
            return Err(CidrError::PrefixTooLong { prefix_len, bits });
        }
        if network.value() & host_mask(bits - prefix_len as u32) != 0 {
            return Err(CidrError::Misaligned(format!("{}/{}", network, prefix_len)));
        }
        Ok(Self {
            network,
            prefix_len,
        })
    }

    /// First address of the block.
    pub fn network(&self) -> Address {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn family(&self) -> Family {
        self.network.family()
    }

    /// Number of free (host) bits: the block spans `2^host_bits` addresses.
    pub fn host_bits(&self) -> u32 {
        self.network.bits() - self.prefix_len as u32
    }

    /// First address of the block (alias of [`network`](Self::network)).
    pub fn first(&self) -> Address {
        self.network
    }

    /// Last address of the block.
    pub fn last(&self) -> Address {
        self.network | host_mask(self.host_bits())
    }

    /// Whether `addr` falls inside the block.
    pub fn contains(&self, addr: &Address) -> bool {
        addr.family() == self.family()
            && self.network.value() <= addr.value()
            && addr.value() <= self.last().value()
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

impl FromStr for CidrBlock {
    type Err = CidrError;

    /// Parse strict CIDR notation; host bits must be zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let net: IpNet = s
            .parse()
            .map_err(|_| CidrError::InvalidCidr(s.to_string()))?;
        if net.addr() != net.network() {
            return Err(CidrError::Misaligned(s.to_string()));
        }
        Self::new(Address::from(net.network()), net.prefix_len())
    }
}

impl From<IpNet> for CidrBlock {
    /// Host bits of `net` are dropped.
    fn from(net: IpNet) -> Self {
        Self {
            network: Address::from(net.network()),
            prefix_len: net.prefix_len(),
        }
    }
}

impl From<CidrBlock> for IpNet {
    fn from(block: CidrBlock) -> Self {
        let net = match IpAddr::from(block.network) {
            IpAddr::V4(addr) => Ipv4Net::new(addr, block.prefix_len).map(IpNet::V4),
            IpAddr::V6(addr) => Ipv6Net::new(addr, block.prefix_len).map(IpNet::V6),
        };
        net.unwrap_or_else(|_| unreachable!("prefix length bounded by address width"))
    }
}

/// Mask with the low `bits` bits set.
fn host_mask(bits: u32) -> u128 {
    if bits >= 128 {
        u128::MAX
    } else {
        (1u128 << bits) - 1
    }
}

/// Largest `r` with `2^r - 1 <= span`, i.e. `floor(log2(span + 1))`.
fn fit_bits(span: u128) -> u32 {
    match span.checked_add(1) {
        Some(count) => 127 - count.leading_zeros(),
        None => 128,
    }
}

/// Lazy iterator over the blocks tiling an [`AddressRange`].
#[derive(Debug, Clone)]
pub struct Blocks {
    family: Family,
    /// Next uncovered address; `None` once the range is exhausted
    cursor: Option<u128>,
    end: u128,
}

impl Iterator for Blocks {
    type Item = CidrBlock;

    fn next(&mut self) -> Option<CidrBlock> {
        let start = self.cursor?;
        let width = self.family.bits();

        let alignment = start.trailing_zeros().min(width);
        let fit = fit_bits(self.end - start).min(width);
        let size_bits = alignment.min(fit);

        let last = start | host_mask(size_bits);
        self.cursor = if last >= self.end { None } else { Some(last + 1) };

        Some(CidrBlock {
            network: Address::from_value(self.family, start),
            prefix_len: (width - size_bits) as u8,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.cursor {
            // Each block at least halves the remaining span or finishes it
            Some(_) => (1, Some(2 * self.family.bits() as usize)),
            None => (0, Some(0)),
        }
    }
}

impl FusedIterator for Blocks {}

/// Decompose a validated range into its minimal ordered CIDR blocks.
///
/// # Examples
/// ```
/// use k2geoip::{decompose, validate};
///
/// let range = validate("10.0.0.1", "10.0.0.10").unwrap();
/// let blocks: Vec<String> = decompose(&range).map(|b| b.to_string()).collect();
/// assert_eq!(
///     blocks,
///     ["10.0.0.1/32", "10.0.0.2/31", "10.0.0.4/30", "10.0.0.8/31", "10.0.0.10/32"]
/// );
/// ```
pub fn decompose(range: &AddressRange) -> Blocks {
    Blocks {
        family: range.family(),
        cursor: Some(range.start().value()),
        end: range.end().value(),
    }
}
