//! IP address model shared by IPv4 and IPv6.
//!
//! An [`Address`] is an unsigned integer of the family's width (32 or 128
//! bits). Values are held in a `u128` and every operation is truncated to
//! the family width, so IPv4 arithmetic never leaks above bit 31.

use std::cmp::Ordering;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::ops::{BitAnd, BitOr, Shl, Shr};
use std::str::FromStr;

use crate::error::RangeError;

/// Address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// 32-bit address space
    V4,
    /// 128-bit address space
    V6,
}

impl Family {
    /// Width of the address space in bits.
    pub fn bits(self) -> u32 {
        match self {
            Family::V4 => 32,
            Family::V6 => 128,
        }
    }

    /// Largest representable value (`2^W - 1`).
    pub fn max_value(self) -> u128 {
        match self {
            Family::V4 => u32::MAX as u128,
            Family::V6 => u128::MAX,
        }
    }

    /// Length of the big-endian byte form.
    pub fn byte_len(self) -> usize {
        (self.bits() / 8) as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Family::V4 => "IPv4",
            Family::V6 => "IPv6",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single parsed IP address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    value: u128,
    family: Family,
}

impl Address {
    /// Create an IPv4 address from its integer value.
    pub fn v4(value: u32) -> Self {
        Self {
            value: value as u128,
            family: Family::V4,
        }
    }

    /// Create an IPv6 address from its integer value.
    pub fn v6(value: u128) -> Self {
        Self {
            value,
            family: Family::V6,
        }
    }

    /// Create an address of the given family, truncating `value` to its width.
    pub fn from_value(family: Family, value: u128) -> Self {
        Self {
            value: value & family.max_value(),
            family,
        }
    }

    pub fn value(&self) -> u128 {
        self.value
    }

    pub fn family(&self) -> Family {
        self.family
    }

    /// Bit width of this address's family.
    pub fn bits(&self) -> u32 {
        self.family.bits()
    }

    /// Big-endian bytes (4 for IPv4, 16 for IPv6).
    pub fn to_be_bytes(&self) -> Vec<u8> {
        let bytes = self.value.to_be_bytes();
        bytes[16 - self.family.byte_len()..].to_vec()
    }

    /// Build an address from 4 or 16 big-endian bytes.
    pub fn from_be_bytes(bytes: &[u8]) -> Result<Self, RangeError> {
        match bytes.len() {
            4 => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(bytes);
                Ok(Self::v4(u32::from_be_bytes(buf)))
            }
            16 => {
                let mut buf = [0u8; 16];
                buf.copy_from_slice(bytes);
                Ok(Self::v6(u128::from_be_bytes(buf)))
            }
            n => Err(RangeError::MalformedAddress(format!("{} address bytes", n))),
        }
    }

    /// Number of trailing zero bits, capped at the family width.
    ///
    /// Zero is aligned to every block size, so it reports the full width.
    pub fn trailing_zeros(&self) -> u32 {
        self.value.trailing_zeros().min(self.bits())
    }

    /// The next address, or `None` past the top of the address space.
    pub fn checked_increment(&self) -> Option<Self> {
        if self.value == self.family.max_value() {
            return None;
        }
        Some(Self {
            value: self.value + 1,
            family: self.family,
        })
    }
}

impl From<IpAddr> for Address {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => Self::v4(u32::from(v4)),
            IpAddr::V6(v6) => Self::v6(u128::from(v6)),
        }
    }
}

impl From<Address> for IpAddr {
    fn from(addr: Address) -> Self {
        match addr.family {
            Family::V4 => IpAddr::V4(Ipv4Addr::from(addr.value as u32)),
            Family::V6 => IpAddr::V6(Ipv6Addr::from(addr.value)),
        }
    }
}

impl FromStr for Address {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<IpAddr>()
            .map(Address::from)
            .map_err(|_| RangeError::MalformedAddress(s.to_string()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", IpAddr::from(*self))
    }
}

impl PartialOrd for Address {
    /// Addresses compare as unsigned integers within one family only.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.family != other.family {
            return None;
        }
        Some(self.value.cmp(&other.value))
    }
}

impl BitOr<u128> for Address {
    type Output = Address;

    fn bitor(self, mask: u128) -> Address {
        Address::from_value(self.family, self.value | mask)
    }
}

impl BitAnd<u128> for Address {
    type Output = Address;

    fn bitand(self, mask: u128) -> Address {
        Address::from_value(self.family, self.value & mask)
    }
}

impl Shl<u32> for Address {
    type Output = Address;

    fn shl(self, n: u32) -> Address {
        Address::from_value(self.family, self.value.checked_shl(n).unwrap_or(0))
    }
}

impl Shr<u32> for Address {
    type Output = Address;

    fn shr(self, n: u32) -> Address {
        Address::from_value(self.family, self.value.checked_shr(n).unwrap_or(0))
    }
}
