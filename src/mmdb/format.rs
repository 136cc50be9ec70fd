//! MaxMind DB format constants and structures.

/// Marker preceding the metadata section.
pub const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

/// Zero bytes between the search tree and the data section.
pub const DATA_SECTION_SEPARATOR_SIZE: usize = 16;

/// Binary format major version written to metadata.
pub const FORMAT_MAJOR_VERSION: u16 = 2;

/// Binary format minor version written to metadata.
pub const FORMAT_MINOR_VERSION: u16 = 0;

/// Depth of the IPv4 subtree inside an IPv6 tree (`::/96`).
pub const IPV4_SUBTREE_DEPTH: u8 = 96;

/// Data section field types.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Extended = 0,
    Pointer = 1,
    Utf8String = 2,
    Double = 3,
    Bytes = 4,
    Uint16 = 5,
    Uint32 = 6,
    Map = 7,
    Int32 = 8,
    Uint64 = 9,
    Uint128 = 10,
    Array = 11,
    Container = 12,
    EndMarker = 13,
    Boolean = 14,
    Float = 15,
}

impl DataType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Types above 7 are stored in a second "extended" type byte.
    pub fn is_extended(self) -> bool {
        self.as_u8() > DataType::Map.as_u8()
    }
}

/// Bits per search tree record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordSize {
    #[default]
    Bits24,
    Bits28,
    Bits32,
}

impl RecordSize {
    /// Parse a record size in bits.
    pub fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            24 => Some(RecordSize::Bits24),
            28 => Some(RecordSize::Bits28),
            32 => Some(RecordSize::Bits32),
            _ => None,
        }
    }

    pub fn bits(self) -> u16 {
        match self {
            RecordSize::Bits24 => 24,
            RecordSize::Bits28 => 28,
            RecordSize::Bits32 => 32,
        }
    }

    /// Size of one node (two records) in bytes.
    pub fn node_bytes(self) -> usize {
        self.bits() as usize * 2 / 8
    }

    /// Largest value a record can hold.
    pub fn max_value(self) -> u64 {
        (1u64 << self.bits()) - 1
    }

    /// Append one node to `buf`.
    ///
    /// Both values must already be checked against [`max_value`](Self::max_value).
    pub fn write_node(self, buf: &mut Vec<u8>, left: u32, right: u32) {
        match self {
            RecordSize::Bits24 => {
                buf.extend_from_slice(&left.to_be_bytes()[1..]);
                buf.extend_from_slice(&right.to_be_bytes()[1..]);
            }
            RecordSize::Bits28 => {
                // The middle byte holds the high nibble of each record
                buf.extend_from_slice(&left.to_be_bytes()[1..]);
                buf.push((((left >> 24) & 0x0F) << 4) as u8 | ((right >> 24) & 0x0F) as u8);
                buf.extend_from_slice(&right.to_be_bytes()[1..]);
            }
            RecordSize::Bits32 => {
                buf.extend_from_slice(&left.to_be_bytes());
                buf.extend_from_slice(&right.to_be_bytes());
            }
        }
    }
}

/// Tree layout of the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpVersion {
    /// IPv4-only tree (32 levels)
    V4,
    /// IPv6 tree (128 levels), IPv4 stored under `::/96`
    #[default]
    V6,
}

impl IpVersion {
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            4 => Some(IpVersion::V4),
            6 => Some(IpVersion::V6),
            _ => None,
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            IpVersion::V4 => 4,
            IpVersion::V6 => 6,
        }
    }

    /// Depth of the search tree in bits.
    pub fn tree_depth(self) -> u8 {
        match self {
            IpVersion::V4 => 32,
            IpVersion::V6 => 128,
        }
    }
}
