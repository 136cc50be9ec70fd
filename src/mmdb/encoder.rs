//! Data section encoding.

use ahash::AHashMap;

use super::format::DataType;
use crate::error::SinkError;

/// A value storable in the data section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    String(String),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Boolean(bool),
    /// Key order is preserved as given
    Map(Vec<(String, Value)>),
    Array(Vec<Value>),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl Value {
    /// Append the encoded form of this value to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), SinkError> {
        match self {
            Value::String(s) => {
                write_control(buf, DataType::Utf8String, s.len())?;
                buf.extend_from_slice(s.as_bytes());
            }
            Value::Uint16(v) => write_uint(buf, DataType::Uint16, &v.to_be_bytes())?,
            Value::Uint32(v) => write_uint(buf, DataType::Uint32, &v.to_be_bytes())?,
            Value::Uint64(v) => write_uint(buf, DataType::Uint64, &v.to_be_bytes())?,
            Value::Boolean(b) => write_control(buf, DataType::Boolean, *b as usize)?,
            Value::Map(entries) => {
                write_control(buf, DataType::Map, entries.len())?;
                for (key, value) in entries {
                    write_control(buf, DataType::Utf8String, key.len())?;
                    buf.extend_from_slice(key.as_bytes());
                    value.encode(buf)?;
                }
            }
            Value::Array(items) => {
                write_control(buf, DataType::Array, items.len())?;
                for item in items {
                    item.encode(buf)?;
                }
            }
        }
        Ok(())
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SinkError> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(buf)
    }
}

/// Write a control byte, extended type byte and size extension bytes.
fn write_control(buf: &mut Vec<u8>, data_type: DataType, size: usize) -> Result<(), SinkError> {
    let type_bits = if data_type.is_extended() {
        0
    } else {
        data_type.as_u8() << 5
    };

    let (size_bits, extra): (u8, Vec<u8>) = if size < 29 {
        (size as u8, Vec::new())
    } else if size < 285 {
        (29, vec![(size - 29) as u8])
    } else if size < 65_821 {
        (30, ((size - 285) as u16).to_be_bytes().to_vec())
    } else if size < 65_821 + (1 << 24) {
        (31, ((size - 65_821) as u32).to_be_bytes()[1..].to_vec())
    } else {
        return Err(SinkError::ValueTooLarge(size));
    };

    buf.push(type_bits | size_bits);
    if data_type.is_extended() {
        buf.push(data_type.as_u8() - DataType::Map.as_u8());
    }
    buf.extend_from_slice(&extra);
    Ok(())
}

/// Unsigned integers drop their leading zero bytes.
fn write_uint(buf: &mut Vec<u8>, data_type: DataType, be_bytes: &[u8]) -> Result<(), SinkError> {
    let skip = be_bytes.iter().take_while(|b| **b == 0).count();
    let significant = &be_bytes[skip..];
    write_control(buf, data_type, significant.len())?;
    buf.extend_from_slice(significant);
    Ok(())
}

/// Deduplicating data section buffer.
#[derive(Debug, Default, Clone)]
pub struct DataSection {
    buffer: Vec<u8>,
    offsets: AHashMap<Vec<u8>, u32>,
}

impl DataSection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` and return its offset; identical values share one copy.
    pub fn insert(&mut self, value: &Value) -> Result<u32, SinkError> {
        let encoded = value.to_bytes()?;
        if let Some(&offset) = self.offsets.get(&encoded) {
            return Ok(offset);
        }

        let offset = u32::try_from(self.buffer.len())
            .map_err(|_| SinkError::ValueTooLarge(self.buffer.len()))?;
        self.buffer.extend_from_slice(&encoded);
        self.offsets.insert(encoded, offset);
        Ok(offset)
    }

    /// Number of distinct values stored.
    pub fn value_count(&self) -> usize {
        self.offsets.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
