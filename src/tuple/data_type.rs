use std::fmt;
use std::str::FromStr;

use crate::common::StorageError;

/// Column types supported by the record codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 32-bit signed integer: 4 bytes, big-endian
    Int,

    /// 32-bit floating point: 4 bytes, IEEE 754
    Real,

    /// Fixed-length string of exactly n UTF-16 code units, space-padded
    Char(u16),

    /// Variable-length string of at most n UTF-16 code units
    VarChar(u16),

    /// Calendar date: day, month, year as three 4-byte integers
    Date,
}

impl DataType {
    /// Returns true if every value of this type encodes to the same size.
    pub fn is_fixed_size(&self) -> bool {
        !matches!(self, DataType::VarChar(_))
    }

    /// Returns the encoded size in bytes, or None for variable-length types.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            DataType::Int | DataType::Real => Some(4),
            DataType::Char(n) => Some(2 * *n as usize),
            DataType::Date => Some(12),
            DataType::VarChar(_) => None,
        }
    }

    /// Returns the largest encoded size in bytes.
    pub fn max_size(&self) -> usize {
        match self {
            DataType::VarChar(n) => 2 * *n as usize,
            other => other.fixed_size().unwrap_or(0),
        }
    }

    /// Character capacity of string types.
    pub fn width(&self) -> Option<usize> {
        match self {
            DataType::Char(n) | DataType::VarChar(n) => Some(*n as usize),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => write!(f, "INT"),
            DataType::Real => write!(f, "REAL"),
            DataType::Char(n) => write!(f, "CHAR({})", n),
            DataType::VarChar(n) => write!(f, "VARCHAR({})", n),
            DataType::Date => write!(f, "DATE"),
        }
    }
}

impl FromStr for DataType {
    type Err = StorageError;

    /// Parses `INT`, `REAL`, `DATE`, `CHAR(n)` or `VARCHAR(n)`, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.as_str() {
            "INT" | "INTEGER" => return Ok(DataType::Int),
            "REAL" | "FLOAT" => return Ok(DataType::Real),
            "DATE" => return Ok(DataType::Date),
            _ => {}
        }

        let bad = || StorageError::Config(format!("unknown column type {:?}", s));
        let (name, rest) = upper.split_once('(').ok_or_else(bad)?;
        let width: u16 = rest
            .strip_suffix(')')
            .and_then(|n| n.trim().parse().ok())
            .filter(|&n| n > 0)
            .ok_or_else(bad)?;

        match name.trim() {
            "CHAR" => Ok(DataType::Char(width)),
            "VARCHAR" => Ok(DataType::VarChar(width)),
            _ => Err(bad()),
        }
    }
}
