//! Slot addresses
//!
//! An [`Address`] is a 1-based (row, column) position inside a labware grid.
//! Rows display as letters, so row 2 column 3 is `B3`. Both `B3` and `2,3`
//! parse to the same address.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A 1-based (row, column) slot position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    row: u32,
    column: u32,
}

/// Address parse failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid address string: {0:?}")]
pub struct AddressParseError(pub String);

impl Address {
    /// Create address from 1-based row and column
    ///
    /// # Panics
    /// Panics if row or column is zero.
    #[inline]
    #[must_use]
    pub fn new(row: u32, column: u32) -> Self {
        assert!(row > 0 && column > 0, "address row and column are 1-based");
        Self { row, column }
    }

    /// Create address, rejecting zero row/column
    #[inline]
    #[must_use]
    pub fn checked(row: u32, column: u32) -> Option<Self> {
        (row > 0 && column > 0).then_some(Self { row, column })
    }

    /// 1-based row
    #[inline]
    #[must_use]
    pub fn row(self) -> u32 {
        self.row
    }

    /// 1-based column
    #[inline]
    #[must_use]
    pub fn column(self) -> u32 {
        self.column
    }

    /// All addresses of a `rows`×`columns` grid in row-major order
    pub fn grid(rows: u32, columns: u32) -> impl Iterator<Item = Address> {
        (1..=rows).flat_map(move |row| (1..=columns).map(move |column| Address { row, column }))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.row <= 26 {
            let letter = char::from(b'A' + u8::try_from(self.row - 1).map_err(|_| fmt::Error)?);
            write!(f, "{}{}", letter, self.column)
        } else {
            write!(f, "{},{}", self.row, self.column)
        }
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || AddressParseError(s.to_string());
        let trimmed = s.trim();
        if let Some((row, column)) = trimmed.split_once(',') {
            let row = row.trim().parse::<u32>().map_err(|_| err())?;
            let column = column.trim().parse::<u32>().map_err(|_| err())?;
            return Address::checked(row, column).ok_or_else(err);
        }
        let mut chars = trimmed.chars();
        let letter = chars.next().ok_or_else(err)?.to_ascii_uppercase();
        if !letter.is_ascii_uppercase() {
            return Err(err());
        }
        let row = u32::from(letter) - u32::from('A') + 1;
        let column = chars.as_str().parse::<u32>().map_err(|_| err())?;
        Address::checked(row, column).ok_or_else(err)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
