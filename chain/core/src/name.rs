//! Account and action names.
//!
//! A name packs up to 13 characters of the alphabet `.12345abcdefghijklmnopqrstuvwxyz`
//! into a `u64`: the first 12 characters take 5 bits each from the top, the 13th
//! character takes the remaining low 4 bits.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::ChainError;

const CHARMAP: &[u8; 32] = b".12345abcdefghijklmnopqrstuvwxyz";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(u64);

const fn char_to_symbol(c: u8) -> u64 {
    match c {
        b'a'..=b'z' => (c - b'a') as u64 + 6,
        b'1'..=b'5' => (c - b'1') as u64 + 1,
        _ => 0,
    }
}

impl Name {
    pub const fn new(value: u64) -> Self {
        Name(value)
    }

    /// Packs `s` without validation. Meant for constants; characters outside
    /// the alphabet map to `.`.
    pub const fn from_str_unchecked(s: &str) -> Self {
        let bytes = s.as_bytes();
        let mut value = 0u64;
        let mut i = 0;
        while i < bytes.len() && i < 12 {
            value |= (char_to_symbol(bytes[i]) & 0x1f) << (64 - 5 * (i + 1));
            i += 1;
        }
        if bytes.len() > 12 {
            value |= char_to_symbol(bytes[12]) & 0x0f;
        }
        Name(value)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for Name {
    fn from(value: u64) -> Self {
        Name(value)
    }
}

impl From<Name> for u64 {
    fn from(name: Name) -> Self {
        name.0
    }
}

impl FromStr for Name {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() > 13 {
            return Err(ChainError::InvalidName(format!("{s} is longer than 13 characters")));
        }
        for (i, c) in s.bytes().enumerate() {
            let valid = if i == 12 {
                matches!(c, b'.' | b'1'..=b'5' | b'a'..=b'j')
            } else {
                matches!(c, b'.' | b'1'..=b'5' | b'a'..=b'z')
            };
            if !valid {
                return Err(ChainError::InvalidName(format!("{s} contains invalid character {:?}", c as char)));
            }
        }

        let name = Name::from_str_unchecked(s);
        // Trailing dots are not representable, so "abc." would silently become "abc".
        if name.to_string() != s {
            return Err(ChainError::InvalidName(format!("{s} is not in normalized form")));
        }
        Ok(name)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = [b'.'; 13];
        let mut tmp = self.0;
        for i in 0..=12 {
            let (mask, shift) = if i == 0 { (0x0f, 4) } else { (0x1f, 5) };
            out[12 - i] = CHARMAP[(tmp & mask) as usize];
            tmp >>= shift;
        }

        let len = out.iter().rposition(|&c| c != b'.').map_or(0, |p| p + 1);
        // The charmap is pure ASCII.
        f.write_str(std::str::from_utf8(&out[..len]).map_err(|_| fmt::Error)?)
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
