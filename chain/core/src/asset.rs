//! Token symbols and assets.
//!
//! Amounts are kept as signed integers counted in the smallest unit of the
//! symbol, so `1.0000 TOK` is stored as `10000` with precision 4.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::ChainError;

pub const MAX_PRECISION: u8 = 18;

/// Up to 7 uppercase letters packed little-endian into a `u64`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolCode(u64);

impl SymbolCode {
    pub const fn new(value: u64) -> Self {
        SymbolCode(value)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        let mut value = self.0;
        if value == 0 {
            return false;
        }
        // Letters first, then only zero padding.
        while value & 0xff != 0 {
            if !(value as u8).is_ascii_uppercase() {
                return false;
            }
            value >>= 8;
        }
        value == 0
    }
}

impl FromStr for SymbolCode {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > 7 {
            return Err(ChainError::InvalidSymbol(format!("{s:?} must be 1 to 7 characters")));
        }
        let mut value = 0u64;
        for (i, c) in s.bytes().enumerate() {
            if !c.is_ascii_uppercase() {
                return Err(ChainError::InvalidSymbol(format!("{s:?} must be uppercase A-Z")));
            }
            value |= (c as u64) << (8 * i);
        }
        Ok(SymbolCode(value))
    }
}

impl fmt::Display for SymbolCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value = self.0;
        while value & 0xff != 0 {
            write!(f, "{}", (value & 0xff) as u8 as char)?;
            value >>= 8;
        }
        Ok(())
    }
}

/// Precision in the low byte, symbol code in the upper seven.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Symbol(u64);

impl Symbol {
    pub fn new(precision: u8, code: SymbolCode) -> Result<Self, ChainError> {
        if precision > MAX_PRECISION {
            return Err(ChainError::InvalidSymbol(format!("precision {precision} exceeds {MAX_PRECISION}")));
        }
        Ok(Symbol((code.as_u64() << 8) | precision as u64))
    }

    pub fn from_u64(value: u64) -> Result<Self, ChainError> {
        let symbol = Symbol(value);
        if symbol.precision() > MAX_PRECISION || !symbol.code().is_valid() {
            return Err(ChainError::InvalidSymbol(format!("raw value {value:#x}")));
        }
        Ok(symbol)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    pub const fn precision(&self) -> u8 {
        (self.0 & 0xff) as u8
    }

    pub const fn code(&self) -> SymbolCode {
        SymbolCode(self.0 >> 8)
    }
}

impl FromStr for Symbol {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (precision, code) = s
            .split_once(',')
            .ok_or_else(|| ChainError::InvalidSymbol(format!("{s:?} is not of the form precision,CODE")))?;
        let precision = precision
            .trim()
            .parse::<u8>()
            .map_err(|e| ChainError::InvalidSymbol(format!("{s:?}: {e}")))?;
        Symbol::new(precision, code.trim().parse()?)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.precision(), self.code())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Asset {
    pub amount: i64,
    pub symbol: Symbol,
}

impl Asset {
    pub fn new(amount: i64, symbol: Symbol) -> Self {
        Self { amount, symbol }
    }
}

impl FromStr for Asset {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ChainError::InvalidAsset(format!("{s:?}: {reason}"));

        let (number, code) = s.trim().split_once(' ').ok_or_else(|| invalid("missing symbol"))?;
        let code: SymbolCode = code.trim().parse()?;

        let (negative, digits) = match number.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, number),
        };
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        if int_part.is_empty() || !int_part.bytes().all(|c| c.is_ascii_digit()) {
            return Err(invalid("malformed integer part"));
        }
        if !frac_part.bytes().all(|c| c.is_ascii_digit()) {
            return Err(invalid("malformed fractional part"));
        }
        if digits.contains('.') && frac_part.is_empty() {
            return Err(invalid("empty fractional part"));
        }

        let precision = u8::try_from(frac_part.len()).map_err(|_| invalid("precision too large"))?;
        let symbol = Symbol::new(precision, code)?;

        let magnitude = format!("{int_part}{frac_part}")
            .parse::<i128>()
            .map_err(|_| invalid("amount out of range"))?;
        let amount = if negative { -magnitude } else { magnitude };
        let amount = i64::try_from(amount).map_err(|_| invalid("amount out of range"))?;

        Ok(Asset { amount, symbol })
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = self.symbol.precision() as u32;
        let sign = if self.amount < 0 { "-" } else { "" };
        let magnitude = (self.amount as i128).unsigned_abs();
        let unit = 10u128.pow(precision);

        if precision == 0 {
            write!(f, "{sign}{magnitude} {}", self.symbol.code())
        } else {
            write!(
                f,
                "{sign}{}.{:0width$} {}",
                magnitude / unit,
                magnitude % unit,
                self.symbol.code(),
                width = precision as usize
            )
        }
    }
}

macro_rules! string_serde {
    ($($ty:ty),*) => {$(
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(de::Error::custom)
            }
        }
    )*};
}

string_serde!(SymbolCode, Symbol, Asset);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_format_and_parse() {
        let asset: Asset = "100.0000 TOK".parse().unwrap();
        assert_eq!(asset.amount, 1_000_000);
        assert_eq!(asset.symbol.precision(), 4);
        assert_eq!(asset.symbol.code().to_string(), "TOK");
        assert_eq!(asset.to_string(), "100.0000 TOK");

        let negative: Asset = "-0.0005 EOS".parse().unwrap();
        assert_eq!(negative.amount, -5);
        assert_eq!(negative.to_string(), "-0.0005 EOS");

        let whole: Asset = "42 NFT".parse().unwrap();
        assert_eq!(whole.symbol.precision(), 0);
        assert_eq!(whole.to_string(), "42 NFT");
    }

    #[test]
    fn test_asset_rejects_garbage() {
        assert!("100.0000".parse::<Asset>().is_err());
        assert!("1.2.3 TOK".parse::<Asset>().is_err());
        assert!("1. TOK".parse::<Asset>().is_err());
        assert!("10.00 tok".parse::<Asset>().is_err());
        assert!("99999999999999999999 TOK".parse::<Asset>().is_err());
    }

    #[test]
    fn test_symbol_layout() {
        let symbol: Symbol = "4,EOS".parse().unwrap();
        // 4,EOS is the well known core symbol value.
        assert_eq!(symbol.as_u64(), 1397703940);
        assert_eq!(Symbol::from_u64(1397703940).unwrap().to_string(), "4,EOS");
        assert!(Symbol::from_u64(0x13).is_err());
    }
}
