//! Text forms of public keys and signatures.
//!
//! Keys and signatures travel in binary as a key type index followed by the
//! raw key data. Their text form is base58 of the data with a 4 byte
//! RIPEMD-160 checksum appended: `EOS...` for legacy K1 keys,
//! `PUB_<type>_...` and `SIG_<type>_...` otherwise, where the checksum also
//! covers the type suffix.

use std::fmt;
use std::str::FromStr;

use ripemd::{Digest, Ripemd160};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::ChainError;

pub const LEGACY_KEY_PREFIX: &str = "EOS";
pub const COMPRESSED_KEY_LEN: usize = 33;
pub const COMPACT_SIGNATURE_LEN: usize = 65;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyType {
    K1 = 0,
    R1 = 1,
    WebAuthn = 2,
}

impl KeyType {
    pub fn from_index(index: u32) -> Result<Self, ChainError> {
        match index {
            0 => Ok(KeyType::K1),
            1 => Ok(KeyType::R1),
            2 => Ok(KeyType::WebAuthn),
            other => Err(ChainError::UnsupportedKeyType(other)),
        }
    }

    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn suffix(self) -> &'static str {
        match self {
            KeyType::K1 => "K1",
            KeyType::R1 => "R1",
            KeyType::WebAuthn => "WA",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "K1" => Some(KeyType::K1),
            "R1" => Some(KeyType::R1),
            "WA" => Some(KeyType::WebAuthn),
            _ => None,
        }
    }
}

fn checksum(data: &[u8], suffix: &str) -> [u8; 4] {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.update(suffix.as_bytes());
    let digest = hasher.finalize();
    [digest[0], digest[1], digest[2], digest[3]]
}

fn encode_with_checksum(data: &[u8], suffix: &str) -> String {
    let mut payload = data.to_vec();
    payload.extend_from_slice(&checksum(data, suffix));
    bs58::encode(payload).into_string()
}

fn decode_with_checksum(text: &str, suffix: &str) -> Result<Vec<u8>, String> {
    let mut payload = bs58::decode(text).into_vec().map_err(|e| format!("base58 decode error: {e}"))?;
    if payload.len() < 5 {
        return Err("payload too short".to_string());
    }
    let data_len = payload.len() - 4;
    if payload[data_len..] != checksum(&payload[..data_len], suffix) {
        return Err("checksum mismatch".to_string());
    }
    payload.truncate(data_len);
    Ok(payload)
}

/// Splits `PUB_K1_xxx` style text into its key type and base58 body.
fn split_typed<'a>(text: &'a str, prefix: &str) -> Option<(KeyType, &'a str)> {
    let rest = text.strip_prefix(prefix)?;
    let (suffix, body) = rest.split_once('_')?;
    Some((KeyType::from_suffix(suffix)?, body))
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PublicKey {
    pub key_type: KeyType,
    /// Serialized key data as it follows the type index on the wire.
    pub data: Vec<u8>,
}

impl PublicKey {
    pub fn new(key_type: KeyType, data: Vec<u8>) -> Self {
        Self { key_type, data }
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key_type {
            KeyType::K1 => write!(f, "{LEGACY_KEY_PREFIX}{}", encode_with_checksum(&self.data, "")),
            other => write!(f, "PUB_{}_{}", other.suffix(), encode_with_checksum(&self.data, other.suffix())),
        }
    }
}

impl FromStr for PublicKey {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| ChainError::InvalidPublicKey(format!("{s}: {reason}"));

        let (key_type, data) = if let Some((key_type, body)) = split_typed(s, "PUB_") {
            (key_type, decode_with_checksum(body, key_type.suffix()).map_err(invalid)?)
        } else if let Some(body) = s.strip_prefix(LEGACY_KEY_PREFIX) {
            (KeyType::K1, decode_with_checksum(body, "").map_err(invalid)?)
        } else {
            return Err(invalid("unknown prefix".to_string()));
        };

        if key_type != KeyType::WebAuthn && data.len() != COMPRESSED_KEY_LEN {
            return Err(invalid(format!("expected {COMPRESSED_KEY_LEN} bytes, got {}", data.len())));
        }
        Ok(PublicKey { key_type, data })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    pub key_type: KeyType,
    pub data: Vec<u8>,
}

impl Signature {
    pub fn new(key_type: KeyType, data: Vec<u8>) -> Self {
        Self { key_type, data }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = self.key_type.suffix();
        write!(f, "SIG_{suffix}_{}", encode_with_checksum(&self.data, suffix))
    }
}

impl FromStr for Signature {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| ChainError::InvalidSignature(format!("{s}: {reason}"));

        let (key_type, body) = split_typed(s, "SIG_").ok_or_else(|| invalid("unknown prefix".to_string()))?;
        let data = decode_with_checksum(body, key_type.suffix()).map_err(invalid)?;
        if key_type != KeyType::WebAuthn && data.len() != COMPACT_SIGNATURE_LEN {
            return Err(invalid(format!("expected {COMPACT_SIGNATURE_LEN} bytes, got {}", data.len())));
        }
        Ok(Signature { key_type, data })
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

string_serde!(PublicKey, Signature);

#[cfg(test)]
mod tests {
    use super::*;

    const DEV_KEY: &str = "EOS6MRyAjQq8ud7hVNYcfnVPJqcVpscN5So8BhtHuGYqET5GDW5CV";

    #[test]
    fn test_legacy_key_round_trip() {
        let key: PublicKey = DEV_KEY.parse().unwrap();
        assert_eq!(key.key_type, KeyType::K1);
        assert_eq!(
            hex::encode(&key.data),
            "02c0ded2bc1f1305fb0faac5e6c03ee3a1924234985427b6167ca569d13df435cf"
        );
        assert_eq!(key.to_string(), DEV_KEY);
    }

    #[test]
    fn test_typed_key_round_trip() {
        let key = PublicKey::new(KeyType::R1, vec![3u8; COMPRESSED_KEY_LEN]);
        let text = key.to_string();
        assert!(text.starts_with("PUB_R1_"));
        assert_eq!(text.parse::<PublicKey>().unwrap(), key);
    }

    #[test]
    fn test_checksum_is_checked() {
        let mut corrupted = DEV_KEY.to_string();
        corrupted.pop();
        corrupted.push('W');
        assert!(corrupted.parse::<PublicKey>().is_err());
        assert!("PUB_XX_abc".parse::<PublicKey>().is_err());
    }

    #[test]
    fn test_signature_text() {
        let signature = Signature::new(KeyType::K1, vec![7u8; COMPACT_SIGNATURE_LEN]);
        let text = signature.to_string();
        assert!(text.starts_with("SIG_K1_"));
        assert_eq!(text.parse::<Signature>().unwrap(), signature);
    }
}
