//! Hex/decimal identifier parsing
//!
//! USB identifiers are written as `0x1D6B` on the command line and in config
//! files, but plain decimal is accepted too.

use crate::{Error, Result};

/// Parse a `u16` written as `0x`-prefixed hex or as decimal
pub fn parse_hex_or_dec_u16(input: &str) -> Result<u16> {
    let trimmed = input.trim();
    let parsed = match strip_hex_prefix(trimmed) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => trimmed.parse::<u16>(),
    };
    parsed.map_err(|e| Error::InvalidId {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a `u8` written as `0x`-prefixed hex or as decimal
pub fn parse_hex_or_dec_u8(input: &str) -> Result<u8> {
    let trimmed = input.trim();
    let parsed = match strip_hex_prefix(trimmed) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => trimmed.parse::<u8>(),
    };
    parsed.map_err(|e| Error::InvalidId {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

fn strip_hex_prefix(input: &str) -> Option<&str> {
    input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
}

/// Serde adapters for identifiers stored as `"0x1D6B"` strings or integers
///
/// Use as `#[serde(with = "common::ids::serde_hex::hex_u16")]`.
pub mod serde_hex {
    use serde::{Deserialize, Deserializer, Serializer, de};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Text(String),
    }

    pub mod hex_u16 {
        use super::*;

        pub fn serialize<S>(value: &u16, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(&format!("0x{:04X}", value))
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<u16, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Raw::deserialize(deserializer)? {
                Raw::Int(n) => u16::try_from(n).map_err(de::Error::custom),
                Raw::Text(s) => crate::parse_hex_or_dec_u16(&s).map_err(de::Error::custom),
            }
        }
    }

    pub mod hex_u8 {
        use super::*;

        pub fn serialize<S>(value: &u8, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(&format!("0x{:02X}", value))
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<u8, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Raw::deserialize(deserializer)? {
                Raw::Int(n) => u8::try_from(n).map_err(de::Error::custom),
                Raw::Text(s) => crate::parse_hex_or_dec_u8(&s).map_err(de::Error::custom),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex_or_dec_u16("0x1D6B").unwrap(), 0x1d6b);
        assert_eq!(parse_hex_or_dec_u16("0X0010").unwrap(), 0x0010);
        assert_eq!(parse_hex_or_dec_u8("0x81").unwrap(), 0x81);
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_hex_or_dec_u16("64").unwrap(), 64);
        assert_eq!(parse_hex_or_dec_u8(" 0 ").unwrap(), 0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_hex_or_dec_u16("0xGHIJ").is_err());
        assert!(parse_hex_or_dec_u16("0x12345").is_err());
        assert!(parse_hex_or_dec_u8("0x100").is_err());
        assert!(parse_hex_or_dec_u8("").is_err());
    }
}
