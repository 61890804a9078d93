use std::str::FromStr;

use thiserror::Error;

/// 20-byte account or contract address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; 20]);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("address is not valid hex: {0}")]
    InvalidHex(String),
    #[error("address must be 20 bytes, got {0}")]
    InvalidLength(usize),
}

impl Address {
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    /// Accepts 40 hex digits with or without a `0x` prefix, any case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|e| AddressParseError::InvalidHex(e.to_string()))?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| AddressParseError::InvalidLength(b.len()))?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_and_without_prefix() {
        let a: Address = "0x7B9d950cC1ecD94eD0cF3916989B0ac56C70AB24".parse().unwrap();
        let b: Address = "7b9d950cc1ecd94ed0cf3916989b0ac56c70ab24".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "0x7b9d950cc1ecd94ed0cf3916989b0ac56c70ab24");
    }

    #[test]
    fn test_short_address_rejected() {
        assert_eq!(
            "0x1".parse::<Address>(),
            Err(AddressParseError::InvalidHex("Odd number of digits".to_string()))
        );
        assert_eq!("0x01".parse::<Address>(), Err(AddressParseError::InvalidLength(1)));
    }

    #[test]
    fn test_non_hex_rejected() {
        assert!(matches!(
            "0xzz9d950cc1ecd94ed0cf3916989b0ac56c70ab24".parse::<Address>(),
            Err(AddressParseError::InvalidHex(_))
        ));
    }
}
