use crate::error::{LedgerError, Result};
use bitcoin::{Amount, Denomination};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Logical clock value. One unit per sealed block.
pub type BlockHeight = u64;

/// 20-byte account identity, shown as `0x`-prefixed hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// Deterministic address for a named account
    pub fn from_label(label: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"twothirds/account/");
        hasher.update(label.as_bytes());
        Self::from_digest(&hasher.finalize())
    }

    /// Address of the `nonce`-th contract created by `creator`
    pub fn derive(creator: &Address, nonce: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"twothirds/contract/");
        hasher.update(creator.0);
        hasher.update(nonce.to_be_bytes());
        Self::from_digest(&hasher.finalize())
    }

    fn from_digest(digest: &[u8]) -> Self {
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[..20]);
        Self(bytes)
    }

    /// First 4 bytes in hex, for tables
    pub fn short(&self) -> String {
        format!("0x{}", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped)
            .map_err(|e| LedgerError::invalid_address(format!("{}: {}", s, e)))?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| LedgerError::invalid_address(format!("{}: expected 20 bytes", s)))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Parse a decimal BTC string such as `"0.1"`
pub fn parse_btc(s: &str) -> Result<Amount> {
    Amount::from_str_in(s, Denomination::Bitcoin)
        .map_err(|e| LedgerError::invalid_amount(format!("{}: {}", s, e)))
}

/// `floor(amount * percent / 100)`
pub fn percent_of(amount: Amount, percent: u8) -> Result<Amount> {
    amount
        .checked_mul(u64::from(percent))
        .and_then(|scaled| scaled.checked_div(100))
        .ok_or(LedgerError::AmountOverflow)
}
