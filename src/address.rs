//! Address codecs shared by both chains
//!
//! Base58 for source-chain keys, hex for target-chain addresses and payloads,
//! and fixed-width normalization. Everything here is pure and fails with
//! [`BridgeError::Format`] on malformed input.

use crate::tx_builder::errors::{BridgeError, BridgeResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::str::FromStr;

/// Width of a target-chain address in bytes
pub const EVM_ADDRESS_LEN: usize = 20;

/// Decode base58 text into bytes
///
/// Each leading `'1'` becomes one leading zero byte.
pub fn decode_base58(text: &str) -> BridgeResult<Vec<u8>> {
    bs58::decode(text)
        .into_vec()
        .map_err(|e| BridgeError::format(format!("invalid base58 '{}': {}", text, e)))
}

/// Encode bytes as base58 text
pub fn encode_base58(bytes: &[u8]) -> String {
    bs58::encode(bytes).into_string()
}

/// Parse a source-chain public key from base58 text
pub fn parse_pubkey(text: &str) -> BridgeResult<Pubkey> {
    let bytes = decode_base58(text.trim())?;
    let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        BridgeError::format(format!(
            "public key must decode to 32 bytes, got {}",
            bytes.len()
        ))
    })?;
    Ok(Pubkey::new_from_array(arr))
}

/// Decode hex text (optional `0x` prefix) into bytes
pub fn hex_to_bytes(text: &str) -> BridgeResult<Vec<u8>> {
    let stripped = strip_hex_prefix(text.trim());
    if stripped.len() % 2 != 0 {
        return Err(BridgeError::format(format!(
            "hex string has odd length {}",
            stripped.len()
        )));
    }
    hex::decode(stripped).map_err(|e| BridgeError::format(format!("invalid hex: {}", e)))
}

/// Encode bytes as `0x`-prefixed lowercase hex
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn strip_hex_prefix(text: &str) -> &str {
    text.strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text)
}

/// Input accepted by [`to_fixed_width_address`]
#[derive(Debug, Clone, Copy)]
pub enum HexOrBytes<'a> {
    Hex(&'a str),
    Bytes(&'a [u8]),
}

impl<'a> From<&'a str> for HexOrBytes<'a> {
    fn from(s: &'a str) -> Self {
        HexOrBytes::Hex(s)
    }
}

impl<'a> From<&'a [u8]> for HexOrBytes<'a> {
    fn from(b: &'a [u8]) -> Self {
        HexOrBytes::Bytes(b)
    }
}

/// Normalize hex text or raw bytes into exactly `width` bytes
pub fn to_fixed_width_address<'a>(
    input: impl Into<HexOrBytes<'a>>,
    width: usize,
) -> BridgeResult<Vec<u8>> {
    let bytes = match input.into() {
        HexOrBytes::Hex(text) => hex_to_bytes(text)?,
        HexOrBytes::Bytes(raw) => raw.to_vec(),
    };
    if bytes.len() != width {
        return Err(BridgeError::format(format!(
            "expected {} bytes, got {}",
            width,
            bytes.len()
        )));
    }
    Ok(bytes)
}

pub fn to_address20<'a>(input: impl Into<HexOrBytes<'a>>) -> BridgeResult<EvmAddress> {
    EvmAddress::parse(input)
}

/// 20-byte target-chain address
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EvmAddress(pub [u8; EVM_ADDRESS_LEN]);

impl EvmAddress {
    pub const ZERO: EvmAddress = EvmAddress([0u8; EVM_ADDRESS_LEN]);

    pub fn new(bytes: [u8; EVM_ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse from hex text or bytes of exactly 20 bytes
    pub fn parse<'a>(input: impl Into<HexOrBytes<'a>>) -> BridgeResult<Self> {
        let bytes = to_fixed_width_address(input, EVM_ADDRESS_LEN)?;
        let mut out = [0u8; EVM_ADDRESS_LEN];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; EVM_ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bytes_to_hex(&self.0))
    }
}

impl fmt::Debug for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EvmAddress({})", self)
    }
}

impl FromStr for EvmAddress {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for EvmAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EvmAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        EvmAddress::parse(s.as_str()).map_err(serde::de::Error::custom)
    }
}
