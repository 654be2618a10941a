//! Typed model of the optional follow-on contract call
//!
//! The wire layout lives in [`super::instructions`]; this module only deals
//! with building a valid call from loosely typed inputs.

use crate::address::{hex_to_bytes, EvmAddress};
use crate::tx_builder::errors::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed-point precision of call values (wei per whole unit)
pub const VALUE_DECIMALS: u32 = 18;

/// Execution kind of a follow-on call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Call,
    DelegateCall,
    Create,
    Create2,
}

impl CallKind {
    /// Wire tag of this kind
    pub fn tag(self) -> u8 {
        match self {
            CallKind::Call => 0,
            CallKind::DelegateCall => 1,
            CallKind::Create => 2,
            CallKind::Create2 => 3,
        }
    }

    pub fn from_tag(tag: u8) -> BridgeResult<Self> {
        match tag {
            0 => Ok(CallKind::Call),
            1 => Ok(CallKind::DelegateCall),
            2 => Ok(CallKind::Create),
            3 => Ok(CallKind::Create2),
            other => Err(BridgeError::format(format!("unknown call kind tag {}", other))),
        }
    }

    pub fn requires_target(self) -> bool {
        matches!(self, CallKind::Call | CallKind::DelegateCall)
    }
}

impl FromStr for CallKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" => Ok(CallKind::Call),
            "delegatecall" => Ok(CallKind::DelegateCall),
            "create" => Ok(CallKind::Create),
            "create2" => Ok(CallKind::Create2),
            other => Err(BridgeError::format(format!("unknown call kind '{}'", other))),
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CallKind::Call => "call",
            CallKind::DelegateCall => "delegatecall",
            CallKind::Create => "create",
            CallKind::Create2 => "create2",
        };
        f.write_str(s)
    }
}

/// Follow-on call executed by the destination account on the target chain
///
/// Deployments carry no target at the type level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    Call {
        target: EvmAddress,
        value: u128,
        data: Vec<u8>,
    },
    DelegateCall {
        target: EvmAddress,
        value: u128,
        data: Vec<u8>,
    },
    Create {
        value: u128,
        data: Vec<u8>,
    },
    Create2 {
        value: u128,
        data: Vec<u8>,
    },
}

impl ContractCall {
    /// Plain call; rejects the zero address
    pub fn call(target: EvmAddress, value: u128, data: Vec<u8>) -> BridgeResult<Self> {
        require_target(CallKind::Call, Some(target))?;
        Ok(ContractCall::Call {
            target,
            value,
            data,
        })
    }

    /// Build a call from untyped parts
    ///
    /// * `target` - hex address, required for call/delegatecall, ignored otherwise
    /// * `value` - decimal amount in whole units (18-decimal fixed point)
    /// * `data_hex` - calldata or init code as hex, may be empty
    pub fn from_parts(
        kind: CallKind,
        target: Option<&str>,
        value: &str,
        data_hex: &str,
    ) -> BridgeResult<Self> {
        let value = parse_call_value(value)?;
        let data = if data_hex.trim().is_empty() {
            Vec::new()
        } else {
            hex_to_bytes(data_hex)?
        };

        Ok(match kind {
            CallKind::Call | CallKind::DelegateCall => {
                let text = target.map(str::trim).filter(|t| !t.is_empty()).ok_or_else(|| {
                    BridgeError::format(format!("{} requires a target address", kind))
                })?;
                let target = EvmAddress::parse(text)?;
                require_target(kind, Some(target))?;
                if kind == CallKind::Call {
                    ContractCall::Call {
                        target,
                        value,
                        data,
                    }
                } else {
                    ContractCall::DelegateCall {
                        target,
                        value,
                        data,
                    }
                }
            }
            CallKind::Create => ContractCall::Create { value, data },
            CallKind::Create2 => ContractCall::Create2 { value, data },
        })
    }

    pub fn kind(&self) -> CallKind {
        match self {
            ContractCall::Call { .. } => CallKind::Call,
            ContractCall::DelegateCall { .. } => CallKind::DelegateCall,
            ContractCall::Create { .. } => CallKind::Create,
            ContractCall::Create2 { .. } => CallKind::Create2,
        }
    }

    pub fn target(&self) -> Option<&EvmAddress> {
        match self {
            ContractCall::Call { target, .. } | ContractCall::DelegateCall { target, .. } => {
                Some(target)
            }
            ContractCall::Create { .. } | ContractCall::Create2 { .. } => None,
        }
    }

    pub fn value(&self) -> u128 {
        match self {
            ContractCall::Call { value, .. }
            | ContractCall::DelegateCall { value, .. }
            | ContractCall::Create { value, .. }
            | ContractCall::Create2 { value, .. } => *value,
        }
    }

    pub fn data(&self) -> &[u8] {
        match self {
            ContractCall::Call { data, .. }
            | ContractCall::DelegateCall { data, .. }
            | ContractCall::Create { data, .. }
            | ContractCall::Create2 { data, .. } => data,
        }
    }

    /// Re-check invariants that the constructors enforce
    pub fn validate(&self) -> BridgeResult<()> {
        require_target(self.kind(), self.target().copied())
    }
}

fn require_target(kind: CallKind, target: Option<EvmAddress>) -> BridgeResult<()> {
    if !kind.requires_target() {
        return Ok(());
    }
    match target {
        Some(t) if !t.is_zero() => Ok(()),
        _ => Err(BridgeError::format(format!(
            "{} requires a non-zero target address",
            kind
        ))),
    }
}

/// Parse a decimal amount string at 18-decimal fixed point into base units
///
/// `"1.5"` becomes `1_500_000_000_000_000_000`. Values above `u128::MAX`
/// fail with [`BridgeError::Range`].
pub fn parse_call_value(text: &str) -> BridgeResult<u128> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(0);
    }

    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(BridgeError::format(format!("invalid value '{}'", text)));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(BridgeError::format(format!("invalid value '{}'", text)));
    }
    if frac.len() > VALUE_DECIMALS as usize {
        return Err(BridgeError::format(format!(
            "value '{}' has more than {} decimals",
            text, VALUE_DECIMALS
        )));
    }

    let overflow = || BridgeError::range(format!("value '{}' exceeds 128-bit bound", text));
    let scale = 10u128.pow(VALUE_DECIMALS);

    let whole_units = if whole.is_empty() {
        0
    } else {
        whole.parse::<u128>().map_err(|_| overflow())?
    };
    let mut frac_digits = frac.to_string();
    while frac_digits.len() < VALUE_DECIMALS as usize {
        frac_digits.push('0');
    }
    let frac_units = frac_digits.parse::<u128>().map_err(|_| overflow())?;

    whole_units
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_call_value() {
        assert_eq!(parse_call_value("0").unwrap(), 0);
        assert_eq!(parse_call_value("").unwrap(), 0);
        assert_eq!(parse_call_value("1").unwrap(), 1_000_000_000_000_000_000);
        assert_eq!(parse_call_value("1.5").unwrap(), 1_500_000_000_000_000_000);
        assert_eq!(parse_call_value(".25").unwrap(), 250_000_000_000_000_000);
        assert_eq!(parse_call_value("0.000000000000000001").unwrap(), 1);
    }

    #[test]
    fn test_parse_call_value_rejects_garbage() {
        assert!(matches!(parse_call_value("abc"), Err(BridgeError::Format(_))));
        assert!(matches!(parse_call_value("-1"), Err(BridgeError::Format(_))));
        assert!(matches!(parse_call_value("."), Err(BridgeError::Format(_))));
        assert!(matches!(
            parse_call_value("0.0000000000000000001"),
            Err(BridgeError::Format(_))
        ));
    }

    #[test]
    fn test_parse_call_value_range() {
        // u128::MAX / 1e18 is about 3.4e20
        assert!(parse_call_value("340282366920938463463").is_ok());
        assert!(matches!(
            parse_call_value("340282366920938463464"),
            Err(BridgeError::Range(_))
        ));
        assert!(matches!(
            parse_call_value("1000000000000000000000000000000000000000000"),
            Err(BridgeError::Range(_))
        ));
    }

    #[test]
    fn test_call_requires_target() {
        let err = ContractCall::from_parts(CallKind::Call, None, "0", "").unwrap_err();
        assert!(matches!(err, BridgeError::Format(_)));

        let err = ContractCall::from_parts(CallKind::Call, Some(""), "0", "").unwrap_err();
        assert!(matches!(err, BridgeError::Format(_)));

        let zero = "0x0000000000000000000000000000000000000000";
        let err =
            ContractCall::from_parts(CallKind::DelegateCall, Some(zero), "0", "").unwrap_err();
        assert!(matches!(err, BridgeError::Format(_)));
    }

    #[test]
    fn test_create_ignores_target() {
        let target = "0x1111111111111111111111111111111111111111";
        let call = ContractCall::from_parts(CallKind::Create, Some(target), "2", "0x6080").unwrap();
        assert_eq!(call.kind(), CallKind::Create);
        assert!(call.target().is_none());
        assert_eq!(call.value(), 2_000_000_000_000_000_000);
        assert_eq!(call.data(), &[0x60, 0x80]);
    }

    #[test]
    fn test_payload_must_be_even_hex() {
        let target = "0x1111111111111111111111111111111111111111";
        assert!(ContractCall::from_parts(CallKind::Call, Some(target), "0", "0xabc").is_err());
        assert!(ContractCall::from_parts(CallKind::Call, Some(target), "0", "0xzz").is_err());
    }

    #[test]
    fn test_kind_parsing_and_tags() {
        for (s, tag) in [("call", 0u8), ("DelegateCall", 1), ("create", 2), ("create2", 3)] {
            let kind: CallKind = s.parse().unwrap();
            assert_eq!(kind.tag(), tag);
            assert_eq!(CallKind::from_tag(tag).unwrap(), kind);
        }
        assert!(CallKind::from_tag(4).is_err());
        assert!("staticcall".parse::<CallKind>().is_err());
    }
}
