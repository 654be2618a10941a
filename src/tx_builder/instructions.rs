//! Wire encoding of bridge and relay instructions
//!
//! Every payload is an 8-byte discriminator followed by a fixed positional
//! schema. Integers are little-endian. The receiving programs parse by
//! offset, so field order here must never change:
//!
//! - PayForRelay:  disc | salt(32) | outgoing_message(32) | gas_limit(u64)
//! - BridgeNative: disc | salt(32) | to(20) | amount(u64) | call?
//! - BridgeToken:  disc | salt(32) | to(20) | remote_token(20) | amount(u64) | call?
//!
//! The optional call is `0u8` when absent, otherwise
//! `1u8 | kind(u8) | target(20) | value(u128) | len(u32) | data`, with the
//! target zero-filled for deployments.

use crate::address::{EvmAddress, EVM_ADDRESS_LEN};
use crate::tx_builder::call::{CallKind, ContractCall};
use crate::tx_builder::errors::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
};

/// Length of an instruction discriminator
pub const DISCRIMINATOR_LEN: usize = 8;
/// Length of a bridge salt
pub const SALT_LEN: usize = 32;

/// 8-byte tag selecting the instruction handler in the receiving program
pub type Discriminator = [u8; DISCRIMINATOR_LEN];

/// Anchor-style discriminator: first 8 bytes of `sha256("global:<name>")`
pub fn anchor_discriminator(ix_name: &str) -> Discriminator {
    let digest = Sha256::digest(format!("global:{}", ix_name).as_bytes());
    let mut out = [0u8; DISCRIMINATOR_LEN];
    out.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
    out
}

/// Discriminators of the three instructions this crate emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discriminators {
    pub pay_for_relay: Discriminator,
    pub bridge_native: Discriminator,
    pub bridge_token: Discriminator,
}

impl Default for Discriminators {
    fn default() -> Self {
        Self {
            pay_for_relay: anchor_discriminator("pay_for_relay"),
            bridge_native: anchor_discriminator("bridge_sol"),
            bridge_token: anchor_discriminator("bridge_spl"),
        }
    }
}

// ============================================================================
// Call descriptor wire layer
// ============================================================================

const CALL_ABSENT: u8 = 0;
const CALL_PRESENT: u8 = 1;

/// Append the optional call descriptor to `out`
pub fn encode_call_descriptor(call: Option<&ContractCall>, out: &mut Vec<u8>) -> BridgeResult<()> {
    let Some(call) = call else {
        out.push(CALL_ABSENT);
        return Ok(());
    };

    call.validate()?;
    let data = call.data();
    let len = u32::try_from(data.len()).map_err(|_| {
        BridgeError::range(format!("call payload of {} bytes exceeds u32 length", data.len()))
    })?;

    out.reserve(1 + 1 + EVM_ADDRESS_LEN + 16 + 4 + data.len());
    out.push(CALL_PRESENT);
    out.push(call.kind().tag());
    match call.target() {
        Some(target) => out.extend_from_slice(target.as_bytes()),
        None => out.extend_from_slice(&[0u8; EVM_ADDRESS_LEN]),
    }
    out.extend_from_slice(&call.value().to_le_bytes());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(data);
    Ok(())
}

/// Decode a call descriptor, returning it and the number of bytes consumed
pub fn decode_call_descriptor(bytes: &[u8]) -> BridgeResult<(Option<ContractCall>, usize)> {
    let mut reader = Reader::new(bytes);
    match reader.u8()? {
        CALL_ABSENT => return Ok((None, reader.pos)),
        CALL_PRESENT => {}
        other => {
            return Err(BridgeError::format(format!(
                "invalid call presence flag {}",
                other
            )))
        }
    }

    let kind = CallKind::from_tag(reader.u8()?)?;
    let target = EvmAddress::parse(reader.take(EVM_ADDRESS_LEN)?)?;
    let value = u128::from_le_bytes(reader.array::<16>()?);
    let len = u32::from_le_bytes(reader.array::<4>()?) as usize;
    let data = reader.take(len)?.to_vec();

    let call = match kind {
        CallKind::Call => ContractCall::call(target, value, data)?,
        CallKind::DelegateCall => {
            let call = ContractCall::DelegateCall {
                target,
                value,
                data,
            };
            call.validate()?;
            call
        }
        CallKind::Create => ContractCall::Create { value, data },
        CallKind::Create2 => ContractCall::Create2 { value, data },
    };
    Ok((Some(call), reader.pos))
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> BridgeResult<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.bytes.len()).ok_or_else(|| {
            BridgeError::format(format!(
                "truncated call descriptor: need {} bytes at offset {}, have {}",
                n,
                self.pos,
                self.bytes.len()
            ))
        })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> BridgeResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn array<const N: usize>(&mut self) -> BridgeResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}

// ============================================================================
// Instruction payloads
// ============================================================================

/// PayForRelay payload
pub fn encode_pay_for_relay_data(
    discriminator: &Discriminator,
    salt: &[u8; SALT_LEN],
    outgoing_message: &Pubkey,
    gas_limit: u64,
) -> Vec<u8> {
    let mut data = Vec::with_capacity(DISCRIMINATOR_LEN + SALT_LEN + 32 + 8);
    data.extend_from_slice(discriminator);
    data.extend_from_slice(salt);
    data.extend_from_slice(outgoing_message.as_ref());
    data.extend_from_slice(&gas_limit.to_le_bytes());
    data
}

/// BridgeNative payload
pub fn encode_bridge_native_data(
    discriminator: &Discriminator,
    salt: &[u8; SALT_LEN],
    to: &EvmAddress,
    amount: u64,
    call: Option<&ContractCall>,
) -> BridgeResult<Vec<u8>> {
    let mut data = Vec::with_capacity(DISCRIMINATOR_LEN + SALT_LEN + EVM_ADDRESS_LEN + 8 + 1);
    data.extend_from_slice(discriminator);
    data.extend_from_slice(salt);
    data.extend_from_slice(to.as_bytes());
    data.extend_from_slice(&amount.to_le_bytes());
    encode_call_descriptor(call, &mut data)?;
    Ok(data)
}

/// BridgeToken payload
pub fn encode_bridge_token_data(
    discriminator: &Discriminator,
    salt: &[u8; SALT_LEN],
    to: &EvmAddress,
    remote_token: &EvmAddress,
    amount: u64,
    call: Option<&ContractCall>,
) -> BridgeResult<Vec<u8>> {
    let mut data =
        Vec::with_capacity(DISCRIMINATOR_LEN + SALT_LEN + 2 * EVM_ADDRESS_LEN + 8 + 1);
    data.extend_from_slice(discriminator);
    data.extend_from_slice(salt);
    data.extend_from_slice(to.as_bytes());
    data.extend_from_slice(remote_token.as_bytes());
    data.extend_from_slice(&amount.to_le_bytes());
    encode_call_descriptor(call, &mut data)?;
    Ok(data)
}

// ============================================================================
// Instructions with account metas
// ============================================================================

/// Accounts of a PayForRelay instruction
#[derive(Debug, Clone)]
pub struct PayForRelayAccounts {
    pub payer: Pubkey,
    pub relay_config: Pubkey,
    pub gas_fee_receiver: Pubkey,
    pub relay_message: Pubkey,
}

/// Accounts of a BridgeNative instruction
#[derive(Debug, Clone)]
pub struct BridgeNativeAccounts {
    pub payer: Pubkey,
    pub from: Pubkey,
    pub gas_fee_receiver: Pubkey,
    pub sol_vault: Pubkey,
    pub bridge: Pubkey,
    pub outgoing_message: Pubkey,
}

/// Accounts of a BridgeToken instruction
#[derive(Debug, Clone)]
pub struct BridgeTokenAccounts {
    pub payer: Pubkey,
    pub from: Pubkey,
    pub gas_fee_receiver: Pubkey,
    pub mint: Pubkey,
    pub from_token_account: Pubkey,
    pub token_vault: Pubkey,
    pub bridge: Pubkey,
    pub outgoing_message: Pubkey,
    pub token_program: Pubkey,
}

pub fn pay_for_relay_instruction(
    relayer_program: &Pubkey,
    accounts: &PayForRelayAccounts,
    discriminator: &Discriminator,
    salt: &[u8; SALT_LEN],
    outgoing_message: &Pubkey,
    gas_limit: u64,
) -> Instruction {
    Instruction::new_with_bytes(
        *relayer_program,
        &encode_pay_for_relay_data(discriminator, salt, outgoing_message, gas_limit),
        vec![
            AccountMeta::new(accounts.payer, true),
            AccountMeta::new(accounts.relay_config, false),
            AccountMeta::new(accounts.gas_fee_receiver, false),
            AccountMeta::new(accounts.relay_message, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}

pub fn bridge_native_instruction(
    bridge_program: &Pubkey,
    accounts: &BridgeNativeAccounts,
    discriminator: &Discriminator,
    salt: &[u8; SALT_LEN],
    to: &EvmAddress,
    amount: u64,
    call: Option<&ContractCall>,
) -> BridgeResult<Instruction> {
    let data = encode_bridge_native_data(discriminator, salt, to, amount, call)?;
    Ok(Instruction::new_with_bytes(
        *bridge_program,
        &data,
        vec![
            AccountMeta::new(accounts.payer, true),
            AccountMeta::new(accounts.from, false),
            AccountMeta::new(accounts.gas_fee_receiver, false),
            AccountMeta::new(accounts.sol_vault, false),
            AccountMeta::new(accounts.bridge, false),
            AccountMeta::new(accounts.outgoing_message, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    ))
}

#[allow(clippy::too_many_arguments)]
pub fn bridge_token_instruction(
    bridge_program: &Pubkey,
    accounts: &BridgeTokenAccounts,
    discriminator: &Discriminator,
    salt: &[u8; SALT_LEN],
    to: &EvmAddress,
    remote_token: &EvmAddress,
    amount: u64,
    call: Option<&ContractCall>,
) -> BridgeResult<Instruction> {
    let data = encode_bridge_token_data(discriminator, salt, to, remote_token, amount, call)?;
    Ok(Instruction::new_with_bytes(
        *bridge_program,
        &data,
        vec![
            AccountMeta::new(accounts.payer, true),
            AccountMeta::new_readonly(accounts.from, true),
            AccountMeta::new(accounts.gas_fee_receiver, false),
            AccountMeta::new(accounts.mint, false),
            AccountMeta::new(accounts.from_token_account, false),
            AccountMeta::new(accounts.token_vault, false),
            AccountMeta::new(accounts.bridge, false),
            AccountMeta::new(accounts.outgoing_message, false),
            AccountMeta::new_readonly(accounts.token_program, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    ))
}

// ============================================================================
// Order validation
// ============================================================================

/// Role of an instruction inside a bridge plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionRole {
    Relay,
    Bridge,
    Other,
}

/// Classify an instruction by its discriminator prefix
pub fn classify_instruction(ix: &Instruction, discriminators: &Discriminators) -> InstructionRole {
    let Some(prefix) = ix.data.get(..DISCRIMINATOR_LEN) else {
        return InstructionRole::Other;
    };
    if prefix == discriminators.pay_for_relay {
        InstructionRole::Relay
    } else if prefix == discriminators.bridge_native || prefix == discriminators.bridge_token {
        InstructionRole::Bridge
    } else {
        InstructionRole::Other
    }
}

/// Validate relay/bridge ordering
///
/// Accepted shapes are `[Bridge]` and `[Relay, Bridge]`. The relay message
/// account is keyed by the same salt as the outgoing message, so the relay
/// payment must land first.
pub fn sanity_check_plan_order(
    instructions: &[Instruction],
    discriminators: &Discriminators,
) -> BridgeResult<()> {
    if instructions.is_empty() {
        return Err(BridgeError::invalid_order("plan has no instructions"));
    }

    let roles: Vec<InstructionRole> = instructions
        .iter()
        .map(|ix| classify_instruction(ix, discriminators))
        .collect();

    if let Some(idx) = roles.iter().position(|r| *r == InstructionRole::Other) {
        return Err(BridgeError::invalid_order(format!(
            "unrecognized instruction at index {}",
            idx
        )));
    }

    let relay_count = roles.iter().filter(|r| **r == InstructionRole::Relay).count();
    let bridge_count = roles.iter().filter(|r| **r == InstructionRole::Bridge).count();

    if relay_count > 1 {
        return Err(BridgeError::invalid_order("more than one relay instruction"));
    }
    if bridge_count != 1 {
        return Err(BridgeError::invalid_order(format!(
            "expected exactly one bridge instruction, found {}",
            bridge_count
        )));
    }
    if relay_count == 1 && roles[0] != InstructionRole::Relay {
        return Err(BridgeError::invalid_order("relay instruction must come first"));
    }
    if roles[roles.len() - 1] != InstructionRole::Bridge {
        return Err(BridgeError::invalid_order("bridge instruction must be last"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISC: Discriminator = [1, 2, 3, 4, 5, 6, 7, 8];
    const SALT: [u8; 32] = [0xAA; 32];

    fn dest() -> EvmAddress {
        EvmAddress::new([0xBB; 20])
    }

    #[test]
    fn test_bridge_native_layout_without_call() {
        let data = encode_bridge_native_data(&DISC, &SALT, &dest(), 1000, None).unwrap();

        assert_eq!(data.len(), 69);
        assert_eq!(&data[0..8], &DISC);
        assert_eq!(&data[8..40], &SALT);
        assert_eq!(&data[40..60], &[0xBB; 20]);
        assert_eq!(&data[60..68], &1000u64.to_le_bytes());
        assert_eq!(&data[68..], &[0x00]);
    }

    #[test]
    fn test_bridge_native_layout_with_call() {
        let target = EvmAddress::new([0x11; 20]);
        let call = ContractCall::call(target, 5, vec![0xde, 0xad, 0xbe, 0xef]).unwrap();
        let data = encode_bridge_native_data(&DISC, &SALT, &dest(), 1000, Some(&call)).unwrap();

        let tail = &data[68..];
        assert_eq!(tail[0], 1);
        assert_eq!(tail[1], 0);
        assert_eq!(&tail[2..22], &[0x11; 20]);
        assert_eq!(&tail[22..38], &5u128.to_le_bytes());
        assert_eq!(&tail[38..42], &4u32.to_le_bytes());
        assert_eq!(&tail[42..], &[0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_create_zero_fills_target() {
        let call = ContractCall::from_parts(
            CallKind::Create,
            Some("0x2222222222222222222222222222222222222222"),
            "0",
            "0x6080",
        )
        .unwrap();
        let mut out = Vec::new();
        encode_call_descriptor(Some(&call), &mut out).unwrap();

        assert_eq!(out[0], 1);
        assert_eq!(out[1], 2);
        assert_eq!(&out[2..22], &[0u8; 20]);
    }

    #[test]
    fn test_decode_call_descriptor() {
        let mut out = Vec::new();
        encode_call_descriptor(None, &mut out).unwrap();
        assert_eq!(decode_call_descriptor(&out).unwrap(), (None, 1));

        let call = ContractCall::Create2 {
            value: 7,
            data: vec![1, 2, 3],
        };
        let mut out = Vec::new();
        encode_call_descriptor(Some(&call), &mut out).unwrap();
        let (decoded, used) = decode_call_descriptor(&out).unwrap();
        assert_eq!(decoded, Some(call));
        assert_eq!(used, out.len());
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(decode_call_descriptor(&[]).is_err());
        assert!(decode_call_descriptor(&[2]).is_err());
        // call with zero target
        let mut bytes = vec![1, 0];
        bytes.extend_from_slice(&[0u8; 20]);
        bytes.extend_from_slice(&0u128.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        assert!(matches!(
            decode_call_descriptor(&bytes),
            Err(BridgeError::Format(_))
        ));
        // declared payload longer than buffer
        let mut bytes = vec![1, 2];
        bytes.extend_from_slice(&[0u8; 20]);
        bytes.extend_from_slice(&0u128.to_le_bytes());
        bytes.extend_from_slice(&10u32.to_le_bytes());
        bytes.extend_from_slice(&[1, 2]);
        assert!(decode_call_descriptor(&bytes).is_err());
    }

    #[test]
    fn test_pay_for_relay_layout() {
        let outgoing = Pubkey::new_from_array([0xCC; 32]);
        let data = encode_pay_for_relay_data(&DISC, &SALT, &outgoing, 200_000);

        assert_eq!(data.len(), 80);
        assert_eq!(&data[0..8], &DISC);
        assert_eq!(&data[8..40], &SALT);
        assert_eq!(&data[40..72], &[0xCC; 32]);
        assert_eq!(&data[72..80], &200_000u64.to_le_bytes());
    }

    #[test]
    fn test_bridge_token_layout() {
        let remote = EvmAddress::new([0xDD; 20]);
        let data = encode_bridge_token_data(&DISC, &SALT, &dest(), &remote, 42, None).unwrap();

        assert_eq!(data.len(), 89);
        assert_eq!(&data[40..60], &[0xBB; 20]);
        assert_eq!(&data[60..80], &[0xDD; 20]);
        assert_eq!(&data[80..88], &42u64.to_le_bytes());
        assert_eq!(data[88], 0);
    }

    #[test]
    fn test_account_meta_flags() {
        let accounts = BridgeNativeAccounts {
            payer: Pubkey::new_unique(),
            from: Pubkey::new_unique(),
            gas_fee_receiver: Pubkey::new_unique(),
            sol_vault: Pubkey::new_unique(),
            bridge: Pubkey::new_unique(),
            outgoing_message: Pubkey::new_unique(),
        };
        let program = Pubkey::new_unique();
        let ix = bridge_native_instruction(&program, &accounts, &DISC, &SALT, &dest(), 1, None)
            .unwrap();

        assert_eq!(ix.program_id, program);
        assert_eq!(ix.accounts.len(), 7);
        assert!(ix.accounts[0].is_signer && ix.accounts[0].is_writable);
        assert!(ix.accounts[1..6].iter().all(|m| m.is_writable && !m.is_signer));
        assert_eq!(ix.accounts[6].pubkey, system_program::id());
        assert!(!ix.accounts[6].is_writable);
    }

    #[test]
    fn test_default_discriminators_are_distinct() {
        let d = Discriminators::default();
        assert_ne!(d.pay_for_relay, d.bridge_native);
        assert_ne!(d.bridge_native, d.bridge_token);
        assert_eq!(d.bridge_native, anchor_discriminator("bridge_sol"));
    }

    #[test]
    fn test_plan_order_checks() {
        let d = Discriminators::default();
        let payer = Pubkey::new_unique();
        let relay = pay_for_relay_instruction(
            &Pubkey::new_unique(),
            &PayForRelayAccounts {
                payer,
                relay_config: Pubkey::new_unique(),
                gas_fee_receiver: Pubkey::new_unique(),
                relay_message: Pubkey::new_unique(),
            },
            &d.pay_for_relay,
            &SALT,
            &Pubkey::new_unique(),
            200_000,
        );
        let bridge = bridge_native_instruction(
            &Pubkey::new_unique(),
            &BridgeNativeAccounts {
                payer,
                from: payer,
                gas_fee_receiver: Pubkey::new_unique(),
                sol_vault: Pubkey::new_unique(),
                bridge: Pubkey::new_unique(),
                outgoing_message: Pubkey::new_unique(),
            },
            &d.bridge_native,
            &SALT,
            &dest(),
            1,
            None,
        )
        .unwrap();

        assert!(sanity_check_plan_order(&[relay.clone(), bridge.clone()], &d).is_ok());
        assert!(sanity_check_plan_order(&[bridge.clone()], &d).is_ok());
        assert!(sanity_check_plan_order(&[], &d).is_err());
        assert!(sanity_check_plan_order(&[bridge.clone(), relay.clone()], &d).is_err());
        assert!(sanity_check_plan_order(&[relay.clone()], &d).is_err());
        let doubled = [relay.clone(), relay.clone(), bridge.clone()];
        assert!(sanity_check_plan_order(&doubled, &d).is_err());
        assert!(sanity_check_plan_order(&[bridge.clone(), bridge.clone()], &d).is_err());

        let transfer = solana_sdk::system_instruction::transfer(&payer, &payer, 1);
        assert!(matches!(
            sanity_check_plan_order(&[transfer, bridge], &d),
            Err(BridgeError::InvalidInstructionOrder(_))
        ));
    }
}
