//! Program-derived address lookup
//!
//! The bump-seed search is delegated to the Solana SDK; this module only
//! fixes the seed conventions the bridge programs use.

use solana_sdk::pubkey::Pubkey;

/// Seed tag of the per-attempt outgoing message account (bridge program)
pub const OUTGOING_MESSAGE_SEED: &[u8] = b"outgoing_message";
/// Seed tag of the per-attempt relay message account (relayer program)
pub const RELAY_MESSAGE_SEED: &[u8] = b"mtr";
/// Seed tag of the bridge state account
pub const BRIDGE_SEED: &[u8] = b"bridge";
/// Seed tag of the native-asset vault
pub const SOL_VAULT_SEED: &[u8] = b"sol_vault";
/// Seed tag of per-token vaults
pub const TOKEN_VAULT_SEED: &[u8] = b"token_vault";
/// Seed tag of the relayer configuration account
pub const RELAY_CONFIG_SEED: &[u8] = b"config";

/// Address derivation capability
pub trait ProgramDerivedAddressService: Send + Sync {
    fn find_program_address(&self, seeds: &[&[u8]], program_id: &Pubkey) -> Pubkey;
}

/// Default implementation backed by `Pubkey::find_program_address`
#[derive(Debug, Default, Clone, Copy)]
pub struct SolanaPdaService;

impl ProgramDerivedAddressService for SolanaPdaService {
    fn find_program_address(&self, seeds: &[&[u8]], program_id: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(seeds, program_id).0
    }
}
