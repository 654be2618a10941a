//! Shared in-memory collaborators for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use solana_sdk::{
    hash::Hash, pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use solbridge::pda::{BRIDGE_SEED, RELAY_CONFIG_SEED};
use solbridge::rpc::{SourceChainClient, TransactionBroadcaster};
use solbridge::tx_builder::{
    BridgeError, BridgeResult, ComposerSettings, Discriminators, RelaySettings,
};

pub fn settings() -> ComposerSettings {
    ComposerSettings {
        bridge_program: Pubkey::new_unique(),
        gas_fee_receiver: Pubkey::new_unique(),
        relay: Some(RelaySettings {
            relayer_program: Pubkey::new_unique(),
            gas_fee_receiver: Pubkey::new_unique(),
            gas_limit: 200_000,
        }),
        discriminators: Discriminators::default(),
        quote_max_age_secs: 30,
    }
}

pub fn bridge_account(s: &ComposerSettings) -> Pubkey {
    Pubkey::find_program_address(&[BRIDGE_SEED], &s.bridge_program).0
}

pub fn relay_config_account(s: &ComposerSettings) -> Pubkey {
    let relay = s.relay.as_ref().expect("relay configured");
    Pubkey::find_program_address(&[RELAY_CONFIG_SEED], &relay.relayer_program).0
}

pub struct FakeSource {
    pub accounts: HashSet<Pubkey>,
    pub unreachable: HashSet<Pubkey>,
}

impl FakeSource {
    pub fn new(accounts: &[Pubkey]) -> Self {
        Self {
            accounts: accounts.iter().copied().collect(),
            unreachable: HashSet::new(),
        }
    }
}

#[async_trait]
impl SourceChainClient for FakeSource {
    async fn account_exists(&self, pubkey: &Pubkey) -> BridgeResult<bool> {
        if self.unreachable.contains(pubkey) {
            return Err(BridgeError::remote("fake-source", "connection reset by peer"));
        }
        Ok(self.accounts.contains(pubkey))
    }

    async fn latest_blockhash(&self) -> BridgeResult<Hash> {
        Ok(Hash::new_from_array([3u8; 32]))
    }
}

/// Answers every send after the first with "already processed"
#[derive(Default)]
pub struct FlakyBroadcaster {
    pub sends: AtomicUsize,
    pub first_error: Mutex<Option<BridgeError>>,
}

#[async_trait]
impl TransactionBroadcaster for FlakyBroadcaster {
    async fn send_transaction(&self, tx: &VersionedTransaction) -> BridgeResult<Signature> {
        let n = self.sends.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            if let Some(err) = self.first_error.lock().unwrap().take() {
                return Err(err);
            }
            return Ok(tx.signatures[0]);
        }
        Err(BridgeError::remote(
            "fake-rpc",
            "Transaction simulation failed: This transaction has already been processed",
        ))
    }

    async fn signature_status(
        &self,
        _signature: &Signature,
    ) -> BridgeResult<Option<Result<(), String>>> {
        Ok(Some(Ok(())))
    }
}
