//! Test Utilities Module
//!
//! In-memory stand-ins for the chain adapters so composition, resolution and
//! submission can be exercised deterministically without network access.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use solana_sdk::{
    hash::Hash, pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::address::EvmAddress;
use crate::rpc::{ChainReadClient, SourceChainClient, TransactionBroadcaster};
use crate::tx_builder::errors::{BridgeError, BridgeResult};

/// Source chain with a fixed set of existing accounts
pub struct MockSourceChain {
    accounts: HashSet<Pubkey>,
    failing: HashSet<Pubkey>,
    blockhash: Hash,
    exists_calls: AtomicUsize,
}

impl MockSourceChain {
    pub fn with_accounts(accounts: &[Pubkey]) -> Self {
        Self {
            accounts: accounts.iter().copied().collect(),
            failing: HashSet::new(),
            blockhash: Hash::new_unique(),
            exists_calls: AtomicUsize::new(0),
        }
    }

    /// Make existence lookups of `pubkey` fail with a remote error
    pub fn failing_for(mut self, pubkey: Pubkey) -> Self {
        self.failing.insert(pubkey);
        self
    }

    pub fn blockhash(&self) -> Hash {
        self.blockhash
    }

    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceChainClient for MockSourceChain {
    async fn account_exists(&self, pubkey: &Pubkey) -> BridgeResult<bool> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(pubkey) {
            return Err(BridgeError::remote("mock-source", "connection reset"));
        }
        Ok(self.accounts.contains(pubkey))
    }

    async fn latest_blockhash(&self) -> BridgeResult<Hash> {
        Ok(self.blockhash)
    }
}

/// Broadcaster with scripted send errors and status answers
///
/// Sends succeed with the transaction's own signature once the scripted
/// errors are used up; statuses default to `None` (unknown).
#[derive(Default)]
pub struct MockBroadcaster {
    send_errors: Mutex<VecDeque<BridgeError>>,
    statuses: Mutex<VecDeque<Option<Result<(), String>>>>,
    sends: AtomicUsize,
    status_lookups: AtomicUsize,
}

impl MockBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_send_error(&self, err: BridgeError) {
        self.send_errors.lock().unwrap().push_back(err);
    }

    pub fn push_status(&self, status: Option<Result<(), String>>) {
        self.statuses.lock().unwrap().push_back(status);
    }

    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn status_count(&self) -> usize {
        self.status_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionBroadcaster for MockBroadcaster {
    async fn send_transaction(&self, tx: &VersionedTransaction) -> BridgeResult<Signature> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.send_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        tx.signatures
            .first()
            .copied()
            .ok_or_else(|| BridgeError::remote("mock-broadcaster", "unsigned transaction"))
    }

    async fn signature_status(
        &self,
        _signature: &Signature,
    ) -> BridgeResult<Option<Result<(), String>>> {
        self.status_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.statuses.lock().unwrap().pop_front().flatten())
    }
}

/// Target chain reader answering address predictions and code lookups
#[derive(Default)]
pub struct MockChainReader {
    predictions: Mutex<HashMap<Vec<u8>, EvmAddress>>,
    code: Mutex<HashMap<EvmAddress, Vec<u8>>>,
    calls: Mutex<Vec<(EvmAddress, Vec<u8>)>>,
}

impl MockChainReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_prediction(&self, source: Pubkey, destination: EvmAddress) {
        self.predictions
            .lock()
            .unwrap()
            .insert(source.to_bytes().to_vec(), destination);
    }

    pub fn set_code(&self, address: EvmAddress, code: Vec<u8>) {
        self.code.lock().unwrap().insert(address, code);
    }

    pub fn calls(&self) -> Vec<(EvmAddress, Vec<u8>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainReadClient for MockChainReader {
    async fn eth_call(&self, to: &EvmAddress, data: &[u8]) -> BridgeResult<Vec<u8>> {
        self.calls.lock().unwrap().push((*to, data.to_vec()));
        let key = data.get(4..).unwrap_or_default();
        let predicted = self
            .predictions
            .lock()
            .unwrap()
            .get(key)
            .copied()
            .ok_or_else(|| BridgeError::remote("mock-reader", "execution reverted"))?;

        let mut word = vec![0u8; 12];
        word.extend_from_slice(predicted.as_bytes());
        Ok(word)
    }

    async fn get_code(&self, address: &EvmAddress) -> BridgeResult<Vec<u8>> {
        Ok(self
            .code
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_default())
    }
}
