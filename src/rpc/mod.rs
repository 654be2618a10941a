//! RPC adapters for both chains
//!
//! Only the calls the bridge flow needs are modelled. Responses are narrowed
//! into typed values right here so nothing loosely typed travels inward.

use async_trait::async_trait;
use solana_sdk::{
    hash::Hash, pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction,
};

use crate::address::EvmAddress;
use crate::tx_builder::errors::BridgeResult;

pub mod evm;
pub mod rpc_errors;
pub mod solana;

pub use evm::EvmRpcClient;
pub use rpc_errors::{classify_client_error, is_already_processed};
pub use solana::SolanaRpc;

/// Read-only access to the target chain
#[async_trait]
pub trait ChainReadClient: Send + Sync {
    /// Execute a read-only call and return the raw return data
    async fn eth_call(&self, to: &EvmAddress, data: &[u8]) -> BridgeResult<Vec<u8>>;

    /// Deployed bytecode at `address` (empty when none)
    async fn get_code(&self, address: &EvmAddress) -> BridgeResult<Vec<u8>>;
}

/// Read access to the source chain
#[async_trait]
pub trait SourceChainClient: Send + Sync {
    /// Whether an account exists (has been initialized) at `pubkey`
    async fn account_exists(&self, pubkey: &Pubkey) -> BridgeResult<bool>;

    /// Recent blockhash to anchor a new transaction
    async fn latest_blockhash(&self) -> BridgeResult<Hash>;
}

/// Broadcast and status lookup on the source chain
#[async_trait]
pub trait TransactionBroadcaster: Send + Sync {
    /// Serialize and broadcast a signed transaction
    async fn send_transaction(&self, tx: &VersionedTransaction) -> BridgeResult<Signature>;

    /// `None` while unknown/unconfirmed, `Some(Ok)` once confirmed,
    /// `Some(Err(reason))` when the transaction failed on-chain
    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> BridgeResult<Option<Result<(), String>>>;
}
