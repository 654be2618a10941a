use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::VersionedTransaction,
};
use std::sync::Arc;
use tracing::debug;

use super::rpc_errors::classify_client_error;
use super::{SourceChainClient, TransactionBroadcaster};
use crate::tx_builder::errors::BridgeResult;

/// Source-chain adapter over the nonblocking Solana RPC client
///
/// The inner client is shared; concurrent attempts may hold clones.
#[derive(Clone)]
pub struct SolanaRpc {
    client: Arc<RpcClient>,
    endpoint: String,
    commitment: CommitmentConfig,
}

impl SolanaRpc {
    pub fn new(url: impl Into<String>, commitment: CommitmentConfig) -> Self {
        let endpoint = url.into();
        Self {
            client: Arc::new(RpcClient::new_with_commitment(endpoint.clone(), commitment)),
            endpoint,
            commitment,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl std::fmt::Debug for SolanaRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaRpc")
            .field("endpoint", &self.endpoint)
            .field("commitment", &self.commitment)
            .finish()
    }
}

#[async_trait]
impl SourceChainClient for SolanaRpc {
    async fn account_exists(&self, pubkey: &Pubkey) -> BridgeResult<bool> {
        let response = self
            .client
            .get_account_with_commitment(pubkey, self.commitment)
            .await
            .map_err(|e| classify_client_error(e, &self.endpoint))?;
        debug!(account = %pubkey, exists = response.value.is_some(), "Account probe");
        Ok(response.value.is_some())
    }

    async fn latest_blockhash(&self) -> BridgeResult<Hash> {
        self.client
            .get_latest_blockhash()
            .await
            .map_err(|e| classify_client_error(e, &self.endpoint))
    }
}

#[async_trait]
impl TransactionBroadcaster for SolanaRpc {
    async fn send_transaction(&self, tx: &VersionedTransaction) -> BridgeResult<Signature> {
        self.client
            .send_transaction(tx)
            .await
            .map_err(|e| classify_client_error(e, &self.endpoint))
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> BridgeResult<Option<Result<(), String>>> {
        let status = self
            .client
            .get_signature_status(signature)
            .await
            .map_err(|e| classify_client_error(e, &self.endpoint))?;
        Ok(status.map(|result| result.map_err(|e| e.to_string())))
    }
}
