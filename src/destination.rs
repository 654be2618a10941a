//! Destination ("twin") address resolution
//!
//! Every source key has a deterministic counterpart on the target chain,
//! predicted by the bridge contract. The counterpart may not be deployed
//! yet; prediction works either way.

use futures::future::try_join_all;
use once_cell::sync::Lazy;
use sha3::{Digest, Keccak256};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::address::{EvmAddress, EVM_ADDRESS_LEN};
use crate::observability::CorrelationId;
use crate::retry::RetryPolicy;
use crate::rpc::ChainReadClient;
use crate::structured_logging::BridgeLogger;
use crate::tx_builder::errors::{BridgeError, BridgeResult};

const PREDICT_SIGNATURE: &str = "getPredictedAddress(bytes32)";
const WORD_LEN: usize = 32;

static PREDICT_SELECTOR: Lazy<[u8; 4]> = Lazy::new(|| function_selector(PREDICT_SIGNATURE));

/// First four bytes of keccak256 of a function signature
pub fn function_selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}

/// Narrow an ABI-encoded `address` return word
fn address_from_word(endpoint: &str, word: &[u8]) -> BridgeResult<EvmAddress> {
    if word.len() != WORD_LEN {
        return Err(BridgeError::remote(
            endpoint,
            format!("expected a {}-byte return word, got {} bytes", WORD_LEN, word.len()),
        ));
    }
    let (padding, address) = word.split_at(WORD_LEN - EVM_ADDRESS_LEN);
    if padding.iter().any(|&b| b != 0) {
        return Err(BridgeError::remote(
            endpoint,
            "return word is not a left-padded address",
        ));
    }
    EvmAddress::parse(address)
}

/// Predicts target-chain addresses through the bridge contract
pub struct DestinationResolver {
    reader: Arc<dyn ChainReadClient>,
    bridge_contract: EvmAddress,
    retry: RetryPolicy,
}

impl DestinationResolver {
    pub fn new(
        reader: Arc<dyn ChainReadClient>,
        bridge_contract: EvmAddress,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            reader,
            bridge_contract,
            retry,
        }
    }

    /// Predicted destination of `source`
    pub async fn resolve(&self, source: &Pubkey) -> BridgeResult<EvmAddress> {
        let mut calldata = Vec::with_capacity(4 + WORD_LEN);
        calldata.extend_from_slice(&PREDICT_SELECTOR[..]);
        calldata.extend_from_slice(source.as_ref());

        let word = self
            .retry
            .run("target.get_predicted_address", || {
                self.reader.eth_call(&self.bridge_contract, &calldata)
            })
            .await?;

        let endpoint = format!("bridge contract {}", self.bridge_contract);
        let destination = address_from_word(&endpoint, &word)?;
        debug!(source = %source, destination = %destination, "Destination resolved");
        Ok(destination)
    }

    /// Whether code is deployed at `address`
    pub async fn is_deployed(&self, address: &EvmAddress) -> BridgeResult<bool> {
        let code = self
            .retry
            .run("target.get_code", || self.reader.get_code(address))
            .await?;
        Ok(!code.is_empty())
    }

    /// Resolve several keys concurrently; output order follows input order
    pub async fn resolve_many(&self, sources: &[Pubkey]) -> BridgeResult<Vec<EvmAddress>> {
        try_join_all(sources.iter().map(|source| self.resolve(source))).await
    }
}

/// Destination cache for one connected identity
///
/// Re-resolves whenever a different source key is presented.
pub struct TwinSession {
    resolver: Arc<DestinationResolver>,
    current: Mutex<Option<(Pubkey, EvmAddress)>>,
    logger: BridgeLogger,
}

impl TwinSession {
    pub fn new(resolver: Arc<DestinationResolver>) -> Self {
        Self {
            resolver,
            current: Mutex::new(None),
            logger: BridgeLogger::new(CorrelationId::new()),
        }
    }

    /// Destination of `source`, resolved at most once per identity
    pub async fn destination(&self, source: &Pubkey) -> BridgeResult<EvmAddress> {
        let mut current = self.current.lock().await;
        if let Some((key, destination)) = current.as_ref() {
            if key == source {
                return Ok(*destination);
            }
        }
        let destination = self.resolver.resolve(source).await?;
        self.logger.log_destination_resolved(source, &destination);
        *current = Some((*source, destination));
        Ok(destination)
    }

    pub async fn cached(&self) -> Option<(Pubkey, EvmAddress)> {
        *self.current.lock().await
    }

    /// Drop the cached identity (disconnect)
    pub async fn clear(&self) {
        *self.current.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockChainReader;

    fn resolver(reader: Arc<MockChainReader>) -> DestinationResolver {
        DestinationResolver::new(reader, EvmAddress::new([0x42; 20]), RetryPolicy::no_retry())
    }

    #[test]
    fn test_selector_matches_keccak() {
        assert_eq!(function_selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn test_word_normalization() {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&[0x11; 20]);
        assert_eq!(address_from_word("x", &word).unwrap(), EvmAddress::new([0x11; 20]));

        word[0] = 1;
        assert!(matches!(address_from_word("x", &word), Err(BridgeError::RemoteCall { .. })));
        assert!(address_from_word("x", &[0u8; 20]).is_err());
    }

    #[tokio::test]
    async fn test_resolve_sends_selector_and_key() {
        let reader = Arc::new(MockChainReader::new());
        let source = Pubkey::new_unique();
        reader.set_prediction(source, EvmAddress::new([0x77; 20]));

        let resolved = resolver(reader.clone()).resolve(&source).await.unwrap();
        assert_eq!(resolved, EvmAddress::new([0x77; 20]));

        let calls = reader.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, EvmAddress::new([0x42; 20]));
        assert_eq!(&calls[0].1[..4], &PREDICT_SELECTOR[..]);
        assert_eq!(&calls[0].1[4..], &source.to_bytes()[..]);
    }

    #[tokio::test]
    async fn test_resolve_many_preserves_order() {
        let reader = Arc::new(MockChainReader::new());
        let keys: Vec<Pubkey> = (0..4).map(|_| Pubkey::new_unique()).collect();
        for (i, key) in keys.iter().enumerate() {
            reader.set_prediction(*key, EvmAddress::new([i as u8 + 1; 20]));
        }

        let out = resolver(reader).resolve_many(&keys).await.unwrap();
        let expected: Vec<EvmAddress> =
            (0..4).map(|i| EvmAddress::new([i as u8 + 1; 20])).collect();
        assert_eq!(out, expected);
    }

    #[tokio::test]
    async fn test_is_deployed() {
        let reader = Arc::new(MockChainReader::new());
        let deployed = EvmAddress::new([9; 20]);
        reader.set_code(deployed, vec![0x60, 0x80]);
        let resolver = resolver(reader);

        assert!(resolver.is_deployed(&deployed).await.unwrap());
        assert!(!resolver.is_deployed(&EvmAddress::new([8; 20])).await.unwrap());
    }

    #[tokio::test]
    async fn test_twin_session_reresolves_on_identity_change() {
        let reader = Arc::new(MockChainReader::new());
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();
        reader.set_prediction(alice, EvmAddress::new([0xA1; 20]));
        reader.set_prediction(bob, EvmAddress::new([0xB0; 20]));

        let session = TwinSession::new(Arc::new(resolver(reader.clone())));
        assert_eq!(session.destination(&alice).await.unwrap(), EvmAddress::new([0xA1; 20]));
        assert_eq!(session.destination(&alice).await.unwrap(), EvmAddress::new([0xA1; 20]));
        assert_eq!(reader.calls().len(), 1);

        assert_eq!(session.destination(&bob).await.unwrap(), EvmAddress::new([0xB0; 20]));
        assert_eq!(reader.calls().len(), 2);

        session.clear().await;
        assert!(session.cached().await.is_none());
    }
}
