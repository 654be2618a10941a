//! Local keypair signing

use anyhow::{Context, Result};
use async_trait::async_trait;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};
use std::sync::Arc;

use crate::tx_builder::errors::{BridgeError, BridgeResult};
use crate::tx_builder::submit::TransactionSigner;

/// Signer backed by an in-memory keypair
pub struct KeypairSigner {
    keypair: Arc<Keypair>,
}

fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair> {
    if bytes.len() != 64 {
        anyhow::bail!("Invalid keypair length: expected 64 bytes, got {}", bytes.len());
    }
    if bytes.iter().all(|&b| b == 0) {
        anyhow::bail!("Invalid keypair: all-zero key rejected");
    }
    Keypair::try_from(bytes).context("Invalid keypair bytes")
}

impl KeypairSigner {
    /// Load a keypair file, either raw 64 bytes or a JSON byte array
    pub fn from_file(path: &str) -> Result<Self> {
        let keypair_bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read keypair file: {}", path))?;

        let keypair = if keypair_bytes.len() == 64 {
            keypair_from_bytes(&keypair_bytes)?
        } else {
            let json: Vec<u8> = serde_json::from_slice(&keypair_bytes)
                .context("Failed to parse keypair JSON")?;
            keypair_from_bytes(&json)?
        };

        Ok(Self::new(keypair))
    }

    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }
}

#[async_trait]
impl TransactionSigner for KeypairSigner {
    async fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign_message(&self, message: &[u8]) -> BridgeResult<Signature> {
        self.keypair
            .try_sign_message(message)
            .map_err(|e| BridgeError::Signing(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_json_keypair() {
        let keypair = Keypair::new();
        let json = serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let signer = KeypairSigner::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(signer.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_load_raw_keypair() {
        let keypair = Keypair::new();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&keypair.to_bytes()).unwrap();

        let signer = KeypairSigner::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(signer.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_rejects_zero_and_short_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 64]).unwrap();
        assert!(KeypairSigner::from_file(file.path().to_str().unwrap()).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[1,2,3]").unwrap();
        assert!(KeypairSigner::from_file(file.path().to_str().unwrap()).is_err());
    }

    #[tokio::test]
    async fn test_signature_verifies() {
        let signer = KeypairSigner::new(Keypair::new());
        let sig = signer.sign_message(b"bridge").await.unwrap();
        assert!(sig.verify(signer.pubkey().as_ref(), b"bridge"));
    }
}
