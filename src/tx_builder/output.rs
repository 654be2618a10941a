//! Build and submission outputs
//!
//! `BridgeTransactionPlan` is the unsigned result of composition. It is not
//! `Clone` and is consumed by value when signed, so one plan yields at most
//! one signed transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::{
    hash::Hash, instruction::Instruction, pubkey::Pubkey, signature::Signature,
    transaction::VersionedTransaction,
};
use std::fmt;

use crate::address::EvmAddress;
use crate::observability::CorrelationId;
use crate::tx_builder::context::BridgeSalt;
use crate::tx_builder::errors::{BridgeError, BridgeResult};

/// Which instruction sequence a plan carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanPath {
    /// `[PayForRelay, Bridge]`, relayed automatically on the target chain
    Relayed,
    /// `[Bridge]` only, must be proven and executed manually
    BridgeOnly,
}

impl PlanPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relayed => "relayed",
            Self::BridgeOnly => "bridge_only",
        }
    }
}

impl fmt::Display for PlanPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Freshness bound of the quote a plan was sized from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteWindow {
    pub quoted_at: DateTime<Utc>,
    pub max_age_secs: u64,
}

impl QuoteWindow {
    pub fn age_secs(&self) -> i64 {
        (Utc::now() - self.quoted_at).num_seconds()
    }

    /// `QuoteStale` once the quote is older than `max_age_secs`
    pub fn check(&self) -> BridgeResult<()> {
        let age_secs = self.age_secs();
        if age_secs > self.max_age_secs as i64 {
            return Err(BridgeError::QuoteStale {
                age_secs,
                max_age_secs: self.max_age_secs,
            });
        }
        Ok(())
    }
}

/// Ordered, unsigned bridge transaction
#[derive(Debug)]
pub struct BridgeTransactionPlan {
    pub instructions: Vec<Instruction>,
    pub fee_payer: Pubkey,
    pub recent_blockhash: Hash,
    pub path: PlanPath,
    pub salt: BridgeSalt,
    pub outgoing_message: Pubkey,
    pub destination: EvmAddress,
    pub amount: u64,
    /// Correlation id of the attempt that built this plan
    pub correlation_id: CorrelationId,
    /// Set when the amount came from a quote; rechecked before broadcast
    pub quote_window: Option<QuoteWindow>,
}

impl BridgeTransactionPlan {
    pub fn is_relayed(&self) -> bool {
        self.path == PlanPath::Relayed
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }
}

/// A signed plan ready for broadcast
#[derive(Debug, Clone)]
pub struct SignedBridgePlan {
    pub transaction: VersionedTransaction,
    pub signature: Signature,
    pub path: PlanPath,
    pub outgoing_message: Pubkey,
    pub correlation_id: CorrelationId,
    pub quote_window: Option<QuoteWindow>,
}

impl SignedBridgePlan {
    pub fn new(
        transaction: VersionedTransaction,
        path: PlanPath,
        outgoing_message: Pubkey,
        correlation_id: CorrelationId,
    ) -> BridgeResult<Self> {
        let signature = *transaction
            .signatures
            .first()
            .ok_or_else(|| BridgeError::Signing("transaction carries no signature".to_string()))?;
        Ok(Self {
            transaction,
            signature,
            path,
            outgoing_message,
            correlation_id,
            quote_window: None,
        })
    }

    pub fn with_quote_window(mut self, quote_window: Option<QuoteWindow>) -> Self {
        self.quote_window = quote_window;
        self
    }

    /// Wire bytes of the signed transaction
    pub fn serialize(&self) -> BridgeResult<Vec<u8>> {
        bincode::serialize(&self.transaction)
            .map_err(|e| BridgeError::internal(format!("transaction serialization failed: {}", e)))
    }
}

/// Handle returned by a successful broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationHandle {
    pub signature: Signature,
    pub submitted_at: DateTime<Utc>,
    /// Broadcast was answered with "already processed"
    pub duplicate: bool,
    pub correlation_id: CorrelationId,
}

impl ConfirmationHandle {
    pub fn new(signature: Signature, duplicate: bool, correlation_id: CorrelationId) -> Self {
        Self {
            signature,
            submitted_at: Utc::now(),
            duplicate,
            correlation_id,
        }
    }
}
