//! Structured logging of bridge lifecycle events

use solana_sdk::{pubkey::Pubkey, signature::Signature};

use crate::address::EvmAddress;
use crate::observability::CorrelationId;

/// Structured logger bound to one bridge attempt
#[derive(Debug, Clone)]
pub struct BridgeLogger {
    context_id: CorrelationId,
}

impl BridgeLogger {
    pub fn new(context_id: CorrelationId) -> Self {
        Self { context_id }
    }

    pub fn context_id(&self) -> &CorrelationId {
        &self.context_id
    }

    pub fn log_destination_resolved(&self, source: &Pubkey, destination: &EvmAddress) {
        tracing::debug!(
            context_id = %self.context_id,
            source = %source,
            destination = %destination,
            "Destination resolved"
        );
    }

    pub fn log_relay_fallback(&self, reason: &str) {
        tracing::warn!(
            context_id = %self.context_id,
            reason = %reason,
            "Relay config unavailable, building bridge-only transaction (no auto-relay)"
        );
    }

    pub fn log_plan_built(&self, path: &str, instruction_count: usize, amount: u64) {
        tracing::info!(
            context_id = %self.context_id,
            path = %path,
            instruction_count = %instruction_count,
            amount = %amount,
            "Bridge plan built"
        );
    }

    pub fn log_submitted(&self, signature: &Signature, duplicate: bool) {
        tracing::info!(
            context_id = %self.context_id,
            signature = %signature,
            duplicate = %duplicate,
            "Bridge transaction broadcast"
        );
    }

    pub fn log_confirmed(&self, signature: &Signature, latency_ms: u64) {
        tracing::info!(
            context_id = %self.context_id,
            signature = %signature,
            latency_ms = %latency_ms,
            "Bridge transaction confirmed"
        );
    }

    pub fn log_failure(&self, stage: &str, error: &str) {
        tracing::warn!(
            context_id = %self.context_id,
            stage = %stage,
            error = %error,
            "Bridge stage failed"
        );
    }
}
