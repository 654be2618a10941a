//! Signing, broadcast and confirmation of bridge plans

use async_trait::async_trait;
use chrono::Utc;
use solana_sdk::{
    message::{Message, VersionedMessage},
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::config::BridgeConfig;
use crate::metrics::metrics;
use crate::retry::RetryPolicy;
use crate::rpc::{is_already_processed, TransactionBroadcaster};
use crate::structured_logging::BridgeLogger;
use crate::tx_builder::errors::{BridgeError, BridgeResult};
use crate::tx_builder::output::{BridgeTransactionPlan, ConfirmationHandle, SignedBridgePlan};

/// Signing capability for the fee payer
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Public key of this signer
    async fn pubkey(&self) -> Pubkey;

    /// Sign serialized message bytes
    async fn sign_message(&self, message: &[u8]) -> BridgeResult<Signature>;
}

#[derive(Debug, Clone)]
pub struct SubmissionSettings {
    pub confirm_timeout: Duration,
    pub poll_interval: Duration,
}

impl SubmissionSettings {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            confirm_timeout: Duration::from_secs(config.submission.confirm_timeout_secs),
            poll_interval: Duration::from_millis(config.submission.confirm_poll_interval_ms),
        }
    }
}

impl Default for SubmissionSettings {
    fn default() -> Self {
        Self {
            confirm_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Signs plans, broadcasts them and waits for confirmation
pub struct SubmissionManager {
    signer: Arc<dyn TransactionSigner>,
    broadcaster: Arc<dyn TransactionBroadcaster>,
    settings: SubmissionSettings,
    retry: RetryPolicy,
}

impl SubmissionManager {
    pub fn new(
        signer: Arc<dyn TransactionSigner>,
        broadcaster: Arc<dyn TransactionBroadcaster>,
        settings: SubmissionSettings,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            signer,
            broadcaster,
            settings,
            retry,
        }
    }

    /// Sign a plan; the plan is consumed so it can be signed only once
    pub async fn sign(&self, plan: BridgeTransactionPlan) -> BridgeResult<SignedBridgePlan> {
        let signer = self.signer.pubkey().await;
        if signer != plan.fee_payer {
            return Err(BridgeError::Signing(format!(
                "signer {} does not match fee payer {}",
                signer, plan.fee_payer
            )));
        }

        let message = Message::new_with_blockhash(
            &plan.instructions,
            Some(&plan.fee_payer),
            &plan.recent_blockhash,
        );
        let required = message.header.num_required_signatures;
        if required != 1 {
            return Err(BridgeError::Signing(format!(
                "plan requires {} signers, only the fee payer is supported",
                required
            )));
        }

        let message = VersionedMessage::Legacy(message);
        let bytes = message.serialize();
        let signature = self.signer.sign_message(&bytes).await?;
        if !signature.verify(plan.fee_payer.as_ref(), &bytes) {
            return Err(BridgeError::Signing(
                "signature does not verify against the fee payer".to_string(),
            ));
        }

        let transaction = VersionedTransaction {
            signatures: vec![signature],
            message,
        };
        debug!(signature = %signature, path = %plan.path, "Bridge plan signed");
        let signed = SignedBridgePlan::new(
            transaction,
            plan.path,
            plan.outgoing_message,
            plan.correlation_id,
        )?;
        Ok(signed.with_quote_window(plan.quote_window))
    }

    /// Broadcast a signed plan
    ///
    /// A plan sized from a quote is refused once the quote has aged out.
    /// An "already processed" answer means an earlier send of the same
    /// transaction landed; it resolves to the known signature.
    pub async fn submit(&self, signed: &SignedBridgePlan) -> BridgeResult<ConfirmationHandle> {
        let logger = BridgeLogger::new(signed.correlation_id.clone());
        if let Some(window) = &signed.quote_window {
            if let Err(e) = window.check() {
                logger.log_failure("submit", &e.to_string());
                return Err(e);
            }
        }
        let result = self
            .retry
            .run("source.send_transaction", || {
                self.broadcaster.send_transaction(&signed.transaction)
            })
            .await;

        let (signature, duplicate) = match result {
            Ok(signature) => {
                if signature != signed.signature {
                    warn!(
                        returned = %signature,
                        expected = %signed.signature,
                        "Broadcaster returned an unexpected signature"
                    );
                }
                (signed.signature, false)
            }
            Err(e) if is_already_processed(&e) => {
                metrics().duplicate_submissions.inc();
                (signed.signature, true)
            }
            Err(e) => {
                logger.log_failure("submit", &e.to_string());
                return Err(e);
            }
        };

        metrics().submissions.inc();
        logger.log_submitted(&signature, duplicate);
        Ok(ConfirmationHandle::new(
            signature,
            duplicate,
            signed.correlation_id.clone(),
        ))
    }

    /// Poll until the transaction is confirmed, fails, or the timeout passes
    pub async fn confirm(&self, handle: &ConfirmationHandle) -> BridgeResult<()> {
        let logger = BridgeLogger::new(handle.correlation_id.clone());
        let deadline = Instant::now() + self.settings.confirm_timeout;

        loop {
            match self.broadcaster.signature_status(&handle.signature).await {
                Ok(Some(Ok(()))) => {
                    metrics().confirmations.inc();
                    let latency_ms = (Utc::now() - handle.submitted_at).num_milliseconds().max(0);
                    logger.log_confirmed(&handle.signature, latency_ms as u64);
                    return Ok(());
                }
                Ok(Some(Err(reason))) => {
                    metrics().confirmation_failures.inc();
                    logger.log_failure("confirm", &reason);
                    return Err(BridgeError::Confirmation {
                        signature: handle.signature.to_string(),
                        reason,
                    });
                }
                Ok(None) => {}
                Err(e) if e.is_retryable() => {
                    debug!(
                        signature = %handle.signature,
                        error = %e,
                        "Status lookup failed, polling again"
                    );
                }
                Err(e) => return Err(e),
            }

            if Instant::now() >= deadline {
                metrics().confirmation_failures.inc();
                let reason = format!(
                    "not confirmed within {}s",
                    self.settings.confirm_timeout.as_secs()
                );
                logger.log_failure("confirm", &reason);
                return Err(BridgeError::Confirmation {
                    signature: handle.signature.to_string(),
                    reason,
                });
            }
            sleep(self.settings.poll_interval).await;
        }
    }
}
