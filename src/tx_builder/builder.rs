//! Bridge transaction composition
//!
//! Composes `[PayForRelay, Bridge]` when the relayer is configured on-chain
//! and degrades to `[Bridge]` alone otherwise. A missing bridge account is
//! fatal; a missing or unreadable relay config only costs auto-relay.

use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use spl_associated_token_account::get_associated_token_address;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::address::EvmAddress;
use crate::config::{BridgeConfig, ConfigError};
use crate::metrics::{metrics, Timer};
use crate::pda::{
    ProgramDerivedAddressService, BRIDGE_SEED, RELAY_CONFIG_SEED, SOL_VAULT_SEED, TOKEN_VAULT_SEED,
};
use crate::quote::BridgeQuote;
use crate::retry::RetryPolicy;
use crate::rpc::SourceChainClient;
use crate::tx_builder::call::ContractCall;
use crate::tx_builder::context::BridgeAttempt;
use crate::tx_builder::errors::{BridgeError, BridgeResult};
use crate::tx_builder::instructions::{
    bridge_native_instruction, bridge_token_instruction, pay_for_relay_instruction,
    sanity_check_plan_order, BridgeNativeAccounts, BridgeTokenAccounts, Discriminators,
    PayForRelayAccounts,
};
use crate::tx_builder::output::{BridgeTransactionPlan, PlanPath, QuoteWindow};

/// Relayer program settings
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub relayer_program: Pubkey,
    pub gas_fee_receiver: Pubkey,
    pub gas_limit: u64,
}

/// Static inputs of composition
#[derive(Debug, Clone)]
pub struct ComposerSettings {
    pub bridge_program: Pubkey,
    pub gas_fee_receiver: Pubkey,
    /// `None` when relaying is disabled or not configured
    pub relay: Option<RelaySettings>,
    pub discriminators: Discriminators,
    pub quote_max_age_secs: u64,
}

impl ComposerSettings {
    pub fn from_config(config: &BridgeConfig) -> Result<Self, ConfigError> {
        let relay = config
            .relay
            .accounts()?
            .map(|(relayer_program, gas_fee_receiver)| RelaySettings {
                relayer_program,
                gas_fee_receiver,
                gas_limit: config.relay.gas_limit,
            });
        Ok(Self {
            bridge_program: config.source.bridge_program()?,
            gas_fee_receiver: config.source.gas_fee_receiver()?,
            relay,
            discriminators: config.discriminators.resolve()?,
            quote_max_age_secs: config.quote.max_age_secs,
        })
    }
}

/// Native-asset bridge request
#[derive(Debug, Clone)]
pub struct NativeBridgeRequest {
    /// Fee payer and source of the bridged lamports
    pub payer: Pubkey,
    pub destination: EvmAddress,
    pub amount: u64,
    pub call: Option<ContractCall>,
}

/// SPL token bridge request
#[derive(Debug, Clone)]
pub struct TokenBridgeRequest {
    /// Fee payer and owner of the source token account
    pub payer: Pubkey,
    pub mint: Pubkey,
    /// Token representation on the target chain
    pub remote_token: EvmAddress,
    pub destination: EvmAddress,
    pub amount: u64,
    pub call: Option<ContractCall>,
}

/// Why a plan was composed without `PayForRelay`
#[derive(Debug)]
pub enum RelaySkip {
    Disabled,
    ConfigMissing(Pubkey),
    ProbeFailed(BridgeError),
}

impl fmt::Display for RelaySkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("relaying disabled"),
            Self::ConfigMissing(config) => write!(f, "relay config {} not found", config),
            Self::ProbeFailed(e) => write!(f, "relay config probe failed: {}", e),
        }
    }
}

/// Builds unsigned bridge transaction plans
pub struct TransactionComposer {
    source: Arc<dyn SourceChainClient>,
    pda: Arc<dyn ProgramDerivedAddressService>,
    settings: ComposerSettings,
    retry: RetryPolicy,
}

impl TransactionComposer {
    pub fn new(
        source: Arc<dyn SourceChainClient>,
        pda: Arc<dyn ProgramDerivedAddressService>,
        settings: ComposerSettings,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            pda,
            settings,
            retry,
        }
    }

    pub fn settings(&self) -> &ComposerSettings {
        &self.settings
    }

    /// Bridge lamports, with an optional follow-on call
    pub async fn build_native(
        &self,
        req: NativeBridgeRequest,
    ) -> BridgeResult<BridgeTransactionPlan> {
        if let Some(call) = &req.call {
            call.validate()?;
        }
        let timer = Timer::new();
        let attempt = self.begin_attempt("build_native");
        let bridge = self.require_bridge_account().await?;
        let sol_vault = self
            .pda
            .find_program_address(&[SOL_VAULT_SEED], &self.settings.bridge_program);

        let bridge_ix = bridge_native_instruction(
            &self.settings.bridge_program,
            &BridgeNativeAccounts {
                payer: req.payer,
                from: req.payer,
                gas_fee_receiver: self.settings.gas_fee_receiver,
                sol_vault,
                bridge,
                outgoing_message: attempt.outgoing_message,
            },
            &self.settings.discriminators.bridge_native,
            attempt.salt.as_bytes(),
            &req.destination,
            req.amount,
            req.call.as_ref(),
        )?;

        let plan = self
            .assemble(&attempt, req.payer, bridge_ix, req.destination, req.amount)
            .await?;
        timer.observe_duration(&metrics().build_latency);
        Ok(plan)
    }

    /// Bridge an SPL token from the payer's associated token account
    pub async fn build_token(
        &self,
        req: TokenBridgeRequest,
    ) -> BridgeResult<BridgeTransactionPlan> {
        if let Some(call) = &req.call {
            call.validate()?;
        }
        let timer = Timer::new();
        let attempt = self.begin_attempt("build_token");
        let bridge = self.require_bridge_account().await?;
        let token_vault = self.pda.find_program_address(
            &[
                TOKEN_VAULT_SEED,
                req.mint.as_ref(),
                req.remote_token.as_bytes().as_slice(),
            ],
            &self.settings.bridge_program,
        );

        let bridge_ix = bridge_token_instruction(
            &self.settings.bridge_program,
            &BridgeTokenAccounts {
                payer: req.payer,
                from: req.payer,
                gas_fee_receiver: self.settings.gas_fee_receiver,
                mint: req.mint,
                from_token_account: get_associated_token_address(&req.payer, &req.mint),
                token_vault,
                bridge,
                outgoing_message: attempt.outgoing_message,
                token_program: spl_token::id(),
            },
            &self.settings.discriminators.bridge_token,
            attempt.salt.as_bytes(),
            &req.destination,
            &req.remote_token,
            req.amount,
            req.call.as_ref(),
        )?;

        let plan = self
            .assemble(&attempt, req.payer, bridge_ix, req.destination, req.amount)
            .await?;
        timer.observe_duration(&metrics().build_latency);
        Ok(plan)
    }

    /// Bridge the quoted source amount and run the quoted swap on arrival
    ///
    /// The plan carries the quote's freshness window, which
    /// [`SubmissionManager::submit`](crate::tx_builder::SubmissionManager::submit)
    /// checks again before broadcast.
    pub async fn build_with_quote(
        &self,
        payer: Pubkey,
        destination: EvmAddress,
        quote: &BridgeQuote,
    ) -> BridgeResult<BridgeTransactionPlan> {
        if quote.is_estimate_only {
            return Err(BridgeError::quote_unavailable(
                "estimate-only quote cannot be executed",
            ));
        }
        let window = QuoteWindow {
            quoted_at: quote.quoted_at,
            max_age_secs: self.settings.quote_max_age_secs,
        };
        window.check()?;
        let call = quote.execution_call()?;
        let mut plan = self
            .build_native(NativeBridgeRequest {
                payer,
                destination,
                amount: quote.resolved_source_amount,
                call: Some(call),
            })
            .await?;
        plan.quote_window = Some(window);
        Ok(plan)
    }

    /// Validate the relay/bridge ordering of a plan
    pub fn sanity_check_plan_order(&self, plan: &BridgeTransactionPlan) -> BridgeResult<()> {
        sanity_check_plan_order(&plan.instructions, &self.settings.discriminators)
    }

    fn begin_attempt(&self, operation: &str) -> BridgeAttempt {
        BridgeAttempt::new(
            self.pda.as_ref(),
            &self.settings.bridge_program,
            self.settings.relay.as_ref().map(|r| &r.relayer_program),
            operation,
        )
    }

    async fn account_exists(&self, pubkey: &Pubkey) -> BridgeResult<bool> {
        self.retry
            .run("source.account_exists", || self.source.account_exists(pubkey))
            .await
    }

    async fn require_bridge_account(&self) -> BridgeResult<Pubkey> {
        let bridge = self
            .pda
            .find_program_address(&[BRIDGE_SEED], &self.settings.bridge_program);
        if !self.account_exists(&bridge).await? {
            return Err(BridgeError::configuration(format!(
                "bridge account {} not found for program {}",
                bridge, self.settings.bridge_program
            )));
        }
        Ok(bridge)
    }

    /// PayForRelay instruction when the relayer config exists, else the
    /// reason it was skipped
    async fn relay_instruction(
        &self,
        attempt: &BridgeAttempt,
        payer: Pubkey,
    ) -> Result<Instruction, RelaySkip> {
        let (relay, relay_message) = match (&self.settings.relay, attempt.relay_message) {
            (Some(relay), Some(relay_message)) => (relay, relay_message),
            _ => return Err(RelaySkip::Disabled),
        };
        let relay_config = self
            .pda
            .find_program_address(&[RELAY_CONFIG_SEED], &relay.relayer_program);

        let span = attempt.trace_context.child_span("probe_relay_config");
        debug!(
            trace_id = %span.trace_id(),
            span_id = %span.span_id(),
            parent_span_id = ?span.parent_span_id,
            relay_config = %relay_config,
            "Probing relay config"
        );
        match self.account_exists(&relay_config).await {
            Ok(true) => {}
            Ok(false) => return Err(RelaySkip::ConfigMissing(relay_config)),
            Err(e) => return Err(RelaySkip::ProbeFailed(e)),
        }

        Ok(pay_for_relay_instruction(
            &relay.relayer_program,
            &PayForRelayAccounts {
                payer,
                relay_config,
                gas_fee_receiver: relay.gas_fee_receiver,
                relay_message,
            },
            &self.settings.discriminators.pay_for_relay,
            attempt.salt.as_bytes(),
            &attempt.outgoing_message,
            relay.gas_limit,
        ))
    }

    async fn assemble(
        &self,
        attempt: &BridgeAttempt,
        payer: Pubkey,
        bridge_ix: Instruction,
        destination: EvmAddress,
        amount: u64,
    ) -> BridgeResult<BridgeTransactionPlan> {
        let (instructions, path) = match self.relay_instruction(attempt, payer).await {
            Ok(relay_ix) => (vec![relay_ix, bridge_ix], PlanPath::Relayed),
            Err(RelaySkip::Disabled) => {
                debug!("Relaying disabled, building bridge-only transaction");
                (vec![bridge_ix], PlanPath::BridgeOnly)
            }
            Err(skip) => {
                metrics().relay_fallbacks.inc();
                attempt.logger.log_relay_fallback(&skip.to_string());
                (vec![bridge_ix], PlanPath::BridgeOnly)
            }
        };

        let recent_blockhash = self
            .retry
            .run("source.latest_blockhash", || self.source.latest_blockhash())
            .await?;

        let plan = BridgeTransactionPlan {
            instructions,
            fee_payer: payer,
            recent_blockhash,
            path,
            salt: attempt.salt,
            outgoing_message: attempt.outgoing_message,
            destination,
            amount,
            correlation_id: attempt.logger.context_id().clone(),
            quote_window: None,
        };
        self.sanity_check_plan_order(&plan)?;

        metrics().plans_built.with_label_values(&[path.as_str()]).inc();
        attempt
            .logger
            .log_plan_built(path.as_str(), plan.instruction_count(), amount);
        info!(
            trace_id = %attempt.trace_context.trace_id(),
            outgoing_message = %plan.outgoing_message,
            destination = %destination,
            "Bridge plan ready"
        );
        Ok(plan)
    }
}
