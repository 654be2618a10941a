//! Source-amount resolution under price uncertainty
//!
//! Given a required destination-token amount D, find how much source asset
//! S to bridge so that the executable swap on the target chain yields at
//! least D:
//!
//! 1. Reference rate R from a quote for one whole source unit
//! 2. Initial guess `S0 = ceil(ceil(D * unit / R) * 1.01)`, floored at the dust minimum
//! 3. Executable quote for S; accept when it covers D
//! 4. Otherwise amplify S by the shortfall ratio plus 20% and re-quote
//! 5. Pad the accepted S with the slippage buffer

pub mod api;

pub use api::{
    HttpPriceQuoteApi, PriceQuoteApi, QuoteRequest, QuoteResponse, SwapRequest, SwapResponse,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::address::EvmAddress;
use crate::config::{BridgeConfig, ConfigError};
use crate::metrics::{metrics, Timer};
use crate::retry::RetryPolicy;
use crate::tx_builder::call::ContractCall;
use crate::tx_builder::errors::{BridgeError, BridgeResult};

const BPS_DENOMINATOR: u128 = 10_000;
/// Initial guess headroom over the reference rate, in percent
const INITIAL_HEADROOM_PERCENT: u128 = 101;
/// Amplification factor applied to the shortfall ratio, in tenths
const AMPLIFICATION_TENTHS: u128 = 12;

/// Outcome of a quote resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeQuote {
    pub required_destination_amount: u128,
    /// Source amount to bridge, slippage buffer included
    pub resolved_source_amount: u64,
    pub minimum_destination_amount_after_slippage: u128,
    pub is_estimate_only: bool,
    pub route_description: String,
    pub execution_target: Option<EvmAddress>,
    pub execution_payload: Vec<u8>,
    /// Set when a full resolution failed and this quote is a fallback
    pub error: Option<String>,
    pub quoted_at: DateTime<Utc>,
}

impl BridgeQuote {
    pub fn age_secs(&self) -> i64 {
        (Utc::now() - self.quoted_at).num_seconds()
    }

    pub fn is_stale(&self, max_age_secs: u64) -> bool {
        self.age_secs() > max_age_secs as i64
    }

    /// The swap as a zero-value call to run on the target chain
    pub fn execution_call(&self) -> BridgeResult<ContractCall> {
        if self.is_estimate_only {
            return Err(BridgeError::quote_unavailable(
                "estimate-only quote carries no executable payload",
            ));
        }
        let target = self
            .execution_target
            .ok_or_else(|| BridgeError::quote_unavailable("quote has no execution target"))?;
        ContractCall::call(target, 0, self.execution_payload.clone())
    }
}

/// Convert a percentage (e.g. `7.0`) into basis points
pub fn percent_to_bps(percent: f64) -> BridgeResult<u16> {
    if !percent.is_finite() || !(0.0..100.0).contains(&percent) {
        return Err(BridgeError::range(format!(
            "slippage percent out of range: {}",
            percent
        )));
    }
    Ok((percent * 100.0).round() as u16)
}

/// `amount * (10000 + bps) / 10000`, floored
pub fn apply_slippage(amount: u64, bps: u16) -> BridgeResult<u64> {
    let padded = u128::from(amount) * (BPS_DENOMINATOR + u128::from(bps)) / BPS_DENOMINATOR;
    u64::try_from(padded)
        .map_err(|_| BridgeError::range(format!("source amount {} exceeds u64", padded)))
}

fn min_after_slippage(quoted: u128, bps: u16) -> u128 {
    let keep = BPS_DENOMINATOR - u128::from(bps.min(10_000));
    match quoted.checked_mul(keep) {
        Some(v) => v / BPS_DENOMINATOR,
        None => quoted / BPS_DENOMINATOR * keep,
    }
}

fn div_ceil(n: u128, d: u128) -> u128 {
    n / d + u128::from(n % d != 0)
}

fn overflow(what: &str) -> BridgeError {
    BridgeError::range(format!("{} overflows u128", what))
}

/// Parameters of quote resolution
#[derive(Debug, Clone)]
pub struct QuoteSettings {
    /// Bridged source asset as a token on the target chain
    pub source_token: EvmAddress,
    pub source_decimals: u32,
    /// Account that runs the swap on the target chain
    pub execution_account: EvmAddress,
    pub slippage_bps: u16,
    pub min_source_amount: u64,
    pub amplification_retries: u32,
    pub max_age_secs: u64,
}

impl QuoteSettings {
    pub fn from_config(config: &BridgeConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            source_token: config.quote.source_token()?,
            source_decimals: config.quote.source_decimals,
            execution_account: config.target.execution_account()?,
            slippage_bps: config.quote.slippage_bps,
            min_source_amount: config.quote.min_source_amount,
            amplification_retries: config.quote.amplification_retries,
            max_age_secs: config.quote.max_age_secs,
        })
    }

    fn unit(&self) -> u128 {
        10u128.pow(self.source_decimals)
    }
}

/// Resolves how much source asset a required destination amount costs
pub struct QuoteResolver {
    api: Arc<dyn PriceQuoteApi>,
    settings: QuoteSettings,
    retry: RetryPolicy,
}

impl QuoteResolver {
    pub fn new(api: Arc<dyn PriceQuoteApi>, settings: QuoteSettings, retry: RetryPolicy) -> Self {
        Self {
            api,
            settings,
            retry,
        }
    }

    pub fn settings(&self) -> &QuoteSettings {
        &self.settings
    }

    /// Source amount per one whole unit, as destination-token output
    async fn reference_rate(&self, target_token: &EvmAddress) -> BridgeResult<u128> {
        let req = QuoteRequest {
            from_token: self.settings.source_token,
            to_token: *target_token,
            amount: self.settings.unit(),
        };
        let resp = self
            .retry
            .run("quote.reference_rate", || self.api.get_quote(&req))
            .await
            .map_err(|e| match e {
                BridgeError::QuoteUnavailable(_) => e,
                other => BridgeError::quote_unavailable(format!("reference rate: {}", other)),
            })?;
        if resp.to_amount == 0 {
            return Err(BridgeError::quote_unavailable("reference rate is zero"));
        }
        Ok(resp.to_amount)
    }

    /// Initial source guess from the reference rate
    fn initial_guess(&self, required: u128, rate: u128) -> BridgeResult<u128> {
        let raw = required
            .checked_mul(self.settings.unit())
            .ok_or_else(|| overflow("required amount"))?;
        let base = div_ceil(raw, rate);
        let padded = base
            .checked_mul(INITIAL_HEADROOM_PERCENT)
            .ok_or_else(|| overflow("initial guess"))?;
        Ok(div_ceil(padded, 100).max(u128::from(self.settings.min_source_amount)))
    }

    fn to_source_amount(&self, amount: u128) -> BridgeResult<u64> {
        u64::try_from(amount)
            .map_err(|_| BridgeError::range(format!("source amount {} exceeds u64", amount)))
    }

    /// Estimate-only quote from the reference rate alone
    pub async fn estimate(
        &self,
        target_token: &EvmAddress,
        required: u128,
    ) -> BridgeResult<BridgeQuote> {
        let rate = self.reference_rate(target_token).await?;
        let guess = self.to_source_amount(self.initial_guess(required, rate)?)?;
        let resolved = apply_slippage(guess, self.settings.slippage_bps)?;

        Ok(BridgeQuote {
            required_destination_amount: required,
            resolved_source_amount: resolved,
            minimum_destination_amount_after_slippage: min_after_slippage(
                required,
                self.settings.slippage_bps,
            ),
            is_estimate_only: true,
            route_description: format!(
                "estimate {} -> {} at {} per unit",
                self.settings.source_token, target_token, rate
            ),
            execution_target: None,
            execution_payload: Vec::new(),
            error: None,
            quoted_at: Utc::now(),
        })
    }

    /// Resolve an executable quote covering `required`
    pub async fn resolve(
        &self,
        target_token: &EvmAddress,
        required: u128,
    ) -> BridgeResult<BridgeQuote> {
        let timer = Timer::new();
        let result = self.resolve_inner(target_token, required).await;
        timer.observe_duration(&metrics().quote_latency);

        if let Err(BridgeError::InsufficientLiquidity { .. }) = &result {
            metrics().insufficient_liquidity.inc();
        }
        result
    }

    async fn resolve_inner(
        &self,
        target_token: &EvmAddress,
        required: u128,
    ) -> BridgeResult<BridgeQuote> {
        if required == 0 {
            return Err(BridgeError::range("required destination amount must be positive"));
        }

        let rate = self.reference_rate(target_token).await?;
        let mut source = self.initial_guess(required, rate)?;
        let max_requests = self.settings.amplification_retries + 1;
        let mut best_quoted = 0u128;

        for request in 1..=max_requests {
            let req = SwapRequest {
                from_token: self.settings.source_token,
                to_token: *target_token,
                amount: u128::from(self.to_source_amount(source)?),
                from_address: self.settings.execution_account,
                max_slippage_bps: self.settings.slippage_bps,
            };
            let swap = self
                .retry
                .run("quote.swap", || self.api.build_swap_transaction(&req))
                .await?;
            let quoted = swap.to_amount;
            best_quoted = best_quoted.max(quoted);

            debug!(
                request,
                source_amount = %source,
                quoted = %quoted,
                required = %required,
                "Executable quote received"
            );

            if quoted >= required {
                if swap.to.is_zero() || swap.data.is_empty() {
                    return Err(BridgeError::quote_unavailable(format!(
                        "swap covering {} has no executable route (target {}, {} payload bytes)",
                        quoted,
                        swap.to,
                        swap.data.len()
                    )));
                }
                let source = self.to_source_amount(source)?;
                let resolved = apply_slippage(source, self.settings.slippage_bps)?;
                info!(
                    source_amount = source,
                    resolved_source_amount = resolved,
                    quoted = %quoted,
                    requests = request,
                    "Quote resolved"
                );
                return Ok(BridgeQuote {
                    required_destination_amount: required,
                    resolved_source_amount: resolved,
                    minimum_destination_amount_after_slippage: min_after_slippage(
                        quoted,
                        self.settings.slippage_bps,
                    ),
                    is_estimate_only: false,
                    route_description: format!(
                        "swap {} -> {} via {}",
                        self.settings.source_token, target_token, swap.to
                    ),
                    execution_target: Some(swap.to),
                    execution_payload: swap.data,
                    error: None,
                    quoted_at: Utc::now(),
                });
            }

            if quoted == 0 || request == max_requests {
                break;
            }

            let shortfall = required - quoted;
            let bump = source
                .checked_mul(shortfall)
                .and_then(|v| v.checked_mul(AMPLIFICATION_TENTHS))
                .ok_or_else(|| overflow("amplified source amount"))?;
            source += div_ceil(bump, quoted * 10);
            metrics().quote_amplifications.inc();
            warn!(
                quoted = %quoted,
                required = %required,
                next_source_amount = %source,
                "Executable quote short of required amount, amplifying"
            );
        }

        Err(BridgeError::InsufficientLiquidity {
            required,
            quoted: best_quoted,
        })
    }

    /// Full resolution, degrading to an estimate that carries the failure
    pub async fn resolve_or_estimate(
        &self,
        target_token: &EvmAddress,
        required: u128,
    ) -> BridgeQuote {
        let err = match self.resolve(target_token, required).await {
            Ok(quote) => return quote,
            Err(e) => e,
        };
        warn!(error = %err, "Quote resolution failed, falling back to estimate");

        match self.estimate(target_token, required).await {
            Ok(mut quote) => {
                quote.error = Some(err.to_string());
                quote
            }
            Err(estimate_err) => BridgeQuote {
                required_destination_amount: required,
                resolved_source_amount: 0,
                minimum_destination_amount_after_slippage: 0,
                is_estimate_only: true,
                route_description: String::new(),
                execution_target: None,
                execution_payload: Vec::new(),
                error: Some(format!("{}; estimate: {}", err, estimate_err)),
                quoted_at: Utc::now(),
            },
        }
    }
}
