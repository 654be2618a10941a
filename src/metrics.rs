//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Instant;

/// Bridge metrics on a private registry
pub struct BridgeMetrics {
    registry: Registry,

    // Counters
    pub plans_built: IntCounterVec,
    pub relay_fallbacks: IntCounter,
    pub quote_amplifications: IntCounter,
    pub insufficient_liquidity: IntCounter,
    pub submissions: IntCounter,
    pub duplicate_submissions: IntCounter,
    pub confirmations: IntCounter,
    pub confirmation_failures: IntCounter,

    // Histograms
    pub quote_latency: Histogram,
    pub build_latency: Histogram,
}

impl BridgeMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let plans_built = IntCounterVec::new(
            Opts::new("bridge_plans_built_total", "Bridge plans built, by path"),
            &["path"],
        )?;

        let relay_fallbacks = IntCounter::with_opts(Opts::new(
            "bridge_relay_fallbacks_total",
            "Plans degraded to bridge-only because the relay config was unavailable",
        ))?;

        let quote_amplifications = IntCounter::with_opts(Opts::new(
            "bridge_quote_amplifications_total",
            "Executable quotes re-requested with an amplified source amount",
        ))?;

        let insufficient_liquidity = IntCounter::with_opts(Opts::new(
            "bridge_quote_insufficient_liquidity_total",
            "Quotes that could not reach the required output",
        ))?;

        let submissions = IntCounter::with_opts(Opts::new(
            "bridge_submissions_total",
            "Signed bridge transactions broadcast",
        ))?;

        let duplicate_submissions = IntCounter::with_opts(Opts::new(
            "bridge_duplicate_submissions_total",
            "Broadcasts answered with already-processed and recovered locally",
        ))?;

        let confirmations = IntCounter::with_opts(Opts::new(
            "bridge_confirmations_total",
            "Bridge transactions observed as confirmed",
        ))?;

        let confirmation_failures = IntCounter::with_opts(Opts::new(
            "bridge_confirmation_failures_total",
            "Bridge transactions whose confirmation could not be observed",
        ))?;

        let quote_latency = Histogram::with_opts(
            HistogramOpts::new("bridge_quote_latency_seconds", "Quote resolution latency")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0]),
        )?;

        let build_latency = Histogram::with_opts(
            HistogramOpts::new("bridge_build_latency_seconds", "Bridge plan build latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0]),
        )?;

        registry.register(Box::new(plans_built.clone()))?;
        registry.register(Box::new(relay_fallbacks.clone()))?;
        registry.register(Box::new(quote_amplifications.clone()))?;
        registry.register(Box::new(insufficient_liquidity.clone()))?;
        registry.register(Box::new(submissions.clone()))?;
        registry.register(Box::new(duplicate_submissions.clone()))?;
        registry.register(Box::new(confirmations.clone()))?;
        registry.register(Box::new(confirmation_failures.clone()))?;
        registry.register(Box::new(quote_latency.clone()))?;
        registry.register(Box::new(build_latency.clone()))?;

        Ok(Self {
            registry,
            plans_built,
            relay_fallbacks,
            quote_amplifications,
            insufficient_liquidity,
            submissions,
            duplicate_submissions,
            confirmations,
            confirmation_failures,
            quote_latency,
            build_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn gather_text(&self) -> anyhow::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static BridgeMetrics {
    static METRICS: once_cell::sync::Lazy<BridgeMetrics> = once_cell::sync::Lazy::new(|| {
        BridgeMetrics::new().expect("Failed to initialize bridge metrics")
    });
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.start.elapsed().as_secs_f64());
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
