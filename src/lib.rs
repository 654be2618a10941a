//! solbridge - Solana to EVM bridge transaction construction
//!
//! Resolves the target-chain twin of a Solana account, sizes the bridged
//! amount from price quotes, composes the bridge/relay instructions and
//! submits the signed transaction.

pub mod address;
pub mod config;
pub mod destination;
pub mod metrics;
pub mod observability;
pub mod pda;
pub mod quote;
pub mod retry;
pub mod rpc;
pub mod structured_logging;
pub mod tx_builder;
pub mod wallet;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

// Re-export commonly used types
pub use address::EvmAddress;
pub use config::BridgeConfig;
pub use destination::{DestinationResolver, TwinSession};
pub use quote::{BridgeQuote, QuoteResolver};
pub use solana_sdk::{pubkey::Pubkey, signature::Signature};
pub use tx_builder::{BridgeError, BridgeResult};
