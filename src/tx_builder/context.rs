//! Per-attempt bridge context
//!
//! A `BridgeAttempt` owns the salt of one build call and the message
//! handles derived from it. Nothing here is shared between attempts.

use rand::{rngs::OsRng, RngCore};
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use tracing::warn;

use crate::address::bytes_to_hex;
use crate::observability::TraceContext;
use crate::pda::{ProgramDerivedAddressService, OUTGOING_MESSAGE_SEED, RELAY_MESSAGE_SEED};
use crate::structured_logging::BridgeLogger;
use crate::tx_builder::instructions::SALT_LEN;

/// Where the salt entropy came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaltSource {
    /// Operating system CSPRNG
    OsRng,
    /// Non-cryptographic fallback used when the OS source failed
    Fallback,
}

/// 32 random bytes making one bridge message unique
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BridgeSalt([u8; SALT_LEN]);

impl BridgeSalt {
    /// Fresh salt from the OS RNG, falling back to `fastrand` on failure
    pub fn generate() -> (Self, SaltSource) {
        let mut bytes = [0u8; SALT_LEN];
        match OsRng.try_fill_bytes(&mut bytes) {
            Ok(()) => (Self(bytes), SaltSource::OsRng),
            Err(e) => {
                warn!(error = %e, "OS randomness unavailable, using fallback salt source");
                fastrand::fill(&mut bytes);
                (Self(bytes), SaltSource::Fallback)
            }
        }
    }

    pub fn from_bytes(bytes: [u8; SALT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }
}

impl fmt::Debug for BridgeSalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BridgeSalt({})", bytes_to_hex(&self.0))
    }
}

/// State owned by one build call
pub struct BridgeAttempt {
    pub salt: BridgeSalt,
    pub salt_source: SaltSource,

    /// Outgoing message account on the bridge program
    pub outgoing_message: Pubkey,

    /// Relay message account on the relayer program, when relaying
    pub relay_message: Option<Pubkey>,

    pub trace_context: TraceContext,
    pub logger: BridgeLogger,
}

impl BridgeAttempt {
    /// Generate a salt and derive both message handles from it
    pub fn new(
        pda: &dyn ProgramDerivedAddressService,
        bridge_program: &Pubkey,
        relayer_program: Option<&Pubkey>,
        operation: &str,
    ) -> Self {
        let (salt, salt_source) = BridgeSalt::generate();
        Self::with_salt(pda, bridge_program, relayer_program, operation, salt, salt_source)
    }

    pub fn with_salt(
        pda: &dyn ProgramDerivedAddressService,
        bridge_program: &Pubkey,
        relayer_program: Option<&Pubkey>,
        operation: &str,
        salt: BridgeSalt,
        salt_source: SaltSource,
    ) -> Self {
        let outgoing_message =
            pda.find_program_address(&[OUTGOING_MESSAGE_SEED, salt.as_bytes()], bridge_program);
        let relay_message = relayer_program
            .map(|program| {
                pda.find_program_address(&[RELAY_MESSAGE_SEED, salt.as_bytes()], program)
            });

        let trace_context = TraceContext::new(operation);
        let logger = BridgeLogger::new(trace_context.correlation_id().clone());

        Self {
            salt,
            salt_source,
            outgoing_message,
            relay_message,
            trace_context,
            logger,
        }
    }
}

impl fmt::Debug for BridgeAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeAttempt")
            .field("salt", &self.salt)
            .field("salt_source", &self.salt_source)
            .field("outgoing_message", &self.outgoing_message)
            .field("relay_message", &self.relay_message)
            .field(
                "trace_context",
                &format!(
                    "trace_id={}, span_id={}",
                    self.trace_context.trace_id(),
                    self.trace_context.span_id()
                ),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pda::SolanaPdaService;

    #[test]
    fn test_salts_are_fresh() {
        let (a, source) = BridgeSalt::generate();
        let (b, _) = BridgeSalt::generate();
        assert_eq!(source, SaltSource::OsRng);
        assert_ne!(a, b);
    }

    #[test]
    fn test_handles_follow_salt() {
        let pda = SolanaPdaService;
        let bridge = Pubkey::new_unique();
        let relayer = Pubkey::new_unique();
        let salt = BridgeSalt::from_bytes([7u8; SALT_LEN]);

        let first =
            BridgeAttempt::with_salt(&pda, &bridge, Some(&relayer), "t", salt, SaltSource::OsRng);
        let second =
            BridgeAttempt::with_salt(&pda, &bridge, Some(&relayer), "t", salt, SaltSource::OsRng);

        assert_eq!(first.outgoing_message, second.outgoing_message);
        assert_eq!(first.relay_message, second.relay_message);
        assert_eq!(
            first.outgoing_message,
            Pubkey::find_program_address(&[OUTGOING_MESSAGE_SEED, &[7u8; SALT_LEN]], &bridge).0
        );

        let no_relay = BridgeAttempt::with_salt(&pda, &bridge, None, "t", salt, SaltSource::OsRng);
        assert!(no_relay.relay_message.is_none());
    }
}
