//! Bridge Transaction Builder
//!
//! Turns a bridge intent (amount, destination, optional follow-on call) into
//! a signed Solana transaction carrying the bridge program instructions.
//!
//! ## Architecture
//!
//! - **errors**: Error taxonomy shared by the whole crate
//! - **call**: Typed follow-on contract call
//! - **instructions**: Wire encoding and ordering checks
//! - **context**: Per-attempt salt and message handles
//! - **builder**: Relay probe and plan composition
//! - **output**: Plans, signed plans and confirmation handles
//! - **submit**: Signing, broadcast and confirmation
//!
//! ## Instruction order
//!
//! A relayed plan is `[PayForRelay, Bridge]`. When the relayer is not
//! configured on-chain the plan degrades to `[Bridge]`; the transfer still
//! happens but has to be executed on the target chain manually.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use solbridge::tx_builder::{
//!     BridgeResult, NativeBridgeRequest, SubmissionManager, TransactionComposer,
//! };
//!
//! # async fn example(
//! #     composer: TransactionComposer,
//! #     submitter: SubmissionManager,
//! #     req: NativeBridgeRequest,
//! # ) -> BridgeResult<()> {
//! let plan = composer.build_native(req).await?;
//! let signed = submitter.sign(plan).await?;
//! let handle = submitter.submit(&signed).await?;
//! submitter.confirm(&handle).await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod call;
pub mod context;
pub mod errors;
pub mod instructions;
pub mod output;
pub mod submit;

pub use builder::{
    ComposerSettings, NativeBridgeRequest, RelaySettings, RelaySkip, TokenBridgeRequest,
    TransactionComposer,
};
pub use call::{parse_call_value, CallKind, ContractCall};
pub use context::{BridgeAttempt, BridgeSalt, SaltSource};
pub use errors::{BridgeError, BridgeResult};
pub use instructions::{sanity_check_plan_order, Discriminators};
pub use output::{
    BridgeTransactionPlan, ConfirmationHandle, PlanPath, QuoteWindow, SignedBridgePlan,
};
pub use submit::{SubmissionManager, SubmissionSettings, TransactionSigner};
