//! Engine error taxonomy.

use crate::{PackId, Rips};
use thiserror::Error;

/// Errors surfaced by engine operations.
///
/// Every variant except `Store` is a business-logic outcome: it is returned
/// verbatim to the caller and must not be retried automatically. `Store`
/// wraps persistence-layer failures. Note that a duplicate settlement is
/// NOT an error; it is reported as a successful
/// [`SettleReceipt`](crate::SettleReceipt) with `already_processed = true`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("pack not found")]
    PackNotFound,
    #[error("pack is not active")]
    PackInactive,
    #[error("pack has no cards assigned")]
    EmptyPool,
    #[error("no candidates are eligible for this draw")]
    NoEligibleCandidates,
    #[error("selected card does not belong to pack {pack_id}")]
    IntegrityViolation { pack_id: PackId },
    #[error("insufficient rips (available {available}, required {required})")]
    InsufficientFunds { available: Rips, required: Rips },
    #[error("holding not found")]
    HoldingNotFound,
    #[error("card has already been sold")]
    AlreadySold,
    #[error("card has already been shipped and cannot be sold")]
    AlreadyShipped,
    #[error("candidate pool has no positive weights")]
    InvalidPool,
    #[error("unknown game code: {0}")]
    UnknownGame(String),
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl EngineError {
    /// Whether this error is a business outcome (as opposed to an
    /// infrastructure or data-integrity failure).
    pub fn is_business(&self) -> bool {
        !matches!(self, Self::Store(_) | Self::IntegrityViolation { .. })
    }
}
