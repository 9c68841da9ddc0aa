//! Common types for the riptide draw & economy engine.
//!
//! Everything here is plain data shared across the engine and its callers:
//! identifiers, the fixed-point `Rips` currency, catalog types (packs,
//! candidates, tiers, per-game card metadata), ledger entries, draw
//! outcomes/holdings, and the engine error taxonomy.

pub mod catalog;
pub mod currency;
pub mod draw;
pub mod error;
pub mod ids;
pub mod ledger;

pub use catalog::{CardDetails, DrawCandidate, ImageUris, Pack, Tier};
pub use currency::Rips;
pub use draw::{
    CardOdds, DrawOutcome, DrawReceipt, Holding, HoldingStatus, PackOdds, PackOpening,
    SellbackReceipt, SettleReceipt, SettlementRecord,
};
pub use error::EngineError;
pub use ids::{CardId, ExternalRef, GameCode, HoldingId, OpeningId, PackId, UserId};
pub use ledger::{Balance, EntryKind, EntryReason, LedgerEntry, Metadata};
