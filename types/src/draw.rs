//! Draw outcomes, holdings, audit records, and operation receipts.

use crate::{
    CardId, DrawCandidate, ExternalRef, GameCode, HoldingId, OpeningId, PackId, Rips, UserId,
};
use serde::{Deserialize, Serialize};

/// The result of one draw. Created transiently by the draw policy engine,
/// persisted by the settlement recorder, never mutated afterwards.
///
/// Display fields are enrichment: they degrade to `None` when catalog
/// metadata is missing but a missing name never fails a draw.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DrawOutcome {
    pub card_id: CardId,
    /// Market value in cents at draw time.
    pub market_value: u64,
    pub tier_id: Option<u32>,
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub set_name: Option<String>,
    pub set_code: Option<String>,
    pub rarity: Option<String>,
    pub foil: bool,
    pub condition: Option<String>,
    /// Unix seconds.
    pub drawn_at: u64,
}

impl DrawOutcome {
    /// Build an outcome from a selected candidate. `market_value` is passed
    /// separately because the tier model rolls it rather than reading it
    /// off the candidate.
    pub fn from_candidate(candidate: &DrawCandidate, market_value: u64, drawn_at: u64) -> Self {
        let details = candidate.details.as_ref();
        Self {
            card_id: candidate.card_id,
            market_value,
            tier_id: candidate.tier_id,
            name: details.map(|d| d.name().to_string()),
            image_url: details.and_then(|d| d.image_url()).map(str::to_string),
            set_name: details.and_then(|d| d.set_name()).map(str::to_string),
            set_code: details.and_then(|d| d.set_code()).map(str::to_string),
            rarity: details.and_then(|d| d.rarity()).map(str::to_string),
            foil: candidate.foil,
            condition: candidate.condition.clone(),
            drawn_at,
        }
    }
}

/// Lifecycle of a holding. `Sold` and `Shipped` are terminal; holdings are
/// never deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum HoldingStatus {
    Owned,
    Sold { proceeds: Rips, sold_at: u64 },
    Shipped { shipped_at: u64 },
}

/// A user-owned card resulting from a draw.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub id: HoldingId,
    pub user_id: UserId,
    pub opening_id: OpeningId,
    pub pack_id: PackId,
    pub game: GameCode,
    pub card: DrawOutcome,
    pub status: HoldingStatus,
}

/// Audit record of one pack-opening event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackOpening {
    pub id: OpeningId,
    pub user_id: UserId,
    pub pack_id: PackId,
    pub cost: Rips,
    pub card: DrawOutcome,
    pub holding_id: HoldingId,
    /// Unix seconds.
    pub created_at: u64,
}

/// Record of one settled external payment, keyed by its `ExternalRef`
/// under a uniqueness constraint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub user_id: UserId,
    pub amount: Rips,
    /// Unix seconds.
    pub settled_at: u64,
}

/// Successful draw response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DrawReceipt {
    pub opening_id: OpeningId,
    pub holding_id: HoldingId,
    pub card: DrawOutcome,
    pub new_balance: Rips,
    /// True when a client idempotency token replayed a previously recorded
    /// opening instead of performing a new draw.
    pub replayed: bool,
}

/// Successful sellback response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SellbackReceipt {
    pub holding_id: HoldingId,
    pub credited: Rips,
    pub new_balance: Rips,
}

/// Settlement response. `already_processed` is a no-op success, not an
/// error: the referenced payment was credited by an earlier attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SettleReceipt {
    pub external_ref: ExternalRef,
    pub new_balance: Rips,
    pub already_processed: bool,
}

/// Per-card selection odds for a pack, as computed by the configured
/// weighting model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardOdds {
    pub card_id: CardId,
    pub market_value: u64,
    pub weight: f64,
    pub probability: f64,
}

/// Odds for a whole pack plus the pool's expected value in cents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackOdds {
    pub pack_id: PackId,
    pub cards: Vec<CardOdds>,
    pub expected_value: f64,
}
