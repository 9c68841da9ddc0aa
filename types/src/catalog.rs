//! Catalog types: packs, draw candidates, tiers, and per-game card metadata.
//!
//! The catalog is owned by an external collaborator and is read-only from
//! the engine's perspective. Card metadata arrives as a tagged per-game
//! union (`CardDetails`), parsed once at the catalog boundary; downstream
//! code never re-parses raw payloads.

use crate::{CardId, GameCode, PackId, Rips};
use serde::{Deserialize, Serialize};

/// A purchasable pack: a drawable pool of candidate cards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pack {
    pub id: PackId,
    pub game: GameCode,
    pub name: String,
    /// Cost of one opening.
    pub cost: Rips,
    pub is_active: bool,
    /// Present only for packs drawn with the discrete tier model.
    pub tier_schedule: Option<Vec<Tier>>,
}

/// A named probability bucket with an associated value range, used by the
/// discrete tier weighting model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub id: u32,
    pub name: String,
    /// Probability mass assigned to this tier (0..=1). Tier probabilities
    /// across a pack should sum to 1.0; the selector normalizes when they
    /// drift beyond tolerance.
    pub probability: f64,
    /// Inclusive lower bound of the tier's value range, in cents.
    pub min_value: u64,
    /// Exclusive upper bound of the tier's value range, in cents.
    pub max_value: u64,
}

/// Image URI variants as provided by the upstream card databases.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUris {
    pub small: Option<String>,
    pub normal: Option<String>,
    pub large: Option<String>,
    pub png: Option<String>,
}

impl ImageUris {
    /// Preferred display URL: normal, then large, then png, then small.
    pub fn best(&self) -> Option<&str> {
        self.normal
            .as_deref()
            .or(self.large.as_deref())
            .or(self.png.as_deref())
            .or(self.small.as_deref())
    }
}

/// Per-game card metadata, tagged by game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "game", rename_all = "snake_case")]
pub enum CardDetails {
    Mtg {
        name: String,
        set_name: Option<String>,
        set_code: Option<String>,
        rarity: Option<String>,
        image: Option<ImageUris>,
    },
    Pokemon {
        name: String,
        series: Option<String>,
        rarity: Option<String>,
        image: Option<ImageUris>,
    },
}

impl CardDetails {
    pub fn name(&self) -> &str {
        match self {
            Self::Mtg { name, .. } | Self::Pokemon { name, .. } => name,
        }
    }

    pub fn rarity(&self) -> Option<&str> {
        match self {
            Self::Mtg { rarity, .. } | Self::Pokemon { rarity, .. } => rarity.as_deref(),
        }
    }

    pub fn set_name(&self) -> Option<&str> {
        match self {
            Self::Mtg { set_name, .. } => set_name.as_deref(),
            Self::Pokemon { series, .. } => series.as_deref(),
        }
    }

    pub fn set_code(&self) -> Option<&str> {
        match self {
            Self::Mtg { set_code, .. } => set_code.as_deref(),
            Self::Pokemon { .. } => None,
        }
    }

    pub fn image_url(&self) -> Option<&str> {
        match self {
            Self::Mtg { image, .. } | Self::Pokemon { image, .. } => {
                image.as_ref().and_then(ImageUris::best)
            }
        }
    }
}

/// One card eligible to be drawn from a pack.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DrawCandidate {
    pub card_id: CardId,
    pub pack_id: PackId,
    /// Current market value in cents. Must be positive to be drawable.
    pub market_value: u64,
    /// Tier membership, when the pack uses the tier model.
    pub tier_id: Option<u32>,
    /// Ultra-chase class cards are subject to the daily draw limit.
    pub chase: bool,
    pub foil: bool,
    pub condition: Option<String>,
    /// Enrichment metadata. Optional: a missing record degrades the drawn
    /// card's display fields but never blocks a draw.
    pub details: Option<CardDetails>,
}

impl DrawCandidate {
    pub fn new(card_id: CardId, pack_id: PackId, market_value: u64) -> Self {
        Self {
            card_id,
            pack_id,
            market_value,
            tier_id: None,
            chase: false,
            foil: false,
            condition: None,
            details: None,
        }
    }
}
