//! Fixture builders shared by the crate's tests. Also compiled for
//! downstream integration tests behind the `mocks` feature.

use crate::catalog::{CatalogRegistry, StaticCatalog};
use crate::store::Memory;
use crate::Engine;
use riptide_types::{
    CardId, DrawCandidate, EntryReason, GameCode, Metadata, Pack, PackId, Rips, Tier, UserId,
};
use std::sync::Arc;

/// An engine over an empty in-memory store with no catalogs registered.
pub fn empty_engine() -> Engine<Memory> {
    Engine::new(Memory::new(), CatalogRegistry::new())
}

/// An engine serving exactly one pack from a static catalog.
pub fn engine_with_pack(pack: Pack, pool: Vec<DrawCandidate>) -> Engine<Memory> {
    let game = pack.game;
    let catalog = StaticCatalog::new().with_pack(pack, pool);
    let registry = CatalogRegistry::new().register(game, Arc::new(catalog));
    Engine::new(Memory::new(), registry)
}

/// An active pack costing `cost_cents`.
pub fn pack(cost_cents: u64) -> Pack {
    Pack {
        id: PackId::generate(),
        game: GameCode::Mtg,
        name: "Test Booster".to_string(),
        cost: Rips::from_cents(cost_cents),
        is_active: true,
        tier_schedule: None,
    }
}

/// An active tier-model pack with the given schedule.
pub fn tiered_pack(cost_cents: u64, schedule: Vec<Tier>) -> Pack {
    Pack {
        tier_schedule: Some(schedule),
        ..pack(cost_cents)
    }
}

pub fn tier(id: u32, probability: f64, min_value: u64, max_value: u64) -> Tier {
    Tier {
        id,
        name: format!("tier-{id}"),
        probability,
        min_value,
        max_value,
    }
}

pub fn candidate(pack_id: PackId, market_value: u64) -> DrawCandidate {
    DrawCandidate::new(CardId::generate(), pack_id, market_value)
}

pub fn chase_candidate(pack_id: PackId, market_value: u64) -> DrawCandidate {
    DrawCandidate {
        chase: true,
        ..candidate(pack_id, market_value)
    }
}

pub fn tiered_candidate(pack_id: PackId, market_value: u64, tier_id: u32) -> DrawCandidate {
    DrawCandidate {
        tier_id: Some(tier_id),
        ..candidate(pack_id, market_value)
    }
}

/// Credit a user so a test can draw or sell against a known balance.
pub async fn fund(engine: &Engine<Memory>, user: &UserId, cents: u64) {
    engine
        .credit(
            user,
            Rips::from_cents(cents),
            EntryReason::Purchase,
            Metadata::new(),
            0,
        )
        .await
        .expect("funding fixture user");
}
