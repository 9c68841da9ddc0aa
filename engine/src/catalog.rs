//! Catalog boundary.
//!
//! Packs, candidate pools, and card metadata are owned by an external
//! catalog collaborator; the engine reads them through the [`Catalog`]
//! trait. Adapters are resolved once at startup through a typed
//! [`CatalogRegistry`] keyed by [`GameCode`] — there is no runtime table
//! name dispatch.
//!
//! Implementations are expected to serve from a local snapshot/cache; the
//! catalog is read-only for the duration of a draw and needs no locking.

use riptide_types::{DrawCandidate, EngineError, GameCode, Pack, PackId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub trait Catalog: Send + Sync {
    /// Look up a pack by id.
    fn pack(&self, pack_id: &PackId) -> Option<Pack>;

    /// The full candidate pool for a pack. Candidates with non-positive
    /// market values may be present; the draw policy filters them.
    fn candidate_pool(&self, pack_id: &PackId) -> Vec<DrawCandidate>;
}

/// Typed registry of catalog adapters, one per game, resolved at startup.
#[derive(Clone, Default)]
pub struct CatalogRegistry {
    adapters: BTreeMap<GameCode, Arc<dyn Catalog>>,
}

impl CatalogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, game: GameCode, adapter: Arc<dyn Catalog>) -> Self {
        self.adapters.insert(game, adapter);
        self
    }

    pub fn adapter(&self, game: GameCode) -> Option<&Arc<dyn Catalog>> {
        self.adapters.get(&game)
    }

    /// Find a pack across all registered games.
    pub fn find_pack(&self, pack_id: &PackId) -> Option<(GameCode, Pack)> {
        self.adapters
            .iter()
            .find_map(|(game, adapter)| adapter.pack(pack_id).map(|pack| (*game, pack)))
    }

    /// Candidate pool for a pack owned by `game`.
    pub fn candidate_pool(
        &self,
        game: GameCode,
        pack_id: &PackId,
    ) -> Result<Vec<DrawCandidate>, EngineError> {
        let adapter = self
            .adapters
            .get(&game)
            .ok_or_else(|| EngineError::UnknownGame(game.to_string()))?;
        Ok(adapter.candidate_pool(pack_id))
    }
}

/// Fixed in-memory catalog, used by tests and demo wiring.
#[derive(Default)]
pub struct StaticCatalog {
    packs: HashMap<PackId, Pack>,
    pools: HashMap<PackId, Vec<DrawCandidate>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pack(mut self, pack: Pack, pool: Vec<DrawCandidate>) -> Self {
        self.pools.insert(pack.id, pool);
        self.packs.insert(pack.id, pack);
        self
    }
}

impl Catalog for StaticCatalog {
    fn pack(&self, pack_id: &PackId) -> Option<Pack> {
        self.packs.get(pack_id).cloned()
    }

    fn candidate_pool(&self, pack_id: &PackId) -> Vec<DrawCandidate> {
        self.pools.get(pack_id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riptide_types::{CardId, Rips};

    fn pack(game: GameCode) -> Pack {
        Pack {
            id: PackId::generate(),
            game,
            name: "Test Pack".to_string(),
            cost: Rips::from_whole(1),
            is_active: true,
            tier_schedule: None,
        }
    }

    #[test]
    fn test_find_pack_across_games() {
        let mtg_pack = pack(GameCode::Mtg);
        let pokemon_pack = pack(GameCode::Pokemon);
        let pool = vec![DrawCandidate::new(
            CardId::generate(),
            pokemon_pack.id,
            500,
        )];

        let registry = CatalogRegistry::new()
            .register(
                GameCode::Mtg,
                Arc::new(StaticCatalog::new().with_pack(mtg_pack.clone(), vec![])),
            )
            .register(
                GameCode::Pokemon,
                Arc::new(StaticCatalog::new().with_pack(pokemon_pack.clone(), pool)),
            );

        let (game, found) = registry.find_pack(&pokemon_pack.id).unwrap();
        assert_eq!(game, GameCode::Pokemon);
        assert_eq!(found.id, pokemon_pack.id);
        assert_eq!(
            registry.candidate_pool(game, &pokemon_pack.id).unwrap().len(),
            1
        );
        assert!(registry.find_pack(&PackId::generate()).is_none());
    }

    #[test]
    fn test_unregistered_game_is_an_error() {
        let registry = CatalogRegistry::new();
        let result = registry.candidate_pool(GameCode::Mtg, &PackId::generate());
        assert!(matches!(result, Err(EngineError::UnknownGame(_))));
    }
}
