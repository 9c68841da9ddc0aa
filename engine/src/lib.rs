//! Riptide execution layer: the draw & economy engine.
//!
//! This crate owns everything between the web layer and the persistence
//! backend: weighted card selection, draw policy (eligibility filters,
//! integrity checks), the balance ledger, settlement recording, and the
//! payment idempotency guard.
//!
//! ## Atomicity requirements
//! - Every mutating operation stages its changes in a [`store::Txn`] and
//!   commits them as one unit; a draw can never debit without recording an
//!   outcome.
//! - Per-user operations are serialized by acquiring the backend's user
//!   lease before opening a transaction. Backends provide the equivalent of
//!   a row-level lock; the engine never relies on process-wide mutexes for
//!   correctness across instances.
//! - Exactly-once settlement is enforced at commit time via
//!   [`store::Status::InsertNew`] (unique-index semantics), not by an
//!   application-level pre-check alone.
//!
//! ## Determinism requirements
//! - The engine never reads wall-clock time; callers pass `now` (unix
//!   seconds) into every operation.
//! - All randomness comes from the caller-supplied [`rand::Rng`].
//!
//! The primary entrypoint is [`Engine`].

pub mod catalog;
pub mod config;
pub mod draw;
pub mod ledger;
pub mod purchase;
pub mod selector;
pub mod settlement;
pub mod store;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

#[cfg(test)]
mod settlement_idempotency_tests;

pub use catalog::{Catalog, CatalogRegistry, StaticCatalog};
pub use config::{DrawSettings, WeightModel};
pub use store::{CommitError, Key, Memory, State, Status, Txn, UserLease, Value};

use riptide_types::EngineError;

/// The draw & economy engine.
///
/// Generic over the persistence backend so the same logic runs against the
/// in-memory reference backend in tests and a durable store in production.
pub struct Engine<S: State> {
    state: S,
    catalogs: CatalogRegistry,
}

impl<S: State> Engine<S> {
    pub fn new(state: S, catalogs: CatalogRegistry) -> Self {
        Self { state, catalogs }
    }

    pub fn catalogs(&self) -> &CatalogRegistry {
        &self.catalogs
    }

    pub(crate) fn state(&self) -> &S {
        &self.state
    }

    /// Set a runtime configuration value (see [`config`] for keys).
    pub async fn set_config(&self, key: &str, value: &str) -> Result<(), EngineError> {
        self.state
            .commit(vec![(
                Key::Config(key.to_string()),
                Status::Update(Value::Config(value.to_string())),
            )])
            .await
            .map_err(|err| EngineError::Store(err.into()))
    }
}
