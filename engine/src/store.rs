//! Persistence boundary: typed keys/values, staged transactions, and the
//! in-memory reference backend.
//!
//! The [`State`] trait is the only thing the engine knows about storage.
//! Mutations are staged into a [`Txn`] and committed as one atomic change
//! list; [`Status::InsertNew`] carries unique-index semantics (commit fails
//! with [`CommitError::Conflict`] if the key already exists), which is how
//! settlement idempotency is enforced at the persistence layer.
//!
//! Per-user serialization is the backend's responsibility: `lease_user`
//! must block until the caller holds exclusive write access to that user's
//! rows. A SQL backend maps this to a row-level lock or serializable
//! transaction; [`Memory`] uses a keyed async mutex.

use anyhow::Result;
use riptide_types::{
    Balance, ExternalRef, HoldingId, LedgerEntry, OpeningId, PackOpening, SettlementRecord, UserId,
};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, RwLock};
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

/// Typed storage key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Balance(UserId),
    /// One ledger entry, addressed by per-user sequence number.
    LedgerEntry(UserId, u64),
    Holding(HoldingId),
    /// Index of a user's holdings, newest last.
    Inventory(UserId),
    Opening(OpeningId),
    /// Settlement record for an external payment reference. Written with
    /// `InsertNew` only.
    Settlement(ExternalRef),
    /// Chase cards drawn by a user on a given day index.
    ChaseCount(UserId, u64),
    /// Client-supplied draw idempotency token.
    DrawToken(UserId, String),
    Config(String),
}

/// Typed storage value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Balance(Balance),
    LedgerEntry(LedgerEntry),
    Holding(riptide_types::Holding),
    Inventory(Vec<HoldingId>),
    Opening(PackOpening),
    Settlement(SettlementRecord),
    Count(u64),
    OpeningRef(OpeningId),
    Config(String),
}

/// One staged change.
#[derive(Clone, Debug, PartialEq)]
pub enum Status {
    Update(Value),
    /// Insert that fails the whole commit if the key already exists.
    InsertNew(Value),
    Delete,
}

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("unique constraint violated on {0:?}")]
    Conflict(Key),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Exclusive access to one user's rows. Dropping the lease releases it.
pub struct UserLease {
    _guard: Box<dyn Any + Send>,
}

impl UserLease {
    pub fn new(guard: impl Any + Send) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

pub trait State: Send + Sync {
    fn get(&self, key: &Key) -> impl Future<Output = Result<Option<Value>>> + Send;

    /// Apply a change list atomically. All `InsertNew` keys are checked
    /// against existing rows before anything is written; any conflict fails
    /// the whole commit with nothing applied.
    fn commit(
        &self,
        changes: Vec<(Key, Status)>,
    ) -> impl Future<Output = Result<(), CommitError>> + Send;

    /// Acquire exclusive write access to `user`'s rows, blocking until
    /// available. Operations on distinct users must not contend.
    fn lease_user(&self, user: &UserId) -> impl Future<Output = Result<UserLease>> + Send;
}

/// Staged transaction over a [`State`].
///
/// Reads observe pending writes; nothing reaches the backend until
/// [`Txn::commit`]. Dropping an uncommitted transaction discards it, which
/// is what makes a failed draw leave no debit behind.
pub struct Txn<'a, S: State> {
    state: &'a S,
    pending: BTreeMap<Key, Status>,
}

impl<'a, S: State> Txn<'a, S> {
    pub fn new(state: &'a S) -> Self {
        Self {
            state,
            pending: BTreeMap::new(),
        }
    }

    pub async fn get(&self, key: &Key) -> Result<Option<Value>> {
        Ok(match self.pending.get(key) {
            Some(Status::Update(value)) | Some(Status::InsertNew(value)) => Some(value.clone()),
            Some(Status::Delete) => None,
            None => self.state.get(key).await?,
        })
    }

    pub fn stage(&mut self, key: Key, value: Value) {
        self.pending.insert(key, Status::Update(value));
    }

    /// Stage an insert that must not clobber an existing row. The conflict
    /// check happens at commit, atomically with the rest of the change
    /// list.
    pub fn stage_new(&mut self, key: Key, value: Value) {
        self.pending.insert(key, Status::InsertNew(value));
    }

    pub fn stage_delete(&mut self, key: Key) {
        self.pending.insert(key, Status::Delete);
    }

    pub async fn commit(self) -> Result<(), CommitError> {
        self.state.commit(self.pending.into_iter().collect()).await
    }
}

/// Lock-map entries with no outstanding lease beyond this count are pruned
/// on the next acquisition.
const LEASE_PRUNE_THRESHOLD: usize = 1024;

/// In-memory reference backend.
///
/// Commit is atomic under a single write lock; user leases are keyed async
/// mutexes with lazy eviction of idle entries, so the map does not grow
/// without bound.
#[derive(Default)]
pub struct Memory {
    state: RwLock<HashMap<Key, Value>>,
    leases: StdMutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl State for Memory {
    async fn get(&self, key: &Key) -> Result<Option<Value>> {
        let state = self.state.read().expect("state lock poisoned");
        Ok(state.get(key).cloned())
    }

    async fn commit(&self, changes: Vec<(Key, Status)>) -> Result<(), CommitError> {
        let mut state = self.state.write().expect("state lock poisoned");
        for (key, status) in &changes {
            if matches!(status, Status::InsertNew(_)) && state.contains_key(key) {
                return Err(CommitError::Conflict(key.clone()));
            }
        }
        for (key, status) in changes {
            match status {
                Status::Update(value) | Status::InsertNew(value) => {
                    state.insert(key, value);
                }
                Status::Delete => {
                    state.remove(&key);
                }
            }
        }
        Ok(())
    }

    async fn lease_user(&self, user: &UserId) -> Result<UserLease> {
        let lock = {
            let mut leases = self.leases.lock().expect("lease lock poisoned");
            if leases.len() > LEASE_PRUNE_THRESHOLD {
                leases.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            leases.entry(*user).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        Ok(UserLease::new(guard))
    }
}
