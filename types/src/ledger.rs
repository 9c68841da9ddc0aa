//! Balance and ledger entry types.
//!
//! A user's balance is only ever produced by appending ledger entries; the
//! `Balance` row caches the running amount and the next entry sequence
//! number. Entries are immutable and totally ordered per user by `seq`.

use crate::{Rips, UserId};
use serde::{Deserialize, Serialize};

/// Opaque key-value metadata attached to a ledger entry
/// (e.g. `pack_id`, `checkout_session_id`).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Credit,
    Debit,
}

/// Why an entry was appended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryReason {
    /// Currency purchased from the payment provider.
    Purchase,
    PackOpening,
    CardSellback,
    Refund,
}

impl EntryReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::PackOpening => "pack_opening",
            Self::CardSellback => "card_sellback",
            Self::Refund => "refund",
        }
    }
}

/// One immutable ledger entry.
///
/// `balance_after` is a snapshot computed from the mutation that produced
/// the entry, never read back from a separate query. For entry N:
/// `balance_after(N) == balance_after(N-1) ± amount(N)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Per-user sequence number, starting at 0.
    pub seq: u64,
    pub user_id: UserId,
    pub kind: EntryKind,
    /// Positive magnitude of the mutation.
    pub amount: Rips,
    pub reason: EntryReason,
    pub balance_after: Rips,
    pub metadata: Metadata,
    /// Unix seconds.
    pub created_at: u64,
}

/// Cached balance row. Invariant: `amount` equals the sum of all committed
/// credits minus debits for the user, and `entries` is the next `seq`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub amount: Rips,
    /// Number of ledger entries appended so far.
    pub entries: u64,
    /// Unix seconds of the last mutation.
    pub updated_at: u64,
}
