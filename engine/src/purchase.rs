//! Payment settlement idempotency guard.
//!
//! External payment confirmations arrive at-least-once over more than one
//! channel (webhook push and a user-facing confirmation poll). The payment
//! provider's reference is the natural idempotency key: the first
//! settlement inserts the record under a uniqueness constraint and credits
//! the ledger in the same commit; every later or concurrent duplicate
//! observes the existing record (or the commit conflict) and returns the
//! current balance with `already_processed = true`, mutating nothing.

use crate::ledger;
use crate::store::{CommitError, Key, State, Txn, Value};
use crate::Engine;
use riptide_types::{
    EngineError, EntryReason, ExternalRef, Metadata, Rips, SettleReceipt, SettlementRecord, UserId,
};
use tracing::info;

impl<S: State> Engine<S> {
    /// Credit externally purchased currency exactly once per `external_ref`.
    pub async fn settle_purchase(
        &self,
        user: &UserId,
        external_ref: &ExternalRef,
        amount: Rips,
        mut metadata: Metadata,
        now: u64,
    ) -> Result<SettleReceipt, EngineError> {
        let _lease = self.state().lease_user(user).await?;

        // Fast path for the common webhook/poll double delivery. The
        // authoritative guard is the InsertNew conflict below; this check
        // only avoids building a transaction that is known to fail.
        if let Some(Value::Settlement(_)) = self
            .state()
            .get(&Key::Settlement(external_ref.clone()))
            .await?
        {
            return self.already_processed(user, external_ref).await;
        }

        metadata.insert("external_ref".into(), external_ref.to_string().into());
        let mut txn = Txn::new(self.state());
        let balance =
            ledger::credit_in_txn(&mut txn, user, amount, EntryReason::Purchase, metadata, now)
                .await?;
        txn.stage_new(
            Key::Settlement(external_ref.clone()),
            Value::Settlement(SettlementRecord {
                user_id: *user,
                amount,
                settled_at: now,
            }),
        );

        match txn.commit().await {
            Ok(()) => {
                info!(%user, %external_ref, %amount, "purchase settled");
                Ok(SettleReceipt {
                    external_ref: external_ref.clone(),
                    new_balance: balance.amount,
                    already_processed: false,
                })
            }
            // A concurrent duplicate won the insert; nothing was applied.
            Err(CommitError::Conflict(_)) => self.already_processed(user, external_ref).await,
            Err(CommitError::Store(err)) => Err(EngineError::Store(err)),
        }
    }

    async fn already_processed(
        &self,
        user: &UserId,
        external_ref: &ExternalRef,
    ) -> Result<SettleReceipt, EngineError> {
        info!(%user, %external_ref, "duplicate settlement ignored");
        Ok(SettleReceipt {
            external_ref: external_ref.clone(),
            new_balance: self.balance(user).await?,
            already_processed: true,
        })
    }
}
