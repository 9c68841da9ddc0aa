//! Balance ledger.
//!
//! Balances are never mutated directly: every credit and debit appends
//! exactly one immutable [`LedgerEntry`] and rewrites the cached balance
//! row in the same staged transaction. `balance_after` is computed from the
//! mutation itself, never read back from a separate query.

use crate::store::{Key, State, Txn, Value};
use crate::Engine;
use anyhow::{anyhow, Result};
use riptide_types::{
    Balance, EngineError, EntryKind, EntryReason, LedgerEntry, Metadata, Rips, UserId,
};
use tracing::info;

pub(crate) async fn load_balance<S: State>(txn: &Txn<'_, S>, user: &UserId) -> Result<Balance> {
    Ok(match txn.get(&Key::Balance(*user)).await? {
        Some(Value::Balance(balance)) => balance,
        _ => Balance::default(),
    })
}

fn append_entry<S: State>(
    txn: &mut Txn<'_, S>,
    user: &UserId,
    balance: Balance,
    kind: EntryKind,
    amount: Rips,
    reason: EntryReason,
    new_amount: Rips,
    metadata: Metadata,
    now: u64,
) -> Balance {
    let seq = balance.entries;
    txn.stage(
        Key::LedgerEntry(*user, seq),
        Value::LedgerEntry(LedgerEntry {
            seq,
            user_id: *user,
            kind,
            amount,
            reason,
            balance_after: new_amount,
            metadata,
            created_at: now,
        }),
    );
    let updated = Balance {
        amount: new_amount,
        entries: seq + 1,
        updated_at: now,
    };
    txn.stage(Key::Balance(*user), Value::Balance(updated.clone()));
    updated
}

/// Stage a credit. Returns the updated balance row.
pub(crate) async fn credit_in_txn<S: State>(
    txn: &mut Txn<'_, S>,
    user: &UserId,
    amount: Rips,
    reason: EntryReason,
    metadata: Metadata,
    now: u64,
) -> Result<Balance, EngineError> {
    let balance = load_balance(txn, user).await?;
    let new_amount = balance
        .amount
        .checked_add(amount)
        .ok_or_else(|| anyhow!("balance overflow for {user}"))?;
    Ok(append_entry(
        txn, user, balance, EntryKind::Credit, amount, reason, new_amount, metadata, now,
    ))
}

/// Stage a debit. Fails `InsufficientFunds` without staging anything when
/// the balance cannot cover `amount`.
pub(crate) async fn debit_in_txn<S: State>(
    txn: &mut Txn<'_, S>,
    user: &UserId,
    amount: Rips,
    reason: EntryReason,
    metadata: Metadata,
    now: u64,
) -> Result<Balance, EngineError> {
    let balance = load_balance(txn, user).await?;
    let new_amount =
        balance
            .amount
            .checked_sub(amount)
            .ok_or(EngineError::InsufficientFunds {
                available: balance.amount,
                required: amount,
            })?;
    Ok(append_entry(
        txn, user, balance, EntryKind::Debit, amount, reason, new_amount, metadata, now,
    ))
}

impl<S: State> Engine<S> {
    /// Current balance for a user. Unknown users hold zero.
    pub async fn balance(&self, user: &UserId) -> Result<Rips, EngineError> {
        let txn = Txn::new(self.state());
        Ok(load_balance(&txn, user).await?.amount)
    }

    /// Most recent ledger entries, newest first.
    pub async fn transactions(
        &self,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, EngineError> {
        let txn = Txn::new(self.state());
        let balance = load_balance(&txn, user).await?;
        let mut entries = Vec::with_capacity(limit.min(balance.entries as usize));
        let mut seq = balance.entries;
        while seq > 0 && entries.len() < limit {
            seq -= 1;
            match txn.get(&Key::LedgerEntry(*user, seq)).await? {
                Some(Value::LedgerEntry(entry)) => entries.push(entry),
                _ => {
                    return Err(EngineError::Store(anyhow!(
                        "missing ledger entry {seq} for {user}"
                    )))
                }
            }
        }
        Ok(entries)
    }

    /// Credit a user's balance as a standalone operation.
    pub async fn credit(
        &self,
        user: &UserId,
        amount: Rips,
        reason: EntryReason,
        metadata: Metadata,
        now: u64,
    ) -> Result<Rips, EngineError> {
        let _lease = self.state().lease_user(user).await?;
        let mut txn = Txn::new(self.state());
        let balance = credit_in_txn(&mut txn, user, amount, reason, metadata, now).await?;
        txn.commit().await.map_err(anyhow::Error::from)?;
        info!(%user, %amount, reason = reason.as_str(), "credited");
        Ok(balance.amount)
    }

    /// Debit a user's balance as a standalone operation.
    pub async fn debit(
        &self,
        user: &UserId,
        amount: Rips,
        reason: EntryReason,
        metadata: Metadata,
        now: u64,
    ) -> Result<Rips, EngineError> {
        let _lease = self.state().lease_user(user).await?;
        let mut txn = Txn::new(self.state());
        let balance = debit_in_txn(&mut txn, user, amount, reason, metadata, now).await?;
        txn.commit().await.map_err(anyhow::Error::from)?;
        info!(%user, %amount, reason = reason.as_str(), "debited");
        Ok(balance.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks;

    fn no_metadata() -> Metadata {
        Metadata::new()
    }

    #[tokio::test]
    async fn test_credit_then_debit_chain() {
        let engine = mocks::empty_engine();
        let user = UserId::generate();

        let after_credit = engine
            .credit(
                &user,
                Rips::from_cents(1_000),
                EntryReason::Purchase,
                no_metadata(),
                100,
            )
            .await
            .unwrap();
        assert_eq!(after_credit, Rips::from_cents(1_000));

        let after_debit = engine
            .debit(
                &user,
                Rips::from_cents(300),
                EntryReason::PackOpening,
                no_metadata(),
                101,
            )
            .await
            .unwrap();
        assert_eq!(after_debit, Rips::from_cents(700));

        let entries = engine.transactions(&user, 50).await.unwrap();
        assert_eq!(entries.len(), 2);
        // Newest first.
        assert_eq!(entries[0].seq, 1);
        assert_eq!(entries[0].kind, EntryKind::Debit);
        assert_eq!(entries[0].balance_after, Rips::from_cents(700));
        assert_eq!(entries[1].balance_after, Rips::from_cents(1_000));
    }

    #[tokio::test]
    async fn test_overdraft_rejected_without_mutation() {
        let engine = mocks::empty_engine();
        let user = UserId::generate();
        engine
            .credit(
                &user,
                Rips::from_cents(100),
                EntryReason::Purchase,
                no_metadata(),
                1,
            )
            .await
            .unwrap();

        let result = engine
            .debit(
                &user,
                Rips::from_cents(101),
                EntryReason::PackOpening,
                no_metadata(),
                2,
            )
            .await;
        assert!(matches!(
            result,
            Err(EngineError::InsufficientFunds {
                available,
                required,
            }) if available == Rips::from_cents(100) && required == Rips::from_cents(101)
        ));

        assert_eq!(engine.balance(&user).await.unwrap(), Rips::from_cents(100));
        assert_eq!(engine.transactions(&user, 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ledger_conservation() {
        let engine = mocks::empty_engine();
        let user = UserId::generate();

        for (credit, amount) in [
            (true, 500u64),
            (true, 2_000),
            (false, 700),
            (true, 50),
            (false, 1_200),
        ] {
            let amount = Rips::from_cents(amount);
            if credit {
                engine
                    .credit(&user, amount, EntryReason::Purchase, no_metadata(), 1)
                    .await
                    .unwrap();
            } else {
                engine
                    .debit(&user, amount, EntryReason::PackOpening, no_metadata(), 1)
                    .await
                    .unwrap();
            }
        }

        let entries = engine.transactions(&user, 100).await.unwrap();
        let mut credits = 0u64;
        let mut debits = 0u64;
        for entry in &entries {
            match entry.kind {
                EntryKind::Credit => credits += entry.amount.cents(),
                EntryKind::Debit => debits += entry.amount.cents(),
            }
        }
        assert_eq!(
            engine.balance(&user).await.unwrap().cents(),
            credits - debits
        );
    }

    #[tokio::test]
    async fn test_unknown_user_is_zero() {
        let engine = mocks::empty_engine();
        assert_eq!(
            engine.balance(&UserId::generate()).await.unwrap(),
            Rips::ZERO
        );
    }
}
