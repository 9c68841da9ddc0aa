//! Settlement recorder: opening audit records, holdings, sellback, and
//! shipping flags.
//!
//! Sellback is one logical transaction: the ledger credit and the holding's
//! terminal flag commit together or not at all.

use crate::config::DrawSettings;
use crate::ledger;
use crate::store::{Key, State, Txn, Value};
use crate::Engine;
use riptide_types::{
    DrawOutcome, EngineError, EntryReason, Holding, HoldingId, HoldingStatus, Metadata, OpeningId,
    Pack, PackOpening, Rips, SellbackReceipt, UserId,
};
use tracing::info;

/// Stage the audit record and holding for a completed draw.
pub(crate) async fn record_draw_in_txn<S: State>(
    txn: &mut Txn<'_, S>,
    user: &UserId,
    pack: &Pack,
    card: DrawOutcome,
    cost: Rips,
    now: u64,
) -> Result<(OpeningId, HoldingId), EngineError> {
    let opening_id = OpeningId::generate();
    let holding_id = HoldingId::generate();

    txn.stage(
        Key::Holding(holding_id),
        Value::Holding(Holding {
            id: holding_id,
            user_id: *user,
            opening_id,
            pack_id: pack.id,
            game: pack.game,
            card: card.clone(),
            status: HoldingStatus::Owned,
        }),
    );

    let mut inventory = match txn.get(&Key::Inventory(*user)).await? {
        Some(Value::Inventory(holdings)) => holdings,
        _ => Vec::new(),
    };
    inventory.push(holding_id);
    txn.stage(Key::Inventory(*user), Value::Inventory(inventory));

    txn.stage(
        Key::Opening(opening_id),
        Value::Opening(PackOpening {
            id: opening_id,
            user_id: *user,
            pack_id: pack.id,
            cost,
            card,
            holding_id,
            created_at: now,
        }),
    );

    Ok((opening_id, holding_id))
}

async fn owned_holding_or_error<S: State>(
    txn: &Txn<'_, S>,
    user: &UserId,
    holding_id: &HoldingId,
) -> Result<Holding, EngineError> {
    let holding = match txn.get(&Key::Holding(*holding_id)).await? {
        Some(Value::Holding(holding)) => holding,
        _ => return Err(EngineError::HoldingNotFound),
    };
    // Another user's holding is indistinguishable from a missing one.
    if holding.user_id != *user {
        return Err(EngineError::HoldingNotFound);
    }
    match holding.status {
        HoldingStatus::Owned => Ok(holding),
        HoldingStatus::Sold { .. } => Err(EngineError::AlreadySold),
        HoldingStatus::Shipped { .. } => Err(EngineError::AlreadyShipped),
    }
}

impl<S: State> Engine<S> {
    /// Sell a holding back to the house at the configured rate.
    pub async fn sellback(
        &self,
        user: &UserId,
        holding_id: &HoldingId,
        now: u64,
    ) -> Result<SellbackReceipt, EngineError> {
        let settings = DrawSettings::load(self.state()).await;
        let _lease = self.state().lease_user(user).await?;

        let mut txn = Txn::new(self.state());
        let mut holding = owned_holding_or_error(&txn, user, holding_id).await?;

        let credited = settings.sellback_value(holding.card.market_value);
        let mut metadata = Metadata::new();
        metadata.insert("holding_id".into(), holding_id.to_string().into());
        metadata.insert("card_id".into(), holding.card.card_id.to_string().into());
        metadata.insert("card_value_cents".into(), holding.card.market_value.into());
        let balance = ledger::credit_in_txn(
            &mut txn,
            user,
            credited,
            EntryReason::CardSellback,
            metadata,
            now,
        )
        .await?;

        holding.status = HoldingStatus::Sold {
            proceeds: credited,
            sold_at: now,
        };
        txn.stage(Key::Holding(*holding_id), Value::Holding(holding));
        txn.commit().await.map_err(anyhow::Error::from)?;

        info!(%user, %holding_id, %credited, "holding sold back");
        Ok(SellbackReceipt {
            holding_id: *holding_id,
            credited,
            new_balance: balance.amount,
        })
    }

    /// Flag a holding as shipped (terminal). Physical fulfillment is
    /// handled elsewhere; this only removes the holding from the sellable
    /// set.
    pub async fn mark_shipped(
        &self,
        user: &UserId,
        holding_id: &HoldingId,
        now: u64,
    ) -> Result<(), EngineError> {
        let _lease = self.state().lease_user(user).await?;

        let mut txn = Txn::new(self.state());
        let mut holding = owned_holding_or_error(&txn, user, holding_id).await?;
        holding.status = HoldingStatus::Shipped { shipped_at: now };
        txn.stage(Key::Holding(*holding_id), Value::Holding(holding));
        txn.commit().await.map_err(anyhow::Error::from)?;

        info!(%user, %holding_id, "holding shipped");
        Ok(())
    }

    /// All of a user's holdings, oldest first.
    pub async fn inventory(&self, user: &UserId) -> Result<Vec<Holding>, EngineError> {
        let txn = Txn::new(self.state());
        let ids = match txn.get(&Key::Inventory(*user)).await? {
            Some(Value::Inventory(ids)) => ids,
            _ => return Ok(Vec::new()),
        };
        let mut holdings = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(Value::Holding(holding)) = txn.get(&Key::Holding(id)).await? {
                holdings.push(holding);
            }
        }
        Ok(holdings)
    }

    /// Audit record for one opening.
    pub async fn opening(&self, opening_id: &OpeningId) -> Result<Option<PackOpening>, EngineError> {
        let txn = Txn::new(self.state());
        Ok(match txn.get(&Key::Opening(*opening_id)).await? {
            Some(Value::Opening(opening)) => Some(opening),
            _ => None,
        })
    }
}
