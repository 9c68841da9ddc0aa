//! Draw policy engine.
//!
//! Orchestrates one pack opening: resolve the pack, load and filter the
//! candidate pool, select a card under the configured weighting model,
//! verify pool membership, then debit the cost and record the outcome. The
//! debit and the settlement records commit as one transaction, so a draw
//! that fails at any step leaves the balance untouched.

use crate::config::{DrawSettings, WeightModel};
use crate::ledger;
use crate::selector;
use crate::settlement;
use crate::store::{CommitError, Key, State, Txn, Value};
use crate::Engine;
use rand::Rng;
use riptide_types::{
    CardOdds, DrawCandidate, DrawOutcome, DrawReceipt, EngineError, EntryReason, Metadata, Pack,
    PackId, PackOdds, UserId,
};
use tracing::{error, info, warn};

impl<S: State> Engine<S> {
    /// Open a pack for a user.
    ///
    /// `token`, when supplied, is a client idempotency key: replaying it
    /// returns the originally recorded opening instead of drawing (and
    /// debiting) again.
    pub async fn draw<R: Rng + Send>(
        &self,
        user: &UserId,
        pack_id: &PackId,
        token: Option<&str>,
        now: u64,
        rng: &mut R,
    ) -> Result<DrawReceipt, EngineError> {
        let settings = DrawSettings::load(self.state()).await;
        let _lease = self.state().lease_user(user).await?;

        if let Some(token) = token {
            if let Some(receipt) = self.replay_token(user, token).await? {
                return Ok(receipt);
            }
        }

        let (pack, eligible) = self.eligible_pool(user, pack_id, &settings, now).await?;

        let mut txn = Txn::new(self.state());
        let mut metadata = Metadata::new();
        metadata.insert("pack_id".into(), pack_id.to_string().into());
        let balance = ledger::debit_in_txn(
            &mut txn,
            user,
            pack.cost,
            EntryReason::PackOpening,
            metadata,
            now,
        )
        .await?;

        let (selected, market_value) = select_card(&pack, &eligible, &settings, rng)?;

        // Fail closed on any cross-pool leakage (stale cache, catalog bug).
        // The transaction is dropped, so the debit never lands.
        if selected.pack_id != *pack_id {
            error!(
                %user, pack = %pack_id, selected_pack = %selected.pack_id,
                card = %selected.card_id, "selected card does not belong to pack"
            );
            return Err(EngineError::IntegrityViolation { pack_id: *pack_id });
        }

        let card = DrawOutcome::from_candidate(selected, market_value, now);
        let (opening_id, holding_id) =
            settlement::record_draw_in_txn(&mut txn, user, &pack, card.clone(), pack.cost, now)
                .await?;

        if selected.chase {
            let day = settings.day_index(now);
            let count = chase_count(&txn, user, day).await?;
            txn.stage(Key::ChaseCount(*user, day), Value::Count(count + 1));
        }
        if let Some(token) = token {
            txn.stage_new(
                Key::DrawToken(*user, token.to_string()),
                Value::OpeningRef(opening_id),
            );
        }

        match txn.commit().await {
            Ok(()) => {}
            // Lost a token race to another instance; the other draw is the
            // one that happened.
            Err(CommitError::Conflict(Key::DrawToken(_, _))) => {
                let token = token.unwrap_or_default();
                if let Some(receipt) = self.replay_token(user, token).await? {
                    return Ok(receipt);
                }
                return Err(EngineError::Store(anyhow::anyhow!(
                    "draw token conflict without recorded opening"
                )));
            }
            Err(err) => return Err(EngineError::Store(err.into())),
        }

        info!(
            %user, pack = %pack_id, card = %card.card_id,
            value_cents = card.market_value, cost = %pack.cost, "pack opened"
        );
        Ok(DrawReceipt {
            opening_id,
            holding_id,
            card,
            new_balance: balance.amount,
            replayed: false,
        })
    }

    /// Per-card odds and expected value for a pack under the configured
    /// weighting model.
    pub async fn pack_odds(&self, pack_id: &PackId) -> Result<PackOdds, EngineError> {
        let settings = DrawSettings::load(self.state()).await;
        let (pack, pool) = self.resolve_pack(pack_id)?;
        let pool = drawable(pool);
        if pool.is_empty() {
            return Err(EngineError::EmptyPool);
        }

        let cards = match settings.weight_model {
            WeightModel::InversePower => selector::value_probabilities(&pool, settings.curvature)?
                .into_iter()
                .zip(&pool)
                .map(|((weight, probability), candidate)| CardOdds {
                    card_id: candidate.card_id,
                    market_value: candidate.market_value,
                    weight,
                    probability,
                })
                .collect::<Vec<_>>(),
            WeightModel::TierTable => tier_odds(&pack, &pool, &settings)?,
        };

        let expected_value = cards
            .iter()
            .map(|card| card.probability * card.market_value as f64)
            .sum();
        Ok(PackOdds {
            pack_id: *pack_id,
            cards,
            expected_value,
        })
    }

    /// Resolve an active pack and its raw pool.
    fn resolve_pack(&self, pack_id: &PackId) -> Result<(Pack, Vec<DrawCandidate>), EngineError> {
        let (game, pack) = self
            .catalogs()
            .find_pack(pack_id)
            .ok_or(EngineError::PackNotFound)?;
        if !pack.is_active {
            return Err(EngineError::PackInactive);
        }
        let pool = self.catalogs().candidate_pool(game, pack_id)?;
        if pool.is_empty() {
            return Err(EngineError::EmptyPool);
        }
        Ok((pack, pool))
    }

    /// Resolve the pack and apply eligibility filters: invalid market
    /// values are dropped, and the chase class is excluded once the user
    /// has hit the daily limit.
    async fn eligible_pool(
        &self,
        user: &UserId,
        pack_id: &PackId,
        settings: &DrawSettings,
        now: u64,
    ) -> Result<(Pack, Vec<DrawCandidate>), EngineError> {
        let (pack, pool) = self.resolve_pack(pack_id)?;
        let mut eligible = drawable(pool);
        if eligible.is_empty() {
            return Err(EngineError::NoEligibleCandidates);
        }

        let day = settings.day_index(now);
        let txn = Txn::new(self.state());
        if chase_count(&txn, user, day).await? >= settings.chase_daily_limit {
            eligible.retain(|candidate| !candidate.chase);
            if eligible.is_empty() {
                return Err(EngineError::NoEligibleCandidates);
            }
        }
        Ok((pack, eligible))
    }

    async fn replay_token(
        &self,
        user: &UserId,
        token: &str,
    ) -> Result<Option<DrawReceipt>, EngineError> {
        let key = Key::DrawToken(*user, token.to_string());
        let opening_id = match self.state().get(&key).await? {
            Some(Value::OpeningRef(opening_id)) => opening_id,
            _ => return Ok(None),
        };
        let opening = self
            .opening(&opening_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("draw token points at missing opening {opening_id}"))?;
        info!(%user, %opening_id, "draw token replayed");
        Ok(Some(DrawReceipt {
            opening_id,
            holding_id: opening.holding_id,
            card: opening.card,
            new_balance: self.balance(user).await?,
            replayed: true,
        }))
    }
}

/// Candidates with a positive market value.
fn drawable(pool: Vec<DrawCandidate>) -> Vec<DrawCandidate> {
    pool.into_iter()
        .filter(|candidate| candidate.market_value > 0)
        .collect()
}

async fn chase_count<S: State>(txn: &Txn<'_, S>, user: &UserId, day: u64) -> Result<u64, EngineError> {
    Ok(match txn.get(&Key::ChaseCount(*user, day)).await? {
        Some(Value::Count(count)) => count,
        _ => 0,
    })
}

/// Select a card from the eligible pool, returning the candidate and the
/// market value to record for it.
fn select_card<'a, R: Rng>(
    pack: &Pack,
    eligible: &'a [DrawCandidate],
    settings: &DrawSettings,
    rng: &mut R,
) -> Result<(&'a DrawCandidate, u64), EngineError> {
    match settings.weight_model {
        WeightModel::InversePower => {
            let selected = selector::select_by_value(eligible, settings.curvature, rng)?;
            Ok((selected, selected.market_value))
        }
        WeightModel::TierTable => match pack.tier_schedule.as_deref() {
            Some(schedule) if !schedule.is_empty() => {
                select_from_tiers(schedule, eligible, settings, rng)
            }
            _ => {
                warn!(pack = %pack.id, "tier model configured but pack has no schedule");
                let selected = selector::select_by_value(eligible, settings.curvature, rng)?;
                Ok((selected, selected.market_value))
            }
        },
    }
}

/// Tier-table selection: pick a tier that has eligible members, then a
/// uniform member of it, then roll the recorded value from the tier range
/// (clamped to the system-wide cap).
fn select_from_tiers<'a, R: Rng>(
    schedule: &[riptide_types::Tier],
    eligible: &'a [DrawCandidate],
    settings: &DrawSettings,
    rng: &mut R,
) -> Result<(&'a DrawCandidate, u64), EngineError> {
    let populated: Vec<riptide_types::Tier> = schedule
        .iter()
        .filter(|tier| eligible.iter().any(|c| c.tier_id == Some(tier.id)))
        .cloned()
        .collect();
    if populated.is_empty() {
        return Err(EngineError::NoEligibleCandidates);
    }

    let tier = selector::select_tier(&populated, rng)?;
    let members: Vec<&DrawCandidate> = eligible
        .iter()
        .filter(|c| c.tier_id == Some(tier.id))
        .collect();
    let selected = members[rng.gen_range(0..members.len())];
    let value = selector::roll_tier_value(tier, settings.max_card_value, rng);
    Ok((selected, value))
}

/// Tier-model odds: a card's probability is its tier's share split evenly
/// among the tier's members; the reported value is the tier's expected
/// roll.
fn tier_odds(
    pack: &Pack,
    pool: &[DrawCandidate],
    settings: &DrawSettings,
) -> Result<Vec<CardOdds>, EngineError> {
    let schedule = pack
        .tier_schedule
        .as_deref()
        .filter(|schedule| !schedule.is_empty())
        .ok_or(EngineError::InvalidPool)?;
    let populated: Vec<riptide_types::Tier> = schedule
        .iter()
        .filter(|tier| pool.iter().any(|c| c.tier_id == Some(tier.id)))
        .cloned()
        .collect();
    let probabilities = selector::tier_probabilities(&populated)?;

    let mut cards = Vec::with_capacity(pool.len());
    for (tier, tier_probability) in populated.iter().zip(&probabilities) {
        let members: Vec<&DrawCandidate> = pool
            .iter()
            .filter(|c| c.tier_id == Some(tier.id))
            .collect();
        let share = tier_probability / members.len() as f64;
        let top = tier.max_value.saturating_sub(1).max(tier.min_value);
        let midpoint = (tier.min_value + (top - tier.min_value) / 2).min(settings.max_card_value);
        for candidate in members {
            cards.push(CardOdds {
                card_id: candidate.card_id,
                market_value: midpoint,
                weight: *tier_probability,
                probability: share,
            });
        }
    }
    Ok(cards)
}
