//! Weighted selection.
//!
//! Two probability models share one sampling routine:
//!
//! - Inverse-power: weight `w_i = 1 / max(v_i, 1)^k` over market value,
//!   normalized to probabilities. Lower-value cards are favored smoothly;
//!   high-value cards keep a shrinking but non-zero chance.
//! - Tier table: explicit per-tier probabilities, re-normalized when their
//!   sum drifts from 1.0 beyond tolerance; the drawn value is rolled
//!   uniformly from the tier's `[min_value, max_value)` range.
//!
//! Sampling walks the cumulative mass for `r ∈ [0,1)` and returns the first
//! element whose cumulative probability reaches `r`. If float drift leaves
//! the walk short of `r`, the last element is the deterministic fallback; a
//! well-formed non-empty pool never errors.

use rand::Rng;
use riptide_types::{DrawCandidate, EngineError, Tier};

/// Tier probabilities are re-normalized when their sum is off 1.0 by more
/// than this.
pub const PROBABILITY_TOLERANCE: f64 = 0.01;

/// Inverse-power weights over market values. Values are clamped to a
/// minimum of 1 to avoid division by zero.
pub fn inverse_power_weights(values: &[u64], curvature: f64) -> Vec<f64> {
    values
        .iter()
        .map(|&value| 1.0 / (value.max(1) as f64).powf(curvature))
        .collect()
}

/// Normalize weights to probabilities summing to 1.0.
///
/// Fails `EmptyPool` on an empty list and `InvalidPool` when no weight is
/// positive and finite — a degenerate pool is a hard error, never a silent
/// default.
pub fn normalize(weights: &[f64]) -> Result<Vec<f64>, EngineError> {
    if weights.is_empty() {
        return Err(EngineError::EmptyPool);
    }
    let total: f64 = weights.iter().filter(|w| w.is_finite() && **w > 0.0).sum();
    if total <= 0.0 || !total.is_finite() {
        return Err(EngineError::InvalidPool);
    }
    Ok(weights
        .iter()
        .map(|&w| if w.is_finite() && w > 0.0 { w / total } else { 0.0 })
        .collect())
}

/// Cumulative-walk sample over normalized probabilities. The caller
/// guarantees `probabilities` is non-empty.
pub fn pick_index(probabilities: &[f64], rng: &mut impl Rng) -> usize {
    let roll: f64 = rng.gen();
    let mut cumulative = 0.0;
    for (index, probability) in probabilities.iter().enumerate() {
        cumulative += probability;
        if cumulative >= roll {
            return index;
        }
    }
    // Float drift left the total slightly under 1.0.
    probabilities.len() - 1
}

/// Select a candidate by inverse-power weighting over market value.
pub fn select_by_value<'a>(
    candidates: &'a [DrawCandidate],
    curvature: f64,
    rng: &mut impl Rng,
) -> Result<&'a DrawCandidate, EngineError> {
    let values: Vec<u64> = candidates.iter().map(|c| c.market_value).collect();
    let probabilities = normalize(&inverse_power_weights(&values, curvature))?;
    Ok(&candidates[pick_index(&probabilities, rng)])
}

/// Per-card probabilities (with raw weights) for the inverse-power model.
pub fn value_probabilities(
    candidates: &[DrawCandidate],
    curvature: f64,
) -> Result<Vec<(f64, f64)>, EngineError> {
    let values: Vec<u64> = candidates.iter().map(|c| c.market_value).collect();
    let weights = inverse_power_weights(&values, curvature);
    let probabilities = normalize(&weights)?;
    Ok(weights.into_iter().zip(probabilities).collect())
}

/// Normalized tier probabilities. Negative or non-finite entries fail
/// `InvalidPool`; a sum within tolerance of 1.0 is kept as-is, anything
/// else is divided through by the sum.
pub fn tier_probabilities(tiers: &[Tier]) -> Result<Vec<f64>, EngineError> {
    if tiers.is_empty() {
        return Err(EngineError::EmptyPool);
    }
    if tiers
        .iter()
        .any(|t| !t.probability.is_finite() || t.probability < 0.0)
    {
        return Err(EngineError::InvalidPool);
    }
    let total: f64 = tiers.iter().map(|t| t.probability).sum();
    if total <= 0.0 {
        return Err(EngineError::InvalidPool);
    }
    if (total - 1.0).abs() <= PROBABILITY_TOLERANCE {
        Ok(tiers.iter().map(|t| t.probability).collect())
    } else {
        Ok(tiers.iter().map(|t| t.probability / total).collect())
    }
}

/// Select a tier from a schedule.
pub fn select_tier<'a>(tiers: &'a [Tier], rng: &mut impl Rng) -> Result<&'a Tier, EngineError> {
    let probabilities = tier_probabilities(tiers)?;
    Ok(&tiers[pick_index(&probabilities, rng)])
}

/// Roll a card value uniformly from the tier's `[min_value, max_value)`
/// range, clamped to the system-wide cap.
pub fn roll_tier_value(tier: &Tier, max_card_value: u64, rng: &mut impl Rng) -> u64 {
    let rolled = if tier.min_value < tier.max_value {
        rng.gen_range(tier.min_value..tier.max_value)
    } else {
        tier.min_value
    };
    rolled.min(max_card_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use riptide_types::{CardId, PackId};

    fn candidates(values: &[u64]) -> Vec<DrawCandidate> {
        let pack = PackId::generate();
        values
            .iter()
            .map(|&v| DrawCandidate::new(CardId::generate(), pack, v))
            .collect()
    }

    fn tier(id: u32, probability: f64, min: u64, max: u64) -> Tier {
        Tier {
            id,
            name: format!("tier-{id}"),
            probability,
            min_value: min,
            max_value: max,
        }
    }

    #[test]
    fn test_probability_conservation() {
        let pool = candidates(&[100, 2_500, 10_000, 120_000]);
        let probabilities: Vec<f64> = value_probabilities(&pool, 1.1)
            .unwrap()
            .into_iter()
            .map(|(_, p)| p)
            .collect();
        let total: f64 = probabilities.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_inverse_power_monotonicity() {
        let pool = candidates(&[100, 10_000]);
        let probs = value_probabilities(&pool, 1.1).unwrap();
        assert!(probs[0].1 > probs[1].1);
        // p(A) >> p(B) for a 100x value gap at k=1.1.
        assert!(probs[0].1 / probs[1].1 > 100.0);
    }

    #[test]
    fn test_zero_value_clamped_not_division_by_zero() {
        let pool = candidates(&[0, 50]);
        let probs = value_probabilities(&pool, 1.1).unwrap();
        assert!(probs.iter().all(|(w, p)| w.is_finite() && p.is_finite()));
        assert!(probs[0].1 > probs[1].1);
    }

    #[test]
    fn test_empty_pool_is_hard_error() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(matches!(
            select_by_value(&[], 1.1, &mut rng),
            Err(EngineError::EmptyPool)
        ));
    }

    #[test]
    fn test_all_nonpositive_weights_invalid() {
        assert!(matches!(
            normalize(&[0.0, -1.0, f64::NAN]),
            Err(EngineError::InvalidPool)
        ));
    }

    #[test]
    fn test_drift_falls_back_to_last() {
        // Probabilities deliberately summing below any possible roll.
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..64 {
            assert_eq!(pick_index(&[0.0, 0.0], &mut rng), 1);
        }
    }

    #[test]
    fn test_tier_probabilities_within_tolerance_kept() {
        let tiers = vec![tier(1, 0.7, 0, 100), tier(2, 0.295, 100, 200)];
        let probs = tier_probabilities(&tiers).unwrap();
        assert_eq!(probs, vec![0.7, 0.295]);
    }

    #[test]
    fn test_tier_probabilities_renormalized_beyond_tolerance() {
        let tiers = vec![tier(1, 0.6, 0, 100), tier(2, 0.6, 100, 200)];
        let probs = tier_probabilities(&tiers).unwrap();
        assert!((probs[0] - 0.5).abs() < 1e-12);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_tier_value_roll_clamped() {
        let mut rng = StdRng::seed_from_u64(3);
        let t = tier(1, 1.0, 40_000, 400_000);
        for _ in 0..256 {
            let value = roll_tier_value(&t, 50_000, &mut rng);
            assert!((40_000..=50_000).contains(&value));
        }
        // Degenerate range falls back to the lower bound.
        let empty = tier(2, 1.0, 500, 500);
        assert_eq!(roll_tier_value(&empty, 50_000, &mut rng), 500);
    }

    #[test]
    fn test_seeded_distribution_matches_computed_probability() {
        // Scenario from the economy design: A=100, B=10000 at k=1.1.
        let pool = candidates(&[100, 10_000]);
        let expected = value_probabilities(&pool, 1.1).unwrap()[0].1;

        let mut rng = StdRng::seed_from_u64(42);
        let draws = 100_000u32;
        let mut hits_a = 0u32;
        for _ in 0..draws {
            let picked = select_by_value(&pool, 1.1, &mut rng).unwrap();
            if picked.card_id == pool[0].card_id {
                hits_a += 1;
            }
        }
        let observed = f64::from(hits_a) / f64::from(draws);
        assert!(
            (observed - expected).abs() < 0.01,
            "observed {observed}, expected {expected}"
        );
    }

    proptest! {
        #[test]
        fn prop_probabilities_conserve_mass(
            values in proptest::collection::vec(1u64..1_000_000, 1..64),
            curvature in 0.1f64..3.0,
        ) {
            let pool = candidates(&values);
            let probs = value_probabilities(&pool, curvature).unwrap();
            let total: f64 = probs.iter().map(|(_, p)| p).sum();
            prop_assert!((total - 1.0).abs() < 1e-9);
        }

        #[test]
        fn prop_cheaper_card_never_less_likely(
            low in 1u64..10_000,
            gap in 1u64..1_000_000,
            curvature in 0.1f64..3.0,
        ) {
            let pool = candidates(&[low, low + gap]);
            let probs = value_probabilities(&pool, curvature).unwrap();
            prop_assert!(probs[0].1 > probs[1].1);
        }
    }
}
