//! Runtime configuration.
//!
//! Config lives in the state store under [`Key::Config`] so operators can
//! tune the economy without redeploying. Every read tolerates a missing or
//! malformed value by falling back to the documented default (with a
//! warning); configuration problems are never surfaced to callers.

use crate::store::{Key, State, Value};
use riptide_types::Rips;
use tracing::warn;

/// Curvature `k` of the inverse-power weighting model.
pub const CONFIG_CURVATURE: &str = "probability_curvature_k";
/// Sellback rate in percent of market value.
pub const CONFIG_SELLBACK_RATE: &str = "sellback_rate";
/// Maximum chase-class cards a user may draw per day.
pub const CONFIG_CHASE_DAILY_LIMIT: &str = "chase_daily_limit";
/// System-wide cap on a single drawn card's value, in cents.
pub const CONFIG_MAX_CARD_VALUE: &str = "max_card_value_cents";
/// Weighting model: `inverse_power` or `tier_table`.
pub const CONFIG_WEIGHT_MODEL: &str = "weight_model";
/// Offset added to unix time before computing the local day boundary.
pub const CONFIG_DAY_OFFSET: &str = "day_offset_secs";

pub const DEFAULT_CURVATURE: f64 = 1.1;
pub const DEFAULT_SELLBACK_RATE: u64 = 85;
pub const DEFAULT_CHASE_DAILY_LIMIT: u64 = 1;
pub const DEFAULT_MAX_CARD_VALUE: u64 = 50_000;
pub const DEFAULT_DAY_OFFSET: i64 = 0;

const SECS_PER_DAY: i64 = 86_400;

/// Which probability model draws use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WeightModel {
    /// Smooth house edge: weight 1/v^k over market value.
    #[default]
    InversePower,
    /// Discrete tier probability table with uniform value rolls.
    TierTable,
}

impl WeightModel {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "inverse_power" => Some(Self::InversePower),
            "tier_table" => Some(Self::TierTable),
            _ => None,
        }
    }
}

/// Snapshot of the economy configuration, loaded once per operation.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawSettings {
    pub curvature: f64,
    /// Percent of market value credited on sellback.
    pub sellback_rate: u64,
    pub chase_daily_limit: u64,
    /// Cap applied to tier-rolled card values, in cents.
    pub max_card_value: u64,
    pub weight_model: WeightModel,
    pub day_offset_secs: i64,
}

impl Default for DrawSettings {
    fn default() -> Self {
        Self {
            curvature: DEFAULT_CURVATURE,
            sellback_rate: DEFAULT_SELLBACK_RATE,
            chase_daily_limit: DEFAULT_CHASE_DAILY_LIMIT,
            max_card_value: DEFAULT_MAX_CARD_VALUE,
            weight_model: WeightModel::default(),
            day_offset_secs: DEFAULT_DAY_OFFSET,
        }
    }
}

impl DrawSettings {
    pub async fn load<S: State>(state: &S) -> Self {
        Self {
            curvature: read(state, CONFIG_CURVATURE, DEFAULT_CURVATURE).await,
            sellback_rate: read(state, CONFIG_SELLBACK_RATE, DEFAULT_SELLBACK_RATE).await,
            chase_daily_limit: {
                read(state, CONFIG_CHASE_DAILY_LIMIT, DEFAULT_CHASE_DAILY_LIMIT).await
            },
            max_card_value: read(state, CONFIG_MAX_CARD_VALUE, DEFAULT_MAX_CARD_VALUE).await,
            weight_model: read_model(state).await,
            day_offset_secs: read(state, CONFIG_DAY_OFFSET, DEFAULT_DAY_OFFSET).await,
        }
    }

    /// Day index for the daily chase limit. The boundary is server-local
    /// midnight, expressed as a configured offset from UTC.
    pub fn day_index(&self, now_secs: u64) -> u64 {
        let local = now_secs as i64 + self.day_offset_secs;
        local.div_euclid(SECS_PER_DAY).max(0) as u64
    }

    /// Sellback proceeds in cents: `floor(value * rate / 100)`. Saturates
    /// rather than overflowing on a pathological market value.
    pub fn sellback_value(&self, market_value_cents: u64) -> Rips {
        Rips::from_cents(market_value_cents.saturating_mul(self.sellback_rate) / 100)
    }
}

async fn raw<S: State>(state: &S, key: &str) -> Option<String> {
    match state.get(&Key::Config(key.to_string())).await {
        Ok(Some(Value::Config(value))) => Some(value),
        Ok(_) => None,
        Err(err) => {
            warn!(key, %err, "config lookup failed, using default");
            None
        }
    }
}

async fn read<S: State, T: std::str::FromStr + Copy>(state: &S, key: &str, default: T) -> T {
    match raw(state, key).await {
        Some(value) => value.parse().unwrap_or_else(|_| {
            warn!(key, value, "malformed config value, using default");
            default
        }),
        None => default,
    }
}

async fn read_model<S: State>(state: &S) -> WeightModel {
    match raw(state, CONFIG_WEIGHT_MODEL).await {
        Some(value) => WeightModel::parse(&value).unwrap_or_else(|| {
            warn!(value, "unknown weight model, using inverse_power");
            WeightModel::default()
        }),
        None => WeightModel::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Memory;

    #[tokio::test]
    async fn test_defaults_when_unset() {
        let memory = Memory::new();
        let settings = DrawSettings::load(&memory).await;
        assert_eq!(settings, DrawSettings::default());
        assert_eq!(settings.curvature, 1.1);
        assert_eq!(settings.sellback_rate, 85);
        assert_eq!(settings.chase_daily_limit, 1);
        assert_eq!(settings.max_card_value, 50_000);
    }

    #[tokio::test]
    async fn test_overrides_and_malformed_values() {
        let memory = Memory::new();
        let set = |key: &str, value: &str| {
            (
                Key::Config(key.to_string()),
                crate::store::Status::Update(Value::Config(value.to_string())),
            )
        };
        memory
            .commit(vec![
                set(CONFIG_CURVATURE, "1.5"),
                set(CONFIG_SELLBACK_RATE, "not-a-number"),
                set(CONFIG_WEIGHT_MODEL, "tier_table"),
            ])
            .await
            .unwrap();

        let settings = DrawSettings::load(&memory).await;
        assert_eq!(settings.curvature, 1.5);
        // Malformed value falls back to the default.
        assert_eq!(settings.sellback_rate, DEFAULT_SELLBACK_RATE);
        assert_eq!(settings.weight_model, WeightModel::TierTable);
    }

    #[test]
    fn test_day_index_respects_offset() {
        let mut settings = DrawSettings::default();
        let now = 86_400 * 10 + 3_600; // 01:00 UTC on day 10
        assert_eq!(settings.day_index(now), 10);

        // Two hours behind UTC: still day 9 locally.
        settings.day_offset_secs = -7_200;
        assert_eq!(settings.day_index(now), 9);
    }

    #[test]
    fn test_sellback_floor() {
        let settings = DrawSettings::default();
        assert_eq!(settings.sellback_value(10_000), Rips::from_cents(8_500));
        assert_eq!(settings.sellback_value(99), Rips::from_cents(84));
    }

    #[test]
    fn test_sellback_saturates_on_huge_value() {
        let settings = DrawSettings::default();
        assert_eq!(
            settings.sellback_value(u64::MAX),
            Rips::from_cents(u64::MAX / 100)
        );
    }
}
