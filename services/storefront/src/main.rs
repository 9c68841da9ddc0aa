use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use axum::extract::{Path, Query, State as AxumState};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use rand::rngs::StdRng;
use rand::SeedableRng;
use riptide_engine::{CatalogRegistry, Engine, Memory, StaticCatalog};
use riptide_types::{
    DrawCandidate, EngineError, ExternalRef, GameCode, HoldingId, Metadata, Pack, PackId, Rips,
    Tier, UserId,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone, Debug)]
struct StorefrontConfig {
    host: String,
    port: u16,
    /// Per-user draw throttle.
    draws_per_min: u32,
    limiter_sweep_secs: u64,
}

impl StorefrontConfig {
    fn from_env() -> Self {
        Self {
            host: std::env::var("STOREFRONT_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: read_u16("STOREFRONT_PORT", 9280),
            draws_per_min: read_u32("STOREFRONT_DRAWS_PER_MIN", 30),
            limiter_sweep_secs: read_u64("STOREFRONT_LIMITER_SWEEP_SECS", 60),
        }
    }
}

fn read_u16(key: &str, fallback: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u16>().ok())
        .unwrap_or(fallback)
}

fn read_u32(key: &str, fallback: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .unwrap_or(fallback)
}

fn read_u64(key: &str, fallback: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(fallback)
}

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine<Memory>>,
    draw_limiter: Arc<DefaultKeyedRateLimiter<UserId>>,
}

/// API error envelope. Business rejections map to 400, missing resources
/// to 404, throttling to 429; anything else is a 500 with the detail kept
/// out of the response body.
struct ApiError(StatusCode, String);

impl ApiError {
    fn throttled() -> Self {
        Self(StatusCode::TOO_MANY_REQUESTS, "rate limited".to_string())
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status = match err {
            EngineError::PackNotFound | EngineError::HoldingNotFound => StatusCode::NOT_FOUND,
            _ if err.is_business() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            warn!(%err, "internal error");
            Self(status, "internal error".to_string())
        } else {
            Self(status, err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Debug, Deserialize)]
struct OpenRequest {
    user_id: Uuid,
    pack_id: Uuid,
    /// Client idempotency token; resubmitting it replays the original
    /// opening instead of drawing again.
    token: Option<String>,
}

async fn open_pack(
    AxumState(state): AxumState<AppState>,
    Json(request): Json<OpenRequest>,
) -> Result<Response, ApiError> {
    let user = UserId::from_uuid(request.user_id);
    if state.draw_limiter.check_key(&user).is_err() {
        return Err(ApiError::throttled());
    }
    let mut rng = StdRng::from_entropy();
    let receipt = state
        .engine
        .draw(
            &user,
            &PackId::from_uuid(request.pack_id),
            request.token.as_deref(),
            now_secs(),
            &mut rng,
        )
        .await?;
    Ok(Json(receipt).into_response())
}

#[derive(Debug, Deserialize)]
struct HoldingRequest {
    user_id: Uuid,
    holding_id: Uuid,
}

async fn sell_holding(
    AxumState(state): AxumState<AppState>,
    Json(request): Json<HoldingRequest>,
) -> Result<Response, ApiError> {
    let receipt = state
        .engine
        .sellback(
            &UserId::from_uuid(request.user_id),
            &HoldingId::from_uuid(request.holding_id),
            now_secs(),
        )
        .await?;
    Ok(Json(receipt).into_response())
}

async fn ship_holding(
    AxumState(state): AxumState<AppState>,
    Json(request): Json<HoldingRequest>,
) -> Result<Response, ApiError> {
    state
        .engine
        .mark_shipped(
            &UserId::from_uuid(request.user_id),
            &HoldingId::from_uuid(request.holding_id),
            now_secs(),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[derive(Debug, Deserialize)]
struct SettleRequest {
    user_id: Uuid,
    /// Payment provider reference; duplicates are acknowledged without a
    /// second credit.
    external_ref: String,
    amount_cents: u64,
    metadata: Option<Metadata>,
}

async fn settle_purchase(
    AxumState(state): AxumState<AppState>,
    Json(request): Json<SettleRequest>,
) -> Result<Response, ApiError> {
    let receipt = state
        .engine
        .settle_purchase(
            &UserId::from_uuid(request.user_id),
            &ExternalRef::new(request.external_ref),
            Rips::from_cents(request.amount_cents),
            request.metadata.unwrap_or_default(),
            now_secs(),
        )
        .await?;
    Ok(Json(receipt).into_response())
}

#[derive(Debug, Serialize)]
struct BalanceResponse {
    balance_cents: u64,
    balance: String,
}

async fn get_balance(
    AxumState(state): AxumState<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let balance = state.engine.balance(&UserId::from_uuid(user_id)).await?;
    Ok(Json(BalanceResponse {
        balance_cents: balance.cents(),
        balance: balance.to_string(),
    })
    .into_response())
}

#[derive(Debug, Deserialize)]
struct TransactionsQuery {
    limit: Option<usize>,
}

async fn get_transactions(
    AxumState(state): AxumState<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Response, ApiError> {
    let entries = state
        .engine
        .transactions(&UserId::from_uuid(user_id), query.limit.unwrap_or(50))
        .await?;
    Ok(Json(entries).into_response())
}

async fn get_inventory(
    AxumState(state): AxumState<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let holdings = state.engine.inventory(&UserId::from_uuid(user_id)).await?;
    Ok(Json(holdings).into_response())
}

async fn get_pack_odds(
    AxumState(state): AxumState<AppState>,
    Path(pack_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let odds = state.engine.pack_odds(&PackId::from_uuid(pack_id)).await?;
    Ok(Json(odds).into_response())
}

async fn healthz() -> &'static str {
    "ok"
}

/// Fixed demo catalog so the service is usable without an external catalog
/// feed. Pack ids are logged at startup.
fn demo_catalogs() -> CatalogRegistry {
    let mtg_pack = Pack {
        id: PackId::generate(),
        game: GameCode::Mtg,
        name: "Standard Booster".to_string(),
        cost: Rips::from_whole(5),
        is_active: true,
        tier_schedule: None,
    };
    let mtg_pool: Vec<DrawCandidate> = [50u64, 120, 300, 900, 2_500, 7_000, 21_000, 48_000]
        .iter()
        .map(|value| DrawCandidate::new(riptide_types::CardId::generate(), mtg_pack.id, *value))
        .collect();

    let pokemon_pack = Pack {
        id: PackId::generate(),
        game: GameCode::Pokemon,
        name: "Scarlet Chase".to_string(),
        cost: Rips::from_whole(8),
        is_active: true,
        tier_schedule: Some(vec![
            Tier {
                id: 1,
                name: "common".to_string(),
                probability: 0.80,
                min_value: 50,
                max_value: 400,
            },
            Tier {
                id: 2,
                name: "rare".to_string(),
                probability: 0.18,
                min_value: 400,
                max_value: 4_000,
            },
            Tier {
                id: 3,
                name: "chase".to_string(),
                probability: 0.02,
                min_value: 4_000,
                max_value: 50_000,
            },
        ]),
    };
    let pokemon_pool: Vec<DrawCandidate> = (1u32..=3)
        .flat_map(|tier_id| {
            (0..4).map(move |_| DrawCandidate {
                tier_id: Some(tier_id),
                chase: tier_id == 3,
                ..DrawCandidate::new(
                    riptide_types::CardId::generate(),
                    pokemon_pack.id,
                    tier_id as u64 * 1_000,
                )
            })
        })
        .collect();

    info!(mtg_pack = %mtg_pack.id, pokemon_pack = %pokemon_pack.id, "demo packs loaded");
    CatalogRegistry::new()
        .register(
            GameCode::Mtg,
            Arc::new(StaticCatalog::new().with_pack(mtg_pack, mtg_pool)),
        )
        .register(
            GameCode::Pokemon,
            Arc::new(StaticCatalog::new().with_pack(pokemon_pack, pokemon_pool)),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = StorefrontConfig::from_env();
    let engine = Arc::new(Engine::new(Memory::new(), demo_catalogs()));

    let quota = Quota::per_minute(NonZeroU32::new(config.draws_per_min).unwrap_or(NonZeroU32::MIN));
    let draw_limiter = Arc::new(RateLimiter::keyed(quota));

    // Keyed limiter state grows with distinct users; sweep idle keys.
    let sweep_limiter = draw_limiter.clone();
    let sweep_every = Duration::from_secs(config.limiter_sweep_secs.max(1));
    tokio::spawn(async move {
        let mut interval = time::interval(sweep_every);
        loop {
            interval.tick().await;
            sweep_limiter.retain_recent();
            sweep_limiter.shrink_to_fit();
        }
    });

    let state = AppState {
        engine,
        draw_limiter,
    };

    let app = Router::new()
        .route("/api/packs/open", post(open_pack))
        .route("/api/packs/:id/odds", get(get_pack_odds))
        .route("/api/inventory/sell", post(sell_holding))
        .route("/api/inventory/ship", post(ship_holding))
        .route("/api/inventory/:user", get(get_inventory))
        .route("/api/purchases/settle", post(settle_purchase))
        .route("/api/balance/:user", get(get_balance))
        .route("/api/balance/:user/transactions", get(get_transactions))
        .route("/healthz", get(healthz))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid listen addr")?;
    info!(%addr, "storefront listening");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
