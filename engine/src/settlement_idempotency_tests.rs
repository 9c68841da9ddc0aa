//! Settlement and sellback flows: exactly-once crediting per external
//! reference, sellback math, and terminal holding states.

use crate::mocks;
use rand::rngs::StdRng;
use rand::SeedableRng;
use riptide_types::{EngineError, ExternalRef, Metadata, Rips, UserId};
use std::sync::Arc;

#[tokio::test]
async fn test_settle_credits_once() {
    let engine = mocks::empty_engine();
    let user = UserId::generate();
    let external_ref = ExternalRef::new("cs_test_123");

    let first = engine
        .settle_purchase(&user, &external_ref, Rips::from_cents(2_000), Metadata::new(), 10)
        .await
        .unwrap();
    assert!(!first.already_processed);
    assert_eq!(first.new_balance, Rips::from_cents(2_000));

    // Webhook and confirmation poll deliver the same reference.
    let second = engine
        .settle_purchase(&user, &external_ref, Rips::from_cents(2_000), Metadata::new(), 11)
        .await
        .unwrap();
    assert!(second.already_processed);
    assert_eq!(second.new_balance, Rips::from_cents(2_000));

    assert_eq!(engine.balance(&user).await.unwrap(), Rips::from_cents(2_000));
    assert_eq!(engine.transactions(&user, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_duplicate_settles() {
    let engine = Arc::new(mocks::empty_engine());
    let user = UserId::generate();
    let external_ref = ExternalRef::new("cs_test_race");

    let mut handles = Vec::new();
    for _ in 0..4 {
        let engine = Arc::clone(&engine);
        let external_ref = external_ref.clone();
        handles.push(tokio::spawn(async move {
            engine
                .settle_purchase(&user, &external_ref, Rips::from_cents(500), Metadata::new(), 10)
                .await
                .unwrap()
        }));
    }

    let mut fresh = 0;
    for handle in handles {
        if !handle.await.unwrap().already_processed {
            fresh += 1;
        }
    }
    assert_eq!(fresh, 1);
    assert_eq!(engine.balance(&user).await.unwrap(), Rips::from_cents(500));
}

#[tokio::test]
async fn test_distinct_references_both_credit() {
    let engine = mocks::empty_engine();
    let user = UserId::generate();

    for reference in ["cs_a", "cs_b"] {
        engine
            .settle_purchase(
                &user,
                &ExternalRef::new(reference),
                Rips::from_cents(1_000),
                Metadata::new(),
                10,
            )
            .await
            .unwrap();
    }
    assert_eq!(engine.balance(&user).await.unwrap(), Rips::from_cents(2_000));
}

fn engine_with_one_card(
    card_value: u64,
) -> (crate::Engine<crate::store::Memory>, riptide_types::PackId) {
    let pack = mocks::pack(100);
    let pack_id = pack.id;
    let engine = mocks::engine_with_pack(pack, vec![mocks::candidate(pack_id, card_value)]);
    (engine, pack_id)
}

async fn drawn_holding(
    engine: &crate::Engine<crate::store::Memory>,
    user: &UserId,
    pack_id: &riptide_types::PackId,
    card_value: u64,
) -> riptide_types::HoldingId {
    let receipt = engine
        .draw(user, pack_id, None, 86_400, &mut StdRng::seed_from_u64(42))
        .await
        .unwrap();
    assert_eq!(receipt.card.market_value, card_value);
    receipt.holding_id
}

#[tokio::test]
async fn test_sellback_credits_floored_rate() {
    let (engine, pack_id) = engine_with_one_card(10_000);
    let user = UserId::generate();
    mocks::fund(&engine, &user, 100).await;
    let holding_id = drawn_holding(&engine, &user, &pack_id, 10_000).await;

    // 85% of 10_000 cents.
    let receipt = engine.sellback(&user, &holding_id, 20).await.unwrap();
    assert_eq!(receipt.credited, Rips::from_cents(8_500));
    assert_eq!(receipt.new_balance, Rips::from_cents(8_500));

    let result = engine.sellback(&user, &holding_id, 21).await;
    assert!(matches!(result, Err(EngineError::AlreadySold)));
    assert_eq!(engine.balance(&user).await.unwrap(), Rips::from_cents(8_500));
}

#[tokio::test]
async fn test_sellback_floors_odd_values() {
    let (engine, pack_id) = engine_with_one_card(99);
    let user = UserId::generate();
    mocks::fund(&engine, &user, 100).await;
    let holding_id = drawn_holding(&engine, &user, &pack_id, 99).await;

    // floor(99 * 85 / 100) = 84.
    let receipt = engine.sellback(&user, &holding_id, 20).await.unwrap();
    assert_eq!(receipt.credited, Rips::from_cents(84));
}

#[tokio::test]
async fn test_shipped_holding_cannot_be_sold() {
    let (engine, pack_id) = engine_with_one_card(5_000);
    let user = UserId::generate();
    mocks::fund(&engine, &user, 100).await;
    let holding_id = drawn_holding(&engine, &user, &pack_id, 5_000).await;

    engine.mark_shipped(&user, &holding_id, 20).await.unwrap();
    let result = engine.sellback(&user, &holding_id, 21).await;
    assert!(matches!(result, Err(EngineError::AlreadyShipped)));

    let result = engine.mark_shipped(&user, &holding_id, 22).await;
    assert!(matches!(result, Err(EngineError::AlreadyShipped)));
}

#[tokio::test]
async fn test_sellback_rejects_foreign_holding() {
    let (engine, pack_id) = engine_with_one_card(5_000);
    let owner = UserId::generate();
    mocks::fund(&engine, &owner, 100).await;
    let holding_id = drawn_holding(&engine, &owner, &pack_id, 5_000).await;

    let thief = UserId::generate();
    let result = engine.sellback(&thief, &holding_id, 20).await;
    assert!(matches!(result, Err(EngineError::HoldingNotFound)));
}
