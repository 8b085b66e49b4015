use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use loadline_core::audit::InMemoryAuditSink;
use loadline_core::clock::{Clock, FixedClock};
use loadline_core::domain::negotiation::{
    CallId, LoadId, McNumber, NegotiationId, NegotiationStatus, OfferParty, OfferType,
};
use loadline_core::negotiation::lifecycle::{CreateNegotiation, LifecycleManager};
use loadline_core::negotiation::policy::NegotiationPolicy;
use loadline_core::negotiation::store::{NegotiationStore, StoreError};
use loadline_db::repositories::SqlNegotiationStore;
use loadline_db::{connect_with_settings, migrations};

async fn store() -> SqlNegotiationStore {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrate");
    SqlNegotiationStore::new(pool)
}

fn create_request(id: &str, call_id: &str) -> CreateNegotiation {
    CreateNegotiation {
        id: NegotiationId(id.to_string()),
        call_id: CallId(call_id.to_string()),
        load_id: LoadId("LD001".to_string()),
        mc_number: McNumber("123456".to_string()),
        initial_offer: Decimal::new(120_000, 2),
        offered_by: OfferParty::Carrier,
        original_rate: Decimal::new(150_000, 2),
        max_rounds: None,
    }
}

#[tokio::test]
async fn sql_store_round_trips_every_field() {
    let store = store().await;
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 8, 1, 9, 0, 0).unwrap());
    let manager = LifecycleManager::new(
        store,
        clock.clone(),
        InMemoryAuditSink::default(),
        NegotiationPolicy::default(),
    );

    let created = manager.create(create_request("NEG-1", "CALL-1")).await.expect("create");
    let fetched = manager.get(&created.id).await.expect("get");

    assert_eq!(created, fetched);
    assert_eq!(fetched.status, NegotiationStatus::Active);
    assert_eq!(fetched.current_offer_type, OfferType::Initial);
    assert_eq!(fetched.expires_at, clock.now() + Duration::hours(24));
}

#[tokio::test]
async fn duplicate_identifiers_surface_as_conflicts() {
    let store = store().await;

    let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 8, 1, 9, 0, 0).unwrap());
    let manager = LifecycleManager::new(
        store,
        clock,
        InMemoryAuditSink::default(),
        NegotiationPolicy::default(),
    );
    manager.create(create_request("NEG-1", "CALL-1")).await.expect("create");

    // Straight to the store: the unique constraint is the backstop.
    let duplicate = manager.get(&NegotiationId("NEG-1".to_string())).await.expect("get");
    let error = manager.store().insert(duplicate).await.expect_err("duplicate insert");
    assert!(matches!(error, StoreError::Conflict));
}

#[tokio::test]
async fn counter_accept_flow_persists_through_sql() {
    let store = store().await;
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 8, 1, 9, 0, 0).unwrap());
    let manager = LifecycleManager::new(
        store,
        clock,
        InMemoryAuditSink::default(),
        NegotiationPolicy::default(),
    );

    manager.create(create_request("NEG-1", "CALL-1")).await.expect("create");
    let id = NegotiationId("NEG-1".to_string());

    let countered = manager
        .counter_offer(&id, Decimal::new(142_500, 2), OfferParty::Broker, Some("fuel is up".to_string()))
        .await
        .expect("counter");
    assert_eq!(countered.current_round, 2);

    let accepted = manager.accept(&id, Decimal::new(142_500, 2)).await.expect("accept");
    assert_eq!(accepted.status, NegotiationStatus::Accepted);

    let reread = manager.get(&id).await.expect("reread");
    assert_eq!(reread.final_agreed_rate, Some(Decimal::new(142_500, 2)));
    assert_eq!(reread.carrier_feedback.as_deref(), Some("fuel is up"));
    assert_eq!(reread.current_offer_type, OfferType::Final);
}

#[tokio::test]
async fn cleanup_sweep_is_idempotent_over_sql() {
    let store = store().await;
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 8, 1, 9, 0, 0).unwrap());
    let manager = LifecycleManager::new(
        store,
        clock.clone(),
        InMemoryAuditSink::default(),
        NegotiationPolicy::default(),
    );

    manager.create(create_request("NEG-1", "CALL-1")).await.expect("create");
    manager.create(create_request("NEG-2", "CALL-2")).await.expect("create");
    manager.accept(&NegotiationId("NEG-2".to_string()), Decimal::new(140_000, 2))
        .await
        .expect("accept second");

    clock.advance(Duration::hours(25));

    assert_eq!(manager.cleanup_expired().await.expect("sweep"), 1);
    assert_eq!(manager.cleanup_expired().await.expect("second sweep"), 0);

    let swept = manager.get(&NegotiationId("NEG-1".to_string())).await.expect("get");
    assert_eq!(swept.status, NegotiationStatus::Expired);

    // The accepted record was not touched by the sweep.
    let accepted = manager.get(&NegotiationId("NEG-2".to_string())).await.expect("get");
    assert_eq!(accepted.status, NegotiationStatus::Accepted);
}

#[tokio::test]
async fn call_scoped_lookups_filter_and_order() {
    let store = store().await;
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 8, 1, 9, 0, 0).unwrap());
    let manager = LifecycleManager::new(
        store,
        clock.clone(),
        InMemoryAuditSink::default(),
        NegotiationPolicy::default(),
    );

    manager.create(create_request("NEG-1", "CALL-1")).await.expect("create");
    manager.reject(&NegotiationId("NEG-1".to_string()), None).await.expect("reject");
    clock.advance(Duration::minutes(10));
    manager.create(create_request("NEG-2", "CALL-1")).await.expect("create");

    let call_id = CallId("CALL-1".to_string());
    let history = manager.history_for_call(&call_id).await.expect("history");
    assert_eq!(
        history.iter().map(|negotiation| negotiation.id.0.as_str()).collect::<Vec<_>>(),
        vec!["NEG-2", "NEG-1"]
    );

    let active = manager.active_for_call(&call_id).await.expect("active");
    assert_eq!(active.map(|negotiation| negotiation.id.0), Some("NEG-2".to_string()));
}
