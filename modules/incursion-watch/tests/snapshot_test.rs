//! Snapshot staleness window, failure handling and enrichment.

mod common;

use chrono::{Duration, TimeZone, Utc};
use common::{raw_incursion, stub_world, Harness, JITA};
use esi_client::EsiIncursion;
use incursion_watch::snapshot::INCURSIONS_KEY;
use incursion_watch::KvStore;
use serde_json::json;

const INCURSIONS: &str = "/latest/incursions";

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn second_call_inside_window_is_cached() {
    let h = Harness::new();
    stub_world(&h.fetcher, 30004141, "X-7OMU", -0.3, 20000607);
    h.fetcher
        .respond(INCURSIONS, json!([raw_incursion(30004141, 20000607, "established")]));
    let mut snapshots = h.snapshots();

    let first = snapshots.get_snapshot_at(t0()).await;
    assert!(first.refreshed);

    let second = snapshots.get_snapshot_at(t0() + Duration::seconds(10)).await;
    let third = snapshots.get_snapshot_at(t0() + Duration::seconds(299)).await;
    assert!(!second.refreshed);
    assert!(!third.refreshed);
    assert_eq!(second.incursions, first.incursions);
    assert_eq!(third.incursions, first.incursions);
    assert_eq!(h.fetcher.gets_of(INCURSIONS), 1);
}

#[tokio::test]
async fn window_elapsed_triggers_refetch() {
    let h = Harness::new();
    h.fetcher.respond(INCURSIONS, json!([]));
    let mut snapshots = h.snapshots();

    assert!(snapshots.get_snapshot_at(t0()).await.refreshed);
    assert!(snapshots
        .get_snapshot_at(t0() + Duration::seconds(300))
        .await
        .refreshed);
    assert_eq!(h.fetcher.gets_of(INCURSIONS), 2);
}

#[tokio::test]
async fn failed_fetch_does_not_advance_last_fetch() {
    let h = Harness::new();
    let mut snapshots = h.snapshots();

    let failed = snapshots.get_snapshot_at(t0()).await;
    assert!(!failed.refreshed);
    assert!(failed.incursions.is_empty());
    assert_eq!(snapshots.last_fetch(), None);

    // The very next call retries instead of waiting out a window.
    h.fetcher.respond(INCURSIONS, json!([]));
    let retried = snapshots.get_snapshot_at(t0() + Duration::seconds(1)).await;
    assert!(retried.refreshed);
    assert_eq!(h.fetcher.gets_of(INCURSIONS), 2);
}

#[tokio::test]
async fn malformed_list_is_a_failure() {
    let h = Harness::new();
    h.fetcher.respond_raw(INCURSIONS, b"{\"error\":\"timeout\"}".to_vec());
    let mut snapshots = h.snapshots();

    let snapshot = snapshots.get_snapshot_at(t0()).await;
    assert!(!snapshot.refreshed);
    assert_eq!(snapshots.last_fetch(), None);
}

#[tokio::test]
async fn refresh_enriches_every_record() {
    let h = Harness::new();
    stub_world(&h.fetcher, 30004141, "X-7OMU", -0.3, 20000607);
    stub_world(&h.fetcher, 30001000, "Tama", 0.3, 20000100);
    h.fetcher.respond(
        INCURSIONS,
        json!([
            raw_incursion(30004141, 20000607, "established"),
            raw_incursion(30001000, 20000100, "mobilizing"),
        ]),
    );
    let mut snapshots = h.snapshots();

    let snapshot = snapshots.get_snapshot_at(t0()).await;
    let first = &snapshot.incursions[0];
    assert_eq!(first.constellation_name, "Const 20000607");
    assert_eq!(first.region_name, "Pure Blind");
    assert_eq!(first.staging_system.as_ref().unwrap().name, "X-7OMU");
    assert_eq!(first.route, vec![JITA, 30000144, 30004141]);
    assert_eq!(first.jump_count(), Some(2));
    assert_eq!(snapshot.incursions[1].constellation_name, "Const 20000100");

    // Both missing constellation names went out in the first batch.
    let first_batch = &h.fetcher.post_bodies()[0];
    assert_eq!(first_batch, &json!([20000607, 20000100]));
}

#[tokio::test]
async fn enrichment_is_idempotent() {
    let h = Harness::new();
    stub_world(&h.fetcher, 30004141, "X-7OMU", -0.3, 20000607);
    h.fetcher
        .respond(INCURSIONS, json!([raw_incursion(30004141, 20000607, "established")]));
    let mut snapshots = h.snapshots();
    let mut incursions = snapshots.get_snapshot_at(t0()).await.incursions;
    let before = incursions.clone();

    h.fetcher.clear_calls();
    snapshots.enrich(&mut incursions).await;
    assert_eq!(incursions, before);
    assert_eq!(h.fetcher.call_count(), 0);
}

#[tokio::test]
async fn unresolvable_metadata_leaves_gaps() {
    let h = Harness::new();
    h.fetcher
        .respond(INCURSIONS, json!([raw_incursion(30009999, 20009999, "withdrawing")]));
    let mut snapshots = h.snapshots();

    let snapshot = snapshots.get_snapshot_at(t0()).await;
    assert!(snapshot.refreshed);
    let inc = &snapshot.incursions[0];
    assert!(inc.constellation_name.is_empty());
    assert!(inc.staging_system.is_none());
    assert!(inc.route.is_empty());
    assert_eq!(inc.jump_count(), None);
}

#[tokio::test]
async fn refresh_is_persisted_and_restorable() {
    let h = Harness::new();
    stub_world(&h.fetcher, 30004141, "X-7OMU", -0.3, 20000607);
    h.fetcher
        .respond(INCURSIONS, json!([raw_incursion(30004141, 20000607, "established")]));
    let mut snapshots = h.snapshots();
    let fetched = snapshots.get_snapshot_at(t0()).await.incursions;

    let saved = h.store.get(INCURSIONS_KEY).await.unwrap().unwrap();
    let saved: Vec<EsiIncursion> = serde_json::from_slice(&saved).unwrap();
    assert_eq!(saved, fetched);

    h.fetcher.clear_calls();
    let restored = h.snapshots().restore().await.unwrap();
    assert_eq!(restored, fetched);
    assert_eq!(h.fetcher.call_count(), 0);
}

#[tokio::test]
async fn restore_re_enriches_bare_records() {
    let h = Harness::new();
    stub_world(&h.fetcher, 30004141, "X-7OMU", -0.3, 20000607);
    let bare = json!([raw_incursion(30004141, 20000607, "established")]);
    h.store
        .set(INCURSIONS_KEY, bare.to_string().as_bytes())
        .await
        .unwrap();

    let restored = h.snapshots().restore().await.unwrap();
    assert_eq!(restored[0].staging_system.as_ref().unwrap().name, "X-7OMU");
    assert_eq!(restored[0].constellation_name, "Const 20000607");
}

#[tokio::test]
async fn restore_without_saved_list_is_none() {
    let h = Harness::new();
    assert!(h.snapshots().restore().await.is_none());
}
