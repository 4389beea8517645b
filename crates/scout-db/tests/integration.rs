//! Offline tests for scout-db pool configuration and document helpers.
//! These tests do not require a live database connection.

use scout_core::{load_app_config_from_env, CandidateProduct, SourceTag};
use scout_db::{candidates, Collection, DocumentStore, MemoryStore, PoolConfig};

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let mut app_config = load_app_config_from_env().expect("defaults should load");
    app_config.db_max_connections = 42;
    app_config.db_min_connections = 7;
    app_config.db_acquire_timeout_secs = 9;

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[tokio::test]
async fn stored_candidate_flattens_product_fields() {
    let store = MemoryStore::new();
    let date = "2026-10-19".parse().expect("valid date");
    let product = CandidateProduct {
        overall_score: 77,
        ..CandidateProduct::new("Cloud Slides", SourceTag::Aliexpress)
    };
    candidates::insert_candidates(&store, "acct", date, &[product])
        .await
        .expect("insert should succeed");

    // Top-level product fields are filterable on the stored document.
    let raw = store
        .find_one(
            Collection::CandidateProducts,
            &serde_json::json!({ "name": "Cloud Slides", "source": "aliexpress" }),
        )
        .await
        .expect("find should succeed")
        .expect("document should exist");
    assert_eq!(raw["overall_score"], 77);
    assert_eq!(raw["scan_date"], "2026-10-19");
}
