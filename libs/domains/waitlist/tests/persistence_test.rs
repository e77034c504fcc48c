//! Round-trip tests for the persistent stores
//!
//! The SQLite tests run anywhere. The PostgreSQL and MongoDB tests start
//! containers through testcontainers and need Docker:
//! `cargo test -p domain_waitlist -- --ignored`.

use chrono::{Duration, Utc};
use database::RetryConfig;
use database::relational::RelationalConfig;
use domain_waitlist::*;
use email::{MockSmtpProvider, SmtpConfig};
use std::path::PathBuf;
use std::sync::Arc;
use test_utils::{TestDataBuilder, TestMongo, TestPostgres, assertions::*};

fn smtp() -> SmtpConfig {
    SmtpConfig {
        host: "localhost".to_string(),
        port: 1025,
        username: "mailer@acme.test".to_string(),
        password: "secret".to_string(),
        from_email: String::new(),
        from_name: String::new(),
        use_tls: false,
    }
}

async fn open(backend: BackendConfig) -> WaitlistService {
    let config = WaitlistConfig::new(smtp(), backend)
        .with_company_name("Acme")
        .with_connect_retry(RetryConfig::new().with_max_retries(2).without_jitter());
    let store = build_store(&config.backend, config.connect_retry.clone());

    let service =
        WaitlistService::with_components(config, store, Arc::new(MockSmtpProvider::new())).unwrap();
    service.initialize().await.unwrap();
    service.await_ready().await.unwrap();
    service
}

/// Added entries survive a restart and queries reflect persisted state
async fn assert_round_trip(backend: BackendConfig, builder: &TestDataBuilder) {
    let first = open(backend.clone()).await;
    let alice = builder.address("alice");
    let bob = builder.address("bob");

    assert_eq!(first.add_email(&alice).await, Ok(true));
    assert_eq!(first.add_email(&bob).await, Ok(true));
    assert_eq!(first.remove_email(&bob).await, Ok(true));
    first.close().await.unwrap();

    let second = open(backend).await;
    assert_eq!(second.get_waitlist().unwrap(), vec![alice.clone()]);
    assert_eq!(
        second.find_by_pattern("ALICE").await.unwrap(),
        vec![alice.clone()]
    );

    let hour = Duration::hours(1);
    assert_eq!(
        second
            .count_by_date_range(Some(Utc::now() - hour), Some(Utc::now() + hour))
            .await,
        Ok(1)
    );
    assert_eq!(
        second
            .count_by_date_range(Some(Utc::now() + hour), None)
            .await,
        Ok(0)
    );
    second.close().await.unwrap();
}

/// `save_waitlist` replaces whatever the store holds with the in-memory set
async fn assert_save_replaces(backend: BackendConfig, builder: &TestDataBuilder) {
    let service = open(backend.clone()).await;
    for address in builder.addresses(3) {
        service.add_email(&address).await.unwrap();
    }
    assert_eq!(service.save_waitlist().await, Ok(true));
    service.close().await.unwrap();

    let reopened = open(backend).await;
    assert_same_members(
        &reopened.get_waitlist().unwrap(),
        &builder.addresses(3),
        "saved waitlist",
    );

    reopened.clear_waitlist().await.unwrap();
    assert_eq!(reopened.count_by_date_range(None, None).await, Ok(0));
    reopened.close().await.unwrap();
}

fn sqlite_path(builder: &TestDataBuilder) -> PathBuf {
    std::env::temp_dir().join(format!(
        "{}-{}.db",
        builder.name("waitlist", "sqlite"),
        builder.unique_id()
    ))
}

// ============================================================================
// SQLite
// ============================================================================

#[tokio::test]
async fn test_sqlite_round_trip() {
    let builder = TestDataBuilder::from_test_name("sqlite_round_trip");
    let path = sqlite_path(&builder);
    let backend = BackendConfig::relational(RelationalConfig::sqlite(path.display().to_string()));

    assert_round_trip(backend, &builder).await;
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_sqlite_save_replaces_contents() {
    let builder = TestDataBuilder::from_test_name("sqlite_save");
    let path = sqlite_path(&builder);
    let backend = BackendConfig::relational(RelationalConfig::sqlite(path.display().to_string()));

    assert_save_replaces(backend, &builder).await;
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_unreachable_store_fails_initialization() {
    let backend = BackendConfig::relational(RelationalConfig::sqlite(
        "/nonexistent-dir/waitlist.db",
    ));
    let config = WaitlistConfig::new(smtp(), backend)
        .with_connect_retry(RetryConfig::new().with_max_retries(0));
    let store = build_store(&config.backend, config.connect_retry.clone());
    let service =
        WaitlistService::with_components(config, store, Arc::new(MockSmtpProvider::new())).unwrap();

    let backend_failed = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let flag = backend_failed.clone();
    service.subscribe(move |event| {
        if event.name() == "backendFailed" {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    });

    assert!(matches!(
        service.initialize().await,
        Err(WaitlistError::InitializationFailed(_))
    ));
    assert!(backend_failed.load(std::sync::atomic::Ordering::SeqCst));
    assert!(matches!(
        service.get_waitlist(),
        Err(WaitlistError::InitializationFailed(_))
    ));
}

// ============================================================================
// PostgreSQL
// ============================================================================

#[tokio::test]
#[ignore] // Requires Docker
async fn test_postgres_round_trip() {
    let pg = TestPostgres::new().await;
    let builder = TestDataBuilder::from_test_name("postgres_round_trip");
    let backend = BackendConfig::relational(RelationalConfig::postgres(
        pg.host.clone(),
        pg.port,
        test_utils::POSTGRES_USER,
        test_utils::POSTGRES_PASSWORD,
        test_utils::POSTGRES_DB,
    ));

    assert_round_trip(backend.clone(), &builder).await;
    assert_save_replaces(backend, &TestDataBuilder::from_test_name("postgres_save")).await;
}

// ============================================================================
// MongoDB
// ============================================================================

#[tokio::test]
#[ignore] // Requires Docker
async fn test_mongo_round_trip() {
    let mongo = TestMongo::new().await;
    let builder = TestDataBuilder::from_test_name("mongo_round_trip");
    let backend = BackendConfig::document(mongo.url(), builder.name("db", "waitlist"));

    assert_round_trip(backend, &builder).await;
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_mongo_save_replaces_contents() {
    let mongo = TestMongo::new().await;
    let builder = TestDataBuilder::from_test_name("mongo_save");
    let backend = BackendConfig::document(mongo.url(), builder.name("db", "waitlist"));

    assert_save_replaces(backend, &builder).await;
}
