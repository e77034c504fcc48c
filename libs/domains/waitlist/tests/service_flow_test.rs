//! End-to-end tests for the waitlist service over the Local store
//!
//! The mail transport is `MockSmtpProvider`, so these run without any
//! external service.

use domain_waitlist::store::LocalStore;
use domain_waitlist::*;
use email::{MockSmtpProvider, SmtpConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use test_utils::{TestDataBuilder, assertions::*};

// ============================================================================
// Helpers
// ============================================================================

fn smtp() -> SmtpConfig {
    SmtpConfig {
        host: "localhost".to_string(),
        port: 1025,
        username: "mailer@acme.test".to_string(),
        password: "secret".to_string(),
        from_email: String::new(),
        from_name: "Acme".to_string(),
        use_tls: false,
    }
}

fn local_config() -> WaitlistConfig {
    WaitlistConfig::new(smtp(), BackendConfig::Local).with_company_name("Acme")
}

struct Fixture {
    service: WaitlistService,
    provider: MockSmtpProvider,
    events: Arc<Mutex<Vec<WaitlistEvent>>>,
}

impl Fixture {
    fn event_names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.name()).collect()
    }

    fn count(&self, name: &str) -> usize {
        self.event_names().into_iter().filter(|n| *n == name).count()
    }
}

async fn ready(config: WaitlistConfig, provider: MockSmtpProvider) -> Fixture {
    let store = build_store(&config.backend, None);
    let service =
        WaitlistService::with_components(config, store, Arc::new(provider.clone())).unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    service.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

    service.initialize().await.unwrap();
    events.lock().unwrap().clear();

    Fixture {
        service,
        provider,
        events,
    }
}

// ============================================================================
// Construction & initialization
// ============================================================================

#[tokio::test]
async fn test_missing_password_is_a_configuration_error() {
    let mut config = local_config();
    config.smtp.password.clear();

    match WaitlistService::new(config) {
        Err(WaitlistError::Configuration(message)) => assert!(message.contains("pass")),
        Err(other) => panic!("expected a configuration error, got {:?}", other),
        Ok(_) => panic!("construction should fail without a password"),
    }
}

#[tokio::test]
async fn test_await_ready_from_another_task() {
    let service = Arc::new(
        WaitlistService::with_components(
            local_config(),
            Arc::new(LocalStore::new()),
            Arc::new(MockSmtpProvider::new()),
        )
        .unwrap(),
    );
    assert!(!service.is_ready());

    let waiter = {
        let service = service.clone();
        tokio::spawn(async move { service.await_ready().await })
    };

    service.initialize().await.unwrap();
    assert_eq!(waiter.await.unwrap(), Ok(()));
    assert!(service.is_ready());
}

// ============================================================================
// Waitlist mutations
// ============================================================================

#[tokio::test]
async fn test_add_is_idempotent() {
    let fx = ready(local_config(), MockSmtpProvider::new()).await;

    assert_eq!(fx.service.add_email("a@x.com").await, Ok(true));
    assert_eq!(fx.service.add_email("a@x.com").await, Ok(false));

    assert_eq!(fx.count("entryAdded"), 1);
    assert_eq!(fx.count("duplicateRejected"), 1);
    assert_eq!(fx.service.get_waitlist().unwrap(), vec!["a@x.com".to_string()]);
}

#[tokio::test]
async fn test_remove_absent_address_emits_nothing() {
    let fx = ready(local_config(), MockSmtpProvider::new()).await;
    fx.service.add_email("a@x.com").await.unwrap();
    fx.events.lock().unwrap().clear();

    assert_eq!(fx.service.remove_email("b@x.com").await, Ok(false));
    assert_eq!(fx.count("entryRemoved"), 0);

    assert_eq!(fx.service.remove_email("a@x.com").await, Ok(true));
    assert_eq!(fx.event_names(), vec!["entryRemoved"]);
}

#[tokio::test]
async fn test_strict_validation_rejects_bare_domains() {
    let fx = ready(local_config().with_require_tld(true), MockSmtpProvider::new()).await;

    assert_eq!(fx.service.add_email("admin@localhost").await, Ok(false));
    assert_eq!(fx.event_names(), vec!["validationRejected"]);
    assert!(fx.service.get_waitlist().unwrap().is_empty());
}

#[tokio::test]
async fn test_find_by_pattern_over_local_set() {
    let fx = ready(local_config(), MockSmtpProvider::new()).await;
    fx.service.add_email("test@x.com").await.unwrap();
    fx.service.add_email("other@x.com").await.unwrap();

    assert_eq!(
        fx.service.find_by_pattern("test").await.unwrap(),
        vec!["test@x.com".to_string()]
    );
    assert_eq!(
        fx.service.find_by_pattern("TEST").await.unwrap(),
        vec!["test@x.com".to_string()]
    );
}

#[tokio::test]
async fn test_clear_and_save() {
    let fx = ready(local_config(), MockSmtpProvider::new()).await;
    let builder = TestDataBuilder::from_test_name("clear_and_save");
    for address in builder.addresses(3) {
        fx.service.add_email(&address).await.unwrap();
    }

    assert_eq!(fx.service.count_by_date_range(None, None).await, Ok(3));
    assert_eq!(fx.service.save_waitlist().await, Ok(true));

    fx.service.clear_waitlist().await.unwrap();
    assert!(fx.service.get_waitlist().unwrap().is_empty());
    assert_eq!(fx.service.count_by_date_range(None, None).await, Ok(0));

    let names = fx.event_names();
    assert!(names.contains(&"listSaved"));
    assert_eq!(names.last(), Some(&"listCleared"));
}

// ============================================================================
// Delivery
// ============================================================================

#[tokio::test]
async fn test_confirmation_substitutes_company_name() {
    let fx = ready(local_config(), MockSmtpProvider::new()).await;
    assert_eq!(fx.service.add_email("u@u.com").await, Ok(true));

    let sent = fx
        .service
        .send_confirmation(
            "u@u.com",
            |_| "Hi".to_string(),
            |_| "Welcome [Company Name]".to_string(),
        )
        .await
        .unwrap();

    assert!(sent);
    let emails = fx.provider.sent_emails().await;
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].to, "u@u.com");
    assert_eq!(emails[0].subject, "Hi");
    assert_eq!(emails[0].body_html.as_deref(), Some("Welcome Acme"));
    assert_eq!(fx.count("messageSent"), 1);
}

#[tokio::test]
async fn test_send_to_non_member_fails_closed() {
    let fx = ready(local_config(), MockSmtpProvider::new()).await;

    let sent = fx
        .service
        .send_confirmation("stranger@x.com", |_| "Hi".to_string(), |_| "Body".to_string())
        .await
        .unwrap();

    assert!(!sent);
    assert_eq!(fx.provider.attempts(), 0);
    assert_eq!(fx.event_names(), vec!["operationFailed"]);
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_one_transport_failure() {
    let fx = ready(local_config(), MockSmtpProvider::failing_first(1)).await;
    fx.service.add_email("a@x.com").await.unwrap();
    fx.events.lock().unwrap().clear();

    let sent = fx
        .service
        .send_with_retry(
            "a@x.com",
            |_| "Hi".to_string(),
            |_| "Body".to_string(),
            RetryPolicy::new(1, Duration::from_millis(250)),
        )
        .await
        .unwrap();

    assert!(sent);
    assert_eq!(fx.provider.attempts(), 2);

    let retries: Vec<WaitlistEvent> = fx
        .events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.name() == "messageRetried")
        .cloned()
        .collect();
    assert_eq!(
        retries,
        vec![WaitlistEvent::MessageRetried {
            address: "a@x.com".to_string(),
            attempt: 1
        }]
    );
}

#[tokio::test]
async fn test_bulk_send_reports_aggregate() {
    let fx = ready(local_config(), MockSmtpProvider::new()).await;
    fx.service.add_email("a@x.com").await.unwrap();
    fx.service.add_email("b@x.com").await.unwrap();

    let sent = fx
        .service
        .send_bulk(
            |_| "Launch".to_string(),
            |address| format!("Hello {}", address),
            RetryPolicy::none(),
        )
        .await
        .unwrap();

    assert_eq!(sent, 2);
    let recipients: Vec<String> = fx
        .provider
        .sent_emails()
        .await
        .into_iter()
        .map(|e| e.to)
        .collect();
    assert_same_members(
        &recipients,
        &["a@x.com".to_string(), "b@x.com".to_string()],
        "bulk recipients",
    );
    assert!(fx.events.lock().unwrap().contains(&WaitlistEvent::BulkSendCompleted(
        BulkSummary {
            success_count: 2,
            total: 2
        }
    )));
}

#[tokio::test]
async fn test_parallel_bulk_send_with_failures() {
    let fx = ready(
        local_config().with_bulk_concurrency(3),
        MockSmtpProvider::failing_first(2),
    )
    .await;
    for address in TestDataBuilder::from_test_name("parallel_bulk").addresses(6) {
        fx.service.add_email(&address).await.unwrap();
    }

    let sent = fx
        .service
        .send_bulk(|_| "News".to_string(), |_| "Body".to_string(), RetryPolicy::none())
        .await
        .unwrap();

    assert_eq!(sent, 4);
    assert_eq!(fx.count("bulkSendCompleted"), 1);
}

#[tokio::test]
async fn test_template_send_renders_placeholders() {
    let fx = ready(local_config(), MockSmtpProvider::new()).await;
    fx.service.add_email("ada@x.com").await.unwrap();

    let path = std::env::temp_dir().join(format!("welcome-{}.html", uuid::Uuid::new_v4()));
    tokio::fs::write(&path, "<p>Hi {{ address }}, {{companyName}} says {{ greeting }} {{ unknown }}</p>")
        .await
        .unwrap();

    let replacements: HashMap<String, String> =
        [("greeting".to_string(), "hello".to_string())].into();
    let sent = fx
        .service
        .send_template("ada@x.com", |_| "Welcome".to_string(), &path, &replacements)
        .await
        .unwrap();
    tokio::fs::remove_file(&path).await.unwrap();

    assert!(sent);
    let emails = fx.provider.sent_emails().await;
    assert_eq!(
        emails[0].body_html.as_deref(),
        Some("<p>Hi ada@x.com, Acme says hello {{ unknown }}</p>")
    );
}

#[tokio::test]
async fn test_missing_template_fails_the_send() {
    let fx = ready(local_config(), MockSmtpProvider::new()).await;
    fx.service.add_email("ada@x.com").await.unwrap();
    fx.events.lock().unwrap().clear();

    let sent = fx
        .service
        .send_template(
            "ada@x.com",
            |_| "Welcome".to_string(),
            "/definitely/missing/template.html",
            &HashMap::new(),
        )
        .await
        .unwrap();

    assert!(!sent);
    assert_eq!(fx.provider.attempts(), 0);
    assert_eq!(fx.event_names(), vec!["operationFailed"]);
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_close_is_idempotent_and_final() {
    let fx = ready(local_config(), MockSmtpProvider::new()).await;

    fx.service.close().await.unwrap();
    fx.service.close().await.unwrap();

    assert!(fx.provider.is_closed());
    assert_eq!(fx.service.add_email("a@x.com").await, Err(WaitlistError::Closed));
}

#[tokio::test]
async fn test_channel_subscription_sees_events() {
    let fx = ready(local_config(), MockSmtpProvider::new()).await;
    let mut rx = fx.service.bus().subscribe_channel();

    fx.service.add_email("a@x.com").await.unwrap();

    assert_eq!(
        rx.recv().await,
        Some(WaitlistEvent::EntryAdded("a@x.com".to_string()))
    );
}
