//! Integration tests for ignitiond
//!
//! These tests run start requests through the whole stack: gatekeeper on a
//! SQLite store, orchestrator, and the automation driver on a scripted browser.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Local, TimeZone};
use ignition_browser_api::{MockBrowser, MockElement, MockOp, SessionOptions};
use ignition_config::{AutomationTiming, Credentials, Locators, SiteConfig, parse_config_with_env};
use ignition_core::{
    Automation, AutomationDriver, AutomationOutcome, DriverSettings, Gatekeeper, OutcomeCategory,
    StartOrchestrator, StartResult,
};
use ignition_store::{SqliteStore, UsageStore};
use ignition_util::RequesterId;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct CountingAutomation {
    outcome: AutomationOutcome,
    runs: AtomicUsize,
}

impl CountingAutomation {
    fn new(outcome: AutomationOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            runs: AtomicUsize::new(0),
        })
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Automation for CountingAutomation {
    async fn run(&self) -> AutomationOutcome {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

fn t0() -> DateTime<Local> {
    Local.with_ymd_and_hms(2025, 6, 1, 15, 0, 0).unwrap()
}

fn fast_settings() -> DriverSettings {
    DriverSettings {
        site: SiteConfig {
            url: "https://console.test/go/".into(),
            credentials: Credentials {
                username: "steve".into(),
                password: "hunter2".into(),
            },
            locators: Locators::default(),
        },
        timing: AutomationTiming {
            wait_timeout: Duration::from_millis(50),
            login_settle: Duration::from_millis(1),
            click_settle: Duration::from_millis(1),
            poll_interval: Duration::from_millis(5),
            run_timeout: Duration::from_secs(5),
        },
        session: SessionOptions::default(),
    }
}

fn offline_console() -> MockBrowser {
    let l = Locators::default();
    let browser = MockBrowser::new()
        .with_element(l.login_field, MockElement::new())
        .with_element(l.password_field, MockElement::new())
        .with_element(l.login_button, MockElement::new())
        .with_element(l.start_button.clone(), MockElement::new())
        .with_element(l.status_label, MockElement::with_text("Offline"));
    browser.reveal_on_click(l.start_button, l.confirm_button, MockElement::new());
    browser
}

#[tokio::test]
async fn test_start_then_cooldown() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let automation = CountingAutomation::new(AutomationOutcome::starting());
    let orch = StartOrchestrator::new(Gatekeeper::new(store), automation.clone(), 1);
    let alice = RequesterId::new(1);

    let first = orch.attempt_start(alice, "@alice", t0()).await;
    assert!(matches!(
        first.result,
        StartResult::Completed(AutomationOutcome {
            category: OutcomeCategory::Starting,
            ..
        })
    ));
    assert!(first.user_message.contains("starting"));
    assert!(!first.admin_notification.unwrap_or_default().is_empty());

    let second = orch
        .attempt_start(alice, "@alice", t0() + ChronoDuration::seconds(60))
        .await;
    match &second.result {
        StartResult::Denied { reason, .. } => assert_eq!(reason.code(), "cooldown"),
        other => panic!("expected cooldown, got {:?}", other),
    }
    assert!(second.admin_notification.is_none());
    assert_eq!(automation.runs(), 1);
}

#[tokio::test]
async fn test_full_stack_starts_offline_server() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(dir.path().join("usage.db")).unwrap());
    let browser = offline_console();
    let driver = AutomationDriver::new(Arc::new(browser.clone()), fast_settings());
    let orch = StartOrchestrator::new(Gatekeeper::new(store.clone()), Arc::new(driver), 1);
    let id = RequesterId::new(5);

    let reply = orch.attempt_start(id, "@eve", t0()).await;

    assert!(matches!(
        reply.result,
        StartResult::Completed(AutomationOutcome {
            category: OutcomeCategory::Starting,
            success: true,
            ..
        })
    ));
    assert!(reply.user_message.ends_with("Requested by: @eve"));
    assert!(browser.was_clicked(&Locators::default().start_button));
    assert!(browser.was_clicked(&Locators::default().confirm_button));
    assert_eq!(browser.sessions_opened(), 1);
    assert_eq!(browser.sessions_closed(), 1);

    let record = store.get(id).unwrap().unwrap();
    assert_eq!(record.usage_count, 1);
    assert_eq!(record.last_used_at, t0());
}

#[tokio::test]
async fn test_full_stack_failure_is_reported_and_cleaned_up() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let browser = offline_console();
    browser.fail_on(MockOp::Navigate);
    let driver = AutomationDriver::new(Arc::new(browser.clone()), fast_settings());
    let orch = StartOrchestrator::new(Gatekeeper::new(store), Arc::new(driver), 1);

    let reply = orch.attempt_start(RequesterId::new(8), "@mallory", t0()).await;

    assert!(matches!(
        reply.result,
        StartResult::Completed(AutomationOutcome {
            category: OutcomeCategory::UnknownError,
            success: false,
            ..
        })
    ));
    assert!(reply.admin_notification.is_some());
    assert_eq!(browser.sessions_closed(), 1);
}

#[tokio::test]
async fn test_usage_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("usage.db");
    let id = RequesterId::new(2);

    {
        let store = Arc::new(SqliteStore::open(&db_path).unwrap());
        let automation = CountingAutomation::new(AutomationOutcome::already_online());
        let orch = StartOrchestrator::new(Gatekeeper::new(store), automation, 1);
        let reply = orch.attempt_start(id, "@bob", t0()).await;
        assert!(reply.admin_notification.is_some());
    }

    let store = Arc::new(SqliteStore::open(&db_path).unwrap());
    let automation = CountingAutomation::new(AutomationOutcome::already_online());
    let orch = StartOrchestrator::new(Gatekeeper::new(store), automation.clone(), 1);

    let reply = orch
        .attempt_start(id, "@bob", t0() + ChronoDuration::seconds(120))
        .await;

    assert!(matches!(reply.result, StartResult::Denied { .. }));
    assert_eq!(automation.runs(), 0);
}

#[tokio::test]
async fn test_daily_limit_across_a_day() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let automation = CountingAutomation::new(AutomationOutcome::starting());
    let orch = StartOrchestrator::new(Gatekeeper::new(store), automation.clone(), 1);
    let id = RequesterId::new(3);
    let morning = Local.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();

    for i in 0..10 {
        let reply = orch
            .attempt_start(id, "@carol", morning + ChronoDuration::minutes(6 * i))
            .await;
        assert!(matches!(reply.result, StartResult::Completed(_)), "start {}", i);
    }

    let reply = orch
        .attempt_start(id, "@carol", morning + ChronoDuration::hours(3))
        .await;
    match &reply.result {
        StartResult::Denied { reason, .. } => assert_eq!(reason.code(), "daily-limit"),
        other => panic!("expected daily limit, got {:?}", other),
    }
    assert!(reply.user_message.contains("Daily limit of 10 starts reached"));
    assert_eq!(automation.runs(), 10);
}

#[test]
fn test_config_drives_the_driver() {
    let config = parse_config_with_env(
        r##"
        config_version = 1

        [site]
        url = "https://console.test/go/"

        [credentials]
        username = "steve"
        password_env = "CONSOLE_PASSWORD"

        [locators]
        start_button_css = "#start"

        [timing]
        login_settle_secs = 2
        "##,
        |name| (name == "CONSOLE_PASSWORD").then(|| "hunter2".to_string()),
    )
    .unwrap();

    let settings = DriverSettings::from_config(&config);
    assert_eq!(settings.site.url, "https://console.test/go/");
    assert_eq!(settings.site.credentials.password, "hunter2");
    assert_eq!(settings.site.locators.start_button.to_string(), "css=#start");
    assert_eq!(settings.timing.login_settle, Duration::from_secs(2));
    assert!(settings.session.headless);
}
