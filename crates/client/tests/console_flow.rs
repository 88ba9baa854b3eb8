//! End-to-end session flows against the scripted API and in-memory storage.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use opsconsole_auth::registry::{CONTRACT, CUSTOMER, DASHBOARD};
use opsconsole_auth::{Account, Capability, PermissionStatus, Phase};
use opsconsole_client::{ApiError, Console, ConsoleError, InMemorySessionStore, Route, ScriptedAuthApi, Shell};
use opsconsole_core::ManualClock;

type TestConsole = Console<Arc<InMemorySessionStore>, ScriptedAuthApi>;

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

fn api() -> ScriptedAuthApi {
    ScriptedAuthApi::new()
        .with_account("ada", "pw", Account::new("u1").with_display_name("Ada"))
        .with_otp_code("123456")
        .with_capabilities([CONTRACT::VIEW, DASHBOARD::VIEW])
}

fn console(store: &Arc<InMemorySessionStore>, clock: &Arc<ManualClock>, api: ScriptedAuthApi) -> TestConsole {
    Console::new(store.clone(), api, clock.clone())
}

async fn signed_in(store: &Arc<InMemorySessionStore>, clock: &Arc<ManualClock>) -> TestConsole {
    let c = console(store, clock, api());
    c.start().await.unwrap();
    c.submit_credentials("ada", "pw").await.unwrap();
    c.submit_otp("123456").await.unwrap();
    c
}

#[tokio::test]
async fn login_to_logout_walkthrough() {
    let store = Arc::new(InMemorySessionStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let c = console(&store, &clock, api());

    // Fresh start.
    assert_eq!(c.start().await.unwrap(), Phase::Unauthenticated);
    assert_eq!(c.open("/customers"), (Shell::Public, Route::Login));

    // First factor.
    c.submit_credentials("ada", "pw").await.unwrap();
    assert_eq!(c.phase(), Phase::PendingVerification);
    assert_eq!(c.account().unwrap().id.as_str(), "u1");
    assert_eq!(c.open("/customers"), (Shell::Public, Route::Verify));
    assert!(store.snapshot().is_empty());

    // Second factor.
    c.submit_otp("123456").await.unwrap();
    assert_eq!(c.phase(), Phase::Authenticated);
    assert_eq!(
        store.snapshot().expires_at_ms,
        Some((t0() + Duration::days(7)).timestamp_millis())
    );
    assert_eq!(c.open("/verify"), (Shell::Application, Route::Dashboard));

    // Permissions.
    assert_eq!(c.permission_status(), PermissionStatus::Ready);
    assert!(c.has(&CONTRACT::VIEW));
    assert!(!c.has(&CONTRACT::DELETE));

    // Logout.
    c.request_logout();
    c.confirm_logout().await.unwrap();
    assert_eq!(c.phase(), Phase::Unauthenticated);
    assert!(store.snapshot().is_empty());
    assert!(c.permissions().snapshot().entries().is_empty());
    assert_eq!(c.api().calls().notify_logout, 1);
}

#[tokio::test]
async fn logged_out_console_grants_nothing() {
    let store = Arc::new(InMemorySessionStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let c = signed_in(&store, &clock).await;

    c.request_logout();
    c.confirm_logout().await.unwrap();

    // Fail-open applies to a loading set inside a session, never without one.
    assert_eq!(c.permission_status(), PermissionStatus::Loading);
    for capability in opsconsole_auth::registry::ALL {
        assert!(!c.has(capability), "{capability} granted after logout");
    }
    assert!(c.menu().is_empty());
}

#[tokio::test]
async fn restart_restores_session_and_reloads_permissions() {
    let store = Arc::new(InMemorySessionStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    drop(signed_in(&store, &clock).await);

    clock.advance(Duration::days(6));
    let c = console(&store, &clock, api().with_capabilities([CUSTOMER::VIEW]));
    assert_eq!(c.start().await.unwrap(), Phase::Authenticated);
    assert_eq!(c.account().unwrap().label(), "Ada");
    assert_eq!(c.api().calls().fetch_capabilities, 1);
    assert!(c.has(&CUSTOMER::VIEW));
    assert!(!c.has(&CONTRACT::VIEW));
}

#[tokio::test]
async fn restart_after_expiry_starts_signed_out() {
    let store = Arc::new(InMemorySessionStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    drop(signed_in(&store, &clock).await);

    clock.advance(Duration::days(7));
    let c = console(&store, &clock, api());
    assert_eq!(c.start().await.unwrap(), Phase::Unauthenticated);
    assert!(store.snapshot().is_empty());
    assert_eq!(c.api().calls().fetch_capabilities, 0);
}

#[tokio::test]
async fn expiry_while_running_drops_session_and_permissions() {
    let store = Arc::new(InMemorySessionStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let c = signed_in(&store, &clock).await;
    assert!(c.has(&CONTRACT::VIEW));

    clock.advance(Duration::days(7) + Duration::seconds(1));
    assert!(!c.has(&CONTRACT::VIEW));
    assert_eq!(c.phase(), Phase::Unauthenticated);
    assert!(c.permissions().snapshot().entries().is_empty());
    assert_eq!(c.open("/contracts"), (Shell::Public, Route::Login));
}

#[tokio::test]
async fn rejected_codes_offer_resend() {
    let store = Arc::new(InMemorySessionStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let c = console(&store, &clock, api());
    c.start().await.unwrap();
    c.submit_credentials("ada", "pw").await.unwrap();

    assert!(matches!(c.submit_otp("1").await, Err(ConsoleError::Api(ApiError::WrongCode))));
    assert!(matches!(c.submit_otp("2").await, Err(ConsoleError::Api(ApiError::WrongCode))));
    c.api().expire_otp(true);
    assert!(matches!(c.submit_otp("123456").await, Err(ConsoleError::Api(ApiError::ExpiredCode))));
    assert_eq!(c.otp_failures(), 3);
    assert!(c.can_resend());
    assert_eq!(c.phase(), Phase::PendingVerification);

    c.resend_otp().await.unwrap();
    assert!(!c.can_resend());
    c.submit_otp("123456").await.unwrap();
    assert_eq!(c.phase(), Phase::Authenticated);
}

#[tokio::test]
async fn network_failures_do_not_advance_the_phase() {
    let store = Arc::new(InMemorySessionStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let c = console(&store, &clock, api());
    c.start().await.unwrap();

    c.api().set_offline(true);
    let err = c.submit_credentials("ada", "pw").await.unwrap_err();
    assert!(err.is_recoverable());
    assert_eq!(c.phase(), Phase::Unauthenticated);

    c.api().set_offline(false);
    c.submit_credentials("ada", "pw").await.unwrap();
    c.api().set_offline(true);
    assert!(c.submit_otp("123456").await.is_err());
    assert_eq!(c.phase(), Phase::PendingVerification);
    assert_eq!(c.otp_failures(), 0);
}

#[tokio::test]
async fn wrong_secret_is_reported() {
    let store = Arc::new(InMemorySessionStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let c = console(&store, &clock, api());
    c.start().await.unwrap();

    let err = c.submit_credentials("ada", "wrong").await.unwrap_err();
    assert!(matches!(err, ConsoleError::Api(ApiError::Unauthorized)));
    assert_eq!(c.phase(), Phase::Unauthenticated);
}

#[tokio::test]
async fn failed_permission_load_denies_until_refreshed() {
    let store = Arc::new(InMemorySessionStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let api = api();
    api.fail_capabilities(Some(ApiError::Network("timeout".to_string())));
    let c = console(&store, &clock, api);
    c.start().await.unwrap();
    c.submit_credentials("ada", "pw").await.unwrap();
    c.submit_otp("123456").await.unwrap();

    assert_eq!(c.phase(), Phase::Authenticated);
    assert_eq!(c.permission_status(), PermissionStatus::Failed);
    assert!(!c.has(&CONTRACT::VIEW));

    c.api().fail_capabilities(None);
    c.refresh_permissions().await.unwrap();
    assert_eq!(c.permission_status(), PermissionStatus::Ready);
    assert!(c.has(&CONTRACT::VIEW));
}

#[tokio::test]
async fn refresh_failure_keeps_previous_entries() {
    let store = Arc::new(InMemorySessionStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let c = signed_in(&store, &clock).await;

    c.api().fail_capabilities(Some(ApiError::Api(500, "boom".to_string())));
    assert!(c.refresh_permissions().await.is_err());
    assert_eq!(c.permission_status(), PermissionStatus::Failed);
    assert!(c.has(&CONTRACT::VIEW));
    assert_eq!(c.phase(), Phase::Authenticated);
}

#[tokio::test]
async fn logout_survives_server_notify_failure() {
    let store = Arc::new(InMemorySessionStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let c = signed_in(&store, &clock).await;

    c.api().fail_logout(Some(ApiError::Network("reset".to_string())));
    c.request_logout();
    c.confirm_logout().await.unwrap();
    assert_eq!(c.phase(), Phase::Unauthenticated);
    assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn cancelled_logout_keeps_session() {
    let store = Arc::new(InMemorySessionStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let c = signed_in(&store, &clock).await;

    c.request_logout();
    assert!(c.is_logout_requested());
    c.cancel_logout();
    assert!(matches!(c.confirm_logout().await, Err(ConsoleError::Session(_))));
    assert_eq!(c.phase(), Phase::Authenticated);
    assert!(c.has(&CONTRACT::VIEW));
}

#[tokio::test]
async fn abandoned_verification_returns_to_login() {
    let store = Arc::new(InMemorySessionStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let c = console(&store, &clock, api());
    c.start().await.unwrap();
    c.submit_credentials("ada", "pw").await.unwrap();
    assert_eq!(c.pending_navigation(), Some(Route::Verify));

    c.cancel_verification().await.unwrap();
    assert_eq!(c.phase(), Phase::Unauthenticated);
    assert!(c.account().is_none());
    assert_eq!(c.open("/verify"), (Shell::Public, Route::Login));
}

#[tokio::test]
async fn persist_failure_keeps_verification_pending() {
    let store = Arc::new(InMemorySessionStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let c = console(&store, &clock, api());
    c.start().await.unwrap();
    c.submit_credentials("ada", "pw").await.unwrap();

    store.fail_writes(true);
    assert!(matches!(c.submit_otp("123456").await, Err(ConsoleError::Session(_))));
    assert_eq!(c.phase(), Phase::PendingVerification);
    assert!(store.snapshot().is_empty());
    assert_eq!(c.api().calls().fetch_capabilities, 0);

    store.fail_writes(false);
    c.submit_otp("123456").await.unwrap();
    assert_eq!(c.phase(), Phase::Authenticated);
}

#[tokio::test]
async fn unregistered_capabilities_are_still_honoured() {
    let store = Arc::new(InMemorySessionStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let c = console(&store, &clock, api().with_capabilities([Capability::new("REPORT.EXPORT")]));
    c.start().await.unwrap();
    c.submit_credentials("ada", "pw").await.unwrap();
    c.submit_otp("123456").await.unwrap();

    assert!(c.has(&Capability::new("REPORT.EXPORT")));
    assert!(!c.has(&DASHBOARD::VIEW));
}
