//! Black-box tests: the console against a stub auth server over real HTTP.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use opsconsole_auth::Phase;
use opsconsole_auth::registry::{CONTRACT, CUSTOMER};
use opsconsole_client::{ApiError, AuthApi, Console, ConsoleError, HttpAuthApi, Route, Shell, SqliteSessionStore};
use opsconsole_core::{AccountId, SystemClock};

const TOKEN: &str = "srv-token-1";

#[derive(Default)]
struct Stub {
    revoked: AtomicBool,
    resends: AtomicU32,
    logouts: Mutex<Vec<String>>,
}

#[derive(Deserialize)]
struct LoginBody {
    identifier: String,
    secret: String,
}

#[derive(Deserialize)]
struct OtpBody {
    account_id: String,
    code: String,
}

fn error(status: StatusCode, code: &str) -> Response {
    (status, Json(json!({ "code": code, "message": code }))).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

async fn login(Json(body): Json<LoginBody>) -> Response {
    if body.identifier == "ada" && body.secret == "pw" {
        Json(json!({ "id": "u1", "display_name": "Ada" })).into_response()
    } else {
        error(StatusCode::UNAUTHORIZED, "invalid_credentials")
    }
}

async fn verify(Json(body): Json<OtpBody>) -> Response {
    match body.code.as_str() {
        "123456" => Json(json!({
            "token": TOKEN,
            "user": { "id": body.account_id, "display_name": "Ada" },
        }))
        .into_response(),
        "000000" => error(StatusCode::BAD_REQUEST, "otp_expired"),
        _ => error(StatusCode::BAD_REQUEST, "otp_invalid"),
    }
}

async fn resend(State(stub): State<Arc<Stub>>) -> StatusCode {
    stub.resends.fetch_add(1, Ordering::SeqCst);
    StatusCode::NO_CONTENT
}

async fn logout(State(stub): State<Arc<Stub>>, headers: HeaderMap) -> StatusCode {
    match bearer(&headers) {
        Some(token) => {
            stub.logouts.lock().unwrap().push(token);
            StatusCode::NO_CONTENT
        }
        None => StatusCode::UNAUTHORIZED,
    }
}

async fn permissions(State(stub): State<Arc<Stub>>, headers: HeaderMap) -> Response {
    match bearer(&headers) {
        Some(token) if token == TOKEN && !stub.revoked.load(Ordering::SeqCst) => {
            Json(json!(["CONTRACT.VIEW", "CUSTOMER.VIEW", "CUSTOMER.UPDATE"])).into_response()
        }
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

struct TestServer {
    base_url: String,
    stub: Arc<Stub>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let stub = Arc::new(Stub::default());
        let app = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/otp/verify", post(verify))
            .route("/auth/otp/resend", post(resend))
            .route("/auth/logout", post(logout))
            .route("/auth/permissions", get(permissions))
            .with_state(stub.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, stub, handle }
    }

    fn api(&self) -> HttpAuthApi {
        HttpAuthApi::new(format!("{}/", self.base_url), Duration::from_secs(5)).unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn console(api: HttpAuthApi) -> Console<SqliteSessionStore, HttpAuthApi> {
    let store = SqliteSessionStore::in_memory().await.unwrap();
    Console::new(store, api, Arc::new(SystemClock))
}

#[tokio::test]
async fn api_client_maps_server_responses() {
    let server = TestServer::spawn().await;
    let api = server.api();

    let account = api.check_credentials("ada", "pw").await.unwrap();
    assert_eq!(account.id.as_str(), "u1");
    assert_eq!(api.check_credentials("ada", "nope").await, Err(ApiError::Unauthorized));

    let id = AccountId::new("u1");
    assert_eq!(api.exchange_otp(&id, "111111").await, Err(ApiError::WrongCode));
    assert_eq!(api.exchange_otp(&id, "000000").await, Err(ApiError::ExpiredCode));

    let verified = api.exchange_otp(&id, "123456").await.unwrap();
    assert_eq!(verified.token, TOKEN);
    assert_eq!(verified.account.label(), "Ada");

    let caps = api.fetch_capabilities(TOKEN).await.unwrap();
    assert!(caps.contains(&CONTRACT::VIEW));
    assert_eq!(api.fetch_capabilities("other").await, Err(ApiError::Unauthorized));

    api.resend_otp(&id).await.unwrap();
    assert_eq!(server.stub.resends.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn full_login_and_logout_over_http() {
    let server = TestServer::spawn().await;
    let c = console(server.api()).await;

    assert_eq!(c.start().await.unwrap(), Phase::Unauthenticated);
    assert_eq!(c.open("/contracts"), (Shell::Public, Route::Login));

    c.submit_credentials("ada", "pw").await.unwrap();
    assert_eq!(c.phase(), Phase::PendingVerification);
    assert_eq!(c.pending_navigation(), Some(Route::Verify));

    for _ in 0..3 {
        let err = c.submit_otp("999999").await.unwrap_err();
        assert!(matches!(err, ConsoleError::Api(ApiError::WrongCode)));
        assert!(err.is_recoverable());
    }
    assert!(c.can_resend());
    c.resend_otp().await.unwrap();
    assert!(!c.can_resend());

    c.submit_otp("123456").await.unwrap();
    assert_eq!(c.phase(), Phase::Authenticated);
    assert_eq!(c.pending_navigation(), Some(Route::Dashboard));
    assert!(c.has(&CUSTOMER::UPDATE));
    assert!(!c.has(&CONTRACT::UPDATE));
    assert!(c.require(&CONTRACT::UPDATE).is_err());

    let menu: Vec<Route> = c.menu().into_iter().map(|item| item.route).collect();
    assert_eq!(menu, vec![Route::Customers, Route::Contracts]);

    c.request_logout();
    c.confirm_logout().await.unwrap();
    assert_eq!(c.phase(), Phase::Unauthenticated);
    assert!(!c.has(&CUSTOMER::VIEW));
    assert_eq!(*server.stub.logouts.lock().unwrap(), vec![TOKEN.to_string()]);
}

#[tokio::test]
async fn revoked_token_signs_the_console_out() {
    let server = TestServer::spawn().await;
    let c = console(server.api()).await;
    c.start().await.unwrap();
    c.submit_credentials("ada", "pw").await.unwrap();
    c.submit_otp("123456").await.unwrap();
    assert!(c.has(&CONTRACT::VIEW));

    server.stub.revoked.store(true, Ordering::SeqCst);
    let err = c.refresh_permissions().await.unwrap_err();
    assert!(matches!(err, ConsoleError::Api(ApiError::Unauthorized)));
    assert_eq!(c.phase(), Phase::Unauthenticated);
    assert_eq!(c.open("/"), (Shell::Public, Route::Login));
}

#[tokio::test]
async fn unreachable_server_keeps_phase() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = HttpAuthApi::new(format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    let c = console(api).await;
    c.start().await.unwrap();

    let err = c.submit_credentials("ada", "pw").await.unwrap_err();
    assert!(matches!(err, ConsoleError::Api(ApiError::Network(_))));
    assert_eq!(c.phase(), Phase::Unauthenticated);
}
