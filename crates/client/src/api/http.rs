//! reqwest binding of [`AuthApi`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use opsconsole_auth::{Account, Capability};
use opsconsole_core::AccountId;

use super::{ApiError, AuthApi, VerificationResult};

/// HTTP client for the console's auth endpoints.
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

impl HttpAuthApi {
    /// `timeout` bounds every call; an elapsed timeout surfaces as
    /// `ApiError::Network` like any other transport failure.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let resp = check(req).await?;
        resp.json::<T>().await.map_err(|e| ApiError::Parse(e.to_string()))
    }

    async fn send_empty(&self, req: RequestBuilder) -> Result<(), ApiError> {
        check(req).await.map(|_| ())
    }
}

async fn check(req: RequestBuilder) -> Result<reqwest::Response, ApiError> {
    let resp = req.send().await.map_err(|e| ApiError::Network(e.to_string()))?;

    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    Err(error_from_response(status.as_u16(), &body))
}

/// Map a non-2xx response onto the error taxonomy. OTP rejections are told
/// apart by the `code` field of the error body, not by status.
pub(crate) fn error_from_response(status: u16, body: &str) -> ApiError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let code = parsed.as_ref().and_then(|b| b.code.as_deref());

    match (status, code) {
        (_, Some("otp_invalid")) => ApiError::WrongCode,
        (_, Some("otp_expired")) => ApiError::ExpiredCode,
        (401, _) => ApiError::Unauthorized,
        _ => {
            let message = parsed
                .and_then(|b| b.message)
                .unwrap_or_else(|| body.to_string());
            ApiError::Api(status, message)
        }
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn check_credentials(&self, identifier: &str, secret: &str) -> Result<Account, ApiError> {
        let req = self.client.post(self.url("/auth/login")).json(&serde_json::json!({
            "identifier": identifier,
            "secret": secret,
        }));
        self.send_json(req).await
    }

    async fn exchange_otp(&self, account_id: &AccountId, code: &str) -> Result<VerificationResult, ApiError> {
        let req = self.client.post(self.url("/auth/otp/verify")).json(&serde_json::json!({
            "account_id": account_id,
            "code": code,
        }));
        self.send_json(req).await
    }

    async fn resend_otp(&self, account_id: &AccountId) -> Result<(), ApiError> {
        let req = self.client.post(self.url("/auth/otp/resend")).json(&serde_json::json!({
            "account_id": account_id,
        }));
        self.send_empty(req).await
    }

    async fn notify_logout(&self, token: &str) -> Result<(), ApiError> {
        let req = self.client.post(self.url("/auth/logout")).bearer_auth(token);
        self.send_empty(req).await
    }

    async fn fetch_capabilities(&self, token: &str) -> Result<Vec<Capability>, ApiError> {
        let req = self.client.get(self.url("/auth/permissions")).bearer_auth(token);
        let ids: Vec<String> = self.send_json(req).await?;
        Ok(ids.into_iter().map(Capability::from).collect())
    }
}
