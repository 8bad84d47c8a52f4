//! API client for communicating with the mentorlink backend.
//!
//! Every protected call goes through [`ApiClient::request`], which:
//! 1. refreshes an expired access token before sending,
//! 2. attaches `Authorization: Bearer <token>` when a token exists,
//! 3. on a 401, refreshes once and retries once,
//! 4. maps any other non-2xx status to [`ApiError::Status`].
//!
//! Concurrent callers that all find the token expired share one refresh call.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Context;
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::auth::{token, CredentialStore};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{
    AuthResponse, LoginCredentials, Meeting, MeetingUpdate, Mentee, MenteeUpdate, NewMeeting,
    NewPrayerRequest, PrayerRequest, PrayerRequestUpdate, RefreshResponse, Registration,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

const LOGIN_PATH: &str = "/auth/login";
const REFRESH_PATH: &str = "/auth/refresh";
const LOGOUT_PATH: &str = "/auth/logout";
const REGISTER_PATH: &str = "/mentor";

/// Called once each time the pipeline ends the session, after credentials are cleared.
pub type SessionExpiredHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone)]
struct RefreshFailure(String);

type RefreshFlight = Shared<BoxFuture<'static, std::result::Result<String, RefreshFailure>>>;

/// Method, extra headers and JSON body of a pipeline request.
///
/// Caller headers override the pipeline's defaults (such as `Content-Type`),
/// except `Authorization`, which the pipeline always owns.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<JsonValue>,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn patch() -> Self {
        Self::new(Method::PATCH)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode request body: {e}")))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }
}

/// API client for the mentorlink backend.
/// Clone is cheap - the connection pool, credentials and refresh slot are shared.
///
/// Credential reads and writes call [`SecureStorage`](crate::auth::SecureStorage)
/// synchronously on the calling task. With the keychain backend that is
/// blocking I/O on a runtime worker; it is short, but callers driving many
/// requests from a current-thread runtime will feel it.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Arc<str>,
    credentials: Arc<CredentialStore>,
    refresh_flight: Arc<Mutex<Option<RefreshFlight>>>,
    on_session_expired: Option<SessionExpiredHook>,
}

impl ApiClient {
    /// Create a client for `base_url` (no trailing slash needed).
    pub fn new(base_url: &str, timeout: Duration, credentials: Arc<CredentialStore>) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            credentials,
            refresh_flight: Arc::new(Mutex::new(None)),
            on_session_expired: None,
        })
    }

    pub fn from_config(config: &Config, credentials: Arc<CredentialStore>) -> Result<Self> {
        Self::new(&config.api_base_url(), config.request_timeout(), credentials)
    }

    pub fn with_session_expired_hook(mut self, hook: SessionExpiredHook) -> Self {
        self.on_session_expired = Some(hook);
        self
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    // ===== Authentication =====

    /// Exchange user name and password for a token pair and persist it.
    ///
    /// Does not go through the refresh pipeline. A login whose tokens cannot
    /// be persisted fails with [`Error::Storage`].
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<AuthResponse> {
        let response = self.post_unauthenticated(LOGIN_PATH, credentials).await?;
        let auth: AuthResponse = Self::parse_response(response, LOGIN_PATH).await?;

        self.credentials
            .store(&auth.access_token, auth.refresh_token.as_deref())?;

        info!(has_refresh = auth.refresh_token.is_some(), "Login successful");
        Ok(auth)
    }

    /// Create a mentor account. Tokens in the response are ignored; the new
    /// user signs in separately.
    pub async fn register(&self, registration: &Registration) -> Result<()> {
        let response = self.post_unauthenticated(REGISTER_PATH, registration).await?;
        let _: IgnoredAny = Self::parse_response(response, REGISTER_PATH).await?;
        info!("Registration successful");
        Ok(())
    }

    /// Invalidate the session on the server, then clear local credentials.
    ///
    /// The server call is best effort; local credentials are cleared whatever
    /// it returns.
    pub async fn logout(&self) {
        self.revoke_session().await;
        self.credentials.clear();
    }

    /// The server half of [`logout`](Self::logout). Local credentials are
    /// left alone so the caller can publish its signed-out state first.
    pub async fn revoke_session(&self) {
        if self.credentials.access_token().is_none() {
            return;
        }
        if let Err(e) = self
            .request::<IgnoredAny>(LOGOUT_PATH, RequestOptions::post())
            .await
        {
            warn!(error = %e, "Logout API call failed");
        }
    }

    async fn post_unauthenticated<B: Serialize>(&self, path: &str, body: &B) -> Result<Response> {
        let response = self
            .client
            .post(self.url(path))
            .header(header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;

        Self::check_response(response).await
    }

    // ===== Request pipeline =====

    /// Send an authenticated request to `endpoint` and parse the JSON reply.
    ///
    /// Fails with [`Error::SessionExpired`] when the session cannot be renewed;
    /// credentials are already cleared at that point. An empty 2xx body parses
    /// as JSON `null`, so `()` and `IgnoredAny` work for bodiless replies.
    pub async fn request<T: DeserializeOwned>(&self, endpoint: &str, options: RequestOptions) -> Result<T> {
        self.refresh_if_expired().await?;

        let response = self.dispatch(endpoint, &options).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::parse_response(response, endpoint).await;
        }

        debug!(endpoint, "Unauthorized, refreshing session and retrying once");
        self.refresh_session().await?;

        let retry = self.dispatch(endpoint, &options).await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            warn!(endpoint, "Refreshed token was rejected, ending session");
            Self::end_session(&self.credentials, self.on_session_expired.as_ref());
            return Err(Error::SessionExpired);
        }

        Self::parse_response(retry, endpoint).await
    }

    async fn refresh_if_expired(&self) -> Result<()> {
        let Some(access_token) = self.credentials.access_token() else {
            return Ok(());
        };
        if !token::is_expired(&access_token) {
            return Ok(());
        }
        if self.credentials.refresh_token().is_none() {
            debug!("Access token expired and no refresh token is stored");
            return Ok(());
        }

        debug!("Access token expired, refreshing before dispatch");
        self.refresh_session().await.map(|_| ())
    }

    async fn dispatch(&self, endpoint: &str, options: &RequestOptions) -> Result<Response> {
        let mut request = self
            .client
            .request(options.method.clone(), self.url(endpoint))
            .headers(self.request_headers(options)?);

        if let Some(ref body) = options.body {
            request = request.body(body.to_string());
        }

        let response = request.send().await?;
        debug!(endpoint, method = %options.method, status = response.status().as_u16(), "Response received");
        Ok(response)
    }

    fn request_headers(&self, options: &RequestOptions) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        for name in options.headers.keys() {
            headers.remove(name);
        }
        for (name, value) in options.headers.iter() {
            if *name != header::AUTHORIZATION {
                headers.append(name.clone(), value.clone());
            }
        }

        if let Some(token) = self.credentials.access_token().filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::InvalidRequest("Access token is not a valid header value".to_string()))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn parse_response<T: DeserializeOwned>(response: Response, endpoint: &str) -> Result<T> {
        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        let body = if text.trim().is_empty() { "null" } else { text.as_str() };

        serde_json::from_str(body).map_err(|e| {
            warn!(endpoint, error = %e, "Failed to parse JSON response");
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", endpoint, e)).into()
        })
    }

    // ===== Refresh protocol =====

    /// Renew the access token, joining a refresh already in flight if there is one.
    async fn refresh_session(&self) -> Result<String> {
        let flight = {
            let mut slot = self.flight_slot();
            let pending = slot.as_ref().filter(|f| f.peek().is_none()).cloned();
            match pending {
                Some(flight) => {
                    debug!("Joining in-flight token refresh");
                    flight
                }
                None => {
                    let flight = Self::run_refresh(
                        self.client.clone(),
                        self.base_url.clone(),
                        self.credentials.clone(),
                        self.on_session_expired.clone(),
                    )
                    .boxed()
                    .shared();
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };

        let outcome = flight.await;

        {
            let mut slot = self.flight_slot();
            if slot.as_ref().is_some_and(|f| f.peek().is_some()) {
                *slot = None;
            }
        }

        outcome.map_err(|RefreshFailure(reason)| {
            debug!(%reason, "Session could not be renewed");
            Error::SessionExpired
        })
    }

    fn flight_slot(&self) -> MutexGuard<'_, Option<RefreshFlight>> {
        self.refresh_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// One refresh attempt. On failure the session is ended here, so it
    /// happens once no matter how many callers share the flight.
    async fn run_refresh(
        client: Client,
        base_url: Arc<str>,
        credentials: Arc<CredentialStore>,
        hook: Option<SessionExpiredHook>,
    ) -> std::result::Result<String, RefreshFailure> {
        match Self::exchange_refresh_token(&client, &base_url, &credentials).await {
            Ok(access_token) => {
                info!("Session refreshed");
                Ok(access_token)
            }
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Token refresh failed");
                Self::end_session(&credentials, hook.as_ref());
                Err(RefreshFailure(format!("{:#}", e)))
            }
        }
    }

    async fn exchange_refresh_token(
        client: &Client,
        base_url: &str,
        credentials: &CredentialStore,
    ) -> anyhow::Result<String> {
        let refresh_token = credentials
            .refresh_token()
            .context("No refresh token available")?;

        let response = client
            .post(format!("{}{}", base_url, REFRESH_PATH))
            .header(header::CONTENT_TYPE, "application/json")
            .bearer_auth(&refresh_token)
            .send()
            .await
            .context("Failed to send refresh request")?;

        let response = Self::check_response(response).await?;
        let refreshed: RefreshResponse = response
            .json()
            .await
            .context("Failed to parse refresh response")?;

        // A refresh token the server did not rotate stays valid
        let next_refresh = refreshed.refresh_token.as_deref().unwrap_or(&refresh_token);
        credentials
            .store(&refreshed.access_token, Some(next_refresh))
            .context("Failed to persist refreshed tokens")?;

        Ok(refreshed.access_token)
    }

    /// Signed-out state is announced before tokens go, so nobody observes
    /// an authenticated session without an access token.
    fn end_session(credentials: &CredentialStore, hook: Option<&SessionExpiredHook>) {
        if let Some(hook) = hook {
            hook();
        }
        credentials.clear();
    }

    // ===== Mentees =====

    pub async fn list_mentees(&self, mentor_id: &str) -> Result<Vec<Mentee>> {
        self.request(&format!("/mentees/list/{}", mentor_id), RequestOptions::get())
            .await
    }

    pub async fn get_mentee(&self, id: &str) -> Result<Mentee> {
        self.request(&format!("/mentees/{}", id), RequestOptions::get())
            .await
    }

    pub async fn create_mentee(&self, mentee: &Mentee) -> Result<Mentee> {
        self.request("/mentees", RequestOptions::post().json(mentee)?)
            .await
    }

    pub async fn update_mentee(&self, id: &str, update: &MenteeUpdate) -> Result<Mentee> {
        self.request(&format!("/mentees/{}", id), RequestOptions::patch().json(update)?)
            .await
    }

    pub async fn delete_mentee(&self, id: &str) -> Result<()> {
        let _: IgnoredAny = self
            .request(&format!("/mentees/{}", id), RequestOptions::delete())
            .await?;
        Ok(())
    }

    // ===== Meetings =====

    pub async fn create_meeting(&self, meeting: &NewMeeting) -> Result<Meeting> {
        self.request("/meetings", RequestOptions::post().json(meeting)?)
            .await
    }

    pub async fn update_meeting(&self, id: &str, update: &MeetingUpdate) -> Result<Meeting> {
        self.request(&format!("/meetings/{}", id), RequestOptions::patch().json(update)?)
            .await
    }

    // ===== Prayer requests =====

    pub async fn create_prayer_request(&self, request: &NewPrayerRequest) -> Result<PrayerRequest> {
        self.request("/prayer-requests", RequestOptions::post().json(request)?)
            .await
    }

    pub async fn update_prayer_request(
        &self,
        id: &str,
        update: &PrayerRequestUpdate,
    ) -> Result<PrayerRequest> {
        self.request(
            &format!("/prayer-requests/{}", id),
            RequestOptions::patch().json(update)?,
        )
        .await
    }
}
