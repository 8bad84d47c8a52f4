//! The session state machine UI code drives.
//!
//! ```text
//! unauthenticated --login--> authenticating --ok--> authenticated
//!                                 |                      |
//!                                 +--fail--> error       +--logout / expiry--> unauthenticated
//! ```
//!
//! State is published on a `tokio::sync::watch` channel. Actions are not
//! serialized: two concurrent logins race and the last write wins.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::config::Config;
use crate::error::{Error, Result, SESSION_EXPIRED_MESSAGE};
use crate::models::{LoginCredentials, Registration, User};

use super::credentials::CredentialStore;
use super::storage::SecureStorage;
use super::token::{self, Identity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated,
    /// Last login or registration failed; signed out.
    Error,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Unauthenticated => write!(f, "Signed out"),
            SessionStatus::Authenticating => write!(f, "Signing in"),
            SessionStatus::Authenticated => write!(f, "Signed in"),
            SessionStatus::Error => write!(f, "Error"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    pub status: SessionStatus,
    /// An action is in progress.
    pub loading: bool,
    pub identity: Option<Identity>,
    /// Profile returned by the last login, if the backend sent one.
    pub user: Option<User>,
    pub last_error: Option<String>,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }
}

pub struct SessionController {
    api: ApiClient,
    credentials: Arc<CredentialStore>,
    state: Arc<watch::Sender<SessionState>>,
}

impl SessionController {
    /// Controller over `storage`, talking to the backend named in `config`.
    pub fn new(config: &Config, storage: Arc<dyn SecureStorage>) -> Result<Self> {
        let credentials = Arc::new(CredentialStore::new(storage));
        let api = ApiClient::from_config(config, credentials)?;
        Ok(Self::with_client(api))
    }

    /// Controller around an existing client. The client's session-expired
    /// hook is replaced so pipeline failures sign this controller out.
    pub fn with_client(api: ApiClient) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        let state = Arc::new(state);

        let hook_state = state.clone();
        let api = api.with_session_expired_hook(Arc::new(move || {
            hook_state.send_modify(|s| {
                s.status = SessionStatus::Unauthenticated;
                s.identity = None;
                s.user = None;
                s.last_error = Some(SESSION_EXPIRED_MESSAGE.to_string());
            });
        }));

        Self {
            credentials: api.credentials().clone(),
            api,
            state,
        }
    }

    /// Hydrate stored credentials and settle the initial status.
    pub fn init(&self) -> SessionStatus {
        self.check_auth_status()
    }

    /// Tear the context down. Stored tokens are kept for the next start.
    pub fn dispose(self) {
        self.state.send_replace(SessionState::default());
        debug!("Session controller disposed");
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.borrow().identity.clone()
    }

    /// Client for protected resource calls.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> Result<()> {
        if let Err(e) = credentials.validate() {
            return Err(self.fail(e.into()));
        }

        self.state.send_modify(|s| {
            s.status = SessionStatus::Authenticating;
            s.loading = true;
            s.last_error = None;
        });

        match self.api.login(credentials).await {
            Ok(auth) => {
                let identity = token::identity_of(&auth.access_token);
                debug!(user_id = ?identity.as_ref().map(|i| &i.user_id), "Identity decoded");
                self.state.send_modify(|s| {
                    s.status = SessionStatus::Authenticated;
                    s.loading = false;
                    s.identity = identity;
                    s.user = auth.user;
                    s.last_error = None;
                });
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Create an account. The session stays signed out; call `login` next.
    pub async fn register(&self, registration: &Registration) -> Result<()> {
        if let Err(e) = registration.validate() {
            return Err(self.fail(e.into()));
        }

        self.state.send_modify(|s| {
            s.loading = true;
            s.last_error = None;
        });

        match self.api.register(registration).await {
            Ok(()) => {
                self.state.send_modify(|s| s.loading = false);
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Sign out. Always ends signed out, whatever the server says.
    ///
    /// The signed-out state is published before the tokens are deleted.
    pub async fn logout(&self) {
        self.state.send_modify(|s| s.loading = true);
        self.api.revoke_session().await;
        self.state.send_replace(SessionState::default());
        self.credentials.clear();
        info!("Logged out");
    }

    /// Settle the status from stored credentials without touching the network.
    ///
    /// An expired token counts as signed out here; the pipeline's refresh gets
    /// its chance on the next request.
    pub fn check_auth_status(&self) -> SessionStatus {
        self.state.send_modify(|s| s.loading = true);
        self.credentials.initialize();

        let valid_token = self
            .credentials
            .access_token()
            .filter(|t| !token::is_expired(t));

        self.state.send_modify(|s| {
            s.loading = false;
            match valid_token {
                Some(ref t) => {
                    s.status = SessionStatus::Authenticated;
                    s.identity = token::identity_of(t);
                }
                None => {
                    s.status = SessionStatus::Unauthenticated;
                    s.identity = None;
                    s.user = None;
                }
            }
        });

        let status = self.state.borrow().status;
        debug!(%status, "Auth status checked");
        status
    }

    pub fn clear_error(&self) {
        self.state.send_modify(|s| s.last_error = None);
    }

    fn fail(&self, error: Error) -> Error {
        let message = error.to_string();
        warn!(error = %message, "Session action failed");
        self.state.send_modify(|s| {
            s.status = SessionStatus::Error;
            s.loading = false;
            s.identity = None;
            s.user = None;
            s.last_error = Some(message);
        });
        error
    }
}
