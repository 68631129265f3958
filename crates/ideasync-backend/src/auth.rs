use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};
use uuid::Uuid;

use ideasync_types::api::{
    AuthUser, PasswordGrantRequest, RefreshGrantRequest, Session, SignUpRequest, SignUpResponse,
    TokenResponse, UpdateUserRequest, UserMetadata,
};
use ideasync_types::events::{AuthChange, AuthEvent};

use crate::config::BackendConfig;
use crate::error::{BackendError, Result};
use crate::http::{HttpClient, check};

/// Lifetime assumed for a session installed from bare tokens.
const DEFAULT_SESSION_TTL_SECS: i64 = 3600;

/// Where the client persists its session between runs.
pub trait SessionStorage: Send + Sync {
    fn load(&self) -> anyhow::Result<Option<Session>>;
    fn store(&self, session: &Session) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;
}

/// Current session together with the sequence of the last notification that
/// produced it.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub sequence: u64,
    pub session: Option<Session>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// Account exists but no session until the confirmation link is followed.
    ConfirmationRequired { user_id: Uuid },
    /// Backend signed the new user in directly.
    SignedIn,
}

/// Tokens delivered out of band (confirmation link fragment).
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Authentication operations the application depends on.
///
/// Successful sign-in style calls report the new session only through
/// [`AuthBackend::subscribe`]; callers must not read identity off the
/// return value.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;

    async fn get_session(&self) -> Result<SessionSnapshot>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<()>;

    async fn sign_up(&self, email: &str, password: &str, metadata: UserMetadata) -> Result<SignUpOutcome>;

    /// Terminate the session. Never fails when nobody is signed in.
    async fn sign_out(&self) -> Result<()>;

    async fn set_session(&self, tokens: SessionTokens) -> Result<()>;

    async fn refresh_session(&self) -> Result<()>;

    async fn update_user(&self, metadata: UserMetadata) -> Result<()>;
}

struct AuthState {
    /// Storage has been consulted at least once.
    loaded: bool,
    session: Option<Session>,
    sequence: u64,
}

/// Session owner for one backend project. All session transitions happen
/// under `state`, which is what makes event sequence numbers meaningful.
pub struct AuthClient {
    http: HttpClient,
    storage: Option<Arc<dyn SessionStorage>>,
    state: Mutex<AuthState>,
    events: broadcast::Sender<AuthEvent>,
}

impl AuthClient {
    pub fn new(config: &BackendConfig, storage: Option<Arc<dyn SessionStorage>>) -> Result<Self> {
        let (events, _) = broadcast::channel(64);
        Ok(Self {
            http: HttpClient::new(config)?,
            storage,
            state: Mutex::new(AuthState {
                loaded: false,
                session: None,
                sequence: 0,
            }),
            events,
        })
    }

    pub(crate) fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Access token for the current user, refreshed first when close to
    /// expiry. `None` when signed out.
    pub async fn access_token(&self) -> Result<Option<String>> {
        let mut state = self.state.lock().await;
        self.load_stored(&mut state);
        self.ensure_fresh(&mut state).await?;
        Ok(state.session.as_ref().map(|s| s.access_token.clone()))
    }

    fn load_stored(&self, state: &mut AuthState) {
        if state.loaded {
            return;
        }
        state.loaded = true;

        let stored = match &self.storage {
            Some(storage) => storage.load().unwrap_or_else(|e| {
                warn!("Failed to read cached session: {:#}", e);
                None
            }),
            None => None,
        };

        if let Some(session) = stored {
            debug!("Restored cached session for {}", session.user.id);
            self.publish(state, AuthChange::InitialSession, Some(session));
        }
    }

    /// Refresh an expiring session. A rejected refresh token ends the
    /// session; transport failures leave it in place and propagate.
    async fn ensure_fresh(&self, state: &mut AuthState) -> Result<()> {
        let Some(session) = &state.session else {
            return Ok(());
        };
        if !session.needs_refresh(Utc::now()) {
            return Ok(());
        }

        let refresh_token = session.refresh_token.clone();
        match self.refresh_grant(&refresh_token).await {
            Ok(fresh) => {
                self.commit(state, AuthChange::TokenRefreshed, Some(fresh));
                Ok(())
            }
            Err(e) if e.is_rejection() => {
                warn!("Session refresh rejected, signing out: {}", e);
                self.commit(state, AuthChange::SignedOut, None);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<Session> {
        let mut url = self.http.auth_url("token")?;
        url.query_pairs_mut().append_pair("grant_type", "refresh_token");

        let resp = self
            .http
            .request(Method::POST, url, None)
            .json(&RefreshGrantRequest {
                refresh_token: refresh_token.to_string(),
            })
            .send()
            .await?;
        let body: TokenResponse = check(resp).await?.json().await?;
        Ok(Session::from_token_response(body, Utc::now()))
    }

    async fn fetch_user(&self, access_token: &str) -> Result<AuthUser> {
        let url = self.http.auth_url("user")?;
        let resp = self
            .http
            .request(Method::GET, url, Some(access_token))
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    /// Install a new session state, persist it, and notify subscribers.
    fn commit(&self, state: &mut AuthState, change: AuthChange, session: Option<Session>) {
        if let Some(storage) = &self.storage {
            let persisted = match &session {
                Some(session) => storage.store(session),
                None => storage.clear(),
            };
            if let Err(e) = persisted {
                warn!("Failed to persist session change {:?}: {:#}", change, e);
            }
        }
        self.publish(state, change, session);
    }

    fn publish(&self, state: &mut AuthState, change: AuthChange, session: Option<Session>) {
        state.sequence += 1;
        state.session = session;

        let event = AuthEvent {
            sequence: state.sequence,
            change,
            session: state.session.clone(),
        };
        debug!("Auth change #{}: {:?}", event.sequence, change);

        // No receivers is fine; nobody is listening yet.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl AuthBackend for AuthClient {
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn get_session(&self) -> Result<SessionSnapshot> {
        let mut state = self.state.lock().await;
        self.load_stored(&mut state);
        self.ensure_fresh(&mut state).await?;

        Ok(SessionSnapshot {
            sequence: state.sequence,
            session: state.session.clone(),
        })
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<()> {
        let mut url = self.http.auth_url("token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let resp = self
            .http
            .request(Method::POST, url, None)
            .json(&PasswordGrantRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        let body: TokenResponse = check(resp).await?.json().await?;
        let session = Session::from_token_response(body, Utc::now());

        info!("Signed in as {}", session.user.id);
        let mut state = self.state.lock().await;
        state.loaded = true;
        self.commit(&mut state, AuthChange::SignedIn, Some(session));
        Ok(())
    }

    async fn sign_up(&self, email: &str, password: &str, metadata: UserMetadata) -> Result<SignUpOutcome> {
        let url = self.http.auth_url("signup")?;
        let resp = self
            .http
            .request(Method::POST, url, None)
            .json(&SignUpRequest {
                email: email.to_string(),
                password: password.to_string(),
                data: metadata,
            })
            .send()
            .await?;
        let body: SignUpResponse = check(resp).await?.json().await?;

        match body {
            SignUpResponse::Session(tokens) => {
                let session = Session::from_token_response(tokens, Utc::now());
                info!("Registered and signed in as {}", session.user.id);
                let mut state = self.state.lock().await;
                state.loaded = true;
                self.commit(&mut state, AuthChange::SignedIn, Some(session));
                Ok(SignUpOutcome::SignedIn)
            }
            SignUpResponse::PendingConfirmation(user) => {
                info!("Registered {}, awaiting email confirmation", user.id);
                Ok(SignUpOutcome::ConfirmationRequired { user_id: user.id })
            }
        }
    }

    async fn sign_out(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.load_stored(&mut state);

        let Some(session) = state.session.take() else {
            debug!("Sign-out requested with no active session");
            if let Some(storage) = &self.storage {
                if let Err(e) = storage.clear() {
                    warn!("Failed to clear cached session: {:#}", e);
                }
            }
            return Ok(());
        };

        let revoke = async {
            let url = self.http.auth_url("logout")?;
            let resp = self
                .http
                .request(Method::POST, url, Some(&session.access_token))
                .send()
                .await?;
            check(resp).await?;
            Ok::<_, BackendError>(())
        };
        // The local session ends regardless; an expired or already revoked
        // token is not the user's problem.
        if let Err(e) = revoke.await {
            warn!("Remote sign-out failed for {}: {}", session.user.id, e);
        }

        info!("Signed out {}", session.user.id);
        self.commit(&mut state, AuthChange::SignedOut, None);
        Ok(())
    }

    async fn set_session(&self, tokens: SessionTokens) -> Result<()> {
        let user = self.fetch_user(&tokens.access_token).await?;
        let session = Session {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens
                .expires_at
                .unwrap_or_else(|| Utc::now() + Duration::seconds(DEFAULT_SESSION_TTL_SECS)),
            user,
        };

        let mut state = self.state.lock().await;
        state.loaded = true;
        self.commit(&mut state, AuthChange::SignedIn, Some(session));
        Ok(())
    }

    async fn refresh_session(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.load_stored(&mut state);

        let refresh_token = state
            .session
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .ok_or(BackendError::NotAuthenticated)?;

        match self.refresh_grant(&refresh_token).await {
            Ok(fresh) => {
                self.commit(&mut state, AuthChange::TokenRefreshed, Some(fresh));
                Ok(())
            }
            Err(e) => {
                if e.is_rejection() {
                    self.commit(&mut state, AuthChange::SignedOut, None);
                }
                Err(e)
            }
        }
    }

    async fn update_user(&self, metadata: UserMetadata) -> Result<()> {
        let mut state = self.state.lock().await;
        self.load_stored(&mut state);
        self.ensure_fresh(&mut state).await?;

        let access_token = state
            .session
            .as_ref()
            .map(|s| s.access_token.clone())
            .ok_or(BackendError::NotAuthenticated)?;

        let url = self.http.auth_url("user")?;
        let resp = self
            .http
            .request(Method::PUT, url, Some(&access_token))
            .json(&UpdateUserRequest { data: metadata })
            .send()
            .await?;
        let user: AuthUser = check(resp).await?.json().await?;

        let mut session = state.session.clone().ok_or(BackendError::NotAuthenticated)?;
        session.user = user;
        self.commit(&mut state, AuthChange::UserUpdated, Some(session));
        Ok(())
    }
}
