//! The one place that knows who is signed in.
//!
//! [`SessionSynchronizer`] listens to the auth client's change
//! notifications and keeps a derived [`SessionState`] in a watch channel.
//! Every notification carries a sequence number; only notifications newer
//! than the last one applied are taken, so a late-arriving event can never
//! put back an identity that has since been replaced.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use ideasync_backend::{AuthBackend, DataBackend, SessionTokens, SignUpOutcome};
use ideasync_types::api::{Session, UserMetadata};
use ideasync_types::models::{Role, User};

use crate::error::{AppError, Result};
use crate::validation::validate_credentials;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Startup session lookup still outstanding.
    Loading,
    SignedOut,
    SignedIn(User),
}

impl SessionState {
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::SignedIn(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Keeps the auth listener alive. Dropping it stops the listener.
pub struct SessionSubscription {
    task: JoinHandle<()>,
}

impl SessionSubscription {
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct SessionSynchronizer {
    auth: Arc<dyn AuthBackend>,
    data: Arc<dyn DataBackend>,
    state: watch::Sender<SessionState>,
    /// Sequence of the last notification or snapshot applied. `None` until
    /// the first one lands.
    applied: Mutex<Option<u64>>,
}

impl SessionSynchronizer {
    pub fn new(auth: Arc<dyn AuthBackend>, data: Arc<dyn DataBackend>) -> Arc<Self> {
        let (state, _) = watch::channel(SessionState::Loading);
        Arc::new(Self {
            auth,
            data,
            state,
            applied: Mutex::new(None),
        })
    }

    /// Subscribe to auth changes, then load the current session. The state
    /// stays [`SessionState::Loading`] until that lookup completes.
    pub async fn start(self: &Arc<Self>) -> SessionSubscription {
        let mut events = self.auth.subscribe();
        let sync = Arc::clone(self);

        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        debug!("Auth notification #{} {:?}", event.sequence, event.change);
                        sync.apply(event.sequence, event.session).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Session listener skipped {} notifications, re-reading session", skipped);
                        sync.resync().await;
                    }
                    Err(RecvError::Closed) => {
                        debug!("Auth notifications closed");
                        break;
                    }
                }
            }
        });

        self.resync().await;
        SessionSubscription { task }
    }

    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn changes(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Wait out the startup lookup.
    pub async fn ready(&self) -> SessionState {
        let mut rx = self.state.subscribe();
        match rx.wait_for(|state| !state.is_loading()).await {
            Ok(state) => state.clone(),
            Err(_) => self.current(),
        }
    }

    pub fn require_user(&self) -> Result<User> {
        self.user().ok_or(AppError::NotSignedIn)
    }

    pub fn require_role(&self, role: Role) -> Result<User> {
        let user = self.require_user()?;
        if user.role != role {
            return Err(AppError::WrongRole(role));
        }
        Ok(user)
    }

    /// Sign in. The resulting identity is applied from the auth client's
    /// notification (or its session snapshot), never from this call's reply.
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        validate_credentials(email, password)?;
        self.auth.sign_in_with_password(email.trim(), password).await?;
        self.resync().await;
        Ok(())
    }

    pub async fn register(&self, email: &str, password: &str, name: &str, role: Role) -> Result<SignUpOutcome> {
        let metadata = UserMetadata {
            name: Some(name.trim().to_string()),
            role: Some(role.as_str().to_string()),
        };
        let outcome = self.auth.sign_up(email.trim(), password, metadata).await?;
        if outcome == SignUpOutcome::SignedIn {
            self.resync().await;
        }
        Ok(outcome)
    }

    /// End the session. Local identity is cleared even when the backend
    /// cannot be told; calling this while signed out is a no-op.
    pub async fn logout(&self) -> Result<()> {
        if let Err(e) = self.auth.sign_out().await {
            warn!("Backend sign-out failed, clearing local session anyway: {}", e);
        }

        // Anything queued from before the sign-out is now stale
        let snapshot = self.auth.get_session().await.ok();
        let mut applied = self.applied.lock().await;
        if let Some(snapshot) = snapshot {
            *applied = Some(applied.map_or(snapshot.sequence, |last| last.max(snapshot.sequence)));
        }
        if self.state.borrow().user().is_some() {
            info!("Signed out");
        }
        self.state.send_replace(SessionState::SignedOut);
        Ok(())
    }

    /// Install tokens delivered by a confirmation link.
    pub async fn install(&self, tokens: SessionTokens) -> Result<()> {
        self.auth.set_session(tokens).await?;
        self.resync().await;
        Ok(())
    }

    async fn resync(&self) {
        match self.auth.get_session().await {
            Ok(snapshot) => self.apply(snapshot.sequence, snapshot.session).await,
            Err(e) => {
                warn!("Could not read current session: {}", e);
                let applied = self.applied.lock().await;
                if applied.is_none() {
                    self.state.send_replace(SessionState::SignedOut);
                }
            }
        }
    }

    async fn apply(&self, sequence: u64, session: Option<Session>) {
        let mut applied = self.applied.lock().await;
        if applied.is_some_and(|last| sequence <= last) {
            debug!("Ignoring session state #{} (already at #{:?})", sequence, *applied);
            return;
        }

        let next = match session {
            Some(session) => match self.identity(&session).await {
                Some(user) => SessionState::SignedIn(user),
                None => SessionState::SignedOut,
            },
            None => SessionState::SignedOut,
        };

        *applied = Some(sequence);
        self.state.send_replace(next);
    }

    /// Project an auth session onto a [`User`]. `None` when no role can be
    /// established for the account.
    async fn identity(&self, session: &Session) -> Option<User> {
        let auth_user = &session.user;
        let metadata = &auth_user.user_metadata;
        let email = auth_user.email.clone().unwrap_or_default();

        let name = metadata
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

        let role = match metadata.role.as_deref().map(str::parse::<Role>) {
            Some(Ok(role)) => Some(role),
            declared => {
                if let Some(Err(e)) = declared {
                    debug!("User {}: {}, checking role table", auth_user.id, e);
                }
                match self.data.role_of(auth_user.id).await {
                    Ok(role) => role,
                    Err(e) => {
                        warn!("Role lookup for {} failed: {}", auth_user.id, e);
                        None
                    }
                }
            }
        };

        let Some(role) = role else {
            warn!("User {} has no role; treating as signed out", auth_user.id);
            return None;
        };

        Some(User {
            id: auth_user.id,
            email,
            name,
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::sync::broadcast;
    use uuid::Uuid;

    use ideasync_backend::{BackendError, NewMessage, SessionSnapshot};
    use ideasync_types::api::AuthUser;
    use ideasync_types::events::{AuthChange, AuthEvent};
    use ideasync_types::models::{Company, CompanyDraft, Investment, InvestmentStatus, Message, Profile};

    type BackendResult<T> = ideasync_backend::Result<T>;

    fn session(id: Uuid, email: &str, name: Option<&str>, role: Option<&str>) -> Session {
        Session {
            access_token: format!("token-{}", id),
            refresh_token: "refresh".to_string(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
            user: AuthUser {
                id,
                email: Some(email.to_string()),
                user_metadata: UserMetadata {
                    name: name.map(str::to_string),
                    role: role.map(str::to_string),
                },
                email_confirmed_at: Some(Utc::now()),
            },
        }
    }

    struct FakeAuth {
        events: broadcast::Sender<AuthEvent>,
        current: std::sync::Mutex<(u64, Option<Session>)>,
        fail_sign_out: bool,
    }

    impl FakeAuth {
        fn new(initial: Option<Session>) -> Arc<Self> {
            let (events, _) = broadcast::channel(16);
            Arc::new(Self {
                events,
                current: std::sync::Mutex::new((0, initial)),
                fail_sign_out: false,
            })
        }

        fn failing_sign_out() -> Arc<Self> {
            let (events, _) = broadcast::channel(16);
            Arc::new(Self {
                events,
                current: std::sync::Mutex::new((0, None)),
                fail_sign_out: true,
            })
        }

        fn emit(&self, change: AuthChange, session: Option<Session>) -> u64 {
            let mut current = self.current.lock().unwrap();
            current.0 += 1;
            current.1 = session.clone();
            let _ = self.events.send(AuthEvent {
                sequence: current.0,
                change,
                session,
            });
            current.0
        }
    }

    #[async_trait]
    impl AuthBackend for FakeAuth {
        fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
            self.events.subscribe()
        }

        async fn get_session(&self) -> BackendResult<SessionSnapshot> {
            let current = self.current.lock().unwrap();
            Ok(SessionSnapshot {
                sequence: current.0,
                session: current.1.clone(),
            })
        }

        async fn sign_in_with_password(&self, email: &str, _password: &str) -> BackendResult<()> {
            let s = session(Uuid::new_v4(), email, Some("Signed In"), Some("founder"));
            self.emit(AuthChange::SignedIn, Some(s));
            Ok(())
        }

        async fn sign_up(&self, _email: &str, _password: &str, _metadata: UserMetadata) -> BackendResult<SignUpOutcome> {
            Ok(SignUpOutcome::ConfirmationRequired { user_id: Uuid::new_v4() })
        }

        async fn sign_out(&self) -> BackendResult<()> {
            if self.fail_sign_out {
                return Err(BackendError::api(503, "Service temporarily unavailable"));
            }
            if self.current.lock().unwrap().1.is_some() {
                self.emit(AuthChange::SignedOut, None);
            }
            Ok(())
        }

        async fn set_session(&self, _tokens: SessionTokens) -> BackendResult<()> {
            Ok(())
        }

        async fn refresh_session(&self) -> BackendResult<()> {
            Ok(())
        }

        async fn update_user(&self, _metadata: UserMetadata) -> BackendResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RolesOnly {
        roles: HashMap<Uuid, Role>,
    }

    #[async_trait]
    impl DataBackend for RolesOnly {
        async fn list_companies(&self) -> BackendResult<Vec<Company>> {
            Ok(vec![])
        }
        async fn companies_by_founder(&self, _founder_id: Uuid) -> BackendResult<Vec<Company>> {
            Ok(vec![])
        }
        async fn companies_by_ids(&self, _ids: &[Uuid]) -> BackendResult<Vec<Company>> {
            Ok(vec![])
        }
        async fn get_company(&self, _id: Uuid) -> BackendResult<Option<Company>> {
            Ok(None)
        }
        async fn insert_company(&self, _founder_id: Uuid, _draft: &CompanyDraft) -> BackendResult<Company> {
            Err(BackendError::NotAuthenticated)
        }
        async fn update_company(&self, _id: Uuid, _founder_id: Uuid, _draft: &CompanyDraft) -> BackendResult<Option<Company>> {
            Ok(None)
        }
        async fn investments_for(&self, _investor_id: Uuid, _status: InvestmentStatus) -> BackendResult<Vec<Investment>> {
            Ok(vec![])
        }
        async fn upsert_investment(
            &self,
            _company_id: Uuid,
            _investor_id: Uuid,
            _status: InvestmentStatus,
            _amount: u64,
        ) -> BackendResult<Investment> {
            Err(BackendError::NotAuthenticated)
        }
        async fn delete_investment(&self, _company_id: Uuid, _investor_id: Uuid, _status: InvestmentStatus) -> BackendResult<usize> {
            Ok(0)
        }
        async fn messages_for(&self, _user_id: Uuid) -> BackendResult<Vec<Message>> {
            Ok(vec![])
        }
        async fn insert_message(&self, _message: &NewMessage) -> BackendResult<Message> {
            Err(BackendError::NotAuthenticated)
        }
        async fn mark_message_read(&self, _id: Uuid, _recipient_id: Uuid) -> BackendResult<bool> {
            Ok(false)
        }
        async fn profiles_by_ids(&self, _ids: &[Uuid]) -> BackendResult<Vec<Profile>> {
            Ok(vec![])
        }
        async fn role_of(&self, user_id: Uuid) -> BackendResult<Option<Role>> {
            Ok(self.roles.get(&user_id).copied())
        }
    }

    fn synchronizer(auth: Arc<FakeAuth>, data: RolesOnly) -> Arc<SessionSynchronizer> {
        SessionSynchronizer::new(auth, Arc::new(data))
    }

    #[tokio::test]
    async fn starts_loading_then_applies_snapshot() {
        let id = Uuid::new_v4();
        let auth = FakeAuth::new(Some(session(id, "ann@x.com", Some("Ann"), Some("founder"))));
        let sync = synchronizer(auth, RolesOnly::default());
        assert!(sync.current().is_loading());

        let _sub = sync.start().await;
        let user = sync.user().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.name, "Ann");
        assert_eq!(user.role, Role::Founder);
    }

    #[tokio::test]
    async fn stale_notifications_are_ignored() {
        let auth = FakeAuth::new(None);
        let sync = synchronizer(auth, RolesOnly::default());

        let newer = session(Uuid::new_v4(), "new@x.com", Some("New"), Some("investor"));
        let older = session(Uuid::new_v4(), "old@x.com", Some("Old"), Some("founder"));
        sync.apply(5, Some(newer)).await;
        sync.apply(3, Some(older)).await;
        sync.apply(5, None).await;

        assert_eq!(sync.user().unwrap().email, "new@x.com");

        sync.apply(6, None).await;
        assert_eq!(sync.current(), SessionState::SignedOut);
    }

    #[tokio::test]
    async fn name_falls_back_to_email_local_part() {
        let auth = FakeAuth::new(Some(session(Uuid::new_v4(), "grace@navy.mil", None, Some("investor"))));
        let sync = synchronizer(auth, RolesOnly::default());
        let _sub = sync.start().await;
        assert_eq!(sync.user().unwrap().name, "grace");
    }

    #[tokio::test]
    async fn role_comes_from_role_table_when_metadata_lacks_it() {
        let id = Uuid::new_v4();
        let auth = FakeAuth::new(Some(session(id, "kim@x.com", Some("Kim"), Some("admin"))));
        let mut data = RolesOnly::default();
        data.roles.insert(id, Role::Investor);

        let sync = synchronizer(auth, data);
        let _sub = sync.start().await;
        assert_eq!(sync.user().unwrap().role, Role::Investor);
    }

    #[tokio::test]
    async fn user_without_any_role_is_signed_out() {
        let auth = FakeAuth::new(Some(session(Uuid::new_v4(), "x@x.com", Some("X"), None)));
        let sync = synchronizer(auth, RolesOnly::default());
        let _sub = sync.start().await;
        assert_eq!(sync.current(), SessionState::SignedOut);
    }

    #[tokio::test]
    async fn listener_follows_notifications() {
        let auth = FakeAuth::new(None);
        let sync = synchronizer(auth.clone(), RolesOnly::default());
        let _sub = sync.start().await;
        assert_eq!(sync.current(), SessionState::SignedOut);

        let mut changes = sync.changes();
        auth.emit(
            AuthChange::SignedIn,
            Some(session(Uuid::new_v4(), "lu@x.com", Some("Lu"), Some("founder"))),
        );
        let state = tokio::time::timeout(
            Duration::from_secs(5),
            changes.wait_for(|s| s.user().is_some()),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(state.user().unwrap().email, "lu@x.com");

        auth.emit(AuthChange::SignedOut, None);
        tokio::time::timeout(
            Duration::from_secs(5),
            changes.wait_for(|s| *s == SessionState::SignedOut),
        )
        .await
        .unwrap()
        .unwrap();
    }

    #[tokio::test]
    async fn login_settles_identity_before_returning() {
        let auth = FakeAuth::new(None);
        let sync = synchronizer(auth, RolesOnly::default());
        let _sub = sync.start().await;

        sync.login("ann@x.com", "pw123456").await.unwrap();
        assert_eq!(sync.user().unwrap().email, "ann@x.com");

        let err = sync.login("", "").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let auth = FakeAuth::new(Some(session(Uuid::new_v4(), "a@x.com", Some("A"), Some("founder"))));
        let sync = synchronizer(auth, RolesOnly::default());
        let _sub = sync.start().await;
        assert!(sync.user().is_some());

        sync.logout().await.unwrap();
        assert_eq!(sync.current(), SessionState::SignedOut);
        sync.logout().await.unwrap();
        assert_eq!(sync.current(), SessionState::SignedOut);
    }

    #[tokio::test]
    async fn logout_clears_locally_when_backend_fails() {
        let auth = FakeAuth::failing_sign_out();
        let sync = synchronizer(auth, RolesOnly::default());
        sync.apply(1, Some(session(Uuid::new_v4(), "a@x.com", Some("A"), Some("founder"))))
            .await;
        assert!(sync.user().is_some());

        sync.logout().await.unwrap();
        assert_eq!(sync.current(), SessionState::SignedOut);
    }

    #[tokio::test]
    async fn dropping_the_subscription_stops_the_listener() {
        let auth = FakeAuth::new(None);
        let sync = synchronizer(auth.clone(), RolesOnly::default());
        let sub = sync.start().await;
        assert!(sub.is_active());
        assert_eq!(auth.events.receiver_count(), 1);

        drop(sub);
        tokio::time::timeout(Duration::from_secs(5), async {
            while auth.events.receiver_count() > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn role_checks() {
        let auth = FakeAuth::new(Some(session(Uuid::new_v4(), "f@x.com", Some("F"), Some("founder"))));
        let sync = synchronizer(auth, RolesOnly::default());
        assert!(matches!(sync.require_user(), Err(AppError::NotSignedIn)));

        let _sub = sync.start().await;
        assert!(sync.require_role(Role::Founder).is_ok());
        assert!(matches!(sync.require_role(Role::Investor), Err(AppError::WrongRole(Role::Investor))));
    }
}
