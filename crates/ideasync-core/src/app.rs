use std::sync::Arc;

use ideasync_backend::{
    AuthBackend, AuthClient, BackendConfig, DataBackend, DataClient, SessionStorage, SignUpOutcome,
};
use ideasync_db::Database;

use crate::confirm::{ConfirmOutcome, confirm_email};
use crate::error::Result;
use crate::founder::FounderService;
use crate::investor::InvestorService;
use crate::messaging::MessagingService;
use crate::session::{SessionSubscription, SessionSynchronizer};
use crate::store::{LocalSessionStorage, ProfileStore};
use crate::validation::{Registration, validate_registration};

/// Application root: one session, and the services that read it.
pub struct App {
    pub session: Arc<SessionSynchronizer>,
    pub founder: FounderService,
    pub investor: InvestorService,
    pub messaging: MessagingService,
    subscription: Option<SessionSubscription>,
}

impl App {
    pub fn new(auth: Arc<dyn AuthBackend>, data: Arc<dyn DataBackend>, profiles: Arc<dyn ProfileStore>) -> Self {
        let session = SessionSynchronizer::new(auth, data.clone());
        Self {
            founder: FounderService::new(session.clone(), data.clone()),
            investor: InvestorService::new(session.clone(), data.clone(), profiles),
            messaging: MessagingService::new(session.clone(), data),
            session,
            subscription: None,
        }
    }

    /// Wire the HTTP clients to the hosted backend, caching the session in
    /// `db`.
    pub fn connect(config: &BackendConfig, db: Arc<Database>) -> Result<Self> {
        let storage: Arc<dyn SessionStorage> = Arc::new(LocalSessionStorage(db.clone()));
        let auth = Arc::new(AuthClient::new(config, Some(storage))?);
        let data = Arc::new(DataClient::new(auth.clone()));
        Ok(Self::new(auth, data, db))
    }

    /// Start following auth changes. Idempotent.
    pub async fn start(&mut self) {
        if self.subscription.is_none() {
            self.subscription = Some(self.session.start().await);
        }
    }

    pub async fn register(&self, form: &Registration) -> Result<SignUpOutcome> {
        validate_registration(form)?;
        self.session
            .register(&form.email, &form.password, &form.name, form.role)
            .await
    }

    pub async fn confirm_email(&self, fragment: &str) -> ConfirmOutcome {
        confirm_email(&self.session, fragment).await
    }
}
