use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use ideasync_backend::SessionStorage;
use ideasync_db::Database;
use ideasync_types::api::Session;
use ideasync_types::models::InvestorProfile;

/// Device-local investor profile drafts, keyed by user.
pub trait ProfileStore: Send + Sync {
    fn load(&self, user_id: Uuid) -> Result<Option<InvestorProfile>>;
    fn save(&self, user_id: Uuid, profile: &InvestorProfile) -> Result<()>;
}

impl ProfileStore for Database {
    fn load(&self, user_id: Uuid) -> Result<Option<InvestorProfile>> {
        self.load_investor_profile(user_id)
    }

    fn save(&self, user_id: Uuid, profile: &InvestorProfile) -> Result<()> {
        self.save_investor_profile(user_id, profile)
    }
}

/// Session cache backed by the local database.
#[derive(Clone)]
pub struct LocalSessionStorage(pub Arc<Database>);

impl SessionStorage for LocalSessionStorage {
    fn load(&self) -> Result<Option<Session>> {
        self.0.load_session()
    }

    fn store(&self, session: &Session) -> Result<()> {
        self.0.store_session(session)
    }

    fn clear(&self) -> Result<()> {
        self.0.clear_session()
    }
}
