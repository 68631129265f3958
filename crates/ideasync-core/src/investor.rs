use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use ideasync_backend::DataBackend;
use ideasync_types::models::{Company, Investment, InvestmentStatus, InvestorProfile, Role};

use crate::discovery::{CompanyFilter, filter_companies};
use crate::error::{AppError, Result};
use crate::session::SessionSynchronizer;
use crate::store::ProfileStore;
use crate::validation::{validate_investment, validate_investor_profile};

pub const NO_SAVED_COMPANIES: &str = "You haven't saved any companies yet.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SavedView {
    Empty(&'static str),
    Companies(Vec<Company>),
}

pub struct InvestorService {
    session: Arc<SessionSynchronizer>,
    data: Arc<dyn DataBackend>,
    profiles: Arc<dyn ProfileStore>,
}

impl InvestorService {
    pub fn new(session: Arc<SessionSynchronizer>, data: Arc<dyn DataBackend>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self {
            session,
            data,
            profiles,
        }
    }

    /// Every listed company, narrowed by `filter`.
    pub async fn discover(&self, filter: &CompanyFilter) -> Result<Vec<Company>> {
        self.session.require_role(Role::Investor)?;
        let companies = self.data.list_companies().await?;
        Ok(filter_companies(&companies, filter))
    }

    /// Bookmark a company. Saving an already saved company is a no-op.
    pub async fn save_company(&self, company_id: Uuid) -> Result<()> {
        let me = self.session.require_role(Role::Investor)?;
        self.data
            .upsert_investment(company_id, me.id, InvestmentStatus::Saved, 0)
            .await?;
        debug!("Investor {} saved company {}", me.id, company_id);
        Ok(())
    }

    /// Returns whether anything was removed.
    pub async fn unsave_company(&self, company_id: Uuid) -> Result<bool> {
        let me = self.session.require_role(Role::Investor)?;
        let removed = self
            .data
            .delete_investment(company_id, me.id, InvestmentStatus::Saved)
            .await?;
        Ok(removed > 0)
    }

    /// Saved companies, most recently saved first.
    pub async fn saved_companies(&self) -> Result<SavedView> {
        let me = self.session.require_role(Role::Investor)?;
        let saved = self.data.investments_for(me.id, InvestmentStatus::Saved).await?;
        if saved.is_empty() {
            return Ok(SavedView::Empty(NO_SAVED_COMPANIES));
        }

        let ids: Vec<Uuid> = saved.iter().map(|s| s.company_id).collect();
        let companies = self.data.companies_by_ids(&ids).await?;

        // Keep the save order; a company deleted since it was saved drops out
        let ordered: Vec<Company> = ids
            .iter()
            .filter_map(|id| companies.iter().find(|c| c.id == *id).cloned())
            .collect();
        if ordered.is_empty() {
            return Ok(SavedView::Empty(NO_SAVED_COMPANIES));
        }
        Ok(SavedView::Companies(ordered))
    }

    pub async fn invest(&self, company_id: Uuid, amount: u64) -> Result<Investment> {
        let me = self.session.require_role(Role::Investor)?;
        validate_investment(amount)?;

        self.data
            .get_company(company_id)
            .await?
            .ok_or(AppError::NotFound("Company"))?;
        let investment = self
            .data
            .upsert_investment(company_id, me.id, InvestmentStatus::Invested, amount)
            .await?;
        info!("Investor {} committed {} to company {}", me.id, amount, company_id);
        Ok(investment)
    }

    /// The stored draft, or defaults seeded from the signed-in user.
    pub async fn load_profile(&self) -> Result<InvestorProfile> {
        let me = self.session.require_role(Role::Investor)?;
        Ok(self
            .profiles
            .load(me.id)?
            .unwrap_or_else(|| InvestorProfile::defaults_for(&me.name)))
    }

    pub async fn save_profile(&self, profile: &InvestorProfile) -> Result<()> {
        let me = self.session.require_role(Role::Investor)?;
        validate_investor_profile(profile)?;

        let cleaned = InvestorProfile {
            full_name: profile.full_name.trim().to_string(),
            bio: profile.bio.trim().to_string(),
            linked_in: profile.linked_in.trim().to_string(),
            investment_focus: profile.investment_focus.trim().to_string(),
            ..profile.clone()
        };
        self.profiles.save(me.id, &cleaned)?;
        info!("Investor {} updated profile draft", me.id);
        Ok(())
    }
}
