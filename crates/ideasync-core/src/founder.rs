use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use ideasync_backend::DataBackend;
use ideasync_types::models::{Company, CompanyDraft, Role};

use crate::error::{AppError, Result};
use crate::routes::Route;
use crate::session::SessionSynchronizer;
use crate::validation::validate_company;

pub const UNKNOWN_USER: &str = "Unknown user";

/// Outcome of opening the edit form for a company.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditAccess {
    Granted(Company),
    /// Carries no company data: the caller only learns where to go.
    Denied { redirect: Route, reason: &'static str },
}

/// Another founder working in one of my sectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FounderCard {
    pub founder_id: Uuid,
    pub name: String,
    pub company: String,
    pub sector: String,
}

pub struct FounderService {
    session: Arc<SessionSynchronizer>,
    data: Arc<dyn DataBackend>,
}

impl FounderService {
    pub fn new(session: Arc<SessionSynchronizer>, data: Arc<dyn DataBackend>) -> Self {
        Self { session, data }
    }

    pub async fn my_companies(&self) -> Result<Vec<Company>> {
        let me = self.session.require_role(Role::Founder)?;
        Ok(self.data.companies_by_founder(me.id).await?)
    }

    pub async fn create_company(&self, draft: &CompanyDraft) -> Result<Company> {
        let me = self.session.require_role(Role::Founder)?;
        validate_company(draft)?;

        let company = self.data.insert_company(me.id, draft).await?;
        info!("Founder {} listed company {}", me.id, company.id);
        Ok(company)
    }

    pub async fn load_for_edit(&self, id: Uuid) -> Result<EditAccess> {
        let me = self.session.require_role(Role::Founder)?;

        match self.data.get_company(id).await? {
            None => Ok(EditAccess::Denied {
                redirect: Route::FounderDashboard,
                reason: "Company not found",
            }),
            Some(company) if !company.is_owned_by(me.id) => {
                warn!("Founder {} tried to edit company {} owned by someone else", me.id, id);
                Ok(EditAccess::Denied {
                    redirect: Route::FounderDashboard,
                    reason: "You don't have permission to edit this company",
                })
            }
            Some(company) => Ok(EditAccess::Granted(company)),
        }
    }

    /// Update a company I own. Ownership is checked here first; a row the
    /// backend then refuses to touch is reported the same way.
    pub async fn update_company(&self, id: Uuid, draft: &CompanyDraft) -> Result<Company> {
        let me = self.session.require_role(Role::Founder)?;
        validate_company(draft)?;

        let current = self
            .data
            .get_company(id)
            .await?
            .ok_or(AppError::NotFound("Company"))?;
        if !current.is_owned_by(me.id) {
            return Err(AppError::Forbidden("You don't have permission to edit this company"));
        }

        match self.data.update_company(id, me.id, draft).await? {
            Some(company) => {
                info!("Founder {} updated company {}", me.id, id);
                Ok(company)
            }
            None => Err(AppError::Forbidden("You don't have permission to edit this company")),
        }
    }

    /// Founders of other companies in the sectors I work in.
    pub async fn other_founders(&self) -> Result<Vec<FounderCard>> {
        let me = self.session.require_role(Role::Founder)?;
        let companies = self.data.list_companies().await?;

        let my_sectors: HashSet<&str> = companies
            .iter()
            .filter(|c| c.is_owned_by(me.id))
            .map(|c| c.sector.as_str())
            .collect();
        let peers: Vec<&Company> = companies
            .iter()
            .filter(|c| !c.is_owned_by(me.id) && my_sectors.contains(c.sector.as_str()))
            .collect();
        if peers.is_empty() {
            return Ok(vec![]);
        }

        let mut founder_ids: Vec<Uuid> = peers.iter().map(|c| c.founder_id).collect();
        founder_ids.sort();
        founder_ids.dedup();
        let names: HashMap<Uuid, String> = self
            .data
            .profiles_by_ids(&founder_ids)
            .await?
            .into_iter()
            .filter(|p| !p.name.trim().is_empty())
            .map(|p| (p.id, p.name))
            .collect();

        Ok(peers
            .into_iter()
            .map(|c| FounderCard {
                founder_id: c.founder_id,
                name: names
                    .get(&c.founder_id)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_USER.to_string()),
                company: c.name.clone(),
                sector: c.sector.clone(),
            })
            .collect())
    }
}
