//! Page resolution: route, then guard, then whatever data the page shows.

use tracing::{debug, warn};
use uuid::Uuid;

use ideasync_types::models::{Company, CompanyDraft, InvestorProfile, User};

use crate::app::App;
use crate::confirm::{ConfirmOutcome, confirm_email};
use crate::discovery::{CompanyFilter, sectors};
use crate::error::{AppError, Result};
use crate::founder::{EditAccess, FounderCard};
use crate::guard::{Gate, gate};
use crate::investor::SavedView;
use crate::messaging::InboxView;
use crate::routes::Route;
use crate::session::SessionState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FounderDashboard {
    pub user: User,
    pub companies: Vec<Company>,
    pub other_founders: Vec<FounderCard>,
    pub inbox: InboxView,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvestorDashboard {
    pub user: User,
    pub companies: Vec<Company>,
    pub sectors: Vec<String>,
    pub saved: SavedView,
    pub profile: InvestorProfile,
    pub inbox: InboxView,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageView {
    Home { user: Option<User> },
    SignIn,
    Register,
    ConfirmEmail(ConfirmOutcome),
    FounderDashboard(FounderDashboard),
    NewCompany { draft: CompanyDraft },
    EditCompany { company_id: Uuid, draft: CompanyDraft },
    InvestorDashboard(InvestorDashboard),
    NotFound { path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visit {
    /// Session still loading.
    Wait,
    Redirect(Route),
    Page(PageView),
}

impl App {
    /// Resolve `path` for whoever is signed in right now. `path` may carry
    /// a fragment, which only the confirmation page reads.
    pub async fn visit(&self, path: &str) -> Result<Visit> {
        let route = Route::parse(path);
        let state = self.session.current();

        match gate(&state, &route) {
            Gate::Wait => return Ok(Visit::Wait),
            Gate::RedirectTo(target) => {
                debug!("{} redirected to {}", route, target);
                return Ok(Visit::Redirect(target));
            }
            Gate::Render => {}
        }

        match self.load(route, &state, path).await {
            // Session changed under us between the gate and the data load
            Err(e) if e.is_authorization() => {
                warn!("Access lost while loading {}: {}", path, e);
                Ok(Visit::Redirect(redirect_for(&e)))
            }
            other => other,
        }
    }

    async fn load(&self, route: Route, state: &SessionState, path: &str) -> Result<Visit> {
        let page = match route {
            Route::Home => PageView::Home {
                user: state.user().cloned(),
            },
            Route::SignIn => PageView::SignIn,
            Route::Register => PageView::Register,
            Route::ConfirmEmail => {
                let fragment = path.split_once('#').map(|(_, f)| f).unwrap_or_default();
                match confirm_email(&self.session, fragment).await {
                    ConfirmOutcome::Redirect(target) => return Ok(Visit::Redirect(target)),
                    outcome => PageView::ConfirmEmail(outcome),
                }
            }
            Route::FounderDashboard => {
                let user = self.session.require_user()?;
                PageView::FounderDashboard(FounderDashboard {
                    user,
                    companies: self.founder.my_companies().await?,
                    other_founders: self.founder.other_founders().await?,
                    inbox: self.messaging.inbox().await?,
                })
            }
            Route::NewCompany => PageView::NewCompany {
                draft: CompanyDraft::default(),
            },
            Route::EditCompany(id) => match self.founder.load_for_edit(id).await? {
                EditAccess::Granted(company) => PageView::EditCompany {
                    company_id: company.id,
                    draft: CompanyDraft::from(&company),
                },
                EditAccess::Denied { redirect, reason } => {
                    warn!("Edit of company {} refused: {}", id, reason);
                    return Ok(Visit::Redirect(redirect));
                }
            },
            Route::InvestorDashboard => {
                let user = self.session.require_user()?;
                let companies = self.investor.discover(&CompanyFilter::default()).await?;
                PageView::InvestorDashboard(InvestorDashboard {
                    user,
                    sectors: sectors(&companies),
                    companies,
                    saved: self.investor.saved_companies().await?,
                    profile: self.investor.load_profile().await?,
                    inbox: self.messaging.inbox().await?,
                })
            }
            Route::ResetPassword | Route::NotFound(_) => PageView::NotFound { path: route.path() },
        };

        Ok(Visit::Page(page))
    }
}

fn redirect_for(err: &AppError) -> Route {
    match err {
        AppError::WrongRole(role) => Route::dashboard_for(role.other()),
        AppError::Forbidden(_) => Route::Home,
        _ => Route::SignIn,
    }
}
