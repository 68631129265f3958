use std::fmt;

use uuid::Uuid;

use ideasync_types::models::Role;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    SignIn,
    Register,
    ConfirmEmail,
    FounderDashboard,
    NewCompany,
    EditCompany(Uuid),
    InvestorDashboard,
    /// Target of password-recovery links. No page is served for it.
    ResetPassword,
    NotFound(String),
}

impl Route {
    /// Parse an app path. Query string, fragment and a trailing slash are
    /// ignored.
    pub fn parse(path: &str) -> Self {
        let path = path
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        let rest = trimmed.strip_prefix('/').unwrap_or(trimmed);

        let segments: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('/').collect()
        };
        match segments.as_slice() {
            [] => Self::Home,
            ["signin"] => Self::SignIn,
            ["register"] => Self::Register,
            ["confirm-email"] => Self::ConfirmEmail,
            ["reset-password"] => Self::ResetPassword,
            ["founder-dashboard"] => Self::FounderDashboard,
            ["founder-dashboard", "new-company"] => Self::NewCompany,
            ["founder-dashboard", "edit-company", id] => match id.parse() {
                Ok(id) => Self::EditCompany(id),
                Err(_) => Self::NotFound(path.to_string()),
            },
            ["investor-dashboard"] => Self::InvestorDashboard,
            _ => Self::NotFound(path.to_string()),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Self::Home => "/".to_string(),
            Self::SignIn => "/signin".to_string(),
            Self::Register => "/register".to_string(),
            Self::ConfirmEmail => "/confirm-email".to_string(),
            Self::FounderDashboard => "/founder-dashboard".to_string(),
            Self::NewCompany => "/founder-dashboard/new-company".to_string(),
            Self::EditCompany(id) => format!("/founder-dashboard/edit-company/{}", id),
            Self::InvestorDashboard => "/investor-dashboard".to_string(),
            Self::ResetPassword => "/reset-password".to_string(),
            Self::NotFound(path) => path.clone(),
        }
    }

    pub fn dashboard_for(role: Role) -> Self {
        match role {
            Role::Founder => Self::FounderDashboard,
            Role::Investor => Self::InvestorDashboard,
        }
    }

    /// Role a visitor must hold to see this route, if any.
    pub fn required_role(&self) -> Option<Role> {
        match self {
            Self::FounderDashboard | Self::NewCompany | Self::EditCompany(_) => Some(Role::Founder),
            Self::InvestorDashboard => Some(Role::Investor),
            _ => None,
        }
    }

    /// Pages that only make sense while signed out.
    pub fn is_guest_only(&self) -> bool {
        matches!(self, Self::SignIn | Self::Register)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_paths() {
        assert_eq!(Route::parse("/"), Route::Home);
        assert_eq!(Route::parse(""), Route::Home);
        assert_eq!(Route::parse("/signin/"), Route::SignIn);
        assert_eq!(Route::parse("/register?ref=home"), Route::Register);
        assert_eq!(Route::parse("/confirm-email#access_token=abc"), Route::ConfirmEmail);
        assert_eq!(Route::parse("/founder-dashboard/new-company"), Route::NewCompany);
        assert_eq!(Route::parse("/investor-dashboard"), Route::InvestorDashboard);
    }

    #[test]
    fn leading_slash_is_optional() {
        assert_eq!(Route::parse("investor-dashboard"), Route::InvestorDashboard);
        assert_eq!(Route::parse("founder-dashboard/new-company/"), Route::NewCompany);
        assert_eq!(Route::parse("signin?next=x"), Route::SignIn);
        assert!(matches!(Route::parse("admin"), Route::NotFound(_)));
    }

    #[test]
    fn edit_route_carries_company_id() {
        let id = Uuid::new_v4();
        let route = Route::parse(&format!("/founder-dashboard/edit-company/{}", id));
        assert_eq!(route, Route::EditCompany(id));
        assert_eq!(Route::parse(&route.path()), route);

        assert!(matches!(
            Route::parse("/founder-dashboard/edit-company/not-a-uuid"),
            Route::NotFound(_)
        ));
    }

    #[test]
    fn unknown_paths_are_not_found() {
        assert_eq!(Route::parse("/admin"), Route::NotFound("/admin".to_string()));
        assert!(matches!(Route::parse("/founder-dashboard/settings"), Route::NotFound(_)));
    }

    #[test]
    fn role_requirements() {
        assert_eq!(Route::EditCompany(Uuid::nil()).required_role(), Some(Role::Founder));
        assert_eq!(Route::InvestorDashboard.required_role(), Some(Role::Investor));
        assert_eq!(Route::Home.required_role(), None);
        assert_eq!(Route::dashboard_for(Role::Investor), Route::InvestorDashboard);
    }
}
