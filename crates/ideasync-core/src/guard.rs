use ideasync_types::models::{Role, User};

use crate::routes::Route;
use crate::session::SessionState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Render,
    RedirectTo(Route),
}

/// Decide whether `identity` may see a page reserved for `required`.
pub fn guard(identity: Option<&User>, required: Role) -> Access {
    match identity {
        None => Access::RedirectTo(Route::SignIn),
        Some(user) if user.role != required => Access::RedirectTo(Route::dashboard_for(required.other())),
        Some(_) => Access::Render,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// Session still loading; render nothing role-gated yet.
    Wait,
    Render,
    RedirectTo(Route),
}

/// [`guard`] over the live session state, covering every route: routes
/// without a role always render, except that sign-in and registration
/// send an authenticated user to their dashboard.
pub fn gate(state: &SessionState, route: &Route) -> Gate {
    if let Some(required) = route.required_role() {
        if state.is_loading() {
            return Gate::Wait;
        }
        return match guard(state.user(), required) {
            Access::Render => Gate::Render,
            Access::RedirectTo(target) => Gate::RedirectTo(target),
        };
    }

    if route.is_guest_only() {
        return match state {
            SessionState::Loading => Gate::Wait,
            SessionState::SignedIn(user) => Gate::RedirectTo(Route::dashboard_for(user.role)),
            SessionState::SignedOut => Gate::Render,
        };
    }

    Gate::Render
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            email: "u@x.com".into(),
            name: "U".into(),
            role,
        }
    }

    #[test]
    fn guard_rules() {
        assert_eq!(guard(None, Role::Founder), Access::RedirectTo(Route::SignIn));
        assert_eq!(
            guard(Some(&user(Role::Investor)), Role::Founder),
            Access::RedirectTo(Route::InvestorDashboard)
        );
        assert_eq!(
            guard(Some(&user(Role::Founder)), Role::Investor),
            Access::RedirectTo(Route::FounderDashboard)
        );
        assert_eq!(guard(Some(&user(Role::Founder)), Role::Founder), Access::Render);
    }

    #[test]
    fn loading_waits_on_gated_routes_only() {
        assert_eq!(gate(&SessionState::Loading, &Route::FounderDashboard), Gate::Wait);
        assert_eq!(gate(&SessionState::Loading, &Route::SignIn), Gate::Wait);
        assert_eq!(gate(&SessionState::Loading, &Route::Home), Gate::Render);
    }

    #[test]
    fn signed_in_users_skip_the_sign_in_page() {
        let founder = SessionState::SignedIn(user(Role::Founder));
        assert_eq!(gate(&founder, &Route::SignIn), Gate::RedirectTo(Route::FounderDashboard));
        assert_eq!(gate(&founder, &Route::Register), Gate::RedirectTo(Route::FounderDashboard));
        assert_eq!(gate(&SessionState::SignedOut, &Route::Register), Gate::Render);
    }

    #[test]
    fn gated_routes_follow_the_guard() {
        let investor = SessionState::SignedIn(user(Role::Investor));
        assert_eq!(
            gate(&investor, &Route::EditCompany(Uuid::nil())),
            Gate::RedirectTo(Route::InvestorDashboard)
        );
        assert_eq!(gate(&investor, &Route::InvestorDashboard), Gate::Render);
        assert_eq!(
            gate(&SessionState::SignedOut, &Route::InvestorDashboard),
            Gate::RedirectTo(Route::SignIn)
        );
    }
}
