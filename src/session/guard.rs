use crate::session::model::{Role, Session, User};
use crate::session::navigator::Destination;

/// Outcome of a route guard check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(Destination),
}

/// Role-based access check for protected views.
///
/// Signed-out users go to the login screen. Signed-in users who lack the
/// required role land on their own dashboard instead of an error page.
#[derive(Debug, Clone, Default)]
pub struct RouteGuard {
    required_role: Option<Role>,
}

impl RouteGuard {
    /// Any signed-in user passes
    pub fn authenticated() -> Self {
        Self { required_role: None }
    }

    pub fn admin() -> Self {
        Self::requiring(Role::Admin)
    }

    pub fn worker() -> Self {
        Self::requiring(Role::Worker)
    }

    pub fn requiring(role: Role) -> Self {
        Self {
            required_role: Some(role),
        }
    }

    pub fn check(&self, session: &Session) -> GuardDecision {
        let user = match (&session.user, session.is_authenticated()) {
            (Some(user), true) => user,
            _ => return GuardDecision::Redirect(Destination::Login),
        };

        match &self.required_role {
            Some(required) if *required != user.role => {
                GuardDecision::Redirect(dashboard_for(&user.role))
            }
            _ => GuardDecision::Allow,
        }
    }
}

/// Where `user` lands after signing in
pub fn landing_for(user: &User) -> Destination {
    if user.is_staff {
        Destination::AdminDashboard
    } else {
        dashboard_for(&user.role)
    }
}

// Role only: `is_staff` does not open admin routes
fn dashboard_for(role: &Role) -> Destination {
    match role {
        Role::Admin => Destination::AdminDashboard,
        _ => Destination::WorkerDashboard,
    }
}
