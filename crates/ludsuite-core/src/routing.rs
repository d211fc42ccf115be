//! Post-login destination per role.

use crate::{Role, User};
use serde::Serialize;
use std::fmt;

/// Where a user lands after logging in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    AdminDashboard,
    MentorDashboard,
    MenteeDashboard,
    EndorserDashboard,
    ReviewerDashboard,
    /// Fallback for unset or unknown roles.
    Profile,
}

impl Destination {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Destination::AdminDashboard => "/admin-dashboard/",
            Destination::MentorDashboard => "/dashboard/",
            Destination::MenteeDashboard => "/mentee-dashboard/",
            Destination::EndorserDashboard => "/endorser-dashboard/",
            Destination::ReviewerDashboard => "/reviewer-dashboard/",
            Destination::Profile => "/profile/",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Dispatch on role. Never fails.
#[must_use]
pub const fn redirect_for(role: Option<Role>) -> Destination {
    match role {
        Some(Role::Admin) => Destination::AdminDashboard,
        Some(Role::Mentor) => Destination::MentorDashboard,
        Some(Role::Mentee) => Destination::MenteeDashboard,
        Some(Role::Endorser) => Destination::EndorserDashboard,
        Some(Role::Reviewer) => Destination::ReviewerDashboard,
        None => Destination::Profile,
    }
}

/// A superuser is routed as admin.
#[must_use]
pub fn redirect_for_user(user: &User) -> Destination {
    redirect_for(user.effective_role())
}

/// Route a raw role tag; unknown tags land on the profile page.
#[must_use]
pub fn redirect_for_tag(tag: &str) -> Destination {
    redirect_for(Role::parse_tag(tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NewUser, UserId};

    #[test]
    fn every_role_has_a_dashboard() {
        assert_eq!(redirect_for(Some(Role::Admin)).path(), "/admin-dashboard/");
        assert_eq!(redirect_for(Some(Role::Mentor)).path(), "/dashboard/");
        assert_eq!(redirect_for(Some(Role::Mentee)).path(), "/mentee-dashboard/");
        assert_eq!(
            redirect_for(Some(Role::Endorser)).path(),
            "/endorser-dashboard/"
        );
        assert_eq!(
            redirect_for(Some(Role::Reviewer)).path(),
            "/reviewer-dashboard/"
        );
    }

    #[test]
    fn unknown_tags_fall_back_to_profile() {
        assert_eq!(redirect_for(None), Destination::Profile);
        assert_eq!(redirect_for_tag("coach"), Destination::Profile);
        assert_eq!(redirect_for_tag(""), Destination::Profile);
        assert_eq!(redirect_for_tag(" Endorser"), Destination::EndorserDashboard);
    }

    #[test]
    fn superuser_routes_as_admin() {
        let mut user = NewUser::with_role("root", "root@example.org", Role::Mentee)
            .into_user(UserId(1));
        user.role = Some(Role::Mentee);
        user.is_superuser = true;
        assert_eq!(redirect_for_user(&user), Destination::AdminDashboard);
    }
}
