//! # Access Predicates
//!
//! Decides who may view or mutate which mentee's records.
//!
//! Every decision takes an explicit [`Requester`] and the current date. No
//! decision is cached: assignment rows can change between two requests, so
//! each call re-reads them through [`AssignmentQuery`].
//!
//! ## Rules
//!
//! | requester              | `can_access(mentee)`                      |
//! |------------------------|-------------------------------------------|
//! | superuser / admin      | always                                    |
//! | mentor                 | iff a current assignment links them       |
//! | reviewer               | always (read-only oversight)              |
//! | endorser, mentee, none | never                                     |
//!
//! Record-level predicates build on this table. A mentee always reaches
//! their own records through the user back-reference, and reviewers never
//! write.

use crate::directory::Directory;
use crate::records::Activity;
use crate::{Assignment, LudError, Mentee, MenteeId, Role, User, UserId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// =============================================================================
// REQUESTER
// =============================================================================

/// The identity an access decision is made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub id: UserId,
    pub role: Option<Role>,
    pub is_superuser: bool,
}

impl Requester {
    #[must_use]
    pub const fn new(id: UserId, role: Option<Role>, is_superuser: bool) -> Self {
        Self {
            id,
            role,
            is_superuser,
        }
    }

    /// Build from a stored user. The superuser flag is kept alongside the role.
    #[must_use]
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.effective_role(),
            is_superuser: user.is_superuser,
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.is_superuser || self.role == Some(Role::Admin)
    }

    /// Role used for routing and audience decisions.
    #[must_use]
    pub fn effective_role(&self) -> Option<Role> {
        if self.is_superuser {
            Some(Role::Admin)
        } else {
            self.role
        }
    }
}

impl From<&User> for Requester {
    fn from(user: &User) -> Self {
        Self::from_user(user)
    }
}

// =============================================================================
// ASSIGNMENT QUERY
// =============================================================================

/// Filter over assignment rows. Unset fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignmentFilter {
    pub mentor: Option<UserId>,
    pub mentee: Option<MenteeId>,
    pub is_active: Option<bool>,
    /// Keep only rows whose end date is unset or on/after this date.
    pub not_ended_before: Option<NaiveDate>,
}

impl AssignmentFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn mentor(mut self, mentor: UserId) -> Self {
        self.mentor = Some(mentor);
        self
    }

    #[must_use]
    pub fn mentee(mut self, mentee: MenteeId) -> Self {
        self.mentee = Some(mentee);
        self
    }

    /// Only rows that are current on `today` (flag set AND not ended).
    #[must_use]
    pub fn current_on(mut self, today: NaiveDate) -> Self {
        self.is_active = Some(true);
        self.not_ended_before = Some(today);
        self
    }

    #[must_use]
    pub fn matches(&self, assignment: &Assignment) -> bool {
        self.mentor.is_none_or(|m| assignment.mentor == m)
            && self.mentee.is_none_or(|m| assignment.mentee == m)
            && self.is_active.is_none_or(|a| assignment.is_active == a)
            && self
                .not_ended_before
                .is_none_or(|today| !assignment.is_expired(today))
    }
}

/// Read capability over assignment rows.
pub trait AssignmentQuery {
    fn assignments(&self, filter: &AssignmentFilter) -> Result<Vec<Assignment>, LudError>;
}

// =============================================================================
// CORE PREDICATE
// =============================================================================

/// Whether `requester` may see `mentee`'s data on `today`.
pub fn can_access(
    assignments: &impl AssignmentQuery,
    requester: &Requester,
    mentee: MenteeId,
    today: NaiveDate,
) -> Result<bool, LudError> {
    if requester.is_superuser {
        return Ok(true);
    }
    match requester.role {
        Some(Role::Admin) | Some(Role::Reviewer) => Ok(true),
        Some(Role::Mentor) => {
            let filter = AssignmentFilter::new()
                .mentor(requester.id)
                .mentee(mentee)
                .current_on(today);
            Ok(!assignments.assignments(&filter)?.is_empty())
        }
        Some(Role::Endorser) | Some(Role::Mentee) | None => Ok(false),
    }
}

/// The current assignments of `mentor`, ordered by id.
pub fn active_assignments_for_mentor(
    assignments: &impl AssignmentQuery,
    mentor: UserId,
    today: NaiveDate,
) -> Result<Vec<Assignment>, LudError> {
    assignments.assignments(&AssignmentFilter::new().mentor(mentor).current_on(today))
}

/// Turn a `false` decision into `PermissionDenied`.
pub fn ensure(allowed: bool) -> Result<(), LudError> {
    if allowed {
        Ok(())
    } else {
        Err(LudError::PermissionDenied)
    }
}

/// Require an admin or superuser.
pub fn require_admin(requester: &Requester) -> Result<(), LudError> {
    ensure(requester.is_admin())
}

// =============================================================================
// DIRECTORY-LEVEL PREDICATES
// =============================================================================

/// Mentees listed for `requester`.
///
/// Admins and reviewers see all, mentors see current assignees, a mentee
/// sees their own record, endorsers see none.
pub fn visible_mentees(
    dir: &Directory,
    requester: &Requester,
    today: NaiveDate,
) -> Result<Vec<Mentee>, LudError> {
    if requester.is_superuser {
        return dir.mentees();
    }
    match requester.role {
        Some(Role::Admin) | Some(Role::Reviewer) => dir.mentees(),
        Some(Role::Mentor) => {
            let assigned: std::collections::BTreeSet<MenteeId> =
                active_assignments_for_mentor(dir, requester.id, today)?
                    .into_iter()
                    .map(|a| a.mentee)
                    .collect();
            Ok(dir
                .mentees()?
                .into_iter()
                .filter(|m| assigned.contains(&m.id))
                .collect())
        }
        Some(Role::Mentee) => Ok(dir.mentee_for_user(requester.id)?.into_iter().collect()),
        Some(Role::Endorser) | None => Ok(Vec::new()),
    }
}

/// Whether `requester` may view `mentor`'s own data (activities, mentee list).
pub fn can_view_mentor(
    dir: &Directory,
    requester: &Requester,
    mentor: UserId,
) -> Result<bool, LudError> {
    if requester.is_superuser {
        return Ok(true);
    }
    match requester.role {
        Some(Role::Admin) | Some(Role::Reviewer) => Ok(true),
        Some(Role::Mentor) => Ok(requester.id == mentor),
        Some(Role::Endorser) => dir.is_linked(requester.id, mentor),
        Some(Role::Mentee) | None => Ok(false),
    }
}

/// Whether `requester` may write endorser-level feedback on `mentor`'s
/// activities. Reviewers are read-only.
pub fn can_review_mentor(
    dir: &Directory,
    requester: &Requester,
    mentor: UserId,
) -> Result<bool, LudError> {
    if requester.is_admin() {
        return Ok(true);
    }
    match requester.role {
        Some(Role::Endorser) => dir.is_linked(requester.id, mentor),
        Some(Role::Admin)
        | Some(Role::Mentor)
        | Some(Role::Mentee)
        | Some(Role::Reviewer)
        | None => Ok(false),
    }
}

/// Read a mentor-owned activity.
pub fn can_read_activity(
    dir: &Directory,
    requester: &Requester,
    activity: &Activity,
) -> Result<bool, LudError> {
    can_view_mentor(dir, requester, activity.mentor)
}

/// Write endorser feedback on a mentor-owned activity. The owner cannot
/// review their own entry.
pub fn can_review_activity(
    dir: &Directory,
    requester: &Requester,
    activity: &Activity,
) -> Result<bool, LudError> {
    can_review_mentor(dir, requester, activity.mentor)
}

/// Write `mentor`'s work schedule: the mentor themself or an admin.
/// Linked endorsers and reviewers only read it through [`can_view_mentor`].
pub fn can_manage_work_schedule(requester: &Requester, mentor: UserId) -> bool {
    if requester.is_admin() {
        return true;
    }
    match requester.role {
        Some(Role::Mentor) => requester.id == mentor,
        Some(Role::Admin)
        | Some(Role::Endorser)
        | Some(Role::Mentee)
        | Some(Role::Reviewer)
        | None => false,
    }
}

/// Whether `requester` is the account behind `mentee`.
fn is_own_mentee(
    dir: &Directory,
    requester: &Requester,
    mentee: MenteeId,
) -> Result<bool, LudError> {
    Ok(dir
        .mentee(mentee)?
        .is_some_and(|m| m.user == Some(requester.id)))
}

/// Read objectives, plan items and assessments of `mentee`.
pub fn can_read_mentee_records(
    dir: &Directory,
    requester: &Requester,
    mentee: MenteeId,
    today: NaiveDate,
) -> Result<bool, LudError> {
    if can_access(dir, requester, mentee, today)? {
        return Ok(true);
    }
    is_own_mentee(dir, requester, mentee)
}

/// Write mentee-authored content: the mentee themself or an admin.
pub fn can_author_mentee_records(
    dir: &Directory,
    requester: &Requester,
    mentee: MenteeId,
) -> Result<bool, LudError> {
    if requester.is_admin() {
        return Ok(true);
    }
    is_own_mentee(dir, requester, mentee)
}

/// Layer mentor feedback onto `mentee`'s records: an admin, or a mentor with
/// a current assignment. Reviewers pass `can_access` but never write.
pub fn can_give_feedback(
    dir: &Directory,
    requester: &Requester,
    mentee: MenteeId,
    today: NaiveDate,
) -> Result<bool, LudError> {
    if requester.is_admin() {
        return Ok(true);
    }
    match requester.role {
        Some(Role::Mentor) => can_access(dir, requester, mentee, today),
        Some(Role::Admin)
        | Some(Role::Endorser)
        | Some(Role::Mentee)
        | Some(Role::Reviewer)
        | None => Ok(false),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AssignmentId;

    /// Fixed assignment table for predicate tests.
    struct Rows(Vec<Assignment>);

    impl AssignmentQuery for Rows {
        fn assignments(&self, filter: &AssignmentFilter) -> Result<Vec<Assignment>, LudError> {
            Ok(self.0.iter().filter(|a| filter.matches(a)).cloned().collect())
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn row(mentor: u64, mentee: u64, end: Option<NaiveDate>, active: bool) -> Assignment {
        Assignment {
            id: AssignmentId(mentor * 100 + mentee),
            mentor: UserId(mentor),
            mentee: MenteeId(mentee),
            start_date: date(2024, 1, 1),
            end_date: end,
            is_active: active,
        }
    }

    fn requester(id: u64, role: Option<Role>) -> Requester {
        Requester::new(UserId(id), role, false)
    }

    #[test]
    fn mentor_with_open_assignment_has_access() {
        let rows = Rows(vec![row(1, 10, None, true)]);
        let today = date(2024, 7, 1);
        assert!(can_access(&rows, &requester(1, Some(Role::Mentor)), MenteeId(10), today)
            .expect("decision"));
        assert!(!can_access(&rows, &requester(1, Some(Role::Mentor)), MenteeId(11), today)
            .expect("decision"));
        assert!(!can_access(&rows, &requester(2, Some(Role::Mentor)), MenteeId(10), today)
            .expect("decision"));
    }

    #[test]
    fn ended_assignment_denies() {
        let rows = Rows(vec![row(1, 10, Some(date(2024, 6, 1)), true)]);
        let mentor = requester(1, Some(Role::Mentor));
        assert!(!can_access(&rows, &mentor, MenteeId(10), date(2024, 7, 1)).expect("decision"));
        assert!(can_access(&rows, &mentor, MenteeId(10), date(2024, 6, 1)).expect("decision"));
    }

    #[test]
    fn inactive_assignment_denies() {
        let rows = Rows(vec![row(1, 10, None, false)]);
        let mentor = requester(1, Some(Role::Mentor));
        assert!(!can_access(&rows, &mentor, MenteeId(10), date(2024, 7, 1)).expect("decision"));
    }

    #[test]
    fn any_current_row_among_history_grants() {
        let rows = Rows(vec![
            row(1, 10, Some(date(2023, 1, 1)), true),
            Assignment {
                start_date: date(2024, 2, 1),
                id: AssignmentId(2),
                ..row(1, 10, None, true)
            },
        ]);
        let mentor = requester(1, Some(Role::Mentor));
        assert!(can_access(&rows, &mentor, MenteeId(10), date(2024, 7, 1)).expect("decision"));
    }

    #[test]
    fn admin_superuser_and_reviewer_always_pass() {
        let rows = Rows(Vec::new());
        let today = date(2024, 7, 1);
        for r in [
            requester(1, Some(Role::Admin)),
            requester(2, Some(Role::Reviewer)),
            Requester::new(UserId(3), None, true),
            Requester::new(UserId(4), Some(Role::Mentee), true),
        ] {
            assert!(can_access(&rows, &r, MenteeId(10), today).expect("decision"));
        }
    }

    #[test]
    fn other_roles_are_denied() {
        let rows = Rows(vec![row(1, 10, None, true)]);
        let today = date(2024, 7, 1);
        for r in [
            requester(1, Some(Role::Endorser)),
            requester(1, Some(Role::Mentee)),
            requester(1, None),
        ] {
            assert!(!can_access(&rows, &r, MenteeId(10), today).expect("decision"));
        }
    }

    #[test]
    fn active_assignments_for_mentor_filters_rows() {
        let rows = Rows(vec![
            row(1, 10, None, true),
            row(1, 11, None, false),
            row(1, 12, Some(date(2024, 1, 31)), true),
            row(2, 13, None, true),
        ]);
        let active = active_assignments_for_mentor(&rows, UserId(1), date(2024, 7, 1))
            .expect("query");
        let mentees: Vec<MenteeId> = active.iter().map(|a| a.mentee).collect();
        assert_eq!(mentees, vec![MenteeId(10)]);
    }

    #[test]
    fn work_schedule_is_managed_by_owner_or_admin() {
        let mentor = UserId(1);
        assert!(can_manage_work_schedule(&requester(1, Some(Role::Mentor)), mentor));
        assert!(can_manage_work_schedule(&requester(9, Some(Role::Admin)), mentor));
        assert!(!can_manage_work_schedule(&requester(2, Some(Role::Mentor)), mentor));
        assert!(!can_manage_work_schedule(&requester(3, Some(Role::Endorser)), mentor));
        assert!(!can_manage_work_schedule(&requester(4, Some(Role::Reviewer)), mentor));
    }

    #[test]
    fn requester_from_superuser_is_admin() {
        let user = crate::NewUser {
            is_superuser: true,
            ..crate::NewUser::with_role("root", "root@example.org", Role::Reviewer)
        }
        .into_user(UserId(1));
        let r = Requester::from_user(&user);
        assert!(r.is_admin());
        assert_eq!(r.effective_role(), Some(Role::Admin));
        assert!(require_admin(&r).is_ok());
        assert!(matches!(
            require_admin(&requester(2, Some(Role::Mentor))),
            Err(LudError::PermissionDenied)
        ));
    }
}
