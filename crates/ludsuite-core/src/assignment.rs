//! # Assignment Lifecycle
//!
//! Creation and revocation of mentor-mentee assignments, and the
//! endorser-mentor linkage.
//!
//! All mutations are admin-only. Access for a mentor appears the moment an
//! assignment row is committed and disappears the moment it is deactivated,
//! ended in the past or deleted; nothing is cached in between.

use crate::access::{Requester, ensure, require_admin};
use crate::directory::Directory;
use crate::primitives::MAX_MENTORS_PER_ENDORSER;
use crate::storage::{Collection, WriteBatch};
use crate::{Assignment, AssignmentId, EndorserLink, LudError, MenteeId, Role, User, UserId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Input for a new assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentDraft {
    pub mentor: UserId,
    pub mentee: MenteeId,
    /// Defaults to the creation date.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl AssignmentDraft {
    #[must_use]
    pub const fn new(mentor: UserId, mentee: MenteeId) -> Self {
        Self {
            mentor,
            mentee,
            start_date: None,
            end_date: None,
        }
    }

    #[must_use]
    pub const fn starting(mut self, start_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self
    }

    #[must_use]
    pub const fn ending(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }
}

/// Load `id` and check that its effective role is `role`.
pub(crate) fn require_role(dir: &Directory, id: UserId, role: Role) -> Result<User, LudError> {
    let user = dir.require_user(id)?;
    if user.effective_role() == Some(role) {
        Ok(user)
    } else {
        Err(LudError::Validation(format!(
            "{} does not have the {} role",
            user.username,
            role.label()
        )))
    }
}

fn check_window(start: NaiveDate, end: Option<NaiveDate>) -> Result<(), LudError> {
    match end {
        Some(end) if end < start => Err(LudError::Validation(format!(
            "end date {end} precedes start date {start}"
        ))),
        _ => Ok(()),
    }
}

// =============================================================================
// ASSIGNMENTS
// =============================================================================

/// Create an assignment. Admin only.
///
/// The mentor must hold the mentor role and the mentee must exist. A second
/// row with the same `(mentor, mentee, start_date)` is rejected and nothing
/// is persisted.
pub fn create_assignment(
    dir: &mut Directory,
    requester: &Requester,
    draft: AssignmentDraft,
    today: NaiveDate,
) -> Result<Assignment, LudError> {
    require_admin(requester)?;
    require_role(dir, draft.mentor, Role::Mentor)?;
    dir.require_mentee(draft.mentee)?;

    let start_date = draft.start_date.unwrap_or(today);
    check_window(start_date, draft.end_date)?;

    let key = (draft.mentor, draft.mentee, start_date);
    if dir.all_assignments()?.iter().any(|a| a.key() == key) {
        return Err(LudError::Validation(format!(
            "{} is already assigned to {} from {start_date}",
            draft.mentor, draft.mentee
        )));
    }

    dir.insert_row(Collection::Assignments, |id| Assignment {
        id: AssignmentId(id),
        mentor: draft.mentor,
        mentee: draft.mentee,
        start_date,
        end_date: draft.end_date,
        is_active: true,
    })
}

fn require_assignment(dir: &Directory, id: AssignmentId) -> Result<Assignment, LudError> {
    dir.assignment(id)?
        .ok_or_else(|| LudError::NotFound(id.to_string()))
}

fn update_assignment(
    dir: &mut Directory,
    requester: &Requester,
    id: AssignmentId,
    change: impl FnOnce(&mut Assignment) -> Result<(), LudError>,
) -> Result<Assignment, LudError> {
    require_admin(requester)?;
    let mut assignment = require_assignment(dir, id)?;
    change(&mut assignment)?;
    dir.replace_row(Collection::Assignments, id.0, &assignment)?;
    Ok(assignment)
}

/// Clear the active flag. Access is revoked immediately.
pub fn deactivate_assignment(
    dir: &mut Directory,
    requester: &Requester,
    id: AssignmentId,
) -> Result<Assignment, LudError> {
    update_assignment(dir, requester, id, |a| {
        a.is_active = false;
        Ok(())
    })
}

/// Set the active flag again. An end date in the past still denies access.
pub fn reactivate_assignment(
    dir: &mut Directory,
    requester: &Requester,
    id: AssignmentId,
) -> Result<Assignment, LudError> {
    update_assignment(dir, requester, id, |a| {
        a.is_active = true;
        Ok(())
    })
}

/// Set the end date. Access lasts through `end_date` inclusive.
pub fn end_assignment(
    dir: &mut Directory,
    requester: &Requester,
    id: AssignmentId,
    end_date: NaiveDate,
) -> Result<Assignment, LudError> {
    update_assignment(dir, requester, id, |a| {
        check_window(a.start_date, Some(end_date))?;
        a.end_date = Some(end_date);
        Ok(())
    })
}

// =============================================================================
// ENDORSER LINKAGE
// =============================================================================

/// Mentors overseen by `endorser`. Visible to admins, reviewers and the
/// endorser themself.
pub fn linked_mentors(
    dir: &Directory,
    requester: &Requester,
    endorser: UserId,
) -> Result<BTreeSet<UserId>, LudError> {
    let allowed = requester.is_admin()
        || requester.id == endorser
        || requester.role == Some(Role::Reviewer);
    ensure(allowed)?;
    require_role(dir, endorser, Role::Endorser)?;
    dir.linked_mentors(endorser)
}

/// Link `mentor` to `endorser`. Idempotent.
pub fn add_mentor(
    dir: &mut Directory,
    requester: &Requester,
    endorser: UserId,
    mentor: UserId,
) -> Result<BTreeSet<UserId>, LudError> {
    require_admin(requester)?;
    require_role(dir, endorser, Role::Endorser)?;
    require_role(dir, mentor, Role::Mentor)?;

    let current = dir.linked_mentors(endorser)?;
    if !current.contains(&mentor) {
        if current.len() >= MAX_MENTORS_PER_ENDORSER {
            return Err(LudError::Validation(format!(
                "an endorser can oversee at most {MAX_MENTORS_PER_ENDORSER} mentors"
            )));
        }
        let mut batch = WriteBatch::new();
        batch.link(EndorserLink::new(endorser, mentor));
        dir.commit(batch)?;
    }
    dir.linked_mentors(endorser)
}

/// Unlink `mentor` from `endorser`. Removing an absent link is a no-op.
pub fn remove_mentor(
    dir: &mut Directory,
    requester: &Requester,
    endorser: UserId,
    mentor: UserId,
) -> Result<BTreeSet<UserId>, LudError> {
    require_admin(requester)?;
    require_role(dir, endorser, Role::Endorser)?;

    if dir.is_linked(endorser, mentor)? {
        let mut batch = WriteBatch::new();
        batch.unlink(EndorserLink::new(endorser, mentor));
        dir.commit(batch)?;
    }
    dir.linked_mentors(endorser)
}

/// Replace the whole mentor set of `endorser` in one commit.
pub fn set_mentors(
    dir: &mut Directory,
    requester: &Requester,
    endorser: UserId,
    mentors: impl IntoIterator<Item = UserId>,
) -> Result<BTreeSet<UserId>, LudError> {
    require_admin(requester)?;
    require_role(dir, endorser, Role::Endorser)?;

    let wanted: BTreeSet<UserId> = mentors.into_iter().collect();
    if wanted.len() > MAX_MENTORS_PER_ENDORSER {
        return Err(LudError::Validation(format!(
            "an endorser can oversee at most {MAX_MENTORS_PER_ENDORSER} mentors"
        )));
    }
    for mentor in &wanted {
        require_role(dir, *mentor, Role::Mentor)?;
    }

    let current = dir.linked_mentors(endorser)?;
    let mut batch = WriteBatch::new();
    for stale in current.difference(&wanted) {
        batch.unlink(EndorserLink::new(endorser, *stale));
    }
    for fresh in wanted.difference(&current) {
        batch.link(EndorserLink::new(endorser, *fresh));
    }
    if !batch.is_empty() {
        dir.commit(batch)?;
    }
    Ok(wanted)
}

// =============================================================================
// TESTS
// =============================================================================
