//! # Record Tracking
//!
//! Authorized operations on owned records.
//!
//! - Activities belong to the mentor who logged them. Linked endorsers and
//!   admins review them; reviewers only read.
//! - Work-schedule items belong to a mentor. The mentor or an admin keeps
//!   them, and everyone who may view the mentor reads them.
//! - Objectives, year-plan items and assessments belong to a mentee. The
//!   mentee (or an admin) writes the content, an assigned mentor layers
//!   feedback on top, and anyone passing the read predicate lists them.
//!
//! Permission is checked before the target mentee is resolved, so a denied
//! requester cannot learn which mentee ids exist.

use crate::access::{
    Requester, can_author_mentee_records, can_give_feedback, can_manage_work_schedule,
    can_read_activity, can_read_mentee_records, can_review_activity, can_view_mentor, ensure,
};
use crate::assignment::require_role;
use crate::directory::Directory;
use crate::records::{
    Activity, MenteeAssessment, NewActivity, NewAssessment, NewObjective, NewWorkScheduleItem,
    NewYearPlanItem, ObjectiveItem, WorkScheduleItem, YearPlanItem, validate_feedback,
};
use crate::storage::Collection;
use crate::{LudError, MenteeId, RecordId, Role, UserId};
use chrono::{DateTime, NaiveDate, Utc};

/// Empty feedback clears the field.
fn feedback_value(feedback: &str) -> Result<Option<String>, LudError> {
    validate_feedback(feedback)?;
    let trimmed = feedback.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

fn missing(id: RecordId) -> LudError {
    LudError::NotFound(format!("record {id}"))
}

// =============================================================================
// ACTIVITIES
// =============================================================================

/// Log an activity for the requesting mentor.
pub fn log_activity(
    dir: &mut Directory,
    requester: &Requester,
    new_activity: NewActivity,
) -> Result<Activity, LudError> {
    ensure(requester.role == Some(Role::Mentor) && !requester.is_superuser)?;
    new_activity.validate()?;
    let mentor = requester.id;
    dir.insert_row(Collection::Activities, |id| {
        new_activity.into_activity(RecordId(id), mentor)
    })
}

/// Activities logged by `mentor`, newest first.
pub fn activities_for_mentor(
    dir: &Directory,
    requester: &Requester,
    mentor: UserId,
) -> Result<Vec<Activity>, LudError> {
    ensure(can_view_mentor(dir, requester, mentor)?)?;
    let mut activities: Vec<Activity> = dir
        .activities()?
        .into_iter()
        .filter(|a| a.mentor == mentor)
        .collect();
    activities.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
    Ok(activities)
}

/// The requester's own activities.
pub fn my_activities(dir: &Directory, requester: &Requester) -> Result<Vec<Activity>, LudError> {
    activities_for_mentor(dir, requester, requester.id)
}

/// A single activity, if the requester may read it.
pub fn activity(
    dir: &Directory,
    requester: &Requester,
    id: RecordId,
) -> Result<Activity, LudError> {
    let activity = dir.activity(id)?.ok_or_else(|| missing(id))?;
    ensure(can_read_activity(dir, requester, &activity)?)?;
    Ok(activity)
}

/// Write reviewer feedback on an activity. Linked endorsers and admins only.
pub fn set_activity_feedback(
    dir: &mut Directory,
    requester: &Requester,
    id: RecordId,
    feedback: &str,
) -> Result<Activity, LudError> {
    let mut activity = dir.activity(id)?.ok_or_else(|| missing(id))?;
    ensure(can_review_activity(dir, requester, &activity)?)?;
    activity.feedback = feedback_value(feedback)?.unwrap_or_default();
    dir.replace_row(Collection::Activities, id.0, &activity)?;
    Ok(activity)
}

// =============================================================================
// WORK SCHEDULE
// =============================================================================

/// Put a duty on `mentor`'s work schedule.
pub fn add_work_item(
    dir: &mut Directory,
    requester: &Requester,
    mentor: UserId,
    new_item: NewWorkScheduleItem,
    now: DateTime<Utc>,
) -> Result<WorkScheduleItem, LudError> {
    ensure(can_manage_work_schedule(requester, mentor))?;
    require_role(dir, mentor, Role::Mentor)?;
    new_item.validate()?;
    dir.insert_row(Collection::WorkSchedule, |id| {
        new_item.into_item(RecordId(id), mentor, now)
    })
}

/// `mentor`'s work schedule, soonest due first.
pub fn work_schedule_for(
    dir: &Directory,
    requester: &Requester,
    mentor: UserId,
) -> Result<Vec<WorkScheduleItem>, LudError> {
    ensure(can_view_mentor(dir, requester, mentor)?)?;
    let mut items: Vec<WorkScheduleItem> = dir
        .work_items()?
        .into_iter()
        .filter(|i| i.mentor == mentor)
        .collect();
    items.sort_by_key(|i| (i.due_date, i.id));
    Ok(items)
}

/// Replace a duty's content. Owner and creation time are kept.
pub fn update_work_item(
    dir: &mut Directory,
    requester: &Requester,
    id: RecordId,
    content: NewWorkScheduleItem,
) -> Result<WorkScheduleItem, LudError> {
    let existing = dir.work_item(id)?.ok_or_else(|| missing(id))?;
    ensure(can_manage_work_schedule(requester, existing.mentor))?;
    content.validate()?;
    let updated = content.into_item(id, existing.mentor, existing.created_at);
    dir.replace_row(Collection::WorkSchedule, id.0, &updated)?;
    Ok(updated)
}

pub fn delete_work_item(
    dir: &mut Directory,
    requester: &Requester,
    id: RecordId,
) -> Result<(), LudError> {
    let existing = dir.work_item(id)?.ok_or_else(|| missing(id))?;
    ensure(can_manage_work_schedule(requester, existing.mentor))?;
    dir.delete_row(Collection::WorkSchedule, id.0)
}

// =============================================================================
// OBJECTIVES
// =============================================================================

pub fn add_objective(
    dir: &mut Directory,
    requester: &Requester,
    mentee: MenteeId,
    new_objective: NewObjective,
) -> Result<ObjectiveItem, LudError> {
    ensure(can_author_mentee_records(dir, requester, mentee)?)?;
    dir.require_mentee(mentee)?;
    new_objective.validate()?;
    dir.insert_row(Collection::Objectives, |id| {
        new_objective.into_objective(RecordId(id), mentee)
    })
}

pub fn objectives_for(
    dir: &Directory,
    requester: &Requester,
    mentee: MenteeId,
    today: NaiveDate,
) -> Result<Vec<ObjectiveItem>, LudError> {
    ensure(can_read_mentee_records(dir, requester, mentee, today)?)?;
    dir.require_mentee(mentee)?;
    Ok(dir
        .objectives()?
        .into_iter()
        .filter(|o| o.mentee == mentee)
        .collect())
}

/// Replace the mentee-authored content. Mentor feedback is kept.
pub fn update_objective(
    dir: &mut Directory,
    requester: &Requester,
    id: RecordId,
    content: NewObjective,
) -> Result<ObjectiveItem, LudError> {
    let existing = dir.objective(id)?.ok_or_else(|| missing(id))?;
    ensure(can_author_mentee_records(dir, requester, existing.mentee)?)?;
    content.validate()?;
    let updated = ObjectiveItem {
        mentor_feedback: existing.mentor_feedback,
        ..content.into_objective(id, existing.mentee)
    };
    dir.replace_row(Collection::Objectives, id.0, &updated)?;
    Ok(updated)
}

pub fn set_objective_feedback(
    dir: &mut Directory,
    requester: &Requester,
    id: RecordId,
    feedback: &str,
    today: NaiveDate,
) -> Result<ObjectiveItem, LudError> {
    let mut objective = dir.objective(id)?.ok_or_else(|| missing(id))?;
    ensure(can_give_feedback(dir, requester, objective.mentee, today)?)?;
    objective.mentor_feedback = feedback_value(feedback)?;
    dir.replace_row(Collection::Objectives, id.0, &objective)?;
    Ok(objective)
}

// =============================================================================
// YEAR PLAN
// =============================================================================

pub fn add_year_plan_item(
    dir: &mut Directory,
    requester: &Requester,
    mentee: MenteeId,
    new_item: NewYearPlanItem,
) -> Result<YearPlanItem, LudError> {
    ensure(can_author_mentee_records(dir, requester, mentee)?)?;
    dir.require_mentee(mentee)?;
    new_item.validate()?;
    dir.insert_row(Collection::YearPlan, |id| {
        new_item.into_item(RecordId(id), mentee)
    })
}

/// Plan items of `mentee`, ordered by year then quarter.
pub fn year_plan_for(
    dir: &Directory,
    requester: &Requester,
    mentee: MenteeId,
    today: NaiveDate,
) -> Result<Vec<YearPlanItem>, LudError> {
    ensure(can_read_mentee_records(dir, requester, mentee, today)?)?;
    dir.require_mentee(mentee)?;
    let mut items: Vec<YearPlanItem> = dir
        .year_plan_items()?
        .into_iter()
        .filter(|i| i.mentee == mentee)
        .collect();
    items.sort_by_key(|i| (i.program_year, i.quarter, i.id));
    Ok(items)
}

pub fn update_year_plan_item(
    dir: &mut Directory,
    requester: &Requester,
    id: RecordId,
    content: NewYearPlanItem,
) -> Result<YearPlanItem, LudError> {
    let existing = dir.year_plan_item(id)?.ok_or_else(|| missing(id))?;
    ensure(can_author_mentee_records(dir, requester, existing.mentee)?)?;
    content.validate()?;
    let updated = YearPlanItem {
        mentor_feedback: existing.mentor_feedback,
        ..content.into_item(id, existing.mentee)
    };
    dir.replace_row(Collection::YearPlan, id.0, &updated)?;
    Ok(updated)
}

pub fn set_year_plan_feedback(
    dir: &mut Directory,
    requester: &Requester,
    id: RecordId,
    feedback: &str,
    today: NaiveDate,
) -> Result<YearPlanItem, LudError> {
    let mut item = dir.year_plan_item(id)?.ok_or_else(|| missing(id))?;
    ensure(can_give_feedback(dir, requester, item.mentee, today)?)?;
    item.mentor_feedback = feedback_value(feedback)?;
    dir.replace_row(Collection::YearPlan, id.0, &item)?;
    Ok(item)
}

// =============================================================================
// ASSESSMENTS
// =============================================================================

pub fn add_assessment(
    dir: &mut Directory,
    requester: &Requester,
    mentee: MenteeId,
    new_assessment: NewAssessment,
) -> Result<MenteeAssessment, LudError> {
    ensure(can_author_mentee_records(dir, requester, mentee)?)?;
    dir.require_mentee(mentee)?;
    new_assessment.validate()?;
    dir.insert_row(Collection::Assessments, |id| {
        new_assessment.into_assessment(RecordId(id), mentee)
    })
}

/// Assessments of `mentee`, most recent first.
pub fn assessments_for(
    dir: &Directory,
    requester: &Requester,
    mentee: MenteeId,
    today: NaiveDate,
) -> Result<Vec<MenteeAssessment>, LudError> {
    ensure(can_read_mentee_records(dir, requester, mentee, today)?)?;
    dir.require_mentee(mentee)?;
    let mut assessments: Vec<MenteeAssessment> = dir
        .assessments()?
        .into_iter()
        .filter(|a| a.mentee == mentee)
        .collect();
    assessments.sort_by(|a, b| b.assessed_on.cmp(&a.assessed_on).then(b.id.cmp(&a.id)));
    Ok(assessments)
}

pub fn update_assessment(
    dir: &mut Directory,
    requester: &Requester,
    id: RecordId,
    content: NewAssessment,
) -> Result<MenteeAssessment, LudError> {
    let existing = dir.assessment(id)?.ok_or_else(|| missing(id))?;
    ensure(can_author_mentee_records(dir, requester, existing.mentee)?)?;
    content.validate()?;
    let updated = MenteeAssessment {
        mentor_feedback: existing.mentor_feedback,
        ..content.into_assessment(id, existing.mentee)
    };
    dir.replace_row(Collection::Assessments, id.0, &updated)?;
    Ok(updated)
}

pub fn set_assessment_feedback(
    dir: &mut Directory,
    requester: &Requester,
    id: RecordId,
    feedback: &str,
    today: NaiveDate,
) -> Result<MenteeAssessment, LudError> {
    let mut assessment = dir.assessment(id)?.ok_or_else(|| missing(id))?;
    ensure(can_give_feedback(dir, requester, assessment.mentee, today)?)?;
    assessment.mentor_feedback = feedback_value(feedback)?;
    dir.replace_row(Collection::Assessments, id.0, &assessment)?;
    Ok(assessment)
}

// =============================================================================
// TESTS
// =============================================================================
