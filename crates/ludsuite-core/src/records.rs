//! # Owned Records
//!
//! Records owned by a mentor (`Activity`, `WorkScheduleItem`) or by a mentee
//! (`ObjectiveItem`, `YearPlanItem`, `MenteeAssessment`), plus broadcast
//! `Notification`s.
//!
//! Mentee-owned records carry mentee-authored content with an optional
//! `mentor_feedback` field layered on top. Who may write which part is
//! decided in [`crate::access`]; this module only holds the shapes and their
//! field-level validation.

use crate::primitives::{
    MAX_NOTIFICATION_LENGTH, MAX_QUARTER_HOURS, MAX_RATING, MAX_SHORT_TEXT_LENGTH,
    MAX_TEXT_LENGTH, MAX_WORK_ROLE_LENGTH, MIN_RATING, QUARTERS_PER_YEAR,
};
use crate::types::{check_length, check_required};
use crate::{LudError, MenteeId, ProgramYear, RecordId, Role, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// ACTIVITY
// =============================================================================

/// Kind of logged activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActivityKind {
    #[default]
    #[serde(rename = "YCLP-Class")]
    YclpClass,
    #[serde(rename = "DREAMS Summer Camp")]
    DreamsSummerCamp,
    #[serde(rename = "DREAMS Follow-Up")]
    DreamsFollowUp,
    #[serde(rename = "Others")]
    Others,
}

impl ActivityKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ActivityKind::YclpClass => "YCLP-Class",
            ActivityKind::DreamsSummerCamp => "DREAMS Summer Camp",
            ActivityKind::DreamsFollowUp => "DREAMS Follow-Up",
            ActivityKind::Others => "Others",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Activity duration in quarter hours (`1..=32`).
///
/// Integer-only so totals never drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct QuarterHours(u8);

impl QuarterHours {
    pub fn new(quarters: u8) -> Result<Self, LudError> {
        if (1..=MAX_QUARTER_HOURS).contains(&quarters) {
            Ok(Self(quarters))
        } else {
            Err(LudError::Validation(format!(
                "duration must be between 1 and {MAX_QUARTER_HOURS} quarter hours, got {quarters}"
            )))
        }
    }

    #[must_use]
    pub const fn quarters(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn minutes(self) -> u32 {
        self.0 as u32 * 15
    }
}

impl TryFrom<u8> for QuarterHours {
    type Error = LudError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QuarterHours> for u8 {
    fn from(value: QuarterHours) -> Self {
        value.0
    }
}

impl fmt::Display for QuarterHours {
    /// Formats as decimal hours, e.g. `1.25h`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}h", self.0 / 4, (self.0 % 4) * 25)
    }
}

/// A work-diary entry logged by a mentor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: RecordId,
    /// The logging mentor; owns the record.
    pub mentor: UserId,
    pub date: NaiveDate,
    pub duration: QuarterHours,
    pub kind: ActivityKind,
    pub other_activity: Option<String>,
    pub learnings: String,
    /// Written by an overseeing endorser or an admin.
    pub feedback: String,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} on {}", self.mentor, self.kind, self.date)
    }
}

/// Input for logging an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewActivity {
    pub date: NaiveDate,
    pub duration: QuarterHours,
    #[serde(default)]
    pub kind: ActivityKind,
    #[serde(default)]
    pub other_activity: Option<String>,
    #[serde(default)]
    pub learnings: String,
}

impl NewActivity {
    /// "Others" must name the activity; other kinds must not carry a name.
    pub fn validate(&self) -> Result<(), LudError> {
        match (self.kind, &self.other_activity) {
            (ActivityKind::Others, Some(other)) => {
                check_required("other_activity", other, MAX_SHORT_TEXT_LENGTH)?;
            }
            (ActivityKind::Others, None) => {
                return Err(LudError::Validation(
                    "other_activity is required when the activity is Others".to_string(),
                ));
            }
            (_, Some(other)) if !other.trim().is_empty() => {
                return Err(LudError::Validation(format!(
                    "other_activity is only allowed for Others, not {}",
                    self.kind
                )));
            }
            _ => {}
        }
        check_length("learnings", &self.learnings, MAX_TEXT_LENGTH)
    }

    #[must_use]
    pub fn into_activity(self, id: RecordId, mentor: UserId) -> Activity {
        let other_activity = match self.kind {
            ActivityKind::Others => self.other_activity.map(|s| s.trim().to_string()),
            _ => None,
        };
        Activity {
            id,
            mentor,
            date: self.date,
            duration: self.duration,
            kind: self.kind,
            other_activity,
            learnings: self.learnings,
            feedback: String::new(),
        }
    }
}

// =============================================================================
// WORK SCHEDULE
// =============================================================================

/// A dated duty on a mentor's work schedule (the "work diary").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkScheduleItem {
    pub id: RecordId,
    /// The mentor the duty belongs to.
    pub mentor: UserId,
    /// The duty, e.g. "Camp facilitator".
    pub role: String,
    pub due_date: NaiveDate,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl WorkScheduleItem {
    /// Due on or after `today`.
    #[must_use]
    pub fn is_upcoming(&self, today: NaiveDate) -> bool {
        self.due_date >= today
    }
}

impl fmt::Display for WorkScheduleItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} due {}", self.mentor, self.role, self.due_date)
    }
}

/// Input for a work-schedule item (create or update).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWorkScheduleItem {
    pub role: String,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub description: String,
}

impl NewWorkScheduleItem {
    pub fn validate(&self) -> Result<(), LudError> {
        check_required("role", &self.role, MAX_WORK_ROLE_LENGTH)?;
        check_length("description", &self.description, MAX_TEXT_LENGTH)
    }

    #[must_use]
    pub fn into_item(
        self,
        id: RecordId,
        mentor: UserId,
        created_at: DateTime<Utc>,
    ) -> WorkScheduleItem {
        WorkScheduleItem {
            id,
            mentor,
            role: self.role.trim().to_string(),
            due_date: self.due_date,
            description: self.description,
            created_at,
        }
    }
}

// =============================================================================
// OBJECTIVES
// =============================================================================

/// Progress of an objective.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveStatus {
    #[default]
    NotStarted,
    InProgress,
    Achieved,
}

/// A personal objective set by a mentee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveItem {
    pub id: RecordId,
    pub mentee: MenteeId,
    pub title: String,
    pub description: String,
    pub target_date: Option<NaiveDate>,
    pub status: ObjectiveStatus,
    pub mentor_feedback: Option<String>,
}

/// Input for an objective (create or content update).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewObjective {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: ObjectiveStatus,
}

impl NewObjective {
    pub fn validate(&self) -> Result<(), LudError> {
        check_required("title", &self.title, MAX_SHORT_TEXT_LENGTH)?;
        check_length("description", &self.description, MAX_TEXT_LENGTH)
    }

    #[must_use]
    pub fn into_objective(self, id: RecordId, mentee: MenteeId) -> ObjectiveItem {
        ObjectiveItem {
            id,
            mentee,
            title: self.title.trim().to_string(),
            description: self.description,
            target_date: self.target_date,
            status: self.status,
            mentor_feedback: None,
        }
    }
}

// =============================================================================
// YEAR PLAN
// =============================================================================

/// One planned goal for a quarter of a program year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearPlanItem {
    pub id: RecordId,
    pub mentee: MenteeId,
    pub program_year: ProgramYear,
    pub quarter: u8,
    pub goal: String,
    pub planned_actions: String,
    pub mentor_feedback: Option<String>,
}

/// Input for a year-plan item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewYearPlanItem {
    pub program_year: ProgramYear,
    pub quarter: u8,
    pub goal: String,
    #[serde(default)]
    pub planned_actions: String,
}

impl NewYearPlanItem {
    pub fn validate(&self) -> Result<(), LudError> {
        if !(1..=QUARTERS_PER_YEAR).contains(&self.quarter) {
            return Err(LudError::Validation(format!(
                "quarter must be between 1 and {QUARTERS_PER_YEAR}, got {}",
                self.quarter
            )));
        }
        check_required("goal", &self.goal, MAX_SHORT_TEXT_LENGTH)?;
        check_length("planned_actions", &self.planned_actions, MAX_TEXT_LENGTH)
    }

    #[must_use]
    pub fn into_item(self, id: RecordId, mentee: MenteeId) -> YearPlanItem {
        YearPlanItem {
            id,
            mentee,
            program_year: self.program_year,
            quarter: self.quarter,
            goal: self.goal.trim().to_string(),
            planned_actions: self.planned_actions,
            mentor_feedback: None,
        }
    }
}

// =============================================================================
// ASSESSMENTS
// =============================================================================

/// Domains a mentee is rated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingDomain {
    Academic,
    Leadership,
    Communication,
    Wellbeing,
    Participation,
}

/// A rating on the `1..=5` scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub fn new(value: u8) -> Result<Self, LudError> {
        if (MIN_RATING..=MAX_RATING).contains(&value) {
            Ok(Self(value))
        } else {
            Err(LudError::Validation(format!(
                "rating must be between {MIN_RATING} and {MAX_RATING}, got {value}"
            )))
        }
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = LudError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(value: Rating) -> Self {
        value.0
    }
}

/// A periodic assessment of a mentee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenteeAssessment {
    pub id: RecordId,
    pub mentee: MenteeId,
    pub assessed_on: NaiveDate,
    pub ratings: BTreeMap<RatingDomain, Rating>,
    pub reflection: String,
    pub mentor_feedback: Option<String>,
}

impl MenteeAssessment {
    /// Mean rating in tenths (e.g. `35` = 3.5), or `None` with no ratings.
    #[must_use]
    pub fn average_tenths(&self) -> Option<u32> {
        let count = u32::try_from(self.ratings.len()).ok().filter(|c| *c > 0)?;
        let total: u32 = self.ratings.values().map(|r| u32::from(r.value())).sum();
        Some((total * 10 + count / 2) / count)
    }
}

/// Input for an assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAssessment {
    pub assessed_on: NaiveDate,
    pub ratings: BTreeMap<RatingDomain, Rating>,
    #[serde(default)]
    pub reflection: String,
}

impl NewAssessment {
    pub fn validate(&self) -> Result<(), LudError> {
        if self.ratings.is_empty() {
            return Err(LudError::Validation(
                "an assessment needs at least one rating".to_string(),
            ));
        }
        check_length("reflection", &self.reflection, MAX_TEXT_LENGTH)
    }

    #[must_use]
    pub fn into_assessment(self, id: RecordId, mentee: MenteeId) -> MenteeAssessment {
        MenteeAssessment {
            id,
            mentee,
            assessed_on: self.assessed_on,
            ratings: self.ratings,
            reflection: self.reflection,
            mentor_feedback: None,
        }
    }
}

/// Validate a feedback text before it is layered onto a record.
pub fn validate_feedback(feedback: &str) -> Result<(), LudError> {
    check_length("feedback", feedback, MAX_TEXT_LENGTH)
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

/// Audience of a broadcast notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTarget {
    Endorser,
    Mentor,
    Both,
}

impl NotificationTarget {
    /// Whether a user with `role` is in this audience. Admins read everything.
    #[must_use]
    pub fn reaches(self, role: Option<Role>) -> bool {
        match role {
            Some(Role::Admin) => true,
            Some(Role::Endorser) => matches!(self, Self::Endorser | Self::Both),
            Some(Role::Mentor) => matches!(self, Self::Mentor | Self::Both),
            Some(Role::Mentee) | Some(Role::Reviewer) | None => false,
        }
    }
}

/// A message broadcast by an admin to endorsers, mentors or both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: RecordId,
    pub message: String,
    pub target: NotificationTarget,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
}

impl Notification {
    /// First 30 characters of the message, for listings.
    #[must_use]
    pub fn preview(&self) -> String {
        self.message.chars().take(30).collect()
    }
}

/// Input for a broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub message: String,
    pub target: NotificationTarget,
}

impl NewNotification {
    pub fn validate(&self) -> Result<(), LudError> {
        check_required("message", &self.message, MAX_NOTIFICATION_LENGTH)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).expect("valid date")
    }

    fn activity(kind: ActivityKind, other: Option<&str>) -> NewActivity {
        NewActivity {
            date: day(),
            duration: QuarterHours::new(4).expect("valid duration"),
            kind,
            other_activity: other.map(str::to_string),
            learnings: String::new(),
        }
    }

    #[test]
    fn quarter_hours_bounds_and_display() {
        assert!(QuarterHours::new(0).is_err());
        assert!(QuarterHours::new(33).is_err());
        let d = QuarterHours::new(5).expect("valid");
        assert_eq!(d.minutes(), 75);
        assert_eq!(d.to_string(), "1.25h");
        assert_eq!(QuarterHours::new(32).expect("valid").to_string(), "8.00h");
    }

    #[test]
    fn others_requires_a_name() {
        assert!(activity(ActivityKind::Others, None).validate().is_err());
        assert!(activity(ActivityKind::Others, Some("  ")).validate().is_err());
        assert!(activity(ActivityKind::Others, Some("Workshop")).validate().is_ok());
    }

    #[test]
    fn named_activity_rejects_other_text() {
        assert!(activity(ActivityKind::YclpClass, Some("Workshop")).validate().is_err());
        assert!(activity(ActivityKind::YclpClass, None).validate().is_ok());
    }

    #[test]
    fn activity_kind_labels() {
        assert_eq!(ActivityKind::default(), ActivityKind::YclpClass);
        assert_eq!(ActivityKind::DreamsFollowUp.to_string(), "DREAMS Follow-Up");
    }

    #[test]
    fn rating_bounds() {
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(6).is_err());
        assert_eq!(Rating::new(5).map(Rating::value).ok(), Some(5));
    }

    #[test]
    fn assessment_average_is_rounded_tenths() {
        let mut ratings = BTreeMap::new();
        ratings.insert(RatingDomain::Academic, Rating::new(4).expect("valid"));
        ratings.insert(RatingDomain::Leadership, Rating::new(3).expect("valid"));
        ratings.insert(RatingDomain::Wellbeing, Rating::new(3).expect("valid"));
        let assessment = NewAssessment {
            assessed_on: day(),
            ratings,
            reflection: String::new(),
        }
        .into_assessment(RecordId(1), MenteeId(1));
        assert_eq!(assessment.average_tenths(), Some(33));
    }

    #[test]
    fn empty_assessment_is_rejected() {
        let assessment = NewAssessment {
            assessed_on: day(),
            ratings: BTreeMap::new(),
            reflection: String::new(),
        };
        assert!(assessment.validate().is_err());
    }

    #[test]
    fn year_plan_quarter_bounds() {
        let mut item = NewYearPlanItem {
            program_year: ProgramYear::FIRST,
            quarter: 0,
            goal: "Read ten books".to_string(),
            planned_actions: String::new(),
        };
        assert!(item.validate().is_err());
        item.quarter = 4;
        assert!(item.validate().is_ok());
    }

    #[test]
    fn work_item_role_is_required_and_short() {
        let mut item = NewWorkScheduleItem {
            role: "  ".to_string(),
            due_date: day(),
            description: String::new(),
        };
        assert!(item.validate().is_err());
        item.role = "x".repeat(51);
        assert!(item.validate().is_err());
        item.role = " Camp facilitator ".to_string();
        assert!(item.validate().is_ok());

        let now = day().and_hms_opt(8, 0, 0).expect("valid time").and_utc();
        let stored = item.into_item(RecordId(1), UserId(2), now);
        assert_eq!(stored.role, "Camp facilitator");
        assert!(stored.is_upcoming(day()));
        assert!(!stored.is_upcoming(day().succ_opt().expect("next day")));
    }

    #[test]
    fn notification_audience() {
        assert!(NotificationTarget::Both.reaches(Some(Role::Mentor)));
        assert!(NotificationTarget::Both.reaches(Some(Role::Endorser)));
        assert!(!NotificationTarget::Mentor.reaches(Some(Role::Endorser)));
        assert!(NotificationTarget::Endorser.reaches(Some(Role::Admin)));
        assert!(!NotificationTarget::Both.reaches(Some(Role::Mentee)));
        assert!(!NotificationTarget::Both.reaches(None));
    }
}
