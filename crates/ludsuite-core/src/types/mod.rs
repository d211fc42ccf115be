//! # Core Type Definitions
//!
//! This module contains the identity and assignment types of the registry:
//! - Identifiers (`UserId`, `MenteeId`, `AssignmentId`, `RecordId`)
//! - The closed role enumeration (`Role`)
//! - Users, mentees and their program year
//! - Mentor-mentee assignments and endorser-mentor links
//! - Error types (`LudError`)
//!
//! ## Invariants
//!
//! - A superuser is always stored with `role = Admin` (`User::normalize`).
//! - A `ProgramYear` is always within `1..=4`, including after decoding.
//! - An `Assignment` is current iff `is_active` AND it has not ended.

use crate::primitives::{
    FIRST_PROGRAM_YEAR, LAST_PROGRAM_YEAR, MAX_EMAIL_LENGTH, MAX_NAME_LENGTH, MAX_USERNAME_LENGTH,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

/// Identifier of a mentee record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MenteeId(pub u64);

/// Identifier of a mentor-mentee assignment row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssignmentId(pub u64);

/// Identifier of an owned record (activity, objective, plan item, assessment,
/// notification). Ids are allocated per collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user#{}", self.0)
    }
}

impl fmt::Display for MenteeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mentee#{}", self.0)
    }
}

impl fmt::Display for AssignmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "assignment#{}", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// ROLE
// =============================================================================

/// The role tag carried by a user.
///
/// Matching on `Role` is exhaustive everywhere a decision depends on it, so
/// adding a role forces every predicate to be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Endorser,
    Mentor,
    Mentee,
    Reviewer,
}

impl Role {
    /// All roles in declaration order.
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Endorser,
        Role::Mentor,
        Role::Mentee,
        Role::Reviewer,
    ];

    /// Stable wire/storage tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Endorser => "endorser",
            Role::Mentor => "mentor",
            Role::Mentee => "mentee",
            Role::Reviewer => "reviewer",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Endorser => "Endorser",
            Role::Mentor => "Mentor",
            Role::Mentee => "Mentee",
            Role::Reviewer => "Reviewer",
        }
    }

    /// Lenient parse used at input boundaries (imports, headers).
    ///
    /// Trims and ignores case. Empty or unrecognised tags yield `None`, which
    /// callers treat as an unset role rather than an error.
    #[must_use]
    pub fn parse_tag(tag: &str) -> Option<Role> {
        let normalized = tag.trim().to_ascii_lowercase();
        Role::ALL.into_iter().find(|r| r.as_str() == normalized)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = LudError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Role::parse_tag(value).ok_or_else(|| LudError::Validation(format!("unknown role '{value}'")))
    }
}

// =============================================================================
// USER
// =============================================================================

/// Optional personal details kept on a user account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub religion: Option<String>,
    pub permanent_address: Option<String>,
    pub institution: Option<String>,
    pub designation: Option<String>,
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    /// `None` is an unset role (legacy or imported rows).
    pub role: Option<Role>,
    pub is_superuser: bool,
    pub is_active: bool,
    pub profile: UserProfile,
}

impl User {
    /// Coerce a superuser to the admin role. Applied on every save.
    pub fn normalize(&mut self) {
        if self.is_superuser {
            self.role = Some(Role::Admin);
        }
        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_string();
    }

    /// The role decisions are made on. A superuser is always an admin.
    #[must_use]
    pub fn effective_role(&self) -> Option<Role> {
        if self.is_superuser {
            Some(Role::Admin)
        } else {
            self.role
        }
    }

    /// "first last" when known, the username otherwise.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (&self.profile.first_name, &self.profile.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.username.clone(),
        }
    }

    /// Check field-level constraints (uniqueness is checked by the directory).
    pub fn validate(&self) -> Result<(), LudError> {
        validate_username(&self.username)?;
        validate_email(&self.email)?;
        if let Some(first) = &self.profile.first_name {
            check_length("first_name", first, MAX_NAME_LENGTH)?;
        }
        if let Some(last) = &self.profile.last_name {
            check_length("last_name", last, MAX_NAME_LENGTH)?;
        }
        Ok(())
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.effective_role() {
            Some(role) => write!(f, "{} ({})", self.username, role),
            None => write!(f, "{} (unset)", self.username),
        }
    }
}

/// Input for creating a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub role: Option<Role>,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub profile: UserProfile,
}

impl NewUser {
    /// Shorthand used by imports and tests.
    #[must_use]
    pub fn with_role(username: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            role: Some(role),
            ..Self::default()
        }
    }

    /// Materialize into a stored user with the given id.
    #[must_use]
    pub fn into_user(self, id: UserId) -> User {
        let mut user = User {
            id,
            username: self.username,
            email: self.email,
            role: self.role,
            is_superuser: self.is_superuser,
            is_active: true,
            profile: self.profile,
        };
        user.normalize();
        user
    }
}

fn validate_username(username: &str) -> Result<(), LudError> {
    if username.is_empty() {
        return Err(LudError::Validation("username is required".to_string()));
    }
    check_length("username", username, MAX_USERNAME_LENGTH)?;
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '.' | '@' | '+' | '-' | '_'))
    {
        return Err(LudError::Validation(format!(
            "username '{username}' may only contain letters, digits and @.+-_"
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), LudError> {
    check_length("email", email, MAX_EMAIL_LENGTH)?;
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(LudError::Validation(format!("'{email}' is not a valid email address")))
    }
}

/// Reject values longer than `max` bytes.
pub(crate) fn check_length(field: &str, value: &str, max: usize) -> Result<(), LudError> {
    if value.len() > max {
        return Err(LudError::Validation(format!(
            "{field} length {} exceeds maximum {max} bytes",
            value.len()
        )));
    }
    Ok(())
}

/// Reject empty (after trimming) or overlong values.
pub(crate) fn check_required(field: &str, value: &str, max: usize) -> Result<(), LudError> {
    if value.trim().is_empty() {
        return Err(LudError::Validation(format!("{field} is required")));
    }
    check_length(field, value, max)
}

// =============================================================================
// MENTEE
// =============================================================================

/// Program year of a mentee, always within `1..=4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ProgramYear(u8);

impl ProgramYear {
    pub const FIRST: ProgramYear = ProgramYear(FIRST_PROGRAM_YEAR);

    pub fn new(year: u8) -> Result<Self, LudError> {
        if (FIRST_PROGRAM_YEAR..=LAST_PROGRAM_YEAR).contains(&year) {
            Ok(Self(year))
        } else {
            Err(LudError::Validation(format!(
                "program year {year} is outside {FIRST_PROGRAM_YEAR}..={LAST_PROGRAM_YEAR}"
            )))
        }
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl Default for ProgramYear {
    fn default() -> Self {
        Self::FIRST
    }
}

impl TryFrom<u8> for ProgramYear {
    type Error = LudError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProgramYear> for u8 {
    fn from(year: ProgramYear) -> Self {
        year.0
    }
}

impl fmt::Display for ProgramYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Year {}", self.0)
    }
}

/// A program participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mentee {
    pub id: MenteeId,
    /// Back-reference to the mentee's own account, if linked.
    pub user: Option<UserId>,
    pub name: String,
    pub program_year: ProgramYear,
    pub is_active: bool,
}

/// Input for creating a mentee record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMentee {
    pub user: Option<UserId>,
    pub name: String,
    #[serde(default)]
    pub program_year: ProgramYear,
}

impl NewMentee {
    pub fn validate(&self) -> Result<(), LudError> {
        check_required("name", &self.name, MAX_NAME_LENGTH)
    }
}

// =============================================================================
// ASSIGNMENTS & LINKS
// =============================================================================

/// A time-bounded link between a mentor and a mentee.
///
/// `(mentor, mentee, start_date)` is unique across all rows; historical
/// assignments for the same pair are kept with different start dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub mentor: UserId,
    pub mentee: MenteeId,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
}

impl Assignment {
    /// Whether this assignment has passed its end date.
    #[must_use]
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.end_date.is_some_and(|end| end < today)
    }

    /// Active iff the flag is set AND the end date has not passed.
    #[must_use]
    pub fn is_current(&self, today: NaiveDate) -> bool {
        self.is_active && !self.is_expired(today)
    }

    /// The uniqueness key of an assignment row.
    #[must_use]
    pub fn key(&self) -> (UserId, MenteeId, NaiveDate) {
        (self.mentor, self.mentee, self.start_date)
    }
}

/// Directional link: `endorser` oversees `mentor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EndorserLink {
    pub endorser: UserId,
    pub mentor: UserId,
}

impl EndorserLink {
    #[must_use]
    pub const fn new(endorser: UserId, mentor: UserId) -> Self {
        Self { endorser, mentor }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the registry.
///
/// `Validation` and `PermissionDenied` are user-visible and recoverable;
/// callers must never treat them as fatal.
#[derive(Debug, Error)]
pub enum LudError {
    /// Input failed a field, range or uniqueness check. Nothing was persisted.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The requester is not allowed to perform the operation.
    #[error("Permission denied")]
    PermissionDenied,

    /// The referenced row does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A stored row could not be decoded.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O or storage engine error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn superuser_is_coerced_to_admin() {
        let mut new_user = NewUser::with_role("root", "root@example.org", Role::Mentor);
        new_user.is_superuser = true;
        let user = new_user.into_user(UserId(1));
        assert_eq!(user.role, Some(Role::Admin));
    }

    #[test]
    fn normalize_keeps_role_of_regular_user() {
        let mut user = NewUser::with_role("m1", "m1@example.org", Role::Mentor).into_user(UserId(1));
        user.normalize();
        assert_eq!(user.role, Some(Role::Mentor));
    }

    #[test]
    fn role_tag_parsing_is_lenient() {
        assert_eq!(Role::parse_tag(" Mentor "), Some(Role::Mentor));
        assert_eq!(Role::parse_tag("REVIEWER"), Some(Role::Reviewer));
        assert_eq!(Role::parse_tag("mentr"), None);
        assert_eq!(Role::parse_tag(""), None);
    }

    #[test]
    fn role_from_str_rejects_typos() {
        assert!("endorsr".parse::<Role>().is_err());
        assert_eq!("endorser".parse::<Role>().ok(), Some(Role::Endorser));
    }

    #[test]
    fn role_string_roundtrip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().ok(), Some(role));
            assert_eq!(role.to_string(), role.as_str());
        }
    }

    #[test]
    fn program_year_bounds() {
        assert!(ProgramYear::new(0).is_err());
        assert!(ProgramYear::new(5).is_err());
        assert_eq!(ProgramYear::new(4).map(ProgramYear::value).ok(), Some(4));
    }

    #[test]
    fn program_year_rejects_out_of_range_on_decode() {
        let decoded: Result<ProgramYear, _> = postcard::from_bytes(&[9u8]);
        assert!(decoded.is_err());
    }

    #[test]
    fn assignment_without_end_date_stays_current() {
        let assignment = Assignment {
            id: AssignmentId(1),
            mentor: UserId(1),
            mentee: MenteeId(1),
            start_date: date(2024, 1, 1),
            end_date: None,
            is_active: true,
        };
        assert!(assignment.is_current(date(2030, 1, 1)));
    }

    #[test]
    fn assignment_is_current_through_its_end_date() {
        let assignment = Assignment {
            id: AssignmentId(1),
            mentor: UserId(1),
            mentee: MenteeId(1),
            start_date: date(2024, 1, 1),
            end_date: Some(date(2024, 6, 1)),
            is_active: true,
        };
        assert!(assignment.is_current(date(2024, 6, 1)));
        assert!(!assignment.is_current(date(2024, 6, 2)));
    }

    #[test]
    fn inactive_assignment_is_never_current() {
        let assignment = Assignment {
            id: AssignmentId(1),
            mentor: UserId(1),
            mentee: MenteeId(1),
            start_date: date(2024, 1, 1),
            end_date: None,
            is_active: false,
        };
        assert!(!assignment.is_current(date(2024, 1, 2)));
    }

    #[test]
    fn email_validation() {
        assert!(validate_email("a@b.org").is_ok());
        assert!(validate_email("a.b@c").is_err());
        assert!(validate_email("@b.org").is_err());
        assert!(validate_email("a@@b.org").is_err());
        assert!(validate_email("plain").is_err());
    }

    #[test]
    fn display_name_prefers_profile_names() {
        let mut user = NewUser::with_role("jdoe", "j@d.org", Role::Mentee).into_user(UserId(3));
        assert_eq!(user.display_name(), "jdoe");
        user.profile.first_name = Some("Jane".to_string());
        user.profile.last_name = Some("Doe".to_string());
        assert_eq!(user.display_name(), "Jane Doe");
    }
}
