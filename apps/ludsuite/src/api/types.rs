//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API. Core types that
//! already carry serde derives (`Mentee`, `Assignment`, `Activity`, ...) are
//! sent as-is; the types here cover request shapes and wrappers.

use chrono::NaiveDate;
use ludsuite_core::{
    Destination, Directory, LudError, Mentee, MenteeId, NewUser, ProgramYear, Role, User, UserId,
    UserProfile,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Body of every non-2xx response produced by a handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// =============================================================================
// IDENTITY
// =============================================================================

/// Where the caller lands after login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectResponse {
    pub role: Option<Role>,
    pub path: String,
}

impl RedirectResponse {
    #[must_use]
    pub fn new(role: Option<Role>, destination: Destination) -> Self {
        Self {
            role,
            path: destination.path().to_string(),
        }
    }
}

/// User creation request.
///
/// `role` is a raw tag: unknown values are stored as an unset role rather
/// than rejected. A `mentee` user also gets a mentee record when
/// `program_year` is given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub profile: UserProfile,
    #[serde(default)]
    pub program_year: Option<u8>,
}

impl CreateUserRequest {
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.role.as_deref().and_then(Role::parse_tag)
    }

    #[must_use]
    pub fn to_new_user(&self) -> NewUser {
        NewUser {
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role(),
            is_superuser: self.is_superuser,
            profile: self.profile.clone(),
        }
    }

    /// Program year of the mentee record to create alongside the account.
    ///
    /// `None` unless the role is `mentee` and a year was given.
    pub fn mentee_year(&self) -> Result<Option<ProgramYear>, LudError> {
        match (self.role(), self.program_year) {
            (Some(Role::Mentee), Some(year)) => ProgramYear::new(year).map(Some),
            _ => Ok(None),
        }
    }

    /// Create the account and, for mentees with a program year, the linked
    /// mentee record named after the user.
    ///
    /// Account and record are written together: if either is invalid,
    /// nothing is stored.
    pub fn provision(&self, dir: &mut Directory) -> Result<CreatedUserResponse, LudError> {
        match self.mentee_year()? {
            Some(program_year) => {
                let (user, mentee) = dir.create_mentee_user(self.to_new_user(), program_year)?;
                Ok(CreatedUserResponse {
                    user,
                    mentee: Some(mentee),
                })
            }
            None => Ok(CreatedUserResponse {
                user: dir.create_user(self.to_new_user())?,
                mentee: None,
            }),
        }
    }
}

/// A created account and, for mentees, their mentee record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedUserResponse {
    pub user: User,
    pub mentee: Option<Mentee>,
}

/// Result of a delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

// =============================================================================
// MENTEES
// =============================================================================

fn default_active() -> bool {
    true
}

/// Body of `PUT /mentees/{id}`. Replaces every editable field; an omitted
/// `user` unlinks the account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMenteeRequest {
    #[serde(default)]
    pub user: Option<UserId>,
    pub name: String,
    pub program_year: ProgramYear,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl UpdateMenteeRequest {
    #[must_use]
    pub fn into_mentee(self, id: MenteeId) -> Mentee {
        Mentee {
            id,
            user: self.user,
            name: self.name,
            program_year: self.program_year,
            is_active: self.is_active,
        }
    }
}

// =============================================================================
// ACCESS
// =============================================================================

/// Access decision for the caller on one mentee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessResponse {
    pub requester: UserId,
    pub mentee: MenteeId,
    pub on: NaiveDate,
    pub allowed: bool,
}

// =============================================================================
// ASSIGNMENTS & LINKS
// =============================================================================

/// Body of `POST /assignments/{id}/end`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndAssignmentRequest {
    pub end_date: NaiveDate,
}

/// Body of `PUT /endorsers/{id}/mentors`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MentorSetRequest {
    pub mentors: Vec<UserId>,
}

/// An endorser's full mentor set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentorSetResponse {
    pub endorser: UserId,
    pub mentors: Vec<UserId>,
}

// =============================================================================
// RECORDS
// =============================================================================

/// Body of every `PUT .../feedback` endpoint. An empty string clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackRequest {
    #[serde(default)]
    pub feedback: String,
}
