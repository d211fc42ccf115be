//! # ludsuite-core
//!
//! The access-control and record registry for LUD Suite - THE LOGIC.
//!
//! This crate decides which endorser, mentor or reviewer may see which
//! mentee's data, and stores the records those decisions guard: users,
//! mentees, mentor-mentee assignments, endorser-mentor links, activities,
//! work schedules, objectives, year plans, assessments and notifications.
//!
//! ## Architectural Constraints
//!
//! - Requester identity and the current date are explicit arguments;
//!   nothing is read from ambient state
//! - Roles are a closed enum matched exhaustively
//! - Every mutation is one atomic [`storage::WriteBatch`]
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod access;
pub mod assignment;
pub mod dashboard;
pub mod directory;
pub mod notifications;
pub mod primitives;
pub mod records;
pub mod routing;
pub mod storage;
pub mod tracking;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Assignment, AssignmentId, EndorserLink, LudError, Mentee, MenteeId, NewMentee, NewUser,
    ProgramYear, RecordId, Role, User, UserId, UserProfile,
};

// =============================================================================
// RE-EXPORTS: Records
// =============================================================================

pub use records::{
    Activity, ActivityKind, MenteeAssessment, NewActivity, NewAssessment, NewNotification,
    NewObjective, NewWorkScheduleItem, NewYearPlanItem, Notification, NotificationTarget,
    ObjectiveItem, ObjectiveStatus, QuarterHours, Rating, RatingDomain, WorkScheduleItem,
    YearPlanItem,
};

// =============================================================================
// RE-EXPORTS: Registry & Access
// =============================================================================

pub use access::{AssignmentFilter, AssignmentQuery, Requester, can_access};
pub use assignment::AssignmentDraft;
pub use dashboard::Dashboard;
pub use directory::{Directory, DirectoryStats, StorageBackend};
pub use routing::{Destination, redirect_for};
pub use storage::{MemoryStore, RedbStore, RegistryStore};
