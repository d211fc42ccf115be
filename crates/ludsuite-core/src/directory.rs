//! # Directory
//!
//! The typed unit-of-work facade over a storage backend.
//!
//! A `Directory` owns one backend and exposes users, mentees, assignments,
//! endorser links and owned records as typed values. Each mutating method
//! builds one [`WriteBatch`] and commits it, so a mutation either lands whole
//! or not at all.
//!
//! ## Storage Backends
//!
//! - `InMemory`: [`MemoryStore`] (fast, volatile)
//! - `Persistent`: [`RedbStore`] (disk-backed, ACID)
//!
//! Authorization is not checked here; see [`crate::access`],
//! [`crate::assignment`] and [`crate::tracking`].

use crate::access::AssignmentQuery;
use crate::primitives::MAX_NAME_LENGTH;
use crate::records::{
    Activity, MenteeAssessment, Notification, ObjectiveItem, WorkScheduleItem, YearPlanItem,
};
use crate::storage::{Collection, MemoryStore, RedbStore, RegistryStore, WriteBatch};
use crate::types::check_required;
use crate::{
    Assignment, AssignmentFilter, AssignmentId, EndorserLink, LudError, Mentee, MenteeId,
    NewMentee, NewUser, ProgramYear, RecordId, Role, User, UserId,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::path::Path;

/// Storage backend for a Directory.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory maps (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

/// Row counts per collection, for status output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryStats {
    pub users: usize,
    pub mentees: usize,
    pub assignments: usize,
    pub endorser_links: usize,
    pub activities: usize,
    pub objectives: usize,
    pub year_plan_items: usize,
    pub assessments: usize,
    pub notifications: usize,
    pub work_items: usize,
}

/// Typed access to the registry.
#[derive(Debug, Default)]
pub struct Directory {
    backend: StorageBackend,
}

impl Directory {
    /// Create a new empty directory with in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open or create a directory backed by a redb file.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, LudError> {
        Ok(Self {
            backend: StorageBackend::Persistent(RedbStore::open(path)?),
        })
    }

    /// Whether writes survive a restart.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    fn store(&self) -> &dyn RegistryStore {
        match &self.backend {
            StorageBackend::InMemory(store) => store,
            StorageBackend::Persistent(store) => store,
        }
    }

    fn store_mut(&mut self) -> &mut dyn RegistryStore {
        match &mut self.backend {
            StorageBackend::InMemory(store) => store,
            StorageBackend::Persistent(store) => store,
        }
    }

    // =========================================================================
    // ROW CODEC
    // =========================================================================

    fn encode<T: Serialize>(row: &T) -> Result<Vec<u8>, LudError> {
        postcard::to_allocvec(row).map_err(|e| LudError::SerializationError(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, LudError> {
        postcard::from_bytes(bytes).map_err(|e| LudError::DeserializationError(e.to_string()))
    }

    fn load<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: u64,
    ) -> Result<Option<T>, LudError> {
        self.store()
            .get(collection, id)?
            .map(|bytes| Self::decode(&bytes))
            .transpose()
    }

    fn load_all<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>, LudError> {
        self.store()
            .scan(collection)?
            .iter()
            .map(|(_, bytes)| Self::decode(bytes))
            .collect()
    }

    /// Allocate the next id of `collection`, build the row and commit it.
    pub(crate) fn insert_row<T: Serialize>(
        &mut self,
        collection: Collection,
        build: impl FnOnce(u64) -> T,
    ) -> Result<T, LudError> {
        let id = self.store().next_id(collection)?;
        let row = build(id);
        let mut batch = WriteBatch::new();
        batch
            .put(collection, id, Self::encode(&row)?)
            .set_next_id(collection, id.saturating_add(1));
        self.store_mut().commit(batch)?;
        Ok(row)
    }

    /// Overwrite an existing row.
    pub(crate) fn replace_row<T: Serialize>(
        &mut self,
        collection: Collection,
        id: u64,
        row: &T,
    ) -> Result<(), LudError> {
        let mut batch = WriteBatch::new();
        batch.put(collection, id, Self::encode(row)?);
        self.store_mut().commit(batch)
    }

    pub(crate) fn delete_row(&mut self, collection: Collection, id: u64) -> Result<(), LudError> {
        let mut batch = WriteBatch::new();
        batch.delete(collection, id);
        self.store_mut().commit(batch)
    }

    pub(crate) fn commit(&mut self, batch: WriteBatch) -> Result<(), LudError> {
        self.store_mut().commit(batch)
    }

    // =========================================================================
    // USERS
    // =========================================================================

    /// Create a user. Username and email must be unique.
    pub fn create_user(&mut self, new_user: NewUser) -> Result<User, LudError> {
        let candidate = new_user.into_user(UserId(0));
        candidate.validate()?;
        self.check_unique_identity(&candidate)?;
        self.insert_row(Collection::Users, |id| User {
            id: UserId(id),
            ..candidate
        })
    }

    /// Create a mentee account together with its mentee record, named after
    /// the user.
    ///
    /// Both rows are validated first and land in one batch, so a rejected
    /// record never leaves the account behind.
    pub fn create_mentee_user(
        &mut self,
        new_user: NewUser,
        program_year: ProgramYear,
    ) -> Result<(User, Mentee), LudError> {
        let candidate = new_user.into_user(UserId(0));
        candidate.validate()?;
        self.check_unique_identity(&candidate)?;
        let record = NewMentee {
            user: None,
            name: candidate.display_name(),
            program_year,
        };
        record.validate()?;

        let user_id = self.store().next_id(Collection::Users)?;
        let mentee_id = self.store().next_id(Collection::Mentees)?;
        let user = User {
            id: UserId(user_id),
            ..candidate
        };
        let mentee = Mentee {
            id: MenteeId(mentee_id),
            user: Some(user.id),
            name: record.name.trim().to_string(),
            program_year,
            is_active: true,
        };

        let mut batch = WriteBatch::new();
        batch
            .put(Collection::Users, user_id, Self::encode(&user)?)
            .set_next_id(Collection::Users, user_id.saturating_add(1))
            .put(Collection::Mentees, mentee_id, Self::encode(&mentee)?)
            .set_next_id(Collection::Mentees, mentee_id.saturating_add(1));
        self.commit(batch)?;
        Ok((user, mentee))
    }

    /// Save changes to an existing user. Re-applies superuser coercion.
    pub fn update_user(&mut self, mut user: User) -> Result<User, LudError> {
        user.normalize();
        user.validate()?;
        self.require_user(user.id)?;
        self.check_unique_identity(&user)?;
        self.replace_row(Collection::Users, user.id.0, &user)?;
        Ok(user)
    }

    fn check_unique_identity(&self, candidate: &User) -> Result<(), LudError> {
        for existing in self.users()? {
            if existing.id == candidate.id {
                continue;
            }
            if existing.username == candidate.username {
                return Err(LudError::Validation(format!(
                    "username '{}' is already taken",
                    candidate.username
                )));
            }
            if existing.email.eq_ignore_ascii_case(&candidate.email) {
                return Err(LudError::Validation(format!(
                    "email '{}' is already registered",
                    candidate.email
                )));
            }
        }
        Ok(())
    }

    pub fn user(&self, id: UserId) -> Result<Option<User>, LudError> {
        self.load(Collection::Users, id.0)
    }

    pub fn require_user(&self, id: UserId) -> Result<User, LudError> {
        self.user(id)?
            .ok_or_else(|| LudError::NotFound(id.to_string()))
    }

    pub fn users(&self) -> Result<Vec<User>, LudError> {
        self.load_all(Collection::Users)
    }

    /// Users whose effective role is `role`.
    pub fn users_with_role(&self, role: Role) -> Result<Vec<User>, LudError> {
        Ok(self
            .users()?
            .into_iter()
            .filter(|u| u.effective_role() == Some(role))
            .collect())
    }

    /// Lookup by email, ignoring ASCII case.
    pub fn user_by_email(&self, email: &str) -> Result<Option<User>, LudError> {
        let email = email.trim();
        Ok(self
            .users()?
            .into_iter()
            .find(|u| u.email.eq_ignore_ascii_case(email)))
    }

    pub fn user_by_username(&self, username: &str) -> Result<Option<User>, LudError> {
        Ok(self.users()?.into_iter().find(|u| u.username == username))
    }

    /// Delete a user and everything that hangs off them.
    ///
    /// Removes their mentor assignments, endorser links in both directions,
    /// logged activities, work schedule and authored notifications. A linked mentee record
    /// is kept with its `user` cleared. Returns `false` if no such user.
    pub fn delete_user(&mut self, id: UserId) -> Result<bool, LudError> {
        if self.user(id)?.is_none() {
            return Ok(false);
        }

        let mut batch = WriteBatch::new();
        batch.delete(Collection::Users, id.0);

        for assignment in self.all_assignments()? {
            if assignment.mentor == id {
                batch.delete(Collection::Assignments, assignment.id.0);
            }
        }
        for link in self.store().links()? {
            if link.endorser == id || link.mentor == id {
                batch.unlink(link);
            }
        }
        for activity in self.activities()? {
            if activity.mentor == id {
                batch.delete(Collection::Activities, activity.id.0);
            }
        }
        for notification in self.notifications()? {
            if notification.created_by == id {
                batch.delete(Collection::Notifications, notification.id.0);
            }
        }
        for item in self.work_items()? {
            if item.mentor == id {
                batch.delete(Collection::WorkSchedule, item.id.0);
            }
        }
        if let Some(mut mentee) = self.mentee_for_user(id)? {
            mentee.user = None;
            batch.put(Collection::Mentees, mentee.id.0, Self::encode(&mentee)?);
        }

        self.commit(batch)?;
        Ok(true)
    }

    // =========================================================================
    // MENTEES
    // =========================================================================

    /// Create a mentee record, optionally linked to a user.
    ///
    /// A user can back at most one mentee.
    pub fn create_mentee(&mut self, new_mentee: NewMentee) -> Result<Mentee, LudError> {
        new_mentee.validate()?;
        if let Some(user_id) = new_mentee.user {
            self.check_mentee_link(user_id, None)?;
        }
        self.insert_row(Collection::Mentees, |id| Mentee {
            id: MenteeId(id),
            user: new_mentee.user,
            name: new_mentee.name.trim().to_string(),
            program_year: new_mentee.program_year,
            is_active: true,
        })
    }

    /// Save changes to a mentee (name, year, active flag, user link).
    ///
    /// Relinking to a user that already backs another mentee is rejected.
    pub fn update_mentee(&mut self, mut mentee: Mentee) -> Result<Mentee, LudError> {
        check_required("name", &mentee.name, MAX_NAME_LENGTH)?;
        self.require_mentee(mentee.id)?;
        if let Some(user_id) = mentee.user {
            self.check_mentee_link(user_id, Some(mentee.id))?;
        }
        mentee.name = mentee.name.trim().to_string();
        self.replace_row(Collection::Mentees, mentee.id.0, &mentee)?;
        Ok(mentee)
    }

    fn check_mentee_link(&self, user_id: UserId, except: Option<MenteeId>) -> Result<(), LudError> {
        self.require_user(user_id)?;
        match self.mentee_for_user(user_id)? {
            Some(existing) if Some(existing.id) != except => Err(LudError::Validation(format!(
                "{user_id} already has mentee record {}",
                existing.id
            ))),
            _ => Ok(()),
        }
    }

    pub fn mentee(&self, id: MenteeId) -> Result<Option<Mentee>, LudError> {
        self.load(Collection::Mentees, id.0)
    }

    pub fn require_mentee(&self, id: MenteeId) -> Result<Mentee, LudError> {
        self.mentee(id)?
            .ok_or_else(|| LudError::NotFound(id.to_string()))
    }

    pub fn mentees(&self) -> Result<Vec<Mentee>, LudError> {
        self.load_all(Collection::Mentees)
    }

    /// The mentee record backed by `user`, if one is linked.
    pub fn mentee_for_user(&self, user: UserId) -> Result<Option<Mentee>, LudError> {
        Ok(self.mentees()?.into_iter().find(|m| m.user == Some(user)))
    }

    // =========================================================================
    // ASSIGNMENTS
    // =========================================================================

    pub fn assignment(&self, id: AssignmentId) -> Result<Option<Assignment>, LudError> {
        self.load(Collection::Assignments, id.0)
    }

    pub fn all_assignments(&self) -> Result<Vec<Assignment>, LudError> {
        self.load_all(Collection::Assignments)
    }

    // =========================================================================
    // ENDORSER LINKS
    // =========================================================================

    /// Mentors overseen by `endorser`.
    pub fn linked_mentors(&self, endorser: UserId) -> Result<BTreeSet<UserId>, LudError> {
        Ok(self
            .store()
            .links()?
            .into_iter()
            .filter(|l| l.endorser == endorser)
            .map(|l| l.mentor)
            .collect())
    }

    /// Endorsers overseeing `mentor`.
    pub fn endorsers_of(&self, mentor: UserId) -> Result<BTreeSet<UserId>, LudError> {
        Ok(self
            .store()
            .links()?
            .into_iter()
            .filter(|l| l.mentor == mentor)
            .map(|l| l.endorser)
            .collect())
    }

    pub fn is_linked(&self, endorser: UserId, mentor: UserId) -> Result<bool, LudError> {
        Ok(self
            .store()
            .links()?
            .contains(&EndorserLink::new(endorser, mentor)))
    }

    // =========================================================================
    // OWNED RECORDS
    // =========================================================================

    pub fn activity(&self, id: RecordId) -> Result<Option<Activity>, LudError> {
        self.load(Collection::Activities, id.0)
    }

    pub fn activities(&self) -> Result<Vec<Activity>, LudError> {
        self.load_all(Collection::Activities)
    }

    pub fn objective(&self, id: RecordId) -> Result<Option<ObjectiveItem>, LudError> {
        self.load(Collection::Objectives, id.0)
    }

    pub fn objectives(&self) -> Result<Vec<ObjectiveItem>, LudError> {
        self.load_all(Collection::Objectives)
    }

    pub fn year_plan_item(&self, id: RecordId) -> Result<Option<YearPlanItem>, LudError> {
        self.load(Collection::YearPlan, id.0)
    }

    pub fn year_plan_items(&self) -> Result<Vec<YearPlanItem>, LudError> {
        self.load_all(Collection::YearPlan)
    }

    pub fn assessment(&self, id: RecordId) -> Result<Option<MenteeAssessment>, LudError> {
        self.load(Collection::Assessments, id.0)
    }

    pub fn assessments(&self) -> Result<Vec<MenteeAssessment>, LudError> {
        self.load_all(Collection::Assessments)
    }

    pub fn notifications(&self) -> Result<Vec<Notification>, LudError> {
        self.load_all(Collection::Notifications)
    }

    pub fn work_item(&self, id: RecordId) -> Result<Option<WorkScheduleItem>, LudError> {
        self.load(Collection::WorkSchedule, id.0)
    }

    pub fn work_items(&self) -> Result<Vec<WorkScheduleItem>, LudError> {
        self.load_all(Collection::WorkSchedule)
    }

    // =========================================================================
    // STATUS
    // =========================================================================

    pub fn stats(&self) -> Result<DirectoryStats, LudError> {
        let store = self.store();
        Ok(DirectoryStats {
            users: store.count(Collection::Users)?,
            mentees: store.count(Collection::Mentees)?,
            assignments: store.count(Collection::Assignments)?,
            endorser_links: store.links()?.len(),
            activities: store.count(Collection::Activities)?,
            objectives: store.count(Collection::Objectives)?,
            year_plan_items: store.count(Collection::YearPlan)?,
            assessments: store.count(Collection::Assessments)?,
            notifications: store.count(Collection::Notifications)?,
            work_items: store.count(Collection::WorkSchedule)?,
        })
    }

    /// Reclaim free pages of a redb file. A no-op in memory.
    pub fn compact(&mut self) -> Result<(), LudError> {
        match &mut self.backend {
            StorageBackend::InMemory(_) => Ok(()),
            StorageBackend::Persistent(store) => store.compact(),
        }
    }
}

impl AssignmentQuery for Directory {
    fn assignments(&self, filter: &AssignmentFilter) -> Result<Vec<Assignment>, LudError> {
        Ok(self
            .all_assignments()?
            .into_iter()
            .filter(|a| filter.matches(a))
            .collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================
