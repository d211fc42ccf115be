//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! Administrative commands act as the local operator, a superuser
//! requester. They go through the same core operations as the HTTP API, so
//! every validation still applies.

use crate::api::{self, CreateUserRequest, CreatedUserResponse};
use crate::config::{Backend, Config, StorageConfig};
use chrono::{NaiveDate, Utc};
use ludsuite_core::{
    AssignmentDraft, Directory, LudError, MenteeId, Requester, Role, UserId, UserProfile,
    assignment, can_access, primitives::MAX_IMPORT_ROWS, routing::redirect_for_user,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Requester used by administrative commands.
const OPERATOR: Requester = Requester::new(UserId(0), Some(Role::Admin), true);

// =============================================================================
// FILE LIMITS
// =============================================================================

/// Maximum file size for import (10 MB).
const MAX_IMPORT_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), LudError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| LudError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(LudError::Validation(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve symlinks and `..`, and require a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, LudError> {
    let canonical = path.canonicalize().map_err(|e| {
        LudError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(LudError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the directory selected by the storage settings.
pub fn open_directory(storage: &StorageConfig) -> Result<Directory, LudError> {
    match storage.backend {
        Backend::Redb => Directory::with_redb(&storage.database),
        Backend::Memory => Ok(Directory::new()),
    }
}

/// Warn once per mutating command when nothing will be kept.
fn warn_if_volatile(dir: &Directory) {
    if !dir.is_persistent() {
        tracing::warn!("In-memory backend: changes are discarded when the command exits");
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), LudError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| LudError::SerializationError(e.to_string()))?;
    println!("{}", rendered);
    Ok(())
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Build a user request from `user add` flags.
#[must_use]
pub fn user_request(
    username: String,
    email: String,
    role: Option<Role>,
    is_superuser: bool,
    program_year: Option<u8>,
    first_name: Option<String>,
    last_name: Option<String>,
) -> CreateUserRequest {
    CreateUserRequest {
        username,
        email,
        role: role.map(|r| r.as_str().to_string()),
        is_superuser,
        profile: UserProfile {
            first_name,
            last_name,
            ..UserProfile::default()
        },
        program_year,
    }
}

fn print_created(created: &CreatedUserResponse) {
    println!("Created user {} (id {})", created.user, created.user.id);
    if let Some(mentee) = &created.mentee {
        println!(
            "Created mentee record {} for {} ({})",
            mentee.id, mentee.name, mentee.program_year
        );
    }
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &Config) -> Result<(), LudError> {
    let directory = open_directory(&config.storage)?;

    println!("LUD Suite Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", config.server.host);
    println!("  Port:     {}", config.server.port);
    println!("  Backend:  {}", config.storage.backend.as_str());
    println!("  Database: {:?}", config.storage.database);
    println!();
    println!("Endpoints:");
    println!("  GET  /me/redirect   - Post-login destination");
    println!("  GET  /me/dashboard  - Role landing data");
    println!("  GET  /mentees       - Mentees visible to the caller");
    println!("  POST /assignments   - Assign a mentor (admin)");
    println!("  GET  /health        - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", config.server.host, config.server.port);
    api::run_server(&addr, directory, &config.security).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new database.
pub fn cmd_init(storage: &StorageConfig, force: bool) -> Result<(), LudError> {
    match storage.backend {
        Backend::Memory => {
            println!("In-memory backend needs no initialization");
            Ok(())
        }
        Backend::Redb => {
            let path = &storage.database;
            if path.exists() {
                if !force {
                    return Err(LudError::Validation(
                        "Database already exists. Use --force to overwrite.".to_string(),
                    ));
                }
                std::fs::remove_file(path)
                    .map_err(|e| LudError::IoError(format!("Remove db: {}", e)))?;
            }
            let _directory = Directory::with_redb(path)?;
            println!("Initialized new redb database at {:?}", path);
            Ok(())
        }
    }
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show row counts.
pub fn cmd_status(storage: &StorageConfig, json_mode: bool) -> Result<(), LudError> {
    let dir = open_directory(storage)?;
    let stats = dir.stats()?;

    if json_mode {
        return print_json(&serde_json::json!({
            "database": storage.database.to_string_lossy(),
            "backend": storage.backend.as_str(),
            "stats": stats,
        }));
    }

    println!("LUD Suite Status");
    println!("================");
    println!("Database: {:?}", storage.database);
    println!("Backend:  {}", storage.backend.as_str());
    println!();
    println!("Users:           {}", stats.users);
    println!("Mentees:         {}", stats.mentees);
    println!("Assignments:     {}", stats.assignments);
    println!("Endorser links:  {}", stats.endorser_links);
    println!("Activities:      {}", stats.activities);
    println!("Objectives:      {}", stats.objectives);
    println!("Year plan items: {}", stats.year_plan_items);
    println!("Assessments:     {}", stats.assessments);
    println!("Notifications:   {}", stats.notifications);
    println!("Work items:      {}", stats.work_items);

    Ok(())
}

// =============================================================================
// IMPORT COMMAND
// =============================================================================

/// A row the import rejected.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedRow {
    /// 1-based position in the input array.
    pub row: usize,
    pub error: String,
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub users: usize,
    pub mentees: usize,
    pub skipped: Vec<SkippedRow>,
}

/// Provision every row, skipping (and reporting) the ones that fail.
pub fn import_rows(dir: &mut Directory, rows: &[CreateUserRequest]) -> ImportReport {
    let mut report = ImportReport::default();
    for (index, row) in rows.iter().enumerate() {
        match row.provision(dir) {
            Ok(created) => {
                report.users += 1;
                if created.mentee.is_some() {
                    report.mentees += 1;
                }
            }
            Err(e) => {
                tracing::warn!(event = "import_row_skipped", row = index + 1, error = %e);
                report.skipped.push(SkippedRow {
                    row: index + 1,
                    error: e.to_string(),
                });
            }
        }
    }
    report
}

/// Provision users from a JSON array.
pub fn cmd_import(storage: &StorageConfig, json_mode: bool, file: &Path) -> Result<(), LudError> {
    let validated_path = validate_file_path(file)?;
    validate_file_size(&validated_path, MAX_IMPORT_FILE_SIZE)?;

    let contents = std::fs::read(&validated_path)
        .map_err(|e| LudError::IoError(format!("Read file: {}", e)))?;
    let rows: Vec<CreateUserRequest> = serde_json::from_slice(&contents)
        .map_err(|e| LudError::Validation(format!("Invalid import file: {}", e)))?;

    if rows.len() > MAX_IMPORT_ROWS {
        return Err(LudError::Validation(format!(
            "Row count {} exceeds maximum allowed {}",
            rows.len(),
            MAX_IMPORT_ROWS
        )));
    }

    tracing::info!("Importing {} rows from {:?}", rows.len(), validated_path);

    let mut dir = open_directory(storage)?;
    warn_if_volatile(&dir);
    let report = import_rows(&mut dir, &rows);

    if json_mode {
        return print_json(&report);
    }

    println!(
        "Imported {} users ({} mentee records)",
        report.users, report.mentees
    );
    for skipped in &report.skipped {
        println!("  Skipped row {}: {}", skipped.row, skipped.error);
    }
    Ok(())
}

// =============================================================================
// USER COMMANDS
// =============================================================================

/// Create one user.
pub fn cmd_user_add(
    storage: &StorageConfig,
    json_mode: bool,
    request: &CreateUserRequest,
) -> Result<(), LudError> {
    let mut dir = open_directory(storage)?;
    warn_if_volatile(&dir);
    let created = request.provision(&mut dir)?;

    if json_mode {
        return print_json(&created);
    }
    print_created(&created);
    Ok(())
}

/// List users, optionally only those with one effective role.
pub fn cmd_user_list(
    storage: &StorageConfig,
    json_mode: bool,
    role: Option<Role>,
) -> Result<(), LudError> {
    let dir = open_directory(storage)?;
    let users = match role {
        Some(role) => dir.users_with_role(role)?,
        None => dir.users()?,
    };

    if json_mode {
        return print_json(&users);
    }

    for user in &users {
        let status = if user.is_active { "" } else { " [inactive]" };
        println!("{:>5}  {} <{}>{}", user.id.0, user, user.email, status);
    }
    println!("{} users", users.len());
    Ok(())
}

// =============================================================================
// ASSIGNMENT COMMANDS
// =============================================================================

/// Assign a mentor to a mentee.
pub fn cmd_assign(
    storage: &StorageConfig,
    json_mode: bool,
    mentor: u64,
    mentee: u64,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(), LudError> {
    let mut dir = open_directory(storage)?;
    warn_if_volatile(&dir);

    let draft = AssignmentDraft {
        mentor: UserId(mentor),
        mentee: MenteeId(mentee),
        start_date: start,
        end_date: end,
    };
    let created = assignment::create_assignment(&mut dir, &OPERATOR, draft, today())?;

    if json_mode {
        return print_json(&created);
    }

    match created.end_date {
        Some(end) => println!(
            "Assignment {}: mentor {} -> mentee {} from {} to {}",
            created.id, created.mentor, created.mentee, created.start_date, end
        ),
        None => println!(
            "Assignment {}: mentor {} -> mentee {} from {}",
            created.id, created.mentor, created.mentee, created.start_date
        ),
    }
    Ok(())
}

/// Link or unlink a mentor and an endorser.
pub fn cmd_link(
    storage: &StorageConfig,
    json_mode: bool,
    endorser: u64,
    mentor: u64,
    remove: bool,
) -> Result<(), LudError> {
    let mut dir = open_directory(storage)?;
    warn_if_volatile(&dir);

    let mentors = if remove {
        assignment::remove_mentor(&mut dir, &OPERATOR, UserId(endorser), UserId(mentor))?
    } else {
        assignment::add_mentor(&mut dir, &OPERATOR, UserId(endorser), UserId(mentor))?
    };

    if json_mode {
        return print_json(&serde_json::json!({
            "endorser": endorser,
            "mentors": mentors,
        }));
    }

    let listed: Vec<String> = mentors.iter().map(|m| m.to_string()).collect();
    println!(
        "Endorser {} oversees {} mentors: [{}]",
        endorser,
        mentors.len(),
        listed.join(", ")
    );
    Ok(())
}

// =============================================================================
// DECISION COMMANDS
// =============================================================================

/// Evaluate the access predicate for a user and a mentee.
///
/// An inactive account is denied, as it would be by the HTTP API.
pub fn cmd_access(
    storage: &StorageConfig,
    json_mode: bool,
    requester: u64,
    mentee: u64,
    on: Option<NaiveDate>,
) -> Result<(), LudError> {
    let dir = open_directory(storage)?;
    let user = dir.require_user(UserId(requester))?;
    let on = on.unwrap_or_else(today);
    let allowed =
        user.is_active && can_access(&dir, &Requester::from_user(&user), MenteeId(mentee), on)?;

    if json_mode {
        return print_json(&api::AccessResponse {
            requester: user.id,
            mentee: MenteeId(mentee),
            on,
            allowed,
        });
    }

    let verdict = if allowed { "ALLOWED" } else { "DENIED" };
    println!("{} -> mentee {} on {}: {}", user, mentee, on, verdict);
    Ok(())
}

/// Show a user's post-login destination.
pub fn cmd_redirect(storage: &StorageConfig, json_mode: bool, user: u64) -> Result<(), LudError> {
    let dir = open_directory(storage)?;
    let user = dir.require_user(UserId(user))?;
    let destination = redirect_for_user(&user);

    if json_mode {
        return print_json(&api::RedirectResponse::new(user.effective_role(), destination));
    }
    println!("{} -> {}", user, destination);
    Ok(())
}

// =============================================================================
// MAINTENANCE
// =============================================================================

/// Compact the redb file.
pub fn cmd_compact(storage: &StorageConfig) -> Result<(), LudError> {
    if storage.backend != Backend::Redb {
        return Err(LudError::Validation(
            "compact requires the redb backend".to_string(),
        ));
    }
    let mut dir = open_directory(storage)?;
    dir.compact()?;
    println!("Compacted {:?}", storage.database);
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row(username: &str, role: &str, program_year: Option<u8>) -> CreateUserRequest {
        CreateUserRequest {
            username: username.to_string(),
            email: format!("{username}@example.org"),
            role: Some(role.to_string()),
            program_year,
            ..CreateUserRequest::default()
        }
    }

    #[test]
    fn import_skips_invalid_rows_and_keeps_valid_ones() {
        let mut dir = Directory::new();
        let rows = vec![
            row("mentor1", "mentor", None),
            row("mentee1", "mentee", Some(2)),
            row("mentee2", "mentee", Some(9)),
            row("mentor1", "mentor", None),
            row("legacy", "coach", None),
        ];

        let report = import_rows(&mut dir, &rows);

        assert_eq!(report.users, 3);
        assert_eq!(report.mentees, 1);
        let skipped: Vec<usize> = report.skipped.iter().map(|s| s.row).collect();
        assert_eq!(skipped, vec![3, 4]);

        let legacy = dir.user_by_username("legacy").unwrap().unwrap();
        assert_eq!(legacy.role, None);
        assert_eq!(dir.stats().unwrap().mentees, 1);
    }

    #[test]
    fn import_row_with_overlong_mentee_name_leaves_nothing_behind() {
        let mut dir = Directory::new();
        let mut rejected = row("amina", "mentee", Some(1));
        rejected.profile.first_name = Some("A".repeat(100));
        rejected.profile.last_name = Some("B".repeat(100));

        let report = import_rows(&mut dir, std::slice::from_ref(&rejected));

        assert_eq!(report.users, 0);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].error.contains("name"));
        assert_eq!(dir.stats().unwrap().users, 0);
        assert_eq!(dir.stats().unwrap().mentees, 0);

        // The corrected row goes through on retry.
        rejected.profile.last_name = None;
        let retry = import_rows(&mut dir, &[rejected]);
        assert!(retry.skipped.is_empty());
        assert_eq!(retry.mentees, 1);
    }

    #[test]
    fn import_row_with_blank_first_name_is_skipped() {
        let mut dir = Directory::new();
        let mut blank = row("blank", "mentee", Some(1));
        blank.profile.first_name = Some("   ".to_string());

        let report = import_rows(&mut dir, &[blank]);

        assert_eq!(report.skipped.len(), 1);
        assert!(dir.user_by_username("blank").unwrap().is_none());
    }

    #[test]
    fn print_json_renders_values() {
        assert!(print_json(&serde_json::json!({ "ok": true })).is_ok());
    }

    #[test]
    fn user_list_filters_by_effective_role() {
        let storage = StorageConfig {
            backend: Backend::Memory,
            ..StorageConfig::default()
        };
        assert!(cmd_user_list(&storage, true, Some(Role::Mentor)).is_ok());

        let mut dir = Directory::new();
        import_rows(
            &mut dir,
            &[
                row("m1", "mentor", None),
                row("r1", "reviewer", None),
                CreateUserRequest {
                    is_superuser: true,
                    ..row("root", "mentor", None)
                },
            ],
        );
        let mentors: Vec<String> = dir
            .users_with_role(Role::Mentor)
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(mentors, vec!["m1"]);
        assert_eq!(dir.users_with_role(Role::Admin).unwrap().len(), 1);
    }

    #[test]
    fn user_request_carries_profile_names() {
        let request = user_request(
            "amina".to_string(),
            "amina@example.org".to_string(),
            Some(Role::Mentee),
            false,
            Some(1),
            Some("Amina".to_string()),
            Some("Khan".to_string()),
        );
        let mut dir = Directory::new();
        let created = request.provision(&mut dir).unwrap();
        assert_eq!(created.mentee.unwrap().name, "Amina Khan");
    }

    #[test]
    fn operator_is_admin() {
        assert!(OPERATOR.is_admin());
    }
}
