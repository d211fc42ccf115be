//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Handlers resolve the caller through [`CurrentUser`], take the directory
//! lock, and delegate every decision to `ludsuite-core`. Listings take the
//! read lock; mutations take the write lock for their whole unit of work.

use super::{
    AppState,
    auth::CurrentUser,
    types::{
        AccessResponse, CreateUserRequest, CreatedUserResponse, DeleteResponse,
        EndAssignmentRequest, ErrorResponse, FeedbackRequest, HealthResponse, MentorSetRequest,
        MentorSetResponse, RedirectResponse, UpdateMenteeRequest,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use ludsuite_core::{
    Activity, Assignment, AssignmentDraft, AssignmentId, Dashboard, LudError, Mentee,
    MenteeAssessment, MenteeId, NewActivity, NewAssessment, NewMentee, NewNotification,
    NewObjective, NewWorkScheduleItem, NewYearPlanItem, Notification, ObjectiveItem, RecordId,
    UserId, WorkScheduleItem, YearPlanItem,
    access::{self, can_access, ensure, require_admin},
    assignment, dashboard, notifications, redirect_for, tracking,
};
use std::collections::BTreeSet;

/// 403 body for requests without a resolvable requester.
pub const NOT_LOGGED_IN: &str = "You must be logged in to access this page.";

/// 403 body for access denials.
pub const NOT_ALLOWED: &str = "You are not allowed to access this page.";

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// Error returned by every handler.
#[derive(Debug)]
pub enum ApiError {
    /// No `X-Requester-Id`, or it names no active user.
    NotLoggedIn,
    Core(LudError),
}

impl From<LudError> for ApiError {
    fn from(e: LudError) -> Self {
        Self::Core(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotLoggedIn => (StatusCode::FORBIDDEN, NOT_LOGGED_IN.to_string()),
            ApiError::Core(LudError::PermissionDenied) => {
                tracing::warn!(event = "access_denied", "Request denied by access predicate");
                (StatusCode::FORBIDDEN, NOT_ALLOWED.to_string())
            }
            ApiError::Core(e @ LudError::Validation(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            ApiError::Core(e @ LudError::NotFound(_)) => (StatusCode::NOT_FOUND, e.to_string()),
            ApiError::Core(e) => {
                tracing::error!(event = "storage_error", error = %e, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;
type Created<T> = Result<(StatusCode, Json<T>), ApiError>;

fn created<T>(value: T) -> Created<T> {
    Ok((StatusCode::CREATED, Json(value)))
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// IDENTITY HANDLERS
// =============================================================================

/// Post-login destination for the caller.
pub async fn redirect_handler(current: CurrentUser) -> Json<RedirectResponse> {
    let role = current.requester.effective_role();
    Json(RedirectResponse::new(role, redirect_for(role)))
}

/// Landing data for the caller's role.
pub async fn dashboard_handler(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Dashboard> {
    let dir = state.directory.read().await;
    Ok(Json(dashboard::dashboard_for(
        &dir,
        &current.requester,
        state.today(),
    )?))
}

/// Create an account. Admin only.
pub async fn create_user_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<CreateUserRequest>,
) -> Created<CreatedUserResponse> {
    require_admin(&current.requester)?;
    let mut dir = state.directory.write().await;
    let created_user = request.provision(&mut dir)?;
    let user = &created_user.user;

    tracing::info!(
        event = "user_created",
        user = user.id.0,
        role = ?user.role,
        by = current.user.id.0,
        "Created user {}",
        user.username
    );
    created(created_user)
}

/// Delete an account and its dependent rows. Admin only.
pub async fn delete_user_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
) -> ApiResult<DeleteResponse> {
    require_admin(&current.requester)?;
    let mut dir = state.directory.write().await;
    let deleted = dir.delete_user(UserId(id))?;
    if deleted {
        tracing::info!(event = "user_deleted", user = id, by = current.user.id.0);
    }
    Ok(Json(DeleteResponse { deleted }))
}

// =============================================================================
// MENTEE HANDLERS
// =============================================================================

/// Mentees visible to the caller.
pub async fn list_mentees_handler(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Vec<Mentee>> {
    let dir = state.directory.read().await;
    Ok(Json(access::visible_mentees(
        &dir,
        &current.requester,
        state.today(),
    )?))
}

/// Create a mentee record. Admin only.
pub async fn create_mentee_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<NewMentee>,
) -> Created<Mentee> {
    require_admin(&current.requester)?;
    let mut dir = state.directory.write().await;
    let mentee = dir.create_mentee(request)?;
    tracing::info!(event = "mentee_created", mentee = mentee.id.0);
    created(mentee)
}

pub async fn get_mentee_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
) -> ApiResult<Mentee> {
    let mentee = MenteeId(id);
    let dir = state.directory.read().await;
    ensure(access::can_read_mentee_records(
        &dir,
        &current.requester,
        mentee,
        state.today(),
    )?)?;
    Ok(Json(dir.require_mentee(mentee)?))
}

/// Edit a mentee record, including relinking its account. Admin only.
pub async fn update_mentee_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
    Json(request): Json<UpdateMenteeRequest>,
) -> ApiResult<Mentee> {
    require_admin(&current.requester)?;
    let mut dir = state.directory.write().await;
    let mentee = dir.update_mentee(request.into_mentee(MenteeId(id)))?;
    tracing::info!(
        event = "mentee_updated",
        mentee = id,
        user = ?mentee.user.map(|u| u.0),
        by = current.user.id.0
    );
    Ok(Json(mentee))
}

/// The raw access decision for the caller on one mentee.
pub async fn access_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
) -> ApiResult<AccessResponse> {
    let today = state.today();
    let dir = state.directory.read().await;
    let allowed = can_access(&*dir, &current.requester, MenteeId(id), today)?;
    Ok(Json(AccessResponse {
        requester: current.requester.id,
        mentee: MenteeId(id),
        on: today,
        allowed,
    }))
}

// =============================================================================
// ASSIGNMENT HANDLERS
// =============================================================================

/// Current assignments of a mentor.
pub async fn mentor_assignments_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
) -> ApiResult<Vec<Assignment>> {
    let mentor = UserId(id);
    let dir = state.directory.read().await;
    ensure(access::can_view_mentor(&dir, &current.requester, mentor)?)?;
    Ok(Json(access::active_assignments_for_mentor(
        &*dir,
        mentor,
        state.today(),
    )?))
}

pub async fn create_assignment_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(draft): Json<AssignmentDraft>,
) -> Created<Assignment> {
    let mut dir = state.directory.write().await;
    let created_row =
        assignment::create_assignment(&mut dir, &current.requester, draft, state.today())?;
    tracing::info!(
        event = "assignment_created",
        assignment = created_row.id.0,
        mentor = created_row.mentor.0,
        mentee = created_row.mentee.0
    );
    created(created_row)
}

pub async fn deactivate_assignment_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
) -> ApiResult<Assignment> {
    let mut dir = state.directory.write().await;
    let updated = assignment::deactivate_assignment(&mut dir, &current.requester, AssignmentId(id))?;
    tracing::info!(event = "assignment_deactivated", assignment = id);
    Ok(Json(updated))
}

pub async fn reactivate_assignment_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
) -> ApiResult<Assignment> {
    let mut dir = state.directory.write().await;
    let updated = assignment::reactivate_assignment(&mut dir, &current.requester, AssignmentId(id))?;
    tracing::info!(event = "assignment_reactivated", assignment = id);
    Ok(Json(updated))
}

pub async fn end_assignment_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
    Json(request): Json<EndAssignmentRequest>,
) -> ApiResult<Assignment> {
    let mut dir = state.directory.write().await;
    let updated = assignment::end_assignment(
        &mut dir,
        &current.requester,
        AssignmentId(id),
        request.end_date,
    )?;
    tracing::info!(event = "assignment_ended", assignment = id, end_date = %request.end_date);
    Ok(Json(updated))
}

// =============================================================================
// ENDORSER LINKAGE HANDLERS
// =============================================================================

fn mentor_set(endorser: u64, mentors: BTreeSet<UserId>) -> Json<MentorSetResponse> {
    Json(MentorSetResponse {
        endorser: UserId(endorser),
        mentors: mentors.into_iter().collect(),
    })
}

pub async fn linked_mentors_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
) -> ApiResult<MentorSetResponse> {
    let dir = state.directory.read().await;
    let mentors = assignment::linked_mentors(&dir, &current.requester, UserId(id))?;
    Ok(mentor_set(id, mentors))
}

/// Replace the endorser's mentor set.
pub async fn set_mentors_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
    Json(request): Json<MentorSetRequest>,
) -> ApiResult<MentorSetResponse> {
    let mut dir = state.directory.write().await;
    let mentors =
        assignment::set_mentors(&mut dir, &current.requester, UserId(id), request.mentors)?;
    tracing::info!(event = "endorser_mentors_set", endorser = id, count = mentors.len());
    Ok(mentor_set(id, mentors))
}

pub async fn add_mentor_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((id, mentor_id)): Path<(u64, u64)>,
) -> ApiResult<MentorSetResponse> {
    let mut dir = state.directory.write().await;
    let mentors =
        assignment::add_mentor(&mut dir, &current.requester, UserId(id), UserId(mentor_id))?;
    Ok(mentor_set(id, mentors))
}

pub async fn remove_mentor_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((id, mentor_id)): Path<(u64, u64)>,
) -> ApiResult<MentorSetResponse> {
    let mut dir = state.directory.write().await;
    let mentors =
        assignment::remove_mentor(&mut dir, &current.requester, UserId(id), UserId(mentor_id))?;
    Ok(mentor_set(id, mentors))
}

// =============================================================================
// ACTIVITY HANDLERS
// =============================================================================

pub async fn log_activity_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<NewActivity>,
) -> Created<Activity> {
    let mut dir = state.directory.write().await;
    created(tracking::log_activity(&mut dir, &current.requester, request)?)
}

pub async fn my_activities_handler(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Vec<Activity>> {
    let dir = state.directory.read().await;
    Ok(Json(tracking::my_activities(&dir, &current.requester)?))
}

pub async fn mentor_activities_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
) -> ApiResult<Vec<Activity>> {
    let dir = state.directory.read().await;
    Ok(Json(tracking::activities_for_mentor(
        &dir,
        &current.requester,
        UserId(id),
    )?))
}

pub async fn get_activity_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
) -> ApiResult<Activity> {
    let dir = state.directory.read().await;
    Ok(Json(tracking::activity(&dir, &current.requester, RecordId(id))?))
}

pub async fn activity_feedback_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
    Json(request): Json<FeedbackRequest>,
) -> ApiResult<Activity> {
    let mut dir = state.directory.write().await;
    Ok(Json(tracking::set_activity_feedback(
        &mut dir,
        &current.requester,
        RecordId(id),
        &request.feedback,
    )?))
}

// =============================================================================
// WORK SCHEDULE HANDLERS
// =============================================================================

pub async fn work_schedule_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
) -> ApiResult<Vec<WorkScheduleItem>> {
    let dir = state.directory.read().await;
    Ok(Json(tracking::work_schedule_for(
        &dir,
        &current.requester,
        UserId(id),
    )?))
}

pub async fn add_work_item_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
    Json(request): Json<NewWorkScheduleItem>,
) -> Created<WorkScheduleItem> {
    let mut dir = state.directory.write().await;
    let item = tracking::add_work_item(
        &mut dir,
        &current.requester,
        UserId(id),
        request,
        Utc::now(),
    )?;
    tracing::info!(event = "work_item_added", item = item.id.0, mentor = id);
    created(item)
}

pub async fn update_work_item_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
    Json(request): Json<NewWorkScheduleItem>,
) -> ApiResult<WorkScheduleItem> {
    let mut dir = state.directory.write().await;
    Ok(Json(tracking::update_work_item(
        &mut dir,
        &current.requester,
        RecordId(id),
        request,
    )?))
}

pub async fn delete_work_item_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
) -> ApiResult<DeleteResponse> {
    let mut dir = state.directory.write().await;
    tracking::delete_work_item(&mut dir, &current.requester, RecordId(id))?;
    tracing::info!(event = "work_item_deleted", item = id, by = current.user.id.0);
    Ok(Json(DeleteResponse { deleted: true }))
}

// =============================================================================
// MENTEE RECORD HANDLERS
// =============================================================================

pub async fn add_objective_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
    Json(request): Json<NewObjective>,
) -> Created<ObjectiveItem> {
    let mut dir = state.directory.write().await;
    created(tracking::add_objective(
        &mut dir,
        &current.requester,
        MenteeId(id),
        request,
    )?)
}

pub async fn list_objectives_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
) -> ApiResult<Vec<ObjectiveItem>> {
    let dir = state.directory.read().await;
    Ok(Json(tracking::objectives_for(
        &dir,
        &current.requester,
        MenteeId(id),
        state.today(),
    )?))
}

pub async fn update_objective_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
    Json(request): Json<NewObjective>,
) -> ApiResult<ObjectiveItem> {
    let mut dir = state.directory.write().await;
    Ok(Json(tracking::update_objective(
        &mut dir,
        &current.requester,
        RecordId(id),
        request,
    )?))
}

pub async fn objective_feedback_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
    Json(request): Json<FeedbackRequest>,
) -> ApiResult<ObjectiveItem> {
    let mut dir = state.directory.write().await;
    Ok(Json(tracking::set_objective_feedback(
        &mut dir,
        &current.requester,
        RecordId(id),
        &request.feedback,
        state.today(),
    )?))
}

pub async fn add_year_plan_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
    Json(request): Json<NewYearPlanItem>,
) -> Created<YearPlanItem> {
    let mut dir = state.directory.write().await;
    created(tracking::add_year_plan_item(
        &mut dir,
        &current.requester,
        MenteeId(id),
        request,
    )?)
}

pub async fn list_year_plan_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
) -> ApiResult<Vec<YearPlanItem>> {
    let dir = state.directory.read().await;
    Ok(Json(tracking::year_plan_for(
        &dir,
        &current.requester,
        MenteeId(id),
        state.today(),
    )?))
}

pub async fn update_year_plan_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
    Json(request): Json<NewYearPlanItem>,
) -> ApiResult<YearPlanItem> {
    let mut dir = state.directory.write().await;
    Ok(Json(tracking::update_year_plan_item(
        &mut dir,
        &current.requester,
        RecordId(id),
        request,
    )?))
}

pub async fn year_plan_feedback_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
    Json(request): Json<FeedbackRequest>,
) -> ApiResult<YearPlanItem> {
    let mut dir = state.directory.write().await;
    Ok(Json(tracking::set_year_plan_feedback(
        &mut dir,
        &current.requester,
        RecordId(id),
        &request.feedback,
        state.today(),
    )?))
}

pub async fn add_assessment_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
    Json(request): Json<NewAssessment>,
) -> Created<MenteeAssessment> {
    let mut dir = state.directory.write().await;
    created(tracking::add_assessment(
        &mut dir,
        &current.requester,
        MenteeId(id),
        request,
    )?)
}

pub async fn list_assessments_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
) -> ApiResult<Vec<MenteeAssessment>> {
    let dir = state.directory.read().await;
    Ok(Json(tracking::assessments_for(
        &dir,
        &current.requester,
        MenteeId(id),
        state.today(),
    )?))
}

pub async fn update_assessment_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
    Json(request): Json<NewAssessment>,
) -> ApiResult<MenteeAssessment> {
    let mut dir = state.directory.write().await;
    Ok(Json(tracking::update_assessment(
        &mut dir,
        &current.requester,
        RecordId(id),
        request,
    )?))
}

pub async fn assessment_feedback_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<u64>,
    Json(request): Json<FeedbackRequest>,
) -> ApiResult<MenteeAssessment> {
    let mut dir = state.directory.write().await;
    Ok(Json(tracking::set_assessment_feedback(
        &mut dir,
        &current.requester,
        RecordId(id),
        &request.feedback,
        state.today(),
    )?))
}

// =============================================================================
// NOTIFICATION HANDLERS
// =============================================================================

/// Broadcast to endorsers, mentors or both. Admin only.
pub async fn broadcast_handler(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<NewNotification>,
) -> Created<Notification> {
    let mut dir = state.directory.write().await;
    let notification =
        notifications::broadcast(&mut dir, &current.requester, request, Utc::now())?;
    tracing::info!(
        event = "notification_sent",
        notification = notification.id.0,
        target = ?notification.target,
        "Broadcast: {}",
        notification.preview()
    );
    created(notification)
}

pub async fn inbox_handler(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Vec<Notification>> {
    let dir = state.directory.read().await;
    Ok(Json(notifications::inbox(&dir, &current.requester)?))
}
