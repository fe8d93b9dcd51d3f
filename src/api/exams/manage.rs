use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_teacher, CurrentUser};
use crate::api::pagination::PaginatedResponse;
use crate::core::state::AppState;
use crate::core::time::{primitive_now_utc, to_primitive_utc};
use crate::db::types::{ExamStatus, UserRole};
use crate::repositories;
use crate::schemas::exam::{ExamCreate, ExamResponse, ExamUpdate};

use super::helpers;

#[derive(Debug, Deserialize)]
pub(in crate::api::exams) struct ListExamsQuery {
    #[serde(default)]
    pub(in crate::api::exams) cohort: Option<String>,
    #[serde(default)]
    pub(in crate::api::exams) skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(in crate::api::exams) limit: i64,
}

pub(in crate::api::exams) async fn create_exam(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<ExamCreate>,
) -> Result<(axum::http::StatusCode, Json<ExamResponse>), ApiError> {
    require_teacher(&user)?;
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if payload.end_time <= payload.start_time {
        return Err(ApiError::BadRequest("end_time must be after start_time".to_string()));
    }

    let now = primitive_now_utc();
    let exam = repositories::exams::create(
        state.db(),
        repositories::exams::CreateExam {
            id: &Uuid::new_v4().to_string(),
            course_id: &payload.course_id,
            cohort: &payload.cohort,
            title: &payload.title,
            description: payload.description.as_deref(),
            start_time: to_primitive_utc(payload.start_time),
            end_time: to_primitive_utc(payload.end_time),
            duration_minutes: payload.duration_minutes,
            attempts_allowed: payload.attempts_allowed,
            assignment_mode: payload.assignment_mode,
            assignment_seed: payload.assignment_seed.as_deref(),
            created_by: &user.id,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create exam"))?;

    Ok((axum::http::StatusCode::CREATED, Json(ExamResponse::from_db(exam))))
}

pub(in crate::api::exams) async fn list_exams(
    Query(params): Query<ListExamsQuery>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<ExamResponse>>, ApiError> {
    let exams = match user.role {
        UserRole::Student => {
            let cohort = params
                .cohort
                .as_deref()
                .ok_or_else(|| ApiError::BadRequest("cohort query is required".to_string()))?;
            repositories::exams::list_published_for_cohort(
                state.db(),
                cohort,
                params.skip,
                params.limit,
            )
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list exams"))?
        }
        UserRole::Teacher | UserRole::Admin => {
            repositories::exams::list_by_creator(state.db(), &user.id, params.skip, params.limit)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to list exams"))?
        }
    };

    Ok(Json(PaginatedResponse {
        items: exams.into_iter().map(ExamResponse::from_db).collect(),
        skip: params.skip,
        limit: params.limit,
    }))
}

pub(in crate::api::exams) async fn get_exam(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ExamResponse>, ApiError> {
    let exam = helpers::fetch_exam(state.db(), &exam_id).await?;

    if user.role == UserRole::Student && exam.status != ExamStatus::Published {
        return Err(ApiError::NotFound("Exam not found".to_string()));
    }

    Ok(Json(ExamResponse::from_db(exam)))
}

pub(in crate::api::exams) async fn update_exam(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<ExamUpdate>,
) -> Result<Json<ExamResponse>, ApiError> {
    require_teacher(&user)?;
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let exam = helpers::fetch_exam(state.db(), &exam_id).await?;

    let touches_structure = payload.start_time.is_some()
        || payload.end_time.is_some()
        || payload.duration_minutes.is_some()
        || payload.attempts_allowed.is_some()
        || payload.assignment_mode.is_some()
        || payload.assignment_seed.is_some();
    if touches_structure {
        helpers::ensure_no_attempts(state.db(), &exam_id).await?;
    }

    let effective_start = payload.start_time.unwrap_or(exam.start_time.assume_utc());
    let effective_end = payload.end_time.unwrap_or(exam.end_time.assume_utc());
    if effective_end <= effective_start {
        return Err(ApiError::BadRequest("end_time must be after start_time".to_string()));
    }

    let now = primitive_now_utc();
    let updated = repositories::exams::update(
        state.db(),
        &exam_id,
        repositories::exams::UpdateExam {
            title: payload.title.as_deref(),
            description: payload.description.as_deref(),
            start_time: payload.start_time.map(to_primitive_utc),
            end_time: payload.end_time.map(to_primitive_utc),
            duration_minutes: payload.duration_minutes,
            attempts_allowed: payload.attempts_allowed,
            assignment_mode: payload.assignment_mode,
            assignment_seed: payload.assignment_seed.as_deref(),
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update exam"))?;

    Ok(Json(ExamResponse::from_db(updated)))
}

pub(in crate::api::exams) async fn delete_exam(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<axum::http::StatusCode, ApiError> {
    require_teacher(&user)?;
    helpers::fetch_exam(state.db(), &exam_id).await?;
    helpers::ensure_no_attempts(state.db(), &exam_id).await?;

    repositories::exams::delete_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete exam"))?;

    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub(in crate::api::exams) async fn publish_exam(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ExamResponse>, ApiError> {
    require_teacher(&user)?;
    let exam = helpers::fetch_exam(state.db(), &exam_id).await?;

    if exam.status != ExamStatus::Draft {
        return Err(ApiError::BadRequest("Exam is not in draft status".to_string()));
    }

    let sets = repositories::sets::list_by_exam(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list sets"))?;

    if sets.is_empty() {
        return Err(ApiError::BadRequest("Exam must have at least one set".to_string()));
    }

    for set in &sets {
        let question_count = repositories::sets::question_count(state.db(), &set.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to count set questions"))?;
        if question_count == 0 {
            return Err(ApiError::BadRequest(format!("Set '{}' has no questions", set.name)));
        }
    }

    let now = primitive_now_utc();
    repositories::exams::publish(state.db(), &exam_id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to publish exam"))?;

    let updated = repositories::exams::fetch_one_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch updated exam"))?;

    tracing::info!(
        user_id = %user.id,
        exam_id = %updated.id,
        action = "exam_publish",
        "Exam published"
    );
    state.notifier().exam_published(&updated);

    Ok(Json(ExamResponse::from_db(updated)))
}

pub(in crate::api::exams) async fn archive_exam(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ExamResponse>, ApiError> {
    require_teacher(&user)?;
    let exam = helpers::fetch_exam(state.db(), &exam_id).await?;

    if exam.status == ExamStatus::Archived {
        return Err(ApiError::BadRequest("Exam is already archived".to_string()));
    }

    let now = primitive_now_utc();
    repositories::exams::archive(state.db(), &exam_id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to archive exam"))?;

    let updated = repositories::exams::fetch_one_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch updated exam"))?;

    Ok(Json(ExamResponse::from_db(updated)))
}
