use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_teacher, CurrentUser};
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::ExamSet;
use crate::repositories;
use crate::schemas::exam::{SetCreate, SetQuestionPayload, SetResponse};

use super::helpers;

pub(in crate::api::exams) async fn create_set(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<SetCreate>,
) -> Result<(axum::http::StatusCode, Json<SetResponse>), ApiError> {
    require_teacher(&user)?;
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    helpers::fetch_exam(state.db(), &exam_id).await?;
    helpers::ensure_no_attempts(state.db(), &exam_id).await?;

    let mut seen = std::collections::HashSet::new();
    for question_id in &payload.question_ids {
        if !seen.insert(question_id.as_str()) {
            return Err(ApiError::BadRequest(format!("Duplicate question id: {question_id}")));
        }
        ensure_question_in_exam(&state, &exam_id, question_id).await?;
    }

    let access_password_hash = match payload.access_password.as_deref() {
        Some(password) if !password.is_empty() => Some(
            security::hash_password(password)
                .map_err(|e| ApiError::internal(e, "Failed to hash set password"))?,
        ),
        _ => None,
    };

    // The set row and its memberships land together or not at all.
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let now = primitive_now_utc();
    let set = repositories::sets::create(
        &mut *tx,
        repositories::sets::CreateSet {
            id: &Uuid::new_v4().to_string(),
            exam_id: &exam_id,
            name: &payload.name,
            access_password_hash: access_password_hash.as_deref(),
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            ApiError::Conflict("A set with this name already exists".to_string())
        }
        other => ApiError::internal(other, "Failed to create set"),
    })?;

    for question_id in &payload.question_ids {
        repositories::sets::add_question(&mut *tx, &set.id, question_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to attach question to set"))?;
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    let response = set_response(&state, set).await?;
    Ok((axum::http::StatusCode::CREATED, Json(response)))
}

pub(in crate::api::exams) async fn list_sets(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<SetResponse>>, ApiError> {
    require_teacher(&user)?;
    helpers::fetch_exam(state.db(), &exam_id).await?;

    let sets = repositories::sets::list_by_exam(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list sets"))?;

    let mut responses = Vec::with_capacity(sets.len());
    for set in sets {
        responses.push(set_response(&state, set).await?);
    }

    Ok(Json(responses))
}

pub(in crate::api::exams) async fn get_set(
    Path((exam_id, set_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<SetResponse>, ApiError> {
    require_teacher(&user)?;
    let set = fetch_set(&state, &exam_id, &set_id).await?;
    Ok(Json(set_response(&state, set).await?))
}

pub(in crate::api::exams) async fn delete_set(
    Path((exam_id, set_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<axum::http::StatusCode, ApiError> {
    require_teacher(&user)?;
    fetch_set(&state, &exam_id, &set_id).await?;
    helpers::ensure_no_attempts(state.db(), &exam_id).await?;

    repositories::sets::delete_by_id(state.db(), &set_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete set"))?;

    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub(in crate::api::exams) async fn add_set_question(
    Path((exam_id, set_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<SetQuestionPayload>,
) -> Result<Json<SetResponse>, ApiError> {
    require_teacher(&user)?;
    let set = fetch_set(&state, &exam_id, &set_id).await?;
    helpers::ensure_no_attempts(state.db(), &exam_id).await?;
    ensure_question_in_exam(&state, &exam_id, &payload.question_id).await?;

    repositories::sets::add_question(state.db(), &set_id, &payload.question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to attach question to set"))?;

    Ok(Json(set_response(&state, set).await?))
}

pub(in crate::api::exams) async fn remove_set_question(
    Path((exam_id, set_id, question_id)): Path<(String, String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<SetResponse>, ApiError> {
    require_teacher(&user)?;
    let set = fetch_set(&state, &exam_id, &set_id).await?;
    helpers::ensure_no_attempts(state.db(), &exam_id).await?;

    let removed = repositories::sets::remove_question(state.db(), &set_id, &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to detach question from set"))?;

    if !removed {
        return Err(ApiError::NotFound("Question is not in this set".to_string()));
    }

    Ok(Json(set_response(&state, set).await?))
}

async fn fetch_set(state: &AppState, exam_id: &str, set_id: &str) -> Result<ExamSet, ApiError> {
    let set = repositories::sets::find_by_id(state.db(), set_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch set"))?;

    match set {
        Some(set) if set.exam_id == exam_id => Ok(set),
        _ => Err(ApiError::NotFound("Set not found".to_string())),
    }
}

async fn ensure_question_in_exam(
    state: &AppState,
    exam_id: &str,
    question_id: &str,
) -> Result<(), ApiError> {
    let question = repositories::questions::find_by_id(state.db(), question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?;

    match question {
        Some(question) if question.exam_id == exam_id => Ok(()),
        _ => Err(ApiError::BadRequest("Question does not belong to this exam".to_string())),
    }
}

async fn set_response(state: &AppState, set: ExamSet) -> Result<SetResponse, ApiError> {
    let question_count = repositories::sets::question_count(state.db(), &set.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count set questions"))?;
    let max_score = repositories::sets::max_score(state.db(), &set.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to compute set max score"))?;

    Ok(SetResponse::from_db(set, question_count, max_score))
}
