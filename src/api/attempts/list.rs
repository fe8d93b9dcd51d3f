use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::json;

use crate::api::errors::ApiError;
use crate::api::guards::{require_student, require_teacher, CurrentUser};
use crate::api::pagination::{PageQuery, PaginatedResponse};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::AttemptStatus;
use crate::repositories;
use crate::schemas::attempt::{AnswerResponse, AttemptResponse, AttemptResultResponse};
use crate::schemas::exam::{OptionResponse, QuestionResponse};
use crate::services::EngineError;

use super::helpers;

pub(in crate::api::attempts) async fn get_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AttemptResponse>, ApiError> {
    let attempt = helpers::fetch_attempt(state.db(), &attempt_id).await?;
    helpers::ensure_attempt_access(&attempt, &user)?;

    let attempt = helpers::enforce_deadline(state.db(), attempt).await?;
    Ok(Json(AttemptResponse::from_db(attempt)))
}

/// The question paper for a live attempt: the assigned set's questions with
/// correctness flags stripped, the answers saved so far, and the seconds
/// left on the clock.
pub(in crate::api::attempts) async fn get_attempt_questions(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let attempt = helpers::fetch_attempt(state.db(), &attempt_id).await?;
    if attempt.student_id != user.id {
        return Err(ApiError::Forbidden("Access denied"));
    }

    let attempt = helpers::enforce_deadline(state.db(), attempt).await?;
    if attempt.status != AttemptStatus::InProgress {
        return Err(EngineError::AttemptClosed.into());
    }

    let set_questions =
        repositories::questions::list_for_set_with_options(state.db(), &attempt.set_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load set questions"))?;
    let answers = repositories::answers::list_by_attempt(state.db(), &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load answers"))?;

    let mut saved: HashMap<String, AnswerResponse> = answers
        .into_iter()
        .map(|a| (a.question_id.clone(), AnswerResponse::from_db(a)))
        .collect();

    let questions: Vec<serde_json::Value> = set_questions
        .into_iter()
        .map(|(question, options)| {
            let answer = saved.remove(&question.id);
            let response = QuestionResponse::from_db(
                question,
                options.into_iter().map(OptionResponse::redacted).collect(),
            );
            json!({ "question": response, "answer": answer })
        })
        .collect();

    let now = primitive_now_utc();
    let time_remaining = (attempt.deadline - now).whole_seconds().max(0);

    Ok(Json(json!({
        "attempt_id": attempt.id,
        "set_id": attempt.set_id,
        "deadline": crate::core::time::format_primitive(attempt.deadline),
        "time_remaining_seconds": time_remaining,
        "questions": questions,
    })))
}

pub(in crate::api::attempts) async fn get_result(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AttemptResultResponse>, ApiError> {
    let attempt = helpers::fetch_attempt(state.db(), &attempt_id).await?;
    helpers::ensure_attempt_access(&attempt, &user)?;

    let attempt = helpers::enforce_deadline(state.db(), attempt).await?;
    if !attempt.status.is_closed() {
        return Err(ApiError::Conflict(
            "Attempt is still in progress; results are not available".to_string(),
        ));
    }

    let answers = repositories::answers::list_by_attempt(state.db(), &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load answers"))?;

    Ok(Json(AttemptResultResponse {
        attempt: AttemptResponse::from_db(attempt),
        answers: answers.into_iter().map(AnswerResponse::from_db).collect(),
    }))
}

pub(crate) async fn list_exam_attempts(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<PaginatedResponse<AttemptResponse>>, ApiError> {
    require_teacher(&user)?;
    helpers::fetch_exam(state.db(), &exam_id).await?;

    let attempts = repositories::attempts::list_by_exam(state.db(), &exam_id, page.skip, page.limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list attempts"))?;

    Ok(Json(PaginatedResponse {
        items: attempts.into_iter().map(AttemptResponse::from_db).collect(),
        skip: page.skip,
        limit: page.limit,
    }))
}

pub(crate) async fn list_my_attempts(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AttemptResponse>>, ApiError> {
    require_student(&user)?;
    helpers::fetch_exam(state.db(), &exam_id).await?;

    let attempts =
        repositories::attempts::list_by_exam_and_student(state.db(), &exam_id, &user.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list attempts"))?;

    Ok(Json(attempts.into_iter().map(AttemptResponse::from_db).collect()))
}
