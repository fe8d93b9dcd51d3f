use axum::extract::{Path, State};
use axum::Json;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_teacher, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::AttemptStatus;
use crate::repositories;
use crate::schemas::attempt::{AttemptResponse, ManualGrade};

use super::helpers;

/// Records marks for one subjective answer and regrades the attempt. The
/// attempt flips to graded once no subjective answer is left unmarked.
pub(in crate::api::attempts) async fn grade_answer(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<ManualGrade>,
) -> Result<Json<AttemptResponse>, ApiError> {
    require_teacher(&user)?;
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let attempt = helpers::fetch_attempt(state.db(), &attempt_id).await?;

    match attempt.status {
        AttemptStatus::Submitted | AttemptStatus::Graded => {}
        AttemptStatus::InProgress => {
            return Err(ApiError::Conflict("Attempt has not been submitted yet".to_string()));
        }
        AttemptStatus::Expired => {
            return Err(ApiError::Conflict("Expired attempts are not graded".to_string()));
        }
    }

    let question = repositories::questions::find_by_id(state.db(), &payload.question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?
        .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))?;

    if question.kind.is_objective() {
        return Err(ApiError::BadRequest(
            "Only subjective questions take manual marks".to_string(),
        ));
    }

    let in_set =
        repositories::sets::contains_question(state.db(), &attempt.set_id, &payload.question_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to check set membership"))?;
    if !in_set {
        return Err(ApiError::BadRequest(
            "Question is not part of the assigned set".to_string(),
        ));
    }

    if payload.awarded_marks > question.marks {
        return Err(ApiError::BadRequest(format!(
            "awarded_marks cannot exceed the question's {} marks",
            question.marks
        )));
    }

    let now = primitive_now_utc();
    let updated = repositories::answers::set_awarded_marks(
        state.db(),
        &attempt.id,
        &payload.question_id,
        payload.awarded_marks,
        now,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to record marks"))?;

    if !updated {
        return Err(ApiError::NotFound("No answer recorded for this question".to_string()));
    }

    let outcome = helpers::grade_attempt(state.db(), &attempt).await?;
    let status =
        if outcome.fully_graded { AttemptStatus::Graded } else { AttemptStatus::Submitted };
    let was_graded = attempt.status == AttemptStatus::Graded;

    repositories::attempts::update_grade(state.db(), &attempt.id, status, outcome.score, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update attempt grade"))?;

    let attempt = repositories::attempts::fetch_one_by_id(state.db(), &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?;

    tracing::info!(
        attempt_id = %attempt.id,
        question_id = %payload.question_id,
        grader_id = %user.id,
        awarded_marks = payload.awarded_marks,
        status = ?attempt.status,
        "Manual marks recorded"
    );

    if attempt.status == AttemptStatus::Graded && !was_graded {
        state.notifier().attempt_graded(&attempt);
    }

    Ok(Json(AttemptResponse::from_db(attempt)))
}
