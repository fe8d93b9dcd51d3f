use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::{AttemptStatus, QuestionKind};
use crate::repositories;
use crate::schemas::attempt::{AnswerResponse, AnswerSave};
use crate::services::EngineError;

use super::helpers;

pub(in crate::api::attempts) async fn save_answer(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<AnswerSave>,
) -> Result<Json<AnswerResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let attempt = helpers::fetch_attempt(state.db(), &attempt_id).await?;
    if attempt.student_id != user.id {
        return Err(ApiError::Forbidden("Access denied"));
    }

    let attempt = helpers::enforce_deadline(state.db(), attempt).await?;
    if attempt.status != AttemptStatus::InProgress {
        return Err(EngineError::AttemptClosed.into());
    }

    let interval = state.settings().exam().answer_save_interval_seconds.max(1);
    let rate_key = format!("rl:answersave:{attempt_id}:{}", payload.question_id);
    let allowed = state.redis().rate_limit(&rate_key, 1, interval).await.unwrap_or(true);
    if !allowed {
        return Err(ApiError::TooManyRequests("Answers are being saved too frequently"));
    }

    let in_set =
        repositories::sets::contains_question(state.db(), &attempt.set_id, &payload.question_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to check set membership"))?;
    if !in_set {
        tracing::warn!(
            attempt_id = %attempt.id,
            question_id = %payload.question_id,
            "Answer rejected for question outside the assigned set"
        );
        return Err(EngineError::QuestionNotInAssignedSet.into());
    }

    let question = repositories::questions::find_by_id(state.db(), &payload.question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?
        .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))?;

    validate_answer_shape(question.kind, &payload)?;

    if let Some(option_id) = payload.option_id.as_deref() {
        let options = repositories::questions::list_options(state.db(), &question.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list question options"))?;
        if !options.iter().any(|o| o.id == option_id) {
            return Err(ApiError::BadRequest(
                "Option does not belong to this question".to_string(),
            ));
        }
    }

    // The write re-checks the attempt under a row lock: submission and
    // expiry take the same lock, so a closed attempt accepts no late writes.
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let current = repositories::attempts::find_by_id_for_update(&mut *tx, &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to lock attempt"))?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;
    if current.status != AttemptStatus::InProgress {
        return Err(EngineError::AttemptClosed.into());
    }

    let now = primitive_now_utc();
    let answer = repositories::answers::upsert(
        &mut *tx,
        repositories::answers::UpsertAnswer {
            id: &Uuid::new_v4().to_string(),
            attempt_id: &attempt.id,
            question_id: &payload.question_id,
            option_id: payload.option_id.as_deref(),
            text_response: payload.text_response.as_deref(),
            now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to save answer"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    Ok(Json(AnswerResponse::from_db(answer)))
}

pub(in crate::api::attempts) async fn list_answers(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AnswerResponse>>, ApiError> {
    let attempt = helpers::fetch_attempt(state.db(), &attempt_id).await?;
    helpers::ensure_attempt_access(&attempt, &user)?;

    let answers = repositories::answers::list_by_attempt(state.db(), &attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load answers"))?;

    Ok(Json(answers.into_iter().map(AnswerResponse::from_db).collect()))
}

fn validate_answer_shape(kind: QuestionKind, payload: &AnswerSave) -> Result<(), ApiError> {
    match kind {
        QuestionKind::Mcq | QuestionKind::TrueFalse => {
            if payload.option_id.is_none() {
                return Err(ApiError::BadRequest(
                    "Choice questions are answered with option_id".to_string(),
                ));
            }
            if payload.text_response.is_some() {
                return Err(ApiError::BadRequest(
                    "Choice questions do not take a text response".to_string(),
                ));
            }
        }
        QuestionKind::Numeric | QuestionKind::Subjective => {
            if payload.text_response.is_none() {
                return Err(ApiError::BadRequest(
                    "This question is answered with text_response".to_string(),
                ));
            }
            if payload.option_id.is_some() {
                return Err(ApiError::BadRequest(
                    "This question does not take an option".to_string(),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn save(option_id: Option<&str>, text: Option<&str>) -> AnswerSave {
        AnswerSave {
            question_id: "q1".to_string(),
            option_id: option_id.map(str::to_string),
            text_response: text.map(str::to_string),
        }
    }

    #[test]
    fn choice_kinds_take_an_option() {
        assert!(validate_answer_shape(QuestionKind::Mcq, &save(Some("o1"), None)).is_ok());
        assert!(validate_answer_shape(QuestionKind::Mcq, &save(None, Some("text"))).is_err());
        assert!(validate_answer_shape(QuestionKind::TrueFalse, &save(None, None)).is_err());
    }

    #[test]
    fn text_kinds_take_a_text_response() {
        assert!(validate_answer_shape(QuestionKind::Numeric, &save(None, Some("42"))).is_ok());
        assert!(validate_answer_shape(QuestionKind::Subjective, &save(Some("o1"), None)).is_err());
        assert!(
            validate_answer_shape(QuestionKind::Subjective, &save(None, Some("essay"))).is_ok()
        );
    }
}
