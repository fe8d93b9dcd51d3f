use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_teacher, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::exam::{OptionResponse, QuestionCreate, QuestionResponse, QuestionUpdate};

use super::helpers;

pub(in crate::api::exams) async fn add_question(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<QuestionCreate>,
) -> Result<(axum::http::StatusCode, Json<QuestionResponse>), ApiError> {
    require_teacher(&user)?;
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    helpers::fetch_exam(state.db(), &exam_id).await?;
    helpers::ensure_no_attempts(state.db(), &exam_id).await?;
    helpers::validate_option_shape(payload.kind, &payload.options)?;

    // A question and its options are one unit; a failed option insert must
    // not leave a choice question behind with no answer key.
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let now = primitive_now_utc();
    let question = repositories::questions::create(
        &mut *tx,
        repositories::questions::CreateQuestion {
            id: &Uuid::new_v4().to_string(),
            exam_id: &exam_id,
            question_text: &payload.question_text,
            kind: payload.kind,
            marks: payload.marks,
            position: payload.position,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create question"))?;

    let mut options = Vec::with_capacity(payload.options.len());
    for option in &payload.options {
        let created = repositories::questions::create_option(
            &mut *tx,
            repositories::questions::CreateOption {
                id: &Uuid::new_v4().to_string(),
                question_id: &question.id,
                option_text: &option.option_text,
                is_correct: option.is_correct,
                position: option.position,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create question option"))?;
        options.push(OptionResponse::from_db(created));
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(QuestionResponse::from_db(question, options)),
    ))
}

pub(in crate::api::exams) async fn list_questions(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<QuestionResponse>>, ApiError> {
    require_teacher(&user)?;
    helpers::fetch_exam(state.db(), &exam_id).await?;

    let questions = repositories::questions::list_by_exam(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list questions"))?;

    let mut responses = Vec::with_capacity(questions.len());
    for question in questions {
        let options = repositories::questions::list_options(state.db(), &question.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list question options"))?;
        responses.push(QuestionResponse::from_db(
            question,
            options.into_iter().map(OptionResponse::from_db).collect(),
        ));
    }

    Ok(Json(responses))
}

pub(in crate::api::exams) async fn get_question(
    Path((exam_id, question_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<QuestionResponse>, ApiError> {
    require_teacher(&user)?;
    let question = fetch_question(&state, &exam_id, &question_id).await?;

    let options = repositories::questions::list_options(state.db(), &question.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list question options"))?;

    Ok(Json(QuestionResponse::from_db(
        question,
        options.into_iter().map(OptionResponse::from_db).collect(),
    )))
}

pub(in crate::api::exams) async fn update_question(
    Path((exam_id, question_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<QuestionUpdate>,
) -> Result<Json<QuestionResponse>, ApiError> {
    require_teacher(&user)?;
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    fetch_question(&state, &exam_id, &question_id).await?;
    helpers::ensure_no_attempts(state.db(), &exam_id).await?;

    let now = primitive_now_utc();
    let updated = repositories::questions::update(
        state.db(),
        &question_id,
        repositories::questions::UpdateQuestion {
            question_text: payload.question_text.as_deref(),
            marks: payload.marks,
            position: payload.position,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update question"))?;

    let options = repositories::questions::list_options(state.db(), &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list question options"))?;

    Ok(Json(QuestionResponse::from_db(
        updated,
        options.into_iter().map(OptionResponse::from_db).collect(),
    )))
}

pub(in crate::api::exams) async fn delete_question(
    Path((exam_id, question_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<axum::http::StatusCode, ApiError> {
    require_teacher(&user)?;
    fetch_question(&state, &exam_id, &question_id).await?;
    helpers::ensure_no_attempts(state.db(), &exam_id).await?;

    // Set membership rows go with the question via ON DELETE CASCADE.
    repositories::questions::delete_by_id(state.db(), &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete question"))?;

    Ok(axum::http::StatusCode::NO_CONTENT)
}

async fn fetch_question(
    state: &AppState,
    exam_id: &str,
    question_id: &str,
) -> Result<crate::db::models::Question, ApiError> {
    let question = repositories::questions::find_by_id(state.db(), question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?;

    match question {
        Some(question) if question.exam_id == exam_id => Ok(question),
        _ => Err(ApiError::NotFound("Question not found".to_string())),
    }
}
