use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::{require_student, CurrentUser};
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::ExamStatus;
use crate::repositories;
use crate::schemas::attempt::{AttemptResponse, AttemptStart};
use crate::services::{assignment, attempt_timing, EngineError};

use super::helpers;

pub(crate) async fn start_attempt(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<AttemptStart>,
) -> Result<(axum::http::StatusCode, Json<AttemptResponse>), ApiError> {
    require_student(&user)?;

    let exam = helpers::fetch_exam(state.db(), &exam_id).await?;
    if exam.status != ExamStatus::Published {
        return Err(ApiError::BadRequest("Exam is not available".to_string()));
    }

    let now = primitive_now_utc();
    attempt_timing::check_start_window(&exam, now)?;

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    repositories::attempts::acquire_exam_student_lock(&mut *tx, &exam_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to acquire attempt lock"))?;

    let existing = repositories::attempts::find_active(&mut *tx, &exam_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch active attempt"))?;

    if let Some(active) = existing {
        return Err(EngineError::AttemptAlreadyActive { attempt_id: active.id }.into());
    }

    let prior_attempts =
        repositories::attempts::count_by_exam_and_student(&mut *tx, &exam_id, &user.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to count attempts"))?;

    if prior_attempts >= exam.attempts_allowed as i64 {
        return Err(EngineError::AttemptsExhausted.into());
    }

    let sets = repositories::sets::list_by_exam(&mut *tx, &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list sets"))?;

    let set = assignment::resolve_set(&exam, &sets, &user.id, &mut rand::thread_rng())?;

    if let Some(hash) = set.access_password_hash.as_deref() {
        let provided = payload.access_password.as_deref().unwrap_or("");
        let valid = security::verify_password(provided, hash).unwrap_or(false);
        if !valid {
            return Err(ApiError::Forbidden("Invalid set access password"));
        }
    }

    let deadline = attempt_timing::compute_deadline(&exam, now);
    let max_score = repositories::sets::max_score(&mut *tx, &set.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to compute set max score"))?;

    let attempt_id = Uuid::new_v4().to_string();
    let inserted = repositories::attempts::create(
        &mut *tx,
        repositories::attempts::CreateAttempt {
            id: &attempt_id,
            exam_id: &exam_id,
            student_id: &user.id,
            set_id: &set.id,
            attempt_number: (prior_attempts + 1) as i32,
            started_at: now,
            deadline,
            max_score,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create attempt"))?;

    if !inserted {
        // Lost the race on the partial unique index.
        let active = repositories::attempts::find_active(&mut *tx, &exam_id, &user.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch active attempt"))?
            .ok_or_else(|| {
                ApiError::Conflict("An attempt is already in progress for this exam".to_string())
            })?;
        return Err(EngineError::AttemptAlreadyActive { attempt_id: active.id }.into());
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    let attempt = repositories::attempts::fetch_one_by_id(state.db(), &attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?;

    metrics::counter!("attempts_started_total").increment(1);
    tracing::info!(
        attempt_id = %attempt.id,
        exam_id = %exam_id,
        student_id = %user.id,
        set_id = %attempt.set_id,
        attempt_number = attempt.attempt_number,
        "Attempt started"
    );

    Ok((axum::http::StatusCode::CREATED, Json(AttemptResponse::from_db(attempt))))
}
