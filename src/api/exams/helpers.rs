use sqlx::PgPool;

use crate::api::errors::ApiError;
use crate::db::models::Exam;
use crate::db::types::QuestionKind;
use crate::repositories;
use crate::schemas::exam::OptionCreate;

pub(in crate::api::exams) async fn fetch_exam(pool: &PgPool, exam_id: &str) -> Result<Exam, ApiError> {
    repositories::exams::find_by_id(pool, exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))
}

/// Structure edits are frozen once a student has started: the assigned set
/// must keep describing exactly what the student saw.
pub(in crate::api::exams) async fn ensure_no_attempts(
    pool: &PgPool,
    exam_id: &str,
) -> Result<(), ApiError> {
    let attempts = repositories::exams::count_attempts(pool, exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count attempts"))?;

    if attempts > 0 {
        return Err(ApiError::Conflict(
            "Exam already has attempts; its structure can no longer change".to_string(),
        ));
    }
    Ok(())
}

pub(in crate::api::exams) fn validate_option_shape(
    kind: QuestionKind,
    options: &[OptionCreate],
) -> Result<(), ApiError> {
    let correct = options.iter().filter(|o| o.is_correct).count();
    match kind {
        QuestionKind::Mcq => {
            if options.len() < 2 {
                return Err(ApiError::BadRequest(
                    "Choice questions need at least two options".to_string(),
                ));
            }
            if correct == 0 {
                return Err(ApiError::BadRequest(
                    "Choice questions need at least one correct option".to_string(),
                ));
            }
        }
        QuestionKind::TrueFalse => {
            if options.len() != 2 || correct != 1 {
                return Err(ApiError::BadRequest(
                    "True/false questions need exactly two options with one correct".to_string(),
                ));
            }
        }
        QuestionKind::Numeric => {
            if correct == 0 {
                return Err(ApiError::BadRequest(
                    "Numeric questions need at least one accepted value".to_string(),
                ));
            }
        }
        QuestionKind::Subjective => {
            if correct > 0 {
                return Err(ApiError::BadRequest(
                    "Subjective questions cannot mark options as correct".to_string(),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opt(text: &str, is_correct: bool) -> OptionCreate {
        OptionCreate { option_text: text.to_string(), is_correct, position: 0 }
    }

    #[test]
    fn mcq_needs_two_options_and_a_correct_one() {
        assert!(validate_option_shape(QuestionKind::Mcq, &[opt("A", true)]).is_err());
        assert!(
            validate_option_shape(QuestionKind::Mcq, &[opt("A", false), opt("B", false)]).is_err()
        );
        assert!(
            validate_option_shape(QuestionKind::Mcq, &[opt("A", true), opt("B", false)]).is_ok()
        );
    }

    #[test]
    fn true_false_is_exactly_two_one_correct() {
        assert!(validate_option_shape(
            QuestionKind::TrueFalse,
            &[opt("True", true), opt("False", false)]
        )
        .is_ok());
        assert!(validate_option_shape(
            QuestionKind::TrueFalse,
            &[opt("True", true), opt("False", true)]
        )
        .is_err());
        assert!(validate_option_shape(QuestionKind::TrueFalse, &[opt("True", true)]).is_err());
    }

    #[test]
    fn numeric_needs_an_accepted_value() {
        assert!(validate_option_shape(QuestionKind::Numeric, &[]).is_err());
        assert!(validate_option_shape(QuestionKind::Numeric, &[opt("42", true)]).is_ok());
    }

    #[test]
    fn subjective_allows_rubric_notes_but_no_answer_key() {
        assert!(validate_option_shape(QuestionKind::Subjective, &[]).is_ok());
        assert!(
            validate_option_shape(QuestionKind::Subjective, &[opt("rubric", false)]).is_ok()
        );
        assert!(validate_option_shape(QuestionKind::Subjective, &[opt("key", true)]).is_err());
    }
}
