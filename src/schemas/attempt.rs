use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Answer, Attempt};
use crate::db::types::AttemptStatus;

#[derive(Debug, Deserialize)]
pub(crate) struct AttemptStart {
    #[serde(default)]
    #[serde(alias = "accessPassword")]
    pub(crate) access_password: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AnswerSave {
    #[serde(alias = "questionId")]
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    #[serde(default)]
    #[serde(alias = "optionId")]
    pub(crate) option_id: Option<String>,
    #[serde(default)]
    #[serde(alias = "textResponse")]
    pub(crate) text_response: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ManualGrade {
    #[serde(alias = "questionId")]
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    #[serde(alias = "awardedMarks")]
    #[validate(range(min = 0.0, message = "awarded_marks must be non-negative"))]
    pub(crate) awarded_marks: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) set_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) attempt_number: i32,
    pub(crate) started_at: String,
    pub(crate) deadline: String,
    pub(crate) submitted_at: Option<String>,
    pub(crate) score: Option<f64>,
    pub(crate) max_score: Option<f64>,
}

impl AttemptResponse {
    pub(crate) fn from_db(attempt: Attempt) -> Self {
        Self {
            id: attempt.id,
            exam_id: attempt.exam_id,
            student_id: attempt.student_id,
            set_id: attempt.set_id,
            status: attempt.status,
            attempt_number: attempt.attempt_number,
            started_at: format_primitive(attempt.started_at),
            deadline: format_primitive(attempt.deadline),
            submitted_at: attempt.submitted_at.map(format_primitive),
            score: attempt.score,
            max_score: attempt.max_score,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerResponse {
    pub(crate) id: String,
    pub(crate) question_id: String,
    pub(crate) option_id: Option<String>,
    pub(crate) text_response: Option<String>,
    pub(crate) awarded_marks: Option<f64>,
    pub(crate) updated_at: String,
}

impl AnswerResponse {
    pub(crate) fn from_db(answer: Answer) -> Self {
        Self {
            id: answer.id,
            question_id: answer.question_id,
            option_id: answer.option_id,
            text_response: answer.text_response,
            awarded_marks: answer.awarded_marks,
            updated_at: format_primitive(answer.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResultResponse {
    pub(crate) attempt: AttemptResponse,
    pub(crate) answers: Vec<AnswerResponse>,
}
