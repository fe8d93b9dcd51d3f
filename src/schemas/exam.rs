use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    PrimitiveDateTime,
};
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;
use crate::db::models::{Exam, ExamSet, Question, QuestionOption};
use crate::db::types::{AssignmentMode, ExamStatus, QuestionKind};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamCreate {
    #[serde(alias = "courseId")]
    #[validate(length(min = 1, message = "course_id must not be empty"))]
    pub(crate) course_id: String,
    #[validate(length(min = 1, message = "cohort must not be empty"))]
    pub(crate) cohort: String,
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(alias = "startTime", deserialize_with = "deserialize_offset_datetime_flexible")]
    pub(crate) start_time: OffsetDateTime,
    #[serde(alias = "endTime", deserialize_with = "deserialize_offset_datetime_flexible")]
    pub(crate) end_time: OffsetDateTime,
    #[serde(alias = "durationMinutes")]
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    pub(crate) duration_minutes: i32,
    #[serde(default = "default_attempts_allowed")]
    #[serde(alias = "attemptsAllowed")]
    #[validate(range(min = 1, message = "attempts_allowed must be positive"))]
    pub(crate) attempts_allowed: i32,
    #[serde(default = "default_assignment_mode")]
    #[serde(alias = "assignmentMode")]
    pub(crate) assignment_mode: AssignmentMode,
    #[serde(default)]
    #[serde(alias = "assignmentSeed")]
    pub(crate) assignment_seed: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamUpdate {
    #[serde(default)]
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(
        default,
        alias = "startTime",
        deserialize_with = "deserialize_option_offset_datetime_flexible"
    )]
    pub(crate) start_time: Option<OffsetDateTime>,
    #[serde(
        default,
        alias = "endTime",
        deserialize_with = "deserialize_option_offset_datetime_flexible"
    )]
    pub(crate) end_time: Option<OffsetDateTime>,
    #[serde(default)]
    #[serde(alias = "durationMinutes")]
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    pub(crate) duration_minutes: Option<i32>,
    #[serde(default)]
    #[serde(alias = "attemptsAllowed")]
    #[validate(range(min = 1, message = "attempts_allowed must be positive"))]
    pub(crate) attempts_allowed: Option<i32>,
    #[serde(default)]
    #[serde(alias = "assignmentMode")]
    pub(crate) assignment_mode: Option<AssignmentMode>,
    #[serde(default)]
    #[serde(alias = "assignmentSeed")]
    pub(crate) assignment_seed: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamResponse {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) cohort: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) start_time: String,
    pub(crate) end_time: String,
    pub(crate) duration_minutes: i32,
    pub(crate) attempts_allowed: i32,
    pub(crate) assignment_mode: AssignmentMode,
    pub(crate) assignment_seed: Option<String>,
    pub(crate) status: ExamStatus,
    pub(crate) created_by: String,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
    pub(crate) published_at: Option<String>,
}

impl ExamResponse {
    pub(crate) fn from_db(exam: Exam) -> Self {
        Self {
            id: exam.id,
            course_id: exam.course_id,
            cohort: exam.cohort,
            title: exam.title,
            description: exam.description,
            start_time: format_primitive(exam.start_time),
            end_time: format_primitive(exam.end_time),
            duration_minutes: exam.duration_minutes,
            attempts_allowed: exam.attempts_allowed,
            assignment_mode: exam.assignment_mode,
            assignment_seed: exam.assignment_seed,
            status: exam.status,
            created_by: exam.created_by,
            created_at: format_primitive(exam.created_at),
            updated_at: format_primitive(exam.updated_at),
            published_at: exam.published_at.map(format_primitive),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct OptionCreate {
    #[serde(alias = "optionText")]
    #[validate(length(min = 1, message = "option_text must not be empty"))]
    pub(crate) option_text: String,
    #[serde(default)]
    #[serde(alias = "isCorrect")]
    pub(crate) is_correct: bool,
    #[serde(default)]
    #[validate(range(min = 0, message = "position must be non-negative"))]
    pub(crate) position: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    #[serde(alias = "questionText")]
    #[validate(length(min = 1, message = "question_text must not be empty"))]
    pub(crate) question_text: String,
    pub(crate) kind: QuestionKind,
    #[validate(range(exclusive_min = 0.0, message = "marks must be positive"))]
    pub(crate) marks: f64,
    #[serde(default)]
    #[validate(range(min = 0, message = "position must be non-negative"))]
    pub(crate) position: i32,
    #[serde(default)]
    #[validate(nested)]
    pub(crate) options: Vec<OptionCreate>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionUpdate {
    #[serde(default)]
    #[serde(alias = "questionText")]
    #[validate(length(min = 1, message = "question_text must not be empty"))]
    pub(crate) question_text: Option<String>,
    #[serde(default)]
    #[validate(range(exclusive_min = 0.0, message = "marks must be positive"))]
    pub(crate) marks: Option<f64>,
    #[serde(default)]
    #[validate(range(min = 0, message = "position must be non-negative"))]
    pub(crate) position: Option<i32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OptionResponse {
    pub(crate) id: String,
    pub(crate) option_text: String,
    pub(crate) is_correct: bool,
    pub(crate) position: i32,
}

impl OptionResponse {
    pub(crate) fn from_db(option: QuestionOption) -> Self {
        Self {
            id: option.id,
            option_text: option.option_text,
            is_correct: option.is_correct,
            position: option.position,
        }
    }

    /// Student-facing view: correctness flags stay server-side.
    pub(crate) fn redacted(option: QuestionOption) -> Self {
        Self {
            id: option.id,
            option_text: option.option_text,
            is_correct: false,
            position: option.position,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) question_text: String,
    pub(crate) kind: QuestionKind,
    pub(crate) marks: f64,
    pub(crate) position: i32,
    pub(crate) options: Vec<OptionResponse>,
}

impl QuestionResponse {
    pub(crate) fn from_db(question: Question, options: Vec<OptionResponse>) -> Self {
        Self {
            id: question.id,
            exam_id: question.exam_id,
            question_text: question.question_text,
            kind: question.kind,
            marks: question.marks,
            position: question.position,
            options,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SetCreate {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub(crate) name: String,
    #[serde(default)]
    #[serde(alias = "accessPassword")]
    pub(crate) access_password: Option<String>,
    #[serde(default)]
    #[serde(alias = "questionIds")]
    pub(crate) question_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SetResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) name: String,
    pub(crate) password_protected: bool,
    pub(crate) question_count: i64,
    pub(crate) max_score: f64,
    pub(crate) created_at: String,
}

impl SetResponse {
    pub(crate) fn from_db(set: ExamSet, question_count: i64, max_score: f64) -> Self {
        Self {
            id: set.id,
            exam_id: set.exam_id,
            name: set.name,
            password_protected: set.access_password_hash.is_some(),
            question_count,
            max_score,
            created_at: format_primitive(set.created_at),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SetQuestionPayload {
    #[serde(alias = "questionId")]
    pub(crate) question_id: String,
}

fn default_attempts_allowed() -> i32 {
    1
}

fn default_assignment_mode() -> AssignmentMode {
    AssignmentMode::Random
}

fn parse_offset_datetime_flexible(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(value);
    }

    // Frontend's datetime-local often sends without timezone.
    if raw.len() == 16 && raw.as_bytes().get(10) == Some(&b'T') {
        let candidate = format!("{raw}:00Z");
        if let Ok(value) = OffsetDateTime::parse(&candidate, &Rfc3339) {
            return Some(value);
        }
    }

    if raw.len() == 19 && raw.as_bytes().get(10) == Some(&b'T') {
        let candidate = format!("{raw}Z");
        if let Ok(value) = OffsetDateTime::parse(&candidate, &Rfc3339) {
            return Some(value);
        }
    }

    if let Ok(value) =
        PrimitiveDateTime::parse(raw, &format_description!("[year]-[month]-[day]T[hour]:[minute]"))
    {
        return Some(value.assume_utc());
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(value.assume_utc());
    }

    None
}

fn deserialize_offset_datetime_flexible<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_offset_datetime_flexible(&raw)
        .ok_or_else(|| D::Error::custom(format!("invalid datetime: {raw}")))
}

fn deserialize_option_offset_datetime_flexible<'de, D>(
    deserializer: D,
) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        Some(value) => parse_offset_datetime_flexible(&value)
            .ok_or_else(|| D::Error::custom(format!("invalid datetime: {value}")))
            .map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_with_offset() {
        let parsed = parse_offset_datetime_flexible("2025-03-10T09:00:00+03:00").unwrap();
        assert_eq!(parsed.unix_timestamp(), 1741586400);
    }

    #[test]
    fn parses_datetime_local_without_timezone() {
        let parsed = parse_offset_datetime_flexible("2025-03-10T09:00").unwrap();
        assert_eq!(parsed.unix_timestamp(), 1741597200);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_offset_datetime_flexible("next tuesday").is_none());
    }
}
