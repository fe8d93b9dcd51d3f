use time::{Duration, PrimitiveDateTime};

use crate::db::models::Exam;
use crate::services::EngineError;

/// Start window is inclusive at `start_time` and exclusive at `end_time`:
/// an attempt started at exactly `end_time` is rejected. Submit and expiry
/// use the same `now >= deadline` comparison so a client can never observe a
/// submit window the sweep has already closed.
pub(crate) fn check_start_window(exam: &Exam, now: PrimitiveDateTime) -> Result<(), EngineError> {
    if now < exam.start_time || now >= exam.end_time {
        return Err(EngineError::OutsideExamWindow);
    }
    Ok(())
}

/// Hard deadline for an attempt: the per-attempt duration capped by the
/// exam-wide end time.
pub(crate) fn compute_deadline(exam: &Exam, started_at: PrimitiveDateTime) -> PrimitiveDateTime {
    let duration_deadline = started_at + Duration::minutes(exam.duration_minutes as i64);
    if duration_deadline < exam.end_time {
        duration_deadline
    } else {
        exam.end_time
    }
}

pub(crate) fn is_expired(deadline: PrimitiveDateTime, now: PrimitiveDateTime) -> bool {
    now >= deadline
}

#[cfg(test)]
mod tests {
    use time::{Date, Time};

    use super::*;
    use crate::db::types::{AssignmentMode, ExamStatus};

    fn at(hour: u8, minute: u8) -> PrimitiveDateTime {
        let date = Date::from_calendar_date(2025, time::Month::March, 10).unwrap();
        PrimitiveDateTime::new(date, Time::from_hms(hour, minute, 0).unwrap())
    }

    fn exam(duration_minutes: i32) -> Exam {
        Exam {
            id: "exam-1".to_string(),
            course_id: "course-1".to_string(),
            cohort: "JHS-2".to_string(),
            title: "Midterm".to_string(),
            description: None,
            start_time: at(9, 0),
            end_time: at(11, 0),
            duration_minutes,
            attempts_allowed: 1,
            assignment_mode: AssignmentMode::Random,
            assignment_seed: None,
            status: ExamStatus::Published,
            created_by: "teacher-1".to_string(),
            created_at: at(8, 0),
            updated_at: at(8, 0),
            published_at: Some(at(8, 30)),
        }
    }

    #[test]
    fn window_is_inclusive_at_start() {
        assert!(check_start_window(&exam(60), at(9, 0)).is_ok());
    }

    #[test]
    fn window_is_exclusive_at_end() {
        assert_eq!(check_start_window(&exam(60), at(11, 0)), Err(EngineError::OutsideExamWindow));
    }

    #[test]
    fn window_rejects_before_start() {
        assert_eq!(check_start_window(&exam(60), at(8, 59)), Err(EngineError::OutsideExamWindow));
    }

    #[test]
    fn deadline_uses_duration_when_it_fits() {
        assert_eq!(compute_deadline(&exam(60), at(9, 30)), at(10, 30));
    }

    #[test]
    fn deadline_is_capped_by_exam_end() {
        assert_eq!(compute_deadline(&exam(90), at(10, 0)), at(11, 0));
    }

    #[test]
    fn expiry_boundary_matches_submit_gate() {
        let deadline = at(10, 30);
        assert!(!is_expired(deadline, at(10, 29)));
        assert!(is_expired(deadline, at(10, 30)));
        assert!(is_expired(deadline, at(10, 31)));
    }
}
