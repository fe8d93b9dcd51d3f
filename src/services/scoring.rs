use std::collections::HashMap;

use crate::db::models::{Answer, Question, QuestionOption};
use crate::db::types::QuestionKind;

/// Absolute tolerance for numeric answers. "0.30000000000000004" and "0.3"
/// grade the same; genuinely different values a hundredth apart do not.
const NUMERIC_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QuestionAward {
    pub(crate) question_id: String,
    /// `None` means a subjective answer still waiting for manual marks.
    pub(crate) awarded_marks: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GradeOutcome {
    pub(crate) awards: Vec<QuestionAward>,
    pub(crate) score: f64,
    pub(crate) max_score: f64,
    /// True when no question is left waiting for manual marks.
    pub(crate) fully_graded: bool,
}

/// Grades an attempt against its assigned set. Every question in the set
/// contributes to `max_score` whether or not it was answered; an unanswered
/// objective question scores zero, an unanswered subjective one too (there
/// is nothing for a marker to read).
pub(crate) fn grade(set_questions: &[(Question, Vec<QuestionOption>)], answers: &[Answer]) -> GradeOutcome {
    let by_question: HashMap<&str, &Answer> =
        answers.iter().map(|a| (a.question_id.as_str(), a)).collect();

    let mut awards = Vec::with_capacity(set_questions.len());
    let mut score = 0.0;
    let mut max_score = 0.0;
    let mut fully_graded = true;

    for (question, options) in set_questions {
        max_score += question.marks;
        let answer = by_question.get(question.id.as_str()).copied();
        let awarded = grade_question(question, options, answer);

        match awarded {
            Some(marks) => score += marks,
            None => fully_graded = false,
        }
        awards.push(QuestionAward { question_id: question.id.clone(), awarded_marks: awarded });
    }

    GradeOutcome { awards, score, max_score, fully_graded }
}

fn grade_question(
    question: &Question,
    options: &[QuestionOption],
    answer: Option<&Answer>,
) -> Option<f64> {
    let Some(answer) = answer else {
        return Some(0.0);
    };

    match question.kind {
        QuestionKind::Mcq | QuestionKind::TrueFalse => {
            let correct = answer
                .option_id
                .as_deref()
                .and_then(|id| options.iter().find(|o| o.id == id))
                .map(|o| o.is_correct)
                .unwrap_or(false);
            Some(if correct { question.marks } else { 0.0 })
        }
        QuestionKind::Numeric => {
            let response = answer.text_response.as_deref().unwrap_or("");
            let correct = options
                .iter()
                .filter(|o| o.is_correct)
                .any(|o| numeric_matches(response, &o.option_text));
            Some(if correct { question.marks } else { 0.0 })
        }
        // Manual marks survive regrades; an unmarked subjective answer keeps
        // the whole attempt out of the graded state.
        QuestionKind::Subjective => answer.awarded_marks,
    }
}

fn numeric_matches(response: &str, accepted: &str) -> bool {
    let response = response.trim();
    let accepted = accepted.trim();
    match (response.parse::<f64>(), accepted.parse::<f64>()) {
        (Ok(a), Ok(b)) => (a - b).abs() <= NUMERIC_TOLERANCE,
        _ => !response.is_empty() && response.eq_ignore_ascii_case(accepted),
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn question(id: &str, kind: QuestionKind, marks: f64) -> Question {
        Question {
            id: id.to_string(),
            exam_id: "exam-1".to_string(),
            question_text: format!("Question {id}"),
            kind,
            marks,
            position: 0,
            created_at: datetime!(2025-03-01 08:00),
            updated_at: datetime!(2025-03-01 08:00),
        }
    }

    fn option(id: &str, question_id: &str, text: &str, is_correct: bool) -> QuestionOption {
        QuestionOption {
            id: id.to_string(),
            question_id: question_id.to_string(),
            option_text: text.to_string(),
            is_correct,
            position: 0,
        }
    }

    fn answer(question_id: &str, option_id: Option<&str>, text: Option<&str>) -> Answer {
        Answer {
            id: format!("ans-{question_id}"),
            attempt_id: "attempt-1".to_string(),
            question_id: question_id.to_string(),
            option_id: option_id.map(str::to_string),
            text_response: text.map(str::to_string),
            awarded_marks: None,
            created_at: datetime!(2025-03-10 09:05),
            updated_at: datetime!(2025-03-10 09:05),
        }
    }

    #[test]
    fn partial_credit_sums_per_question() {
        // Four two-mark questions, one correct pick, one wrong pick, one
        // correct numeric, one unanswered: 4 of 8.
        let set = vec![
            (
                question("q1", QuestionKind::Mcq, 2.0),
                vec![option("o1", "q1", "Paris", true), option("o2", "q1", "Lyon", false)],
            ),
            (
                question("q2", QuestionKind::TrueFalse, 2.0),
                vec![option("o3", "q2", "True", true), option("o4", "q2", "False", false)],
            ),
            (question("q3", QuestionKind::Numeric, 2.0), vec![option("o5", "q3", "42", true)]),
            (question("q4", QuestionKind::Mcq, 2.0), vec![option("o6", "q4", "Yes", true)]),
        ];
        let answers = vec![
            answer("q1", Some("o1"), None),
            answer("q2", Some("o4"), None),
            answer("q3", None, Some("42")),
        ];

        let outcome = grade(&set, &answers);
        assert_eq!(outcome.score, 4.0);
        assert_eq!(outcome.max_score, 8.0);
        assert!(outcome.fully_graded);
    }

    #[test]
    fn five_of_eight_is_not_rescaled() {
        let set: Vec<_> = (0..8)
            .map(|i| {
                let qid = format!("q{i}");
                let opts = vec![
                    option(&format!("ok{i}"), &qid, "right", true),
                    option(&format!("ko{i}"), &qid, "wrong", false),
                ];
                (question(&qid, QuestionKind::Mcq, 1.0), opts)
            })
            .collect();
        let answers: Vec<_> = (0..8)
            .map(|i| {
                let pick = if i < 5 { format!("ok{i}") } else { format!("ko{i}") };
                answer(&format!("q{i}"), Some(&pick), None)
            })
            .collect();

        let outcome = grade(&set, &answers);
        assert_eq!(outcome.score, 5.0);
        assert_eq!(outcome.max_score, 8.0);
    }

    #[test]
    fn numeric_tolerates_float_noise() {
        let set = vec![(
            question("q1", QuestionKind::Numeric, 3.0),
            vec![option("o1", "q1", "0.3", true)],
        )];
        let answers = vec![answer("q1", None, Some("0.30000000000000004"))];
        assert_eq!(grade(&set, &answers).score, 3.0);
    }

    #[test]
    fn numeric_rejects_nearby_but_different() {
        let set = vec![(
            question("q1", QuestionKind::Numeric, 3.0),
            vec![option("o1", "q1", "0.3", true)],
        )];
        let answers = vec![answer("q1", None, Some("0.31"))];
        assert_eq!(grade(&set, &answers).score, 0.0);
    }

    #[test]
    fn numeric_falls_back_to_text_match() {
        let set = vec![(
            question("q1", QuestionKind::Numeric, 1.0),
            vec![option("o1", "q1", "1/2", true)],
        )];
        assert_eq!(grade(&set, &[answer("q1", None, Some(" 1/2 "))]).score, 1.0);
        assert_eq!(grade(&set, &[answer("q1", None, Some(""))]).score, 0.0);
    }

    #[test]
    fn subjective_answer_blocks_full_grading() {
        let set = vec![
            (
                question("q1", QuestionKind::Mcq, 2.0),
                vec![option("o1", "q1", "A", true)],
            ),
            (question("q2", QuestionKind::Subjective, 5.0), vec![]),
        ];
        let answers = vec![
            answer("q1", Some("o1"), None),
            answer("q2", None, Some("An essay about rivers.")),
        ];

        let outcome = grade(&set, &answers);
        assert_eq!(outcome.score, 2.0);
        assert_eq!(outcome.max_score, 7.0);
        assert!(!outcome.fully_graded);
        assert_eq!(outcome.awards[1].awarded_marks, None);
    }

    #[test]
    fn manual_marks_are_kept_on_regrade() {
        let set = vec![(question("q1", QuestionKind::Subjective, 5.0), vec![])];
        let mut marked = answer("q1", None, Some("An essay."));
        marked.awarded_marks = Some(3.5);

        let outcome = grade(&set, &[marked]);
        assert_eq!(outcome.score, 3.5);
        assert!(outcome.fully_graded);
    }

    #[test]
    fn unanswered_subjective_scores_zero_and_completes() {
        let set = vec![(question("q1", QuestionKind::Subjective, 5.0), vec![])];
        let outcome = grade(&set, &[]);
        assert_eq!(outcome.score, 0.0);
        assert!(outcome.fully_graded);
    }

    #[test]
    fn score_never_exceeds_max() {
        let set = vec![
            (
                question("q1", QuestionKind::Mcq, 2.5),
                vec![option("o1", "q1", "A", true)],
            ),
            (question("q2", QuestionKind::Numeric, 1.5), vec![option("o2", "q2", "7", true)]),
        ];
        let answers = vec![answer("q1", Some("o1"), None), answer("q2", None, Some("7.0"))];
        let outcome = grade(&set, &answers);
        assert!(outcome.score <= outcome.max_score);
        assert_eq!(outcome.score, 4.0);
    }

    #[test]
    fn objective_awards_are_concrete_per_question() {
        // Result views read marks off the answer rows, so every graded
        // objective answer must carry a concrete award, zero included.
        let set = vec![
            (
                question("q1", QuestionKind::Mcq, 2.0),
                vec![option("o1", "q1", "A", true), option("o2", "q1", "B", false)],
            ),
            (
                question("q2", QuestionKind::Mcq, 2.0),
                vec![option("o3", "q2", "A", true), option("o4", "q2", "B", false)],
            ),
            (question("q3", QuestionKind::Numeric, 3.0), vec![option("o5", "q3", "7", true)]),
            (question("q4", QuestionKind::Subjective, 5.0), vec![]),
        ];
        let answers = vec![
            answer("q1", Some("o1"), None),
            answer("q2", Some("o4"), None),
            answer("q4", None, Some("An essay.")),
        ];

        let outcome = grade(&set, &answers);
        assert_eq!(outcome.awards[0].awarded_marks, Some(2.0));
        assert_eq!(outcome.awards[1].awarded_marks, Some(0.0));
        // Unanswered objective question: zero, with no answer row behind it.
        assert_eq!(outcome.awards[2].awarded_marks, Some(0.0));
        assert_eq!(outcome.awards[3].awarded_marks, None);
        assert_eq!(
            outcome.awards.iter().map(|a| a.question_id.as_str()).collect::<Vec<_>>(),
            ["q1", "q2", "q3", "q4"]
        );
    }

    #[test]
    fn grading_is_deterministic() {
        let set = vec![
            (
                question("q1", QuestionKind::Mcq, 2.0),
                vec![option("o1", "q1", "A", true), option("o2", "q1", "B", false)],
            ),
            (question("q2", QuestionKind::Numeric, 3.0), vec![option("o3", "q2", "9", true)]),
        ];
        let answers = vec![answer("q1", Some("o2"), None), answer("q2", None, Some("9"))];
        let first = grade(&set, &answers);
        for _ in 0..5 {
            assert_eq!(grade(&set, &answers), first);
        }
    }
}
