//! Behavioural questionnaire
//!
//! A fixed pool of 20 Likert-scale questions; each quiz serves a random five.
//! Scoring maps choices to 1..5, rolls up per category, and derives a
//! persona band from the overall percentage.

use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Questions served per quiz
pub const QUIZ_SIZE: usize = 5;

/// Likert options, scored 1..5 in order
pub const OPTIONS: [&str; 5] = ["Never", "Rarely", "Sometimes", "Often", "Always"];

/// The fixed question pool: (id, text, category)
const QUESTION_POOL: [(u32, &str, &str); 20] = [
    (1, "I set aside money for taxes before spending business income.", "financial_discipline"),
    (2, "I keep my personal and business accounts separate.", "financial_discipline"),
    (3, "I record every business expense within a day of making it.", "financial_discipline"),
    (4, "I pay my suppliers on or before the agreed date.", "credit_behaviour"),
    (5, "I check my outstanding loan balances at least once a month.", "credit_behaviour"),
    (6, "I repay credit taken for the business before taking on new credit.", "credit_behaviour"),
    (7, "I plan large purchases at least a month in advance.", "planning"),
    (8, "I maintain a written budget for the coming quarter.", "planning"),
    (9, "I review last month's sales before ordering new stock.", "planning"),
    (10, "I keep an emergency fund covering at least one month of expenses.", "risk_management"),
    (11, "I insure the assets my business depends on.", "risk_management"),
    (12, "I avoid committing more than half my monthly income to fixed payments.", "risk_management"),
    (13, "I invoice customers immediately after delivering goods or services.", "business_stability"),
    (14, "I follow up on overdue customer payments within a week.", "business_stability"),
    (15, "I retain my regular customers from one season to the next.", "business_stability"),
    (16, "I compare prices from more than one supplier before restocking.", "planning"),
    (17, "I put part of my profit back into the business every month.", "financial_discipline"),
    (18, "I check my bank statement against my own records.", "financial_discipline"),
    (19, "I know the total amount I owe across all lenders.", "credit_behaviour"),
    (20, "I could cover a sudden large expense without missing other payments.", "risk_management"),
];

/// A question as served to the caller
#[derive(Debug, Serialize, Clone)]
pub struct QuizQuestion {
    pub id: u32,
    pub text: String,
    pub options: Vec<String>,
}

/// A served quiz
#[derive(Debug, Serialize, Clone)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
}

/// One answer in a submission
#[derive(Debug, Deserialize, Clone)]
pub struct QuizResponse {
    pub id: u32,
    pub choice: String,
}

/// Per-category score rollup
#[derive(Debug, Serialize, Clone, Default)]
pub struct CategoryScore {
    pub score: u32,
    pub max_score: u32,
    pub percentage: f64,
}

/// Persona derived from the overall percentage
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Persona {
    pub name: String,
    pub feedback: String,
}

/// A scored submission
#[derive(Debug, Serialize, Clone)]
pub struct ScoredQuiz {
    pub total_score: u32,
    /// total/25, 4 dp
    pub behaviour_score: f64,
    pub normalized_score: f64,
    pub category_breakdown: HashMap<String, CategoryScore>,
    pub persona: Persona,
}

/// Serve a quiz: Fisher-Yates shuffle of the pool, first five questions.
pub fn generate_quiz() -> Quiz {
    let mut pool: Vec<&(u32, &str, &str)> = QUESTION_POOL.iter().collect();
    pool.shuffle(&mut rand::thread_rng());

    Quiz {
        questions: pool
            .into_iter()
            .take(QUIZ_SIZE)
            .map(|(id, text, _)| QuizQuestion {
                id: *id,
                text: (*text).to_string(),
                options: OPTIONS.iter().map(|o| o.to_string()).collect(),
            })
            .collect(),
    }
}

fn choice_points(choice: &str) -> Option<u32> {
    OPTIONS
        .iter()
        .position(|o| o.eq_ignore_ascii_case(choice))
        .map(|idx| idx as u32 + 1)
}

fn question_category(id: u32) -> Option<&'static str> {
    QUESTION_POOL
        .iter()
        .find(|(qid, _, _)| *qid == id)
        .map(|(_, _, category)| *category)
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Score a submission. Exactly five responses, no duplicate ids, every id
/// from the pool, every choice from the option set.
pub fn score_quiz(responses: &[QuizResponse]) -> Result<ScoredQuiz, ApiError> {
    if responses.len() != QUIZ_SIZE {
        return Err(ApiError::Validation(format!(
            "expected exactly {} responses, got {}",
            QUIZ_SIZE,
            responses.len()
        )));
    }

    let mut seen = HashSet::new();
    let mut total_score = 0u32;
    let mut category_breakdown: HashMap<String, CategoryScore> = HashMap::new();

    for response in responses {
        if !seen.insert(response.id) {
            return Err(ApiError::Validation(format!(
                "duplicate response for question {}",
                response.id
            )));
        }
        let category = question_category(response.id).ok_or_else(|| {
            ApiError::Validation(format!("unknown question id {}", response.id))
        })?;
        let points = choice_points(&response.choice).ok_or_else(|| {
            ApiError::Validation(format!("'{}' is not a valid choice", response.choice))
        })?;

        total_score += points;
        let entry = category_breakdown.entry(category.to_string()).or_default();
        entry.score += points;
        entry.max_score += OPTIONS.len() as u32;
    }

    for entry in category_breakdown.values_mut() {
        entry.percentage = round4(f64::from(entry.score) / f64::from(entry.max_score) * 100.0);
    }

    let max_total = (QUIZ_SIZE * OPTIONS.len()) as u32;
    let behaviour_score = round4(f64::from(total_score) / f64::from(max_total));
    let overall_percentage = f64::from(total_score) / f64::from(max_total) * 100.0;

    Ok(ScoredQuiz {
        total_score,
        behaviour_score,
        normalized_score: behaviour_score,
        category_breakdown,
        persona: derive_persona(overall_percentage),
    })
}

/// Persona bands on the overall percentage.
fn derive_persona(percentage: f64) -> Persona {
    let (name, feedback) = if percentage > 80.0 {
        (
            "Prudent Strategist",
            "Disciplined financial habits across the board. Lenders see a well-run operation.",
        )
    } else if percentage > 60.0 {
        (
            "Reliable Operator",
            "Sound day-to-day practices with room to formalise planning and record keeping.",
        )
    } else if percentage > 40.0 {
        (
            "Emerging Professional",
            "The foundations are in place. Consistent bookkeeping and an emergency buffer would strengthen the profile.",
        )
    } else {
        (
            "High-Touch Applicant",
            "Significant gaps in financial routine. Start with separating accounts and tracking every expense.",
        )
    };
    Persona {
        name: name.to_string(),
        feedback: feedback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn responses(choice: &str) -> Vec<QuizResponse> {
        (1..=5)
            .map(|id| QuizResponse {
                id,
                choice: choice.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_quiz_serves_five_distinct_pool_questions() {
        let quiz = generate_quiz();
        assert_eq!(quiz.questions.len(), QUIZ_SIZE);

        let ids: HashSet<u32> = quiz.questions.iter().map(|q| q.id).collect();
        assert_eq!(ids.len(), QUIZ_SIZE);
        for question in &quiz.questions {
            assert!(question_category(question.id).is_some());
            assert_eq!(question.options.len(), 5);
            assert_eq!(question.options[0], "Never");
            assert_eq!(question.options[4], "Always");
        }
    }

    #[test]
    fn test_score_bounds() {
        let min = score_quiz(&responses("Never")).unwrap();
        assert_eq!(min.total_score, 5);
        assert_eq!(min.behaviour_score, 0.2);

        let max = score_quiz(&responses("Always")).unwrap();
        assert_eq!(max.total_score, 25);
        assert_eq!(max.behaviour_score, 1.0);
    }

    #[test]
    fn test_choice_scoring_is_case_insensitive() {
        let scored = score_quiz(&responses("sometimes")).unwrap();
        assert_eq!(scored.total_score, 15);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let mut four = responses("Often");
        four.pop();
        assert!(score_quiz(&four).is_err());

        let mut six = responses("Often");
        six.push(QuizResponse {
            id: 6,
            choice: "Often".to_string(),
        });
        assert!(score_quiz(&six).is_err());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut dup = responses("Often");
        dup[4].id = dup[0].id;
        let err = score_quiz(&dup).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_unknown_question_rejected() {
        let mut bad = responses("Often");
        bad[0].id = 99;
        assert!(score_quiz(&bad).is_err());
    }

    #[test]
    fn test_invalid_choice_rejected() {
        let mut bad = responses("Often");
        bad[2].choice = "Definitely".to_string();
        assert!(score_quiz(&bad).is_err());
    }

    #[test]
    fn test_category_rollup() {
        // Questions 1-3 are financial_discipline, 4-5 credit_behaviour.
        let scored = score_quiz(&responses("Always")).unwrap();
        let discipline = scored.category_breakdown.get("financial_discipline").unwrap();
        assert_eq!(discipline.score, 15);
        assert_eq!(discipline.max_score, 15);
        assert_eq!(discipline.percentage, 100.0);

        let credit = scored.category_breakdown.get("credit_behaviour").unwrap();
        assert_eq!(credit.score, 10);
        assert_eq!(credit.max_score, 10);
    }

    #[test]
    fn test_persona_bands() {
        assert_eq!(derive_persona(90.0).name, "Prudent Strategist");
        assert_eq!(derive_persona(70.0).name, "Reliable Operator");
        assert_eq!(derive_persona(50.0).name, "Emerging Professional");
        assert_eq!(derive_persona(30.0).name, "High-Touch Applicant");
        // Band edges are exclusive
        assert_eq!(derive_persona(80.0).name, "Reliable Operator");
        assert_eq!(derive_persona(60.0).name, "Emerging Professional");
        assert_eq!(derive_persona(40.0).name, "High-Touch Applicant");
    }

    #[test]
    fn test_all_always_is_prudent_strategist() {
        let scored = score_quiz(&responses("Always")).unwrap();
        assert_eq!(scored.persona.name, "Prudent Strategist");
        assert!(!scored.persona.feedback.is_empty());
    }
}
