//! Behavioural quiz API handlers

use axum::Json;
use serde::Deserialize;

use crate::analysis::quiz::{generate_quiz, score_quiz, Quiz, QuizResponse, ScoredQuiz};
use crate::error::ApiError;
use crate::models::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct QuizSubmission {
    pub responses: Vec<QuizResponse>,
}

/// GET /api/behaviour/questions
pub async fn get_questions() -> Json<ApiResponse<Quiz>> {
    Json(ApiResponse::ok(generate_quiz()))
}

/// POST /api/behaviour/submit
pub async fn submit_quiz(
    Json(submission): Json<QuizSubmission>,
) -> Result<Json<ApiResponse<ScoredQuiz>>, ApiError> {
    let scored = score_quiz(&submission.responses)?;
    Ok(Json(ApiResponse::ok(scored)))
}
