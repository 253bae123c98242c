use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::CourseId;

/// Score shown when the backend omits one.
pub const DEFAULT_CERTIFICATE_SCORE: f64 = 95.0;

/// A certificate earned by completing a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: String,
    pub course_id: CourseId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub score: f64,
    pub verification_code: Option<String>,
    pub issue_date: Option<DateTime<Utc>>,
}

/// A quiz result row from the learner's score history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizScore {
    pub quiz_id: String,
    pub quiz_name: String,
    pub score: f64,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Aggregate quiz statistics for the learner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QuizStats {
    pub total_quizzes_taken: u32,
    pub average_score: f64,
    pub best_score: f64,
    pub total_attempts: u32,
}
