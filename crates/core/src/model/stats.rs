use serde::{Deserialize, Serialize};

use crate::model::{Course, CourseProgress};

/// Score and time totals reported by the backend's progress statistics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressStats {
    pub total_score: f64,
    pub average_score: f64,
    pub total_time_spent: f64,
    pub average_progress: f64,
}

/// Counters the achievement rules are evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LearnerCounters {
    pub completed_courses: u32,
    pub total_score: f64,
    pub average_score: f64,
    pub courses_in_progress: u32,
    pub total_courses: u32,
}

impl LearnerCounters {
    /// Derive counters from the catalog, per-course progress, and score stats.
    ///
    /// Progress entries for courses missing from the catalog only feed the
    /// in-progress count.
    #[must_use]
    pub fn collect(catalog: &[Course], progress: &[CourseProgress], stats: &ProgressStats) -> Self {
        let totals = ProgressTotals::collect(catalog, progress);
        Self {
            completed_courses: totals.completed_courses,
            total_score: finite_or_zero(stats.total_score),
            average_score: finite_or_zero(stats.average_score),
            courses_in_progress: totals.in_progress_courses,
            total_courses: totals.total_courses,
        }
    }
}

/// Aggregate view over all courses, used for the learning-progress panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProgressTotals {
    pub total_courses: u32,
    pub completed_courses: u32,
    pub in_progress_courses: u32,
    pub completed_lessons: u32,
    /// `round(completed / total * 100)`, or 0 for an empty catalog.
    pub completion_percentage: u32,
}

impl ProgressTotals {
    #[must_use]
    pub fn collect(catalog: &[Course], progress: &[CourseProgress]) -> Self {
        let mut completed_courses = 0_u32;
        let mut in_progress_courses = 0_u32;
        let mut completed_lessons = 0_u32;

        for entry in progress {
            let lessons = u32::try_from(entry.completed_lessons().len()).unwrap_or(u32::MAX);
            completed_lessons = completed_lessons.saturating_add(lessons);

            // Entries outside the catalog never count as completed courses, but
            // still count as in progress until the API reports them finished.
            let completed = match catalog.iter().find(|c| c.id() == entry.course_id()) {
                Some(course) => entry.completion(course).is_completed(),
                None => {
                    if entry.is_started() && entry.overall_progress() < 100.0 {
                        in_progress_courses = in_progress_courses.saturating_add(1);
                    }
                    continue;
                }
            };
            if completed {
                completed_courses = completed_courses.saturating_add(1);
            } else if entry.is_started() {
                in_progress_courses = in_progress_courses.saturating_add(1);
            }
        }

        let total_courses = u32::try_from(catalog.len()).unwrap_or(u32::MAX);
        let completion_percentage = if total_courses == 0 {
            0
        } else {
            percentage(f64::from(completed_courses), f64::from(total_courses))
        };

        Self {
            total_courses,
            completed_courses,
            in_progress_courses,
            completed_lessons,
            completion_percentage,
        }
    }
}

/// `min(100, round(current / target * 100))`, with 0 for a non-positive target.
#[must_use]
pub fn percentage(current: f64, target: f64) -> u32 {
    if target <= 0.0 || !current.is_finite() || !target.is_finite() {
        return 0;
    }
    let ratio = (current / target * 100.0).round().clamp(0.0, 100.0);
    // Clamped into 0..=100 above, so the cast cannot truncate.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let value = ratio as u32;
    value
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
