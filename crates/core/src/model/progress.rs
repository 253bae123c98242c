use serde::{Deserialize, Serialize};

use crate::model::{Course, CourseId, LessonId};

/// Per-user progress through one course, as last reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseProgress {
    course_id: CourseId,
    overall_progress: f64,
    completed_lessons: Vec<LessonId>,
}

impl CourseProgress {
    /// Build a progress record, clamping `overall_progress` into `0..=100`.
    ///
    /// Non-finite percentages are treated as zero.
    #[must_use]
    pub fn new(course_id: CourseId, overall_progress: f64, completed_lessons: Vec<LessonId>) -> Self {
        let overall_progress = if overall_progress.is_finite() {
            overall_progress.clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            course_id,
            overall_progress,
            completed_lessons,
        }
    }

    /// The "not started" record used when neither the backend nor the cache has data.
    #[must_use]
    pub fn not_started(course_id: CourseId) -> Self {
        Self::new(course_id, 0.0, Vec::new())
    }

    #[must_use]
    pub fn course_id(&self) -> &CourseId {
        &self.course_id
    }

    #[must_use]
    pub fn overall_progress(&self) -> f64 {
        self.overall_progress
    }

    #[must_use]
    pub fn completed_lessons(&self) -> &[LessonId] {
        &self.completed_lessons
    }

    /// Returns true once the backend reports any progress for the course.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.overall_progress > 0.0
    }

    /// Evaluate the three completion signals against the catalog entry.
    #[must_use]
    pub fn completion(&self, course: &Course) -> Completion {
        Completion::evaluate(course, self)
    }
}

/// The three completion signals for a course.
///
/// They can disagree (stale catalog field vs. live API), so completion is
/// optimistic: any true signal marks the course complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Completion {
    pub lesson_based: bool,
    pub catalog_based: bool,
    pub api_based: bool,
}

impl Completion {
    #[must_use]
    pub fn evaluate(course: &Course, progress: &CourseProgress) -> Self {
        let total_lessons = course.total_lessons();
        Self {
            lesson_based: total_lessons > 0 && progress.completed_lessons().len() >= total_lessons,
            catalog_based: course.catalog_progress() >= 100.0,
            api_based: progress.overall_progress() >= 100.0,
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.lesson_based || self.catalog_based || self.api_based
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Lesson;

    fn course_with_lessons(id: &str, lessons: u32, catalog: f64) -> Course {
        let lessons = (1..=lessons)
            .map(|n| Lesson::new(LessonId::new(format!("{id}-l{n}")), format!("Lesson {n}"), n))
            .collect();
        Course::new(CourseId::new(id), id.to_uppercase(), lessons).with_catalog_progress(catalog)
    }

    fn lesson_ids(id: &str, count: u32) -> Vec<LessonId> {
        (1..=count)
            .map(|n| LessonId::new(format!("{id}-l{n}")))
            .collect()
    }

    #[test]
    fn lesson_complete_course_with_stale_catalog_is_completed() {
        let course = course_with_lessons("a", 4, 40.0);
        let progress = CourseProgress::new(CourseId::new("a"), 75.0, lesson_ids("a", 4));

        let completion = progress.completion(&course);
        assert!(completion.lesson_based);
        assert!(!completion.catalog_based);
        assert!(!completion.api_based);
        assert!(completion.is_completed());
    }

    #[test]
    fn api_complete_course_without_lessons_recorded_is_completed() {
        let course = course_with_lessons("b", 5, 0.0);
        let progress = CourseProgress::new(CourseId::new("b"), 100.0, Vec::new());

        let completion = progress.completion(&course);
        assert!(!completion.lesson_based);
        assert!(completion.api_based);
        assert!(completion.is_completed());
    }

    #[test]
    fn empty_course_is_never_lesson_complete() {
        let course = course_with_lessons("empty", 0, 0.0);
        let progress = CourseProgress::not_started(CourseId::new("empty"));

        assert_eq!(progress.completion(&course), Completion::default());
        assert!(!progress.completion(&course).is_completed());
    }

    #[test]
    fn catalog_progress_alone_completes() {
        let course = course_with_lessons("c", 3, 100.0);
        let progress = CourseProgress::new(CourseId::new("c"), 10.0, lesson_ids("c", 1));
        assert!(progress.completion(&course).is_completed());
    }

    #[test]
    fn completion_is_the_or_of_the_signals() {
        for lessons_done in 0..=3 {
            for catalog in [0.0, 99.9, 100.0] {
                for api in [0.0, 50.0, 100.0] {
                    let course = course_with_lessons("x", 3, catalog);
                    let progress =
                        CourseProgress::new(CourseId::new("x"), api, lesson_ids("x", lessons_done));
                    let expected = lessons_done >= 3 || catalog >= 100.0 || api >= 100.0;
                    assert_eq!(progress.completion(&course).is_completed(), expected);
                }
            }
        }
    }

    #[test]
    fn progress_is_clamped() {
        let over = CourseProgress::new(CourseId::new("o"), 140.0, Vec::new());
        assert!((over.overall_progress() - 100.0).abs() < f64::EPSILON);
        let nan = CourseProgress::new(CourseId::new("n"), f64::NAN, Vec::new());
        assert!(nan.overall_progress().abs() < f64::EPSILON);
    }
}
