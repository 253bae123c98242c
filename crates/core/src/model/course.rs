use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{CourseId, LessonId};

/// A lesson entry inside a catalog course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub title: String,
    pub order: u32,
}

impl Lesson {
    #[must_use]
    pub fn new(id: LessonId, title: impl Into<String>, order: u32) -> Self {
        Self {
            id,
            title: title.into(),
            order,
        }
    }
}

/// Catalog entry for a course.
///
/// `progress` is the legacy percentage stored directly on the course record. It
/// is not per-user and may be stale, but it still counts as a completion signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    id: CourseId,
    title: String,
    lessons: Vec<Lesson>,
    progress: f64,
    category: Option<String>,
    image: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl Course {
    #[must_use]
    pub fn new(id: CourseId, title: impl Into<String>, lessons: Vec<Lesson>) -> Self {
        Self {
            id,
            title: title.into(),
            lessons,
            progress: 0.0,
            category: None,
            image: None,
            created_at: None,
        }
    }

    /// Sets the legacy catalog percentage. Non-finite values count as zero.
    #[must_use]
    pub fn with_catalog_progress(mut self, progress: f64) -> Self {
        self.progress = if progress.is_finite() { progress } else { 0.0 };
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    #[must_use]
    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }

    #[must_use]
    pub fn with_created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        self.created_at = created_at;
        self
    }

    #[must_use]
    pub fn id(&self) -> &CourseId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    #[must_use]
    pub fn total_lessons(&self) -> usize {
        self.lessons.len()
    }

    #[must_use]
    pub fn catalog_progress(&self) -> f64 {
        self.progress
    }

    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    #[must_use]
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}
