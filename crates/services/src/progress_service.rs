use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use cacao_core::model::{Course, CourseId, CourseProgress, ProgressStats, Session, UserKey};
use storage::repository::ProgressCache;

use crate::api::LearningApi;
use crate::error::{ApiError, ProgressError};

/// Per-course progress for the whole catalog, in catalog order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedProgress {
    pub entries: Vec<CourseProgress>,
    /// Courses whose live fetch failed (served from cache or defaulted).
    pub failed: usize,
    /// At least one fetch was rejected with 401.
    pub unauthorized: bool,
}

/// Merges live progress with the local cache.
#[derive(Clone)]
pub struct ProgressService {
    api: Arc<dyn LearningApi>,
    cache: Arc<dyn ProgressCache>,
}

impl ProgressService {
    #[must_use]
    pub fn new(api: Arc<dyn LearningApi>, cache: Arc<dyn ProgressCache>) -> Self {
        Self { api, cache }
    }

    /// Fetch the course catalog.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Api` if the catalog cannot be fetched.
    pub async fn catalog(&self) -> Result<Vec<Course>, ProgressError> {
        let courses = self.api.courses().await?;
        debug!(courses = courses.len(), "catalog loaded");
        Ok(courses)
    }

    /// Progress for every course in `catalog`, fetched concurrently.
    ///
    /// A failed fetch falls back to the cached value for the user and course,
    /// then to "not started". Every successful fetch is written back to the
    /// cache. Guests get "not started" everywhere without any request.
    pub async fn aggregate(&self, session: &Session, catalog: &[Course]) -> AggregatedProgress {
        let Some(token) = session.auth_token() else {
            return AggregatedProgress {
                entries: catalog
                    .iter()
                    .map(|c| CourseProgress::not_started(c.id().clone()))
                    .collect(),
                ..AggregatedProgress::default()
            };
        };

        let user = session.user_key();
        let mut tasks = JoinSet::new();
        for (idx, course) in catalog.iter().enumerate() {
            let api = Arc::clone(&self.api);
            let cache = Arc::clone(&self.cache);
            let user = user.clone();
            let token = token.to_string();
            let course_id = course.id().clone();
            tasks.spawn(async move {
                let outcome = fetch_one(api.as_ref(), cache.as_ref(), &user, &token, &course_id).await;
                (idx, outcome)
            });
        }

        let mut slots: Vec<Option<FetchOutcome>> = vec![None; catalog.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, outcome)) => {
                    if let Some(slot) = slots.get_mut(idx) {
                        *slot = Some(outcome);
                    }
                }
                Err(err) => warn!(error = %err, "progress task failed"),
            }
        }

        let mut result = AggregatedProgress::default();
        for (course, slot) in catalog.iter().zip(slots) {
            let outcome = slot.unwrap_or_else(|| FetchOutcome {
                progress: CourseProgress::not_started(course.id().clone()),
                live: false,
                unauthorized: false,
            });
            if !outcome.live {
                result.failed += 1;
            }
            result.unauthorized |= outcome.unauthorized;
            result.entries.push(outcome.progress);
        }
        result
    }

    /// Score and time totals.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Api` if the request fails.
    pub async fn stats(&self, session: &Session) -> Result<ProgressStats, ProgressError> {
        match session.auth_token() {
            Some(token) => Ok(self.api.progress_stats(token).await?),
            None => Ok(ProgressStats::default()),
        }
    }
}

#[derive(Debug, Clone)]
struct FetchOutcome {
    progress: CourseProgress,
    live: bool,
    unauthorized: bool,
}

async fn fetch_one(
    api: &dyn LearningApi,
    cache: &dyn ProgressCache,
    user: &UserKey,
    token: &str,
    course_id: &CourseId,
) -> FetchOutcome {
    match api.course_progress(token, course_id).await {
        Ok(progress) => {
            if let Err(err) = cache.store_progress(user, &progress).await {
                warn!(course = %course_id, error = %err, "failed to cache progress");
            }
            FetchOutcome {
                progress,
                live: true,
                unauthorized: false,
            }
        }
        Err(err) => {
            warn!(course = %course_id, error = %err, "progress fetch failed, using cache");
            let unauthorized = matches!(err, ApiError::Unauthorized);
            let progress = match cache.cached_progress(user, course_id).await {
                Ok(Some(cached)) => cached,
                Ok(None) => CourseProgress::not_started(course_id.clone()),
                Err(cache_err) => {
                    warn!(course = %course_id, error = %cache_err, "progress cache unreadable");
                    CourseProgress::not_started(course_id.clone())
                }
            };
            FetchOutcome {
                progress,
                live: false,
                unauthorized,
            }
        }
    }
}
