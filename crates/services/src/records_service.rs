use std::sync::Arc;

use tracing::{debug, info, warn};

use cacao_core::model::{Certificate, CourseId, QuizScore, QuizStats, Session};

use crate::api::LearningApi;
use crate::error::{ApiError, RecordsError};

/// Certificates and quiz results.
#[derive(Clone)]
pub struct RecordsService {
    api: Arc<dyn LearningApi>,
}

impl RecordsService {
    #[must_use]
    pub fn new(api: Arc<dyn LearningApi>) -> Self {
        Self { api }
    }

    /// The learner's certificates.
    ///
    /// When the list is empty or the request fails, the backend is asked to
    /// issue certificates for completed courses and, if it created any, the
    /// list is fetched once more. Anything else ends in an empty list.
    ///
    /// # Errors
    ///
    /// Returns `RecordsError::Api` only for a rejected token.
    pub async fn certificates(&self, session: &Session) -> Result<Vec<Certificate>, RecordsError> {
        let Some(token) = session.auth_token() else {
            return Ok(Vec::new());
        };

        match self.api.certificates(token).await {
            Ok(list) if !list.is_empty() => return Ok(list),
            Ok(_) => debug!("no certificates yet, asking backend to issue"),
            Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
            Err(err) => warn!(error = %err, "certificate fetch failed, asking backend to issue"),
        }

        match self.api.create_certificates_for_completed(token).await {
            Ok(0) => Ok(Vec::new()),
            Ok(created) => {
                info!(created, "certificates issued for completed courses");
                match self.api.certificates(token).await {
                    Ok(list) => Ok(list),
                    Err(ApiError::Unauthorized) => Err(ApiError::Unauthorized.into()),
                    Err(err) => {
                        warn!(error = %err, "certificate refetch failed");
                        Ok(Vec::new())
                    }
                }
            }
            Err(ApiError::Unauthorized) => Err(ApiError::Unauthorized.into()),
            Err(err) => {
                debug!(error = %err, "certificate creation failed");
                Ok(Vec::new())
            }
        }
    }

    /// PDF bytes for a course certificate.
    ///
    /// # Errors
    ///
    /// Returns `RecordsError::Guest` for guests or `RecordsError::Api` if the
    /// download fails.
    pub async fn download_certificate(
        &self,
        session: &Session,
        course_id: &CourseId,
    ) -> Result<Vec<u8>, RecordsError> {
        let token = session.auth_token().ok_or(RecordsError::Guest)?;
        Ok(self.api.download_certificate(token, course_id).await?)
    }

    /// # Errors
    ///
    /// Returns `RecordsError::Api` if the request fails.
    pub async fn quiz_scores(&self, session: &Session) -> Result<Vec<QuizScore>, RecordsError> {
        match session.auth_token() {
            Some(token) => Ok(self.api.quiz_scores(token).await?),
            None => Ok(Vec::new()),
        }
    }

    /// # Errors
    ///
    /// Returns `RecordsError::Api` if the request fails.
    pub async fn quiz_stats(&self, session: &Session) -> Result<QuizStats, RecordsError> {
        match session.auth_token() {
            Some(token) => Ok(self.api.quiz_stats(token).await?),
            None => Ok(QuizStats::default()),
        }
    }
}
