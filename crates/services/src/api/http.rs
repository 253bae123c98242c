use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use cacao_core::model::{
    BadgeViewState, Certificate, ClientSettings, Course, CourseId, CourseProgress, NewNotification,
    NotificationId, ProgressStats, QuizScore, QuizStats,
};

use super::wire::{
    BadgeViewsBody, BadgeViewsDto, CertificateDto, CertificatesBody, CourseDto, CoursesBody,
    CreatedCertificatesBody, NotificationDto, NotificationsBody, ProgressDto, ProgressStatsDto,
    QuizStatsBody, QuizScoresBody, UserAchievementDto, UserAchievementsBody,
};
use super::{LearningApi, NotificationRecord, UnlockedAchievement};
use crate::error::ApiError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// `LearningApi` over HTTP with reqwest.
///
/// The token goes out both as a bearer token and in `x-auth-token`; the
/// backend's user routes read only the latter.
#[derive(Clone)]
pub struct HttpLearningApi {
    client: Client,
    settings: ClientSettings,
}

impl HttpLearningApi {
    /// Build a client for the given backend.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be constructed.
    pub fn new(settings: ClientSettings) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, settings })
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        let raw = self.settings.endpoint(path);
        Url::parse(&raw).map_err(|e| ApiError::InvalidUrl(format!("{raw}: {e}")))
    }

    fn authed(request: RequestBuilder, token: &str) -> RequestBuilder {
        request.bearer_auth(token).header("x-auth-token", token)
    }

    async fn send(request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await?;
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            status => Err(ApiError::HttpStatus(status)),
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T, ApiError> {
        debug!(path, "GET");
        let request = Self::authed(self.client.get(self.url(path)?), token);
        Self::decode(Self::send(request).await?).await
    }
}

#[async_trait]
impl LearningApi for HttpLearningApi {
    async fn courses(&self) -> Result<Vec<Course>, ApiError> {
        debug!("GET courses");
        let response = Self::send(self.client.get(self.url("/courses")?)).await?;
        let body: CoursesBody = Self::decode(response).await?;
        Ok(body
            .data
            .into_iter()
            .filter_map(CourseDto::into_course)
            .collect())
    }

    async fn course_progress(
        &self,
        token: &str,
        course_id: &CourseId,
    ) -> Result<CourseProgress, ApiError> {
        let request = Self::authed(self.client.get(self.url("/progress")?), token)
            .query(&[("courseId", course_id.as_str())]);
        let body: Option<ProgressDto> = Self::decode(Self::send(request).await?).await?;
        Ok(body.map_or_else(
            || CourseProgress::not_started(course_id.clone()),
            |dto| dto.into_progress(course_id.clone()),
        ))
    }

    async fn progress_stats(&self, token: &str) -> Result<ProgressStats, ApiError> {
        let body: ProgressStatsDto = self.get_json("/progress/stats", token).await?;
        Ok(body.into())
    }

    async fn notifications(&self, token: &str) -> Result<Vec<NotificationRecord>, ApiError> {
        let body: NotificationsBody = self.get_json("/notifications", token).await?;
        Ok(body
            .into_list()
            .into_iter()
            .filter_map(NotificationDto::into_record)
            .collect())
    }

    async fn create_notification(
        &self,
        token: &str,
        notification: &NewNotification,
    ) -> Result<(), ApiError> {
        let request = Self::authed(
            self.client.post(self.url("/notifications/create")?),
            token,
        )
        .json(notification);
        Self::send(request).await?;
        Ok(())
    }

    async fn mark_notification_read(
        &self,
        token: &str,
        id: &NotificationId,
    ) -> Result<(), ApiError> {
        let path = format!("/notifications/{}/read", id.as_str());
        Self::send(Self::authed(self.client.patch(self.url(&path)?), token)).await?;
        Ok(())
    }

    async fn mark_all_notifications_read(&self, token: &str) -> Result<(), ApiError> {
        let url = self.url("/notifications/read-all")?;
        Self::send(Self::authed(self.client.patch(url), token)).await?;
        Ok(())
    }

    async fn delete_notification(&self, token: &str, id: &NotificationId) -> Result<(), ApiError> {
        let path = format!("/notifications/{}", id.as_str());
        Self::send(Self::authed(self.client.delete(self.url(&path)?), token)).await?;
        Ok(())
    }

    async fn check_achievement_progress(&self, token: &str) -> Result<(), ApiError> {
        let url = self.url("/achievements/check-progress")?;
        Self::send(Self::authed(self.client.post(url), token)).await?;
        Ok(())
    }

    async fn unlocked_achievements(
        &self,
        token: &str,
    ) -> Result<Vec<UnlockedAchievement>, ApiError> {
        let body: UserAchievementsBody = self.get_json("/achievements/user", token).await?;
        Ok(body
            .unlocked
            .into_iter()
            .filter_map(UserAchievementDto::into_unlocked)
            .collect())
    }

    async fn certificates(&self, token: &str) -> Result<Vec<Certificate>, ApiError> {
        let body: CertificatesBody = self.get_json("/certificates", token).await?;
        if !body.success {
            return Ok(Vec::new());
        }
        Ok(body
            .certificates
            .into_iter()
            .filter_map(CertificateDto::into_certificate)
            .collect())
    }

    async fn create_certificates_for_completed(&self, token: &str) -> Result<u32, ApiError> {
        let url = self.url("/certificates/create-for-completed")?;
        let response = Self::send(Self::authed(self.client.post(url), token)).await?;
        let body: CreatedCertificatesBody = Self::decode(response).await?;
        Ok(body.count)
    }

    async fn download_certificate(
        &self,
        token: &str,
        course_id: &CourseId,
    ) -> Result<Vec<u8>, ApiError> {
        let path = format!("/certificates/download/{}", course_id.as_str());
        let response = Self::send(Self::authed(self.client.get(self.url(&path)?), token)).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn quiz_scores(&self, token: &str) -> Result<Vec<QuizScore>, ApiError> {
        let body: QuizScoresBody = self.get_json("/quiz-scores/my-scores", token).await?;
        Ok(body.scores.into_iter().map(QuizScore::from).collect())
    }

    async fn quiz_stats(&self, token: &str) -> Result<QuizStats, ApiError> {
        let body: QuizStatsBody = self.get_json("/quiz-scores/stats", token).await?;
        Ok(body.stats.into())
    }

    async fn badge_views(&self, token: &str) -> Result<BadgeViewState, ApiError> {
        let body: BadgeViewsBody = self.get_json("/users/badge-views", token).await?;
        Ok(body.badge_views.unwrap_or_default().into())
    }

    async fn update_badge_views(
        &self,
        token: &str,
        views: &BadgeViewState,
    ) -> Result<(), ApiError> {
        let request = Self::authed(self.client.put(self.url("/users/badge-views")?), token)
            .json(&BadgeViewsDto::from(views));
        Self::send(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cacao_core::model::ClientSettingsDraft;

    #[test]
    fn endpoint_urls_join_the_base() {
        let settings = ClientSettingsDraft {
            api_base_url: Some("https://cacao.example/api/".into()),
            poll_interval_secs: None,
        }
        .validate()
        .unwrap();
        let api = HttpLearningApi::new(settings).unwrap();
        assert_eq!(
            api.url("/users/badge-views").unwrap().as_str(),
            "https://cacao.example/api/users/badge-views"
        );
    }
}
