//! JSON shapes returned by the backend and their conversion into domain types.
//!
//! The backend is loose about field names (`_id` vs `id`, `isRead` vs `read`)
//! and wrappers, so every field here is optional and defaults are applied
//! while converting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cacao_core::model::{
    AchievementId, BadgeViewState, Certificate, Course, CourseId, CourseProgress,
    DEFAULT_CERTIFICATE_SCORE, Lesson, LessonId, NotificationId, NotificationKind, ProgressStats,
    QuizScore, QuizStats,
};

use super::{NotificationRecord, UnlockedAchievement};

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn pick_id(id: Option<String>, mongo_id: Option<String>) -> Option<String> {
    id.or(mongo_id)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

//
// ─── COURSES ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
pub(crate) struct CoursesBody {
    #[serde(default)]
    pub data: Vec<CourseDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CourseDto {
    id: Option<String>,
    #[serde(rename = "_id")]
    mongo_id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    lessons: Vec<LessonDto>,
    progress: Option<f64>,
    category: Option<String>,
    image: Option<String>,
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LessonDto {
    id: Option<String>,
    #[serde(rename = "_id")]
    mongo_id: Option<String>,
    title: Option<String>,
    order: Option<u32>,
}

impl CourseDto {
    /// `None` when the record has no usable id.
    pub fn into_course(self) -> Option<Course> {
        let id = pick_id(self.id, self.mongo_id)?;
        let lessons = self
            .lessons
            .into_iter()
            .enumerate()
            .filter_map(|(idx, lesson)| {
                let order = lesson
                    .order
                    .unwrap_or_else(|| u32::try_from(idx + 1).unwrap_or(u32::MAX));
                let lesson_id = pick_id(lesson.id, lesson.mongo_id)?;
                Some(Lesson::new(
                    LessonId::new(lesson_id),
                    lesson.title.unwrap_or_default(),
                    order,
                ))
            })
            .collect();

        let title = self.title.unwrap_or_else(|| id.clone());
        Some(
            Course::new(CourseId::new(id), title, lessons)
                .with_catalog_progress(self.progress.unwrap_or(0.0))
                .with_category(self.category)
                .with_image(self.image)
                .with_created_at(parse_timestamp(self.created_at.as_deref())),
        )
    }
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProgressDto {
    #[serde(default)]
    completed_lessons: Vec<CompletedLessonDto>,
    overall_progress: Option<f64>,
    progress: Option<f64>,
}

/// `completedLessons` holds either bare ids or `{lessonId, completedAt, timeSpent}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CompletedLessonDto {
    Id(String),
    Entry {
        #[serde(rename = "lessonId")]
        lesson_id: String,
    },
}

impl ProgressDto {
    pub fn into_progress(self, course_id: CourseId) -> CourseProgress {
        let lessons = self
            .completed_lessons
            .into_iter()
            .map(|entry| match entry {
                CompletedLessonDto::Id(id) | CompletedLessonDto::Entry { lesson_id: id } => {
                    LessonId::new(id)
                }
            })
            .collect();
        let overall = self.overall_progress.or(self.progress).unwrap_or(0.0);
        CourseProgress::new(course_id, overall, lessons)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ProgressStatsDto {
    total_score: Option<f64>,
    average_score: Option<f64>,
    total_time_spent: Option<f64>,
    average_progress: Option<f64>,
}

impl From<ProgressStatsDto> for ProgressStats {
    fn from(dto: ProgressStatsDto) -> Self {
        Self {
            total_score: dto.total_score.unwrap_or(0.0),
            average_score: dto.average_score.unwrap_or(0.0),
            total_time_spent: dto.total_time_spent.unwrap_or(0.0),
            average_progress: dto.average_progress.unwrap_or(0.0),
        }
    }
}

//
// ─── NOTIFICATIONS ─────────────────────────────────────────────────────────────
//

/// The list arrives as `{notifications}`, `{data: {notifications}}`,
/// `{data: [...]}` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum NotificationsBody {
    Wrapped { notifications: Vec<NotificationDto> },
    Data { data: NotificationsData },
    Bare(Vec<NotificationDto>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum NotificationsData {
    Wrapped { notifications: Vec<NotificationDto> },
    List(Vec<NotificationDto>),
}

impl NotificationsBody {
    pub fn into_list(self) -> Vec<NotificationDto> {
        match self {
            Self::Wrapped { notifications }
            | Self::Data {
                data: NotificationsData::Wrapped { notifications },
            }
            | Self::Data {
                data: NotificationsData::List(notifications),
            }
            | Self::Bare(notifications) => notifications,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NotificationDto {
    id: Option<String>,
    #[serde(rename = "_id")]
    mongo_id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<String>,
    message: Option<String>,
    created_at: Option<String>,
    is_read: Option<bool>,
    read: Option<bool>,
    icon: Option<String>,
    action_url: Option<String>,
    action_text: Option<String>,
}

impl NotificationDto {
    pub fn into_record(self) -> Option<NotificationRecord> {
        let id = pick_id(self.id, self.mongo_id)?;
        Some(NotificationRecord {
            id: NotificationId::new(id),
            kind: NotificationKind::parse(self.kind.as_deref().unwrap_or("system")),
            title: self.title.unwrap_or_default(),
            message: self.message.unwrap_or_default(),
            created_at: parse_timestamp(self.created_at.as_deref()),
            read: self.is_read.unwrap_or(false) || self.read.unwrap_or(false),
            icon: self.icon.filter(|icon| !icon.is_empty()),
            action_url: self.action_url,
            action_text: self.action_text,
        })
    }
}

//
// ─── ACHIEVEMENTS ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
pub(crate) struct UserAchievementsBody {
    #[serde(default)]
    pub unlocked: Vec<UserAchievementDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserAchievementDto {
    #[serde(rename = "achievementId")]
    achievement: Option<AchievementRefDto>,
}

/// `achievementId` is populated with the achievement document, or left as a
/// raw id when the populate step found nothing.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AchievementRefDto {
    Populated {
        #[serde(rename = "_id")]
        id: String,
        name: Option<String>,
    },
    Raw(String),
}

impl UserAchievementDto {
    pub fn into_unlocked(self) -> Option<UnlockedAchievement> {
        match self.achievement? {
            AchievementRefDto::Populated { id, name } => Some(UnlockedAchievement {
                id: AchievementId::new(id),
                name,
            }),
            AchievementRefDto::Raw(id) => Some(UnlockedAchievement {
                id: AchievementId::new(id),
                name: None,
            }),
        }
    }
}

//
// ─── CERTIFICATES & QUIZZES ────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
pub(crate) struct CertificatesBody {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub certificates: Vec<CertificateDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CertificateDto {
    id: Option<String>,
    #[serde(rename = "_id")]
    mongo_id: Option<String>,
    course_id: Option<String>,
    title: Option<String>,
    course_title: Option<String>,
    description: Option<String>,
    category: Option<String>,
    score: Option<f64>,
    final_score: Option<f64>,
    verification_code: Option<String>,
    certificate_id: Option<String>,
    issue_date: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl CertificateDto {
    pub fn into_certificate(self) -> Option<Certificate> {
        let id = pick_id(self.id, self.mongo_id)?;
        let course_title = non_empty(self.course_title);
        let title = non_empty(self.title)
            .or_else(|| course_title.clone())
            .unwrap_or_else(|| "Course Certificate".to_string());
        let description = non_empty(self.description).unwrap_or_else(|| {
            format!(
                "Successfully completed {}",
                course_title.as_deref().unwrap_or("the course")
            )
        });
        let score = self
            .score
            .filter(|s| *s > 0.0)
            .or(self.final_score.filter(|s| *s > 0.0))
            .unwrap_or(DEFAULT_CERTIFICATE_SCORE);

        Some(Certificate {
            id,
            course_id: CourseId::new(self.course_id.unwrap_or_default()),
            title,
            description,
            category: non_empty(self.category).unwrap_or_else(|| "beginner".to_string()),
            score,
            verification_code: non_empty(self.verification_code)
                .or_else(|| non_empty(self.certificate_id)),
            issue_date: parse_timestamp(self.issue_date.as_deref()),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedCertificatesBody {
    #[serde(default)]
    pub count: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuizScoresBody {
    #[serde(default)]
    pub scores: Vec<QuizScoreDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuizScoreDto {
    quiz_id: Option<String>,
    quiz_name: Option<String>,
    score: Option<f64>,
    total_questions: Option<u32>,
    correct_answers: Option<u32>,
    completed_at: Option<String>,
}

impl From<QuizScoreDto> for QuizScore {
    fn from(dto: QuizScoreDto) -> Self {
        Self {
            quiz_id: dto.quiz_id.unwrap_or_default(),
            quiz_name: dto.quiz_name.unwrap_or_default(),
            score: dto.score.unwrap_or(0.0),
            total_questions: dto.total_questions.unwrap_or(0),
            correct_answers: dto.correct_answers.unwrap_or(0),
            completed_at: parse_timestamp(dto.completed_at.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuizStatsBody {
    #[serde(default)]
    pub stats: QuizStatsDto,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct QuizStatsDto {
    #[serde(alias = "totalQuizzesTaken")]
    total_quizzes: Option<u32>,
    average_score: Option<f64>,
    best_score: Option<f64>,
    total_attempts: Option<u32>,
}

impl From<QuizStatsDto> for QuizStats {
    fn from(dto: QuizStatsDto) -> Self {
        Self {
            total_quizzes_taken: dto.total_quizzes.unwrap_or(0),
            average_score: dto.average_score.unwrap_or(0.0),
            best_score: dto.best_score.unwrap_or(0.0),
            total_attempts: dto.total_attempts.unwrap_or(0),
        }
    }
}

//
// ─── BADGE VIEWS ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BadgeViewsBody {
    #[serde(default)]
    pub badge_views: Option<BadgeViewsDto>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct BadgeViewsDto {
    last_achievement_count: u32,
    last_quiz_score_count: u32,
    last_certificate_count: u32,
    last_notification_count: u32,
}

impl From<BadgeViewsDto> for BadgeViewState {
    fn from(dto: BadgeViewsDto) -> Self {
        Self {
            last_achievement_count: dto.last_achievement_count,
            last_quiz_score_count: dto.last_quiz_score_count,
            last_certificate_count: dto.last_certificate_count,
            last_notification_count: dto.last_notification_count,
        }
    }
}

impl From<&BadgeViewState> for BadgeViewsDto {
    fn from(views: &BadgeViewState) -> Self {
        Self {
            last_achievement_count: views.last_achievement_count,
            last_quiz_score_count: views.last_quiz_score_count,
            last_certificate_count: views.last_certificate_count,
            last_notification_count: views.last_notification_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_catalog_decodes_with_lessons() {
        let body: CoursesBody = serde_json::from_str(
            r#"{"data":[
                {"id":"cacao-basics","title":"Cacao Basics","progress":40,
                 "lessons":[{"id":"cb-1","title":"Intro","order":1},{"id":"cb-2","title":"Soil"}]},
                {"title":"no id"}
            ]}"#,
        )
        .unwrap();
        let courses: Vec<_> = body.data.into_iter().filter_map(CourseDto::into_course).collect();
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].id().as_str(), "cacao-basics");
        assert_eq!(courses[0].total_lessons(), 2);
        assert_eq!(courses[0].lessons()[1].order, 2);
        assert!((courses[0].catalog_progress() - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn completed_lessons_accept_ids_and_entries() {
        let dto: ProgressDto = serde_json::from_str(
            r#"{"courseId":"c1","overallProgress":50,
                "completedLessons":["l1",{"lessonId":"l2","completedAt":"2024-01-01T00:00:00Z","timeSpent":30}]}"#,
        )
        .unwrap();
        let progress = dto.into_progress(CourseId::new("c1"));
        assert_eq!(
            progress.completed_lessons(),
            &[LessonId::new("l1"), LessonId::new("l2")]
        );
        assert!((progress.overall_progress() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn notification_wrappers_all_decode() {
        let item = r#"{"_id":"n1","type":"course_completion","title":"Done","message":"m","isRead":true,"createdAt":"2023-11-14T22:00:00.000Z"}"#;
        for raw in [
            format!(r#"{{"notifications":[{item}]}}"#),
            format!(r#"{{"data":{{"notifications":[{item}]}}}}"#),
            format!(r#"{{"data":[{item}]}}"#),
            format!("[{item}]"),
        ] {
            let body: NotificationsBody = serde_json::from_str(&raw).unwrap();
            let records: Vec<_> = body
                .into_list()
                .into_iter()
                .filter_map(NotificationDto::into_record)
                .collect();
            assert_eq!(records.len(), 1, "{raw}");
            assert_eq!(records[0].id.as_str(), "n1");
            assert!(records[0].read);
            assert!(records[0].created_at.is_some());
            assert_eq!(records[0].kind, NotificationKind::CourseCompletion);
        }
    }

    #[test]
    fn unlocked_achievements_skip_missing_refs() {
        let body: UserAchievementsBody = serde_json::from_str(
            r#"{"unlocked":[
                {"achievementId":{"_id":"a1","name":"First Steps"}},
                {"achievementId":null},
                {"achievementId":"a3"}
            ],"totalUnlocked":3}"#,
        )
        .unwrap();
        let ids: Vec<_> = body
            .unlocked
            .into_iter()
            .filter_map(UserAchievementDto::into_unlocked)
            .map(|a| a.id.as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["a1", "a3"]);
    }

    #[test]
    fn certificate_defaults_fill_gaps() {
        let body: CertificatesBody = serde_json::from_str(
            r#"{"success":true,"certificates":[
                {"id":"cert-1","courseId":"c1","courseTitle":"Cacao Basics","certificateId":"AGRI-42","score":0}
            ]}"#,
        )
        .unwrap();
        let cert = body
            .certificates
            .into_iter()
            .find_map(CertificateDto::into_certificate)
            .unwrap();
        assert_eq!(cert.title, "Cacao Basics");
        assert_eq!(cert.description, "Successfully completed Cacao Basics");
        assert_eq!(cert.category, "beginner");
        assert!((cert.score - DEFAULT_CERTIFICATE_SCORE).abs() < f64::EPSILON);
        assert_eq!(cert.verification_code.as_deref(), Some("AGRI-42"));
    }

    #[test]
    fn badge_views_default_to_zero() {
        let body: BadgeViewsBody =
            serde_json::from_str(r#"{"success":true,"badgeViews":{"lastQuizScoreCount":3}}"#)
                .unwrap();
        let views = BadgeViewState::from(body.badge_views.unwrap_or_default());
        assert_eq!(views.last_quiz_score_count, 3);
        assert_eq!(views.last_achievement_count, 0);

        let encoded = serde_json::to_value(BadgeViewsDto::from(&views)).unwrap();
        assert_eq!(encoded["lastQuizScoreCount"], 3);
    }
}
