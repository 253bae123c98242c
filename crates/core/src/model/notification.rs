use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::NotificationId;

/// Literal produced by a known upstream bug when a template value was missing.
pub const CORRUPTION_MARKER: &str = "undefined";

/// Icon used when the backend record has none.
pub const DEFAULT_ICON: &str = "bell";

/// Notification categories emitted by the backend, plus the client-created kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CourseCompletion,
    QuizPassed,
    AchievementUnlocked,
    CertificateEarned,
    NewCourse,
    Reminder,
    System,
    /// Created by the client when a locally evaluated achievement unlocks.
    Achievement,
    #[serde(untagged)]
    Other(String),
}

impl NotificationKind {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "course_completion" => Self::CourseCompletion,
            "quiz_passed" => Self::QuizPassed,
            "achievement_unlocked" => Self::AchievementUnlocked,
            "certificate_earned" => Self::CertificateEarned,
            "new_course" => Self::NewCourse,
            "reminder" => Self::Reminder,
            "system" => Self::System,
            "achievement" => Self::Achievement,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::CourseCompletion => "course_completion",
            Self::QuizPassed => "quiz_passed",
            Self::AchievementUnlocked => "achievement_unlocked",
            Self::CertificateEarned => "certificate_earned",
            Self::NewCourse => "new_course",
            Self::Reminder => "reminder",
            Self::System => "system",
            Self::Achievement => "achievement",
            Self::Other(raw) => raw,
        }
    }
}

/// A notification as held in the client feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub created_at: Option<DateTime<Utc>>,
    /// Relative label (`5 minutes ago`) computed when the feed was refreshed.
    pub time: String,
    pub read: bool,
    pub icon: String,
    pub action_url: Option<String>,
    pub action_text: Option<String>,
}

impl Notification {
    /// Returns true if the title or message carries the upstream corruption marker.
    #[must_use]
    pub fn is_corrupted(&self) -> bool {
        self.title.contains(CORRUPTION_MARKER) || self.message.contains(CORRUPTION_MARKER)
    }
}

/// Drop corrupted records, keeping order.
#[must_use]
pub fn retain_clean(notifications: Vec<Notification>) -> Vec<Notification> {
    notifications
        .into_iter()
        .filter(|n| !n.is_corrupted())
        .collect()
}

/// Number of unread notifications; drives the notifications badge.
#[must_use]
pub fn unread_count(notifications: &[Notification]) -> usize {
    notifications.iter().filter(|n| !n.read).count()
}

/// Payload for creating a notification on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewNotification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub icon: String,
}

impl NewNotification {
    /// The notification sent once when a local achievement unlocks.
    #[must_use]
    pub fn achievement_unlocked(achievement_title: &str) -> Self {
        Self {
            kind: NotificationKind::Achievement,
            title: "Achievement Unlocked!".to_string(),
            message: format!(
                "Congratulations! You've unlocked the \"{achievement_title}\" achievement."
            ),
            icon: "award".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(id: &str, title: &str, message: &str, read: bool) -> Notification {
        Notification {
            id: NotificationId::new(id),
            kind: NotificationKind::System,
            title: title.to_string(),
            message: message.to_string(),
            created_at: None,
            time: "Just now".to_string(),
            read,
            icon: DEFAULT_ICON.to_string(),
            action_url: None,
            action_text: None,
        }
    }

    #[test]
    fn corrupted_records_are_dropped() {
        let list = vec![
            notification("1", "Course Completed!", "You finished GAP", false),
            notification("2", "undefined", "ok", false),
            notification("3", "Certificate", "Your certificate for undefined", true),
            notification("4", "Reminder", "Keep going", true),
        ];

        let cleaned = retain_clean(list);
        let ids: Vec<_> = cleaned.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "4"]);
    }

    #[test]
    fn unread_count_ignores_read() {
        let list = vec![
            notification("1", "a", "b", false),
            notification("2", "a", "b", true),
            notification("3", "a", "b", false),
        ];
        assert_eq!(unread_count(&list), 2);
    }

    #[test]
    fn kind_parse_round_trips_known_and_unknown() {
        assert_eq!(
            NotificationKind::parse("achievement_unlocked"),
            NotificationKind::AchievementUnlocked
        );
        let other = NotificationKind::parse("promo");
        assert_eq!(other, NotificationKind::Other("promo".into()));
        assert_eq!(other.as_str(), "promo");
    }

    #[test]
    fn achievement_payload_matches_backend_shape() {
        let payload = NewNotification::achievement_unlocked("First Steps");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "achievement");
        assert_eq!(json["icon"], "award");
        assert_eq!(
            json["message"],
            "Congratulations! You've unlocked the \"First Steps\" achievement."
        );
    }
}
