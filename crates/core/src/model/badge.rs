use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Last-viewed counts per badge category, owned by the backend (one per user).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BadgeViewState {
    pub last_achievement_count: u32,
    pub last_quiz_score_count: u32,
    pub last_certificate_count: u32,
    pub last_notification_count: u32,
}

/// Dashboard tabs. Only some of them own a badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardTab {
    #[default]
    Dashboard,
    Statistics,
    Scores,
    Notifications,
    Certificates,
    Achievements,
    Profile,
    Settings,
}

impl DashboardTab {
    pub const ALL: [DashboardTab; 8] = [
        DashboardTab::Dashboard,
        DashboardTab::Statistics,
        DashboardTab::Scores,
        DashboardTab::Notifications,
        DashboardTab::Certificates,
        DashboardTab::Achievements,
        DashboardTab::Profile,
        DashboardTab::Settings,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Statistics => "statistics",
            Self::Scores => "scores",
            Self::Notifications => "notifications",
            Self::Certificates => "certificates",
            Self::Achievements => "achievements",
            Self::Profile => "profile",
            Self::Settings => "settings",
        }
    }
}

impl fmt::Display for DashboardTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown dashboard tab: {0}")]
pub struct UnknownTab(pub String);

impl FromStr for DashboardTab {
    type Err = UnknownTab;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tab| tab.as_str() == s)
            .ok_or_else(|| UnknownTab(s.to_string()))
    }
}

/// Badge categories and the tab each one belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeCategory {
    QuizScores,
    Achievements,
    Certificates,
    Statistics,
}

impl BadgeCategory {
    pub const ALL: [BadgeCategory; 4] = [
        BadgeCategory::QuizScores,
        BadgeCategory::Achievements,
        BadgeCategory::Certificates,
        BadgeCategory::Statistics,
    ];

    #[must_use]
    pub fn tab(self) -> DashboardTab {
        match self {
            Self::QuizScores => DashboardTab::Scores,
            Self::Achievements => DashboardTab::Achievements,
            Self::Certificates => DashboardTab::Certificates,
            Self::Statistics => DashboardTab::Statistics,
        }
    }

    /// How long the owning tab must stay active before the count is marked viewed.
    #[must_use]
    pub fn dwell(self) -> Duration {
        match self {
            Self::Statistics => Duration::from_secs(5),
            Self::QuizScores | Self::Achievements | Self::Certificates => Duration::from_secs(2),
        }
    }

    /// Statistics has no counter of its own; it tracks new achievements.
    #[must_use]
    pub fn last_viewed(self, views: &BadgeViewState) -> u32 {
        match self {
            Self::QuizScores => views.last_quiz_score_count,
            Self::Achievements | Self::Statistics => views.last_achievement_count,
            Self::Certificates => views.last_certificate_count,
        }
    }

    pub fn mark_viewed(self, views: &mut BadgeViewState, count: u32) {
        match self {
            Self::QuizScores => views.last_quiz_score_count = count,
            Self::Achievements | Self::Statistics => views.last_achievement_count = count,
            Self::Certificates => views.last_certificate_count = count,
        }
    }

    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::QuizScores => 0,
            Self::Achievements => 1,
            Self::Certificates => 2,
            Self::Statistics => 3,
        }
    }
}

impl fmt::Display for BadgeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::QuizScores => "quiz_scores",
            Self::Achievements => "achievements",
            Self::Certificates => "certificates",
            Self::Statistics => "statistics",
        };
        f.write_str(name)
    }
}

/// Current item counts the badges compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BadgeCounts {
    pub quiz_scores: u32,
    pub achievements: u32,
    pub certificates: u32,
}

impl BadgeCounts {
    #[must_use]
    pub fn for_category(&self, category: BadgeCategory) -> u32 {
        match category {
            BadgeCategory::QuizScores => self.quiz_scores,
            BadgeCategory::Achievements | BadgeCategory::Statistics => self.achievements,
            BadgeCategory::Certificates => self.certificates,
        }
    }
}
