#![forbid(unsafe_code)]

pub mod achievement_service;
pub mod api;
pub mod app_services;
pub mod badge_service;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod events;
pub mod notification_service;
pub mod progress_service;
pub mod records_service;

pub use cacao_core::Clock;

pub use achievement_service::{AchievementService, Evaluation, ServerAchievements};
pub use api::{HttpLearningApi, LearningApi, NotificationRecord, UnlockedAchievement};
pub use app_services::AppServices;
pub use badge_service::BadgeScheduler;
pub use config::{AppConfig, AppConfigDraft, ConfigError, DashboardConfig};
pub use dashboard::{CourseSummary, Dashboard, DashboardSnapshot, PollHandle};
pub use error::{
    AchievementError, ApiError, AppServicesError, DashboardError, NotificationError,
    ProgressError, RecordsError,
};
pub use events::{DashboardEvent, EventBus};
pub use notification_service::{NotificationService, Refresh};
pub use progress_service::{AggregatedProgress, ProgressService};
pub use records_service::RecordsService;
