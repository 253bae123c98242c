//! Dashboard events.
//!
//! Components publish here instead of calling each other; the binary (or a UI)
//! subscribes and renders toasts.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use cacao_core::model::{AchievementId, BadgeCategory, CourseId, NotificationId};

pub const DEFAULT_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DashboardEvent {
    CourseCompleted {
        course_id: CourseId,
        title: String,
    },
    AchievementUnlocked {
        id: AchievementId,
        title: String,
    },
    /// An unread notification that was not in the previous fetch.
    NotificationArrived {
        id: NotificationId,
        title: String,
        message: String,
    },
    NotificationsRefreshed {
        total: usize,
        unread: usize,
    },
    BadgesChanged {
        visible: Vec<BadgeCategory>,
    },
    /// The backend rejected the token; the learner has to sign in again.
    SessionExpired,
}

/// Fan-out channel for `DashboardEvent`s. Cloning shares the channel.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<DashboardEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.sender.subscribe()
    }

    /// Publish to current subscribers. Events with no subscriber are dropped.
    pub fn publish(&self, event: DashboardEvent) {
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            debug!(?event, "no event subscribers");
        }
    }
}
