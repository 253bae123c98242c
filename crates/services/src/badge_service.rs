use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use cacao_core::badges::{BadgeBoard, BadgeEffect};
use cacao_core::model::{BadgeCategory, BadgeCounts, BadgeViewState, DashboardTab, Session};

use crate::api::LearningApi;
use crate::events::{DashboardEvent, EventBus};

/// Drives a `BadgeBoard` with real timers and persists viewed counts.
///
/// Cloning shares the board. Dwell timers are tokio tasks; dropping the last
/// clone does not cancel them, call [`BadgeScheduler::shutdown`] for that.
#[derive(Clone)]
pub struct BadgeScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn LearningApi>,
    token: Option<String>,
    events: EventBus,
    board: Mutex<BadgeBoard>,
    timers: Mutex<HashMap<BadgeCategory, (u64, JoinHandle<()>)>>,
}

impl BadgeScheduler {
    #[must_use]
    pub fn new(api: Arc<dyn LearningApi>, session: &Session, events: EventBus) -> Self {
        let token = session.auth_token().map(ToString::to_string);
        Self {
            inner: Arc::new(Inner {
                api,
                token,
                events,
                board: Mutex::new(BadgeBoard::new()),
                timers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Load the last-viewed counts from the backend.
    ///
    /// Guests and failed requests get an all-zero baseline; either way the
    /// board counts as loaded afterwards.
    pub async fn load_baseline(&self) {
        let views = match self.inner.token.as_deref() {
            None => BadgeViewState::default(),
            Some(token) => match self.inner.api.badge_views(token).await {
                Ok(views) => views,
                Err(err) => {
                    warn!(error = %err, "badge views unavailable, starting from zero");
                    BadgeViewState::default()
                }
            },
        };
        self.update(|board| board.load_baseline(views));
    }

    pub fn set_counts(&self, counts: BadgeCounts) {
        self.update(|board| board.set_counts(counts));
    }

    pub fn activate(&self, tab: DashboardTab) {
        self.update(|board| board.activate(tab));
    }

    #[must_use]
    pub fn visible(&self) -> Vec<BadgeCategory> {
        self.inner.lock_board().visible()
    }

    #[must_use]
    pub fn is_visible(&self, category: BadgeCategory) -> bool {
        self.inner.lock_board().is_visible(category)
    }

    #[must_use]
    pub fn baseline(&self) -> Option<BadgeViewState> {
        self.inner.lock_board().baseline().copied()
    }

    #[must_use]
    pub fn active_tab(&self) -> DashboardTab {
        self.inner.lock_board().active_tab()
    }

    /// Abort every pending dwell timer.
    pub fn shutdown(&self) {
        let mut timers = self.inner.lock_timers();
        for (_, (_, handle)) in timers.drain() {
            handle.abort();
        }
    }

    fn update(&self, step: impl FnOnce(&mut BadgeBoard) -> Vec<BadgeEffect>) {
        self.inner.update(step);
    }
}

impl Inner {
    fn lock_board(&self) -> std::sync::MutexGuard<'_, BadgeBoard> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_timers(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<BadgeCategory, (u64, JoinHandle<()>)>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `step` on the board, start or cancel the timers it asks for and
    /// publish `BadgesChanged` when the visible set moved.
    fn update(self: &Arc<Self>, step: impl FnOnce(&mut BadgeBoard) -> Vec<BadgeEffect>) {
        let (effects, before, after) = {
            let mut board = self.lock_board();
            let before = board.visible();
            let effects = step(&mut board);
            (effects, before, board.visible())
        };
        self.apply(effects);
        if before != after {
            self.events
                .publish(DashboardEvent::BadgesChanged { visible: after });
        }
    }

    fn apply(self: &Arc<Self>, effects: Vec<BadgeEffect>) {
        for effect in effects {
            match effect {
                BadgeEffect::StartDwell {
                    category,
                    delay,
                    generation,
                } => {
                    debug!(%category, ?delay, generation, "dwell started");
                    let inner = Arc::clone(self);
                    let handle = tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        inner.dwell_elapsed(category, generation).await;
                    });
                    if let Some((_, old)) = self.lock_timers().insert(category, (generation, handle)) {
                        old.abort();
                    }
                }
                BadgeEffect::CancelDwell { category } => {
                    debug!(%category, "dwell cancelled");
                    if let Some((_, handle)) = self.lock_timers().remove(&category) {
                        handle.abort();
                    }
                }
            }
        }
    }

    async fn dwell_elapsed(self: &Arc<Self>, category: BadgeCategory, generation: u64) {
        {
            let mut timers = self.lock_timers();
            if timers.get(&category).is_some_and(|(g, _)| *g == generation) {
                timers.remove(&category);
            }
        }

        let (previous, updated, visible) = {
            let mut board = self.lock_board();
            let previous = board.baseline().map(|views| category.last_viewed(views));
            let updated = board.dwell_elapsed(category, generation);
            (previous, updated, board.visible())
        };
        let (Some(previous), Some(updated)) = (previous, updated) else {
            return;
        };
        self.events
            .publish(DashboardEvent::BadgesChanged { visible });

        if let Some(token) = self.token.as_deref() {
            if let Err(err) = self.api.update_badge_views(token, &updated).await {
                warn!(%category, error = %err, "failed to save badge views");
                self.update(|board| board.restore_viewed(category, previous));
                return;
            }
        }
        info!(%category, viewed = category.last_viewed(&updated), "badge marked viewed");
    }
}
