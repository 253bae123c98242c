use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use cacao_core::achievements::{Achievement, UnlockLatch, evaluate, newly_unlocked};
use cacao_core::model::{AchievementId, LearnerCounters, NewNotification, Session};
use storage::repository::{MarkerKind, MarkerRepository};

use crate::api::LearningApi;
use crate::error::AchievementError;

/// Result of one local evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub achievements: Vec<Achievement>,
    /// Unlocked now but not in the previous evaluation of this session, plus
    /// earlier unlocks whose announcement failed.
    pub newly_unlocked: Vec<Achievement>,
}

impl Evaluation {
    #[must_use]
    pub fn unlocked_count(&self) -> usize {
        self.achievements.iter().filter(|a| a.unlocked).count()
    }
}

/// What the backend reports as unlocked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerAchievements {
    pub unlocked: u32,
    /// Unlocked ids not seen before on this device.
    pub new: u32,
}

/// Local achievement evaluation plus backend achievement sync.
///
/// Holds per-session state (the unlock latch and the previous evaluation), so
/// one instance serves one signed-in learner.
pub struct AchievementService {
    api: Arc<dyn LearningApi>,
    markers: Arc<dyn MarkerRepository>,
    state: Mutex<LatchState>,
}

#[derive(Default)]
struct LatchState {
    latch: UnlockLatch,
    previous: Vec<Achievement>,
    /// Unlocked in this session but not announced yet.
    unannounced: Vec<Achievement>,
}

impl AchievementService {
    #[must_use]
    pub fn new(api: Arc<dyn LearningApi>, markers: Arc<dyn MarkerRepository>) -> Self {
        Self {
            api,
            markers,
            state: Mutex::new(LatchState::default()),
        }
    }

    /// Evaluate the catalogue against `counters` and diff with the previous run.
    pub fn evaluate(&self, counters: &LearnerCounters) -> Evaluation {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let achievements = state.latch.apply(evaluate(counters));
        let mut fresh = newly_unlocked(&state.previous, &achievements)
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();
        for retry in std::mem::take(&mut state.unannounced) {
            if !fresh.iter().any(|a| a.id == retry.id) {
                fresh.push(retry);
            }
        }
        state.previous.clone_from(&achievements);
        Evaluation {
            achievements,
            newly_unlocked: fresh,
        }
    }

    /// Forget the session latch (sign-out).
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = LatchState::default();
    }

    /// Send one "Achievement Unlocked!" notification per achievement not yet
    /// announced for this user. Returns the ids that were announced.
    ///
    /// A failed notification is logged and the achievement is handed back by
    /// the next [`AchievementService::evaluate`] for another attempt.
    ///
    /// # Errors
    ///
    /// Returns `AchievementError::Storage` if the seen markers cannot be read
    /// or written.
    pub async fn announce(
        &self,
        session: &Session,
        unlocked: &[Achievement],
    ) -> Result<Vec<AchievementId>, AchievementError> {
        let Some(token) = session.auth_token() else {
            return Ok(Vec::new());
        };
        if unlocked.is_empty() {
            return Ok(Vec::new());
        }

        let user = session.user_key();
        let seen = match self.markers.seen(&user, MarkerKind::LocalAchievement).await {
            Ok(seen) => seen,
            Err(err) => {
                self.retry_later(unlocked);
                return Err(err.into());
            }
        };
        let mut announced = Vec::new();
        let mut failed = Vec::new();
        for achievement in unlocked.iter().filter(|a| !seen.contains(a.id.as_str())) {
            let notification = NewNotification::achievement_unlocked(&achievement.title);
            match self.api.create_notification(token, &notification).await {
                Ok(()) => {
                    info!(achievement = %achievement.id, "achievement unlocked");
                    announced.push(achievement.id.clone());
                }
                Err(err) => {
                    warn!(achievement = %achievement.id, error = %err, "failed to create achievement notification");
                    failed.push(achievement.clone());
                }
            }
        }
        self.retry_later(&failed);

        let ids: Vec<String> = announced.iter().map(|id| id.as_str().to_string()).collect();
        self.markers
            .mark_seen(&user, MarkerKind::LocalAchievement, &ids)
            .await?;
        Ok(announced)
    }

    fn retry_later(&self, achievements: &[Achievement]) {
        if achievements.is_empty() {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        for achievement in achievements {
            if !state.unannounced.iter().any(|a| a.id == achievement.id) {
                state.unannounced.push(achievement.clone());
            }
        }
    }

    /// Ask the backend to re-check progress, then read its unlocked list.
    ///
    /// The check is best effort; only the list request can fail this call.
    ///
    /// # Errors
    ///
    /// Returns `AchievementError::Api` if the unlocked list cannot be fetched,
    /// or `AchievementError::Storage` if the seen markers fail.
    pub async fn sync_server(&self, session: &Session) -> Result<ServerAchievements, AchievementError> {
        let Some(token) = session.auth_token() else {
            return Ok(ServerAchievements::default());
        };

        if let Err(err) = self.api.check_achievement_progress(token).await {
            debug!(error = %err, "achievement check-progress failed");
        }

        let unlocked = self.api.unlocked_achievements(token).await?;
        let user = session.user_key();
        let seen = self.markers.seen(&user, MarkerKind::ServerAchievement).await?;
        let new_ids: Vec<String> = unlocked
            .iter()
            .map(|a| a.id.as_str().to_string())
            .filter(|id| !seen.contains(id))
            .collect();
        self.markers
            .mark_seen(&user, MarkerKind::ServerAchievement, &new_ids)
            .await?;

        Ok(ServerAchievements {
            unlocked: u32::try_from(unlocked.len()).unwrap_or(u32::MAX),
            new: u32::try_from(new_ids.len()).unwrap_or(u32::MAX),
        })
    }
}
