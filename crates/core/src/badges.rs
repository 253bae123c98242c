//! Badge visibility for the dashboard tabs.
//!
//! [`BadgeBoard`] is a pure state machine: it owns the last-viewed baseline,
//! the latest counts and the active tab, and answers with [`BadgeEffect`]s the
//! caller turns into timers. Nothing here sleeps or talks to the network.

use std::time::Duration;

use crate::model::{BadgeCategory, BadgeCounts, BadgeViewState, DashboardTab};

/// Per-category phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BadgePhase {
    #[default]
    Hidden,
    Visible,
    /// The owning tab is active and a dwell timer is running.
    Dwelling,
}

/// Timer work requested by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeEffect {
    StartDwell {
        category: BadgeCategory,
        delay: Duration,
        generation: u64,
    },
    CancelDwell {
        category: BadgeCategory,
    },
}

#[derive(Debug, Clone)]
pub struct BadgeBoard {
    baseline: Option<BadgeViewState>,
    counts: BadgeCounts,
    active_tab: DashboardTab,
    phases: [BadgePhase; 4],
    generations: [u64; 4],
}

impl Default for BadgeBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl BadgeBoard {
    #[must_use]
    pub fn new() -> Self {
        Self {
            baseline: None,
            counts: BadgeCounts::default(),
            active_tab: DashboardTab::default(),
            phases: [BadgePhase::Hidden; 4],
            generations: [0; 4],
        }
    }

    /// Install the last-viewed counts. Until this happens every badge stays hidden.
    pub fn load_baseline(&mut self, views: BadgeViewState) -> Vec<BadgeEffect> {
        self.baseline = Some(views);
        self.reconcile_all()
    }

    pub fn set_counts(&mut self, counts: BadgeCounts) -> Vec<BadgeEffect> {
        self.counts = counts;
        self.reconcile_all()
    }

    pub fn activate(&mut self, tab: DashboardTab) -> Vec<BadgeEffect> {
        self.active_tab = tab;
        self.reconcile_all()
    }

    /// A dwell timer fired.
    ///
    /// Stale timers (superseded generation, or the tab was left) are ignored.
    /// Otherwise the current count becomes the viewed count and the updated
    /// baseline is returned for persisting.
    pub fn dwell_elapsed(
        &mut self,
        category: BadgeCategory,
        generation: u64,
    ) -> Option<BadgeViewState> {
        let idx = category.index();
        if self.phases[idx] != BadgePhase::Dwelling
            || self.generations[idx] != generation
            || self.active_tab != category.tab()
        {
            return None;
        }
        let baseline = self.baseline.as_mut()?;
        category.mark_viewed(baseline, self.counts.for_category(category));
        let updated = *baseline;

        self.phases[idx] = BadgePhase::Hidden;
        // Achievements and statistics share a counter; the sibling settles too.
        for other in BadgeCategory::ALL {
            if other != category && self.phases[other.index()] == BadgePhase::Visible {
                self.reconcile(other);
            }
        }
        Some(updated)
    }

    /// Put back a viewed count after the backend rejected the update.
    ///
    /// The badge stays hidden while the tab is active and comes back once the
    /// learner leaves it. The next count refresh on the tab starts a new dwell.
    /// Siblings sharing the counter are settled against the restored baseline.
    pub fn restore_viewed(&mut self, category: BadgeCategory, previous: u32) -> Vec<BadgeEffect> {
        let Some(baseline) = self.baseline.as_mut() else {
            return Vec::new();
        };
        category.mark_viewed(baseline, previous);
        BadgeCategory::ALL
            .into_iter()
            .filter(|other| *other != category)
            .filter_map(|other| self.reconcile(other))
            .collect()
    }

    #[must_use]
    pub fn baseline(&self) -> Option<&BadgeViewState> {
        self.baseline.as_ref()
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.baseline.is_some()
    }

    #[must_use]
    pub fn active_tab(&self) -> DashboardTab {
        self.active_tab
    }

    #[must_use]
    pub fn phase(&self, category: BadgeCategory) -> BadgePhase {
        self.phases[category.index()]
    }

    #[must_use]
    pub fn is_visible(&self, category: BadgeCategory) -> bool {
        self.phase(category) == BadgePhase::Visible
    }

    /// Items not yet viewed in this category (0 before the baseline loads).
    #[must_use]
    pub fn pending(&self, category: BadgeCategory) -> u32 {
        self.baseline.as_ref().map_or(0, |views| {
            self.counts
                .for_category(category)
                .saturating_sub(category.last_viewed(views))
        })
    }

    #[must_use]
    pub fn visible(&self) -> Vec<BadgeCategory> {
        BadgeCategory::ALL
            .into_iter()
            .filter(|c| self.is_visible(*c))
            .collect()
    }

    fn reconcile_all(&mut self) -> Vec<BadgeEffect> {
        BadgeCategory::ALL
            .into_iter()
            .filter_map(|category| self.reconcile(category))
            .collect()
    }

    fn reconcile(&mut self, category: BadgeCategory) -> Option<BadgeEffect> {
        let idx = category.index();
        let current = self.phases[idx];
        let pending = self.pending(category) > 0;

        if self.baseline.is_none() {
            self.phases[idx] = BadgePhase::Hidden;
            return None;
        }

        if self.active_tab != category.tab() {
            self.phases[idx] = if pending {
                BadgePhase::Visible
            } else {
                BadgePhase::Hidden
            };
            return (current == BadgePhase::Dwelling).then_some(BadgeEffect::CancelDwell { category });
        }

        match (current, pending) {
            (BadgePhase::Dwelling, true) => None,
            (BadgePhase::Dwelling, false) => {
                self.phases[idx] = BadgePhase::Hidden;
                Some(BadgeEffect::CancelDwell { category })
            }
            (_, true) => {
                self.generations[idx] += 1;
                self.phases[idx] = BadgePhase::Dwelling;
                Some(BadgeEffect::StartDwell {
                    category,
                    delay: category.dwell(),
                    generation: self.generations[idx],
                })
            }
            (_, false) => {
                self.phases[idx] = BadgePhase::Hidden;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(quiz: u32, achievements: u32, certificates: u32) -> BadgeCounts {
        BadgeCounts {
            quiz_scores: quiz,
            achievements,
            certificates,
        }
    }

    fn started(effects: &[BadgeEffect], category: BadgeCategory) -> Option<u64> {
        effects.iter().find_map(|e| match e {
            BadgeEffect::StartDwell {
                category: c,
                generation,
                ..
            } if *c == category => Some(*generation),
            _ => None,
        })
    }

    #[test]
    fn nothing_shows_before_the_baseline() {
        let mut board = BadgeBoard::new();
        assert!(board.set_counts(counts(2, 2, 2)).is_empty());
        assert!(board.visible().is_empty());
        assert_eq!(board.pending(BadgeCategory::QuizScores), 0);

        board.load_baseline(BadgeViewState::default());
        assert_eq!(board.visible().len(), 4);
    }

    #[test]
    fn badge_iff_count_exceeds_viewed_and_tab_inactive() {
        for quiz in 0..=2 {
            for viewed in 0..=2 {
                for tab in [DashboardTab::Dashboard, DashboardTab::Scores] {
                    let mut board = BadgeBoard::new();
                    board.activate(tab);
                    board.set_counts(counts(quiz, 0, 0));
                    board.load_baseline(BadgeViewState {
                        last_quiz_score_count: viewed,
                        ..BadgeViewState::default()
                    });
                    let expected = quiz > viewed && tab != DashboardTab::Scores;
                    assert_eq!(
                        board.is_visible(BadgeCategory::QuizScores),
                        expected,
                        "quiz={quiz} viewed={viewed} tab={tab}"
                    );
                }
            }
        }
    }

    #[test]
    fn dwell_marks_the_current_count_viewed() {
        let mut board = BadgeBoard::new();
        board.load_baseline(BadgeViewState::default());
        board.set_counts(counts(2, 0, 0));
        assert!(board.is_visible(BadgeCategory::QuizScores));

        let effects = board.activate(DashboardTab::Scores);
        let generation = started(&effects, BadgeCategory::QuizScores).unwrap();
        assert!(!board.is_visible(BadgeCategory::QuizScores));

        let saved = board
            .dwell_elapsed(BadgeCategory::QuizScores, generation)
            .unwrap();
        assert_eq!(saved.last_quiz_score_count, 2);

        board.activate(DashboardTab::Dashboard);
        assert!(!board.is_visible(BadgeCategory::QuizScores));

        board.set_counts(counts(3, 0, 0));
        assert!(board.is_visible(BadgeCategory::QuizScores));
    }

    #[test]
    fn leaving_early_cancels_and_keeps_the_badge() {
        let mut board = BadgeBoard::new();
        board.load_baseline(BadgeViewState::default());
        board.set_counts(counts(0, 1, 0));

        let effects = board.activate(DashboardTab::Achievements);
        let generation = started(&effects, BadgeCategory::Achievements).unwrap();

        let effects = board.activate(DashboardTab::Dashboard);
        assert!(effects.contains(&BadgeEffect::CancelDwell {
            category: BadgeCategory::Achievements
        }));
        assert!(board.is_visible(BadgeCategory::Achievements));

        // The old timer fires late; it must not commit.
        assert!(
            board
                .dwell_elapsed(BadgeCategory::Achievements, generation)
                .is_none()
        );
        assert_eq!(board.baseline().unwrap().last_achievement_count, 0);
    }

    #[test]
    fn superseded_generation_is_ignored() {
        let mut board = BadgeBoard::new();
        board.load_baseline(BadgeViewState::default());
        board.set_counts(counts(0, 0, 1));

        let first = started(
            &board.activate(DashboardTab::Certificates),
            BadgeCategory::Certificates,
        )
        .unwrap();
        board.activate(DashboardTab::Dashboard);
        let second = started(
            &board.activate(DashboardTab::Certificates),
            BadgeCategory::Certificates,
        )
        .unwrap();
        assert!(second > first);
        assert!(board.dwell_elapsed(BadgeCategory::Certificates, first).is_none());
        assert!(board.dwell_elapsed(BadgeCategory::Certificates, second).is_some());
    }

    #[test]
    fn statistics_dwell_clears_achievements_badge() {
        let mut board = BadgeBoard::new();
        board.load_baseline(BadgeViewState::default());
        board.set_counts(counts(0, 2, 0));
        assert!(board.is_visible(BadgeCategory::Achievements));

        let effects = board.activate(DashboardTab::Statistics);
        let delay = effects.iter().find_map(|e| match e {
            BadgeEffect::StartDwell { delay, .. } => Some(*delay),
            BadgeEffect::CancelDwell { .. } => None,
        });
        assert_eq!(delay, Some(Duration::from_secs(5)));

        let generation = started(&effects, BadgeCategory::Statistics).unwrap();
        board.dwell_elapsed(BadgeCategory::Statistics, generation);
        assert!(!board.is_visible(BadgeCategory::Achievements));
    }

    #[test]
    fn failed_write_restores_the_badge_after_leaving() {
        let mut board = BadgeBoard::new();
        board.load_baseline(BadgeViewState::default());
        board.set_counts(counts(1, 0, 0));
        let generation = started(
            &board.activate(DashboardTab::Scores),
            BadgeCategory::QuizScores,
        )
        .unwrap();
        board.dwell_elapsed(BadgeCategory::QuizScores, generation);

        board.restore_viewed(BadgeCategory::QuizScores, 0);
        assert!(!board.is_visible(BadgeCategory::QuizScores));

        board.activate(DashboardTab::Dashboard);
        assert!(board.is_visible(BadgeCategory::QuizScores));
    }

    #[test]
    fn failed_statistics_write_brings_back_achievements_badge() {
        let mut board = BadgeBoard::new();
        board.load_baseline(BadgeViewState::default());
        board.set_counts(counts(0, 2, 0));
        let generation = started(
            &board.activate(DashboardTab::Statistics),
            BadgeCategory::Statistics,
        )
        .unwrap();
        board.dwell_elapsed(BadgeCategory::Statistics, generation);
        assert!(!board.is_visible(BadgeCategory::Achievements));

        let effects = board.restore_viewed(BadgeCategory::Statistics, 0);
        assert!(effects.is_empty());
        assert_eq!(board.pending(BadgeCategory::Achievements), 2);
        assert!(board.is_visible(BadgeCategory::Achievements));
        assert!(!board.is_visible(BadgeCategory::Statistics));
    }
}
