use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::{AchievementId, LearnerCounters, percentage};

//
// ─── RULES ─────────────────────────────────────────────────────────────────────
//

/// Counter an achievement rule is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    CompletedCourses,
    TotalScore,
    AverageScore,
    CoursesInProgress,
}

impl Metric {
    fn read(self, counters: &LearnerCounters) -> f64 {
        match self {
            Metric::CompletedCourses => f64::from(counters.completed_courses),
            Metric::TotalScore => counters.total_score,
            Metric::AverageScore => counters.average_score,
            Metric::CoursesInProgress => f64::from(counters.courses_in_progress),
        }
    }
}

/// Threshold a rule's metric must reach.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    Fixed(f64),
    /// The size of the catalog; a rule with this target stays locked while the
    /// catalog is empty.
    AllCourses,
}

/// A fixed achievement definition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AchievementRule {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub metric: Metric,
    pub target: Target,
    /// Extra gate on the average score (used by the champion rule only).
    pub min_average_score: Option<f64>,
}

const fn rule(
    id: &'static str,
    title: &'static str,
    description: &'static str,
    metric: Metric,
    target: f64,
) -> AchievementRule {
    AchievementRule {
        id,
        title,
        description,
        metric,
        target: Target::Fixed(target),
        min_average_score: None,
    }
}

/// The achievement catalogue, in display order.
pub const RULES: [AchievementRule; 16] = [
    rule(
        "first_course",
        "First Steps",
        "Complete your first cacao course",
        Metric::CompletedCourses,
        1.0,
    ),
    rule(
        "cacao_beginner",
        "Cacao Beginner",
        "Complete 3 cacao courses",
        Metric::CompletedCourses,
        3.0,
    ),
    rule(
        "dedicated_farmer",
        "Dedicated Farmer",
        "Complete 5 cacao courses",
        Metric::CompletedCourses,
        5.0,
    ),
    rule(
        "high_achiever",
        "High Achiever",
        "Score over 500 total points",
        Metric::TotalScore,
        500.0,
    ),
    rule(
        "expert_farmer",
        "Expert Farmer",
        "Complete 8 cacao courses",
        Metric::CompletedCourses,
        8.0,
    ),
    rule(
        "quiz_master",
        "Quiz Master",
        "Score over 1000 total points",
        Metric::TotalScore,
        1000.0,
    ),
    rule(
        "consistent_learner",
        "Consistent Learner",
        "Have 3 courses in progress",
        Metric::CoursesInProgress,
        3.0,
    ),
    AchievementRule {
        id: "cacao_master",
        title: "Cacao Master",
        description: "Complete all available courses",
        metric: Metric::CompletedCourses,
        target: Target::AllCourses,
        min_average_score: None,
    },
    rule(
        "early_bird",
        "Early Bird",
        "Complete a course within the first week",
        Metric::CompletedCourses,
        1.0,
    ),
    rule(
        "night_owl",
        "Night Owl",
        "Study during evening hours",
        Metric::TotalScore,
        100.0,
    ),
    rule(
        "perfectionist",
        "Perfectionist",
        "Achieve 90% or higher average score",
        Metric::AverageScore,
        90.0,
    ),
    rule(
        "enthusiast",
        "Enthusiast",
        "Complete 10 lessons total",
        Metric::TotalScore,
        200.0,
    ),
    rule(
        "persistent",
        "Persistent Farmer",
        "Continue learning for 7 days straight",
        Metric::CompletedCourses,
        2.0,
    ),
    rule(
        "quick_learner",
        "Quick Learner",
        "Complete 2 courses in one day",
        Metric::CompletedCourses,
        2.0,
    ),
    rule(
        "knowledge_seeker",
        "Knowledge Seeker",
        "Score over 1500 total points",
        Metric::TotalScore,
        1500.0,
    ),
    AchievementRule {
        id: "champion",
        title: "Cacao Champion",
        description: "Complete 10 courses with 80% average",
        metric: Metric::CompletedCourses,
        target: Target::Fixed(10.0),
        min_average_score: Some(80.0),
    },
];

//
// ─── EVALUATION ────────────────────────────────────────────────────────────────
//

/// A derived achievement record. Never persisted; recomputed from counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: AchievementId,
    pub title: String,
    pub description: String,
    pub unlocked: bool,
    /// `min(100, round(current / target * 100))`.
    pub progress: u32,
    pub target: f64,
    pub current: f64,
}

impl AchievementRule {
    /// Evaluate this rule against a set of counters.
    #[must_use]
    pub fn evaluate(&self, counters: &LearnerCounters) -> Achievement {
        let current = self.metric.read(counters);
        let target = match self.target {
            Target::Fixed(value) => value,
            Target::AllCourses => f64::from(counters.total_courses),
        };

        let reached = target > 0.0 && current >= target;
        let gated = self
            .min_average_score
            .is_none_or(|min| counters.average_score >= min);

        Achievement {
            id: AchievementId::new(self.id),
            title: self.title.to_string(),
            description: self.description.to_string(),
            unlocked: reached && gated,
            progress: percentage(current, target),
            target,
            current,
        }
    }
}

/// Evaluate every rule in catalogue order.
///
/// Pure and deterministic: identical counters always yield identical output.
///
/// # Examples
///
/// ```
/// # use cacao_core::achievements::evaluate;
/// # use cacao_core::model::LearnerCounters;
/// let counters = LearnerCounters {
///     completed_courses: 1,
///     total_courses: 4,
///     ..LearnerCounters::default()
/// };
/// let achievements = evaluate(&counters);
/// let first = &achievements[0];
/// assert_eq!(first.id.as_str(), "first_course");
/// assert!(first.unlocked);
/// assert_eq!(achievements[1].progress, 33);
/// ```
#[must_use]
pub fn evaluate(counters: &LearnerCounters) -> Vec<Achievement> {
    RULES.iter().map(|rule| rule.evaluate(counters)).collect()
}

/// Achievements unlocked in `current` that were not unlocked in `previous`.
#[must_use]
pub fn newly_unlocked<'a>(previous: &[Achievement], current: &'a [Achievement]) -> Vec<&'a Achievement> {
    current
        .iter()
        .filter(|a| a.unlocked)
        .filter(|a| !previous.iter().any(|p| p.id == a.id && p.unlocked))
        .collect()
}

/// Keeps unlocked achievements unlocked for the rest of a session.
///
/// Counters can move down (a new course grows the catalog, an in-progress
/// course completes), which would otherwise re-lock an achievement the learner
/// has already seen.
#[derive(Debug, Clone, Default)]
pub struct UnlockLatch {
    unlocked: BTreeSet<AchievementId>,
}

impl UnlockLatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the latch to a fresh evaluation and record anything newly unlocked.
    #[must_use]
    pub fn apply(&mut self, mut achievements: Vec<Achievement>) -> Vec<Achievement> {
        for achievement in &mut achievements {
            if achievement.unlocked {
                self.unlocked.insert(achievement.id.clone());
            } else if self.unlocked.contains(&achievement.id) {
                achievement.unlocked = true;
                achievement.progress = 100;
            }
        }
        achievements
    }

    #[must_use]
    pub fn is_latched(&self, id: &AchievementId) -> bool {
        self.unlocked.contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.unlocked.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unlocked.is_empty()
    }
}
