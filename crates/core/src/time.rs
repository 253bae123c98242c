use chrono::{DateTime, Duration, Utc};

/// Clock abstraction so services and tests agree on "now".
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }
}

/// Human label for how long ago something happened.
///
/// `Just now` under a minute, then minutes, hours and days (up to a week),
/// and the calendar date (`M/D/YYYY`) beyond that. Timestamps in the future
/// read as `Just now`.
#[must_use]
pub fn relative_label(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now - created_at;
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 1 {
        return "Just now".to_string();
    }
    if minutes < 60 {
        return format!("{minutes} {} ago", plural(minutes, "minute"));
    }
    if hours < 24 {
        return format!("{hours} {} ago", plural(hours, "hour"));
    }
    if days < 7 {
        return format!("{days} {} ago", plural(days, "day"));
    }
    created_at.format("%-m/%-d/%Y").to_string()
}

fn plural(n: i64, unit: &str) -> String {
    if n > 1 { format!("{unit}s") } else { unit.to_string() }
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_by_magnitude() {
        let now = fixed_now();
        assert_eq!(relative_label(now - Duration::seconds(30), now), "Just now");
        assert_eq!(relative_label(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(relative_label(now - Duration::minutes(59), now), "59 minutes ago");
        assert_eq!(relative_label(now - Duration::hours(1), now), "1 hour ago");
        assert_eq!(relative_label(now - Duration::hours(23), now), "23 hours ago");
        assert_eq!(relative_label(now - Duration::days(1), now), "1 day ago");
        assert_eq!(relative_label(now - Duration::days(6), now), "6 days ago");
    }

    #[test]
    fn old_entries_show_the_date() {
        let now = fixed_now();
        // fixed_now is 2023-11-14; ten days earlier is 2023-11-04.
        assert_eq!(relative_label(now - Duration::days(10), now), "11/4/2023");
    }

    #[test]
    fn future_timestamps_read_as_just_now() {
        let now = fixed_now();
        assert_eq!(relative_label(now + Duration::hours(2), now), "Just now");
    }

    #[test]
    fn fixed_clock_advances() {
        let mut clock = fixed_clock();
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), fixed_now() + Duration::minutes(5));
    }
}
