//! Daily streaks and their milestone rewards.

use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Milestone {
    pub days: i32,
    pub reward_credits: i32,
}

pub const MILESTONES: &[Milestone] = &[
    Milestone { days: 3, reward_credits: 1 },
    Milestone { days: 7, reward_credits: 2 },
    Milestone { days: 14, reward_credits: 3 },
    Milestone { days: 30, reward_credits: 5 },
    Milestone { days: 60, reward_credits: 7 },
    Milestone { days: 100, reward_credits: 10 },
    Milestone { days: 365, reward_credits: 30 },
];

/// Smallest milestone strictly above `streak`.
pub fn next_milestone(streak: i32) -> Option<&'static Milestone> {
    MILESTONES.iter().find(|m| m.days > streak)
}

/// Milestone reached exactly at `streak` days, if any.
pub fn milestone_at(streak: i32) -> Option<&'static Milestone> {
    MILESTONES.iter().find(|m| m.days == streak)
}

/// Percentage between the previous milestone (or zero) and the next one.
pub fn progress(streak: i32) -> f64 {
    let Some(next) = next_milestone(streak) else {
        return 100.0;
    };
    let previous = MILESTONES
        .iter()
        .rev()
        .find(|m| m.days <= streak)
        .map(|m| m.days)
        .unwrap_or(0);
    let span = (next.days - previous) as f64;
    ((streak - previous) as f64 / span * 100.0).clamp(0.0, 100.0)
}

/// Streak after a daily reading on `today`.
pub fn advance(last_reading: Option<NaiveDate>, current: i32, today: NaiveDate) -> i32 {
    match last_reading {
        Some(last) if last == today => current.max(1),
        Some(last) if today.pred_opt() == Some(last) => current + 1,
        _ => 1,
    }
}

/// Streak as displayed: a streak whose last reading is older than yesterday is broken.
pub fn effective(last_reading: Option<NaiveDate>, current: i32, today: NaiveDate) -> i32 {
    match last_reading {
        Some(last) if last == today || today.pred_opt() == Some(last) => current,
        _ => 0,
    }
}

#[derive(Debug, Serialize)]
pub struct StreakInfo {
    pub current: i32,
    pub longest: i32,
    pub next_milestone: Option<Milestone>,
    pub days_to_next: Option<i32>,
    pub progress: f64,
}

impl StreakInfo {
    pub fn new(current: i32, longest: i32) -> Self {
        let next = next_milestone(current).copied();
        Self {
            current,
            longest,
            days_to_next: next.map(|m| m.days - current),
            next_milestone: next,
            progress: progress(current),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn next_milestone_is_smallest_above() {
        for streak in 0..400 {
            let expected = MILESTONES.iter().filter(|m| m.days > streak).map(|m| m.days).min();
            assert_eq!(next_milestone(streak).map(|m| m.days), expected);
        }
        assert!(next_milestone(365).is_none());
    }

    #[test]
    fn progress_between_milestones() {
        assert_eq!(progress(0), 0.0);
        assert_eq!(progress(3), 0.0);
        assert_eq!(progress(5), 50.0);
        assert_eq!(progress(365), 100.0);
    }

    #[test]
    fn advance_continues_or_resets() {
        let today = date(2026, 3, 1);
        assert_eq!(advance(None, 0, today), 1);
        assert_eq!(advance(Some(date(2026, 2, 28)), 6, today), 7);
        assert_eq!(advance(Some(today), 6, today), 6);
        assert_eq!(advance(Some(date(2026, 2, 26)), 6, today), 1);
    }

    #[test]
    fn broken_streak_displays_zero() {
        let today = date(2026, 1, 10);
        assert_eq!(effective(Some(date(2026, 1, 9)), 4, today), 4);
        assert_eq!(effective(Some(date(2026, 1, 7)), 4, today), 0);
        assert_eq!(effective(None, 0, today), 0);
    }

    #[test]
    fn milestone_hit_only_on_exact_day() {
        assert_eq!(milestone_at(7).map(|m| m.reward_credits), Some(2));
        assert!(milestone_at(8).is_none());
    }
}
