//! Sliding-window flood detection.
//!
//! A user floods when the last [`FLOOD_WINDOW`] messages arrived with every
//! gap below the interval threshold. Windows live in memory only.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use super::{GroupId, UserId};

/// Messages kept per (group, user).
pub const FLOOD_WINDOW: usize = 5;

/// Largest gap between two messages that still counts as a burst.
pub const FLOOD_INTERVAL: Duration = Duration::from_millis(500);

/// Recent activity of one user in one group.
#[derive(Debug, Clone, Default)]
struct FloodWindow {
    stamps: VecDeque<Instant>,
    last_mute: Option<Instant>,
}

/// Per-(group, user) flood tracker (in-memory, lock-free).
#[derive(Clone)]
pub struct FloodTracker {
    data: Arc<DashMap<(GroupId, UserId), FloodWindow>>,
    capacity: usize,
    interval: Duration,
}

impl FloodTracker {
    pub fn new() -> Self {
        Self::with_limits(FLOOD_WINDOW, FLOOD_INTERVAL)
    }

    pub fn with_limits(capacity: usize, interval: Duration) -> Self {
        Self {
            data: Arc::new(DashMap::new()),
            capacity: capacity.max(2),
            interval,
        }
    }

    /// Record a message at `now` and decide whether to mute the sender.
    ///
    /// Inside the cooldown of a previous mute by this tracker the message is
    /// ignored entirely. On a hit the window is cleared and the mute time
    /// recorded.
    pub fn record_and_check(
        &self,
        group_id: GroupId,
        user_id: UserId,
        now: Instant,
        mute_duration: Duration,
    ) -> bool {
        let mut window = self.data.entry((group_id, user_id)).or_default();

        if let Some(last) = window.last_mute
            && now.saturating_duration_since(last) < mute_duration
        {
            return false;
        }

        window.stamps.push_back(now);
        while window.stamps.len() > self.capacity {
            window.stamps.pop_front();
        }

        if window.stamps.len() < self.capacity {
            return false;
        }

        let flooding = window
            .stamps
            .iter()
            .zip(window.stamps.iter().skip(1))
            .all(|(a, b)| b.saturating_duration_since(*a) < self.interval);

        if flooding {
            window.stamps.clear();
            window.last_mute = Some(now);
            debug!("User {} is flooding in group {}", user_id, group_id);
        }
        flooding
    }

    /// Number of (group, user) windows currently tracked.
    pub fn tracked(&self) -> usize {
        self.data.len()
    }
}

impl Default for FloodTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MUTE: Duration = Duration::from_secs(60);

    fn at(base: Instant, millis: u64) -> Instant {
        base + Duration::from_millis(millis)
    }

    #[test]
    fn test_fast_burst_triggers_on_fifth_message() {
        let tracker = FloodTracker::new();
        let t0 = Instant::now();

        let hits: Vec<bool> = [0, 100, 200, 300, 400]
            .iter()
            .map(|&ms| tracker.record_and_check(1, 10, at(t0, ms), MUTE))
            .collect();

        assert_eq!(hits, vec![false, false, false, false, true]);
    }

    #[test]
    fn test_slow_messages_do_not_trigger() {
        let tracker = FloodTracker::new();
        let t0 = Instant::now();

        for secs in 0..5 {
            assert!(!tracker.record_and_check(1, 10, at(t0, secs * 1000), MUTE));
        }
    }

    #[test]
    fn test_cooldown_suppresses_second_burst() {
        let tracker = FloodTracker::new();
        let t0 = Instant::now();
        for ms in [0, 100, 200, 300, 400] {
            tracker.record_and_check(1, 10, at(t0, ms), MUTE);
        }

        let again = (5..15).any(|i| tracker.record_and_check(1, 10, at(t0, 400 + i * 50), MUTE));
        assert!(!again);

        // After the cooldown a new burst counts again.
        let later = 400 + MUTE.as_millis() as u64;
        let hits: Vec<bool> = (0..5)
            .map(|i| tracker.record_and_check(1, 10, at(t0, later + i * 100), MUTE))
            .collect();
        assert_eq!(hits.last(), Some(&true));
    }

    #[test]
    fn test_single_slow_gap_only_delays_detection() {
        let tracker = FloodTracker::new();
        let t0 = Instant::now();

        // One slow gap in the middle, then a fast tail.
        for ms in [0, 100, 1200, 1300, 1400] {
            assert!(!tracker.record_and_check(1, 10, at(t0, ms), MUTE));
        }
        // The window slides: 1200..1600 are all fast.
        assert!(!tracker.record_and_check(1, 10, at(t0, 1500), MUTE));
        assert!(tracker.record_and_check(1, 10, at(t0, 1600), MUTE));
    }

    #[test]
    fn test_users_and_groups_are_isolated() {
        let tracker = FloodTracker::new();
        let t0 = Instant::now();

        for (i, ms) in [0, 100, 200, 300, 400].iter().enumerate() {
            let user = if i % 2 == 0 { 10 } else { 11 };
            assert!(!tracker.record_and_check(1, user, at(t0, *ms), MUTE));
        }
        assert!(!tracker.record_and_check(2, 10, at(t0, 500), MUTE));
        assert_eq!(tracker.tracked(), 3);
    }
}
