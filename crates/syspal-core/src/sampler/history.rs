//! Fixed-capacity history of raw counter samples.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// One cumulative counter value as read during an acquisition pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub value: u64,
    pub taken_at: Instant,
}

/// Circular buffer of the most recent samples of one counter.
///
/// Deltas compare the newest sample with one `go_back` steps older. The
/// step count is clamped to what the buffer holds, so asking for more
/// history than exists simply uses all of it. A counter that went
/// backwards (wrapped or reset) reports a zero delta for that window.
#[derive(Debug, Clone)]
pub struct SampleHistory {
    capacity: usize,
    samples: VecDeque<RawSample>,
}

impl SampleHistory {
    /// Creates an empty history. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<&RawSample> {
        self.samples.back()
    }

    /// Samples from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &RawSample> {
        self.samples.iter()
    }

    /// Appends a sample stamped with the current time.
    pub fn add_sample(&mut self, value: u64) {
        self.add_sample_at(value, Instant::now());
    }

    /// Appends a sample, evicting the oldest one when full.
    pub fn add_sample_at(&mut self, value: u64, taken_at: Instant) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(RawSample { value, taken_at });
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Number of steps actually available for a request of `go_back`.
    fn steps(&self, go_back: usize) -> usize {
        go_back.min(self.samples.len().saturating_sub(1))
    }

    fn window(&self, go_back: usize) -> Option<(&RawSample, &RawSample)> {
        let steps = self.steps(go_back);
        if steps == 0 {
            return None;
        }
        let newest = self.samples.len() - 1;
        Some((&self.samples[newest - steps], &self.samples[newest]))
    }

    /// `latest - sample[latest - go_back]`, zero with fewer than two samples.
    pub fn delta(&self, go_back: usize) -> u64 {
        self.timed_delta(go_back).0
    }

    /// Like [`SampleHistory::delta`], also returning the time between the two
    /// samples.
    pub fn timed_delta(&self, go_back: usize) -> (u64, Duration) {
        match self.window(go_back) {
            Some((old, new)) => (
                new.value.saturating_sub(old.value),
                new.taken_at.saturating_duration_since(old.taken_at),
            ),
            None => (0, Duration::ZERO),
        }
    }

    /// Delta divided by the number of steps it spans.
    pub fn average_delta(&self, go_back: usize) -> f64 {
        let steps = self.steps(go_back);
        if steps == 0 {
            return 0.0;
        }
        self.delta(go_back) as f64 / steps as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(values: &[u64]) -> SampleHistory {
        let mut h = SampleHistory::new(values.len());
        for v in values {
            h.add_sample(*v);
        }
        h
    }

    #[test]
    fn test_eviction_keeps_most_recent_in_order() {
        let mut h = SampleHistory::new(3);
        for v in 1..=5 {
            h.add_sample(v);
        }
        assert_eq!(h.len(), 3);
        let values: Vec<u64> = h.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![3, 4, 5]);
    }

    #[test]
    fn test_delta_clamps_go_back() {
        let h = filled(&[10, 20, 35]);
        assert_eq!(h.delta(1), 15);
        assert_eq!(h.delta(2), 25);
        assert_eq!(h.delta(10), h.delta(h.len() - 1));
    }

    #[test]
    fn test_empty_and_single_sample_are_zero() {
        let empty = SampleHistory::new(4);
        assert_eq!(empty.delta(1), 0);
        assert_eq!(empty.average_delta(3), 0.0);

        let single = filled(&[42]);
        assert_eq!(single.delta(1), 0);
        assert_eq!(single.average_delta(1), 0.0);
        assert_eq!(single.timed_delta(1), (0, Duration::ZERO));
    }

    #[test]
    fn test_go_back_zero_is_zero() {
        let h = filled(&[1, 2]);
        assert_eq!(h.delta(0), 0);
        assert_eq!(h.average_delta(0), 0.0);
    }

    #[test]
    fn test_average_delta_divides_by_steps() {
        let h = filled(&[100, 110, 130, 160]);
        assert_eq!(h.average_delta(3), 20.0);
        // Clamped to three steps
        assert_eq!(h.average_delta(6), 20.0);
    }

    #[test]
    fn test_counter_regression_is_zero() {
        let h = filled(&[u32::MAX as u64 - 5, 10]);
        assert_eq!(h.delta(1), 0);
        assert_eq!(h.average_delta(1), 0.0);
    }

    #[test]
    fn test_timed_delta() {
        let start = Instant::now();
        let mut h = SampleHistory::new(4);
        h.add_sample_at(100, start);
        h.add_sample_at(150, start + Duration::from_secs(10));
        assert_eq!(h.timed_delta(1), (50, Duration::from_secs(10)));
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut h = SampleHistory::new(0);
        h.add_sample(1);
        h.add_sample(2);
        assert_eq!(h.capacity(), 1);
        assert_eq!(h.latest().map(|s| s.value), Some(2));
    }
}
