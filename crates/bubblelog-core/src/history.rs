//! Rolling chart history
//!
//! A fixed-capacity FIFO of `(relative_time, value)` pairs. Once full, every
//! append evicts the oldest pair. Ordering is not enforced and nothing is
//! resampled; the buffer stores exactly what it was given.

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// History buffer shared between a poll task and the presentation task
pub type SharedHistory = Arc<Mutex<HistoryBuffer>>;

/// Fixed-capacity rolling window of samples for one plotted quantity
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    capacity: usize,
    points: VecDeque<(f64, f64)>,
}

impl HistoryBuffer {
    /// Create a buffer holding at most `capacity` points (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity),
        }
    }

    /// Capacity that covers `window_secs` of history at one point per `interval_ms`
    pub fn capacity_for(window_secs: f64, interval_ms: u64) -> usize {
        if interval_ms == 0 || !window_secs.is_finite() || window_secs <= 0.0 {
            return 1;
        }
        ((window_secs * 1000.0 / interval_ms as f64).round() as usize).max(1)
    }

    /// Create a buffer sized for a retention window and polling interval
    pub fn with_window(window_secs: f64, interval_ms: u64) -> Self {
        Self::new(Self::capacity_for(window_secs, interval_ms))
    }

    /// Wrap in the shared handle used by the scheduler
    pub fn shared(self) -> SharedHistory {
        Arc::new(Mutex::new(self))
    }

    /// Append a point, evicting the oldest one when full
    pub fn append(&mut self, time: f64, value: f64) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back((time, value));
    }

    /// Points in arrival order
    pub fn snapshot(&self) -> Vec<(f64, f64)> {
        self.points.iter().copied().collect()
    }

    /// Iterate points in arrival order
    pub fn iter(&self) -> impl Iterator<Item = &(f64, f64)> {
        self.points.iter()
    }

    /// Most recently appended point
    pub fn latest(&self) -> Option<(f64, f64)> {
        self.points.back().copied()
    }

    /// Drop all points, keeping the capacity
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Number of stored points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the buffer holds no points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Maximum number of points
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
