use crate::FrameError;
use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

/// Run statistics as seen by the consumer: all-time totals plus a sliding
/// window for the current rate.
#[derive(Debug, Clone)]
pub struct Counter {
    /// Decoded events since the last reset.
    pub n_events: usize,
    /// Waveform bytes since the last reset.
    pub total_size: usize,
    pub no_header: usize,
    pub incomplete: usize,
    pub t_begin: Instant,

    window: Duration,
    recent: VecDeque<(Instant, usize)>,
    bytes_in_window: usize,
}

impl Default for Counter {
    fn default() -> Self {
        Self::with_window(Duration::from_secs(1))
    }
}

impl Counter {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            n_events: 0,
            total_size: 0,
            no_header: 0,
            incomplete: 0,
            t_begin: Instant::now(),
            window,
            recent: VecDeque::new(),
            bytes_in_window: 0,
        }
    }

    /// Record a decoded event of `size` bytes.
    pub fn increment(&mut self, size: usize) {
        self.increment_at(Instant::now(), size);
    }

    fn increment_at(&mut self, now: Instant, size: usize) {
        self.n_events += 1;
        self.total_size += size;
        self.recent.push_back((now, size));
        self.bytes_in_window += size;
        self.evict(now);
    }

    pub fn record_loss(&mut self, reason: &FrameError) {
        match reason {
            FrameError::NoHeaderFound { .. } => self.no_header += 1,
            FrameError::IncompleteFrame { .. } => self.incomplete += 1,
        }
    }

    pub fn lost(&self) -> usize {
        self.no_header + self.incomplete
    }

    fn evict(&mut self, now: Instant) {
        while let Some(&(ts, size)) = self.recent.front() {
            if now.duration_since(ts) > self.window {
                self.recent.pop_front();
                self.bytes_in_window -= size;
            } else {
                break;
            }
        }
    }

    /// Decoded events per second over the sliding window.
    pub fn event_rate(&mut self) -> f64 {
        self.evict(Instant::now());
        self.recent.len() as f64 / self.window.as_secs_f64().max(1e-6)
    }

    /// Waveform throughput over the sliding window, in MB/s.
    pub fn rate(&mut self) -> f64 {
        self.evict(Instant::now());
        (self.bytes_in_window as f64 / self.window.as_secs_f64().max(1e-6)) / (1024.0 * 1024.0)
    }

    /// Long-term event rate since `t_begin`.
    pub fn average_event_rate(&self) -> f64 {
        let secs = self.t_begin.elapsed().as_secs_f64().max(1e-6);
        self.n_events as f64 / secs
    }

    pub fn reset(&mut self) {
        *self = Self::with_window(self.window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_forgets_old_events() {
        let mut counter = Counter::with_window(Duration::from_millis(100));
        let start = Instant::now();
        counter.increment_at(start, 10);
        counter.increment_at(start + Duration::from_millis(50), 20);
        assert_eq!(counter.bytes_in_window, 30);

        counter.increment_at(start + Duration::from_millis(140), 5);
        assert_eq!(counter.n_events, 3);
        assert_eq!(counter.total_size, 35);
        assert_eq!(counter.recent.len(), 2);
        assert_eq!(counter.bytes_in_window, 25);
    }

    #[test]
    fn losses_are_split_by_reason() {
        let mut counter = Counter::new();
        counter.record_loss(&FrameError::NoHeaderFound { buffered: 10 });
        counter.record_loss(&FrameError::IncompleteFrame {
            offset: 3,
            available: 4,
            required: 6,
        });
        counter.record_loss(&FrameError::NoHeaderFound { buffered: 1 });
        assert_eq!(counter.no_header, 2);
        assert_eq!(counter.incomplete, 1);
        assert_eq!(counter.lost(), 3);

        counter.reset();
        assert_eq!(counter.lost(), 0);
        assert_eq!(counter.n_events, 0);
    }
}
