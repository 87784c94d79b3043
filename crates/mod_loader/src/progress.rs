//! Preload progress: raw per-group tracking and cosmetic smoothing.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Receives raw preload progress in `[0.0, 1.0]`.
///
/// Reports are non-decreasing and the last one of a preload is exactly 1.0.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: f32);
}

/// Discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _progress: f32) {}
}

/// Progress of an open unit: halfway once the group is open.
pub(crate) const OPENED: f32 = 0.5;
pub(crate) const DONE: f32 = 1.0;

struct TrackerState {
    groups: Vec<f32>,
    reported: f32,
}

/// Per-group progress; overall progress is the mean over groups.
pub(crate) struct ProgressTracker {
    state: Mutex<TrackerState>,
    sink: Arc<dyn ProgressSink>,
}

impl ProgressTracker {
    pub fn new(groups: usize, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                groups: vec![0.0; groups],
                reported: 0.0,
            }),
            sink,
        }
    }

    /// Raises the progress of one group. Lower values are ignored.
    pub async fn advance(&self, slot: usize, value: f32) {
        let mut state = self.state.lock().await;
        if let Some(current) = state.groups.get_mut(slot) {
            *current = current.max(value.min(DONE));
        }
        let overall = mean(&state.groups);
        if overall > state.reported {
            state.reported = overall;
            self.sink.report(overall);
        }
    }

    /// Forces every group to done and emits the final report.
    pub async fn finish(&self) {
        let mut state = self.state.lock().await;
        state.groups.iter_mut().for_each(|value| *value = DONE);
        if state.reported < DONE {
            state.reported = DONE;
            self.sink.report(DONE);
        }
    }

    #[cfg(test)]
    pub async fn current(&self) -> f32 {
        mean(&self.state.lock().await.groups)
    }
}

fn mean(groups: &[f32]) -> f32 {
    if groups.is_empty() {
        return DONE;
    }
    let total: f32 = groups.iter().sum();
    // Exact 1.0 once every group is done, regardless of rounding.
    if groups.iter().all(|value| *value >= DONE) {
        DONE
    } else {
        (total / groups.len() as f32).min(DONE)
    }
}

/// Exponentially smoothed progress for display.
///
/// `shown` approaches `commanded` by `1 - e^(-decay * dt)` of the remaining
/// distance per tick. Purely cosmetic; completion is decided by raw progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothedProgress {
    shown: f32,
    commanded: f32,
    decay: f32,
}

impl SmoothedProgress {
    pub const DEFAULT_DECAY: f32 = 16.0;

    pub fn new(decay: f32) -> Self {
        Self {
            shown: 0.0,
            commanded: 0.0,
            decay,
        }
    }

    /// Sets the target value, clamped to `[0.0, 1.0]`.
    pub fn command(&mut self, progress: f32) {
        self.commanded = progress.clamp(0.0, 1.0);
    }

    pub fn tick(&mut self, dt: Duration) -> f32 {
        let factor = 1.0 - (-self.decay * dt.as_secs_f32()).exp();
        self.shown += (self.commanded - self.shown) * factor;
        self.shown
    }

    pub fn shown(&self) -> f32 {
        self.shown
    }

    pub fn commanded(&self) -> f32 {
        self.commanded
    }
}

impl Default for SmoothedProgress {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DECAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Recorder(StdMutex<Vec<f32>>);

    impl ProgressSink for Recorder {
        fn report(&self, progress: f32) {
            self.0.lock().unwrap().push(progress);
        }
    }

    #[tokio::test]
    async fn test_mean_over_groups() {
        let recorder = Arc::new(Recorder::default());
        let tracker = ProgressTracker::new(2, recorder.clone());

        tracker.advance(0, OPENED).await;
        assert_eq!(tracker.current().await, 0.25);
        tracker.advance(0, DONE).await;
        tracker.advance(1, OPENED).await;
        assert_eq!(tracker.current().await, 0.75);
        tracker.advance(1, DONE).await;
        tracker.finish().await;

        assert_eq!(*recorder.0.lock().unwrap(), vec![0.25, 0.5, 0.75, 1.0]);
    }

    #[tokio::test]
    async fn test_progress_never_goes_back() {
        let recorder = Arc::new(Recorder::default());
        let tracker = ProgressTracker::new(1, recorder.clone());

        tracker.advance(0, DONE).await;
        tracker.advance(0, OPENED).await;
        assert_eq!(tracker.current().await, 1.0);
        assert_eq!(*recorder.0.lock().unwrap(), vec![1.0]);
    }

    #[tokio::test]
    async fn test_empty_tracker_is_complete() {
        let recorder = Arc::new(Recorder::default());
        let tracker = ProgressTracker::new(0, recorder.clone());
        assert_eq!(tracker.current().await, 1.0);
        tracker.finish().await;
        assert_eq!(*recorder.0.lock().unwrap(), vec![1.0]);
    }

    #[test]
    fn test_smoothing_converges() {
        let mut smoothed = SmoothedProgress::default();
        smoothed.command(1.0);

        let first = smoothed.tick(Duration::from_millis(16));
        let expected = 1.0 - (-16.0f32 * 0.016).exp();
        assert!((first - expected).abs() < 1e-6);

        for _ in 0..200 {
            smoothed.tick(Duration::from_millis(16));
        }
        assert!((smoothed.shown() - 1.0).abs() < 1e-3);
        assert_eq!(smoothed.commanded(), 1.0);
    }

    #[test]
    fn test_command_is_clamped() {
        let mut smoothed = SmoothedProgress::new(8.0);
        smoothed.command(3.0);
        assert_eq!(smoothed.commanded(), 1.0);
        smoothed.command(-1.0);
        assert_eq!(smoothed.commanded(), 0.0);
    }
}
