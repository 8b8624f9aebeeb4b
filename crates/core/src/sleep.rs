use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Granularity at which a long wait re-checks the cancellation flag.
const SLICE: Duration = Duration::from_millis(100);

/// Timed suspension used by the round loop and the one-shot routines.
pub trait Pause {
    /// Block for `secs` seconds, or less if cancellation is requested.
    fn pause(&mut self, secs: f64);

    /// Whether the operator asked the run to stop.
    fn cancelled(&self) -> bool {
        false
    }
}

/// Sleeps the calling thread, waking early once `cancel` is set.
pub struct ThreadPause {
    cancel: Arc<AtomicBool>,
}

impl ThreadPause {
    pub fn new(cancel: Arc<AtomicBool>) -> Self {
        Self { cancel }
    }
}

impl Pause for ThreadPause {
    fn pause(&mut self, secs: f64) {
        if !secs.is_finite() || secs <= 0.0 {
            return;
        }
        let deadline = Instant::now() + Duration::from_secs_f64(secs);
        loop {
            if self.cancelled() {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            thread::sleep(SLICE.min(deadline - now));
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }
}

/// Records requested waits without sleeping.
#[derive(Debug, Default)]
pub struct RecordingPause {
    pub waits: Vec<f64>,
    pub cancel_after: Option<usize>,
}

impl RecordingPause {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report cancellation once `n` waits have been recorded.
    pub fn cancel_after(n: usize) -> Self {
        Self { waits: Vec::new(), cancel_after: Some(n) }
    }

    pub fn total(&self) -> f64 {
        self.waits.iter().sum()
    }
}

impl Pause for RecordingPause {
    fn pause(&mut self, secs: f64) {
        self.waits.push(secs);
    }

    fn cancelled(&self) -> bool {
        self.cancel_after.is_some_and(|n| self.waits.len() >= n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_pause_returns_immediately_when_cancelled() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut pause = ThreadPause::new(flag);
        let started = Instant::now();
        pause.pause(30.0);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(pause.cancelled());
    }

    #[test]
    fn thread_pause_ignores_non_positive() {
        let mut pause = ThreadPause::new(Arc::new(AtomicBool::new(false)));
        let started = Instant::now();
        pause.pause(0.0);
        pause.pause(-3.0);
        pause.pause(f64::NAN);
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn recording_pause_cancels_after_limit() {
        let mut pause = RecordingPause::cancel_after(2);
        assert!(!pause.cancelled());
        pause.pause(1.0);
        pause.pause(2.5);
        assert!(pause.cancelled());
        assert_eq!(pause.total(), 3.5);
    }
}
