//! Progress reporting and cooperative cancellation
//!
//! The pipeline is the only multi-second operation in the product, so it
//! owns the only progress channel: an injectable sink the orchestrator
//! reports stage transitions through. There is no process-wide observer.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Pipeline stage tokens, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Extracting,
    Reconstructing,
    Assembling,
    Scoring,
}

/// One progress notification. A successful run's final update reports
/// `percent == 100`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: Stage,
    pub message: String,
    /// 0–100 estimate
    pub percent: u8,
}

impl ProgressUpdate {
    pub fn new(stage: Stage, message: impl Into<String>, percent: u8) -> Self {
        Self { stage, message: message.into(), percent: percent.min(100) }
    }
}

/// Receiver for progress updates, injected into the orchestrator.
pub trait ProgressSink {
    fn report(&self, update: ProgressUpdate);
}

/// Adapter turning a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F: Fn(ProgressUpdate)> ProgressSink for FnSink<F> {
    fn report(&self, update: ProgressUpdate) {
        (self.0)(update)
    }
}

/// Sink that drops everything, for callers without a progress surface.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&self, _update: ProgressUpdate) {}
}

/// Cooperative cancellation token.
///
/// Checked at every page boundary and before every OCR call, the points
/// where a run can stall for seconds. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = FnSink(|u: ProgressUpdate| seen.lock().unwrap().push(u.percent));
        sink.report(ProgressUpdate::new(Stage::Extracting, "page 1/2", 50));
        sink.report(ProgressUpdate::new(Stage::Scoring, "done", 100));
        assert_eq!(*seen.lock().unwrap(), vec![50, 100]);
    }

    #[test]
    fn test_percent_clamped() {
        let update = ProgressUpdate::new(Stage::Assembling, "over", 150);
        assert_eq!(update.percent, 100);
    }

    #[test]
    fn test_cancel_token_shares_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
