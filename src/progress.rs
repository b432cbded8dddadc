//! Progress events and cooperative cancellation for a documentation run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// A milestone reached by a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub message: String,
    /// 0 to 100.
    pub percent: u8,
}

impl ProgressEvent {
    pub fn new(message: impl Into<String>, percent: u8) -> Self {
        Self {
            message: message.into(),
            percent: percent.min(100),
        }
    }
}

/// Receives progress events. Implementations must not block for long.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Emits events as `info` log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, event: ProgressEvent) {
        tracing::info!(percent = event.percent, "{}", event.message);
    }
}

/// Forwards events to a channel; a closed receiver is ignored.
impl ProgressSink for Sender<ProgressEvent> {
    fn report(&self, event: ProgressEvent) {
        let _ = self.send(event);
    }
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn report(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Shared soft-cancellation signal.
///
/// Runs check the flag between batches; work already started in a batch
/// is allowed to finish.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
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
    use std::sync::mpsc;
    use std::sync::Mutex;

    #[test]
    fn test_percent_is_clamped() {
        assert_eq!(ProgressEvent::new("done", 250).percent, 100);
    }

    #[test]
    fn test_channel_sink() {
        let (tx, rx) = mpsc::channel();
        tx.report(ProgressEvent::new("walking", 10));
        assert_eq!(rx.recv().unwrap(), ProgressEvent::new("walking", 10));

        drop(rx);
        tx.report(ProgressEvent::new("ignored", 20));
    }

    #[test]
    fn test_closure_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |event: ProgressEvent| seen.lock().unwrap().push(event.percent);
        sink.report(ProgressEvent::new("a", 1));
        sink.report(ProgressEvent::new("b", 2));
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!flag.is_cancelled());
        clone.cancel();
        assert!(flag.is_cancelled());
    }
}
