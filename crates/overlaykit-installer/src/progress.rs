use std::thread;
use std::time::Duration;

use crate::PipelineStage;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Observer for pipeline progress. Purely informational: nothing a sink does
/// changes the outcome of an install.
pub trait ProgressSink {
    fn tick(&mut self, completed: u64, total: u64, label: &str);

    fn stage(&mut self, _stage: PipelineStage) {}

    /// Called repeatedly while a background stage is still running.
    fn waiting(&mut self, _label: &str) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn tick(&mut self, _completed: u64, _total: u64, _label: &str) {}
}

/// Runs `work` on a worker thread while the calling thread polls for
/// completion and keeps `sink` informed.
pub(crate) fn run_in_background<T, F>(label: &str, sink: &mut dyn ProgressSink, work: F) -> T
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    thread::scope(|scope| {
        let handle = scope.spawn(work);
        while !handle.is_finished() {
            sink.waiting(label);
            thread::sleep(POLL_INTERVAL);
        }
        match handle.join() {
            Ok(value) => value,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    })
}
