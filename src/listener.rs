//! Run observation hooks. Purely diagnostic: nothing here influences
//! scheduling or the combine semantics.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{error, info};

use crate::error::WorkerError;
use crate::partition::PartitionDescriptor;
use crate::worker::WorkerSummary;

/// How a worker ended, as reported to [`RunListener::after_worker`].
#[derive(Debug, Clone, Copy)]
pub enum WorkerOutcome<'a> {
    Succeeded(&'a WorkerSummary),
    Failed(&'a WorkerError),
}

/// Observes worker lifecycle for diagnostics. Implementations must not block
/// or fail; the trait is infallible so a listener cannot alter the run.
pub trait RunListener: Send + Sync {
    fn before_worker(&self, descriptor: &PartitionDescriptor);
    fn after_worker(&self, descriptor: &PartitionDescriptor, outcome: WorkerOutcome<'_>);
}

/// Default listener: logs worker start and end.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogListener;

impl RunListener for LogListener {
    fn before_worker(&self, descriptor: &PartitionDescriptor) {
        if descriptor.count() == 1 {
            info!("worker starting full scan of session events");
        } else {
            info!(
                partition = descriptor.index(),
                of = descriptor.count(),
                "worker starting"
            );
        }
    }

    fn after_worker(&self, descriptor: &PartitionDescriptor, outcome: WorkerOutcome<'_>) {
        match outcome {
            WorkerOutcome::Succeeded(summary) => info!(
                partition = descriptor.index(),
                chunks = summary.chunks_committed,
                events = summary.events_applied,
                "worker finished"
            ),
            WorkerOutcome::Failed(error) => error!(
                partition = descriptor.index(),
                %error,
                "worker failed"
            ),
        }
    }
}

/// Live counters for a run, bumped once per committed chunk. Shared across
/// workers; readable at any time while the run is in flight.
#[derive(Debug, Default)]
pub struct RunProgress {
    chunks_committed: AtomicU64,
    events_applied: AtomicU64,
}

impl RunProgress {
    pub(crate) fn record_chunk(&self, events: u64) {
        self.chunks_committed.fetch_add(1, Ordering::Relaxed);
        self.events_applied.fetch_add(events, Ordering::Relaxed);
    }

    pub fn chunks_committed(&self) -> u64 {
        self.chunks_committed.load(Ordering::Relaxed)
    }

    pub fn events_applied(&self) -> u64 {
        self.events_applied.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_counts_chunks_and_events() {
        let progress = RunProgress::default();
        progress.record_chunk(5);
        progress.record_chunk(3);

        assert_eq!(progress.chunks_committed(), 2);
        assert_eq!(progress.events_applied(), 8);
    }
}
