//! One partition worker: paged read, transform, chunked transactional commit.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{ConfigurationError, WorkerError};
use crate::event::ScoreDelta;
use crate::feed;
use crate::listener::RunProgress;
use crate::partition::PartitionDescriptor;
use crate::store;

/// Caller-owned accumulator returned by a finished worker. The orchestrator
/// merges these into the run report; no state is carried between chunks
/// outside of it and the persisted checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSummary {
    pub descriptor: PartitionDescriptor,
    pub chunks_committed: u64,
    pub events_applied: u64,
}

pub(crate) struct PartitionWorker {
    descriptor: PartitionDescriptor,
    pool: SqlitePool,
    chunk_size: u32,
    page_size: u32,
    progress: Arc<RunProgress>,
}

impl PartitionWorker {
    pub(crate) fn new(
        descriptor: PartitionDescriptor,
        pool: SqlitePool,
        chunk_size: u32,
        page_size: u32,
        progress: Arc<RunProgress>,
    ) -> Result<Self, ConfigurationError> {
        if chunk_size == 0 {
            return Err(ConfigurationError::ZeroChunkSize);
        }
        if page_size == 0 {
            return Err(ConfigurationError::ZeroPageSize);
        }

        Ok(Self {
            descriptor,
            pool,
            chunk_size,
            page_size,
            progress,
        })
    }

    /// Drains this worker's slice of the feed. Resumes strictly after the
    /// checkpointed event id, so chunks committed by an earlier attempt are
    /// never re-applied.
    #[tracing::instrument(
        skip(self),
        fields(partition = self.descriptor.index()),
        level = tracing::Level::DEBUG,
    )]
    pub(crate) async fn run(self) -> Result<WorkerSummary, WorkerError> {
        let mut summary = WorkerSummary {
            descriptor: self.descriptor,
            chunks_committed: 0,
            events_applied: 0,
        };

        let mut cursor = feed::load_checkpoint(&self.pool, &self.descriptor)
            .await?
            .unwrap_or(0);
        if cursor > 0 {
            debug!(cursor, "resuming after checkpointed event");
        }

        let mut chunk: Vec<ScoreDelta> = Vec::with_capacity(self.chunk_size as usize);
        let mut chunk_last_id = cursor;

        loop {
            let page =
                feed::fetch_page(&self.pool, &self.descriptor, cursor, self.page_size).await?;
            let Some(last) = page.last() else {
                break;
            };
            cursor = last.id;

            for event in &page {
                // A bad event aborts here, before the chunk it would have
                // joined ever reaches the store.
                let delta = ScoreDelta::try_from(event)?;
                chunk.push(delta);
                chunk_last_id = event.id;

                if chunk.len() >= self.chunk_size as usize {
                    self.commit_chunk(&mut chunk, chunk_last_id, &mut summary)
                        .await?;
                }
            }
        }

        if !chunk.is_empty() {
            self.commit_chunk(&mut chunk, chunk_last_id, &mut summary)
                .await?;
        }

        Ok(summary)
    }

    /// Commits the buffered deltas and the advanced checkpoint as one
    /// transaction: either the whole chunk lands or none of it does.
    async fn commit_chunk(
        &self,
        chunk: &mut Vec<ScoreDelta>,
        last_event_id: i64,
        summary: &mut WorkerSummary,
    ) -> Result<(), WorkerError> {
        let mut tx = self.pool.begin().await?;
        for delta in chunk.iter() {
            store::apply_delta(&mut *tx, delta).await?;
        }
        feed::save_checkpoint(&mut *tx, &self.descriptor, last_event_id).await?;
        tx.commit().await?;

        let events = chunk.len() as u64;
        summary.chunks_committed += 1;
        summary.events_applied += events;
        self.progress.record_chunk(events);
        debug!(last_event_id, events, "chunk committed");

        chunk.clear();
        Ok(())
    }
}
