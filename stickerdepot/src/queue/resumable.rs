//! Durable pack download queue.
//!
//! Pending downloads live in the sticker store, so they survive restarts. A
//! run drains the queue in batches of `concurrency` records:
//!
//! 1. A record whose pack is already installed is removed (duplicates of
//!    one pack collapse here).
//! 2. Otherwise the pack is downloaded with
//!    [`InstallMode::InstallIfUnsaved`].
//! 3. Success and terminal failures remove the record. Retryable failures
//!    leave it for the next run and it is not attempted again in this one.
//!
//! Each record is removed in its own transaction, so a run killed halfway
//! keeps exactly the records it had not finished.

use chrono::Utc;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cdn::CdnTransport;
use crate::identity::PackIdentity;
use crate::stickers::{InstallMode, StickerError, StickerManager};
use crate::store::{PendingDownloadRecord, StickerStore};

/// Counts from one [`ResumableDownloadQueue::run_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueRunSummary {
    /// Downloaded, or already installed
    pub succeeded: usize,
    /// Removed after an unretryable error
    pub failed_terminal: usize,
    /// Left queued after a retryable error
    pub deferred: usize,
}

impl QueueRunSummary {
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed_terminal + self.deferred
    }
}

enum Outcome {
    Succeeded,
    FailedTerminal,
    Deferred,
}

/// Restart-safe queue of pack downloads.
pub struct ResumableDownloadQueue<S, T> {
    manager: Arc<StickerManager<S, T>>,
    concurrency: usize,
}

impl<S: StickerStore, T: CdnTransport> ResumableDownloadQueue<S, T> {
    /// Creates a queue using the manager's store and its configured queue
    /// concurrency.
    pub fn new(manager: Arc<StickerManager<S, T>>) -> Self {
        let concurrency = manager.config().queue_concurrency();
        Self {
            manager,
            concurrency,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Persists a pending download and returns its row id.
    pub fn enqueue(&self, identity: &PackIdentity) -> Result<i64, StickerError> {
        let enqueued_at = Utc::now();
        let id = self
            .manager
            .store()
            .write(|tx| Ok::<_, StickerError>(tx.enqueue_pending(identity, enqueued_at)?))?;
        debug!(pack = %identity, id, "Queued pack download");
        Ok(id)
    }

    pub fn pending(&self) -> Result<Vec<PendingDownloadRecord>, StickerError> {
        self.manager
            .store()
            .read(|tx| Ok::<_, StickerError>(tx.pending_downloads(usize::MAX)?))
    }

    pub fn pending_count(&self) -> Result<usize, StickerError> {
        self.manager
            .store()
            .read(|tx| Ok::<_, StickerError>(tx.pending_count()?))
    }

    /// Processes every queued record once.
    pub async fn run_all(&self) -> Result<QueueRunSummary, StickerError> {
        let mut summary = QueueRunSummary::default();
        let mut deferred: HashSet<i64> = HashSet::new();

        loop {
            let batch = self.next_batch(&deferred)?;
            if batch.is_empty() {
                break;
            }

            let outcomes = join_all(batch.iter().map(|record| self.process(record))).await;
            for (record, outcome) in batch.iter().zip(outcomes) {
                match outcome? {
                    Outcome::Succeeded => summary.succeeded += 1,
                    Outcome::FailedTerminal => summary.failed_terminal += 1,
                    Outcome::Deferred => {
                        summary.deferred += 1;
                        deferred.insert(record.id);
                    }
                }
            }
        }

        if summary.processed() > 0 {
            info!(
                succeeded = summary.succeeded,
                failed = summary.failed_terminal,
                deferred = summary.deferred,
                "Download queue run finished"
            );
        }
        Ok(summary)
    }

    /// Oldest records not yet deferred in this run.
    fn next_batch(&self, deferred: &HashSet<i64>) -> Result<Vec<PendingDownloadRecord>, StickerError> {
        let limit = deferred.len().saturating_add(self.concurrency);
        let records = self
            .manager
            .store()
            .read(|tx| Ok::<_, StickerError>(tx.pending_downloads(limit)?))?;
        Ok(records
            .into_iter()
            .filter(|r| !deferred.contains(&r.id))
            .take(self.concurrency)
            .collect())
    }

    async fn process(&self, record: &PendingDownloadRecord) -> Result<Outcome, StickerError> {
        let identity = &record.identity;
        if self.manager.is_installed(identity)? {
            debug!(pack = %identity, id = record.id, "Queued pack already installed");
            self.remove(record)?;
            return Ok(Outcome::Succeeded);
        }

        match self
            .manager
            .download_and_save(identity, InstallMode::InstallIfUnsaved)
            .await
        {
            Ok(_) => {
                self.remove(record)?;
                Ok(Outcome::Succeeded)
            }
            Err(e) if e.is_retryable() => {
                debug!(pack = %identity, id = record.id, error = %e, "Deferring queued download");
                Ok(Outcome::Deferred)
            }
            Err(e) => {
                warn!(pack = %identity, id = record.id, error = %e, "Dropping queued download");
                self.remove(record)?;
                Ok(Outcome::FailedTerminal)
            }
        }
    }

    fn remove(&self, record: &PendingDownloadRecord) -> Result<(), StickerError> {
        self.manager
            .store()
            .write(|tx| Ok::<_, StickerError>(tx.remove_pending(record.id)?))?;
        Ok(())
    }
}
