//! Restart-safe queue of pending pack downloads.

mod resumable;

pub use resumable::{QueueRunSummary, ResumableDownloadQueue};
