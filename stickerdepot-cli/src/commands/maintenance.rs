//! Background-style commands: the resumable queue, refresh and cleanup.

use std::sync::Arc;
use stickerdepot::queue::{QueueRunSummary, ResumableDownloadQueue};
use stickerdepot::stickers::{CleanupReport, RefreshReport};

use super::common::{parse_link, Manager};
use crate::error::CliError;

/// Queue the pack behind `link` for a later `resume`.
pub fn run_enqueue(manager: Arc<Manager>, link: &str) -> Result<(), CliError> {
    let identity = parse_link(link)?;
    let queue = ResumableDownloadQueue::new(manager);
    queue.enqueue(&identity)?;
    println!(
        "Queued pack {} ({} pending)",
        identity.pack_id_hex(),
        queue.pending_count()?
    );
    Ok(())
}

/// Drain the queue.
pub async fn run_resume(manager: Arc<Manager>) -> Result<(), CliError> {
    let queue = ResumableDownloadQueue::new(manager);
    let pending = queue.pending_count()?;
    if pending == 0 {
        println!("Queue is empty");
        return Ok(());
    }

    println!("Processing {} queued downloads...", pending);
    let summary = queue.run_all().await?;
    println!("{}", format_queue_summary(&summary));
    Ok(())
}

/// Save default packs and complete missing sticker downloads.
pub async fn run_refresh(manager: &Manager) -> Result<(), CliError> {
    let report = manager.refresh_contents().await?;
    println!("{}", format_refresh_report(&report));
    Ok(())
}

/// Remove orphaned records and leftover scratch files.
pub async fn run_cleanup(manager: &Manager, dry_run: bool) -> Result<(), CliError> {
    if dry_run {
        if manager.has_orphaned_data()? {
            println!("Orphaned data present; run without --dry-run to remove it");
        } else {
            println!("No orphaned data");
        }
        return Ok(());
    }

    let report = manager.cleanup_orphaned_data()?;
    let scratch = manager.purge_scratch().await?;
    println!("{}", format_cleanup_report(&report, scratch));
    Ok(())
}

fn format_queue_summary(summary: &QueueRunSummary) -> String {
    format!(
        "Queue: {} succeeded, {} failed, {} deferred",
        summary.succeeded, summary.failed_terminal, summary.deferred
    )
}

fn format_refresh_report(report: &RefreshReport) -> String {
    let mut line = format!(
        "Refresh: {} default packs saved, {} stickers downloaded",
        report.packs_downloaded, report.stickers.installed
    );
    if !report.stickers.is_complete() {
        line.push_str(&format!(", {} failed", report.stickers.failed));
    }
    line
}

fn format_cleanup_report(report: &CleanupReport, scratch: usize) -> String {
    if report.is_empty() && scratch == 0 {
        return "Nothing to clean up".to_string();
    }
    format!(
        "Removed {} packs, {} stickers and {} scratch files",
        report.packs_removed, report.stickers_removed, scratch
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use stickerdepot::stickers::ContentReport;

    #[test]
    fn test_queue_summary_format() {
        let summary = QueueRunSummary {
            succeeded: 2,
            failed_terminal: 1,
            deferred: 3,
        };
        assert_eq!(
            format_queue_summary(&summary),
            "Queue: 2 succeeded, 1 failed, 3 deferred"
        );
    }

    #[test]
    fn test_refresh_report_mentions_failures_only_when_present() {
        let mut report = RefreshReport {
            packs_downloaded: 1,
            stickers: ContentReport {
                installed: 4,
                failed: 0,
            },
        };
        assert_eq!(
            format_refresh_report(&report),
            "Refresh: 1 default packs saved, 4 stickers downloaded"
        );

        report.stickers.failed = 2;
        assert!(format_refresh_report(&report).ends_with(", 2 failed"));
    }

    #[test]
    fn test_cleanup_report_format() {
        assert_eq!(
            format_cleanup_report(&CleanupReport::default(), 0),
            "Nothing to clean up"
        );
        let report = CleanupReport {
            packs_removed: 1,
            stickers_removed: 3,
        };
        assert_eq!(
            format_cleanup_report(&report, 2),
            "Removed 1 packs, 3 stickers and 2 scratch files"
        );
    }
}
