//! Per-run error log and the summary posted to the admin webhook.

use chrono::{DateTime, Utc};
use tracing::error;

use crate::clients::discord::{COLOR_FAILURE, Embed};

/// Number of recent entries quoted in the summary.
const SUMMARY_TAIL: usize = 10;

/// Errors collected during one task run.
///
/// Entries are recorded by stages that keep going after a partial failure
/// (a failed statistics batch, a rejected playlist insertion) and flushed
/// once at the end of the run.
#[derive(Debug, Default)]
pub(crate) struct ErrorLog {
    entries: Vec<String>,
}

impl ErrorLog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, message: impl AsRef<str>) {
        self.record_at(Utc::now(), message);
    }

    fn record_at(&mut self, at: DateTime<Utc>, message: impl AsRef<str>) {
        let message = message.as_ref();
        error!(message, "recorded run error");
        self.entries.push(format!("[{}] {message}", at.to_rfc3339()));
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drains the log into an "Error Summary" embed. `None` when nothing was
    /// recorded.
    pub(crate) fn take_summary(&mut self) -> Option<Embed> {
        if self.entries.is_empty() {
            return None;
        }

        let total = self.entries.len();
        let tail = self.entries[total.saturating_sub(SUMMARY_TAIL)..].join("\n");
        let description = if total > SUMMARY_TAIL {
            format!("Last {SUMMARY_TAIL} of {total} errors:\n\n{tail}")
        } else {
            format!("All {total} errors:\n\n{tail}")
        };
        self.entries.clear();

        Some(Embed::new("Error Summary", description, COLOR_FAILURE))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn empty_log_has_no_summary() {
        let mut log = ErrorLog::new();
        assert!(log.take_summary().is_none());
    }

    #[test]
    fn entries_are_timestamped() {
        let mut log = ErrorLog::new();
        let at = Utc
            .with_ymd_and_hms(2024, 5, 1, 4, 0, 0)
            .single()
            .expect("valid timestamp");

        log.record_at(at, "stats batch failed");

        let summary = log.take_summary().expect("one entry");
        assert_eq!(
            summary.description,
            "All 1 errors:\n\n[2024-05-01T04:00:00+00:00] stats batch failed"
        );
        assert_eq!(summary.title, "Error Summary");
    }

    #[test]
    fn summary_quotes_last_ten_and_clears() {
        let mut log = ErrorLog::new();
        for i in 0..12 {
            log.record(format!("failure {i}"));
        }
        assert_eq!(log.len(), 12);

        let summary = log.take_summary().expect("entries recorded");

        assert!(summary.description.starts_with("Last 10 of 12 errors:"));
        assert!(!summary.description.contains("failure 1\n"));
        assert!(summary.description.contains("failure 2"));
        assert!(summary.description.ends_with("failure 11"));
        assert_eq!(log.len(), 0);
        assert!(log.take_summary().is_none());
    }
}
