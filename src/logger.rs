/*
    Per-query diagnostic logging.

    QueryLogger is the one process-wide source of log entry ids. It is created on first use,
    never reset, and lives until the process exits. Each logged operation gets a LogTracker
    holding a fixed id so that follow-up entries ("success", "failure", "timeout") can be
    matched with the entry that started them. Entries are emitted as tracing events.
*/
use crate::imports::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static GLOBAL_LOGGER: LazyLock<QueryLogger> = LazyLock::new(QueryLogger::new);

#[derive(Debug, Default)]
pub struct QueryLogger {
    last_id: AtomicU64,
}

impl QueryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> &'static QueryLogger {
        &GLOBAL_LOGGER
    }

    /// Logs `entry` under a fresh id and returns a tracker bound to it.
    /// Disabled trackers do not consume an id and never evaluate entries.
    pub fn start(&self, enabled: bool, entry: impl FnOnce() -> String) -> LogTracker {
        if !enabled {
            return LogTracker::disabled();
        }
        let id = self.last_id.fetch_add(1, Ordering::Relaxed) + 1;
        let tracker = LogTracker {
            id: Some(id),
            started: Instant::now(),
        };
        tracing::debug!(id = %format_id(id), "{}", entry());
        tracker
    }
}

#[derive(Debug, Clone)]
pub struct LogTracker {
    id: Option<u64>,
    started: Instant,
}

impl LogTracker {
    pub fn disabled() -> Self {
        LogTracker {
            id: None,
            started: Instant::now(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.id.is_some()
    }

    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn debug(&self, entry: impl FnOnce() -> String) {
        if let Some(id) = self.id {
            tracing::debug!(id = %format_id(id), elapsed_ms = self.elapsed_ms(), "{}", entry());
        }
    }

    pub fn info(&self, entry: impl FnOnce() -> String) {
        if let Some(id) = self.id {
            tracing::info!(id = %format_id(id), elapsed_ms = self.elapsed_ms(), "{}", entry());
        }
    }

    pub fn error(&self, entry: impl FnOnce() -> String) {
        if let Some(id) = self.id {
            tracing::error!(id = %format_id(id), elapsed_ms = self.elapsed_ms(), "{}", entry());
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

// "[0007]", ids longer than four digits are printed in full
fn format_id(id: u64) -> String {
    format!("[{:04}]", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_tracing;

    #[test]
    fn test_ids_are_padded() {
        assert_eq!(format_id(7), "[0007]");
        assert_eq!(format_id(12345), "[12345]");
    }

    #[test]
    fn test_ids_increase_per_started_entry() {
        init_tracing();
        let logger = QueryLogger::new();
        let first = logger.start(true, || "first".to_string());
        let second = logger.start(true, || "second".to_string());
        assert_eq!(first.id(), Some(1));
        assert_eq!(second.id(), Some(2));
        second.debug(|| "follow-up".to_string());
        assert_eq!(second.id(), Some(2));
    }

    #[test]
    fn test_every_level_evaluates_entries_of_enabled_trackers() {
        init_tracing();
        let logger = QueryLogger::new();
        let tracker = logger.start(true, || "installing".to_string());
        let evaluated = std::cell::Cell::new(0);
        tracker.debug(|| {
            evaluated.set(evaluated.get() + 1);
            "checking".to_string()
        });
        tracker.info(|| {
            evaluated.set(evaluated.get() + 1);
            "installed".to_string()
        });
        tracker.error(|| {
            evaluated.set(evaluated.get() + 1);
            "navigation failed".to_string()
        });
        assert_eq!(evaluated.get(), 3);
        assert_eq!(tracker.id(), Some(1));
    }

    #[test]
    fn test_disabled_tracker_skips_entries() {
        let logger = QueryLogger::new();
        let tracker = logger.start(false, || panic!("entry should not be evaluated"));
        assert!(!tracker.is_enabled());
        tracker.debug(|| panic!("entry should not be evaluated"));
        tracker.info(|| panic!("entry should not be evaluated"));
        tracker.error(|| panic!("entry should not be evaluated"));
        assert_eq!(logger.start(true, String::new).id(), Some(1));
    }
}
