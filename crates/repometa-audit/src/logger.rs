//! Bounded audit logger
//!
//! Entries are kept in a FIFO buffer of at most `max_entries` records. The
//! destination file is only ever appended to.

use crate::entry::AuditEntry;
use parking_lot::Mutex;
use repometa_common::{AuditConfig, Result};
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// When buffered entries reach the destination file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuditPolicy {
    /// Append every entry to the file as it is added; the buffer only keeps
    /// the most recent `max_entries` (already durable) entries
    WriteOnAdd,
    /// Keep entries in memory and flush the whole buffer once it is full
    #[default]
    Batch,
}

/// Bounded FIFO of query audit entries
#[derive(Debug)]
pub struct AuditLogger {
    entries: Mutex<VecDeque<AuditEntry>>,
    max_entries: usize,
    file_path: Option<PathBuf>,
    policy: AuditPolicy,
}

impl AuditLogger {
    /// Create a logger; `max_entries` below one is raised to one
    pub fn new(max_entries: usize, file_path: Option<PathBuf>, policy: AuditPolicy) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(max_entries)),
            max_entries,
            file_path,
            policy,
        }
    }

    /// Create a logger from configuration
    #[must_use]
    pub fn from_config(config: &AuditConfig) -> Self {
        let policy = if config.write_on_add {
            AuditPolicy::WriteOnAdd
        } else {
            AuditPolicy::Batch
        };
        Self::new(config.max_entries, config.file_path.clone(), policy)
    }

    /// Append an entry according to the configured policy
    ///
    /// On error the buffer is left as it was and `entry` is not recorded.
    pub fn add(&self, entry: AuditEntry) -> Result<()> {
        let mut entries = self.entries.lock();

        match self.policy {
            AuditPolicy::WriteOnAdd => {
                if let Some(path) = &self.file_path {
                    append_lines(path, std::iter::once(&entry))?;
                }
                if entries.len() >= self.max_entries {
                    entries.pop_front();
                }
            }
            AuditPolicy::Batch => {
                if entries.len() >= self.max_entries {
                    match &self.file_path {
                        Some(path) => {
                            append_lines(path, entries.iter())?;
                            debug!("Flushed {} audit entries", entries.len());
                            entries.clear();
                        }
                        None => {
                            warn!(
                                "Audit buffer full with no destination file; discarding {} entries",
                                entries.len()
                            );
                            entries.clear();
                        }
                    }
                }
            }
        }

        entries.push_back(entry);
        Ok(())
    }

    /// Flush all buffered entries to the destination file and empty the buffer
    ///
    /// Without a destination file this is a no-op and entries stay buffered.
    /// Under `WriteOnAdd` the buffered entries are already in the file, so
    /// the buffer is only emptied.
    pub fn write(&self) -> Result<()> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };

        let mut entries = self.entries.lock();
        if entries.is_empty() {
            return Ok(());
        }
        if self.policy == AuditPolicy::WriteOnAdd {
            entries.clear();
            return Ok(());
        }
        append_lines(path, entries.iter())?;
        debug!("Flushed {} audit entries", entries.len());
        entries.clear();
        Ok(())
    }

    /// Number of buffered entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Snapshot of the buffered entries, oldest first
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    #[must_use]
    pub const fn max_entries(&self) -> usize {
        self.max_entries
    }

    #[must_use]
    pub const fn policy(&self) -> AuditPolicy {
        self.policy
    }

    #[must_use]
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }
}

/// Append one line per entry with a single write call
fn append_lines<'a>(path: &Path, entries: impl Iterator<Item = &'a AuditEntry>) -> Result<()> {
    let mut buf = String::new();
    for entry in entries {
        buf.push_str(&entry.to_string());
        buf.push('\n');
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(buf.as_bytes())?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use repometa_common::Operation;
    use std::time::Duration;
    use tempfile::TempDir;

    fn entry(query: &str) -> AuditEntry {
        AuditEntry::new(
            Operation::DiscoveryQuery,
            Utc::now(),
            Duration::from_millis(5),
            query,
            Some(200),
        )
    }

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn queries(logger: &AuditLogger) -> Vec<String> {
        logger
            .entries()
            .iter()
            .map(|e| e.query().to_string())
            .collect()
    }

    #[test]
    fn test_batch_flushes_full_buffer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");
        let logger = AuditLogger::new(2, Some(path.clone()), AuditPolicy::Batch);

        logger.add(entry("A")).unwrap();
        logger.add(entry("B")).unwrap();
        assert_eq!(queries(&logger), vec!["A", "B"]);
        assert!(!path.exists());

        logger.add(entry("C")).unwrap();
        assert_eq!(queries(&logger), vec!["C"]);

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("Query: A"));
        assert!(lines[1].ends_with("Query: B"));
    }

    #[test]
    fn test_batch_capacity_invariant() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");
        let max = 5;
        let logger = AuditLogger::new(max, Some(path.clone()), AuditPolicy::Batch);

        for i in 0..max + 3 {
            logger.add(entry(&format!("q{i}"))).unwrap();
            assert!(logger.len() <= max);
        }

        let lines = read_lines(&path);
        assert_eq!(lines.len(), max);
        for (i, line) in lines.iter().enumerate() {
            assert!(line.ends_with(&format!("Query: q{i}")));
        }
        assert_eq!(queries(&logger), vec!["q5", "q6", "q7"]);
    }

    #[test]
    fn test_write_on_add_is_durable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");
        let logger = AuditLogger::new(2, Some(path.clone()), AuditPolicy::WriteOnAdd);

        for query in ["A", "B", "C", "D"] {
            logger.add(entry(query)).unwrap();
            assert!(read_lines(&path).last().unwrap().ends_with(&format!("Query: {query}")));
        }

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 4);
        assert_eq!(queries(&logger), vec!["C", "D"]);

        // Already durable: an explicit write only empties the buffer
        logger.write().unwrap();
        assert!(logger.is_empty());
        let lines = read_lines(&path);
        assert_eq!(lines.len(), 4);
        for (line, query) in lines.iter().zip(["A", "B", "C", "D"]) {
            assert!(line.ends_with(&format!("Query: {query}")));
        }
    }

    #[test]
    fn test_write_flushes_and_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");
        std::fs::write(&path, "existing line\n").unwrap();
        let logger = AuditLogger::new(10, Some(path.clone()), AuditPolicy::Batch);

        logger.add(entry("A")).unwrap();
        logger.add(entry("B")).unwrap();
        logger.write().unwrap();

        assert!(logger.is_empty());
        let lines = read_lines(&path);
        assert_eq!(lines[0], "existing line");
        assert_eq!(lines.len(), 3);

        // Nothing buffered: nothing written
        logger.write().unwrap();
        assert_eq!(read_lines(&path).len(), 3);
    }

    #[test]
    fn test_write_without_file_is_noop() {
        let logger = AuditLogger::new(3, None, AuditPolicy::Batch);
        logger.add(entry("A")).unwrap();

        logger.write().unwrap();

        assert_eq!(logger.len(), 1);
    }

    #[test]
    fn test_batch_without_file_stays_bounded() {
        let logger = AuditLogger::new(2, None, AuditPolicy::Batch);
        for query in ["A", "B", "C"] {
            logger.add(entry(query)).unwrap();
        }
        assert_eq!(queries(&logger), vec!["C"]);
    }

    #[test]
    fn test_write_on_add_without_file_keeps_recent() {
        let logger = AuditLogger::new(2, None, AuditPolicy::WriteOnAdd);
        for query in ["A", "B", "C"] {
            logger.add(entry(query)).unwrap();
        }
        assert_eq!(queries(&logger), vec!["B", "C"]);
    }

    #[test]
    fn test_failed_flush_keeps_buffer() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be opened for appending
        let logger = AuditLogger::new(1, Some(dir.path().to_path_buf()), AuditPolicy::Batch);

        logger.add(entry("A")).unwrap();
        let err = logger.add(entry("B")).unwrap_err();

        assert!(err.is_io());
        assert_eq!(queries(&logger), vec!["A"]);
    }

    #[test]
    fn test_failed_write_on_add_leaves_buffer() {
        let dir = TempDir::new().unwrap();
        let logger = AuditLogger::new(2, Some(dir.path().to_path_buf()), AuditPolicy::WriteOnAdd);

        assert!(logger.add(entry("A")).is_err());
        assert!(logger.is_empty());
    }

    #[test]
    fn test_from_config() {
        let config = AuditConfig {
            max_entries: 0,
            file_path: None,
            write_on_add: true,
        };
        let logger = AuditLogger::from_config(&config);
        assert_eq!(logger.max_entries(), 1);
        assert_eq!(logger.policy(), AuditPolicy::WriteOnAdd);
        assert!(logger.file_path().is_none());

        let logger = AuditLogger::from_config(&AuditConfig::default());
        assert_eq!(logger.max_entries(), 50);
        assert_eq!(logger.policy(), AuditPolicy::Batch);
    }
}
