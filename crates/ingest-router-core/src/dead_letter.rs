//! Dead-letter stores.
//!
//! Stores are append-only and keyed by event id. Each (event, rule) chain is
//! written at most once; nothing is ever removed. A record whose event has no
//! id cannot name its chain, so it is always written.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

use ingest_router_model::DeadLetterRecord;

use crate::error::{RouterError, RouterResult};

/// Destination for dead-lettered chains.
#[async_trait]
pub trait DeadLetterSink: Send + Sync + fmt::Debug {
    /// Append `record` unless its chain is already stored.
    ///
    /// Returns whether the record was written.
    async fn append(&self, record: DeadLetterRecord) -> RouterResult<bool>;

    /// Whether the (event, rule) chain is already stored.
    async fn contains(&self, event_id: &str, rule_id: &str) -> bool;

    /// Records of one event, in write order.
    async fn for_event(&self, event_id: &str) -> RouterResult<Vec<DeadLetterRecord>>;
}

/// Dead-letter store held in memory.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use ingest_router_core::dead_letter::{DeadLetterSink, InMemoryDeadLetterStore};
/// use ingest_router_model::{BackendKind, DeadLetterCause, DeadLetterRecord, IngestionEvent, RoutingRule};
///
/// # tokio_test::block_on(async {
/// let store = InMemoryDeadLetterStore::new();
/// let record = DeadLetterRecord {
///     original_event: IngestionEvent::new("lz", "batch/a.txt", 1, Utc::now(), "e1"),
///     rule: RoutingRule::new("r1", BackendKind::HeavyCompute, "queue"),
///     failure_reason: "backend throttled".to_owned(),
///     cause: DeadLetterCause::RetryExhausted,
///     attempts_made: 2,
///     last_attempt_at: Utc::now(),
/// };
/// assert!(store.append(record.clone()).await.unwrap());
/// assert!(!store.append(record).await.unwrap());
/// assert!(store.contains("e1", "r1").await);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct InMemoryDeadLetterStore {
    by_event: DashMap<String, Vec<DeadLetterRecord>>,
}

impl InMemoryDeadLetterStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored record, oldest attempt first.
    #[must_use]
    pub fn records(&self) -> Vec<DeadLetterRecord> {
        let mut all: Vec<_> = self
            .by_event
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect();
        all.sort_by_key(|r| r.last_attempt_at);
        all
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_event.iter().map(|entry| entry.value().len()).sum()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DeadLetterSink for InMemoryDeadLetterStore {
    async fn append(&self, record: DeadLetterRecord) -> RouterResult<bool> {
        let mut entry = self
            .by_event
            .entry(record.original_event.event_id.clone())
            .or_default();
        if is_keyed(&record) && entry.iter().any(|r| r.rule.id == record.rule.id) {
            return Ok(false);
        }
        entry.push(record);
        Ok(true)
    }

    async fn contains(&self, event_id: &str, rule_id: &str) -> bool {
        !event_id.is_empty()
            && self
                .by_event
                .get(event_id)
                .is_some_and(|records| records.iter().any(|r| r.rule.id == rule_id))
    }

    async fn for_event(&self, event_id: &str) -> RouterResult<Vec<DeadLetterRecord>> {
        Ok(self
            .by_event
            .get(event_id)
            .map(|records| records.value().clone())
            .unwrap_or_default())
    }
}

/// Dead-letter store backed by a JSON-lines file.
///
/// One record per line. Chains already present in the file when it is opened
/// are not written again.
pub struct FileDeadLetterStore {
    path: PathBuf,
    file: Mutex<tokio::fs::File>,
    chains: DashSet<(String, String)>,
}

impl fmt::Debug for FileDeadLetterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileDeadLetterStore")
            .field("path", &self.path)
            .field("chains", &self.chains.len())
            .finish_non_exhaustive()
    }
}

impl FileDeadLetterStore {
    /// Open (or create) the store at `path`.
    pub async fn open(path: impl AsRef<Path>) -> RouterResult<Self> {
        let path = path.as_ref().to_path_buf();
        let existing = read_records(&path).await?;
        let chains = DashSet::new();
        for record in &existing {
            chains.insert(chain_key(record));
        }

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| io_error(&path, source))?;

        info!(path = %path.display(), records = existing.len(), "dead-letter file opened");
        Ok(Self {
            path,
            file: Mutex::new(file),
            chains,
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record in the file, in write order.
    pub async fn records(&self) -> RouterResult<Vec<DeadLetterRecord>> {
        read_records(&self.path).await
    }
}

#[async_trait]
impl DeadLetterSink for FileDeadLetterStore {
    async fn append(&self, record: DeadLetterRecord) -> RouterResult<bool> {
        let key = chain_key(&record);
        let mut file = self.file.lock().await;
        if is_keyed(&record) && self.chains.contains(&key) {
            return Ok(false);
        }

        let mut line = serde_json::to_vec(&record)
            .map_err(|e| RouterError::DeadLetter(format!("failed to encode record: {e}")))?;
        line.push(b'\n');
        file.write_all(&line)
            .await
            .map_err(|source| io_error(&self.path, source))?;
        file.flush()
            .await
            .map_err(|source| io_error(&self.path, source))?;

        self.chains.insert(key);
        Ok(true)
    }

    async fn contains(&self, event_id: &str, rule_id: &str) -> bool {
        !event_id.is_empty()
            && self
                .chains
                .contains(&(event_id.to_owned(), rule_id.to_owned()))
    }

    async fn for_event(&self, event_id: &str) -> RouterResult<Vec<DeadLetterRecord>> {
        let mut records = self.records().await?;
        records.retain(|r| r.original_event.event_id == event_id);
        Ok(records)
    }
}

fn is_keyed(record: &DeadLetterRecord) -> bool {
    !record.original_event.event_id.is_empty()
}

fn chain_key(record: &DeadLetterRecord) -> (String, String) {
    let (event_id, rule_id) = record.chain_key();
    (event_id.to_owned(), rule_id.to_owned())
}

fn io_error(path: &Path, source: std::io::Error) -> RouterError {
    RouterError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Parse a JSON-lines file; a missing file holds no records.
async fn read_records(path: &Path) -> RouterResult<Vec<DeadLetterRecord>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(io_error(path, source)),
    };

    let mut records = Vec::new();
    for (index, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<DeadLetterRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => warn!(
                path = %path.display(),
                line = index + 1,
                error = %e,
                "skipping unreadable dead-letter line",
            ),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use ingest_router_model::{BackendKind, DeadLetterCause, IngestionEvent, RoutingRule};

    use super::*;
    use crate::testing::t0;

    fn record(event_id: &str, rule_id: &str) -> DeadLetterRecord {
        DeadLetterRecord {
            original_event: IngestionEvent::new("lz", "batch/config.txt", 10, t0(), event_id),
            rule: RoutingRule::new(rule_id, BackendKind::HeavyCompute, "gpu"),
            failure_reason: "backend throttled: queue full".into(),
            cause: DeadLetterCause::RetryExhausted,
            attempts_made: 2,
            last_attempt_at: t0(),
        }
    }

    #[tokio::test]
    async fn test_should_append_once_per_chain() {
        let store = InMemoryDeadLetterStore::new();
        assert!(store.append(record("e1", "r1")).await.unwrap());
        assert!(!store.append(record("e1", "r1")).await.unwrap());
        assert!(store.append(record("e1", "r2")).await.unwrap());
        assert_eq!(store.len(), 2);
        assert!(store.contains("e1", "r2").await);
        assert!(!store.contains("e2", "r1").await);
        assert_eq!(store.for_event("e1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_should_keep_every_record_without_event_id() {
        let store = InMemoryDeadLetterStore::new();
        assert!(store.append(record("", "r1")).await.unwrap());
        assert!(store.append(record("", "r1")).await.unwrap());
        assert_eq!(store.len(), 2);
        assert!(!store.contains("", "r1").await);

        let dir = tempfile::tempdir().unwrap();
        let file = FileDeadLetterStore::open(dir.path().join("dlq.jsonl")).await.unwrap();
        assert!(file.append(record("", "r1")).await.unwrap());
        assert!(file.append(record("", "r1")).await.unwrap());
        assert_eq!(file.records().await.unwrap().len(), 2);
        assert!(!file.contains("", "r1").await);
    }

    #[tokio::test]
    async fn test_should_persist_records_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dead-letters.jsonl");

        let store = FileDeadLetterStore::open(&path).await.unwrap();
        assert!(store.append(record("e1", "r1")).await.unwrap());
        assert!(store.append(record("e2", "r1")).await.unwrap());
        assert!(!store.append(record("e1", "r1")).await.unwrap());

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
        let first: serde_json::Value = serde_json::from_str(raw.lines().next().unwrap()).unwrap();
        assert_eq!(first["originalEvent"]["key"], "batch/config.txt");
        assert_eq!(first["attemptsMade"], 2);
        assert_eq!(first["cause"], "retryExhausted");
    }

    #[tokio::test]
    async fn test_should_remember_chains_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dlq.jsonl");
        {
            let store = FileDeadLetterStore::open(&path).await.unwrap();
            store.append(record("e1", "r1")).await.unwrap();
        }

        let reopened = FileDeadLetterStore::open(&path).await.unwrap();
        assert!(reopened.contains("e1", "r1").await);
        assert!(!reopened.append(record("e1", "r1")).await.unwrap());
        assert_eq!(reopened.records().await.unwrap().len(), 1);
        assert_eq!(reopened.for_event("e1").await.unwrap()[0], record("e1", "r1"));
    }

    #[tokio::test]
    async fn test_should_skip_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dlq.jsonl");
        let good = serde_json::to_string(&record("e1", "r1")).unwrap();
        std::fs::write(&path, format!("{good}\nnot json\n\n")).unwrap();

        let store = FileDeadLetterStore::open(&path).await.unwrap();
        assert_eq!(store.records().await.unwrap().len(), 1);
        assert!(store.contains("e1", "r1").await);
    }
}
