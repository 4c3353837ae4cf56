//! Tracking of individual fetch operations ("processes").
//!
//! Every upstream fetch started by a controller is registered here under a
//! fresh [`ProcessId`]. Callers that triggered a refresh can poll its outcome
//! by id, and in-process waiters can subscribe to completion.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use liquid_core::{FetchError, ProcessId, ResourceKey, Timestamp};
use serde::{Serialize, Serializer};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::CacheConfig;

// ============================================================================
// STATUS
// ============================================================================

/// Observable state of a fetch operation.
///
/// Serialized as `{"status": "Pending" | "Succeeded" | "Failed" | "Unknown",
/// "data"?: ..., "error"?: "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "status")]
pub enum ProcessStatus {
    Pending,
    Succeeded {
        #[serde(skip_serializing_if = "Option::is_none")]
        #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
        data: Option<serde_json::Value>,
    },
    Failed {
        #[serde(serialize_with = "serialize_error_message")]
        #[cfg_attr(feature = "openapi", schema(value_type = String))]
        error: FetchError,
    },
    /// The id is not tracked: never issued, malformed, or expired.
    Unknown,
}

fn serialize_error_message<S: Serializer>(error: &FetchError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(error)
}

impl ProcessStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Failed { error } => Some(error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Succeeded { .. } => "Succeeded",
            Self::Failed { .. } => "Failed",
            Self::Unknown => "Unknown",
        }
    }
}

/// Point-in-time view of a tracked process.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProcessView {
    pub process_id: ProcessId,
    pub resource: ResourceKey,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub started_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub finished_at: Option<Timestamp>,
    #[serde(flatten)]
    pub status: ProcessStatus,
}

// ============================================================================
// TRACKER
// ============================================================================

struct ProcessRecord {
    resource: ResourceKey,
    started_at: Timestamp,
    finished_at: Option<Timestamp>,
    /// Monotonic completion time, drives retention.
    finished: Option<Instant>,
    status: watch::Sender<ProcessStatus>,
}

impl ProcessRecord {
    fn is_expired(&self, now: Instant, retention: Duration) -> bool {
        self.finished
            .map(|finished| now.saturating_duration_since(finished) >= retention)
            .unwrap_or(false)
    }

    fn view(&self, process_id: ProcessId) -> ProcessView {
        ProcessView {
            process_id,
            resource: self.resource.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
            status: self.status.borrow().clone(),
        }
    }
}

struct TrackerInner {
    records: DashMap<ProcessId, ProcessRecord>,
    retention: Duration,
    max_records: usize,
}

/// Registry of fetch operations, shared by every controller of a cache.
#[derive(Clone)]
pub struct ProcessTracker {
    inner: Arc<TrackerInner>,
}

impl ProcessTracker {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                records: DashMap::new(),
                retention: config.process_retention,
                max_records: config.max_tracked_processes,
            }),
        }
    }

    /// Register a new pending process and return a receiver for its status.
    pub(crate) fn start(&self, id: ProcessId, resource: ResourceKey) -> watch::Receiver<ProcessStatus> {
        self.prune();
        let (tx, rx) = watch::channel(ProcessStatus::Pending);
        self.inner.records.insert(
            id,
            ProcessRecord {
                resource,
                started_at: Utc::now(),
                finished_at: None,
                finished: None,
                status: tx,
            },
        );
        rx
    }

    /// Record the outcome of a process and wake its waiters.
    pub(crate) fn complete(&self, id: ProcessId, status: ProcessStatus) {
        if let Some(mut record) = self.inner.records.get_mut(&id) {
            record.finished_at = Some(Utc::now());
            record.finished = Some(Instant::now());
            record.status.send_replace(status);
        } else {
            tracing::warn!(process_id = %id, "Completed a process that is no longer tracked");
        }
    }

    /// Current status of a process. Never fails: untracked ids are `Unknown`.
    pub fn status(&self, id: ProcessId) -> ProcessStatus {
        self.lookup(id)
            .map(|view| view.status)
            .unwrap_or(ProcessStatus::Unknown)
    }

    /// Status lookup from a raw id string, as received over HTTP.
    pub fn status_str(&self, raw: &str) -> ProcessStatus {
        raw.parse::<ProcessId>()
            .map(|id| self.status(id))
            .unwrap_or(ProcessStatus::Unknown)
    }

    /// Full view of a tracked process, or `None` when it is unknown or expired.
    pub fn lookup(&self, id: ProcessId) -> Option<ProcessView> {
        let now = Instant::now();
        let retention = self.inner.retention;
        if self
            .inner
            .records
            .remove_if(&id, |_, record| record.is_expired(now, retention))
            .is_some()
        {
            return None;
        }
        self.inner.records.get(&id).map(|record| record.view(id))
    }

    /// Subscribe to status changes of a tracked process.
    pub fn subscribe(&self, id: ProcessId) -> Option<watch::Receiver<ProcessStatus>> {
        self.inner
            .records
            .get(&id)
            .map(|record| record.status.subscribe())
    }

    /// Wait until a process finishes and return its final status.
    ///
    /// Returns `Unknown` immediately for untracked ids.
    pub async fn wait(&self, id: ProcessId) -> ProcessStatus {
        match self.subscribe(id) {
            Some(receiver) => wait_finished(receiver).await,
            None => ProcessStatus::Unknown,
        }
    }

    /// Number of records currently held, pending ones included.
    pub fn len(&self) -> usize {
        self.inner.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.records.is_empty()
    }

    /// Drop expired records, then the oldest finished ones over the cap.
    pub fn prune(&self) {
        let now = Instant::now();
        let retention = self.inner.retention;
        self.inner
            .records
            .retain(|_, record| !record.is_expired(now, retention));

        let excess = self.inner.records.len().saturating_sub(self.inner.max_records);
        if excess == 0 {
            return;
        }

        // UUIDv7 ids sort by start time.
        let mut finished: Vec<ProcessId> = self
            .inner
            .records
            .iter()
            .filter(|record| record.finished.is_some())
            .map(|record| *record.key())
            .collect();
        finished.sort_unstable();
        for id in finished.into_iter().take(excess) {
            self.inner.records.remove(&id);
        }
    }
}

impl std::fmt::Debug for ProcessTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessTracker")
            .field("records", &self.inner.records.len())
            .field("retention", &self.inner.retention)
            .field("max_records", &self.inner.max_records)
            .finish()
    }
}

/// Resolve once the watched process leaves `Pending`.
pub(crate) async fn wait_finished(mut receiver: watch::Receiver<ProcessStatus>) -> ProcessStatus {
    let result = receiver
        .wait_for(|status| !status.is_pending())
        .await
        .map(|status| status.clone());
    match result {
        Ok(status) => status,
        // Sender dropped while pending: the record was discarded.
        Err(_) => ProcessStatus::Unknown,
    }
}
