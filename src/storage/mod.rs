//! In-memory, bounded measurement history.
//!
//! Records live for the process lifetime only. Readers always receive
//! copies, so they never hold the lock across an in-flight append.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::access::Role;
use crate::throughput::MeasurementResult;

/// Number of retained records.
pub const HISTORY_CAPACITY: usize = 50;

/// One successful measurement and the role that requested it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub result: MeasurementResult,
    pub role_of_requester: Role,
}

/// Append-only, FIFO-evicting history log. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    records: Arc<RwLock<VecDeque<HistoryRecord>>>,
    capacity: usize,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a record, evicting the oldest ones beyond capacity.
    pub async fn append(&self, record: HistoryRecord) {
        let mut records = self.records.write().await;
        records.push_back(record);
        while records.len() > self.capacity {
            records.pop_front();
        }
    }

    /// Drop every record, returning how many were removed.
    ///
    /// Callers must have checked the clear-history capability.
    pub(crate) async fn clear(&self) -> usize {
        let mut records = self.records.write().await;
        let removed = records.len();
        records.clear();
        removed
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Records completed at or after `since`, oldest first.
    pub async fn window(&self, since: DateTime<Utc>) -> Vec<HistoryRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.result.completed_at >= since)
            .cloned()
            .collect()
    }

    /// The last `min(n, len)` records, oldest first.
    pub async fn tail(&self, n: usize) -> Vec<HistoryRecord> {
        let records = self.records.read().await;
        let skip = records.len().saturating_sub(n);
        records.iter().skip(skip).cloned().collect()
    }

    /// Full copy of the log, oldest first.
    pub async fn export(&self) -> Vec<HistoryRecord> {
        self.records.read().await.iter().cloned().collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn record(download: f64, completed_at: DateTime<Utc>) -> HistoryRecord {
        HistoryRecord {
            result: MeasurementResult {
                download_mbps: download,
                upload_mbps: 5.0,
                ping_ms: 20.0,
                server_label: "test".to_string(),
                completed_at,
            },
            role_of_requester: Role::HomeUser,
        }
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest_first() {
        let store = HistoryStore::default();
        let now = Utc::now();
        for i in 0..60 {
            store.append(record(i as f64, now)).await;
        }

        let all = store.export().await;
        assert_eq!(all.len(), 50);
        assert_eq!(all.first().unwrap().result.download_mbps, 10.0);
        assert_eq!(all.last().unwrap().result.download_mbps, 59.0);
    }

    #[tokio::test]
    async fn test_tail_returns_most_recent_oldest_first() {
        let store = HistoryStore::new(50);
        let now = Utc::now();
        for i in 0..4 {
            store.append(record(i as f64, now)).await;
        }

        let last_two: Vec<f64> = store
            .tail(2)
            .await
            .iter()
            .map(|r| r.result.download_mbps)
            .collect();
        assert_eq!(last_two, vec![2.0, 3.0]);
        assert_eq!(store.tail(10).await.len(), 4);
        assert!(store.tail(0).await.is_empty());
    }

    #[tokio::test]
    async fn test_window_filters_by_completion_time() {
        let store = HistoryStore::new(50);
        let now = Utc::now();
        store.append(record(1.0, now - Duration::days(10))).await;
        store.append(record(2.0, now - Duration::days(3))).await;
        store.append(record(3.0, now)).await;

        let recent = store.window(now - Duration::days(7)).await;
        let values: Vec<f64> = recent.iter().map(|r| r.result.download_mbps).collect();
        assert_eq!(values, vec![2.0, 3.0]);

        // Boundary is inclusive.
        assert_eq!(store.window(now).await.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_empties_store() {
        let store = HistoryStore::new(50);
        store.append(record(1.0, Utc::now())).await;
        store.append(record(2.0, Utc::now())).await;

        assert_eq!(store.clear().await, 2);
        assert!(store.is_empty().await);
        assert_eq!(store.clear().await, 0);
    }

    #[tokio::test]
    async fn test_zero_capacity_retains_nothing() {
        let store = HistoryStore::new(0);
        store.append(record(1.0, Utc::now())).await;
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_export_is_a_detached_copy() {
        let store = HistoryStore::new(50);
        store.append(record(1.0, Utc::now())).await;
        let snapshot = store.export().await;
        store.append(record(2.0, Utc::now())).await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len().await, 2);
    }
}
