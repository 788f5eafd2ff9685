//! In-memory reference implementations of the external collaborators
//!
//! The concrete spreadsheet wire protocol is out of scope, so the binary and
//! the integration tests run against these. The sheet backend honors the
//! keyed-upsert contract (overwrite in place, append unknown keys) and can be
//! scripted to fail, which is how the failure-classification paths are
//! exercised.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

use crate::domain::{AccountSummary, ListingRecord, MessageRecord, OrderRecord};
use crate::infrastructure::backend::{
    BackendError, DomainDatastore, RowRange, SheetBackend, SheetRow,
};

/// Keyed-row sheet storage with scriptable failures.
#[derive(Default)]
pub struct InMemorySheetBackend {
    sheets: Mutex<HashMap<String, Vec<SheetRow>>>,
    scripted_failures: Mutex<VecDeque<BackendError>>,
}

impl InMemorySheetBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a failure to be returned by the next backend call.
    pub async fn push_failure(&self, error: BackendError) {
        self.scripted_failures.lock().await.push_back(error);
    }

    /// Current rows of a sheet, in storage order.
    pub async fn rows(&self, sheet_id: &str) -> Vec<SheetRow> {
        self.sheets
            .lock()
            .await
            .get(sheet_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn row_count(&self, sheet_id: &str) -> usize {
        self.sheets
            .lock()
            .await
            .get(sheet_id)
            .map_or(0, Vec::len)
    }

    async fn take_scripted_failure(&self) -> Option<BackendError> {
        self.scripted_failures.lock().await.pop_front()
    }
}

#[async_trait]
impl SheetBackend for InMemorySheetBackend {
    async fn read_rows(&self, sheet_id: &str, range: RowRange) -> Result<Vec<SheetRow>, BackendError> {
        if let Some(error) = self.take_scripted_failure().await {
            return Err(error);
        }
        let sheets = self.sheets.lock().await;
        let rows = sheets.get(sheet_id).cloned().unwrap_or_default();
        let start = (range.start.saturating_sub(1)) as usize;
        let end = range.end.map_or(rows.len(), |e| (e as usize).min(rows.len()));
        if start >= rows.len() {
            return Ok(Vec::new());
        }
        Ok(rows[start..end].to_vec())
    }

    async fn upsert_rows(&self, sheet_id: &str, rows: &[SheetRow]) -> Result<(), BackendError> {
        if let Some(error) = self.take_scripted_failure().await {
            return Err(error);
        }
        let mut sheets = self.sheets.lock().await;
        let stored = sheets.entry(sheet_id.to_string()).or_default();
        for row in rows {
            if let Some(existing) = stored.iter_mut().find(|r| r.key == row.key) {
                *existing = row.clone();
            } else {
                stored.push(row.clone());
            }
        }
        Ok(())
    }

    async fn create_sheet(&self, sheet_id: &str, _headers: &[&str]) -> Result<(), BackendError> {
        if let Some(error) = self.take_scripted_failure().await {
            return Err(error);
        }
        self.sheets
            .lock()
            .await
            .entry(sheet_id.to_string())
            .or_default();
        Ok(())
    }
}

/// Canned back-office data, keyed by account (orders/listings/messages) and
/// by assignee (staff workloads).
#[derive(Default)]
pub struct InMemoryDatastore {
    orders: Mutex<HashMap<u32, Vec<OrderRecord>>>,
    listings: Mutex<HashMap<u32, Vec<ListingRecord>>>,
    messages: Mutex<HashMap<u32, Vec<MessageRecord>>>,
    assigned: Mutex<HashMap<u32, Vec<OrderRecord>>>,
    summaries: Mutex<Vec<AccountSummary>>,
}

impl InMemoryDatastore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_orders(&self, account_id: u32, orders: Vec<OrderRecord>) {
        self.orders.lock().await.insert(account_id, orders);
    }

    pub async fn set_listings(&self, account_id: u32, listings: Vec<ListingRecord>) {
        self.listings.lock().await.insert(account_id, listings);
    }

    pub async fn set_messages(&self, account_id: u32, messages: Vec<MessageRecord>) {
        self.messages.lock().await.insert(account_id, messages);
    }

    pub async fn set_assigned_orders(&self, user_id: u32, orders: Vec<OrderRecord>) {
        self.assigned.lock().await.insert(user_id, orders);
    }

    pub async fn set_summaries(&self, summaries: Vec<AccountSummary>) {
        *self.summaries.lock().await = summaries;
    }
}

#[async_trait]
impl DomainDatastore for InMemoryDatastore {
    async fn fetch_orders(&self, account_id: u32) -> Result<Vec<OrderRecord>, BackendError> {
        Ok(self
            .orders
            .lock()
            .await
            .get(&account_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_listings(&self, account_id: u32) -> Result<Vec<ListingRecord>, BackendError> {
        Ok(self
            .listings
            .lock()
            .await
            .get(&account_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_messages(&self, account_id: u32) -> Result<Vec<MessageRecord>, BackendError> {
        Ok(self
            .messages
            .lock()
            .await
            .get(&account_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_assigned_orders(&self, user_id: u32) -> Result<Vec<OrderRecord>, BackendError> {
        Ok(self
            .assigned
            .lock()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_account_summaries(&self) -> Result<Vec<AccountSummary>, BackendError> {
        Ok(self.summaries.lock().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_overwrites_existing_keys_and_appends_new_ones() {
        let backend = InMemorySheetBackend::new();
        backend
            .upsert_rows(
                "sheet-1",
                &[
                    SheetRow::new("a", vec!["1".into()]),
                    SheetRow::new("b", vec!["2".into()]),
                ],
            )
            .await
            .unwrap();
        backend
            .upsert_rows(
                "sheet-1",
                &[
                    SheetRow::new("a", vec!["updated".into()]),
                    SheetRow::new("c", vec!["3".into()]),
                ],
            )
            .await
            .unwrap();

        let rows = backend.rows("sheet-1").await;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].cells, vec!["updated".to_string()]);
        assert_eq!(rows[2].key, "c");
    }

    #[tokio::test]
    async fn scripted_failure_fires_once_then_clears() {
        let backend = InMemorySheetBackend::new();
        backend
            .push_failure(BackendError::from_http_status(503, "unavailable"))
            .await;

        let err = backend
            .read_rows("sheet-1", RowRange::all())
            .await
            .unwrap_err();
        assert!(err.is_transient());

        assert!(backend.read_rows("sheet-1", RowRange::all()).await.is_ok());
    }
}
