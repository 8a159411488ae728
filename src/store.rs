//! Booking record gateway
//!
//! The dialogue runtime talks to the remote table only through
//! [`BookingStore`]. Calls are never retried and never rolled back.

mod error;
mod supabase;
pub mod types;

pub use error::StoreError;
pub use supabase::SupabaseStore;
pub use types::*;

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

/// CRUD over the bookings table
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert a booking and return the stored row
    async fn insert(&self, booking: &NewBooking) -> Result<BookingRecord, StoreError>;

    async fn query(&self, query: &RecordQuery) -> Result<Vec<BookingRecord>, StoreError>;

    /// Patch one record; `None` if it no longer exists
    async fn update(
        &self,
        id: &RecordId,
        patch: &RecordPatch,
    ) -> Result<Option<BookingRecord>, StoreError>;

    /// Delete one record; `false` if it no longer exists
    async fn delete(&self, id: &RecordId) -> Result<bool, StoreError>;

    /// Number of rows matching the filters (order and limit are ignored)
    async fn count(&self, query: &RecordQuery) -> Result<u64, StoreError>;
}

#[async_trait]
impl<T: BookingStore + ?Sized> BookingStore for Arc<T> {
    async fn insert(&self, booking: &NewBooking) -> Result<BookingRecord, StoreError> {
        (**self).insert(booking).await
    }

    async fn query(&self, query: &RecordQuery) -> Result<Vec<BookingRecord>, StoreError> {
        (**self).query(query).await
    }

    async fn update(
        &self,
        id: &RecordId,
        patch: &RecordPatch,
    ) -> Result<Option<BookingRecord>, StoreError> {
        (**self).update(id, patch).await
    }

    async fn delete(&self, id: &RecordId) -> Result<bool, StoreError> {
        (**self).delete(id).await
    }

    async fn count(&self, query: &RecordQuery) -> Result<u64, StoreError> {
        (**self).count(query).await
    }
}

/// Fetch a single record by exact id
pub async fn fetch<S: BookingStore + ?Sized>(
    store: &S,
    id: &RecordId,
) -> Result<Option<BookingRecord>, StoreError> {
    let query = RecordQuery::all().eq(Column::Id, id.as_str()).limit(1);
    Ok(store.query(&query).await?.into_iter().next())
}

/// Resolve a typed id prefix.
///
/// Scans oldest first; the first record whose id starts with the prefix wins.
pub async fn find_by_id_prefix<S: BookingStore + ?Sized>(
    store: &S,
    prefix: &str,
) -> Result<Option<BookingRecord>, StoreError> {
    let prefix = prefix.trim().to_lowercase();
    if prefix.is_empty() {
        return Ok(None);
    }
    let query = RecordQuery::all().order_by(Column::CreatedAt, false);
    Ok(store
        .query(&query)
        .await?
        .into_iter()
        .find(|record| record.id.as_str().to_lowercase().starts_with(&prefix)))
}

/// Counts by status plus bookings dated `today`
pub async fn load_stats<S: BookingStore + ?Sized>(
    store: &S,
    today: NaiveDate,
) -> Result<BookingStats, StoreError> {
    let by_status = |status: BookingStatus| RecordQuery::all().eq(Column::Status, status.as_str());
    Ok(BookingStats {
        pending: store.count(&by_status(BookingStatus::Pending)).await?,
        confirmed: store.count(&by_status(BookingStatus::Confirmed)).await?,
        cancelled: store.count(&by_status(BookingStatus::Cancelled)).await?,
        today: store
            .count(&RecordQuery::all().eq(Column::Date, crate::validation::format_date(today)))
            .await?,
    })
}

/// Logging wrapper for record stores
pub struct LoggingStore<S> {
    inner: S,
}

impl<S: BookingStore> LoggingStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    fn record<T>(operation: &str, started: std::time::Instant, result: &Result<T, StoreError>) {
        let duration = started.elapsed();
        match result {
            Ok(_) => {
                tracing::debug!(
                    operation,
                    duration_ms = %duration.as_millis(),
                    "Store call completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    operation,
                    duration_ms = %duration.as_millis(),
                    kind = e.kind(),
                    error = %e,
                    "Store call failed"
                );
            }
        }
    }
}

#[async_trait]
impl<S: BookingStore> BookingStore for LoggingStore<S> {
    async fn insert(&self, booking: &NewBooking) -> Result<BookingRecord, StoreError> {
        let start = std::time::Instant::now();
        let result = self.inner.insert(booking).await;
        Self::record("insert", start, &result);
        if let Ok(record) = &result {
            tracing::info!(record_id = %record.id, service = %record.service, "Booking stored");
        }
        result
    }

    async fn query(&self, query: &RecordQuery) -> Result<Vec<BookingRecord>, StoreError> {
        let start = std::time::Instant::now();
        let result = self.inner.query(query).await;
        Self::record("query", start, &result);
        result
    }

    async fn update(
        &self,
        id: &RecordId,
        patch: &RecordPatch,
    ) -> Result<Option<BookingRecord>, StoreError> {
        let start = std::time::Instant::now();
        let result = self.inner.update(id, patch).await;
        Self::record("update", start, &result);
        if let Ok(updated) = &result {
            tracing::info!(record_id = %id, ?patch, found = updated.is_some(), "Booking updated");
        }
        result
    }

    async fn delete(&self, id: &RecordId) -> Result<bool, StoreError> {
        let start = std::time::Instant::now();
        let result = self.inner.delete(id).await;
        Self::record("delete", start, &result);
        if let Ok(existed) = &result {
            tracing::info!(record_id = %id, existed, "Booking deleted");
        }
        result
    }

    async fn count(&self, query: &RecordQuery) -> Result<u64, StoreError> {
        let start = std::time::Instant::now();
        let result = self.inner.count(query).await;
        Self::record("count", start, &result);
        result
    }
}
