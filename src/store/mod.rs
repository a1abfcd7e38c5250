//! Persistence of shift records and rate configurations.
//!
//! [`RecordStore`] is the narrow contract the rest of the crate depends on.
//! Two backends implement it: a local SQLite file and the hosted PostgREST
//! (Supabase) table API.

pub mod sqlite;
pub mod supabase;

pub use sqlite::SqliteStore;
pub use supabase::SupabaseStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::StoreError;
use crate::models::{NewShiftRecord, RateConfig, ShiftRecord, ShiftUpdate};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;

/// Table holding one row per reported shift.
pub const SHIFT_RECORDS_TABLE: &str = "shift_records";
/// Table holding every rate configuration ever saved; one row is active.
pub const RATE_CONFIGS_TABLE: &str = "rate_configs";

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a new record; the store assigns `id` and `created_at`.
    async fn insert_shift_record(&self, record: NewShiftRecord) -> Result<ShiftRecord, StoreError>;

    async fn get_shift_record(&self, id: i64) -> Result<Option<ShiftRecord>, StoreError>;

    /// Records of one date, newest first.
    async fn list_shift_records_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<ShiftRecord>, StoreError>;

    /// Records with `start <= date <= end`, oldest date first.
    async fn list_shift_records_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ShiftRecord>, StoreError>;

    /// Apply `update` to record `id` and return the stored result.
    async fn update_shift_record(
        &self,
        id: i64,
        update: ShiftUpdate,
    ) -> Result<ShiftRecord, StoreError>;

    async fn delete_shift_record(&self, id: i64) -> Result<(), StoreError>;

    /// The most recently created active configuration, if any.
    async fn get_active_rate_config(&self) -> Result<Option<RateConfig>, StoreError>;

    /// Make a new configuration the only active one.
    ///
    /// Readers never observe a moment without an active configuration.
    async fn set_active_rate_config(
        &self,
        daily_rate: f64,
        per_delivery_rate: f64,
    ) -> Result<RateConfig, StoreError>;

    /// Every worker name seen so far, sorted ascending.
    async fn list_distinct_worker_names(&self) -> Result<Vec<String>, StoreError>;
}

/// Build the backend selected in the configuration.
pub fn open(config: &StoreConfig) -> Result<Arc<dyn RecordStore>> {
    match config.backend {
        StoreBackend::Sqlite => {
            let store = SqliteStore::open(&config.sqlite_path).with_context(|| {
                format!("Failed to open database {}", config.sqlite_path.display())
            })?;
            info!("Using SQLite record store at {}", store.path().display());
            Ok(Arc::new(store))
        }
        StoreBackend::Supabase => {
            let url = config.supabase_url()?;
            let key = config.supabase_key()?;
            info!("Using remote record store at {}", url);
            let store = SupabaseStore::new(url, key, config.timeout_seconds)
                .context("Failed to create record store client")?;
            Ok(Arc::new(store))
        }
    }
}

/// Trim the worker name and reject empty ones.
pub(crate) fn validate_new_record(mut record: NewShiftRecord) -> Result<NewShiftRecord, StoreError> {
    record.worker_name = validate_worker_name(&record.worker_name)?;
    Ok(record)
}

pub(crate) fn validate_update(mut update: ShiftUpdate) -> Result<ShiftUpdate, StoreError> {
    if let Some(name) = update.worker_name.as_deref() {
        update.worker_name = Some(validate_worker_name(name)?);
    }
    Ok(update)
}

fn validate_worker_name(name: &str) -> Result<String, StoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StoreError::validation("worker name must not be empty"));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn validate_rates(daily_rate: f64, per_delivery_rate: f64) -> Result<(), StoreError> {
    for (label, value) in [("daily rate", daily_rate), ("per-delivery rate", per_delivery_rate)] {
        if !value.is_finite() || value < 0.0 {
            return Err(StoreError::validation(format!(
                "{} must be a non-negative amount, got {}",
                label, value
            )));
        }
    }
    Ok(())
}
