//! Local SQLite backend.
//!
//! A connection is opened per operation; the schema is applied idempotently
//! on every open. Operations run on tokio's blocking pool. Switching the
//! active rate configuration runs in a single transaction.

use super::{validate_new_record, validate_rates, validate_update, RecordStore};
use crate::error::StoreError;
use crate::models::{NewShiftRecord, RateConfig, ShiftRecord, ShiftUpdate};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{named_params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

const SCHEMA_SQL: &str = include_str!("schema.sql");

const SELECT_SHIFTS: &str = r#"
    SELECT id, worker_name, date, shift, worker_kind, delivery_count, created_at
    FROM shift_records
"#;

const SELECT_RATES: &str = r#"
    SELECT id, daily_rate, per_delivery_rate, active, created_at
    FROM rate_configs
"#;

#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, StoreError> {
        let path = path.into();
        info!(db_path = %path.display(), "initializing record store");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Database(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }

        let store = Self { path };
        store.connection()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a synchronous store operation on the blocking pool.
    async fn blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| StoreError::Database(format!("database task failed: {}", e)))?
    }

    fn connection(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA_SQL)?;
        debug!(db_path = %self.path.display(), "database connection ready");
        Ok(conn)
    }

    fn insert(&self, record: NewShiftRecord) -> Result<ShiftRecord, StoreError> {
        let record = validate_new_record(record)?;
        let created_at = Utc::now();
        let conn = self.connection()?;

        conn.execute(
            r#"
                INSERT INTO shift_records
                    (worker_name, date, shift, worker_kind, delivery_count, created_at)
                VALUES
                    (:worker_name, :date, :shift, :worker_kind, :delivery_count, :created_at)
            "#,
            named_params! {
                ":worker_name": record.worker_name,
                ":date": record.date,
                ":shift": record.shift.as_str(),
                ":worker_kind": record.worker_kind.as_str(),
                ":delivery_count": record.delivery_count,
                ":created_at": created_at,
            },
        )?;

        let id = conn.last_insert_rowid();
        debug!(id, worker = %record.worker_name, "inserted shift record");

        Ok(ShiftRecord {
            id,
            worker_name: record.worker_name,
            date: record.date,
            shift: record.shift,
            worker_kind: record.worker_kind,
            delivery_count: record.delivery_count,
            created_at,
        })
    }

    fn get(&self, id: i64) -> Result<Option<ShiftRecord>, StoreError> {
        let conn = self.connection()?;
        fetch_shift(&conn, id)
    }

    fn list_for_date(&self, date: NaiveDate) -> Result<Vec<ShiftRecord>, StoreError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE date = ?1 ORDER BY created_at DESC, id DESC",
            SELECT_SHIFTS
        ))?;

        let rows = stmt
            .query_map([date], |row| ShiftRecord::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;

        debug!(%date, count = rows.len(), "listed shift records for date");
        Ok(rows)
    }

    fn list_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<ShiftRecord>, StoreError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE date >= :start AND date <= :end ORDER BY date ASC, created_at ASC, id ASC",
            SELECT_SHIFTS
        ))?;

        let rows = stmt
            .query_map(named_params! {":start": start, ":end": end}, |row| {
                ShiftRecord::try_from(row)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        debug!(%start, %end, count = rows.len(), "listed shift records in range");
        Ok(rows)
    }

    fn update(&self, id: i64, update: ShiftUpdate) -> Result<ShiftRecord, StoreError> {
        let update = validate_update(update)?;
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;

        let existing = fetch_shift(&tx, id)?.ok_or(StoreError::NotFound(id))?;
        if update.is_empty() {
            return Ok(existing);
        }

        let updated = update.apply_to(&existing);
        tx.execute(
            r#"
                UPDATE shift_records SET
                    worker_name = :worker_name,
                    date = :date,
                    shift = :shift,
                    worker_kind = :worker_kind,
                    delivery_count = :delivery_count
                WHERE id = :id
            "#,
            named_params! {
                ":worker_name": updated.worker_name,
                ":date": updated.date,
                ":shift": updated.shift.as_str(),
                ":worker_kind": updated.worker_kind.as_str(),
                ":delivery_count": updated.delivery_count,
                ":id": id,
            },
        )?;
        tx.commit()?;

        debug!(id, "updated shift record");
        Ok(updated)
    }

    fn delete(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.connection()?;
        let affected = conn.execute("DELETE FROM shift_records WHERE id = ?1", [id])?;
        if affected == 0 {
            return Err(StoreError::NotFound(id));
        }
        debug!(id, "deleted shift record");
        Ok(())
    }

    fn active_rates(&self) -> Result<Option<RateConfig>, StoreError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE active = 1 ORDER BY created_at DESC, id DESC LIMIT 1",
            SELECT_RATES
        ))?;

        let config = stmt.query_row([], |row| rate_from_row(row)).optional()?;
        Ok(config)
    }

    fn set_rates(&self, daily_rate: f64, per_delivery_rate: f64) -> Result<RateConfig, StoreError> {
        validate_rates(daily_rate, per_delivery_rate)?;
        let created_at = Utc::now();
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;

        let deactivated = tx.execute("UPDATE rate_configs SET active = 0 WHERE active = 1", [])?;
        tx.execute(
            r#"
                INSERT INTO rate_configs (daily_rate, per_delivery_rate, active, created_at)
                VALUES (:daily_rate, :per_delivery_rate, 1, :created_at)
            "#,
            named_params! {
                ":daily_rate": daily_rate,
                ":per_delivery_rate": per_delivery_rate,
                ":created_at": created_at,
            },
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        info!(id, deactivated, daily_rate, per_delivery_rate, "activated new rate configuration");

        Ok(RateConfig {
            id: Some(id),
            daily_rate,
            per_delivery_rate,
            active: true,
            created_at: Some(created_at),
        })
    }

    fn worker_names(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT worker_name FROM shift_records ORDER BY worker_name ASC")?;

        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(names)
    }
}

fn fetch_shift(conn: &Connection, id: i64) -> Result<Option<ShiftRecord>, StoreError> {
    let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", SELECT_SHIFTS))?;
    let row = stmt
        .query_row([id], |row| ShiftRecord::try_from(row))
        .optional()?;
    Ok(row)
}

impl TryFrom<&Row<'_>> for ShiftRecord {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            worker_name: row.get("worker_name")?,
            date: row.get("date")?,
            shift: label_column(row, "shift")?,
            worker_kind: label_column(row, "worker_kind")?,
            delivery_count: row.get("delivery_count")?,
            created_at: row.get("created_at")?,
        })
    }
}

fn rate_from_row(row: &Row<'_>) -> rusqlite::Result<RateConfig> {
    Ok(RateConfig {
        id: Some(row.get("id")?),
        daily_rate: row.get("daily_rate")?,
        per_delivery_rate: row.get("per_delivery_rate")?,
        active: row.get("active")?,
        created_at: Some(row.get("created_at")?),
    })
}

/// Read a text column holding one of the model's enum labels.
fn label_column<T>(row: &Row<'_>, name: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(name)?;
    raw.parse::<T>().map_err(|message| {
        let index = row.as_ref().column_index(name).unwrap_or_default();
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, message.into())
    })
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn insert_shift_record(&self, record: NewShiftRecord) -> Result<ShiftRecord, StoreError> {
        self.blocking(move |store| store.insert(record)).await
    }

    async fn get_shift_record(&self, id: i64) -> Result<Option<ShiftRecord>, StoreError> {
        self.blocking(move |store| store.get(id)).await
    }

    async fn list_shift_records_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<ShiftRecord>, StoreError> {
        self.blocking(move |store| store.list_for_date(date)).await
    }

    async fn list_shift_records_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ShiftRecord>, StoreError> {
        self.blocking(move |store| store.list_in_range(start, end)).await
    }

    async fn update_shift_record(
        &self,
        id: i64,
        update: ShiftUpdate,
    ) -> Result<ShiftRecord, StoreError> {
        self.blocking(move |store| store.update(id, update)).await
    }

    async fn delete_shift_record(&self, id: i64) -> Result<(), StoreError> {
        self.blocking(move |store| store.delete(id)).await
    }

    async fn get_active_rate_config(&self) -> Result<Option<RateConfig>, StoreError> {
        self.blocking(|store| store.active_rates()).await
    }

    async fn set_active_rate_config(
        &self,
        daily_rate: f64,
        per_delivery_rate: f64,
    ) -> Result<RateConfig, StoreError> {
        self.blocking(move |store| store.set_rates(daily_rate, per_delivery_rate))
            .await
    }

    async fn list_distinct_worker_names(&self) -> Result<Vec<String>, StoreError> {
        self.blocking(|store| store.worker_names()).await
    }
}
