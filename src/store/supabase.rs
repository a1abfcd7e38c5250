//! Hosted PostgREST (Supabase) backend.
//!
//! Rate configurations form an append-only log: a new configuration is
//! inserted active and readers always take the most recent active row, so
//! there is no window without an active configuration. Older rows are
//! deactivated afterwards as housekeeping.

use super::{
    validate_new_record, validate_rates, validate_update, RecordStore, RATE_CONFIGS_TABLE,
    SHIFT_RECORDS_TABLE,
};
use crate::error::StoreError;
use crate::models::{NewShiftRecord, RateConfig, ShiftRecord, ShiftUpdate};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct SupabaseStore {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct WorkerNameRow {
    worker_name: String,
}

impl SupabaseStore {
    pub fn new(base_url: &str, api_key: &str, timeout_seconds: u64) -> Result<Self, StoreError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        self.http_client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Send a request and fail on a non-success status. The body is left unread,
    /// so `204 No Content` answers are fine.
    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::api(status, body));
        }

        Ok(response)
    }

    /// Send a request and decode the JSON array PostgREST answers with.
    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Vec<T>, StoreError> {
        self.send(request)
            .await?
            .json::<Vec<T>>()
            .await
            .map_err(|e| StoreError::decode(e.to_string()))
    }

    fn first<T>(rows: Vec<T>, what: &str) -> Result<T, StoreError> {
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::decode(format!("no {} returned", what)))
    }
}

#[async_trait]
impl RecordStore for SupabaseStore {
    async fn insert_shift_record(&self, record: NewShiftRecord) -> Result<ShiftRecord, StoreError> {
        let record = validate_new_record(record)?;
        let body = json!({
            "worker_name": record.worker_name,
            "date": record.date,
            "shift": record.shift,
            "worker_kind": record.worker_kind,
            "delivery_count": record.delivery_count,
            "created_at": Utc::now(),
        });

        let request = self
            .request(Method::POST, SHIFT_RECORDS_TABLE)
            .header("Prefer", "return=representation")
            .json(&body);
        let inserted = Self::first(self.fetch::<ShiftRecord>(request).await?, "inserted record")?;

        debug!(id = inserted.id, worker = %inserted.worker_name, "inserted shift record");
        Ok(inserted)
    }

    async fn get_shift_record(&self, id: i64) -> Result<Option<ShiftRecord>, StoreError> {
        let request = self
            .request(Method::GET, SHIFT_RECORDS_TABLE)
            .query(&[("select", "*".to_string()), ("id", format!("eq.{}", id))]);

        Ok(self.fetch::<ShiftRecord>(request).await?.into_iter().next())
    }

    async fn list_shift_records_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<ShiftRecord>, StoreError> {
        let request = self.request(Method::GET, SHIFT_RECORDS_TABLE).query(&[
            ("select", "*".to_string()),
            ("date", format!("eq.{}", date)),
            ("order", "created_at.desc,id.desc".to_string()),
        ]);

        let rows = self.fetch::<ShiftRecord>(request).await?;
        debug!(%date, count = rows.len(), "listed shift records for date");
        Ok(rows)
    }

    async fn list_shift_records_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ShiftRecord>, StoreError> {
        let request = self.request(Method::GET, SHIFT_RECORDS_TABLE).query(&[
            ("select", "*".to_string()),
            ("date", format!("gte.{}", start)),
            ("date", format!("lte.{}", end)),
            ("order", "date.asc,created_at.asc,id.asc".to_string()),
        ]);

        let rows = self.fetch::<ShiftRecord>(request).await?;
        debug!(%start, %end, count = rows.len(), "listed shift records in range");
        Ok(rows)
    }

    async fn update_shift_record(
        &self,
        id: i64,
        update: ShiftUpdate,
    ) -> Result<ShiftRecord, StoreError> {
        let update = validate_update(update)?;
        if update.is_empty() {
            return self
                .get_shift_record(id)
                .await?
                .ok_or(StoreError::NotFound(id));
        }

        let request = self
            .request(Method::PATCH, SHIFT_RECORDS_TABLE)
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(&update);

        let updated = self
            .fetch::<ShiftRecord>(request)
            .await?
            .into_iter()
            .next()
            .ok_or(StoreError::NotFound(id))?;

        debug!(id, "updated shift record");
        Ok(updated)
    }

    async fn delete_shift_record(&self, id: i64) -> Result<(), StoreError> {
        let request = self
            .request(Method::DELETE, SHIFT_RECORDS_TABLE)
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation");

        let deleted = self.fetch::<ShiftRecord>(request).await?;
        if deleted.is_empty() {
            return Err(StoreError::NotFound(id));
        }

        debug!(id, "deleted shift record");
        Ok(())
    }

    async fn get_active_rate_config(&self) -> Result<Option<RateConfig>, StoreError> {
        let request = self.request(Method::GET, RATE_CONFIGS_TABLE).query(&[
            ("select", "*"),
            ("active", "eq.true"),
            ("order", "created_at.desc,id.desc"),
            ("limit", "1"),
        ]);

        Ok(self.fetch::<RateConfig>(request).await?.into_iter().next())
    }

    async fn set_active_rate_config(
        &self,
        daily_rate: f64,
        per_delivery_rate: f64,
    ) -> Result<RateConfig, StoreError> {
        validate_rates(daily_rate, per_delivery_rate)?;

        let body = json!({
            "daily_rate": daily_rate,
            "per_delivery_rate": per_delivery_rate,
            "active": true,
            "created_at": Utc::now(),
        });
        let request = self
            .request(Method::POST, RATE_CONFIGS_TABLE)
            .header("Prefer", "return=representation")
            .json(&body);
        let created = Self::first(self.fetch::<RateConfig>(request).await?, "rate configuration")?;

        let new_id = created
            .id
            .ok_or_else(|| StoreError::decode("rate configuration without id"))?;

        // The new row already wins every read; this only tidies the flags.
        let housekeeping = self
            .request(Method::PATCH, RATE_CONFIGS_TABLE)
            .query(&[
                ("active", "eq.true".to_string()),
                ("id", format!("neq.{}", new_id)),
            ])
            .json(&json!({ "active": false }));
        if let Err(e) = self.send(housekeeping).await {
            warn!(error = %e, "could not deactivate previous rate configurations");
        }

        info!(id = new_id, daily_rate, per_delivery_rate, "activated new rate configuration");
        Ok(created)
    }

    async fn list_distinct_worker_names(&self) -> Result<Vec<String>, StoreError> {
        let request = self
            .request(Method::GET, SHIFT_RECORDS_TABLE)
            .query(&[("select", "worker_name")]);

        let names: BTreeSet<String> = self
            .fetch::<WorkerNameRow>(request)
            .await?
            .into_iter()
            .map(|row| row.worker_name)
            .filter(|name| !name.is_empty())
            .collect();

        Ok(names.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Shift, WorkerKind};
    use httpmock::prelude::*;
    use httpmock::Method::PATCH;
    use serde_json::json;

    fn record_json(id: i64, name: &str, date: &str, deliveries: u32) -> serde_json::Value {
        json!({
            "id": id,
            "worker_name": name,
            "date": date,
            "shift": "Morning",
            "worker_kind": "Salaried",
            "delivery_count": deliveries,
            "created_at": "2026-10-12T09:30:00.123456+00:00"
        })
    }

    fn store_for(server: &MockServer) -> SupabaseStore {
        SupabaseStore::new(&server.base_url(), "test-key", 5).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[tokio::test]
    async fn test_list_for_date_sends_filters_and_auth() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/shift_records")
                    .query_param("date", "eq.2026-10-12")
                    .query_param("order", "created_at.desc,id.desc")
                    .header("apikey", "test-key")
                    .header("authorization", "Bearer test-key");
                then.status(200).json_body(json!([
                    record_json(2, "Bruno", "2026-10-12", 8),
                    record_json(1, "Ana", "2026-10-12", 5)
                ]));
            })
            .await;

        let rows = store_for(&server)
            .list_shift_records_for_date(day(12))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].worker_name, "Bruno");
        assert_eq!(rows[1].delivery_count, 5);
        assert_eq!(rows[1].shift, Shift::Morning);
    }

    #[tokio::test]
    async fn test_list_in_range_uses_both_bounds() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/shift_records")
                    .query_param("date", "gte.2026-10-12")
                    .query_param("date", "lte.2026-10-17");
                then.status(200)
                    .json_body(json!([record_json(1, "Ana", "2026-10-13", 3)]));
            })
            .await;

        let rows = store_for(&server)
            .list_shift_records_in_range(day(12), day(17))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(rows[0].date, day(13));
    }

    #[tokio::test]
    async fn test_insert_returns_stored_record() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/rest/v1/shift_records")
                    .header("prefer", "return=representation")
                    .json_body_partial(r#"{"worker_name": "Ana", "shift": "Morning", "delivery_count": 5}"#);
                then.status(201)
                    .json_body(json!([record_json(10, "Ana", "2026-10-12", 5)]));
            })
            .await;

        let record = store_for(&server)
            .insert_shift_record(NewShiftRecord {
                worker_name: "  Ana".to_string(),
                date: day(12),
                shift: Shift::Morning,
                worker_kind: WorkerKind::Salaried,
                delivery_count: 5,
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(record.id, 10);
    }

    #[tokio::test]
    async fn test_update_missing_record_is_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PATCH)
                    .path("/rest/v1/shift_records")
                    .query_param("id", "eq.99");
                then.status(200).json_body(json!([]));
            })
            .await;

        let err = store_for(&server)
            .update_shift_record(
                99,
                ShiftUpdate {
                    delivery_count: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::NotFound(99)));
    }

    #[tokio::test]
    async fn test_delete_record() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(DELETE)
                    .path("/rest/v1/shift_records")
                    .query_param("id", "eq.4");
                then.status(200)
                    .json_body(json!([record_json(4, "Ana", "2026-10-12", 1)]));
            })
            .await;

        store_for(&server).delete_shift_record(4).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_active_rate_config_takes_latest() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/rate_configs")
                    .query_param("active", "eq.true")
                    .query_param("limit", "1");
                then.status(200).json_body(json!([{
                    "id": 3,
                    "daily_rate": 40.0,
                    "per_delivery_rate": 1.5,
                    "active": true,
                    "created_at": "2026-10-10T12:00:00+00:00"
                }]));
            })
            .await;

        let config = store_for(&server).get_active_rate_config().await.unwrap().unwrap();
        assert_eq!(config.id, Some(3));
        assert_eq!(config.daily_rate, 40.0);
        assert_eq!(config.per_delivery_rate, 1.5);
    }

    #[tokio::test]
    async fn test_set_rate_config_inserts_then_deactivates_others() {
        let server = MockServer::start_async().await;
        let insert = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/rest/v1/rate_configs")
                    .json_body_partial(r#"{"daily_rate": 50.0, "active": true}"#);
                then.status(201).json_body(json!([{
                    "id": 8,
                    "daily_rate": 50.0,
                    "per_delivery_rate": 2.0,
                    "active": true,
                    "created_at": "2026-10-17T12:00:00+00:00"
                }]));
            })
            .await;
        let deactivate = server
            .mock_async(|when, then| {
                when.method(PATCH)
                    .path("/rest/v1/rate_configs")
                    .query_param("id", "neq.8")
                    .json_body(json!({"active": false}));
                then.status(204);
            })
            .await;

        let config = store_for(&server)
            .set_active_rate_config(50.0, 2.0)
            .await
            .unwrap();

        insert.assert_async().await;
        deactivate.assert_async().await;
        assert_eq!(config.id, Some(8));
    }

    #[tokio::test]
    async fn test_send_accepts_no_content() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PATCH).path("/rest/v1/rate_configs");
                then.status(204);
            })
            .await;

        let store = store_for(&server);
        let request = store
            .request(Method::PATCH, RATE_CONFIGS_TABLE)
            .query(&[("active", "eq.true"), ("id", "neq.8")])
            .json(&json!({ "active": false }));
        let response = store.send(request).await.unwrap();
        assert_eq!(response.status().as_u16(), 204);
    }

    #[tokio::test]
    async fn test_set_rate_config_survives_failed_housekeeping() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/rest/v1/rate_configs");
                then.status(201).json_body(json!([{
                    "id": 9,
                    "daily_rate": 45.0,
                    "per_delivery_rate": 2.0,
                    "active": true,
                    "created_at": "2026-10-17T12:00:00+00:00"
                }]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(PATCH).path("/rest/v1/rate_configs");
                then.status(500).body("boom");
            })
            .await;

        let config = store_for(&server)
            .set_active_rate_config(45.0, 2.0)
            .await
            .unwrap();
        assert_eq!(config.daily_rate, 45.0);
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/v1/shift_records");
                then.status(401).body(r#"{"message":"Invalid API key"}"#);
            })
            .await;

        let err = store_for(&server)
            .list_shift_records_for_date(day(12))
            .await
            .unwrap_err();

        match err {
            StoreError::Api { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("Invalid API key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_distinct_worker_names() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/shift_records")
                    .query_param("select", "worker_name");
                then.status(200).json_body(json!([
                    {"worker_name": "Zeca"},
                    {"worker_name": "Ana"},
                    {"worker_name": "Zeca"},
                    {"worker_name": ""}
                ]));
            })
            .await;

        let names = store_for(&server).list_distinct_worker_names().await.unwrap();
        assert_eq!(names, vec!["Ana", "Zeca"]);
    }
}
