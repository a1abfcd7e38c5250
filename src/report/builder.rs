//! Report assembly.
//!
//! Picks the records and the active rate configuration for a point in time,
//! runs the aggregation engine and never fails: faults degrade to empty or
//! zeroed values, and the accompanying [`ReportStatus`] says why.

use crate::analysis::{compute_daily_kpis, compute_weekly_report};
use crate::error::StoreError;
use crate::models::{DailyKpiSnapshot, RateConfig, ShiftRecord, WeeklyWorkerSummary};
use crate::store::RecordStore;
use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Why a built value looks the way it does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ReportStatus {
    Ok,
    /// The store answered but had no records for the period.
    NoData,
    /// No rate configuration is active; rates were taken as zero.
    NoActiveConfig,
    /// The store could not be read; the value is a safe default.
    StoreUnavailable(String),
}

impl ReportStatus {
    /// True when the value is not backed by complete data.
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            ReportStatus::NoActiveConfig | ReportStatus::StoreUnavailable(_)
        )
    }

    /// Short note for the operator, `None` when everything is fine.
    pub fn note(&self) -> Option<String> {
        match self {
            ReportStatus::Ok => None,
            ReportStatus::NoData => Some("Nenhum registro no período.".to_string()),
            ReportStatus::NoActiveConfig => {
                Some("Nenhuma configuração de taxas ativa; valores calculados com taxas zeradas.".to_string())
            }
            ReportStatus::StoreUnavailable(reason) => {
                Some(format!("Banco de dados indisponível: {}", reason))
            }
        }
    }
}

/// A report value together with its status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Built<T> {
    pub value: T,
    pub status: ReportStatus,
}

impl<T> Built<T> {
    fn new(value: T, status: ReportStatus) -> Self {
        Self { value, status }
    }
}

/// Everything the management view shows for one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub date: NaiveDate,
    pub week_start: NaiveDate,
    /// Rates in effect, `None` when none is active or the store is down.
    pub rates: Option<RateConfig>,
    pub kpis: Built<DailyKpiSnapshot>,
    pub weekly: Built<Vec<WeeklyWorkerSummary>>,
}

impl Dashboard {
    /// Rates used for the computations; zero when none is active.
    pub fn effective_rates(&self) -> RateConfig {
        self.rates.clone().unwrap_or_else(RateConfig::zeroed)
    }
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

pub struct ReportBuilder {
    store: Arc<dyn RecordStore>,
}

impl ReportBuilder {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Day-level indicators for `today`.
    ///
    /// Listing failures give a zeroed snapshot. A missing or unreadable rate
    /// configuration is replaced by zero rates and the snapshot is still
    /// computed.
    pub async fn build_daily_kpis(&self, today: NaiveDate) -> Built<DailyKpiSnapshot> {
        let (records, config) = futures::join!(
            self.store.list_shift_records_for_date(today),
            self.store.get_active_rate_config()
        );
        assemble_daily(records, &config)
    }

    /// Weekly payout for `[week_start, today]`.
    ///
    /// Any store failure, or the absence of an active configuration, gives an
    /// empty report.
    pub async fn build_weekly_report(
        &self,
        week_start: NaiveDate,
        today: NaiveDate,
    ) -> Built<Vec<WeeklyWorkerSummary>> {
        let (records, config) = futures::join!(
            self.store.list_shift_records_in_range(week_start, today),
            self.store.get_active_rate_config()
        );
        assemble_weekly(records, &config)
    }

    /// Rates, daily indicators and the week so far, with one read of each.
    pub async fn build_dashboard(&self, today: NaiveDate) -> Dashboard {
        let monday = week_start(today);
        let (day_records, week_records, config) = futures::join!(
            self.store.list_shift_records_for_date(today),
            self.store.list_shift_records_in_range(monday, today),
            self.store.get_active_rate_config()
        );

        let kpis = assemble_daily(day_records, &config);
        let weekly = assemble_weekly(week_records, &config);
        let rates = config.ok().flatten();

        debug!(
            %today,
            week_start = %monday,
            workers = weekly.value.len(),
            "built dashboard"
        );

        Dashboard {
            date: today,
            week_start: monday,
            rates,
            kpis,
            weekly,
        }
    }
}

fn assemble_daily(
    records: Result<Vec<ShiftRecord>, StoreError>,
    config: &Result<Option<RateConfig>, StoreError>,
) -> Built<DailyKpiSnapshot> {
    let records = match records {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "cannot list today's records, showing zeroed indicators");
            return Built::new(
                DailyKpiSnapshot::default(),
                ReportStatus::StoreUnavailable(e.to_string()),
            );
        }
    };

    let (rates, config_status) = match config {
        Ok(Some(config)) => (config.clone(), None),
        Ok(None) => {
            warn!("no active rate configuration, using zero rates");
            (RateConfig::zeroed(), Some(ReportStatus::NoActiveConfig))
        }
        Err(e) => {
            warn!(error = %e, "cannot read rate configuration, using zero rates");
            (
                RateConfig::zeroed(),
                Some(ReportStatus::StoreUnavailable(e.to_string())),
            )
        }
    };

    let snapshot = compute_daily_kpis(&records, &rates);
    let status = config_status.unwrap_or(if records.is_empty() {
        ReportStatus::NoData
    } else {
        ReportStatus::Ok
    });

    Built::new(snapshot, status)
}

fn assemble_weekly(
    records: Result<Vec<ShiftRecord>, StoreError>,
    config: &Result<Option<RateConfig>, StoreError>,
) -> Built<Vec<WeeklyWorkerSummary>> {
    let records = match records {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "cannot list the week's records, showing an empty report");
            return Built::new(Vec::new(), ReportStatus::StoreUnavailable(e.to_string()));
        }
    };

    let rates = match config {
        Ok(Some(config)) => config,
        Ok(None) => {
            warn!("no active rate configuration, weekly report left empty");
            return Built::new(Vec::new(), ReportStatus::NoActiveConfig);
        }
        Err(e) => {
            warn!(error = %e, "cannot read rate configuration, weekly report left empty");
            return Built::new(Vec::new(), ReportStatus::StoreUnavailable(e.to_string()));
        }
    };

    if records.is_empty() {
        return Built::new(Vec::new(), ReportStatus::NoData);
    }

    Built::new(compute_weekly_report(&records, rates), ReportStatus::Ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewShiftRecord, Shift, ShiftUpdate, WorkerKind};
    use crate::store::SqliteStore;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    /// Read-only store with switchable failures.
    struct StubStore {
        records: Vec<ShiftRecord>,
        config: Option<RateConfig>,
        fail_records: bool,
        fail_config: bool,
    }

    fn unavailable() -> StoreError {
        StoreError::Database("connection refused".to_string())
    }

    #[async_trait]
    impl RecordStore for StubStore {
        async fn insert_shift_record(&self, _: NewShiftRecord) -> Result<ShiftRecord, StoreError> {
            Err(unavailable())
        }

        async fn get_shift_record(&self, id: i64) -> Result<Option<ShiftRecord>, StoreError> {
            Ok(self.records.iter().find(|r| r.id == id).cloned())
        }

        async fn list_shift_records_for_date(
            &self,
            date: NaiveDate,
        ) -> Result<Vec<ShiftRecord>, StoreError> {
            if self.fail_records {
                return Err(unavailable());
            }
            Ok(self.records.iter().filter(|r| r.date == date).cloned().collect())
        }

        async fn list_shift_records_in_range(
            &self,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<ShiftRecord>, StoreError> {
            if self.fail_records {
                return Err(unavailable());
            }
            Ok(self
                .records
                .iter()
                .filter(|r| r.date >= start && r.date <= end)
                .cloned()
                .collect())
        }

        async fn update_shift_record(
            &self,
            id: i64,
            _: ShiftUpdate,
        ) -> Result<ShiftRecord, StoreError> {
            Err(StoreError::NotFound(id))
        }

        async fn delete_shift_record(&self, id: i64) -> Result<(), StoreError> {
            Err(StoreError::NotFound(id))
        }

        async fn get_active_rate_config(&self) -> Result<Option<RateConfig>, StoreError> {
            if self.fail_config {
                return Err(unavailable());
            }
            Ok(self.config.clone())
        }

        async fn set_active_rate_config(&self, _: f64, _: f64) -> Result<RateConfig, StoreError> {
            Err(unavailable())
        }

        async fn list_distinct_worker_names(&self) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn record(id: i64, name: &str, date: NaiveDate, kind: WorkerKind, deliveries: u32) -> ShiftRecord {
        ShiftRecord {
            id,
            worker_name: name.to_string(),
            date,
            shift: Shift::Morning,
            worker_kind: kind,
            delivery_count: deliveries,
            created_at: Utc.with_ymd_and_hms(2026, 10, 12, 8, 0, 0).unwrap(),
        }
    }

    fn stub(records: Vec<ShiftRecord>, config: Option<RateConfig>) -> ReportBuilder {
        ReportBuilder::new(Arc::new(StubStore {
            records,
            config,
            fail_records: false,
            fail_config: false,
        }))
    }

    #[test]
    fn test_week_start_is_monday() {
        // 2026-10-12 is a Monday.
        assert_eq!(week_start(day(12)), day(12));
        assert_eq!(week_start(day(14)), day(12));
        assert_eq!(week_start(day(18)), day(12));
        assert_eq!(week_start(day(19)), day(19));
        assert_eq!(
            week_start(NaiveDate::from_ymd_opt(2026, 11, 1).unwrap()),
            day(26)
        );
    }

    #[tokio::test]
    async fn test_daily_kpis_ok() {
        let builder = stub(
            vec![
                record(1, "Ana", day(12), WorkerKind::Salaried, 5),
                record(2, "Bruno", day(12), WorkerKind::Freelance, 8),
                record(3, "Ana", day(13), WorkerKind::Salaried, 3),
            ],
            Some(RateConfig::new(40.0, 1.5)),
        );

        let built = builder.build_daily_kpis(day(12)).await;
        assert_eq!(built.status, ReportStatus::Ok);
        assert_eq!(built.value.total_deliveries, 13);
        assert_eq!(built.value.distinct_worker_count, 2);
        assert!((built.value.total_cost - 99.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_daily_kpis_without_config_uses_zero_rates() {
        let builder = stub(vec![record(1, "Ana", day(12), WorkerKind::Salaried, 5)], None);

        let built = builder.build_daily_kpis(day(12)).await;
        assert_eq!(built.status, ReportStatus::NoActiveConfig);
        assert_eq!(built.value.total_deliveries, 5);
        assert_eq!(built.value.total_cost, 0.0);
    }

    #[tokio::test]
    async fn test_daily_kpis_store_down_is_zeroed() {
        let builder = ReportBuilder::new(Arc::new(StubStore {
            records: vec![record(1, "Ana", day(12), WorkerKind::Salaried, 5)],
            config: Some(RateConfig::new(40.0, 1.5)),
            fail_records: true,
            fail_config: false,
        }));

        let built = builder.build_daily_kpis(day(12)).await;
        assert!(matches!(built.status, ReportStatus::StoreUnavailable(_)));
        assert_eq!(built.value, DailyKpiSnapshot::default());
    }

    #[tokio::test]
    async fn test_daily_kpis_config_read_failure_still_counts() {
        let builder = ReportBuilder::new(Arc::new(StubStore {
            records: vec![record(1, "Ana", day(12), WorkerKind::Salaried, 5)],
            config: Some(RateConfig::new(40.0, 1.5)),
            fail_records: false,
            fail_config: true,
        }));

        let built = builder.build_daily_kpis(day(12)).await;
        assert!(built.status.is_degraded());
        assert_eq!(built.value.total_deliveries, 5);
        assert_eq!(built.value.total_cost, 0.0);
    }

    #[tokio::test]
    async fn test_daily_kpis_no_data() {
        let builder = stub(Vec::new(), Some(RateConfig::new(40.0, 1.5)));
        let built = builder.build_daily_kpis(day(12)).await;
        assert_eq!(built.status, ReportStatus::NoData);
        assert!(!built.status.is_degraded());
        assert_eq!(built.value.distinct_worker_count, 0);
    }

    #[tokio::test]
    async fn test_weekly_report_ok() {
        let builder = stub(
            vec![
                record(1, "Bruno", day(13), WorkerKind::Freelance, 8),
                record(2, "Ana", day(12), WorkerKind::Salaried, 5),
                record(3, "Ana", day(14), WorkerKind::Salaried, 3),
                record(4, "Ana", day(19), WorkerKind::Salaried, 30),
            ],
            Some(RateConfig::new(40.0, 1.5)),
        );

        let built = builder.build_weekly_report(day(12), day(17)).await;
        assert_eq!(built.status, ReportStatus::Ok);
        assert_eq!(built.value.len(), 2);
        assert_eq!(built.value[0].name, "Ana");
        assert_eq!(built.value[0].distinct_days_worked, 2);
        assert!((built.value[0].amount_owed - 92.0).abs() < 1e-9);
        assert_eq!(built.value[1].amount_owed, 0.0);
    }

    #[tokio::test]
    async fn test_weekly_report_without_config_is_empty() {
        let builder = stub(vec![record(1, "Ana", day(12), WorkerKind::Salaried, 5)], None);
        let built = builder.build_weekly_report(day(12), day(17)).await;
        assert_eq!(built.status, ReportStatus::NoActiveConfig);
        assert!(built.value.is_empty());
    }

    #[tokio::test]
    async fn test_weekly_report_store_down_is_empty() {
        let builder = ReportBuilder::new(Arc::new(StubStore {
            records: vec![record(1, "Ana", day(12), WorkerKind::Salaried, 5)],
            config: Some(RateConfig::new(40.0, 1.5)),
            fail_records: false,
            fail_config: true,
        }));

        let built = builder.build_weekly_report(day(12), day(17)).await;
        assert!(matches!(built.status, ReportStatus::StoreUnavailable(_)));
        assert!(built.value.is_empty());
    }

    #[tokio::test]
    async fn test_dashboard_against_sqlite() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(&dir.path().join("motoboys.db")).unwrap();
        let store: Arc<dyn RecordStore> = Arc::new(store);

        store.set_active_rate_config(50.0, 2.0).await.unwrap();
        for (name, date, deliveries) in [("Carla", day(13), 4), ("Carla", day(14), 3), ("Carla", day(15), 3)] {
            store
                .insert_shift_record(NewShiftRecord {
                    worker_name: name.to_string(),
                    date,
                    shift: Shift::Night,
                    worker_kind: WorkerKind::Salaried,
                    delivery_count: deliveries,
                })
                .await
                .unwrap();
        }

        let dashboard = ReportBuilder::new(store).build_dashboard(day(15)).await;

        assert_eq!(dashboard.week_start, day(12));
        assert_eq!(dashboard.effective_rates().daily_rate, 50.0);
        assert_eq!(dashboard.kpis.value.total_deliveries, 3);
        assert_eq!(dashboard.weekly.status, ReportStatus::Ok);
        assert_eq!(dashboard.weekly.value.len(), 1);
        assert!((dashboard.weekly.value[0].amount_owed - 170.0).abs() < 1e-9);
    }

    #[test]
    fn test_status_notes() {
        assert!(ReportStatus::Ok.note().is_none());
        assert!(ReportStatus::NoData.note().is_some());
        assert!(ReportStatus::StoreUnavailable("timeout".into())
            .note()
            .unwrap()
            .contains("timeout"));
    }

    #[test]
    fn test_status_serializes_with_tag() {
        let json = serde_json::to_value(ReportStatus::StoreUnavailable("x".into())).unwrap();
        assert_eq!(json["status"], "store_unavailable");
        assert_eq!(json["detail"], "x");
        let ok = serde_json::to_value(ReportStatus::Ok).unwrap();
        assert_eq!(ok["status"], "ok");
    }
}
