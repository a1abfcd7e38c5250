//! Pay aggregation and KPI computation.
//!
//! Pure functions over snapshots of shift records. Nothing here performs I/O
//! or rounds: values keep full precision until they are displayed.

use crate::models::{DailyKpiSnapshot, RateConfig, ShiftRecord, WeeklyWorkerSummary, WorkerKind};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

/// Compute the day-level indicators for whatever records are passed in.
///
/// The daily rate is charged once per distinct worker, whatever their kind
/// or number of shifts, and the per-delivery rate applies to every delivery.
pub fn compute_daily_kpis(records: &[ShiftRecord], config: &RateConfig) -> DailyKpiSnapshot {
    let total_deliveries: u64 = records.iter().map(|r| u64::from(r.delivery_count)).sum();
    let distinct_worker_count = records
        .iter()
        .map(|r| r.worker_name.as_str())
        .collect::<HashSet<_>>()
        .len();

    let total_cost = distinct_worker_count as f64 * config.daily_rate
        + total_deliveries as f64 * config.per_delivery_rate;

    let average_deliveries_per_worker = if distinct_worker_count == 0 {
        0.0
    } else {
        total_deliveries as f64 / distinct_worker_count as f64
    };

    let average_cost_per_delivery = if total_deliveries == 0 {
        0.0
    } else {
        total_cost / total_deliveries as f64
    };

    DailyKpiSnapshot {
        total_deliveries,
        distinct_worker_count,
        average_deliveries_per_worker,
        total_cost,
        average_cost_per_delivery,
    }
}

struct WorkerTotals {
    kind: WorkerKind,
    inconsistent_kind: bool,
    dates: HashSet<NaiveDate>,
    deliveries: u64,
}

/// Compute per-worker totals and the amount owed, ordered by worker name.
///
/// Salaried workers are owed one daily rate per distinct date plus the
/// per-delivery rate; freelancers were paid at the end of each shift and are
/// owed nothing.
pub fn compute_weekly_report(
    records: &[ShiftRecord],
    config: &RateConfig,
) -> Vec<WeeklyWorkerSummary> {
    // BTreeMap keys on the raw name, so iteration is ordinal by name.
    let mut grouped: BTreeMap<&str, WorkerTotals> = BTreeMap::new();

    for record in records {
        let totals = grouped
            .entry(record.worker_name.as_str())
            .or_insert_with(|| WorkerTotals {
                kind: record.worker_kind,
                inconsistent_kind: false,
                dates: HashSet::new(),
                deliveries: 0,
            });

        if totals.kind != record.worker_kind && !totals.inconsistent_kind {
            warn!(
                worker = %record.worker_name,
                first_seen = %totals.kind,
                conflicting = %record.worker_kind,
                "worker kind differs between records, keeping the first one"
            );
            totals.inconsistent_kind = true;
        }

        totals.dates.insert(record.date);
        totals.deliveries += u64::from(record.delivery_count);
    }

    grouped
        .into_iter()
        .map(|(name, totals)| {
            let distinct_days_worked = totals.dates.len();
            let amount_owed = match totals.kind {
                WorkerKind::Salaried => {
                    distinct_days_worked as f64 * config.daily_rate
                        + totals.deliveries as f64 * config.per_delivery_rate
                }
                WorkerKind::Freelance => 0.0,
            };

            WeeklyWorkerSummary {
                name: name.to_string(),
                worker_kind: totals.kind,
                distinct_days_worked,
                total_deliveries: totals.deliveries,
                amount_owed,
                inconsistent_kind: totals.inconsistent_kind,
            }
        })
        .collect()
}

/// Total deliveries per worker kind, salaried first. Kinds with no rows are omitted.
pub fn deliveries_by_kind(report: &[WeeklyWorkerSummary]) -> Vec<(WorkerKind, u64)> {
    [WorkerKind::Salaried, WorkerKind::Freelance]
        .into_iter()
        .filter_map(|kind| {
            let rows: Vec<_> = report.iter().filter(|s| s.worker_kind == kind).collect();
            if rows.is_empty() {
                None
            } else {
                Some((kind, rows.iter().map(|s| s.total_deliveries).sum()))
            }
        })
        .collect()
}

/// Sum of amounts owed across the report.
pub fn total_owed(report: &[WeeklyWorkerSummary]) -> f64 {
    report.iter().map(|s| s.amount_owed).sum()
}

/// The worker with the most deliveries; ties go to the first name in order.
pub fn top_performer(report: &[WeeklyWorkerSummary]) -> Option<&WeeklyWorkerSummary> {
    report
        .iter()
        .fold(None, |best: Option<&WeeklyWorkerSummary>, row| match best {
            Some(current) if current.total_deliveries >= row.total_deliveries => Some(current),
            _ => Some(row),
        })
}
