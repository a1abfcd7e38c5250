//! Data models for shift tracking and pay reporting.
//!
//! This module contains the persisted entities (shift records and rate
//! configurations) and the derived, never-persisted report types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Period of the day a shift was worked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shift {
    Morning,
    Night,
}

impl Shift {
    /// Value stored in the `shift` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Shift::Morning => "Morning",
            Shift::Night => "Night",
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shift::Morning => write!(f, "Manhã"),
            Shift::Night => write!(f, "Noite"),
        }
    }
}

impl FromStr for Shift {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold_label(s).as_str() {
            "morning" | "manha" => Ok(Shift::Morning),
            "night" | "noite" => Ok(Shift::Night),
            other => Err(format!(
                "Unknown shift '{}' (expected morning/manhã or night/noite)",
                other
            )),
        }
    }
}

/// How a worker is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerKind {
    /// Daily rate per worked day plus the per-delivery rate, settled weekly.
    Salaried,
    /// Paid at the end of each shift; owes nothing in the weekly report.
    Freelance,
}

impl WorkerKind {
    /// Value stored in the `worker_kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerKind::Salaried => "Salaried",
            WorkerKind::Freelance => "Freelance",
        }
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerKind::Salaried => write!(f, "Fixo"),
            WorkerKind::Freelance => write!(f, "Freelancer"),
        }
    }
}

impl FromStr for WorkerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold_label(s).as_str() {
            "salaried" | "fixo" => Ok(WorkerKind::Salaried),
            "freelance" | "freelancer" => Ok(WorkerKind::Freelance),
            other => Err(format!(
                "Unknown worker kind '{}' (expected salaried/fixo or freelance/freelancer)",
                other
            )),
        }
    }
}

/// Lowercase and drop the accents the operator is likely to type.
fn fold_label(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'ã' | 'á' | 'â' | 'à' => 'a',
            'é' | 'ê' => 'e',
            'í' => 'i',
            'ó' | 'ô' | 'õ' => 'o',
            'ú' => 'u',
            other => other,
        })
        .collect()
}

/// One worker's reported shift, as persisted by the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftRecord {
    /// Identifier assigned by the store on creation.
    pub id: i64,
    pub worker_name: String,
    pub date: NaiveDate,
    pub shift: Shift,
    pub worker_kind: WorkerKind,
    pub delivery_count: u32,
    /// Set at insertion, never updated.
    pub created_at: DateTime<Utc>,
}

/// A shift record as submitted, before the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewShiftRecord {
    pub worker_name: String,
    pub date: NaiveDate,
    pub shift: Shift,
    pub worker_kind: WorkerKind,
    pub delivery_count: u32,
}

/// Fields to change on an existing record. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShiftUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shift: Option<Shift>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_kind: Option<WorkerKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_count: Option<u32>,
}

impl ShiftUpdate {
    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        self.worker_name.is_none()
            && self.date.is_none()
            && self.shift.is_none()
            && self.worker_kind.is_none()
            && self.delivery_count.is_none()
    }

    /// Returns `record` with this update applied. Id and creation time are kept.
    pub fn apply_to(&self, record: &ShiftRecord) -> ShiftRecord {
        ShiftRecord {
            id: record.id,
            worker_name: self
                .worker_name
                .clone()
                .unwrap_or_else(|| record.worker_name.clone()),
            date: self.date.unwrap_or(record.date),
            shift: self.shift.unwrap_or(record.shift),
            worker_kind: self.worker_kind.unwrap_or(record.worker_kind),
            delivery_count: self.delivery_count.unwrap_or(record.delivery_count),
            created_at: record.created_at,
        }
    }
}

/// Pay-rate parameters. Exactly one configuration is active at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateConfig {
    /// Store identifier; `None` for configurations that were never persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Paid once per worked day.
    pub daily_rate: f64,
    /// Paid per delivery.
    pub per_delivery_rate: f64,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl RateConfig {
    /// An unsaved, active configuration with the given rates.
    pub fn new(daily_rate: f64, per_delivery_rate: f64) -> Self {
        Self {
            id: None,
            daily_rate,
            per_delivery_rate,
            active: true,
            created_at: None,
        }
    }

    /// The {0, 0} configuration substituted when none is available.
    pub fn zeroed() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Day-level indicators derived from the records of one date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyKpiSnapshot {
    pub total_deliveries: u64,
    pub distinct_worker_count: usize,
    pub average_deliveries_per_worker: f64,
    pub total_cost: f64,
    pub average_cost_per_delivery: f64,
}

/// Per-worker totals for a week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyWorkerSummary {
    pub name: String,
    pub worker_kind: WorkerKind,
    pub distinct_days_worked: usize,
    pub total_deliveries: u64,
    pub amount_owed: f64,
    /// Set when the worker's records disagree on the worker kind.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inconsistent_kind: bool,
}
