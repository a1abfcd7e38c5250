//! Report rendering.
//!
//! Turns built reports and record listings into plain text, Markdown or
//! JSON. Labels are in Portuguese, the operator's language.

use crate::analysis::{deliveries_by_kind, top_performer, total_owed};
use crate::cli::OutputFormat;
use crate::models::{DailyKpiSnapshot, RateConfig, ShiftRecord, WeeklyWorkerSummary};
use crate::money::{format_currency, format_date_br, round2};
use crate::report::{Built, Dashboard, ReportStatus};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;

/// Render the full management report in the requested format.
pub fn render_dashboard(dashboard: &Dashboard, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(generate_text_report(dashboard)),
        OutputFormat::Markdown => Ok(generate_markdown_report(dashboard)),
        OutputFormat::Json => generate_json_report(dashboard),
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(dashboard: &Dashboard) -> String {
    let mut output = String::new();

    output.push_str("# Relatório Motoboys\n\n");
    output.push_str(&format!(
        "- **Data:** {}\n- **Semana:** {} a {}\n\n",
        format_date_br(dashboard.date),
        format_date_br(dashboard.week_start),
        format_date_br(dashboard.date)
    ));

    output.push_str(&generate_rates_section(dashboard.rates.as_ref()));
    output.push_str(&generate_kpi_section(&dashboard.kpis));
    output.push_str(&generate_weekly_section(&dashboard.weekly));
    output.push_str(&generate_breakdown_section(&dashboard.weekly.value));
    output.push_str(&generate_footer());

    output
}

fn generate_rates_section(rates: Option<&RateConfig>) -> String {
    let mut section = String::new();

    section.push_str("## Taxas\n\n");
    match rates {
        Some(rates) => {
            section.push_str("| Diária | Por entrega |\n");
            section.push_str("|---:|---:|\n");
            section.push_str(&format!(
                "| {} | {} |\n\n",
                format_currency(rates.daily_rate),
                format_currency(rates.per_delivery_rate)
            ));
        }
        None => section.push_str("Nenhuma taxa configurada.\n\n"),
    }

    section
}

fn generate_kpi_section(kpis: &Built<DailyKpiSnapshot>) -> String {
    let mut section = String::new();
    let snapshot = &kpis.value;

    section.push_str("## Hoje\n\n");
    section.push_str("| 📦 Entregas | 🏍️ Motoboys | 📊 Média | 💰 Custo | 💵 Por Entrega |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {:.1} | {} | {} |\n\n",
        snapshot.total_deliveries,
        snapshot.distinct_worker_count,
        snapshot.average_deliveries_per_worker,
        format_currency(snapshot.total_cost),
        format_currency(snapshot.average_cost_per_delivery)
    ));
    section.push_str(&status_blockquote(&kpis.status));

    section
}

fn generate_weekly_section(weekly: &Built<Vec<WeeklyWorkerSummary>>) -> String {
    let mut section = String::new();

    section.push_str("## Semana\n\n");

    if weekly.value.is_empty() {
        section.push_str("Nenhum motoboy trabalhou nesta semana.\n\n");
        section.push_str(&status_blockquote(&weekly.status));
        return section;
    }

    section.push_str("| Motoboy | Tipo | Dias | Entregas | A pagar |\n");
    section.push_str("|:---|:---|:---:|:---:|---:|\n");
    for row in &weekly.value {
        let flag = if row.inconsistent_kind { " ⚠️" } else { "" };
        section.push_str(&format!(
            "| {} | {}{} | {} | {} | {} |\n",
            row.name,
            row.worker_kind,
            flag,
            row.distinct_days_worked,
            row.total_deliveries,
            format_currency(row.amount_owed)
        ));
    }
    section.push('\n');

    if weekly.value.iter().any(|row| row.inconsistent_kind) {
        section.push_str("⚠️ Registros com tipos diferentes para o mesmo motoboy; vale o primeiro.\n\n");
    }
    section.push_str(&status_blockquote(&weekly.status));

    section
}

fn generate_breakdown_section(weekly: &[WeeklyWorkerSummary]) -> String {
    if weekly.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Resumo\n\n");
    section.push_str("| Tipo | Entregas |\n");
    section.push_str("|:---|:---:|\n");
    for (kind, deliveries) in deliveries_by_kind(weekly) {
        section.push_str(&format!("| {} | {} |\n", kind, deliveries));
    }
    section.push('\n');

    section.push_str(&format!(
        "- **Total a pagar (Fixos):** {}\n",
        format_currency(total_owed(weekly))
    ));
    if let Some(top) = top_performer(weekly) {
        section.push_str(&format!(
            "- **Mais entregas:** {} ({})\n",
            top.name, top.total_deliveries
        ));
    }
    section.push('\n');

    section
}

fn status_blockquote(status: &ReportStatus) -> String {
    match status.note() {
        Some(note) if status.is_degraded() => format!("> ⚠️ {}\n\n", note),
        _ => String::new(),
    }
}

/// Generate the report footer.
fn generate_footer() -> String {
    format!(
        "---\n\n*Relatório gerado por motoboys v{}*\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// Generate the terminal version of the report.
pub fn generate_text_report(dashboard: &Dashboard) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "📅 {} (semana desde {})\n\n",
        format_date_br(dashboard.date),
        format_date_br(dashboard.week_start)
    ));
    output.push_str(&text_rates(dashboard.rates.as_ref()));
    output.push('\n');
    output.push_str(&text_kpis(&dashboard.kpis));
    output.push('\n');
    output.push_str(&text_weekly(&dashboard.weekly));

    if !dashboard.weekly.value.is_empty() {
        output.push('\n');
        for (kind, deliveries) in deliveries_by_kind(&dashboard.weekly.value) {
            output.push_str(&format!("   {:<12} {} entregas\n", kind.to_string(), deliveries));
        }
        output.push_str(&format!(
            "   Total a pagar (Fixos): {}\n",
            format_currency(total_owed(&dashboard.weekly.value))
        ));
    }

    output
}

fn text_rates(rates: Option<&RateConfig>) -> String {
    match rates {
        Some(rates) => format!(
            "🔧 Diária: {} | Por entrega: {}\n",
            format_currency(rates.daily_rate),
            format_currency(rates.per_delivery_rate)
        ),
        None => "🔧 Nenhuma taxa configurada.\n".to_string(),
    }
}

fn text_kpis(kpis: &Built<DailyKpiSnapshot>) -> String {
    let snapshot = &kpis.value;
    let mut text = String::new();

    text.push_str(&format!("📦 Entregas: {}\n", snapshot.total_deliveries));
    text.push_str(&format!("🏍️ Motoboys: {}\n", snapshot.distinct_worker_count));
    text.push_str(&format!("📊 Média: {:.1}\n", snapshot.average_deliveries_per_worker));
    text.push_str(&format!("💰 Custo: {}\n", format_currency(snapshot.total_cost)));
    text.push_str(&format!(
        "💵 Por Entrega: {}\n",
        format_currency(snapshot.average_cost_per_delivery)
    ));
    text.push_str(&text_status(&kpis.status));

    text
}

fn text_weekly(weekly: &Built<Vec<WeeklyWorkerSummary>>) -> String {
    let mut text = String::new();

    if weekly.value.is_empty() {
        text.push_str("Nenhum motoboy trabalhou nesta semana.\n");
        text.push_str(&text_status(&weekly.status));
        return text;
    }

    text.push_str(&format!(
        "{:<20} {:<12} {:>4} {:>8} {:>14}\n",
        "Motoboy", "Tipo", "Dias", "Entregas", "A pagar"
    ));
    for row in &weekly.value {
        let name = if row.inconsistent_kind {
            format!("{} ⚠️", row.name)
        } else {
            row.name.clone()
        };
        text.push_str(&format!(
            "{:<20} {:<12} {:>4} {:>8} {:>14}\n",
            name,
            row.worker_kind.to_string(),
            row.distinct_days_worked,
            row.total_deliveries,
            format_currency(row.amount_owed)
        ));
    }
    text.push_str(&text_status(&weekly.status));

    text
}

fn text_status(status: &ReportStatus) -> String {
    match status.note() {
        Some(note) if status.is_degraded() => format!("⚠️ {}\n", note),
        _ => String::new(),
    }
}

/// Generate a JSON report. Money and averages are rounded to cents.
pub fn generate_json_report(dashboard: &Dashboard) -> Result<String> {
    let rounded = Dashboard {
        kpis: rounded_kpis(&dashboard.kpis),
        weekly: rounded_weekly(&dashboard.weekly),
        ..dashboard.clone()
    };
    serde_json::to_string_pretty(&rounded).map_err(Into::into)
}

fn rounded_kpis(kpis: &Built<DailyKpiSnapshot>) -> Built<DailyKpiSnapshot> {
    let mut kpis = kpis.clone();
    kpis.value.average_deliveries_per_worker = round2(kpis.value.average_deliveries_per_worker);
    kpis.value.total_cost = round2(kpis.value.total_cost);
    kpis.value.average_cost_per_delivery = round2(kpis.value.average_cost_per_delivery);
    kpis
}

fn rounded_weekly(weekly: &Built<Vec<WeeklyWorkerSummary>>) -> Built<Vec<WeeklyWorkerSummary>> {
    let mut weekly = weekly.clone();
    for row in &mut weekly.value {
        row.amount_owed = round2(row.amount_owed);
    }
    weekly
}

#[derive(Serialize)]
struct KpiReport<'a> {
    date: NaiveDate,
    #[serde(flatten)]
    kpis: &'a Built<DailyKpiSnapshot>,
}

#[derive(Serialize)]
struct WeeklyReport<'a> {
    week_start: NaiveDate,
    today: NaiveDate,
    #[serde(flatten)]
    weekly: &'a Built<Vec<WeeklyWorkerSummary>>,
}

/// Render the daily indicators alone.
pub fn render_kpis(
    kpis: &Built<DailyKpiSnapshot>,
    date: NaiveDate,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format!("📅 {}\n{}", format_date_br(date), text_kpis(kpis))),
        OutputFormat::Markdown => Ok(generate_kpi_section(kpis)),
        OutputFormat::Json => serde_json::to_string_pretty(&KpiReport {
            date,
            kpis: &rounded_kpis(kpis),
        })
        .map_err(Into::into),
    }
}

/// Render the weekly payout alone.
pub fn render_weekly(
    weekly: &Built<Vec<WeeklyWorkerSummary>>,
    week_start: NaiveDate,
    today: NaiveDate,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format!(
            "📅 {} a {}\n{}",
            format_date_br(week_start),
            format_date_br(today),
            text_weekly(weekly)
        )),
        OutputFormat::Markdown => Ok(generate_weekly_section(weekly)),
        OutputFormat::Json => serde_json::to_string_pretty(&WeeklyReport {
            week_start,
            today,
            weekly: &rounded_weekly(weekly),
        })
        .map_err(Into::into),
    }
}

/// Render the active rates.
pub fn render_rates(rates: Option<&RateConfig>, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(text_rates(rates)),
        OutputFormat::Markdown => Ok(generate_rates_section(rates)),
        OutputFormat::Json => serde_json::to_string_pretty(&rates).map_err(Into::into),
    }
}

/// One line per record, as shown in listings and the chat shell.
pub fn record_line(record: &ShiftRecord) -> String {
    format!(
        "#{:<5} {}  {:<5}  {} ({}) - {} entregas",
        record.id,
        format_date_br(record.date),
        record.shift.to_string(),
        record.worker_name,
        record.worker_kind,
        record.delivery_count
    )
}

/// Render a list of shift records.
pub fn render_records(records: &[ShiftRecord], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(records).map_err(Into::into),
        OutputFormat::Text => {
            if records.is_empty() {
                return Ok("Nenhum registro.\n".to_string());
            }
            let mut text: String = records
                .iter()
                .map(|record| format!("{}\n", record_line(record)))
                .collect();
            text.push_str(&format!("{} registro(s)\n", records.len()));
            Ok(text)
        }
        OutputFormat::Markdown => {
            if records.is_empty() {
                return Ok("Nenhum registro.\n".to_string());
            }
            let mut table = String::new();
            table.push_str("| ID | Data | Turno | Motoboy | Tipo | Entregas |\n");
            table.push_str("|---:|:---|:---|:---|:---|---:|\n");
            for record in records {
                table.push_str(&format!(
                    "| {} | {} | {} | {} | {} | {} |\n",
                    record.id,
                    format_date_br(record.date),
                    record.shift,
                    record.worker_name,
                    record.worker_kind,
                    record.delivery_count
                ));
            }
            Ok(table)
        }
    }
}

/// Write rendered output to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
