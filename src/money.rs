//! Brazilian-locale money and date formatting.
//!
//! Amounts are shown as `R$ 1.234,56`: "." groups thousands, "," marks the
//! decimals, always two of them. Parsing is fail-soft: anything that does not
//! look like an amount becomes zero.

use chrono::NaiveDate;
use num_format::{CustomFormat, Grouping, ToFormattedString as _};

const ZERO_AMOUNT: &str = "R$ 0,00";

/// Format an amount as Brazilian reais.
///
/// `None` and non-finite values render as `R$ 0,00`. Negative values keep
/// their sign after the currency marker (`R$ -1.234,50`).
pub fn format_currency<V: Into<Option<f64>>>(value: V) -> String {
    match value.into() {
        Some(amount) if amount.is_finite() => format_cents((amount * 100.0).round() as i64),
        _ => ZERO_AMOUNT.to_string(),
    }
}

fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let magnitude = cents.unsigned_abs();
    let integer_part = magnitude / 100;
    let fractional_part = magnitude % 100;

    let grouped = CustomFormat::builder()
        .grouping(Grouping::Standard)
        .separator(".")
        .build()
        .map(|format| integer_part.to_formatted_string(&format))
        .unwrap_or_else(|_| integer_part.to_string());

    format!("R$ {}{},{:02}", sign, grouped, fractional_part)
}

/// Parse a Brazilian amount such as `R$ 1.234,56`, `1.234,56` or `1234,56`.
///
/// Malformed, empty or non-finite input yields `0.0`.
pub fn parse_currency(text: &str) -> f64 {
    let cleaned: String = text
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    cleaned
        .replace('.', "")
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

/// Round to two decimal places for display.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Format a date as `DD/MM/YYYY`.
pub fn format_date_br(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Parse `DD/MM/YYYY` or ISO `YYYY-MM-DD`.
pub fn parse_date_br(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
        .ok()
}
