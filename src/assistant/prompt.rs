//! Prompt construction for the assistant.

use crate::models::{DailyKpiSnapshot, RateConfig, WeeklyWorkerSummary};
use crate::money::format_currency;

/// Summarize the computed figures as the context block the model sees.
pub fn build_context(
    kpis: &DailyKpiSnapshot,
    weekly: &[WeeklyWorkerSummary],
    rates: &RateConfig,
) -> String {
    let mut context = String::new();

    context.push_str("📊 DADOS DO SISTEMA\n\n");

    context.push_str("🔧 CONFIGURAÇÕES:\n");
    context.push_str(&format!("- Diária: {}\n", format_currency(rates.daily_rate)));
    context.push_str(&format!(
        "- Corrida: {}\n\n",
        format_currency(rates.per_delivery_rate)
    ));

    context.push_str("📈 HOJE:\n");
    context.push_str(&format!("- Entregas: {}\n", kpis.total_deliveries));
    context.push_str(&format!("- Motoboys: {}\n", kpis.distinct_worker_count));
    context.push_str(&format!(
        "- Custo Total: {}\n\n",
        format_currency(kpis.total_cost)
    ));

    context.push_str("📅 SEMANAL:\n");
    for row in weekly {
        context.push_str(&format!(
            "- {}: {} ent. | {}\n",
            row.name,
            row.total_deliveries,
            format_currency(row.amount_owed)
        ));
    }

    context
}

/// System instruction sent with every request.
pub fn system_instruction(context: &str) -> String {
    format!("Você é o Assistente Motoboy AI. Contexto: {}", context)
}
