//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::{AssistantProvider, StoreBackend};
use crate::models::{Shift, WorkerKind};
use crate::money;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Motoboys - shift and pay dashboard for motorcycle couriers
///
/// Register the shifts each motoboy works, keep the pay rates, and get the
/// daily indicators and the weekly payout. An assistant answers questions
/// about the numbers.
///
/// Examples:
///   motoboys add --name Ana --shift manha --kind fixo --deliveries 12
///   motoboys rates set --daily "R$ 50,00" --per-delivery "2,50"
///   motoboys dashboard --format markdown --output semana.md
///   motoboys ask "Quem foi mais produtivo?"
///   motoboys init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .motoboys.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format (text, markdown, json)
    #[arg(long, value_name = "FORMAT", global = true)]
    pub format: Option<OutputFormat>,

    /// Record store backend
    #[arg(long, value_name = "BACKEND", global = true)]
    pub backend: Option<StoreBackend>,

    /// SQLite database file
    #[arg(long, value_name = "PATH", env = "MOTOBOYS_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Supabase project URL
    #[arg(long, value_name = "URL", env = "MOTOBOYS_SUPABASE_URL", global = true)]
    pub supabase_url: Option<String>,

    /// Supabase API key
    #[arg(
        long,
        value_name = "KEY",
        env = "MOTOBOYS_SUPABASE_KEY",
        hide_env_values = true,
        global = true
    )]
    pub supabase_key: Option<String>,

    /// Completion provider for the assistant
    #[arg(long, value_name = "PROVIDER", global = true)]
    pub provider: Option<AssistantProvider>,

    /// Model used by the assistant
    #[arg(long, value_name = "MODEL", env = "MOTOBOYS_MODEL", global = true)]
    pub model: Option<String>,

    /// Gemini API key
    #[arg(
        long,
        value_name = "KEY",
        env = "GOOGLE_API_KEY",
        hide_env_values = true,
        global = true
    )]
    pub api_key: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Register a worked shift
    Add {
        /// Worker name
        #[arg(long)]
        name: String,
        /// Shift date (DD/MM/YYYY or YYYY-MM-DD), defaults to today
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
        /// manha/morning or noite/night
        #[arg(long)]
        shift: Shift,
        /// fixo/salaried or freelancer/freelance
        #[arg(long)]
        kind: WorkerKind,
        /// Deliveries made during the shift
        #[arg(long)]
        deliveries: u32,
    },

    /// List the shifts of a day, newest first
    Today {
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
    },

    /// List the shifts between two dates (inclusive)
    List {
        #[arg(long, value_parser = parse_date_arg)]
        from: NaiveDate,
        #[arg(long, value_parser = parse_date_arg)]
        to: NaiveDate,
    },

    /// Change fields of a registered shift
    Edit {
        /// Record id
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
        #[arg(long)]
        shift: Option<Shift>,
        #[arg(long)]
        kind: Option<WorkerKind>,
        #[arg(long)]
        deliveries: Option<u32>,
    },

    /// Delete a registered shift
    Delete {
        /// Record id
        id: i64,
    },

    /// List every worker name seen so far
    Workers,

    /// Show the pay rates in effect
    Rates {
        #[command(subcommand)]
        action: Option<RatesAction>,
    },

    /// Daily indicators
    Kpis {
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
    },

    /// Weekly payout for the week containing the date
    Weekly {
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
    },

    /// Full management report: rates, indicators and weekly payout
    Dashboard {
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
        /// Write the report to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Ask the assistant one question about the numbers
    Ask {
        question: String,
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
    },

    /// Interactive assistant and editing shell
    Chat {
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
    },

    /// Generate a default .motoboys.toml configuration file
    InitConfig,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RatesAction {
    /// Save new rates; they take effect immediately
    Set {
        /// Daily rate, e.g. "R$ 50,00"
        #[arg(long, value_name = "AMOUNT")]
        daily: String,
        /// Rate per delivery, e.g. "2,50"
        #[arg(long, value_name = "AMOUNT")]
        per_delivery: String,
    },
}

/// Output format for reports and listings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain text (default)
    #[default]
    Text,
    /// Markdown format
    Markdown,
    /// JSON format
    Json,
}

/// Parse a date given as DD/MM/YYYY or YYYY-MM-DD.
pub fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    money::parse_date_br(value)
        .ok_or_else(|| format!("'{}' is not a date (use DD/MM/YYYY or YYYY-MM-DD)", value))
}

/// Parse an amount typed in Brazilian notation, rejecting text without digits.
pub fn parse_amount_arg(value: &str) -> Result<f64, String> {
    if !value.chars().any(|c| c.is_ascii_digit()) {
        return Err(format!("'{}' is not an amount", value));
    }
    if looks_like_dot_decimal(value) {
        return Err(format!(
            "'{}' is ambiguous: \".\" groups thousands, write the cents after a comma (e.g. 50,00)",
            value
        ));
    }
    let amount = money::parse_currency(value);
    if amount < 0.0 {
        return Err(format!("'{}' must not be negative", value));
    }
    Ok(amount)
}

/// "50.00" or "7.5": no comma and one or two digits after the last dot.
fn looks_like_dot_decimal(value: &str) -> bool {
    if value.contains(',') {
        return false;
    }
    match value.trim().rsplit_once('.') {
        Some((_, tail)) => (1..=2).contains(&tail.len()) && tail.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match &self.command {
            Command::Add { name, .. } => {
                if name.trim().is_empty() {
                    return Err("Worker name must not be empty".to_string());
                }
            }
            Command::List { from, to } => {
                if from > to {
                    return Err(format!(
                        "--from ({}) must not be after --to ({})",
                        money::format_date_br(*from),
                        money::format_date_br(*to)
                    ));
                }
            }
            Command::Edit {
                name,
                date,
                shift,
                kind,
                deliveries,
                ..
            } => {
                if name.is_none()
                    && date.is_none()
                    && shift.is_none()
                    && kind.is_none()
                    && deliveries.is_none()
                {
                    return Err("Nothing to change: pass at least one field".to_string());
                }
                if name.as_deref().is_some_and(|n| n.trim().is_empty()) {
                    return Err("Worker name must not be empty".to_string());
                }
            }
            Command::Rates {
                action: Some(RatesAction::Set { daily, per_delivery }),
            } => {
                parse_amount_arg(daily).map_err(|e| format!("--daily: {}", e))?;
                parse_amount_arg(per_delivery).map_err(|e| format!("--per-delivery: {}", e))?;
            }
            Command::Ask { question, .. } => {
                if question.trim().is_empty() {
                    return Err("Question must not be empty".to_string());
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// True for commands that talk to the assistant.
    pub fn uses_assistant(&self) -> bool {
        matches!(self.command, Command::Ask { .. } | Command::Chat { .. })
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
