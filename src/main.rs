//! Motoboys - shift and pay dashboard for motorcycle couriers
//!
//! A CLI that records courier shifts, keeps the pay rates, computes the
//! daily indicators and the weekly payout, and lets an assistant answer
//! questions about them.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (store unreachable, config, assistant failure, etc.)
//!   2 - Invalid input (empty name, negative rate, unknown record, etc.)

mod analysis;
mod assistant;
mod cli;
mod config;
mod error;
mod models;
mod money;
mod report;
mod session;
mod store;

use anyhow::{Context, Result};
use assistant::AssistantGateway;
use chrono::{Local, NaiveDate};
use cli::{parse_amount_arg, Args, Command, OutputFormat, RatesAction};
use config::{Config, DEFAULT_CONFIG_FILE};
use error::StoreError;
use indicatif::{ProgressBar, ProgressStyle};
use models::{NewShiftRecord, ShiftUpdate};
use report::{record_line, ReportBuilder};
use session::{Session, Shell, HELP_TEXT};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    // Handle init-config early (no logging needed)
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&args, &config);

    info!("Motoboys v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args.command);
    if args.uses_assistant() {
        info!(
            "Assistant: {:?} ({})",
            config.assistant.provider, config.assistant.model()
        );
    }

    match run(args, config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(exit_code(&e));
        }
    }
}

/// 2 for faults caused by the operator's input, 1 for everything else.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<StoreError>() {
        Some(store_error) if store_error.is_user_error() => 2,
        _ => 1,
    }
}

/// Handle init-config: generate a default .motoboys.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", DEFAULT_CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to choose the record store and the assistant provider.");
    Ok(())
}

/// Initialize logging based on verbosity settings. `RUST_LOG` wins when set.
fn init_logging(args: &Args, config: &Config) {
    let level = if !args.quiet && config.general.verbose {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration from file or use defaults, then apply CLI overrides.
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match args.config {
        // An explicit path must exist and parse
        Some(ref config_path) => Config::load(config_path)?,
        None => match Config::load_default() {
            Ok(Some(config)) => config,
            Ok(None) => Config::default(),
            Err(e) => {
                eprintln!("⚠️  Ignoring {}: {:#}", DEFAULT_CONFIG_FILE, e);
                Config::default()
            }
        },
    };

    config.merge_with_args(args);
    config.validate()?;
    Ok(config)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Spinner shown while waiting on the assistant.
fn spinner(message: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Dispatch the subcommand.
async fn run(args: Args, config: Config) -> Result<()> {
    let format = config.general.format;
    let store = store::open(&config.store)?;
    let builder = ReportBuilder::new(store.clone());

    match args.command {
        Command::Add {
            name,
            date,
            shift,
            kind,
            deliveries,
        } => {
            let record = store
                .insert_shift_record(NewShiftRecord {
                    worker_name: name,
                    date: date.unwrap_or_else(today),
                    shift,
                    worker_kind: kind,
                    delivery_count: deliveries,
                })
                .await
                .context("Failed to save shift")?;

            info!(id = record.id, "shift saved");
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
                _ => println!("✅ Registro salvo: {}", record_line(&record)),
            }
        }

        Command::Today { date } => {
            let records = store
                .list_shift_records_for_date(date.unwrap_or_else(today))
                .await
                .context("Failed to list shifts")?;
            print!("{}", report::render_records(&records, format)?);
        }

        Command::List { from, to } => {
            let records = store
                .list_shift_records_in_range(from, to)
                .await
                .context("Failed to list shifts")?;
            print!("{}", report::render_records(&records, format)?);
        }

        Command::Edit {
            id,
            name,
            date,
            shift,
            kind,
            deliveries,
        } => {
            let update = ShiftUpdate {
                worker_name: name,
                date,
                shift,
                worker_kind: kind,
                delivery_count: deliveries,
            };
            let record = store
                .update_shift_record(id, update)
                .await
                .with_context(|| format!("Failed to update shift #{}", id))?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
                _ => println!("✅ Registro atualizado: {}", record_line(&record)),
            }
        }

        Command::Delete { id } => {
            store
                .delete_shift_record(id)
                .await
                .with_context(|| format!("Failed to delete shift #{}", id))?;
            println!("🗑️  Registro #{} excluído.", id);
        }

        Command::Workers => {
            let names = store
                .list_distinct_worker_names()
                .await
                .context("Failed to list workers")?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&names)?),
                _ if names.is_empty() => println!("Nenhum motoboy cadastrado."),
                _ => names.iter().for_each(|name| println!("{}", name)),
            }
        }

        Command::Rates { action: None } => {
            let rates = store
                .get_active_rate_config()
                .await
                .context("Failed to read rates")?;
            print!("{}", report::render_rates(rates.as_ref(), format)?);
        }

        Command::Rates {
            action: Some(RatesAction::Set { daily, per_delivery }),
        } => {
            // Both already checked by Args::validate
            let daily_rate = parse_amount_arg(&daily).map_err(anyhow::Error::msg)?;
            let per_delivery_rate = parse_amount_arg(&per_delivery).map_err(anyhow::Error::msg)?;

            let rates = store
                .set_active_rate_config(daily_rate, per_delivery_rate)
                .await
                .context("Failed to save rates")?;
            println!("✅ Taxas atualizadas.");
            print!("{}", report::render_rates(Some(&rates), format)?);
        }

        Command::Kpis { date } => {
            let date = date.unwrap_or_else(today);
            let kpis = builder.build_daily_kpis(date).await;
            print!("{}", report::render_kpis(&kpis, date, format)?);
        }

        Command::Weekly { date } => {
            let date = date.unwrap_or_else(today);
            let monday = report::week_start(date);
            let weekly = builder.build_weekly_report(monday, date).await;
            print!("{}", report::render_weekly(&weekly, monday, date, format)?);
        }

        Command::Dashboard { date, output } => {
            let dashboard = builder.build_dashboard(date.unwrap_or_else(today)).await;
            let content = report::render_dashboard(&dashboard, format)?;

            match output {
                Some(path) => {
                    report::write_report(&content, &path)?;
                    println!("✅ Relatório salvo em: {}", path.display());
                }
                None => print!("{}", content),
            }
        }

        Command::Ask { question, date } => {
            let gateway = AssistantGateway::from_config(&config.assistant)?;
            let dashboard = builder.build_dashboard(date.unwrap_or_else(today)).await;

            let pb = spinner("Consultando o assistente...", args.quiet);
            let answer = gateway
                .try_ask(
                    &question,
                    &dashboard.kpis.value,
                    &dashboard.weekly.value,
                    &dashboard.effective_rates(),
                    &[],
                )
                .await;
            pb.finish_and_clear();

            println!("{}", answer.context("Assistant request failed")?);
        }

        Command::Chat { date } => {
            let gateway = AssistantGateway::from_config(&config.assistant)?;
            if !gateway.is_configured() {
                warn!("No assistant API key configured; questions will not be answered");
            }
            run_chat(&builder, &gateway, date.unwrap_or_else(today), args.quiet).await?;
        }

        Command::InitConfig => handle_init_config()?,
    }

    Ok(())
}

/// Read shell input until /quit or end of input.
async fn run_chat(
    builder: &ReportBuilder,
    gateway: &AssistantGateway,
    date: NaiveDate,
    quiet: bool,
) -> Result<()> {
    let shell = Shell::new(builder, gateway, date);
    let mut session = Session::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("🏍️ Assistente Motoboy AI ({})", money::format_date_br(date));
    println!("{}\n", HELP_TEXT);

    loop {
        eprint!("> ");
        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let pb = if line.trim_start().starts_with('/') {
            ProgressBar::hidden()
        } else {
            spinner("Pensando...", quiet)
        };
        let reply = shell.handle_line(session, &line).await;
        pb.finish_and_clear();

        if reply.quit {
            break;
        }
        println!("{}\n", reply.output);
        session = reply.session;
    }

    Ok(())
}
