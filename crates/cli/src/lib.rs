pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use mediaplan_core::config::{AppConfig, LoadOptions, LogFormat};
use rust_decimal::Decimal;

#[derive(Debug, Parser)]
#[command(
    name = "mediaplan",
    about = "Media plan order-line pricing CLI",
    long_about = "Price order lines, inspect plan calendars, and replay line edits against the pricing engine.",
    after_help = "Examples:\n  mediaplan price --unit-price 1000 --discount 10 --tax-mode net\n  mediaplan calendar --year 2024 --month 2\n  mediaplan simulate scenario.toml"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to mediaplan.toml (defaults to ./mediaplan.toml)")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "List the valid days of a plan month with weekday labels")]
    Calendar {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
    },
    #[command(about = "Compute net, gross, tax and order totals for one set of inputs")]
    Price {
        #[arg(long)]
        unit_price: Decimal,
        #[arg(long, default_value = "0")]
        discount: Decimal,
        #[arg(long, default_value = "0")]
        surcharge: Decimal,
        #[arg(long, help = "net | gross")]
        tax_mode: String,
        #[arg(long, default_value = "1")]
        multiplier: Decimal,
    },
    #[command(about = "Replay a scenario file of line edits and print the resulting line")]
    Simulate {
        #[arg(help = "Scenario TOML file")]
        scenario: PathBuf,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions { config_path: cli.config, ..LoadOptions::default() };

    if let Ok(config) = AppConfig::load(options.clone()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(&options) }
        }
        Command::Calendar { year, month } => commands::calendar::run(year, month),
        Command::Price { unit_price, discount, surcharge, tax_mode, multiplier } => {
            commands::price::run(
                &options,
                commands::price::PriceArgs {
                    unit_price,
                    discount,
                    surcharge,
                    tax_mode,
                    multiplier,
                },
            )
        }
        Command::Simulate { scenario } => commands::simulate::run(&options, &scenario),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}
