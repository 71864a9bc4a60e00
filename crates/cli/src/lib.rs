pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::analyze::AnalyzeArgs;
use commands::insights::InsightsArgs;
use commands::related::RelatedArgs;
use commands::search::SearchArgs;
use commands::stock::StockCommand;

#[derive(Debug, Parser)]
#[command(
    name = "synergy",
    about = "SalesSynergy operator CLI",
    long_about = "Run sales comparison, cross-sell and stock analyses against the SalesSynergy database.",
    after_help = "Examples:\n  synergy seed\n  synergy analyze --product 1 --start 2023-10-05 --end 2023-10-10\n  synergy stock total --today 2023-10-10\n  synergy doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo dataset and verify it")]
    Seed,
    #[command(about = "Find a product by name fragment or id")]
    Search(SearchArgs),
    #[command(about = "Compare a product's sales across periods or against a rival product")]
    Analyze(AnalyzeArgs),
    #[command(about = "Rank products bought together with a product inside a date range")]
    Related(RelatedArgs),
    /// Stock history, classification, valuation and markup
    #[command(subcommand)]
    Stock(StockCommand),
    #[command(about = "Summarize a product's sales and stock as narrative insights")]
    Insights(InsightsArgs),
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config and database readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Search(args) => commands::search::run(args),
        Command::Analyze(args) => commands::analyze::run(args),
        Command::Related(args) => commands::related::run(args),
        Command::Stock(command) => commands::stock::run(command),
        Command::Insights(args) => commands::insights::run(args),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
