use clap::{Args, Subcommand};
use synergy_core::domain::product::ProductId;

use crate::commands::{
    application_failure, parse_today, parse_window, run_against_database, stock_analyzer,
    CommandResult, Failure,
};

#[derive(Debug, Clone, Subcommand)]
pub enum StockCommand {
    #[command(about = "Daily stock balance for a product across a date range")]
    History {
        #[arg(long)]
        product: i64,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },
    #[command(about = "Split on-hand units into expired, critical age, stock over and ok")]
    Classify(ReferenceDay),
    #[command(about = "Units on hand and their value at the latest unit cost")]
    Total {
        #[arg(long, help = "Reference day (YYYY-MM-DD), defaults to today")]
        today: Option<String>,
    },
    #[command(about = "Markup and margin for one product or the whole catalog")]
    Markup(ReferenceDay),
}

#[derive(Debug, Clone, Args)]
pub struct ReferenceDay {
    #[arg(long, help = "Limit to one product; omit for every stocked product")]
    pub product: Option<i64>,
    #[arg(long, help = "Reference day (YYYY-MM-DD), defaults to today")]
    pub today: Option<String>,
}

pub fn run(command: StockCommand) -> CommandResult {
    match command {
        StockCommand::History { product, start, end } => history(product, &start, &end),
        StockCommand::Classify(args) => classify(args),
        StockCommand::Total { today } => total(today.as_deref()),
        StockCommand::Markup(args) => markup(args),
    }
}

fn history(product: i64, start: &str, end: &str) -> CommandResult {
    let window = match parse_window("stock-history", start, end) {
        Ok(window) => window,
        Err(result) => return result,
    };

    run_against_database("stock-history", |config, pool| async move {
        let history = stock_analyzer(&config, &pool)
            .stock_history(ProductId(product), window)
            .await
            .map_err(application_failure)?;
        Ok::<_, Failure>(CommandResult::with_data(
            "stock-history",
            format!("{} points for {}", history.history.len(), history.product_name),
            &history,
        ))
    })
}

fn classify(args: ReferenceDay) -> CommandResult {
    let today = match parse_today("stock-classify", args.today.as_deref()) {
        Ok(today) => today,
        Err(result) => return result,
    };

    run_against_database("stock-classify", |config, pool| async move {
        let analyzer = stock_analyzer(&config, &pool);
        let classification = match args.product {
            Some(product) => analyzer.classify_stock(ProductId(product), today).await,
            None => analyzer.classify_all(today).await,
        }
        .map_err(application_failure)?;
        Ok::<_, Failure>(CommandResult::with_data(
            "stock-classify",
            format!("{} units classified", classification.total),
            &classification,
        ))
    })
}

fn total(today: Option<&str>) -> CommandResult {
    let today = match parse_today("stock-total", today) {
        Ok(today) => today,
        Err(result) => return result,
    };

    run_against_database("stock-total", |config, pool| async move {
        let total =
            stock_analyzer(&config, &pool).stock_total(today).await.map_err(application_failure)?;
        Ok::<_, Failure>(CommandResult::with_data(
            "stock-total",
            format!("{} units worth {}", total.quantity, total.value),
            &total,
        ))
    })
}

fn markup(args: ReferenceDay) -> CommandResult {
    let today = match parse_today("markup", args.today.as_deref()) {
        Ok(today) => today,
        Err(result) => return result,
    };

    run_against_database("markup", |config, pool| async move {
        let analyzer = stock_analyzer(&config, &pool);
        let figures = match args.product {
            Some(product) => analyzer.product_markup(ProductId(product), today).await,
            None => analyzer.general_markup(today).await,
        }
        .map_err(application_failure)?;

        let message = match &figures {
            Some(figures) => format!("markup {}%, margin {}%", figures.markup_value, figures.margin_value),
            None => "no cost data".to_string(),
        };
        Ok::<_, Failure>(CommandResult::with_data("markup", message, &figures))
    })
}
