use clap::Args;
use synergy_core::analysis::{AnalysisMode, ComparisonRequest};
use synergy_core::domain::product::ProductId;
use synergy_core::insights::InsightGenerator;

use crate::commands::{
    application_failure, parse_today, parse_window, run_against_database, sales_analyzer,
    stock_analyzer, CommandResult, Failure,
};

#[derive(Debug, Clone, Args)]
pub struct InsightsArgs {
    #[arg(long)]
    pub product: i64,
    #[arg(long)]
    pub start: String,
    #[arg(long)]
    pub end: String,
    #[arg(long, help = "Reference day for the stock split, defaults to --end")]
    pub today: Option<String>,
    #[arg(long, help = "Skip the stock classification")]
    pub without_stock: bool,
}

pub fn run(args: InsightsArgs) -> CommandResult {
    let window = match parse_window("insights", &args.start, &args.end) {
        Ok(window) => window,
        Err(result) => return result,
    };
    let today = match args.today.as_deref() {
        Some(raw) => match parse_today("insights", Some(raw)) {
            Ok(today) => today,
            Err(result) => return result,
        },
        None => window.end(),
    };

    run_against_database("insights", |config, pool| async move {
        let product_id = ProductId(args.product);
        let request = ComparisonRequest::single(window, AnalysisMode::Compare);
        let report = sales_analyzer(&config, &pool)?
            .assemble(product_id, &request, None)
            .await
            .map_err(application_failure)?;
        let Some(analysis) = report.analysis else {
            return Err(("invalid_request", "no date range enabled".to_string(), 2u8));
        };
        let stock = if args.without_stock {
            None
        } else {
            Some(
                stock_analyzer(&config, &pool)
                    .classify_stock(product_id, today)
                    .await
                    .map_err(application_failure)?,
            )
        };

        let report = InsightGenerator::default().generate(&analysis, stock.as_ref());
        Ok::<_, Failure>(CommandResult::with_data("insights", report.summary.clone(), &report))
    })
}
