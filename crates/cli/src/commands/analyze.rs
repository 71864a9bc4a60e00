use clap::Args;
use synergy_core::analysis::{AnalysisMode, ComparisonRequest};
use synergy_core::domain::product::ProductId;

use crate::commands::{
    application_failure, parse_window, run_against_database, sales_analyzer, CommandResult, Failure,
};

#[derive(Debug, Clone, Args)]
pub struct AnalyzeArgs {
    #[arg(long, help = "Product id to analyze")]
    pub product: i64,
    #[arg(long, help = "First day of the range (YYYY-MM-DD)")]
    pub start: String,
    #[arg(long, help = "Last day of the range (YYYY-MM-DD)")]
    pub end: String,
    #[arg(long, default_value = "compare", help = "compare | until")]
    pub mode: String,
    #[arg(long, help = "Product to compare against in `until` mode")]
    pub rival: Option<i64>,
    #[arg(long, requires = "second_end", help = "First day of a second range; enables period over period")]
    pub second_start: Option<String>,
    #[arg(long, requires = "second_start", help = "Last day of the second range")]
    pub second_end: Option<String>,
}

pub fn run(args: AnalyzeArgs) -> CommandResult {
    let primary = match parse_window("analyze", &args.start, &args.end) {
        Ok(window) => window,
        Err(result) => return result,
    };
    let mode = match args.mode.parse::<AnalysisMode>() {
        Ok(mode) => mode,
        Err(error) => return CommandResult::failure("analyze", "input_parse", error.to_string(), 2),
    };

    let mut request = ComparisonRequest::single(primary, mode);
    if let (Some(start), Some(end)) = (args.second_start.as_deref(), args.second_end.as_deref()) {
        match parse_window("analyze", start, end) {
            Ok(window) => {
                request.secondary_window = Some(window);
                request.secondary_enabled = true;
            }
            Err(result) => return result,
        }
    }

    run_against_database("analyze", |config, pool| async move {
        let analyzer = sales_analyzer(&config, &pool)?;
        let report = analyzer
            .assemble(ProductId(args.product), &request, args.rival.map(ProductId))
            .await
            .map_err(application_failure)?;

        let message = match &report.analysis {
            Some(analysis) => format!(
                "{}: {} -> {} units",
                analysis.product_name, analysis.reference_count, analysis.current_count
            ),
            None => "no date range enabled".to_string(),
        };
        Ok::<_, Failure>(CommandResult::with_data("analyze", message, &report))
    })
}
