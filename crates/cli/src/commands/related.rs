use clap::Args;
use synergy_core::domain::product::ProductId;

use crate::commands::{
    application_failure, parse_window, run_against_database, sales_analyzer, CommandResult, Failure,
};

#[derive(Debug, Clone, Args)]
pub struct RelatedArgs {
    #[arg(long)]
    pub product: i64,
    #[arg(long)]
    pub start: String,
    #[arg(long)]
    pub end: String,
}

pub fn run(args: RelatedArgs) -> CommandResult {
    let window = match parse_window("related", &args.start, &args.end) {
        Ok(window) => window,
        Err(result) => return result,
    };

    run_against_database("related", |config, pool| async move {
        let analyzer = sales_analyzer(&config, &pool)?;
        let purchase_ids = analyzer.purchases_in(window).await.map_err(application_failure)?;

        let related = analyzer
            .related_products(ProductId(args.product), &purchase_ids)
            .await
            .map_err(application_failure)?;

        Ok::<_, Failure>(CommandResult::with_data(
            "related",
            format!("{} co-purchased products in {window}", related.len()),
            &related,
        ))
    })
}
