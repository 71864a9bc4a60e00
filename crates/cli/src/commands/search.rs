use clap::Args;
use synergy_core::domain::product::SearchBy;

use crate::commands::{
    application_failure, run_against_database, sales_analyzer, CommandResult, Failure,
};

#[derive(Debug, Clone, Args)]
pub struct SearchArgs {
    #[arg(help = "Product name fragment, or id with --by sku")]
    pub query: String,
    #[arg(long, default_value = "product", help = "product | sku")]
    pub by: String,
}

pub fn run(args: SearchArgs) -> CommandResult {
    let search_by = match args.by.parse::<SearchBy>() {
        Ok(search_by) => search_by,
        Err(error) => return CommandResult::failure("search", "input_parse", error, 2),
    };

    run_against_database("search", |config, pool| async move {
        let analyzer = sales_analyzer(&config, &pool)?;
        let product =
            analyzer.find_product(&args.query, search_by).await.map_err(application_failure)?;

        match product {
            Some(product) => Ok::<_, Failure>(CommandResult::with_data(
                "search",
                format!("found {}", product.name),
                &product,
            )),
            None => Err(("not_found", format!("no product matches `{}`", args.query), 7u8)),
        }
    })
}
