use std::env;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use synergy_cli::commands::analyze::{self, AnalyzeArgs};
use synergy_cli::commands::insights::{self, InsightsArgs};
use synergy_cli::commands::related::{self, RelatedArgs};
use synergy_cli::commands::search::{self, SearchArgs};
use synergy_cli::commands::stock::{self, ReferenceDay, StockCommand};
use synergy_cli::commands::{migrate, seed};

#[test]
fn migrate_returns_success_with_valid_env() {
    with_database(|| {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_invalid_env() {
    with_env(&[("SYNERGY_LOG_FORMAT", "xml")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_database(|| {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["command"], "seed");
        assert!(first_payload["message"].as_str().unwrap_or_default().contains("158 purchase items"));

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let second_payload = parse_payload(&second.output);
        assert_eq!(first_payload["message"], second_payload["message"]);
    });
}

#[test]
fn analyze_reports_period_comparison_for_seeded_data() {
    with_database(|| {
        assert_eq!(seed::run().exit_code, 0);

        let result = analyze::run(analyze_args(1, "2023-10-05", "2023-10-10"));
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let payload = parse_payload(&result.output);
        let analysis = &payload["data"]["analysis"];
        assert_eq!(analysis["startDateSales"], 8);
        assert_eq!(analysis["endDateSales"], 16);
        assert_eq!(analysis["salesDifference"]["percentage"], 100);
        assert_eq!(analysis["relatedProducts"][0]["productName"], "Guaraná Antarc. 1L");
        assert_eq!(payload["data"]["comparisonType"], "compare");
    });
}

#[test]
fn analyze_rejects_bad_input_and_unknown_products() {
    with_database(|| {
        assert_eq!(seed::run().exit_code, 0);

        let inverted = analyze::run(analyze_args(1, "2023-10-10", "2023-10-05"));
        assert_eq!(inverted.exit_code, 2);
        assert_eq!(parse_payload(&inverted.output)["error_class"], "input_parse");

        let missing = analyze::run(analyze_args(999, "2023-10-05", "2023-10-10"));
        assert_eq!(missing.exit_code, 7);
        assert_eq!(parse_payload(&missing.output)["error_class"], "not_found");

        let mut duplicate = analyze_args(1, "2023-10-05", "2023-10-10");
        duplicate.mode = "until".to_string();
        duplicate.rival = Some(1);
        let duplicate = analyze::run(duplicate);
        assert_eq!(parse_payload(&duplicate.output)["error_class"], "invalid_request");
    });
}

#[test]
fn related_ranks_co_purchases_inside_the_window() {
    with_database(|| {
        assert_eq!(seed::run().exit_code, 0);

        let result = related::run(RelatedArgs {
            product: 1,
            start: "2023-10-05".to_string(),
            end: "2023-10-10".to_string(),
        });
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "related");
        assert_eq!(payload["data"][0]["productName"], "Guaraná Antarc. 1L");
        assert_eq!(payload["data"][0]["occurrences"], 12);
        assert_eq!(payload["data"][0]["percentage"], 75);
    });
}

#[test]
fn search_and_stock_commands_read_seeded_data() {
    with_database(|| {
        assert_eq!(seed::run().exit_code, 0);

        let found = search::run(SearchArgs { query: "coca".to_string(), by: "product".to_string() });
        assert_eq!(parse_payload(&found.output)["data"]["id"], 3);

        let total = stock::run(StockCommand::Total { today: Some("2023-10-10".to_string()) });
        assert_eq!(parse_payload(&total.output)["data"]["quantity"], 574);

        let classified = stock::run(StockCommand::Classify(ReferenceDay {
            product: Some(1),
            today: Some("2023-10-10".to_string()),
        }));
        let classification = parse_payload(&classified.output);
        assert_eq!(classification["data"]["expired"]["units"], 30);
        assert_eq!(classification["data"]["total"], 70);
    });
}

#[test]
fn insights_summarize_sales_and_stock() {
    with_database(|| {
        assert_eq!(seed::run().exit_code, 0);

        let result = insights::run(InsightsArgs {
            product: 1,
            start: "2023-10-05".to_string(),
            end: "2023-10-10".to_string(),
            today: None,
            without_stock: false,
        });
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["insights"][0]["type"], "positive");
        assert!(payload["message"].as_str().unwrap_or_default().starts_with("Sales are up."));
    });
}

fn analyze_args(product: i64, start: &str, end: &str) -> AnalyzeArgs {
    AnalyzeArgs {
        product,
        start: start.to_string(),
        end: end.to_string(),
        mode: "compare".to_string(),
        rival: None,
        second_start: None,
        second_end: None,
    }
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

/// Runs `test_fn` against a fresh SQLite file in a temporary directory.
fn with_database(test_fn: impl FnOnce()) {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("synergy.db").display());
    with_env(&[("SYNERGY_DATABASE_URL", url.as_str())], test_fn);
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "SYNERGY_DATABASE_URL",
        "SYNERGY_DATABASE_MAX_CONNECTIONS",
        "SYNERGY_DATABASE_TIMEOUT_SECS",
        "SYNERGY_SERVER_BIND_ADDRESS",
        "SYNERGY_SERVER_PORT",
        "SYNERGY_ANALYSIS_HISTORY_START",
        "SYNERGY_ANALYSIS_RELATED_LIMIT",
        "SYNERGY_ANALYSIS_UNKNOWN_PRODUCT_LABEL",
        "SYNERGY_STOCK_COVERAGE_LOOKBACK_DAYS",
        "SYNERGY_STOCK_CRITICAL_COVERAGE_DAYS",
        "SYNERGY_STOCK_OVER_COVERAGE_DAYS",
        "SYNERGY_STOCK_EXPIRY_WARNING_DAYS",
        "SYNERGY_LOGGING_LEVEL",
        "SYNERGY_LOGGING_FORMAT",
        "SYNERGY_LOG_LEVEL",
        "SYNERGY_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
