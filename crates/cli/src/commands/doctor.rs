use serde::Serialize;
use synergy_core::analysis::AnalysisSettings;
use synergy_core::config::{AppConfig, LoadOptions};
use synergy_db::{connect_with_config, DemoSeedDataset};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_analysis_settings(&config));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["analysis_settings", "database_connectivity", "demo_dataset"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    // the demo dataset is optional
    let all_pass = checks
        .iter()
        .filter(|check| check.name != "demo_dataset")
        .all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_analysis_settings(config: &AppConfig) -> DoctorCheck {
    match AnalysisSettings::try_from(&config.analysis) {
        Ok(settings) => DoctorCheck {
            name: "analysis_settings",
            status: CheckStatus::Pass,
            details: format!(
                "history starts {}, top {} related products",
                settings.history_start, settings.related_limit
            ),
        },
        Err(error) => DoctorCheck {
            name: "analysis_settings",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            }];
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;

        // a fresh database has no tables yet; that only means `migrate` has not run
        let seeded = DemoSeedDataset::verify(&pool).await.ok().map(|result| result.all_present);
        pool.close().await;
        Ok::<Option<bool>, String>(seeded)
    });

    match result {
        Ok(seeded) => vec![
            DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Pass,
                details: format!("connected using `{}`", config.database.url),
            },
            DoctorCheck {
                name: "demo_dataset",
                status: if seeded == Some(true) { CheckStatus::Pass } else { CheckStatus::Skipped },
                details: match seeded {
                    Some(true) => "demo dataset present".to_string(),
                    Some(false) => "demo dataset not loaded (run `synergy seed`)".to_string(),
                    None => "schema not migrated (run `synergy migrate`)".to_string(),
                },
            },
        ],
        Err(error) => vec![DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Fail,
            details: error,
        }],
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
