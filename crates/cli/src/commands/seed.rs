use crate::commands::{run_against_database, CommandResult, Failure};
use synergy_db::{DemoSeedDataset, SeedResult};

pub fn run() -> CommandResult {
    run_against_database("seed", |_config, pool| async move {
        let seed_result = DemoSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = DemoSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        if !verification.all_present {
            let failed_checks = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(*check))
                .collect::<Vec<_>>();
            return Err(("seed_verification", verification_message(&failed_checks), 6u8));
        }

        Ok::<_, Failure>(CommandResult::success("seed", seed_summary(&seed_result)))
    })
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

fn seed_summary(result: &SeedResult) -> String {
    format!(
        "demo dataset loaded: {} products, {} purchases, {} purchase items, {} stock movements, {} lots",
        result.products, result.purchases, result.items, result.movements, result.lots
    )
}

#[cfg(test)]
mod tests {
    use super::{seed_summary, verification_message};
    use synergy_db::SeedResult;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        assert_eq!(
            verification_message(&["purchase-items", "anchor-product"]),
            "Seed verification failed for checks: purchase-items, anchor-product"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        assert_eq!(verification_message(&[]), "Some seed data failed to load");
    }

    #[test]
    fn summary_lists_every_table() {
        let summary = seed_summary(&SeedResult {
            products: 15,
            purchases: 40,
            items: 158,
            movements: 54,
            lots: 8,
        });
        assert!(summary.contains("15 products"));
        assert!(summary.contains("8 lots"));
    }
}
