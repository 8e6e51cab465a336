use presswork_db::{DbPool, DemoSeedDataset};

use crate::commands::{load_config, open_migrated_pool, runtime, CommandResult, StepFailure};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_migrated_pool(&config).await?;

        let outcome = load_and_verify(&pool).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(customer_ids) => CommandResult::success(
            "seed",
            format!("demo customers ready: {}", customer_ids.join(", ")),
        ),
        Err(failure) => CommandResult::from_step("seed", failure),
    }
}

async fn load_and_verify(pool: &DbPool) -> Result<Vec<&'static str>, StepFailure> {
    let seeded = DemoSeedDataset::load(pool)
        .await
        .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
    let verification = DemoSeedDataset::verify(pool)
        .await
        .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

    if verification.all_present {
        Ok(seeded.customer_ids)
    } else {
        Err(("seed_verification", verification_message(&verification.checks), 6u8))
    }
}

fn verification_message(checks: &[(&'static str, bool)]) -> String {
    let missing = checks
        .iter()
        .filter_map(|(customer_id, present)| (!present).then_some(*customer_id))
        .collect::<Vec<_>>();

    if missing.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for customers: {}", missing.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_message;

    #[test]
    fn verification_message_names_missing_customers() {
        let checks = [("cust-demo-001", true), ("cust-demo-002", false), ("cust-demo-003", false)];

        assert_eq!(
            verification_message(&checks),
            "Seed verification failed for customers: cust-demo-002, cust-demo-003"
        );
    }

    #[test]
    fn verification_message_falls_back_to_generic_when_nothing_is_missing() {
        assert_eq!(verification_message(&[("cust-demo-001", true)]), "Some seed data failed to load");
    }
}
