use chrono::{NaiveDate, Utc};
use presswork_core::{Actor, QuotationLifecycle};
use presswork_db::repositories::SqlQuotationRepository;
use presswork_db::{DbPool, QuotationRepository};
use serde::Serialize;

use crate::commands::{load_config, open_migrated_pool, runtime, CommandResult, StepFailure};

#[derive(Debug, Serialize)]
struct ExpiryReport {
    as_of: NaiveDate,
    expired: Vec<String>,
}

pub fn run(as_of: Option<&str>) -> CommandResult {
    let as_of = match parse_as_of(as_of) {
        Ok(as_of) => as_of,
        Err(message) => return CommandResult::failure("expire", "invalid_input", message, 7),
    };
    let config = match load_config("expire") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("expire") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_migrated_pool(&config).await?;
        let outcome = expire_stale(&pool, as_of).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(expired) => {
            let message = format!("expired {} quotation(s) valid until before {as_of}", expired.len());
            CommandResult::success_with_data("expire", message, &ExpiryReport { as_of, expired })
        }
        Err(failure) => CommandResult::from_step("expire", failure),
    }
}

fn parse_as_of(raw: Option<&str>) -> Result<NaiveDate, String> {
    match raw {
        None => Ok(Utc::now().date_naive()),
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map_err(|_| format!("--as-of `{raw}` is not a YYYY-MM-DD date")),
    }
}

/// Moves every open quotation whose validity ended before `as_of` into `expired`,
/// recording a history row per quotation under the system actor.
async fn expire_stale(pool: &DbPool, as_of: NaiveDate) -> Result<Vec<String>, StepFailure> {
    let repository = SqlQuotationRepository::new(pool.clone());
    let lifecycle = QuotationLifecycle::default();
    let actor = Actor::system();

    let candidates = repository
        .list_expirable(as_of)
        .await
        .map_err(|error| ("persistence", error.to_string(), 8u8))?;

    let mut expired = Vec::with_capacity(candidates.len());
    for mut quotation in candidates {
        let entry = lifecycle
            .expire(&mut quotation, &actor, Utc::now())
            .map_err(|error| ("lifecycle", error.to_string(), 9u8))?;
        repository
            .record_transition(&quotation, &entry)
            .await
            .map_err(|error| ("persistence", error.to_string(), 8u8))?;
        expired.push(quotation.quotation_number);
    }

    Ok(expired)
}
