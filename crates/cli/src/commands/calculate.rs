use std::fs;
use std::path::Path;

use anyhow::Context;
use presswork_core::{calculate_pricing, PricingInput};

use crate::commands::{load_config, CommandResult};

pub fn run(input_path: &Path) -> CommandResult {
    let config = match load_config("calculate") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let input = match read_input(input_path) {
        Ok(input) => input,
        Err(error) => {
            return CommandResult::failure("calculate", "invalid_input", format!("{error:#}"), 7);
        }
    };

    let breakdown = match calculate_pricing(&input, &config.pricing) {
        Ok(breakdown) => breakdown,
        Err(error) => {
            return CommandResult::failure("calculate", "invalid_input", error.to_string(), 7);
        }
    };
    CommandResult::success_with_data(
        "calculate",
        format!("total {} for {} units", breakdown.total_amount, input.quantity),
        &breakdown,
    )
}

fn read_input(path: &Path) -> anyhow::Result<PricingInput> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read pricing input `{}`", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("pricing input `{}` is not valid JSON", path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::read_input;

    #[test]
    fn read_input_fills_unset_fields_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"quantity": 500, "color_front": 4, "varnish": true}}"#).expect("write");

        let input = read_input(file.path()).expect("input should parse");
        assert_eq!(input.quantity, 500);
        assert_eq!(input.color_front, 4);
        assert!(input.varnish);
        assert!(input.additional_items.is_empty());
        assert_eq!(input.gsm, None);
    }

    #[test]
    fn read_input_names_the_offending_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "not json").expect("write");

        let error = read_input(file.path()).expect_err("garbage must be rejected");
        assert!(format!("{error:#}").contains("is not valid JSON"));

        let missing = read_input(std::path::Path::new("/nonexistent/job.json"))
            .expect_err("missing file must be rejected");
        assert!(format!("{missing:#}").contains("failed to read pricing input"));
    }
}
