pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "presswork",
    about = "Presswork operator CLI",
    long_about = "Operate the Presswork quotation engine: migrations, config inspection, readiness checks, demo data, price previews and quotation expiry.",
    after_help = "Examples:\n  presswork doctor --json\n  presswork calculate --input job.json\n  presswork expire --as-of 2026-01-31"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo customers; running it twice leaves the same rows")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Price a job described by a JSON file using the configured rate card")]
    Calculate {
        #[arg(long, value_name = "FILE", help = "Path to a pricing input JSON document")]
        input: PathBuf,
    },
    #[command(about = "Expire draft, sent and approved quotations whose validity has ended")]
    Expire {
        #[arg(
            long = "as-of",
            value_name = "YYYY-MM-DD",
            help = "Cut-off date; quotations valid until before it expire (defaults to today)"
        )]
        as_of: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Calculate { input } => commands::calculate::run(&input),
        Command::Expire { as_of } => commands::expire::run(as_of.as_deref()),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn expire_accepts_an_optional_cut_off() {
        let cli = Cli::try_parse_from(["presswork", "expire", "--as-of", "2026-01-31"])
            .expect("expire should parse");
        assert!(matches!(cli.command, Command::Expire { as_of: Some(ref date) } if date == "2026-01-31"));

        let cli = Cli::try_parse_from(["presswork", "expire"]).expect("as-of is optional");
        assert!(matches!(cli.command, Command::Expire { as_of: None }));
    }

    #[test]
    fn calculate_requires_an_input_file() {
        assert!(Cli::try_parse_from(["presswork", "calculate"]).is_err());
        assert!(Cli::try_parse_from(["presswork", "calculate", "--input", "job.json"]).is_ok());
    }
}
