use std::process::ExitCode;

fn main() -> ExitCode {
    presswork_cli::run()
}
