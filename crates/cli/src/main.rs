use std::process::ExitCode;

fn main() -> ExitCode {
    synergy_cli::run()
}
