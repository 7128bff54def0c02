use std::process::ExitCode;

fn main() -> ExitCode {
    autoprice_cli::run()
}
