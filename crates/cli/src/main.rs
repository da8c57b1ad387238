use std::process::ExitCode;

fn main() -> ExitCode {
    ridehub_cli::run()
}
