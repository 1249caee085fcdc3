use std::process::ExitCode;

fn main() -> ExitCode {
    marketbot_cli::run()
}
