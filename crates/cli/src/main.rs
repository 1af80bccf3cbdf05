use std::process::ExitCode;

fn main() -> ExitCode {
    brickwise_cli::run()
}
