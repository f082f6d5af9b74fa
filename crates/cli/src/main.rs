use std::process::ExitCode;

fn main() -> ExitCode {
    mediaplan_cli::run()
}
