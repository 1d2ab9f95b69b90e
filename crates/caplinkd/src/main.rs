use std::process::ExitCode;

fn main() -> ExitCode {
    match caplinkd::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            // Telemetry may not be installed yet when startup fails.
            eprintln!("caplinkd: {error}");
            ExitCode::FAILURE
        }
    }
}
