use std::process::ExitCode;

fn main() -> ExitCode {
    match caplink_cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("caplink: {error}");
            ExitCode::FAILURE
        }
    }
}
