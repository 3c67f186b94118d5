use std::process::ExitCode;

fn main() -> ExitCode {
    match standard_linearity::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
