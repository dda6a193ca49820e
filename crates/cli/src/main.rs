use std::process::ExitCode;

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    pharmai_cli::run()
}
