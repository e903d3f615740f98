use std::process::ExitCode;

use qwen3_cli::output;

#[tokio::main]
async fn main() -> ExitCode {
    match qwen3_cli::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::failure(format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}
