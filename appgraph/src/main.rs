use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match appgraph::run_cli().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
