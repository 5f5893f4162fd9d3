use std::io;
use std::process::ExitCode;

use mnemo_tools::McpServer;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let server = match McpServer::new() {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "failed to construct mnemo-toolsd server");
            return ExitCode::FAILURE;
        }
    };

    let mode = std::env::var("MNEMO_TRANSPORT").unwrap_or_else(|_| "stdio".to_string());
    let result: io::Result<()> = match mode.as_str() {
        "stdio" => server.serve_stdio().await,
        "http" => {
            let addr = std::env::var("MNEMO_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8787".to_string());
            server.serve_http(&addr).await
        }
        other => {
            tracing::error!(transport = %other, "MNEMO_TRANSPORT must be stdio or http");
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "mnemo-toolsd exited with an error");
            ExitCode::FAILURE
        }
    }
}
