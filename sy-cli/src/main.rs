mod application;
mod presentation {
    pub mod cli;
}

use std::process::ExitCode;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sy=info,sy_core=info,sy_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match application::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("sy: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
