pub mod handlers;

use clap::Parser;
use sy_core::SyError;
use sy_server::ServerError;
use thiserror::Error;

use crate::presentation::cli::{Cli, Commands};

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Sync(#[from] SyError),

    #[error(transparent)]
    Server(#[from] ServerError),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Sync(e) => e.exit_code(),
            CliError::Server(e) => e.exit_code(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Index(args) => handlers::handle_index(args.into()).await,
        Commands::Server(args) => handlers::handle_server(args.into()).await,
    }
}
