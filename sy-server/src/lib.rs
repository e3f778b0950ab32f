#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod routes;
pub mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

pub use config::{ServerArgs, ServerConfig};
pub use error::{Result, ServerError};
pub use routes::router;
pub use store::ServerStore;

/// Open the store under `cfg.root` and serve it until the listener fails.
pub async fn serve(cfg: ServerConfig) -> Result<()> {
    let store = Arc::new(ServerStore::open(&cfg.root).await?);
    let app = router(store, cfg.max_body);

    let addr = SocketAddr::new(cfg.bind, cfg.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, root = %cfg.root.display(), "sy server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
