use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use clap::Args;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_ROOT: &str = "/tmp/sy";
/// A threshold-sized batch plus one default block, with headroom.
pub const DEFAULT_MAX_BODY: usize = 64 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    /// Server-side index and chunk store.
    pub root: PathBuf,
    pub max_body: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            root: PathBuf::from(DEFAULT_ROOT),
            max_body: DEFAULT_MAX_BODY,
        }
    }
}

/// Command-line surface shared by `sy server` and the `sy-server` binary.
#[derive(Args, Clone, Debug)]
pub struct ServerArgs {
    /// Listen port for the API server
    #[arg(long, env = "SY_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "SY_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Directory holding the server's chunk store
    #[arg(long, env = "SY_SERVER_ROOT", default_value = DEFAULT_ROOT)]
    pub root: PathBuf,

    /// Largest accepted request body in bytes
    #[arg(long, env = "SY_MAX_BODY", default_value_t = DEFAULT_MAX_BODY)]
    pub max_body: usize,
}

impl From<ServerArgs> for ServerConfig {
    fn from(a: ServerArgs) -> Self {
        Self {
            bind: a.bind,
            port: a.port,
            root: a.root,
            max_body: a.max_body,
        }
    }
}
