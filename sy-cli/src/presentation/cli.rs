use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use sy_core::config::{
    DEFAULT_API, DEFAULT_BLOCK_SIZE, DEFAULT_FLUSH_THRESHOLD, DEFAULT_MAX_BATCH_BYTES, DEFAULT_ROOT,
};
use sy_core::protocol::Framing;
use sy_core::{RetryPolicy, SyncConfig};
use sy_server::ServerArgs;

#[derive(Parser, Debug)]
#[command(author, version, about = "sy: content-addressed file sync", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chunk the working tree and upload whatever the server is missing
    Index(IndexArgs),

    /// Run the chunk store server
    Server(ServerArgs),
}

#[derive(Args, Clone, Debug)]
pub struct IndexArgs {
    /// Directory tree to index
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Base URL of the sy server
    #[arg(long, env = "SY_API", default_value = DEFAULT_API)]
    pub api: String,

    /// Local index directory, relative paths resolve against DIR
    #[arg(long, env = "SY_ROOT", default_value = DEFAULT_ROOT)]
    pub root: PathBuf,

    /// Block size in bytes
    #[arg(long, env = "SY_BLOCK_SIZE", default_value_t = DEFAULT_BLOCK_SIZE, value_parser = positive_size)]
    pub block_size: usize,

    /// Pending upload bytes that trigger a batch
    #[arg(long, env = "SY_THRESHOLD", default_value_t = DEFAULT_FLUSH_THRESHOLD)]
    pub threshold: u64,

    /// Largest payload of one upload request; keep below the server's body limit
    #[arg(long, env = "SY_MAX_BATCH", default_value_t = DEFAULT_MAX_BATCH_BYTES)]
    pub max_batch: u64,

    /// Frame diff requests as JSON-RPC 2.0
    #[arg(long, env = "SY_RPC")]
    pub rpc: bool,

    /// Attempts per request before giving up
    #[arg(long, env = "SY_RETRIES", default_value_t = RetryPolicy::default().attempts)]
    pub retries: u32,
}

fn positive_size(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".into()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

impl From<IndexArgs> for SyncConfig {
    fn from(a: IndexArgs) -> Self {
        Self {
            workdir: a.dir,
            root: a.root,
            api: a.api,
            block_size: a.block_size,
            flush_threshold: a.threshold,
            max_batch_bytes: a.max_batch,
            framing: if a.rpc {
                Framing::JsonRpc
            } else {
                Framing::Plain
            },
            retry: RetryPolicy {
                attempts: a.retries.max(1),
                ..RetryPolicy::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_args(argv: &[&str]) -> IndexArgs {
        match Cli::try_parse_from(argv.iter().copied()).unwrap().command {
            Commands::Index(a) => a,
            other => panic!("expected index, got {other:?}"),
        }
    }

    #[test]
    fn index_defaults_match_sync_config() {
        let cfg: SyncConfig = index_args(&["sy", "index"]).into();
        let def = SyncConfig::default();
        assert_eq!(cfg.workdir, def.workdir);
        assert_eq!(cfg.root, def.root);
        assert_eq!(cfg.block_size, def.block_size);
        assert_eq!(cfg.flush_threshold, def.flush_threshold);
        assert_eq!(cfg.max_batch_bytes, def.max_batch_bytes);
        assert_eq!(cfg.retry, def.retry);
        assert_eq!(cfg.framing, Framing::Plain);
    }

    #[test]
    fn index_flags_override_defaults() {
        let cfg: SyncConfig = index_args(&[
            "sy",
            "index",
            "/data",
            "--api",
            "http://sync:9000",
            "--block-size",
            "1024",
            "--threshold",
            "4096",
            "--max-batch",
            "2048",
            "--rpc",
            "--retries",
            "1",
        ])
        .into();
        assert_eq!(cfg.workdir, PathBuf::from("/data"));
        assert_eq!(cfg.api, "http://sync:9000");
        assert_eq!(cfg.block_size, 1024);
        assert_eq!(cfg.flush_threshold, 4096);
        assert_eq!(cfg.max_batch_bytes, 2048);
        assert_eq!(cfg.framing, Framing::JsonRpc);
        assert_eq!(cfg.retry.attempts, 1);
    }

    #[test]
    fn zero_block_size_is_rejected() {
        assert!(Cli::try_parse_from(["sy", "index", "--block-size", "0"]).is_err());
    }

    #[test]
    fn server_flags_parse() {
        let cli = Cli::try_parse_from(["sy", "server", "--port", "9090", "--root", "/srv/sy"]).unwrap();
        match cli.command {
            Commands::Server(a) => {
                assert_eq!(a.port, 9090);
                assert_eq!(a.root, PathBuf::from("/srv/sy"));
            }
            other => panic!("expected server, got {other:?}"),
        }
    }
}
