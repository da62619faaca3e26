use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ovl",
    about = "Overlay proxy: serve local overrides in front of a remote origin",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OriginScheme {
    Http,
    Https,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the overlay proxy
    Serve(ServeArgs),
    /// Print the on-disk filename for a request path
    Key(KeyArgs),
    /// Show a stored entry
    Show(ShowArgs),
    /// Delete a stored entry
    Rm(RmArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML config file; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Address to listen on, e.g. `:8080` or `127.0.0.1:8080`
    #[arg(long, value_parser = parse_listen)]
    pub listen: Option<SocketAddr>,
    /// Origin `host[:port]` that misses are forwarded to
    #[arg(long)]
    pub origin: Option<String>,
    /// Store root directory
    #[arg(long)]
    pub data: Option<PathBuf>,
    #[arg(long)]
    pub origin_scheme: Option<OriginScheme>,
    /// Skip certificate checks on the origin leg
    #[arg(long)]
    pub insecure: bool,
    /// Write entries to a temp file and publish them on completion
    #[arg(long)]
    pub staged_writes: bool,
    /// Buffer at most this many bytes of a local response before deciding
    /// hit or miss
    #[arg(long)]
    pub max_shadow_bytes: Option<usize>,
    /// Give up on a request after this many seconds
    #[arg(long, value_name = "SECS")]
    pub request_timeout: Option<u64>,
}

#[derive(Args)]
pub struct KeyArgs {
    pub path: String,
}

#[derive(Args)]
pub struct ShowArgs {
    pub path: String,
    #[arg(long, default_value = "/tmp/ovl")]
    pub data: PathBuf,
}

#[derive(Args)]
pub struct RmArgs {
    pub path: String,
    #[arg(long, default_value = "/tmp/ovl")]
    pub data: PathBuf,
}

/// Accepts a full socket address or a bare `:port`, which binds every
/// interface.
pub fn parse_listen(s: &str) -> Result<SocketAddr, String> {
    let full = if s.starts_with(':') {
        format!("0.0.0.0{s}")
    } else {
        s.to_string()
    };
    full.parse()
        .map_err(|e| format!("invalid listen address {s:?}: {e}"))
}
