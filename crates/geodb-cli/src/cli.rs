use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "geodb",
    about = "GeoDB: geospatial object store with live proximity events",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the GeoDB server
    Serve(ServeArgs),
    /// Print the configuration as TOML
    Config(ConfigArgs),
    /// List object keys stored in a data directory
    Keys(StoreArgs),
    /// Show objects by key
    Get(GetArgs),
    /// Show objects whose key starts with a prefix
    Seek(SeekArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Address to listen on (overrides the configuration file)
    #[arg(short, long)]
    pub bind: Option<SocketAddr>,
    /// Directory for the commit log (overrides the configuration file)
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Show the effective configuration loaded from this file instead of
    /// the defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct StoreArgs {
    /// Data directory of a GeoDB server
    #[arg(short, long)]
    pub data_dir: PathBuf,
}

#[derive(Args)]
pub struct GetArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    /// Object keys
    #[arg(required = true)]
    pub keys: Vec<String>,
}

#[derive(Args)]
pub struct SeekArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    /// Key prefix
    pub prefix: String,
}
