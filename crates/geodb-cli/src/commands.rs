use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use geodb_hub::Hub;
use geodb_kv::MemoryEngine;
use geodb_server::{GeoDbServer, ServerConfig};
use geodb_service::{GeoDb, Object};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Config(args) => cmd_config(args),
        Command::Keys(args) => cmd_keys(args, &cli.format),
        Command::Get(args) => cmd_get(args, &cli.format),
        Command::Seek(args) => cmd_seek(args, &cli.format),
    }
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = resolve_config(&args)?;
    let storage = match &config.data_dir {
        Some(dir) => dir.display().to_string(),
        None => "in-memory".to_string(),
    };
    println!(
        "{} GeoDB server on {} (storage: {})",
        "▶".green().bold(),
        config.bind_addr.to_string().bold(),
        storage.cyan()
    );

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(GeoDbServer::new(config).serve())?;
    println!("{} Server stopped.", "✓".green());
    Ok(())
}

fn cmd_config(args: ConfigArgs) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    print!("{}", config.to_toml()?);
    Ok(())
}

fn cmd_keys(args: StoreArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let db = open_store(&args.data_dir)?;
    let keys = db.keys()?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&keys)?),
        OutputFormat::Text => {
            for key in &keys {
                println!("{key}");
            }
            println!("{} {} keys", "✓".green(), keys.len().to_string().bold());
        }
    }
    Ok(())
}

fn cmd_get(args: GetArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let db = open_store(&args.store.data_dir)?;
    let objects = db.get(&args.keys)?;
    print_objects(&objects, format)
}

fn cmd_seek(args: SeekArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let db = open_store(&args.store.data_dir)?;
    let objects = db.seek(&args.prefix)?;
    print_objects(&objects, format)
}

/// Load the configuration file if given and apply the command-line
/// overrides.
fn resolve_config(args: &ServeArgs) -> anyhow::Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(dir) = &args.data_dir {
        config.data_dir = Some(dir.clone());
    }
    Ok(config)
}

fn load_config(path: &Path) -> anyhow::Result<ServerConfig> {
    ServerConfig::load(path).with_context(|| format!("failed to load {}", path.display()))
}

/// Open a server's data directory for inspection. Nothing is written.
fn open_store(data_dir: &Path) -> anyhow::Result<GeoDb> {
    if !data_dir.is_dir() {
        bail!("data directory not found: {}", data_dir.display());
    }
    let engine = MemoryEngine::open_read_only(data_dir)
        .with_context(|| format!("failed to open {}", data_dir.display()))?;
    Ok(GeoDb::new(engine, Arc::new(Hub::new())))
}

fn print_objects(objects: &BTreeMap<String, Object>, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(objects)?),
        OutputFormat::Text => {
            for object in objects.values() {
                println!("{}", describe(object));
                for (name, value) in &object.metadata {
                    println!("    {} = {}", name.dimmed(), value);
                }
            }
            println!("{} {} objects", "✓".green(), objects.len().to_string().bold());
        }
    }
    Ok(())
}

fn describe(object: &Object) -> String {
    let position = match &object.point {
        Some(point) => point.to_string(),
        None => "no position".to_string(),
    };
    let mut line = format!(
        "{}  {}  r={}m  updated {}",
        object.key.yellow().bold(),
        position.cyan(),
        object.radius,
        object.updated_unix
    );
    if object.expires_unix > 0 {
        line.push_str(&format!("  expires {}", object.expires_unix));
    }
    line
}
