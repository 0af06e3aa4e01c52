//! ndifind - watch NDI sources appear and disappear on the network

use anyhow::{Context, Result};
use clap::Parser;
use ndifind_core::{logging, AppConfig};
use ndifind_discovery::{Finder, SourceEvent, SourceEventKind};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// ndifind - NDI source discovery
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "NDIFIND_CONFIG")]
    config: Option<PathBuf>,

    /// Include sources running on this machine
    #[arg(long)]
    show_local: bool,

    /// Only discover sources announced in this group (repeatable)
    #[arg(short, long = "group")]
    groups: Vec<String>,

    /// Extra remote address to query for sources (repeatable)
    #[arg(long = "extra-ip")]
    extra_ips: Vec<String>,

    /// Print the known sources after this many seconds and exit
    #[arg(short, long, value_name = "SECS")]
    list: Option<u64>,

    /// Print JSON lines instead of text
    #[arg(long)]
    json: bool,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::from_config_builder(path)
            .with_context(|| format!("Failed to load config file: {:?}", path))?,
        None => AppConfig::default(),
    };
    apply_overrides(&mut config, &args);
    config.validate().context("Invalid configuration")?;

    logging::init(&config.logging).context("Failed to initialise logging")?;

    let finder = Finder::new(config.finder.clone()).context("Failed to start source discovery")?;

    match args.list {
        Some(secs) => {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            print_sources(&finder, args.json)?;
        }
        None => watch(&finder, args.json).await?,
    }

    tokio::task::spawn_blocking(move || finder.close())
        .await
        .context("Finder shutdown task failed")?;

    Ok(())
}

fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if args.show_local {
        config.finder.show_local_sources = true;
    }
    if !args.groups.is_empty() {
        config.finder.groups = Some(args.groups.clone());
    }
    if !args.extra_ips.is_empty() {
        config.finder.extra_ips = Some(args.extra_ips.clone());
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
}

async fn watch(finder: &Finder, json: bool) -> Result<()> {
    let events = finder.subscribe()?;
    info!("Watching for sources, press Ctrl-C to stop");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => print_event(&event, json)?,
                Err(_) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}

fn print_event(event: &SourceEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    match event.kind {
        SourceEventKind::Found => println!("+ {}", event.source),
        SourceEventKind::Lost => println!("- {}", event.source.name()),
    }
    Ok(())
}

fn print_sources(finder: &Finder, json: bool) -> Result<()> {
    let sources = finder.sources();

    if json {
        println!("{}", serde_json::to_string(&*sources)?);
        return Ok(());
    }

    if sources.is_empty() {
        println!("No sources found");
    }
    for source in sources.iter() {
        println!("{}\t{}", source.name(), source.address());
    }
    Ok(())
}
