mod cli;
mod commands;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use skillvault_core::{Actor, Config, ServiceError, SkillService};
use skillvault_package::DirectoryPolicy;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber();

    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    if let Err(err) = dispatch(cli, &config).await {
        if let Some(service_err) = err.downcast_ref::<ServiceError>() {
            eprintln!("error [{}]: {err:#}", service_err.code());
            std::process::exit(1);
        }
        return Err(err);
    }
    Ok(())
}

async fn dispatch(cli: Cli, config: &Config) -> anyhow::Result<()> {
    if let Commands::Validate { archive, warn_dirs } = &cli.command {
        let mut options = config.ingest_options();
        if *warn_dirs {
            options.directory_policy = DirectoryPolicy::Warn;
        }
        return commands::validate(archive, &options, cli.json);
    }

    let service = SkillService::open(config)
        .await
        .with_context(|| format!("failed to open {}", config.storage.sqlite_path))?;
    let actor = Actor {
        id: cli.actor,
        is_admin: cli.admin,
    };
    let result = commands::run(cli.command, &service, &actor, cli.json).await;
    service.store().close().await;
    result
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config_path(flag: Option<&Path>) -> PathBuf {
    if let Some(path) = flag {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("SKILLVAULT_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}
