//! ghmirror - GitHub organization mirror
//!
//! Main entry point for the ghmirror CLI.

mod commands;

use clap::Parser;
use commands::{Cli, Commands};
use ghmirror::config::{validate_config_result, MirrorConfig, Purpose};
use ghmirror::document::collection_for_key;
use ghmirror::github::{GitHubApi, GitHubClient};
use ghmirror::store::MirrorStore;
use ghmirror::sync::{StepStats, SyncEvent, SyncOptions, SyncOrchestrator};
use ghmirror::webhook::WebhookServer;
use ghmirror::{style, MirrorError};
use std::process;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = ghmirror::logging::init(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if let Err(e) = run(cli) {
        eprintln!("{} {}", style::error("Error:"), e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> ghmirror::Result<()> {
    let config = MirrorConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Sync {
            organization,
            repos,
            resources,
        } => {
            validate_config_result(&config, Purpose::Sync)?;
            let options = SyncOptions::new(organization)
                .with_repositories(repos)
                .with_resources(resources);
            runtime()?.block_on(handle_sync(&config, options))
        }
        Commands::Serve { bind } => {
            let mut config = config;
            if let Some(bind) = bind {
                config.webhook.bind = bind;
            }
            validate_config_result(&config, Purpose::Serve)?;
            runtime()?.block_on(handle_serve(&config))
        }
        Commands::Show { key } => {
            validate_config_result(&config, Purpose::Inspect)?;
            handle_show(&config, &key)
        }
        Commands::Stats => {
            validate_config_result(&config, Purpose::Inspect)?;
            handle_stats(&config)
        }
    }
}

fn runtime() -> ghmirror::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Runtime::new()?)
}

async fn handle_sync(config: &MirrorConfig, options: SyncOptions) -> ghmirror::Result<()> {
    let api: Arc<dyn GitHubApi> = Arc::new(GitHubClient::new(&config.github)?);
    let store = MirrorStore::open(&config.store)?;
    let orchestrator = SyncOrchestrator::new(api, store, config);

    let printer = tokio::spawn(print_events(orchestrator.subscribe()));
    let ctrl_c = orchestrator.listen_for_ctrl_c();

    let result = orchestrator.run(&options).await;
    ctrl_c.abort();
    drop(orchestrator);
    let _ = printer.await;

    let report = result?;
    if report.interrupted.is_empty() {
        println!("{}", style::success("Done. All Good!"));
    } else {
        println!(
            "{} {} interrupted: {}",
            style::warning("Done."),
            report.interrupted.len(),
            report.interrupted.join(", ")
        );
    }
    Ok(())
}

/// Print progress until the orchestrator goes away; returns events printed
async fn print_events(mut events: broadcast::Receiver<SyncEvent>) -> usize {
    let mut printed = 0;
    loop {
        match events.recv().await {
            Ok(event) => {
                print_event(&event);
                printed += 1;
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Progress printer fell behind");
            }
            Err(RecvError::Closed) => return printed,
        }
    }
}

fn print_event(event: &SyncEvent) {
    match event {
        SyncEvent::Started {
            organization,
            repositories,
        } => println!(
            "{} {} {}",
            style::header("Syncing"),
            organization,
            style::dim(&format!("({} repositories)", repositories))
        ),
        SyncEvent::RepoStarted { repository } => println!("{}", style::repo(repository)),
        SyncEvent::StepCompleted {
            resource, stats, ..
        } => match stats {
            StepStats::Fetch(s) => println!(
                "  {:<14} {} stored{}",
                resource.as_str(),
                style::count(s.stored),
                if s.unresolved > 0 {
                    format!(", {} unresolved", style::warning(&s.unresolved.to_string()))
                } else {
                    String::new()
                }
            ),
            StepStats::Reap(s) => println!(
                "  {:<14} {} checked, {} removed",
                resource.as_str(),
                style::count(s.checked),
                style::count(s.removed)
            ),
        },
        SyncEvent::RepoInterrupted { repository } => {
            println!("  {} {}", style::warning("interrupted"), repository)
        }
        SyncEvent::RepoCompleted { .. } | SyncEvent::Finished { .. } => {}
    }
}

async fn handle_serve(config: &MirrorConfig) -> ghmirror::Result<()> {
    let server = WebhookServer::from_config(config)?;
    println!(
        "{} {}",
        style::header("Listening for webhooks on"),
        style::path(&config.webhook.bind)
    );
    server
        .run(&config.webhook.bind)
        .await
        .map_err(|e| MirrorError::Other(e.to_string()))
}

fn handle_show(config: &MirrorConfig, key: &str) -> ghmirror::Result<()> {
    let collection = collection_for_key(key)
        .ok_or_else(|| MirrorError::Other(format!("Not a canonical key: {}", key)))?;
    let store = MirrorStore::open(&config.store)?;
    let document = store
        .get(collection, key)?
        .ok_or_else(|| MirrorError::Other(format!("{} is not in the mirror", key)))?;
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

fn handle_stats(config: &MirrorConfig) -> ghmirror::Result<()> {
    let store = MirrorStore::open(&config.store)?;
    println!(
        "{} {}",
        style::header("Mirror"),
        style::path(&config.store.path.display().to_string())
    );
    for collection in ghmirror::document::Collection::ALL {
        println!(
            "  {:<14} {}",
            collection.as_str(),
            style::count(store.count(collection)?)
        );
    }
    Ok(())
}
