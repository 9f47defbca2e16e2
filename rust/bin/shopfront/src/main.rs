//! `shopfront`: drives the native side of the storefront app from a terminal.
//!
//! Each command boots the shell (config, adapters, bridge, deep links),
//! performs one interaction the way a page or the OS would, and prints the
//! resulting store as JSON.

mod adapters;
mod config;
mod handlers;
mod navigation;
mod shell;
mod widget;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::info;

use crate::adapters::{MemoryAnalytics, TracingAnalytics};
use crate::config::AppConfig;
use crate::shell::Shell;

/// Storefront app shell.
#[derive(Parser, Debug)]
#[command(name = "shopfront", about = "Native bridge for the server-driven storefront")]
struct Cli {
    /// Path to config file (default: ./shopfront.toml).
    #[arg(long = "config", global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dispatch a message as if a page emitted it.
    Emit {
        /// Channel name (e.g. add_to_cart).
        channel: String,
        /// JSON payload.
        payload: Option<String>,
    },

    /// Open a deep link (custom scheme or https).
    Open {
        uri: String,
    },

    /// Render a `{{ ... }}` template against the store after launch.
    Render {
        template: String,
    },

    /// Run a scripted shopping session.
    Demo,

    /// Write the effective config to the config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(cli.command, config, &config_path))
}

async fn run(command: Commands, config: AppConfig, config_path: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Emit { channel, payload } => {
            let payload: Value = match payload {
                Some(raw) => serde_json::from_str(&raw).context("payload is not valid JSON")?,
                None => Value::Null,
            };
            let mut shell = Shell::build(&config, Arc::new(TracingAnalytics));
            shell.start();
            let report = shell.emit(&channel, payload).await;
            info!(
                channel = %channel,
                invoked = report.invoked,
                failed = report.failed,
                fallback = report.fallback,
                "dispatched"
            );
            print_json(&shell.snapshot_json())?;
        }

        Commands::Open { uri } => {
            let mut shell = Shell::build(&config, Arc::new(TracingAnalytics));
            // Cold start: the link arrives before the first frame.
            shell.open(&uri);
            shell.start();
            print_json(&shell.snapshot_json())?;
        }

        Commands::Render { template } => {
            let mut shell = Shell::build(&config, Arc::new(TracingAnalytics));
            shell.start();
            println!("{}", shell.render(&template));
        }

        Commands::Demo => demo(&config).await?,
        Commands::Init { force } => {
            config.init(config_path, force)?;
            info!(path = %config_path.display(), "config written");
        }
    }
    Ok(())
}

async fn demo(config: &AppConfig) -> anyhow::Result<()> {
    let analytics = Arc::new(MemoryAnalytics::new());
    let mut shell = Shell::build(config, analytics.clone());

    shell.open("app://cart");
    let replayed = shell.start();
    info!(replayed, "launched");

    shell.emit("load_products", json!({ "first": 3 })).await;
    let first = shell.render("{{products.0.variantId}}");
    let second = shell.render("{{products.1.variantId}}");
    shell.emit("add_to_cart", json!({ "variantId": first })).await;
    shell
        .emit("add_to_cart", json!({ "variantId": second, "quantity": 2 }))
        .await;
    println!("badge: {}", shell.badge_label().unwrap_or_default());

    shell.emit("log_event", json!({ "name": "promo_banner_tap" })).await;
    shell.emit("teleport", Value::Null).await;
    println!("{}", shell.render("notice: {{notice.message}}"));

    shell.open("https://shop.example/nowhere");
    println!("{}", shell.render("route: {{app/route.screen}}"));

    shell
        .emit("start_payment", json!({ "amount": "60.00", "currency": "EUR" }))
        .await;
    println!(
        "{}",
        shell.render("payment: {{payment/status.state}} ({{payment/status.reference}})")
    );

    print_json(&shell.snapshot_json())?;
    let events: Vec<Value> = analytics
        .events()
        .into_iter()
        .map(|(name, properties)| json!({ "event": name, "properties": properties }))
        .collect();
    print_json(&Value::Array(events))?;

    let bridge = Arc::clone(shell.bridge());
    let leaked = shell.shutdown();
    anyhow::ensure!(leaked == 0, "{leaked} subscriptions leaked");
    info!(handlers = bridge.handler_count(), "demo finished");
    Ok(())
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
