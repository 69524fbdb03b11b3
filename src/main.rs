use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use databricks_mcp::client::{ClientHandle, MockWorkspace, RestClient, WorkspaceApi};
use databricks_mcp::config::Config;
use databricks_mcp::dispatch::Dispatcher;
use databricks_mcp::environment::RuntimeEnvironment;
use databricks_mcp::server::McpServer;
use databricks_mcp::tools::{ToolContext, ToolRegistry, ToolSettings};

mod cli;

use cli::Cli;
use cli::commands::Commands;

fn setup_logging(to_stderr: bool, default_level: &str) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));

    // stdout carries the protocol, so logs never go there
    if to_stderr {
        builder.target(env_logger::Target::Stderr).init();
        info!("Logging initialized, writing to stderr");
        return Ok(());
    }

    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(env!("CARGO_PKG_NAME"))
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join(format!("{}.log", env!("CARGO_PKG_NAME")));

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Tool context over either the live workspace or the sample mock
fn build_context(config: &Config, mock: bool) -> ToolContext {
    let client: Arc<ClientHandle<dyn WorkspaceApi>> = if mock {
        info!("Using built-in sample workspace");
        let sample: Arc<dyn WorkspaceApi> = Arc::new(MockWorkspace::sample());
        Arc::new(ClientHandle::from_client(sample))
    } else {
        let databricks = config.databricks.clone();
        // Built on first use so a bad token surfaces as a tool error, not a startup failure
        Arc::new(ClientHandle::new(move || {
            let client: Arc<dyn WorkspaceApi> = Arc::new(RestClient::from_config(&databricks)?);
            Ok(client)
        }))
    };

    let dispatcher =
        Dispatcher::new(RuntimeEnvironment::current()).with_worker_name(&config.runtime.worker_thread_name);
    ToolContext::new(client, Arc::new(dispatcher), ToolSettings::from_config(config))
}

fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    match cli.command_or_default() {
        Commands::Serve { mock } => handle_serve_command(config, mock),
        Commands::Tools { json } => handle_tools_command(config, json),
        Commands::Check => handle_check_command(config),
        Commands::Config => handle_config_command(config),
    }
}

fn handle_serve_command(config: &Config, mock: bool) -> Result<()> {
    if !mock {
        if let Err(e) = config.databricks.validate() {
            log::warn!("Workspace configuration incomplete, tool calls will fail until fixed: {}", e);
        }
    }

    let registry = ToolRegistry::standard(build_context(config, mock));
    let server = Arc::new(McpServer::new(registry).with_info(&config.server.name, &config.server.version));
    info!("Starting {:?}", server);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(server.run_stdio()).context("Tool server failed")?;
    Ok(())
}

fn handle_tools_command(config: &Config, json: bool) -> Result<()> {
    let registry = ToolRegistry::standard(build_context(config, true));
    let definitions = registry.definitions();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&definitions).context("Failed to serialize tool definitions")?
        );
        return Ok(());
    }

    println!("{} {}", "Tools:".green(), definitions.len());
    for def in &definitions {
        println!("  {:<20} {}", def.name.cyan(), def.description);
    }
    Ok(())
}

fn handle_check_command(config: &Config) -> Result<()> {
    config.databricks.validate().context("Invalid workspace configuration")?;
    println!("{} {}", "Workspace:".green(), config.databricks.host);

    // Runs from plain main, so the dispatcher takes the direct path
    let ctx = build_context(config, false);
    let catalogs = ctx
        .remote(|api| async move { api.list_catalogs().await })
        .context("Connectivity check failed")?;

    println!("{} {} catalogs visible", "OK:".green(), catalogs.len());
    for catalog in &catalogs {
        println!("  {}", catalog.name);
    }
    Ok(())
}

fn handle_config_command(config: &Config) -> Result<()> {
    let rendered = serde_yaml::to_string(&config.redacted()).context("Failed to render config")?;
    println!("{}", rendered);
    if let Err(e) = config.databricks.validate() {
        println!("{} {}", "Warning:".yellow(), e);
    }
    Ok(())
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::resolve(cli.config.as_ref()).context("Failed to load configuration")?;

    let level = if cli.is_verbose() {
        "debug"
    } else {
        config.log_level.as_deref().unwrap_or("info")
    };
    setup_logging(cli.log_stderr, level).context("Failed to setup logging")?;

    if let Some(in_container) = config.runtime.in_container {
        if !RuntimeEnvironment::init(RuntimeEnvironment { in_container }) {
            log::warn!("Runtime environment was read before config was applied");
        }
    }
    info!(
        "Starting with config from: {:?} ({})",
        cli.config,
        RuntimeEnvironment::current().label()
    );

    // Run the main application logic
    run_application(&cli, &config).context("Application failed")?;

    Ok(())
}
