mod heartbeat;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, info};

use kestrel_core::config::ConfigStore;
use kestrel_core::kernel::bootstrap::Application;
use kestrel_core::plugin_system::{PluginFactory, PluginSystemError};

use crate::heartbeat::HeartbeatPlugin;

/// Kestrel: a plugin orchestration runtime
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the runtime and run until interrupted
    Run {
        /// Path to the configuration file (TOML, YAML, or JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Validate configuration and print the plugin load plan
    CheckConfig {
        /// Path to the configuration file (TOML, YAML, or JSON)
        #[arg(long)]
        config: PathBuf,
    },
}

/// Static registration of the built-in plugins. Hosting code that embeds
/// kestrel-core performs the equivalent with its own adapter set.
fn build_factory() -> Result<PluginFactory, PluginSystemError> {
    let mut factory = PluginFactory::new();
    factory.register("heartbeat", "kestrel.plugins.heartbeat", || {
        Box::new(HeartbeatPlugin::default())
    })?;
    Ok(factory)
}

fn load_config(path: Option<&PathBuf>) -> Result<ConfigStore, String> {
    match path {
        Some(path) => ConfigStore::from_path(path)
            .map_err(|e| format!("failed to load configuration from '{}': {e}", path.display())),
        None => Ok(ConfigStore::empty()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let args = CliArgs::parse();

    let factory = match build_factory() {
        Ok(factory) => factory,
        Err(e) => {
            eprintln!("built-in plugin registration failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    match args.command {
        Commands::Run { config } => {
            let config = match load_config(config.as_ref()) {
                Ok(config) => config,
                Err(message) => {
                    eprintln!("{message}");
                    return ExitCode::FAILURE;
                }
            };
            let mut app = Application::new(config, factory);
            if let Err(e) = app.start().await {
                error!("startup failed: {e}");
                eprintln!("startup failed: {e}");
                return ExitCode::FAILURE;
            }

            info!("running; press ctrl-c to stop");
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for shutdown signal: {e}");
            }

            if let Err(e) = app.shutdown().await {
                error!("shutdown reported an error: {e}");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Commands::CheckConfig { config } => {
            let config = match load_config(Some(&config)) {
                Ok(config) => config,
                Err(message) => {
                    eprintln!("{message}");
                    return ExitCode::FAILURE;
                }
            };
            let app = Application::new(config, factory);
            let manager = app.plugin_manager();

            let prepared = match manager.prepare().await {
                Ok(prepared) => prepared,
                Err(e) => {
                    eprintln!("configuration invalid: {e}");
                    return ExitCode::FAILURE;
                }
            };
            let order = match manager.plan_load_order().await {
                Ok(order) => order,
                Err(e) => {
                    eprintln!("configuration invalid: {e}");
                    return ExitCode::FAILURE;
                }
            };

            println!("configured plugins ({}):", prepared.len());
            for descriptor in manager.descriptors().await {
                println!(
                    "  - {} v{} (weight {}, prefix '{}')",
                    descriptor.name(),
                    descriptor.version(),
                    descriptor.weight(),
                    descriptor.config_prefix(),
                );
            }
            println!("load order: {}", order.join(" -> "));
            ExitCode::SUCCESS
        }
    }
}
