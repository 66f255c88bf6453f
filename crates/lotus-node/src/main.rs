//! lotus-node — node binary wiring MuSig2 sessions and SwapSig pools onto
//! the `Transport`/`Chain`/`TxBuilder` capability traits.
//!
//! # Usage
//!
//! ```bash
//! lotus-node --config /path/to/lotus-node.toml
//! lotus-node --validate   # Validate config and exit
//! ```

mod config;
mod daemon;

use anyhow::{Context, Result};
use std::path::PathBuf;

fn main() -> Result<()> {
    // Parse CLI args (minimal — no clap dependency needed)
    let args: Vec<String> = std::env::args().collect();

    let mut config_path = PathBuf::from("/config/lotus-node.toml");
    let mut validate_only = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    config_path = PathBuf::from(&args[i]);
                } else {
                    anyhow::bail!("--config requires a path argument");
                }
            }
            "--validate" => {
                validate_only = true;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("lotus-node {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            other => {
                anyhow::bail!("Unknown argument: {}", other);
            }
        }
        i += 1;
    }

    // Load config
    let mut node_config = config::NodeConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Apply env overrides
    node_config.apply_env_overrides();

    // Validate
    node_config
        .validate()
        .context("Configuration validation failed")?;

    // Init logger
    std::env::set_var("RUST_LOG", &node_config.node.log_level);
    env_logger::init();

    if validate_only {
        println!("Configuration is valid.");
        println!("  Peer id:     {}", node_config.node.peer_id);
        println!("  Data dir:    {}", node_config.node.data_dir.display());
        println!(
            "  Burn:        {:.3}% [{}, {}]",
            node_config.swapsig.burn_percentage * 100.0,
            node_config.swapsig.burn_min,
            node_config.swapsig.burn_max
        );
        println!("  Strict mode: {}", node_config.swapsig.strict_mode);
        println!(
            "  Nonce commitments required: {}",
            node_config.musig.require_nonce_commitments
        );
        return Ok(());
    }

    // Build tokio runtime
    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;

    // Install Ctrl-C handler for graceful shutdown
    let shutdown = rt.block_on(async {
        tokio::select! {
            result = daemon::run(node_config) => result,
            _ = tokio::signal::ctrl_c() => {
                log::info!("Received shutdown signal. Exiting…");
                Ok(())
            }
        }
    });

    if let Err(e) = shutdown {
        log::error!("Node error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn print_help() {
    println!(
        r#"lotus-node — MuSig2 + SwapSig coordination node

USAGE:
    lotus-node [OPTIONS]

OPTIONS:
    -c, --config <PATH>   Config file path (default: /config/lotus-node.toml)
    --validate            Validate config file and exit
    -h, --help            Show this help message
    -V, --version         Show version

ENVIRONMENT VARIABLES (override config file):
    LOTUS_DATA_DIR            Data directory path
    LOTUS_LOG_LEVEL           Log level (error/warn/info/debug/trace)
    LOTUS_PEER_ID             Local peer id
    LOTUS_MAX_CLOCK_SKEW_MS   Security validator clock-skew ceiling
    LOTUS_BURN_PERCENTAGE     Default SwapSig burn percentage
    LOTUS_STRICT_MODE         Abort pools with an ungroupable remainder (true/false)

EXAMPLES:
    # Run as daemon with config file
    lotus-node --config /path/to/config.toml

    # Validate configuration
    lotus-node --config config.toml --validate
"#
    );
}
