//! MagikGPU - GPU spec modifier CLI
//!
//! Rewrites a bundle's `config.json` so that the container gets NVIDIA GPU
//! support, the same way a runtime wrapper would right before invoking the
//! low-level runtime.
//!
//! ## Usage
//!
//! ```sh
//! magikgpu [--config <path>] modify [--bundle <dir>]
//! magikgpu [--config <path>] mode
//! ```
//!
//! Log verbosity follows `RUST_LOG`, falling back to the config's
//! `nvidia-container-runtime.log-level`.

use clap::{Parser, Subcommand};
use magikgpu::{
    Config, DiscoverMode, FileSpec, GpuModifier, HostPlatform, SpecSource, resolve_discover_mode,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// CLI Parsing
// =============================================================================

#[derive(Parser)]
#[command(
    name = "magikgpu",
    version,
    about = "Inject NVIDIA GPU support into OCI runtime specs"
)]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME or /etc/nvidia-container-runtime/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply the GPU modifications to the bundle's config.json in place.
    Modify {
        /// Bundle directory containing config.json.
        #[arg(short, long, default_value = ".")]
        bundle: PathBuf,
    },
    /// Print the discover mode this host resolves to.
    Mode,
}

// =============================================================================
// Logging
// =============================================================================

/// Installs the stderr subscriber. `RUST_LOG` overrides the configured level.
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.nvidia_container_runtime.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

// =============================================================================
// Commands
// =============================================================================

fn cmd_modify(config: &Config, bundle: PathBuf) -> magikgpu::Result<()> {
    let mut spec = FileSpec::from_bundle(&bundle);

    match GpuModifier::new(config, &mut spec)? {
        Some(modifier) => {
            spec.modify(&modifier)?;
            spec.flush()?;
            tracing::info!("Modified {}", spec.path().display());
        }
        None => tracing::debug!("Leaving {} unchanged", spec.path().display()),
    }

    Ok(())
}

fn cmd_mode(config: &Config) -> magikgpu::Result<()> {
    let configured: DiscoverMode = config.nvidia_container_runtime.discover_mode.parse()?;
    let resolved = resolve_discover_mode(&HostPlatform::new(), configured);
    println!("{}", resolved);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => Config::load(path),
        None => Config::load_default(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config);

    let result = match cli.command {
        Command::Modify { bundle } => cmd_modify(&config, bundle),
        Command::Mode => cmd_mode(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
