//! chartmgr - Reconciles ChartManager resources into Helm releases

use clap::{Parser, Subcommand};
use miette::Result;
use std::path::PathBuf;

mod commands;
mod error;
mod logging;

use logging::LogFormat;

#[derive(Parser)]
#[command(name = "chartmgr")]
#[command(author = "chartmgr Contributors")]
#[command(version)]
#[command(about = "Kubernetes controller that reconciles ChartManager resources into Helm releases", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controller until SIGINT or SIGTERM
    Run {
        /// Configuration file (default: ~/.config/chartmgr/config.yaml)
        #[arg(short, long, env = "CHARTMGR_CONFIG")]
        config: Option<PathBuf>,

        /// Log output format
        #[arg(long, value_enum, default_value_t = LogFormat::Pretty, env = "CHARTMGR_LOG_FORMAT")]
        log_format: LogFormat,

        /// Path to the helm binary (overrides helm.binary)
        #[arg(long, env = "CHARTMGR_HELM_BIN")]
        helm_bin: Option<PathBuf>,

        /// Kubeconfig context to use (overrides helm.kubeContext)
        #[arg(long, env = "CHARTMGR_KUBE_CONTEXT")]
        kube_context: Option<String>,
    },

    /// Print the ChartManager CustomResourceDefinition
    Crd,

    /// Print the effective configuration
    Config {
        /// Configuration file (default: ~/.config/chartmgr/config.yaml)
        #[arg(short, long, env = "CHARTMGR_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            log_format,
            helm_bin,
            kube_context,
        } => {
            logging::init_logging(log_format, cli.debug);
            let runtime = tokio::runtime::Runtime::new().map_err(error::CliError::from)?;
            runtime.block_on(commands::run::run(
                config.as_deref(),
                helm_bin,
                kube_context,
            ))?;
        }

        Commands::Crd => commands::crd::run()?,

        Commands::Config { config } => commands::config::run(config.as_deref())?,
    }

    Ok(())
}
