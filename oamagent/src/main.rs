mod config;

use clap::{Args, Parser, Subcommand};
use config::{Config, ConfigError, LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use userplanes::UserplaneError;
use userplanes::config::ValidationError;

const DEFAULT_LOG_FILTER: &str = "oamagent=info,userplanes=info,shared=info";

#[derive(Parser)]
#[command(name = "oamagent", about = "Userplane management gateway for the EPC control plane")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the /userplanes API
    Gateway(ConfigArgs),
    /// Load and validate a config file, then exit
    CheckConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long)]
    config_file_path: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid config: {0}")]
    Validation(#[from] ValidationError),
    #[error("invalid sentry dsn: {0}")]
    SentryDsn(#[from] sentry::types::ParseDsnError),
    #[error("metrics setup failed: {0}")]
    Metrics(String),
    #[error("could not start runtime: {0}")]
    Runtime(std::io::Error),
    #[error(transparent)]
    Gateway(#[from] UserplaneError),
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli_main(cli) {
        eprintln!("oamagent: {e}");
        std::process::exit(1);
    }
}

fn cli_main(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        CliCommand::CheckConfig(args) => {
            load_config(&args.config_file_path)?;
            println!("{}: ok", args.config_file_path.display());
            Ok(())
        }
        CliCommand::Gateway(args) => {
            let config = load_config(&args.config_file_path)?;

            // Flushes pending events on drop
            let _sentry = config
                .common
                .logging
                .as_ref()
                .map(init_sentry)
                .transpose()?;
            init_tracing();

            if let Some(metrics) = &config.common.metrics {
                init_statsd(metrics)?;
            }

            let runtime = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;
            tracing::info!("Starting userplane gateway");
            runtime.block_on(userplanes::run(config.gateway))?;
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> Result<Config, CliError> {
    let config = Config::from_file(path)?;
    config.gateway.validate()?;
    Ok(config)
}

fn init_sentry(logging: &LoggingConfig) -> Result<sentry::ClientInitGuard, CliError> {
    let dsn: sentry::types::Dsn = logging.sentry_dsn.parse()?;
    Ok(sentry::init(sentry::ClientOptions {
        dsn: Some(dsn),
        release: sentry::release_name!(),
        ..Default::default()
    }))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(fmt::layer())
        .with(sentry::integrations::tracing::layer())
        .init();
}

fn init_statsd(metrics: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(metrics.statsd_host.as_str(), metrics.statsd_port)
        .build(Some("oamagent"))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;

    shared::metrics_defs::describe_all(userplanes::metrics_defs::ALL_METRICS);
    tracing::info!(
        host = %metrics.statsd_host,
        port = metrics.statsd_port,
        "StatsD recorder installed"
    );
    Ok(())
}
