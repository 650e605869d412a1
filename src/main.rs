//! xconfig - a lightweight playbook engine
//!
//! This is the main entry point for the xconfig CLI.

mod cli;

use anyhow::Result;
use cli::commands::CommandContext;
use cli::{Cli, Commands};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use xconfig::config::{Config, LogFormat};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse_args();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR! failed to load configuration: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    init_logging(
        cli.verbosity(),
        config.logging.level.as_deref(),
        cli.log_format.unwrap_or(config.logging.format),
    );

    let ctx = CommandContext::new(&cli, config);

    let exit_code = match run(&cli, &ctx).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("ERROR! {:#}", e);
            e.downcast_ref::<xconfig::Error>()
                .map_or(1, xconfig::Error::exit_code)
        }
    };

    std::process::exit(exit_code);
}

async fn run(cli: &Cli, ctx: &CommandContext) -> Result<i32> {
    match &cli.command {
        Commands::Run(args) => args.execute(ctx).await,
        Commands::Validate(args) => args.execute(ctx).await,
        Commands::ListHosts(args) => args.execute(ctx).await,
    }
}

/// Initialize logging on stderr; `-v` beats the configured level and
/// `RUST_LOG` beats both.
fn init_logging(verbosity: u8, configured: Option<&str>, format: LogFormat) {
    let level = match (verbosity, configured) {
        (0, Some(level)) => level,
        (0, None) => "warn",
        (1, _) => "info",
        (2, _) => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(verbosity >= 3)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init(),
    }
}
