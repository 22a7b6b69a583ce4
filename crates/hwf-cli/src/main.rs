//! HWF Telemetry CLI
//!
//! Runs the HTTP server that receives notebook telemetry and forwards it to
//! the configured sink.

mod commands;

use clap::{Parser, Subcommand};
use commands::ServeCommand;
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "HWF_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full
    #[arg(long, default_value = "compact", env = "HWF_LOG_FORMAT", global = true)]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the telemetry HTTP server
    Serve(ServeCommand),
}

fn default_filter(level: &str) -> String {
    format!(
        "hwf_cli={level},\
         hwf_core={level},\
         hwf_caliper={level},\
         hwf_config={level},\
         hwf_telemetry={level},\
         tower_http={level},\
         h2=warn,\
         hyper=warn,\
         reqwest=warn,\
         rustls=warn",
        level = level
    )
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level when set
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .map_err(|e| anyhow::anyhow!("Invalid RUST_LOG environment variable: {}", e))?
    } else {
        tracing_subscriber::EnvFilter::new(default_filter(&cli.log_level))
    };

    let fmt_layer = match cli.log_format.as_str() {
        "full" => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set global default subscriber: {}", e))?;

    match cli.command {
        Commands::Serve(serve_cmd) => serve_cmd.execute(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_serve_with_globals() {
        let cli = Cli::try_parse_from([
            "hwf",
            "serve",
            "--log-level",
            "debug",
            "--log-format",
            "full",
        ])
        .unwrap();

        assert_eq!(cli.log_level, "debug");
        assert_eq!(cli.log_format, "full");
        assert!(matches!(cli.command, Commands::Serve(_)));
    }

    #[test]
    fn test_default_filter_is_valid() {
        let directives = default_filter("debug");
        assert!(directives.contains("hwf_telemetry=debug"));
        assert!(tracing_subscriber::EnvFilter::try_new(directives).is_ok());
    }
}
