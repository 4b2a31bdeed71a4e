use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

mod commands;
mod context;
mod format;

/// Reap - Container Registry Purge
///
/// Deletes old tags and dangling manifests from Azure Container Registry.
#[derive(Parser, Debug)]
#[command(name = "reap")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Control colored output
    #[arg(long, global = true, value_enum)]
    color: Option<format::ColorChoice>,

    /// Configuration file (YAML)
    #[arg(long, global = true, env = "REAP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Delete tags older than a cutoff, and optionally dangling manifests
    Purge(commands::purge::PurgeArgs),
    /// Display version information
    Version,
    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Installs the tracing subscriber; `RUST_LOG` overrides the `-v` count.
fn init_tracing(verbosity: context::VerbosityLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let verbosity = context::VerbosityLevel::from_count(cli.verbose);
    init_tracing(verbosity);

    match cli.command {
        Commands::Version => {
            commands::version::print_version();
        }
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
        }
        Commands::Purge(args) => {
            // Build context with precedence: defaults > config file > env vars > CLI flags
            let ctx = match context::AppContext::build(cli.config.as_deref(), cli.color) {
                Ok(ctx) => ctx,
                Err(e) => {
                    format::create_formatter(cli.color.unwrap_or_default()).error(&e);
                    std::process::exit(1);
                }
            };
            commands::purge::handle_purge(&ctx, args).await;
        }
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
