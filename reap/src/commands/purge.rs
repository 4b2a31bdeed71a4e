use crate::context::AppContext;
use crate::format::{self, Formattable, OutputFormat};
use clap::Args;
use libreap::{Client, Config, Credentials, PurgeOptions, PurgeSummary, Purger, ReapError};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Arguments of `reap purge`
#[derive(Args, Debug, Clone)]
pub struct PurgeArgs {
    /// Registry name or login server (myregistry, myregistry.azurecr.io)
    #[arg(short, long, env = "REAP_REGISTRY")]
    pub registry: String,

    /// Tags to consider, as <repository>:<regex> (repeatable)
    #[arg(short = 'f', long = "filter", required = true)]
    pub filters: Vec<String>,

    /// Delete tags last updated before this long ago (e.g. 30d, 1d12h, 90m)
    #[arg(long)]
    pub ago: String,

    /// Also delete manifests left without tags
    #[arg(long)]
    pub untagged: bool,

    /// Print what would be deleted without deleting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Number of concurrent deletions
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Registry username (will prompt for the password if not provided)
    #[arg(short, long, env = "REAP_USERNAME")]
    pub username: Option<String>,

    /// Registry password, or an access token when no username is given
    #[arg(short, long, env = "REAP_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

/// Result of a purge as printed to the user
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PurgeReport {
    pub dry_run: bool,
    pub tags_deleted: usize,
    pub manifests_deleted: usize,
    /// References a dry run would delete
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
}

impl PurgeReport {
    pub fn new(dry_run: bool, summary: PurgeSummary, references: Vec<String>) -> Self {
        Self {
            dry_run,
            tags_deleted: summary.tags_deleted,
            manifests_deleted: summary.manifests_deleted,
            references,
        }
    }
}

impl Formattable for PurgeReport {
    fn format_pretty(&self) -> String {
        if self.dry_run {
            format!(
                "Number of tags to be deleted: {}\nNumber of manifests to be deleted: {}",
                self.tags_deleted, self.manifests_deleted
            )
        } else {
            format!(
                "Number of deleted tags: {}\nNumber of deleted manifests: {}",
                self.tags_deleted, self.manifests_deleted
            )
        }
    }
}

/// Merges flags with configured defaults.
pub fn build_options(args: &PurgeArgs, config: &Config) -> PurgeOptions {
    PurgeOptions::new(args.filters.clone(), args.ago.clone())
        .with_untagged(args.untagged || config.purge.untagged)
        .with_dry_run(args.dry_run)
        .with_concurrency(args.concurrency.unwrap_or(config.purge.concurrency))
}

/// Builds credentials, asking for the password when only a username is set.
pub fn resolve_credentials<F>(
    username: Option<String>,
    password: Option<String>,
    prompt: F,
) -> Result<Credentials, String>
where
    F: FnOnce() -> Result<String, String>,
{
    match (username, password) {
        (Some(username), None) => Ok(Credentials::basic(username, prompt()?)),
        (username, password) => Ok(Credentials::from_login(username, password)),
    }
}

/// Renders an error followed by its causes, separated by ": ".
pub fn failure_message(error: &ReapError) -> String {
    let mut message = error.to_string();
    let mut cause = std::error::Error::source(error);
    while let Some(e) = cause {
        message.push_str(": ");
        message.push_str(&e.to_string());
        cause = e.source();
    }
    message
}

/// Prompt for the registry password
fn prompt_password() -> Result<String, String> {
    rpassword::prompt_password("Password: ").map_err(|e| format!("Failed to read password: {}", e))
}

/// Handle the purge subcommand
pub async fn handle_purge(ctx: &AppContext, args: PurgeArgs) {
    let formatter = format::create_formatter(ctx.color);
    let fmt = ctx.output_format(args.format);

    let credentials =
        match resolve_credentials(args.username.clone(), args.password.clone(), prompt_password) {
            Ok(credentials) => credentials,
            Err(e) => {
                formatter.error(&e);
                std::process::exit(1);
            }
        };

    let client = match Client::with_config(&args.registry, ctx.config.client_config(), credentials)
    {
        Ok(client) => client,
        Err(e) => {
            formatter.error(&format!("Failed to create client: {}", e));
            std::process::exit(1);
        }
    };
    let login_url = client.login_url().to_string();
    debug!(registry = %client.registry_url(), "purging");

    let options = build_options(&args, &ctx.config);

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling outstanding registry calls");
            signal_token.cancel();
        }
    });

    let purger = Purger::new(Arc::new(client), login_url).with_cancellation(token);

    // JSON output carries the dry-run references inside the document
    let mut buffer = Vec::new();
    let result = match fmt {
        OutputFormat::Pretty => purger.run(&options, &mut std::io::stdout()).await,
        OutputFormat::Json => purger.run(&options, &mut buffer).await,
    };

    let (summary, failure) = match result {
        Ok(summary) => (summary, None),
        Err(aborted) => (aborted.summary, Some(aborted.source)),
    };

    let references = String::from_utf8_lossy(&buffer)
        .lines()
        .map(str::to_string)
        .collect();
    let report = PurgeReport::new(options.dry_run, summary, references);

    match format::format_output(&report, fmt) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            formatter.error(&format!("Error formatting output: {}", e));
            std::process::exit(1);
        }
    }

    if let Some(e) = failure {
        if matches!(e, ReapError::Cancelled) {
            formatter.warning("Purge interrupted; counts above cover completed deletions only");
        } else {
            formatter.error(&format!("Purge aborted: {}", failure_message(&e)));
        }
        std::process::exit(1);
    }
}

#[cfg(test)]
#[path = "purge_tests.rs"]
mod tests;
