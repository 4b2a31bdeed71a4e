//! Dry-run purge against a registry.
//!
//! Prints every tag of `hello-world` older than 30 days, and every manifest
//! that would be left dangling, without deleting anything.
//!
//! Run with: cargo run --example basic_usage -- <registry> [username] [password]

use libreap::client::ClientConfig;
use libreap::{Client, Credentials, PurgeOptions, Purger};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let registry = args.next().unwrap_or_else(|| "myregistry".to_string());
    let credentials = Credentials::from_login(args.next(), args.next());

    let client = Client::with_config(&registry, ClientConfig::default(), credentials)?;
    println!("✓ Registry: {}\n", client.registry_url());
    let login_url = client.login_url().to_string();

    let options = PurgeOptions::new(vec!["hello-world:.*".to_string()], "30d")
        .with_untagged(true)
        .with_dry_run(true);

    match Purger::new(Arc::new(client), login_url)
        .run(&options, &mut std::io::stdout())
        .await
    {
        Ok(summary) => {
            println!(
                "\n✓ Would delete {} tags and {} manifests",
                summary.tags_deleted, summary.manifests_deleted
            );
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
