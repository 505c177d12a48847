use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use taplist_core::{tracing_setup, CoreConfig, CoreRuntime, SessionAuth};

/// Load the catalog against the configured API and print what the store holds.
///
/// Usage: debug_catalog [config.json]
#[tokio::main]
async fn main() -> Result<()> {
    tracing_setup::init_tracing();

    let config = match std::env::args().nth(1) {
        Some(path) => CoreConfig::load(&PathBuf::from(path))?,
        None => CoreConfig::default(),
    }
    .with_env_overrides();

    println!("Loading catalog from {}\n", config.beers_url());

    let runtime = CoreRuntime::new(config, Arc::new(SessionAuth::new()))?;
    runtime.start().await;
    let store = runtime.store();

    let fetched = store.load_all().await;
    if let Some(error) = store.error() {
        println!("Request failed: {}", error);
    }

    let beers = store.beers();
    println!("Fetched {} beers, catalog holds {}\n", fetched.len(), beers.len());
    for beer in beers.iter().take(10) {
        let liked = if store.is_liked(beer.id) { "*" } else { " " };
        println!("  {} {:>4}  {}", liked, beer.id, beer.name);
    }
    if beers.len() > 10 {
        println!("  ... and {} more", beers.len() - 10);
    }

    println!();
    println!("Requests remaining: {}", store.requests_remaining());
    println!("Liked: {:?}", store.liked_beer_ids());
    println!("Comments: {}", store.comments().len());

    runtime.shutdown().await?;
    Ok(())
}
