//! Run a TMDB search and print the simplified results, then the enriched
//! details for the first hit.
//! Usage:
//!   cargo run --bin tmdb_lookup -- <query>
//! Requires TMDB_ACCESS_TOKEN or TMDB_API_KEY in the environment (.env supported).

use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use watchlist::config::Config;
use watchlist::tmdb::{Credentials, TmdbApi, TmdbClient};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let query = env::args().skip(1).collect::<Vec<_>>().join(" ");
    if query.trim().is_empty() {
        anyhow::bail!("Usage: tmdb_lookup <query>");
    }

    let config = Config::from_env()?;
    let credentials = Credentials::resolve(config.tmdb_access_token, config.tmdb_api_key)
        .context("Missing TMDB_ACCESS_TOKEN or TMDB_API_KEY in environment")?;
    let client = TmdbClient::new(config.tmdb_base_url, Some(credentials))?;

    let results = client.search(&query).await?;
    println!("{}", serde_json::to_string_pretty(&results)?);

    if let Some(first) = results.first() {
        let details = client.fetch_details(first.tmdb_id).await;
        println!(
            "{} -> director: {}, cast: {}, runtime: {}",
            first.title, details.director, details.cast, details.runtime
        );
    }

    Ok(())
}
