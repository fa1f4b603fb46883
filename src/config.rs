use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::tmdb::TMDB_BASE;

const DEFAULT_DATA_FILE: &str = "data/movies.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub data_file: PathBuf,
    pub tmdb_base_url: String,
    pub tmdb_access_token: Option<String>,
    pub tmdb_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid port number")?;
        let addr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("Invalid listen address {host}:{port}"))?;

        Ok(Self {
            addr,
            data_file: env::var("DATA_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_FILE)),
            tmdb_base_url: env::var("TMDB_BASE_URL").unwrap_or_else(|_| TMDB_BASE.to_string()),
            tmdb_access_token: env::var("TMDB_ACCESS_TOKEN").ok(),
            tmdb_api_key: env::var("TMDB_API_KEY").ok(),
        })
    }
}
