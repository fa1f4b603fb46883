use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{MovieDetails, SearchResult, UNKNOWN};

pub const TMDB_BASE: &str = "https://api.themoviedb.org/3";
const POSTER_BASE: &str = "https://image.tmdb.org/t/p/w500";
const CAST_LIMIT: usize = 3;

#[derive(Debug, Error)]
pub enum TmdbError {
    #[error("TMDB credentials are not configured (set TMDB_ACCESS_TOKEN or TMDB_API_KEY)")]
    MissingCredentials,
    #[error("TMDB returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("TMDB request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("TMDB response could not be parsed: {0}")]
    Decode(#[source] serde_json::Error),
}

#[async_trait]
pub trait TmdbApi: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, TmdbError>;
    /// Director, top cast and runtime. Never fails: missing data or a
    /// failed lookup yields "Unknown" fields.
    async fn fetch_details(&self, tmdb_id: u64) -> MovieDetails;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    ApiKey(String),
}

impl Credentials {
    /// Bearer token wins over an API key; blank values count as unset.
    pub fn resolve(access_token: Option<String>, api_key: Option<String>) -> Option<Self> {
        let non_blank = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        non_blank(access_token)
            .map(Credentials::Bearer)
            .or_else(|| non_blank(api_key).map(Credentials::ApiKey))
    }

    fn apply(&self, req: RequestBuilder) -> RequestBuilder {
        match self {
            Credentials::Bearer(token) => req.bearer_auth(token),
            Credentials::ApiKey(key) => req.query(&[("api_key", key)]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl TmdbClient {
    pub fn new(base_url: impl Into<String>, credentials: Option<Credentials>) -> anyhow::Result<Self> {
        let user_agent = format!("watchlist/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build TMDB HTTP client: {}", e))?;
        if credentials.is_none() {
            warn!("No TMDB credentials configured; search and enrichment are disabled");
        }
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, TmdbError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(TmdbError::MissingCredentials)?;
        let url = format!("{}{}", self.base_url, path);
        let req = credentials.apply(self.client.get(&url).query(query));

        let res = req.send().await.map_err(TmdbError::Transport)?;
        let status = res.status();
        let text = res.text().await.map_err(TmdbError::Transport)?;
        if !status.is_success() {
            return Err(TmdbError::Upstream {
                status: status.as_u16(),
                body: text,
            });
        }
        serde_json::from_str(&text).map_err(TmdbError::Decode)
    }

    async fn try_fetch_details(&self, tmdb_id: u64) -> Result<MovieDetails, TmdbError> {
        let detail: MovieDetail = self
            .get_json(
                &format!("/movie/{tmdb_id}"),
                &[("append_to_response", "credits"), ("language", "en-US")],
            )
            .await?;
        let credits = detail.credits.unwrap_or_default();
        Ok(MovieDetails {
            director: director(&credits.crew).unwrap_or_else(|| UNKNOWN.to_string()),
            cast: top_cast(&credits.cast, CAST_LIMIT).unwrap_or_else(|| UNKNOWN.to_string()),
            runtime: detail
                .runtime
                .and_then(format_runtime)
                .unwrap_or_else(|| UNKNOWN.to_string()),
        })
    }
}

#[async_trait]
impl TmdbApi for TmdbClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, TmdbError> {
        let data: SearchResponse = self
            .get_json(
                "/search/movie",
                &[
                    ("query", query),
                    ("include_adult", "false"),
                    ("language", "en-US"),
                    ("page", "1"),
                ],
            )
            .await?;
        debug!("TMDB search '{}' returned {} results", query, data.results.len());
        Ok(data.results.into_iter().map(SearchHit::into_result).collect())
    }

    async fn fetch_details(&self, tmdb_id: u64) -> MovieDetails {
        match self.try_fetch_details(tmdb_id).await {
            Ok(details) => details,
            Err(e) => {
                warn!("TMDB details for {} unavailable: {}", tmdb_id, e);
                MovieDetails::unknown()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: u64,
    #[serde(default)]
    title: String,
    release_date: Option<String>,
    poster_path: Option<String>,
    #[serde(default)]
    overview: String,
}

impl SearchHit {
    fn into_result(self) -> SearchResult {
        SearchResult {
            tmdb_id: self.id,
            year: self.release_date.as_deref().and_then(extract_year),
            title: self.title,
            poster_path: self.poster_path,
            overview: self.overview,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MovieDetail {
    runtime: Option<u32>,
    credits: Option<Credits>,
}

#[derive(Debug, Default, Deserialize)]
struct Credits {
    #[serde(default)]
    cast: Vec<CastMember>,
    #[serde(default)]
    crew: Vec<CrewMember>,
}

#[derive(Debug, Deserialize)]
struct CastMember {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CrewMember {
    job: Option<String>,
    name: String,
}

pub fn poster_url(poster_path: &str) -> String {
    format!("{POSTER_BASE}{poster_path}")
}

fn extract_year(date: &str) -> Option<String> {
    date.split('-')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn director(crew: &[CrewMember]) -> Option<String> {
    crew.iter()
        .find(|c| c.job.as_deref() == Some("Director"))
        .map(|c| c.name.clone())
}

fn top_cast(cast: &[CastMember], max: usize) -> Option<String> {
    let names: Vec<&str> = cast.iter().take(max).map(|c| c.name.as_str()).collect();
    if names.is_empty() {
        return None;
    }
    Some(names.join(", "))
}

fn format_runtime(minutes: u32) -> Option<String> {
    if minutes == 0 {
        return None;
    }
    let (hours, mins) = (minutes / 60, minutes % 60);
    Some(match (hours, mins) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    })
}
