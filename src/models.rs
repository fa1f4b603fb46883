use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A movie record as persisted in the data file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: u64,
    #[serde(default)]
    pub tmdb_id: Option<u64>,
    pub title: String,
    #[serde(default, deserialize_with = "year_text")]
    pub year: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub watched: bool,
    #[serde(default)]
    pub watchlist: bool,
    #[serde(default)]
    pub liked: bool,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub review: String,
}

/// Body of `POST /movies`. Every field is optional on the wire so a missing
/// title is reported as a validation error rather than a decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewMovie {
    #[serde(default)]
    pub tmdb_id: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
}

/// Fields accepted by the generic update. `id` and `tmdb_id` are not
/// updatable. For nullable fields the outer `Option` means "present in the
/// body", the inner one carries an explicit `null`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovieUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub year: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub poster_path: Option<Option<String>>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub watched: Option<bool>,
    #[serde(default)]
    pub watchlist: Option<bool>,
    #[serde(default)]
    pub liked: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub rating: Option<Option<u8>>,
    #[serde(default)]
    pub review: Option<String>,
}

fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Hand-edited data files sometimes store the year as a number.
fn year_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "year must be a string or number, got {other}"
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Watched,
    Watchlist,
    Liked,
}

impl Flag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::Watched => "watched",
            Flag::Watchlist => "watchlist",
            Flag::Liked => "liked",
        }
    }
}

/// Simplified TMDB search hit. Field names match [`NewMovie`] so a result
/// can be posted back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub tmdb_id: u64,
    pub title: String,
    pub year: Option<String>,
    pub poster_path: Option<String>,
    pub overview: String,
}

pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieDetails {
    pub director: String,
    pub cast: String,
    pub runtime: String,
}

impl MovieDetails {
    pub fn unknown() -> Self {
        Self {
            director: UNKNOWN.to_string(),
            cast: UNKNOWN.to_string(),
            runtime: UNKNOWN.to_string(),
        }
    }
}

/// Rating bounds shared by the store and the handlers.
pub fn valid_rating(rating: u8) -> bool {
    (1..=5).contains(&rating)
}
