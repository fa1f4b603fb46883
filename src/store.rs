use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{valid_rating, Flag, Movie, MovieUpdate, NewMovie};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),
    #[error("Movie {0} not found")]
    NotFound(u64),
    #[error("Movie with TMDB id {0} already exists")]
    Conflict(u64),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("refusing to rewrite {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("failed to serialize movies: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for movie records. Implementations are not required to
/// serialize concurrent writers.
#[async_trait]
pub trait MovieStore: Send + Sync {
    async fn list(&self) -> Vec<Movie>;
    async fn find_by_id(&self, id: u64) -> StoreResult<Movie>;
    async fn insert(&self, draft: NewMovie) -> StoreResult<Movie>;
    async fn update(&self, id: u64, fields: MovieUpdate) -> StoreResult<Movie>;
    async fn set_flag(&self, id: u64, flag: Flag, value: bool) -> StoreResult<Movie>;
    async fn set_rating(&self, id: u64, rating: Option<u8>, review: String) -> StoreResult<Movie>;
    async fn delete(&self, id: u64) -> StoreResult<()>;
}

#[derive(Debug, Default)]
struct Records {
    movies: Vec<Movie>,
    skipped: usize,
}

/// Whole collection stored as one JSON array; every mutation rewrites the file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Vec<Movie> {
        match self.read_records().await {
            Ok(records) => records.movies,
            Err(e) => {
                warn!("Ignoring unreadable movie data: {}", e);
                Vec::new()
            }
        }
    }

    /// Like `load`, but refuses to hand out a collection that would drop
    /// stored records when written back.
    async fn load_for_write(&self) -> StoreResult<Vec<Movie>> {
        let records = self.read_records().await?;
        if records.skipped > 0 {
            return Err(self.corrupt(format!(
                "{} stored record(s) could not be read",
                records.skipped
            )));
        }
        Ok(records.movies)
    }

    async fn read_records(&self) -> StoreResult<Records> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No movie data at {}", self.path.display());
                return Ok(Records::default());
            }
            Err(source) => return Err(self.io_error(source)),
        };
        let values: Vec<Value> = serde_json::from_slice(&raw)
            .map_err(|e| self.corrupt(format!("not a JSON array of movies: {e}")))?;

        let mut records = Records::default();
        for (index, value) in values.into_iter().enumerate() {
            match serde_json::from_value::<Movie>(value) {
                Ok(movie) => records.movies.push(movie),
                Err(e) => {
                    warn!(
                        "Skipping movie record #{} in {}: {}",
                        index,
                        self.path.display(),
                        e
                    );
                    records.skipped += 1;
                }
            }
        }
        Ok(records)
    }

    async fn save(&self, movies: &[Movie]) -> StoreResult<()> {
        let body = serde_json::to_vec_pretty(movies)?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| self.io_error(source))?;
        }
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|source| self.io_error(source))
    }

    fn corrupt(&self, reason: String) -> StoreError {
        StoreError::Corrupt {
            path: self.path.clone(),
            reason,
        }
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Load, apply `f` to the record with `id`, persist, return the new record.
    async fn modify<F>(&self, id: u64, f: F) -> StoreResult<Movie>
    where
        F: FnOnce(&mut Movie) -> StoreResult<()> + Send,
    {
        let mut movies = self.load_for_write().await?;
        let movie = movies
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(StoreError::NotFound(id))?;
        f(movie)?;
        let updated = movie.clone();
        self.save(&movies).await?;
        Ok(updated)
    }
}

#[async_trait]
impl MovieStore for JsonFileStore {
    async fn list(&self) -> Vec<Movie> {
        self.load().await
    }

    async fn find_by_id(&self, id: u64) -> StoreResult<Movie> {
        self.load()
            .await
            .into_iter()
            .find(|m| m.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    async fn insert(&self, draft: NewMovie) -> StoreResult<Movie> {
        let title = draft.title.as_deref().map(str::trim).unwrap_or_default();
        if title.is_empty() {
            return Err(StoreError::Validation("Title is required".to_string()));
        }

        let mut movies = self.load_for_write().await?;
        if let Some(tmdb_id) = draft.tmdb_id {
            if movies.iter().any(|m| m.tmdb_id == Some(tmdb_id)) {
                return Err(StoreError::Conflict(tmdb_id));
            }
        }

        let id = movies
            .iter()
            .map(|m| m.id)
            .max()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(|| StoreError::Validation("No movie ids left to assign".to_string()))?;
        let movie = Movie {
            id,
            tmdb_id: draft.tmdb_id,
            title: title.to_string(),
            year: draft.year.filter(|y| !y.trim().is_empty()),
            poster_path: draft.poster_path.filter(|p| !p.is_empty()),
            overview: draft.overview.unwrap_or_default(),
            watched: false,
            watchlist: true,
            liked: false,
            rating: None,
            review: String::new(),
        };
        movies.push(movie.clone());
        self.save(&movies).await?;
        debug!("Stored movie {} '{}'", movie.id, movie.title);
        Ok(movie)
    }

    async fn update(&self, id: u64, fields: MovieUpdate) -> StoreResult<Movie> {
        if let Some(title) = &fields.title {
            if title.trim().is_empty() {
                return Err(StoreError::Validation("Title cannot be empty".to_string()));
            }
        }
        if let Some(Some(rating)) = fields.rating {
            if !valid_rating(rating) {
                return Err(StoreError::Validation(
                    "Rating must be between 1 and 5".to_string(),
                ));
            }
        }

        self.modify(id, move |movie| {
            let MovieUpdate {
                title,
                year,
                poster_path,
                overview,
                watched,
                watchlist,
                liked,
                rating,
                review,
            } = fields;
            if let Some(title) = title {
                movie.title = title.trim().to_string();
            }
            if let Some(year) = year {
                movie.year = year;
            }
            if let Some(poster_path) = poster_path {
                movie.poster_path = poster_path;
            }
            if let Some(overview) = overview {
                movie.overview = overview;
            }
            if let Some(watched) = watched {
                movie.watched = watched;
            }
            if let Some(watchlist) = watchlist {
                movie.watchlist = watchlist;
            }
            if let Some(liked) = liked {
                movie.liked = liked;
            }
            if let Some(rating) = rating {
                movie.rating = rating;
            }
            if let Some(review) = review {
                movie.review = review;
            }
            Ok(())
        })
        .await
    }

    async fn set_flag(&self, id: u64, flag: Flag, value: bool) -> StoreResult<Movie> {
        self.modify(id, move |movie| {
            match flag {
                Flag::Watched => {
                    movie.watched = value;
                    if value {
                        movie.watchlist = false;
                    }
                }
                Flag::Watchlist => {
                    movie.watchlist = value;
                    if value {
                        movie.watched = false;
                    }
                }
                Flag::Liked => movie.liked = value,
            }
            Ok(())
        })
        .await
    }

    async fn set_rating(&self, id: u64, rating: Option<u8>, review: String) -> StoreResult<Movie> {
        if let Some(r) = rating {
            if !valid_rating(r) {
                return Err(StoreError::Validation(
                    "Rating must be between 1 and 5".to_string(),
                ));
            }
        }
        self.modify(id, move |movie| {
            movie.rating = rating;
            movie.review = review;
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: u64) -> StoreResult<()> {
        let mut movies = self.load_for_write().await?;
        let before = movies.len();
        movies.retain(|m| m.id != id);
        if movies.len() == before {
            return Err(StoreError::NotFound(id));
        }
        self.save(&movies).await?;
        debug!("Deleted movie {}", id);
        Ok(())
    }
}
