use crate::config::Config;
use crate::error::{ApiError, ApiResult, PageError, PageResult};
use crate::models::{valid_rating, Flag, Movie, MovieDetails, MovieUpdate, NewMovie, SearchResult};
use crate::store::{JsonFileStore, MovieStore};
use crate::templates;
use crate::tmdb::{Credentials, TmdbApi, TmdbClient};
use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{any::Any, sync::Arc};
use tower_http::{catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info};

const MAX_BODY_BYTES: usize = 1024 * 1024; // 1MB safety cap

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MovieStore>,
    pub tmdb: Arc<dyn TmdbApi>,
}

pub async fn run_server(config: Config) -> Result<()> {
    let credentials = Credentials::resolve(config.tmdb_access_token, config.tmdb_api_key);
    match &credentials {
        Some(Credentials::Bearer(_)) => info!("TMDB requests will use the bearer token"),
        Some(Credentials::ApiKey(_)) => info!("TMDB requests will use the API key"),
        None => {}
    }
    let tmdb: Arc<dyn TmdbApi> = Arc::new(TmdbClient::new(config.tmdb_base_url, credentials)?);

    let store = JsonFileStore::new(config.data_file);
    info!("Movie data file: {}", store.path().display());

    let state = AppState {
        store: Arc::new(store),
        tmdb,
    };

    let app = build_router(state);

    info!("Listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let pages = CatchPanicLayer::custom(page_panic as fn(Box<dyn Any + Send + 'static>) -> Response);
    let api = CatchPanicLayer::custom(api_panic as fn(Box<dyn Any + Send + 'static>) -> Response);

    Router::new()
        .route("/", get(home).layer(pages.clone()).fallback(page_method_not_allowed))
        .route(
            "/watched",
            get(watched).layer(pages.clone()).fallback(page_method_not_allowed),
        )
        .route("/health", get(health))
        .route(
            "/movies",
            axum::routing::post(add_movie)
                .layer(api.clone())
                .fallback(api_method_not_allowed),
        )
        .route(
            "/movies/search",
            get(search).layer(api.clone()).fallback(api_method_not_allowed),
        )
        .route(
            "/movies/:id",
            get(detail)
                .layer(pages.clone())
                .merge(put(update_movie).delete(delete_movie).layer(api.clone()))
                .fallback(api_method_not_allowed),
        )
        .route(
            "/movies/:id/watched",
            put(set_watched).layer(api.clone()).fallback(api_method_not_allowed),
        )
        .route(
            "/movies/:id/watchlist",
            put(set_watchlist).layer(api.clone()).fallback(api_method_not_allowed),
        )
        .route(
            "/movies/:id/liked",
            put(set_liked).layer(api.clone()).fallback(api_method_not_allowed),
        )
        .route(
            "/movies/:id/review",
            put(set_review).layer(api).fallback(api_method_not_allowed),
        )
        .fallback(not_found)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn home(State(state): State<AppState>) -> Html<String> {
    let movies: Vec<Movie> = state
        .store
        .list()
        .await
        .into_iter()
        .filter(|m| !m.watched)
        .collect();
    Html(templates::home_page(&movies))
}

async fn watched(State(state): State<AppState>) -> Html<String> {
    let movies: Vec<Movie> = state
        .store
        .list()
        .await
        .into_iter()
        .filter(|m| m.watched)
        .collect();
    Html(templates::watched_page(&movies))
}

async fn detail(State(state): State<AppState>, Path(raw_id): Path<String>) -> PageResult<Html<String>> {
    let id = parse_id(&raw_id).map_err(|e| PageError::bad_request(e.to_string()))?;
    let movie = state.store.find_by_id(id).await?;
    let details = match movie.tmdb_id {
        Some(tmdb_id) => state.tmdb.fetch_details(tmdb_id).await,
        None => MovieDetails::unknown(),
    };
    Ok(Html(templates::detail_page(&movie, &details)))
}

async fn not_found() -> (StatusCode, Html<String>) {
    (StatusCode::NOT_FOUND, Html(templates::not_found_page()))
}

async fn page_method_not_allowed() -> PageError {
    PageError::method_not_allowed()
}

async fn api_method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Json<Vec<SearchResult>>> {
    let query = params.q.trim();
    if query.is_empty() {
        return Err(ApiError::Validation("Search query is required".to_string()));
    }
    let results = state.tmdb.search(query).await.map_err(|e| {
        error!("TMDB search for '{}' failed: {}", query, e);
        ApiError::from(e)
    })?;
    Ok(Json(results))
}

async fn add_movie(
    State(state): State<AppState>,
    body: Result<Json<NewMovie>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Movie>)> {
    let Json(draft) = body.map_err(rejection)?;
    let movie = state.store.insert(draft).await?;
    info!("Added movie {} '{}'", movie.id, movie.title);
    Ok((StatusCode::CREATED, Json(movie)))
}

async fn update_movie(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    body: Result<Json<MovieUpdate>, JsonRejection>,
) -> ApiResult<Json<Movie>> {
    let id = parse_id(&raw_id)?;
    let Json(fields) = body.map_err(rejection)?;
    Ok(Json(state.store.update(id, fields).await?))
}

async fn set_watched(
    state: State<AppState>,
    path: Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    set_flag(state, path, body, Flag::Watched).await
}

async fn set_watchlist(
    state: State<AppState>,
    path: Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    set_flag(state, path, body, Flag::Watchlist).await
}

async fn set_liked(
    state: State<AppState>,
    path: Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    set_flag(state, path, body, Flag::Liked).await
}

async fn set_flag(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
    flag: Flag,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&raw_id)?;
    // Missing body or non-boolean value means "set".
    let value = body
        .ok()
        .and_then(|Json(v)| v.get(flag.as_str()).and_then(Value::as_bool))
        .unwrap_or(true);
    let movie = state.store.set_flag(id, flag, value).await?;
    Ok(Json(json!({
        "message": format!("Movie {} {} set to {}", movie.id, flag.as_str(), value),
        "movie": movie,
    })))
}

#[derive(Debug, Deserialize)]
struct ReviewBody {
    #[serde(default)]
    rating: Value,
    #[serde(default)]
    review: Option<String>,
}

async fn set_review(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    body: Result<Json<ReviewBody>, JsonRejection>,
) -> ApiResult<Json<Movie>> {
    let id = parse_id(&raw_id)?;
    let Json(body) = body.map_err(rejection)?;
    let rating = parse_rating(&body.rating)?;
    let movie = state
        .store
        .set_rating(id, rating, body.review.unwrap_or_default())
        .await?;
    Ok(Json(movie))
}

async fn delete_movie(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&raw_id)?;
    state.store.delete(id).await?;
    info!("Deleted movie {}", id);
    Ok(StatusCode::NO_CONTENT)
}

fn parse_id(raw: &str) -> ApiResult<u64> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::Validation(format!("Invalid movie id '{}'", raw)))
}

/// `null` clears the rating; anything else must be an integer from 1 to 5.
fn parse_rating(raw: &Value) -> ApiResult<Option<u8>> {
    if raw.is_null() {
        return Ok(None);
    }
    raw.as_u64()
        .and_then(|r| u8::try_from(r).ok())
        .filter(|r| valid_rating(*r))
        .map(Some)
        .ok_or_else(|| ApiError::Validation("Rating must be an integer between 1 and 5".to_string()))
}

fn rejection(err: JsonRejection) -> ApiError {
    ApiError::Validation(err.body_text())
}

fn api_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    error!("Handler panicked: {}", panic_message(&*err));
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}

fn page_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    error!("Page handler panicked: {}", panic_message(&*err));
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(templates::error_page(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Something went wrong",
        )),
    )
        .into_response()
}

fn panic_message(err: &(dyn Any + Send)) -> &str {
    err.downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
