mod common;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::Router;
use common::{body_json, body_text, delete, get as get_req, json_request};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;
use watchlist::app::{build_router, AppState};
use watchlist::models::{Flag, Movie, MovieDetails, MovieUpdate, NewMovie, SearchResult};
use watchlist::store::{JsonFileStore, MovieStore, StoreResult};
use watchlist::tmdb::{Credentials, TmdbApi, TmdbClient, TmdbError};

enum SearchMode {
    Results(Vec<SearchResult>),
    Upstream(u16, &'static str),
    Unconfigured,
}

struct FakeTmdb {
    search: SearchMode,
    details: MovieDetails,
}

#[async_trait]
impl TmdbApi for FakeTmdb {
    async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, TmdbError> {
        match &self.search {
            SearchMode::Results(r) => Ok(r.clone()),
            SearchMode::Upstream(status, body) => Err(TmdbError::Upstream {
                status: *status,
                body: body.to_string(),
            }),
            SearchMode::Unconfigured => Err(TmdbError::MissingCredentials),
        }
    }

    async fn fetch_details(&self, _tmdb_id: u64) -> MovieDetails {
        self.details.clone()
    }
}

fn fake_tmdb(search: SearchMode) -> FakeTmdb {
    FakeTmdb {
        search,
        details: MovieDetails {
            director: "Denis Villeneuve".into(),
            cast: "Timothée Chalamet, Rebecca Ferguson, Oscar Isaac".into(),
            runtime: "2h 35m".into(),
        },
    }
}

fn app_with(tmdb: Arc<dyn TmdbApi>) -> (Router, Arc<JsonFileStore>, TempDir) {
    let dir = TempDir::new().expect("temp dir");
    let store = Arc::new(JsonFileStore::new(dir.path().join("movies.json")));
    let state = AppState {
        store: store.clone(),
        tmdb,
    };
    (build_router(state), store, dir)
}

fn app() -> (Router, Arc<JsonFileStore>, TempDir) {
    app_with(Arc::new(fake_tmdb(SearchMode::Results(Vec::new()))))
}

async fn add(app: &Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let res = app
        .clone()
        .oneshot(json_request("POST", "/movies", body))
        .await
        .unwrap();
    let status = res.status();
    (status, body_json(res).await)
}

#[tokio::test]
async fn add_returns_created_with_next_id() {
    let (app, store, _dir) = app();

    let (status, first) = add(&app, json!({"title": "Arrival", "tmdb_id": 329865})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["id"], 1);
    assert_eq!(first["watchlist"], true);
    assert_eq!(first["watched"], false);
    assert_eq!(first["rating"], serde_json::Value::Null);

    let (status, second) = add(
        &app,
        json!({"tmdb_id": 438631, "title": "Dune", "year": "2021", "poster_path": "/dune.jpg", "overview": "Spice"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["id"], 2);
    assert_eq!(second["year"], "2021");
    assert_eq!(store.list().await.len(), 2);
}

#[tokio::test]
async fn duplicate_tmdb_id_conflicts_without_changing_store() {
    let (app, store, _dir) = app();
    add(&app, json!({"title": "Dune", "tmdb_id": 438631})).await;
    let before = store.list().await;

    let (status, body) = add(&app, json!({"title": "Dune (2021)", "tmdb_id": 438631})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("438631"));
    assert_eq!(store.list().await, before);
}

#[tokio::test]
async fn blank_or_missing_title_is_bad_request() {
    let (app, store, _dir) = app();

    for body in [json!({"title": "   "}), json!({"tmdb_id": 5}), json!({"title": ""})] {
        let (status, err) = add(&app, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(err["error"].is_string());
    }
    let res = app
        .clone()
        .oneshot(
            axum::http::Request::post("/movies")
                .header("content-type", "application/json")
                .body(axum::body::Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(store.list().await.is_empty());
}

#[tokio::test]
async fn toggles_keep_watched_and_watchlist_exclusive() {
    let (app, _store, _dir) = app();
    let (_, movie) = add(&app, json!({"title": "Dune"})).await;
    let id = movie["id"].as_u64().unwrap();

    let res = app
        .clone()
        .oneshot(json_request("PUT", &format!("/movies/{id}/watched"), json!({"watched": true})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert!(body["message"].is_string());
    assert_eq!(body["movie"]["watched"], true);
    assert_eq!(body["movie"]["watchlist"], false);

    let res = app
        .clone()
        .oneshot(json_request("PUT", &format!("/movies/{id}/watchlist"), json!({"watchlist": true})))
        .await
        .unwrap();
    let body = body_json(res).await;
    assert_eq!(body["movie"]["watchlist"], true);
    assert_eq!(body["movie"]["watched"], false);

    // A body without a boolean defaults to setting the flag.
    let res = app
        .clone()
        .oneshot(json_request("PUT", &format!("/movies/{id}/liked"), json!({})))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["movie"]["liked"], true);

    let res = app
        .clone()
        .oneshot(json_request("PUT", &format!("/movies/{id}/liked"), json!({"liked": false})))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["movie"]["liked"], false);
}

#[tokio::test]
async fn toggle_rejects_bad_and_unknown_ids() {
    let (app, _store, _dir) = app();

    let res = app
        .clone()
        .oneshot(json_request("PUT", "/movies/abc/watched", json!({"watched": true})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .clone()
        .oneshot(json_request("PUT", "/movies/77/watched", json!({"watched": true})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(body_json(res).await["error"].is_string());
}

#[tokio::test]
async fn review_validates_rating() {
    let (app, store, _dir) = app();
    let (_, movie) = add(&app, json!({"title": "Dune"})).await;
    let id = movie["id"].as_u64().unwrap();
    let uri = format!("/movies/{id}/review");

    let res = app
        .clone()
        .oneshot(json_request("PUT", &uri, json!({"rating": 5, "review": "Spice must flow"})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["rating"], 5);
    assert_eq!(body["review"], "Spice must flow");

    for bad in [json!(0), json!(6), json!("five"), json!(2.5)] {
        let res = app
            .clone()
            .oneshot(json_request("PUT", &uri, json!({"rating": bad, "review": "x"})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
    let stored = store.find_by_id(id).await.unwrap();
    assert_eq!(stored.rating, Some(5));
    assert_eq!(stored.review, "Spice must flow");

    let res = app
        .clone()
        .oneshot(json_request("PUT", &uri, json!({"rating": null, "review": ""})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(store.find_by_id(id).await.unwrap().rating, None);

    let res = app
        .clone()
        .oneshot(json_request("PUT", "/movies/99/review", json!({"rating": 3})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = app
        .clone()
        .oneshot(json_request("PUT", "/movies/abc/review", json!({"rating": 3})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(res).await["error"].is_string());
}

#[tokio::test]
async fn generic_update_cannot_change_id() {
    let (app, store, _dir) = app();
    let (_, movie) = add(&app, json!({"title": "Dune", "tmdb_id": 438631})).await;
    let id = movie["id"].as_u64().unwrap();

    let res = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/movies/{id}"),
            json!({"id": 500, "tmdb_id": 1, "title": "Dune: Part One", "liked": true}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["id"], id);
    assert_eq!(body["tmdb_id"], 438631);
    assert_eq!(body["title"], "Dune: Part One");
    assert_eq!(body["liked"], true);
    assert!(store.find_by_id(500).await.is_err());

    let res = app
        .clone()
        .oneshot(json_request("PUT", "/movies/31", json!({"title": "Nope"})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = app
        .clone()
        .oneshot(json_request("PUT", "/movies/abc", json!({"title": "Nope"})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(res).await["error"].is_string());
}

#[tokio::test]
async fn delete_removes_and_reports_unknown_ids() {
    let (app, store, _dir) = app();
    let (_, movie) = add(&app, json!({"title": "Dune"})).await;
    let id = movie["id"].as_u64().unwrap();

    let res = app.clone().oneshot(delete("/movies/12")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(store.list().await.len(), 1);

    let res = app.clone().oneshot(delete("/movies/x1")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app.clone().oneshot(delete(&format!("/movies/{id}"))).await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert!(body_text(res).await.is_empty());
    assert!(store.list().await.is_empty());
}

#[tokio::test]
async fn search_validates_query_and_passes_results_through() {
    let (app, _store, _dir) = app();

    let res = app.clone().oneshot(get_req("/movies/search?q=")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let res = app.clone().oneshot(get_req("/movies/search")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app.clone().oneshot(get_req("/movies/search?q=batman")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await, json!([]));

    let hit = SearchResult {
        tmdb_id: 438631,
        title: "Dune".into(),
        year: Some("2021".into()),
        poster_path: None,
        overview: "Spice".into(),
    };
    let (app, _store, _dir) = app_with(Arc::new(fake_tmdb(SearchMode::Results(vec![hit]))));
    let res = app.oneshot(get_req("/movies/search?q=dune")).await.unwrap();
    assert_eq!(
        body_json(res).await,
        json!([{"tmdb_id": 438631, "title": "Dune", "year": "2021", "poster_path": null, "overview": "Spice"}])
    );
}

#[tokio::test]
async fn search_failures_map_to_gateway_and_config_errors() {
    let (app, _store, _dir) =
        app_with(Arc::new(fake_tmdb(SearchMode::Upstream(401, "Invalid API key"))));
    let res = app.oneshot(get_req("/movies/search?q=dune")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(res).await;
    assert_eq!(body["status"], 401);
    assert_eq!(body["details"], "Invalid API key");

    let (app, _store, _dir) = app_with(Arc::new(fake_tmdb(SearchMode::Unconfigured)));
    let res = app.oneshot(get_req("/movies/search?q=dune")).await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_json(res).await["error"]
        .as_str()
        .unwrap()
        .contains("credentials"));
}

#[tokio::test]
async fn detail_page_renders_enrichment() {
    let (app, _store, _dir) = app();
    let (_, movie) = add(&app, json!({"title": "Dune", "tmdb_id": 438631, "year": "2021"})).await;
    let id = movie["id"].as_u64().unwrap();

    let res = app.clone().oneshot(get_req(&format!("/movies/{id}"))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let html = body_text(res).await;
    assert!(html.contains("Dune"));
    assert!(html.contains("Denis Villeneuve"));
    assert!(html.contains("2h 35m"));

    let res = app.clone().oneshot(get_req("/movies/abc")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let res = app.clone().oneshot(get_req("/movies/404")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(body_text(res).await.contains("<html"));
}

#[tokio::test]
async fn detail_page_survives_failed_lookup() {
    // Real client against an upstream that fails every request.
    let upstream =
        Router::new().fallback(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") });
    let base = common::spawn_stub(upstream).await;
    let tmdb = TmdbClient::new(base, Some(Credentials::Bearer("token".into()))).unwrap();
    let (app, _store, _dir) = app_with(Arc::new(tmdb));

    let (_, movie) = add(&app, json!({"title": "Dune", "tmdb_id": 438631})).await;
    let id = movie["id"].as_u64().unwrap();

    let res = app.oneshot(get_req(&format!("/movies/{id}"))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let html = body_text(res).await;
    assert!(html.contains("Dune"));
    assert_eq!(html.matches("Unknown").count(), 3);
}

#[tokio::test]
async fn watching_moves_movie_from_home_to_watched_page() {
    let (app, _store, _dir) = app();
    let (status, movie) = add(&app, json!({"title": "Dune"})).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = movie["id"].as_u64().unwrap();
    let link = format!("href=\"/movies/{id}\"");

    let res = app.clone().oneshot(get_req(&format!("/movies/{id}"))).await.unwrap();
    assert!(body_text(res).await.contains("Dune"));

    let home = body_text(app.clone().oneshot(get_req("/")).await.unwrap()).await;
    assert!(home.contains(&link));
    let watched = body_text(app.clone().oneshot(get_req("/watched")).await.unwrap()).await;
    assert!(!watched.contains(&link));

    let res = app
        .clone()
        .oneshot(json_request("PUT", &format!("/movies/{id}/watched"), json!({"watched": true})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let home = body_text(app.clone().oneshot(get_req("/")).await.unwrap()).await;
    assert!(!home.contains(&link));
    let watched = body_text(app.clone().oneshot(get_req("/watched")).await.unwrap()).await;
    assert!(watched.contains(&link));
}

#[tokio::test]
async fn unknown_paths_render_not_found_page() {
    let (app, _store, _dir) = app();
    let res = app.clone().oneshot(get_req("/nowhere")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(body_text(res).await.contains("Page not found"));

    let res = app.oneshot(get_req("/health")).await.unwrap();
    assert_eq!(body_text(res).await, "OK");
}

#[tokio::test]
async fn unsupported_methods_answer_in_the_route_format() {
    let (app, _store, _dir) = app();

    for (method, uri) in [
        ("POST", "/movies/1"),
        ("PUT", "/movies/search"),
        ("GET", "/movies"),
        ("DELETE", "/movies/1/review"),
    ] {
        let res = app
            .clone()
            .oneshot(json_request(method, uri, json!({})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED, "{method} {uri}");
        assert_eq!(body_json(res).await["error"], "Method not allowed");
    }

    let res = app
        .clone()
        .oneshot(json_request("POST", "/", json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    let content_type = res.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"), "{content_type}");
    assert!(body_text(res).await.contains("405"));
}

#[tokio::test]
async fn unreadable_records_turn_writes_into_server_errors() {
    let (app, store, _dir) = app();
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    let original = r#"[{"id": 1, "title": "Heat"}, {"id": 2}]"#;
    std::fs::write(store.path(), original).unwrap();

    let home = body_text(app.clone().oneshot(get_req("/")).await.unwrap()).await;
    assert!(home.contains("Heat"));

    let (status, body) = add(&app, json!({"title": "Dune"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
    assert_eq!(std::fs::read_to_string(store.path()).unwrap(), original);
}

struct BrokenStore;

#[async_trait]
impl MovieStore for BrokenStore {
    async fn list(&self) -> Vec<Movie> {
        panic!("disk on fire")
    }
    async fn find_by_id(&self, _id: u64) -> StoreResult<Movie> {
        panic!("disk on fire")
    }
    async fn insert(&self, _draft: NewMovie) -> StoreResult<Movie> {
        panic!("disk on fire")
    }
    async fn update(&self, _id: u64, _fields: MovieUpdate) -> StoreResult<Movie> {
        panic!("disk on fire")
    }
    async fn set_flag(&self, _id: u64, _flag: Flag, _value: bool) -> StoreResult<Movie> {
        panic!("disk on fire")
    }
    async fn set_rating(&self, _id: u64, _rating: Option<u8>, _review: String) -> StoreResult<Movie> {
        panic!("disk on fire")
    }
    async fn delete(&self, _id: u64) -> StoreResult<()> {
        panic!("disk on fire")
    }
}

#[tokio::test]
async fn unexpected_failures_are_json_for_api_and_html_for_pages() {
    let state = AppState {
        store: Arc::new(BrokenStore),
        tmdb: Arc::new(fake_tmdb(SearchMode::Results(Vec::new()))),
    };
    let app = build_router(state);

    let res = app
        .clone()
        .oneshot(json_request("POST", "/movies", json!({"title": "Dune"})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(res).await, json!({"error": "Internal server error"}));

    let res = app.clone().oneshot(delete("/movies/1")).await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(res).await["error"], "Internal server error");

    let res = app.clone().oneshot(get_req("/")).await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(res).await.contains("Something went wrong"));

    let res = app.oneshot(get_req("/movies/1")).await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(res).await.contains("<html"));
}
