use axum::http::StatusCode;
use maud::{html, Markup, PreEscaped, DOCTYPE};

use crate::models::{Movie, MovieDetails};
use crate::tmdb::poster_url;

const TAILWIND_CDN: &str = "https://cdn.tailwindcss.com";

// Small client helpers for the JSON API; pages reload after each mutation.
const SCRIPT: &str = r#"
async function api(method, url, body) {
  const res = await fetch(url, {
    method,
    headers: { 'Content-Type': 'application/json' },
    body: body === undefined ? undefined : JSON.stringify(body),
  });
  if (!res.ok && res.status !== 204) {
    const err = await res.json().catch(() => ({ error: res.statusText }));
    alert(err.error || 'Request failed');
    return null;
  }
  return res.status === 204 ? {} : res.json();
}

async function searchMovies(event) {
  event.preventDefault();
  const q = document.getElementById('q').value.trim();
  const list = document.getElementById('results');
  list.innerHTML = '';
  if (!q) return;
  const results = await api('GET', '/movies/search?q=' + encodeURIComponent(q));
  if (!results) return;
  if (results.length === 0) {
    list.innerHTML = '<li class="text-gray-500">No matches.</li>';
    return;
  }
  for (const r of results) {
    const li = document.createElement('li');
    li.className = 'flex items-center justify-between gap-4 py-2';
    const label = document.createElement('span');
    label.textContent = r.title + (r.year ? ' (' + r.year + ')' : '');
    const add = document.createElement('button');
    add.className = 'rounded bg-blue-600 px-3 py-1 text-sm text-white hover:bg-blue-700';
    add.textContent = 'Add';
    add.onclick = async () => { if (await api('POST', '/movies', r)) location.reload(); };
    li.append(label, add);
    list.appendChild(li);
  }
}

async function setFlag(id, flag, value) {
  if (await api('PUT', '/movies/' + id + '/' + flag, { [flag]: value })) location.reload();
}

async function saveReview(event, id) {
  event.preventDefault();
  const raw = document.getElementById('rating').value;
  const review = document.getElementById('review').value;
  const rating = raw === '' ? null : Number(raw);
  if (await api('PUT', '/movies/' + id + '/review', { rating, review })) location.reload();
}

async function deleteMovie(id) {
  if (!confirm('Remove this movie?')) return;
  if (await api('DELETE', '/movies/' + id)) location.href = '/';
}
"#;

pub fn home_page(movies: &[Movie]) -> String {
    page(
        "Watchlist",
        html! {
            (nav("home"))
            section class="bg-white shadow rounded-lg p-6" {
                h2 class="text-lg font-semibold text-gray-900" { "Find a movie" }
                form class="mt-4 flex gap-2" onsubmit="searchMovies(event)" {
                    input class="flex-1 rounded-md border border-gray-300 px-3 py-2" id="q" name="q" placeholder="Title" required;
                    button class="rounded-md bg-blue-600 px-4 py-2 font-semibold text-white hover:bg-blue-700" type="submit" { "Search" }
                }
                ul id="results" class="mt-4 divide-y" {}
            }
            (movie_grid("To watch", movies, "Nothing on the list yet. Search above to add something."))
        },
    )
}

pub fn watched_page(movies: &[Movie]) -> String {
    page(
        "Watched",
        html! {
            (nav("watched"))
            (movie_grid("Watched", movies, "No watched movies yet."))
        },
    )
}

pub fn detail_page(movie: &Movie, details: &MovieDetails) -> String {
    page(
        &movie.title,
        html! {
            (nav(""))
            article class="bg-white shadow rounded-lg p-6 flex flex-col gap-6 md:flex-row" {
                @if let Some(path) = &movie.poster_path {
                    img class="w-48 rounded" src=(poster_url(path)) alt=(movie.title);
                }
                div class="flex-1" {
                    h1 class="text-3xl font-bold text-gray-900" {
                        (movie.title)
                        @if let Some(year) = &movie.year {
                            span class="ml-2 font-normal text-gray-500" { "(" (year) ")" }
                        }
                    }
                    @if !movie.overview.is_empty() {
                        p class="mt-4 text-gray-700" { (movie.overview) }
                    }
                    dl class="mt-4 grid grid-cols-[auto_1fr] gap-x-4 gap-y-1 text-sm" {
                        dt class="font-medium text-gray-600" { "Director" }
                        dd { (details.director) }
                        dt class="font-medium text-gray-600" { "Cast" }
                        dd { (details.cast) }
                        dt class="font-medium text-gray-600" { "Runtime" }
                        dd { (details.runtime) }
                    }
                    @if let Some(tmdb_id) = movie.tmdb_id {
                        a class="mt-2 inline-block text-sm text-blue-600 hover:text-blue-800" href=(format!("https://www.themoviedb.org/movie/{}", tmdb_id)) target="_blank" rel="noopener noreferrer" { "TMDB" }
                    } @else {
                        a class="mt-2 inline-block text-sm text-blue-600 hover:text-blue-800" href=(format!("https://www.themoviedb.org/search/movie?query={}", urlencoding::encode(&movie.title))) target="_blank" rel="noopener noreferrer" { "Find on TMDB" }
                    }

                    div class="mt-6 flex flex-wrap gap-2" {
                        (flag_button(movie.id, "watched", movie.watched, "Watched", "Mark watched"))
                        (flag_button(movie.id, "watchlist", movie.watchlist, "On watchlist", "Add to watchlist"))
                        (flag_button(movie.id, "liked", movie.liked, "Liked", "Like"))
                        button class="rounded border border-red-300 px-3 py-1 text-sm text-red-700 hover:bg-red-50" onclick=(format!("deleteMovie({})", movie.id)) { "Delete" }
                    }

                    form class="mt-6 space-y-2" onsubmit=(format!("saveReview(event, {})", movie.id)) {
                        label class="block text-sm font-medium text-gray-700" for="rating" { "Rating" }
                        select class="rounded-md border border-gray-300 px-2 py-1" id="rating" {
                            option value="" selected[movie.rating.is_none()] { "No rating" }
                            @for r in 1..=5u8 {
                                option value=(r) selected[movie.rating == Some(r)] { (stars(r)) }
                            }
                        }
                        label class="block text-sm font-medium text-gray-700" for="review" { "Review" }
                        textarea class="w-full rounded-md border border-gray-300 px-3 py-2" id="review" rows="4" { (movie.review) }
                        button class="rounded-md bg-blue-600 px-4 py-2 font-semibold text-white hover:bg-blue-700" type="submit" { "Save" }
                    }
                }
            }
        },
    )
}

pub fn not_found_page() -> String {
    error_page(StatusCode::NOT_FOUND, "Page not found")
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    page(
        "Error",
        html! {
            div class="bg-white shadow rounded-lg p-8" {
                h1 class="text-2xl font-bold text-gray-900" { (status.as_u16()) " " (status.canonical_reason().unwrap_or("Error")) }
                p class="mt-4 text-gray-700" { (message) }
                a class="mt-6 inline-block text-blue-600 hover:text-blue-800" href="/" { "Back" }
            }
        },
    )
}

fn page(title: &str, body: Markup) -> String {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                script src=(TAILWIND_CDN) {}
                script { (PreEscaped(SCRIPT)) }
            }
            body class="min-h-screen bg-gray-50" {
                main class="max-w-4xl mx-auto px-6 py-10 space-y-8" { (body) }
            }
        }
    }
    .into_string()
}

fn nav(active: &str) -> Markup {
    let link = |href: &str, label: &str, key: &str| {
        let class = if key == active {
            "font-semibold text-gray-900"
        } else {
            "text-blue-600 hover:text-blue-800"
        };
        html! { a class=(class) href=(href) { (label) } }
    };
    html! {
        nav class="flex gap-6" {
            (link("/", "Watchlist", "home"))
            (link("/watched", "Watched", "watched"))
        }
    }
}

fn movie_grid(heading: &str, movies: &[Movie], empty: &str) -> Markup {
    html! {
        section {
            h2 class="text-2xl font-bold text-gray-900" { (heading) }
            @if movies.is_empty() {
                p class="mt-4 text-gray-600" { (empty) }
            } @else {
                ul class="mt-4 grid gap-4 sm:grid-cols-2 md:grid-cols-3" {
                    @for movie in movies {
                        li { (movie_card(movie)) }
                    }
                }
            }
        }
    }
}

fn movie_card(movie: &Movie) -> Markup {
    html! {
        a class="block bg-white shadow rounded-lg p-4 hover:shadow-md" href=(format!("/movies/{}", movie.id)) data-movie-id=(movie.id) {
            @if let Some(path) = &movie.poster_path {
                img class="mb-3 w-full rounded" src=(poster_url(path)) alt=(movie.title) loading="lazy";
            }
            h3 class="font-semibold text-gray-900" {
                (movie.title)
                @if let Some(year) = &movie.year {
                    span class="ml-1 font-normal text-gray-500" { "(" (year) ")" }
                }
            }
            p class="mt-1 text-sm text-gray-500" {
                @if let Some(r) = movie.rating { (stars(r)) " " }
                @if movie.liked { "♥" }
            }
        }
    }
}

fn flag_button(id: u64, flag: &str, on: bool, on_label: &str, off_label: &str) -> Markup {
    let class = if on {
        "rounded bg-gray-800 px-3 py-1 text-sm text-white"
    } else {
        "rounded border border-gray-300 px-3 py-1 text-sm text-gray-700 hover:bg-gray-100"
    };
    html! {
        button class=(class) onclick=(format!("setFlag({}, '{}', {})", id, flag, !on)) {
            @if on { (on_label) } @else { (off_label) }
        }
    }
}

fn stars(rating: u8) -> String {
    "★".repeat(rating as usize)
}
