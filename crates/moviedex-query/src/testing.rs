//! In-memory `TmdbApi` for unit tests.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use moviedex_api::tmdb::{
    Movie, MovieDetails, MovieDetailsParams, MoviePage, PopularMoviesParams, SearchMoviesParams,
    TmdbApi, TmdbError,
};
use serde_json::json;
use tokio::sync::Semaphore;

/// Counts calls, records parameters and answers with synthetic pages.
///
/// Result titles encode the request: search results are titled
/// `"{query} p{page} #{n}"`, popular results `"Popular p{page} #{n}"`.
#[derive(Debug, Default)]
pub struct MockTmdbApi {
    popular_calls: AtomicUsize,
    top_rated_calls: AtomicUsize,
    search_calls: AtomicUsize,
    details_calls: AtomicUsize,
    last_popular: Mutex<Option<PopularMoviesParams>>,
    last_search: Mutex<Option<SearchMoviesParams>>,
    last_details: Mutex<Option<MovieDetailsParams>>,
    failure: Option<TmdbError>,
    gate: Option<Arc<Semaphore>>,
}

impl MockTmdbApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with `error`.
    pub fn failing_with(mut self, error: TmdbError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Every call waits for one permit of `gate` before answering.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn popular_calls(&self) -> usize {
        self.popular_calls.load(Ordering::SeqCst)
    }

    pub fn top_rated_calls(&self) -> usize {
        self.top_rated_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn details_calls(&self) -> usize {
        self.details_calls.load(Ordering::SeqCst)
    }

    pub fn last_popular_params(&self) -> Option<PopularMoviesParams> {
        self.last_popular.lock().unwrap().clone()
    }

    pub fn last_search_params(&self) -> Option<SearchMoviesParams> {
        self.last_search.lock().unwrap().clone()
    }

    pub fn last_details_params(&self) -> Option<MovieDetailsParams> {
        self.last_details.lock().unwrap().clone()
    }

    async fn respond<T>(&self, answer: impl FnOnce() -> T) -> Result<T, TmdbError> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.failure.clone().map_or_else(|| Ok(answer()), Err)
    }
}

fn movie(id: u64, title: &str) -> Movie {
    serde_json::from_value(json!({
        "id": id,
        "title": title,
        "vote_average": 7.5,
        "poster_path": format!("/poster{id}.jpg"),
    }))
    .unwrap()
}

fn page(page: u32, prefix: &str) -> MoviePage {
    MoviePage {
        page,
        results: (1..=2_u64)
            .map(|n| movie(u64::from(page) * 100 + n, &format!("{prefix} p{page} #{n}")))
            .collect(),
        total_pages: 10,
        total_results: 20,
    }
}

impl TmdbApi for MockTmdbApi {
    async fn popular_movies(&self, params: &PopularMoviesParams) -> Result<MoviePage, TmdbError> {
        self.popular_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_popular.lock().unwrap() = Some(params.clone());
        let number = params.page;
        self.respond(|| page(number, "Popular")).await
    }

    async fn top_rated_movies(&self) -> Result<MoviePage, TmdbError> {
        self.top_rated_calls.fetch_add(1, Ordering::SeqCst);
        self.respond(|| page(1, "Top")).await
    }

    async fn search_movies(&self, params: &SearchMoviesParams) -> Result<MoviePage, TmdbError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_search.lock().unwrap() = Some(params.clone());
        let (number, query) = (params.page, params.query.clone());
        self.respond(|| page(number, &query)).await
    }

    async fn movie_details(&self, params: &MovieDetailsParams) -> Result<MovieDetails, TmdbError> {
        self.details_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_details.lock().unwrap() = Some(params.clone());
        let id = params.id;
        self.respond(|| {
            serde_json::from_value(json!({
                "id": id,
                "title": format!("Movie {id}"),
                "runtime": 120,
                "genres": [{"id": 18, "name": "Drama"}],
                "spoken_languages": [{"english_name": "English", "iso_639_1": "en", "name": "English"}],
            }))
            .unwrap()
        })
        .await
    }
}
