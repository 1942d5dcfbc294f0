//! `TmdbApi` trait definition.
#![allow(clippy::future_not_send)]

use super::error::TmdbError;
use super::types::{
    MovieDetails, MovieDetailsParams, MoviePage, PopularMoviesParams, SearchMoviesParams,
};

/// TMDB movie API trait.
///
/// Abstracts API operations for mock substitution in tests.
/// Uses `trait_variant::make` to generate a `Send`-bound async trait;
/// implement `TmdbApi` and `LocalTmdbApi` comes for free.
#[allow(clippy::module_name_repetitions)]
#[trait_variant::make(TmdbApi: Send)]
pub trait LocalTmdbApi {
    /// Fetches a page of popular movies.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request or JSON parsing fails.
    async fn popular_movies(&self, params: &PopularMoviesParams) -> Result<MoviePage, TmdbError>;

    /// Fetches the top-rated movies.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request or JSON parsing fails.
    async fn top_rated_movies(&self) -> Result<MoviePage, TmdbError>;

    /// Searches for movies.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request or JSON parsing fails.
    async fn search_movies(&self, params: &SearchMoviesParams) -> Result<MoviePage, TmdbError>;

    /// Fetches movie details.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request or JSON parsing fails.
    async fn movie_details(&self, params: &MovieDetailsParams) -> Result<MovieDetails, TmdbError>;
}
