//! TMDB API client module.
//!
//! Handles HTTP requests to the TMDB API v3 movie endpoints
//! and retrieves listing pages and movie details.

mod api;
mod client;
mod error;
mod image;
mod types;

#[allow(clippy::module_name_repetitions)]
pub use api::{LocalTmdbApi, TmdbApi};
#[allow(clippy::module_name_repetitions)]
pub use client::{TmdbClient, TmdbClientBuilder};
#[allow(clippy::module_name_repetitions)]
pub use error::{ConfigError, TmdbError};
pub use image::{IMAGE_BASE_URL, PLACEHOLDER_POSTER, PosterSize, poster_url};
pub use types::{
    DEFAULT_LANGUAGE, Genre, Movie, MovieDetails, MovieDetailsParams, MoviePage,
    PopularMoviesParams, SearchMoviesParams, SpokenLanguage,
};
