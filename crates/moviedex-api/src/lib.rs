//! API client library for moviedex.
//!
//! Provides a read-only client for the TMDB v3 movie endpoints.

/// TMDB API client.
pub mod tmdb;
