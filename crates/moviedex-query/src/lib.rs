//! Cache-aware query layer for the moviedex client.
//!
//! A [`QueryCache`] maps [`QueryKey`]s to cached results, shares one
//! in-flight fetch per key, serves fresh data without network calls and
//! revalidates stale data in the background. [`QueryObserver`] follows a
//! query across key changes and keeps the previous result visible while
//! the next one loads. The TMDB query definitions live in [`queries`].

pub mod cache;
pub mod error;
pub mod key;
pub mod observer;
pub mod options;
pub mod queries;
pub mod state;

#[cfg(test)]
mod testing;

#[allow(clippy::module_name_repetitions)]
pub use cache::{CacheStats, EntryInfo, FetchFuture, Fetcher, QueryCache, Subscription};
pub use error::{ErrorInfo, ErrorKind};
#[allow(clippy::module_name_repetitions)]
pub use key::{KeyPart, ParseKeyError, QueryKey};
pub use observer::{BoundQuery, QueryObserver};
pub use options::{CacheConfig, QueryOptions};
pub use queries::{
    MOVIE_DETAILS, MovieDetails, MovieQueries, POPULAR_MOVIES, PopularMovies, QueryDefinition,
    SEARCH_MOVIES, SearchMovies, TOP_RATED_MOVIES, TopRatedMovies,
};
pub use state::{QueryState, QueryStatus, QueryValue};
