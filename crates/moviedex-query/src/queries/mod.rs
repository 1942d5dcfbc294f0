//! TMDB query definitions.
//!
//! Each definition turns a parameter set into a cache key and a fetch on
//! [`TmdbApi`]. Keys are namespaced by the constants below so callers can
//! invalidate a whole family with a one-part prefix.

mod details;
mod popular;
mod search;
mod top_rated;

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use moviedex_api::tmdb::{
    MovieDetails as MovieDetailsData, MovieDetailsParams, MoviePage, PopularMoviesParams,
    SearchMoviesParams, TmdbApi, TmdbError,
};

pub use self::details::MovieDetails;
pub use self::popular::PopularMovies;
pub use self::search::SearchMovies;
pub use self::top_rated::TopRatedMovies;
use crate::cache::{Fetcher, QueryCache};
use crate::error::ErrorInfo;
use crate::key::QueryKey;
use crate::observer::{BoundQuery, QueryObserver};
use crate::options::QueryOptions;
use crate::state::QueryValue;

/// Key namespace of popular-movie pages.
pub const POPULAR_MOVIES: &str = "POPULAR_MOVIES";

/// Key namespace of the top-rated list.
pub const TOP_RATED_MOVIES: &str = "TOP_RATED_MOVIES";

/// Key namespace of search results.
pub const SEARCH_MOVIES: &str = "SEARCH_MOVIES";

/// Key namespace of movie details.
pub const MOVIE_DETAILS: &str = "MOVIE_DETAILS";

/// A named query: key derivation, gating and the fetch itself.
#[allow(clippy::module_name_repetitions)]
pub trait QueryDefinition: Clone + Send + Sync + 'static {
    /// Result type cached under the key.
    type Output: Send + Sync + 'static;

    /// Cache key. Two definitions with the same key share one entry.
    fn query_key(&self) -> QueryKey;

    /// Identity of the full parameter set.
    ///
    /// Defaults to the cache key. Definitions whose fetch depends on
    /// parameters left out of the key return a longer key here, so a
    /// change of those parameters still triggers a refetch.
    fn params_key(&self) -> QueryKey {
        self.query_key()
    }

    /// Whether the query may fetch.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Whether the previous result stays visible while a new key loads.
    fn keep_previous_data(&self) -> bool {
        false
    }

    /// Subscription options derived from the definition.
    fn options(&self) -> QueryOptions {
        QueryOptions::default()
            .enabled(self.is_enabled())
            .keep_previous_data(self.keep_previous_data())
    }

    /// Performs the request.
    fn fetch<A: TmdbApi + Sync + 'static>(
        self,
        api: Arc<A>,
    ) -> BoxFuture<'static, Result<Self::Output, TmdbError>>;

    /// Binds the definition to an API client.
    fn bind<A: TmdbApi + Sync + 'static>(&self, api: &Arc<A>) -> BoundQuery<Self::Output> {
        let definition = self.clone();
        let api = Arc::clone(api);
        let fetcher: Fetcher = Arc::new(move || {
            let request = definition.clone().fetch(Arc::clone(&api));
            async move {
                request
                    .await
                    .map(|output| Arc::new(output) as QueryValue)
                    .map_err(ErrorInfo::from)
            }
            .boxed()
        });
        BoundQuery::new(self.query_key(), self.params_key(), fetcher, self.options())
    }
}

/// Movie queries bound to one cache and one API client.
pub struct MovieQueries<A> {
    cache: QueryCache,
    api: Arc<A>,
}

impl<A> std::fmt::Debug for MovieQueries<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovieQueries")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl<A> Clone for MovieQueries<A> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            api: Arc::clone(&self.api),
        }
    }
}

impl<A: TmdbApi + Sync + 'static> MovieQueries<A> {
    /// Creates the query set.
    #[must_use]
    pub const fn new(cache: QueryCache, api: Arc<A>) -> Self {
        Self { cache, api }
    }

    /// Returns the underlying cache.
    #[must_use]
    pub const fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Binds a definition to this client, for use with
    /// [`QueryObserver::set_query`].
    #[must_use]
    pub fn bind<D: QueryDefinition>(&self, definition: &D) -> BoundQuery<D::Output> {
        definition.bind(&self.api)
    }

    /// Subscribes to a definition.
    #[must_use]
    pub fn observe<D: QueryDefinition>(&self, definition: &D) -> QueryObserver<D::Output> {
        QueryObserver::new(&self.cache, self.bind(definition))
    }

    /// Popular movies, one page per key.
    #[must_use]
    pub fn popular(&self, params: PopularMoviesParams) -> QueryObserver<MoviePage> {
        self.observe(&PopularMovies::new(params))
    }

    /// The top-rated list.
    #[must_use]
    pub fn top_rated(&self) -> QueryObserver<MoviePage> {
        self.observe(&TopRatedMovies)
    }

    /// Search results; idle while the query text is blank.
    #[must_use]
    pub fn search(&self, params: SearchMoviesParams) -> QueryObserver<MoviePage> {
        self.observe(&SearchMovies::new(params))
    }

    /// Movie details; idle while the id is 0.
    #[must_use]
    pub fn movie_details(&self, params: MovieDetailsParams) -> QueryObserver<MovieDetailsData> {
        self.observe(&MovieDetails::new(params))
    }

    /// Invalidates every query under `prefix`.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        self.cache.invalidate(prefix)
    }
}
