//! Movie search.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use moviedex_api::tmdb::{MoviePage, SearchMoviesParams, TmdbApi, TmdbError};

use super::{QueryDefinition, SEARCH_MOVIES};
use crate::key::{KeyPart, QueryKey};

/// Search query.
///
/// Keyed by the query text alone, as `["SEARCH_MOVIES", query]`: every
/// page and language of one search term shares a single entry, and
/// switching page re-fetches into that entry while the previous page
/// stays visible. Disabled while the text is blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMovies {
    /// Request parameters.
    pub params: SearchMoviesParams,
}

impl SearchMovies {
    /// Creates the query.
    #[must_use]
    pub const fn new(params: SearchMoviesParams) -> Self {
        Self { params }
    }
}

impl QueryDefinition for SearchMovies {
    type Output = MoviePage;

    fn query_key(&self) -> QueryKey {
        QueryKey::new(SEARCH_MOVIES).with(self.params.query.as_str())
    }

    fn params_key(&self) -> QueryKey {
        self.query_key().with(KeyPart::map([
            ("page", Some(KeyPart::from(self.params.page))),
            ("language", Some(KeyPart::from(self.params.language.as_str()))),
        ]))
    }

    fn is_enabled(&self) -> bool {
        !self.params.query.trim().is_empty()
    }

    fn keep_previous_data(&self) -> bool {
        true
    }

    fn fetch<A: TmdbApi + Sync + 'static>(
        self,
        api: Arc<A>,
    ) -> BoxFuture<'static, Result<MoviePage, TmdbError>> {
        async move { api.search_movies(&self.params).await }.boxed()
    }
}
