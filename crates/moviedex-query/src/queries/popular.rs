//! Popular movies, one cache entry per page/language/region.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use moviedex_api::tmdb::{MoviePage, PopularMoviesParams, TmdbApi, TmdbError};

use super::{POPULAR_MOVIES, QueryDefinition};
use crate::key::{KeyPart, QueryKey};

/// Popular-movie page query.
///
/// Keyed as `["POPULAR_MOVIES", {page, language, region?}]`. Keeps the
/// previous page visible while the next one loads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopularMovies {
    /// Request parameters.
    pub params: PopularMoviesParams,
}

impl PopularMovies {
    /// Creates the query.
    #[must_use]
    pub const fn new(params: PopularMoviesParams) -> Self {
        Self { params }
    }
}

impl QueryDefinition for PopularMovies {
    type Output = MoviePage;

    fn query_key(&self) -> QueryKey {
        QueryKey::new(POPULAR_MOVIES).with(KeyPart::map([
            ("page", Some(KeyPart::from(self.params.page))),
            ("language", Some(KeyPart::from(self.params.language.as_str()))),
            ("region", self.params.region.as_deref().map(KeyPart::from)),
        ]))
    }

    fn keep_previous_data(&self) -> bool {
        true
    }

    fn fetch<A: TmdbApi + Sync + 'static>(
        self,
        api: Arc<A>,
    ) -> BoxFuture<'static, Result<MoviePage, TmdbError>> {
        async move { api.popular_movies(&self.params).await }.boxed()
    }
}
