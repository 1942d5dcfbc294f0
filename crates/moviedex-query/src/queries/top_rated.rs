//! Top-rated movies.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use moviedex_api::tmdb::{MoviePage, TmdbApi, TmdbError};

use super::{QueryDefinition, TOP_RATED_MOVIES};
use crate::key::QueryKey;

/// Top-rated list query, keyed as `["TOP_RATED_MOVIES"]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopRatedMovies;

impl QueryDefinition for TopRatedMovies {
    type Output = MoviePage;

    fn query_key(&self) -> QueryKey {
        QueryKey::new(TOP_RATED_MOVIES)
    }

    fn fetch<A: TmdbApi + Sync + 'static>(
        self,
        api: Arc<A>,
    ) -> BoxFuture<'static, Result<MoviePage, TmdbError>> {
        async move { api.top_rated_movies().await }.boxed()
    }
}
