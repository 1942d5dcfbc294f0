//! Single movie lookup.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use moviedex_api::tmdb::{
    MovieDetails as MovieDetailsData, MovieDetailsParams, TmdbApi, TmdbError,
};

use super::{MOVIE_DETAILS, QueryDefinition};
use crate::key::{KeyPart, QueryKey};

/// Movie details query, keyed as `["MOVIE_DETAILS", id]`.
///
/// Language and `append_to_response` are fetch parameters; changing them
/// re-fetches the same entry. Disabled for id 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieDetails {
    /// Request parameters.
    pub params: MovieDetailsParams,
}

impl MovieDetails {
    /// Creates the query.
    #[must_use]
    pub const fn new(params: MovieDetailsParams) -> Self {
        Self { params }
    }
}

impl QueryDefinition for MovieDetails {
    type Output = MovieDetailsData;

    fn query_key(&self) -> QueryKey {
        QueryKey::new(MOVIE_DETAILS).with(self.params.id)
    }

    fn params_key(&self) -> QueryKey {
        self.query_key().with(KeyPart::map([
            ("language", Some(KeyPart::from(self.params.language.as_str()))),
            (
                "append_to_response",
                self.params.append_to_response.as_deref().map(KeyPart::from),
            ),
        ]))
    }

    fn is_enabled(&self) -> bool {
        self.params.id > 0
    }

    fn fetch<A: TmdbApi + Sync + 'static>(
        self,
        api: Arc<A>,
    ) -> BoxFuture<'static, Result<MovieDetailsData, TmdbError>> {
        async move { api.movie_details(&self.params).await }.boxed()
    }
}
