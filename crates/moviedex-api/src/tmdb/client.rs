//! `TmdbClient` - TMDB API client implementation.

use std::time::Duration;

use reqwest::Client;
use tracing::instrument;
use url::Url;

use super::api::TmdbApi;
use super::error::{ConfigError, TmdbError};
use super::types::{
    MovieDetails, MovieDetailsParams, MoviePage, PopularMoviesParams, SearchMoviesParams,
    TmdbErrorResponse,
};

/// Default base URL for TMDB API v3.
const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3/";

/// TMDB API client.
///
/// Issues exactly one GET per call. Retrying is left to the caller.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct TmdbClient {
    /// HTTP client.
    http_client: Client,
    /// Base URL for API requests.
    base_url: Url,
    /// Bearer API token.
    api_token: String,
}

/// Builder for `TmdbClient`.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct TmdbClientBuilder {
    base_url: Option<Url>,
    api_token: Option<String>,
    user_agent: Option<String>,
    timeout: Option<Duration>,
}

impl TmdbClientBuilder {
    /// Creates a new builder.
    const fn new() -> Self {
        Self {
            base_url: None,
            api_token: None,
            user_agent: None,
            timeout: None,
        }
    }

    /// Overrides the base URL (for wiremock in tests).
    #[must_use]
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Sets the API bearer token (required).
    #[must_use]
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Sets the User-Agent (required).
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets a per-request timeout (default: none).
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// - `api_token` is not set or blank.
    /// - `user_agent` is not set.
    /// - The base URL is invalid or does not end with `/`.
    /// - `reqwest::Client` build fails.
    pub fn build(self) -> Result<TmdbClient, ConfigError> {
        let api_token = self
            .api_token
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::MissingApiToken)?;
        let user_agent = self.user_agent.ok_or(ConfigError::MissingUserAgent)?;

        let base_url = match self.base_url {
            Some(url) => url,
            None => Url::parse(DEFAULT_BASE_URL)?,
        };
        if !base_url.path().ends_with('/') {
            return Err(ConfigError::BaseUrlNotADirectory(base_url.to_string()));
        }

        let mut builder = Client::builder().user_agent(&user_agent).gzip(true);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build().map_err(ConfigError::HttpClient)?;

        Ok(TmdbClient {
            http_client,
            base_url,
            api_token,
        })
    }
}

impl TmdbClient {
    /// Creates a new builder.
    #[must_use]
    pub const fn builder() -> TmdbClientBuilder {
        TmdbClientBuilder::new()
    }

    /// Returns the base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Sends a GET request with Bearer auth and query params, then decodes
    /// the JSON body.
    #[instrument(skip_all, fields(path = %path))]
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, TmdbError> {
        let network = |message: String| TmdbError::Network {
            path: String::from(path),
            message,
        };

        let url = self
            .base_url
            .join(path)
            .map_err(|e| network(format!("failed to join URL path: {e}")))?;

        let mut request = self
            .http_client
            .get(url)
            .bearer_auth(&self.api_token);
        if !query.is_empty() {
            request = request.query(query);
        }
        let request = request
            .build()
            .map_err(|e| network(format!("failed to build request: {e}")))?;

        tracing::debug!(url = %request.url(), "TMDB API request");

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<failed to read body>"));
            let message = serde_json::from_str::<TmdbErrorResponse>(&body).map_or(body, |error| {
                format!("code={}, message={}", error.status_code, error.status_message)
            });
            tracing::debug!(status = status.as_u16(), "TMDB API returned an error status");
            return Err(TmdbError::Http {
                status_code: status.as_u16(),
                message,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| network(format!("failed to read response body: {e}")))?;
        serde_json::from_str(&body).map_err(|e| TmdbError::Decode {
            path: String::from(path),
            message: e.to_string(),
        })
    }
}

impl TmdbApi for TmdbClient {
    #[instrument(skip_all)]
    async fn popular_movies(&self, params: &PopularMoviesParams) -> Result<MoviePage, TmdbError> {
        let mut query: Vec<(&str, String)> = vec![
            ("page", params.page.to_string()),
            ("language", params.language.clone()),
        ];
        if let Some(ref region) = params.region {
            query.push(("region", region.clone()));
        }

        self.get_json("movie/popular", &query).await
    }

    #[instrument(skip_all)]
    async fn top_rated_movies(&self) -> Result<MoviePage, TmdbError> {
        self.get_json("movie/top_rated", &[]).await
    }

    #[instrument(skip_all)]
    async fn search_movies(&self, params: &SearchMoviesParams) -> Result<MoviePage, TmdbError> {
        let query: Vec<(&str, String)> = vec![
            ("query", params.query.clone()),
            ("page", params.page.to_string()),
            ("language", params.language.clone()),
        ];

        self.get_json("search/movie", &query).await
    }

    #[instrument(skip_all)]
    async fn movie_details(&self, params: &MovieDetailsParams) -> Result<MovieDetails, TmdbError> {
        let path = format!("movie/{}", params.id);
        let mut query: Vec<(&str, String)> = vec![("language", params.language.clone())];
        if let Some(ref append) = params.append_to_response {
            query.push(("append_to_response", append.clone()));
        }

        self.get_json(&path, &query).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn mock_client(server: &MockServer) -> TmdbClient {
        let base_url = format!("{}/3/", server.uri());
        TmdbClient::builder()
            .base_url(base_url.parse().unwrap())
            .api_token("test-token")
            .user_agent("test/0.0.0")
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_api_token() {
        // Arrange & Act
        let result = TmdbClient::builder().user_agent("test/0.0.0").build();

        // Assert
        assert!(matches!(result, Err(ConfigError::MissingApiToken)));
    }

    #[test]
    fn test_builder_rejects_blank_api_token() {
        // Arrange & Act
        let result = TmdbClient::builder()
            .api_token("   ")
            .user_agent("test/0.0.0")
            .build();

        // Assert
        assert!(matches!(result, Err(ConfigError::MissingApiToken)));
    }

    #[test]
    fn test_builder_requires_user_agent() {
        // Arrange & Act
        let result = TmdbClient::builder().api_token("test-token").build();

        // Assert
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("user_agent is required")
        );
    }

    #[test]
    fn test_builder_with_required_fields_uses_default_base_url() {
        // Arrange & Act
        let client = TmdbClient::builder()
            .api_token("test-token")
            .user_agent("test/0.0.0")
            .build()
            .unwrap();

        // Assert
        assert_eq!(client.base_url().as_str(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_builder_rejects_base_url_without_trailing_slash() {
        // Arrange
        let url = Url::parse("http://localhost:8080/3").unwrap();

        // Act
        let result = TmdbClient::builder()
            .base_url(url)
            .api_token("test-token")
            .user_agent("test/0.0.0")
            .build();

        // Assert
        assert!(matches!(result, Err(ConfigError::BaseUrlNotADirectory(_))));
    }

    #[test]
    fn test_parse_popular_fixture() {
        // Arrange
        let json = include_str!("../../../../fixtures/tmdb/popular_movies.json");

        // Act
        let page: MoviePage = serde_json::from_str(json).unwrap();

        // Assert
        assert_eq!(page.page, 1);
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.results[0].id, 693_134);
        assert_eq!(page.results[0].title, "Dune: Part Two");
        assert!(page.results[1].poster_path.is_none());
    }

    #[test]
    fn test_parse_movie_details_fixture() {
        // Arrange
        let json = include_str!("../../../../fixtures/tmdb/movie_details_550.json");

        // Act
        let details: MovieDetails = serde_json::from_str(json).unwrap();

        // Assert
        assert_eq!(details.id, 550);
        assert_eq!(details.title, "Fight Club");
        assert_eq!(details.runtime, Some(139));
        assert_eq!(details.genres.len(), 2);
        assert_eq!(details.spoken_languages[0].english_name, "English");
        assert_eq!(details.tagline.as_deref(), Some("Mischief. Mayhem. Soap."));
    }

    #[test]
    fn test_parse_error_response() {
        // Arrange
        let json = r#"{"status_code":7,"status_message":"Invalid API key: You must be granted a valid key.","success":false}"#;

        // Act
        let error: TmdbErrorResponse = serde_json::from_str(json).unwrap();

        // Assert
        assert_eq!(error.status_code, 7);
        assert!(!error.success);
        assert!(error.status_message.contains("Invalid API key"));
    }

    #[tokio::test]
    async fn test_popular_movies_via_http() {
        // Arrange
        let mock_server = MockServer::start().await;
        let json_body = include_str!("../../../../fixtures/tmdb/popular_movies.json");

        Mock::given(method("GET"))
            .and(path("/3/movie/popular"))
            .and(query_param("page", "2"))
            .and(query_param("language", "en-US"))
            .and(query_param("region", "JP"))
            .respond_with(ResponseTemplate::new(200).set_body_string(json_body))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = mock_client(&mock_server);
        let params = PopularMoviesParams::new().page(2).region("JP");

        // Act
        let page = client.popular_movies(&params).await.unwrap();

        // Assert
        assert_eq!(page.results.len(), 2);
    }

    #[tokio::test]
    async fn test_popular_movies_omits_missing_region() {
        // Arrange
        let mock_server = MockServer::start().await;
        let json_body = include_str!("../../../../fixtures/tmdb/popular_movies.json");

        Mock::given(method("GET"))
            .and(path("/3/movie/popular"))
            .and(query_param_is_missing("region"))
            .respond_with(ResponseTemplate::new(200).set_body_string(json_body))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = mock_client(&mock_server);

        // Act & Assert (mock expect(1) verifies the query string)
        client
            .popular_movies(&PopularMoviesParams::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_top_rated_movies_sends_no_query_params() {
        // Arrange
        let mock_server = MockServer::start().await;
        let json_body = include_str!("../../../../fixtures/tmdb/top_rated_movies.json");

        Mock::given(method("GET"))
            .and(path("/3/movie/top_rated"))
            .and(query_param_is_missing("page"))
            .and(query_param_is_missing("language"))
            .respond_with(ResponseTemplate::new(200).set_body_string(json_body))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = mock_client(&mock_server);

        // Act
        let page = client.top_rated_movies().await.unwrap();

        // Assert
        assert_eq!(page.results[0].title, "The Shawshank Redemption");
    }

    #[tokio::test]
    async fn test_search_movies_via_http() {
        // Arrange
        let mock_server = MockServer::start().await;
        let json_body = include_str!("../../../../fixtures/tmdb/search_movie_batman.json");

        Mock::given(method("GET"))
            .and(path("/3/search/movie"))
            .and(query_param("query", "batman"))
            .and(query_param("page", "1"))
            .and(query_param("language", "en-US"))
            .respond_with(ResponseTemplate::new(200).set_body_string(json_body))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = mock_client(&mock_server);

        // Act
        let page = client
            .search_movies(&SearchMoviesParams::new("batman"))
            .await
            .unwrap();

        // Assert
        assert_eq!(page.total_results, 170);
        assert!(page.results.iter().all(|m| m.title == "Batman"));
    }

    #[tokio::test]
    async fn test_movie_details_with_append_to_response() {
        // Arrange
        let mock_server = MockServer::start().await;
        let json_body = r#"{"id":550,"title":"Fight Club","genres":[],"credits":{"cast":[]}}"#;

        Mock::given(method("GET"))
            .and(path("/3/movie/550"))
            .and(query_param("language", "fr-FR"))
            .and(query_param("append_to_response", "credits"))
            .respond_with(ResponseTemplate::new(200).set_body_string(json_body))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = mock_client(&mock_server);
        let params = MovieDetailsParams::new(550)
            .language("fr-FR")
            .append_to_response("credits");

        // Act
        let details = client.movie_details(&params).await.unwrap();

        // Assert
        assert_eq!(details.id, 550);
        assert!(details.runtime.is_none());
        assert!(details.appended.contains_key("credits"));
    }

    #[tokio::test]
    async fn test_bearer_token_is_sent() {
        // Arrange
        let mock_server = MockServer::start().await;
        let json_body = include_str!("../../../../fixtures/tmdb/search_movie_empty.json");

        Mock::given(method("GET"))
            .and(header("Authorization", "Bearer my-secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(json_body))
            .expect(1)
            .mount(&mock_server)
            .await;

        let base_url = format!("{}/3/", mock_server.uri());
        let client = TmdbClient::builder()
            .base_url(base_url.parse().unwrap())
            .api_token("my-secret-token")
            .user_agent("test/0.0.0")
            .build()
            .unwrap();

        // Act & Assert (mock expect(1) verifies Authorization header)
        client
            .search_movies(&SearchMoviesParams::new("test"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_http_error_returns_typed_error() {
        // Arrange
        let mock_server = MockServer::start().await;
        let error_body = r#"{"status_code":7,"status_message":"Invalid API key: You must be granted a valid key.","success":false}"#;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string(error_body))
            .mount(&mock_server)
            .await;

        let client = mock_client(&mock_server);

        // Act
        let err = client.top_rated_movies().await.unwrap_err();

        // Assert
        assert_eq!(err.status_code(), Some(401));
        assert!(err.to_string().contains("TMDB API error"));
        assert!(err.to_string().contains("Invalid API key"));
    }

    #[tokio::test]
    async fn test_non_tmdb_error_body_is_kept_verbatim() {
        // Arrange
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
            .mount(&mock_server)
            .await;

        let client = mock_client(&mock_server);

        // Act
        let err = client.top_rated_movies().await.unwrap_err();

        // Assert
        assert_eq!(
            err,
            TmdbError::Http {
                status_code: 503,
                message: String::from("upstream unavailable"),
            }
        );
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        // Arrange
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).set_body_string("{}"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = mock_client(&mock_server);

        // Act
        let result = client.top_rated_movies().await;

        // Assert
        assert!(matches!(
            result,
            Err(TmdbError::Http {
                status_code: 429,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_malformed_body_returns_decode_error() {
        // Arrange
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"page\":"))
            .mount(&mock_server)
            .await;

        let client = mock_client(&mock_server);

        // Act
        let result = client.top_rated_movies().await;

        // Assert
        assert!(matches!(result, Err(TmdbError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_server_returns_network_error() {
        // Arrange
        let client = TmdbClient::builder()
            .base_url(Url::parse("http://127.0.0.1:9/3/").unwrap())
            .api_token("test-token")
            .user_agent("test/0.0.0")
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        // Act
        let result = client.top_rated_movies().await;

        // Assert
        assert!(matches!(result, Err(TmdbError::Network { .. })));
    }
}
