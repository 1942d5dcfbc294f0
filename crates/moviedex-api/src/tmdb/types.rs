//! TMDB API response types and request parameters.

use serde::Deserialize;

/// Default response language for every endpoint.
pub const DEFAULT_LANGUAGE: &str = "en-US";

// --- Listings ---

/// Paginated movie listing returned by `movie/popular`, `movie/top_rated`
/// and `search/movie`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MoviePage {
    /// Current page number.
    pub page: u32,
    /// Movies on this page.
    pub results: Vec<Movie>,
    /// Total number of pages.
    pub total_pages: u32,
    /// Total number of results.
    pub total_results: u32,
}

/// A single movie list item.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Movie {
    /// TMDB movie ID.
    pub id: u64,
    /// Localized title.
    pub title: String,
    /// Original title.
    #[serde(default)]
    pub original_title: String,
    /// Original language (ISO 639-1).
    #[serde(default)]
    pub original_language: String,
    /// Release date (YYYY-MM-DD, empty or null when unknown).
    #[serde(default)]
    pub release_date: Option<String>,
    /// Overview text.
    #[serde(default)]
    pub overview: Option<String>,
    /// Popularity score.
    #[serde(default)]
    pub popularity: f64,
    /// Vote average (0-10).
    #[serde(default)]
    pub vote_average: f64,
    /// Vote count.
    #[serde(default)]
    pub vote_count: u32,
    /// Genre IDs.
    #[serde(default)]
    pub genre_ids: Vec<u32>,
    /// Adult flag.
    #[serde(default)]
    pub adult: bool,
    /// Video flag.
    #[serde(default)]
    pub video: bool,
    /// Poster image path.
    #[serde(default)]
    pub poster_path: Option<String>,
    /// Backdrop image path.
    #[serde(default)]
    pub backdrop_path: Option<String>,
}

// --- Movie Details ---

/// Response from `movie/{movie_id}` endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MovieDetails {
    /// TMDB movie ID.
    pub id: u64,
    /// Localized title.
    pub title: String,
    /// Original title.
    #[serde(default)]
    pub original_title: String,
    /// Original language (ISO 639-1).
    #[serde(default)]
    pub original_language: String,
    /// Release date.
    #[serde(default)]
    pub release_date: Option<String>,
    /// Overview text.
    #[serde(default)]
    pub overview: Option<String>,
    /// Tagline.
    #[serde(default)]
    pub tagline: Option<String>,
    /// Runtime in minutes.
    #[serde(default)]
    pub runtime: Option<u32>,
    /// Genres.
    #[serde(default)]
    pub genres: Vec<Genre>,
    /// Spoken languages.
    #[serde(default)]
    pub spoken_languages: Vec<SpokenLanguage>,
    /// Release status (e.g., "Released").
    #[serde(default)]
    pub status: Option<String>,
    /// Popularity score.
    #[serde(default)]
    pub popularity: f64,
    /// Vote average (0-10).
    #[serde(default)]
    pub vote_average: f64,
    /// Vote count.
    #[serde(default)]
    pub vote_count: u32,
    /// Budget in USD.
    #[serde(default)]
    pub budget: u64,
    /// Revenue in USD.
    #[serde(default)]
    pub revenue: u64,
    /// IMDb ID.
    #[serde(default)]
    pub imdb_id: Option<String>,
    /// Homepage URL.
    #[serde(default)]
    pub homepage: Option<String>,
    /// Adult flag.
    #[serde(default)]
    pub adult: bool,
    /// Video flag.
    #[serde(default)]
    pub video: bool,
    /// Poster image path.
    #[serde(default)]
    pub poster_path: Option<String>,
    /// Backdrop image path.
    #[serde(default)]
    pub backdrop_path: Option<String>,
    /// Sub-resources requested through `append_to_response`
    /// (e.g., `credits`, `videos`), kept as raw JSON.
    #[serde(flatten)]
    pub appended: serde_json::Map<String, serde_json::Value>,
}

/// Genre entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Genre {
    /// Genre ID.
    pub id: u32,
    /// Genre name.
    pub name: String,
}

/// Spoken language entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpokenLanguage {
    /// English name of the language.
    #[serde(default)]
    pub english_name: String,
    /// ISO 639-1 code.
    #[serde(default)]
    pub iso_639_1: String,
    /// Native name.
    #[serde(default)]
    pub name: String,
}

// --- Error Response ---

/// TMDB API error response body.
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbErrorResponse {
    /// TMDB error code.
    pub status_code: u32,
    /// Error message.
    pub status_message: String,
    /// Success flag (always false for errors).
    #[allow(dead_code)]
    #[serde(default)]
    pub success: bool,
}

// --- Request Parameters ---

/// Parameters for `movie/popular` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PopularMoviesParams {
    /// Result page (1-500, default: 1).
    pub page: u32,
    /// Response language (default: "en-US").
    pub language: String,
    /// Region filter (ISO 3166-1).
    pub region: Option<String>,
}

impl Default for PopularMoviesParams {
    fn default() -> Self {
        Self {
            page: 1,
            language: String::from(DEFAULT_LANGUAGE),
            region: None,
        }
    }
}

impl PopularMoviesParams {
    /// Creates params for the first page in the default language.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the result page.
    #[must_use]
    pub const fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Sets the response language.
    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Sets the region filter.
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// Parameters for `search/movie` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchMoviesParams {
    /// Search query.
    pub query: String,
    /// Result page (1-500, default: 1).
    pub page: u32,
    /// Response language (default: "en-US").
    pub language: String,
}

impl SearchMoviesParams {
    /// Creates new search params with the given query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            page: 1,
            language: String::from(DEFAULT_LANGUAGE),
        }
    }

    /// Sets the result page.
    #[must_use]
    pub const fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Sets the response language.
    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

/// Parameters for `movie/{movie_id}` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MovieDetailsParams {
    /// TMDB movie ID.
    pub id: u64,
    /// Response language (default: "en-US").
    pub language: String,
    /// Comma-separated sub-resources to append (e.g., "credits,videos").
    pub append_to_response: Option<String>,
}

impl MovieDetailsParams {
    /// Creates new details params for the given movie ID.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            language: String::from(DEFAULT_LANGUAGE),
            append_to_response: None,
        }
    }

    /// Sets the response language.
    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Sets the sub-resources to append.
    #[must_use]
    pub fn append_to_response(mut self, append: impl Into<String>) -> Self {
        self.append_to_response = Some(append.into());
        self
    }
}
