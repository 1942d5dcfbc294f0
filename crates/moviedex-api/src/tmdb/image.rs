//! TMDB image URL construction.

/// Base URL of the TMDB image CDN.
pub const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p";

/// Returned when a movie has no poster.
pub const PLACEHOLDER_POSTER: &str = "/placeholder-poster.png";

/// Poster widths served by the image CDN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosterSize {
    /// 92px wide.
    W92,
    /// 154px wide.
    W154,
    /// 185px wide (list thumbnails).
    W185,
    /// 342px wide.
    W342,
    /// 500px wide (detail screens).
    W500,
    /// 780px wide.
    W780,
    /// Original upload.
    Original,
}

impl PosterSize {
    /// Path segment used by the CDN.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::W92 => "w92",
            Self::W154 => "w154",
            Self::W185 => "w185",
            Self::W342 => "w342",
            Self::W500 => "w500",
            Self::W780 => "w780",
            Self::Original => "original",
        }
    }
}

/// Builds the full poster URL, or [`PLACEHOLDER_POSTER`] when the path is
/// missing or empty.
#[must_use]
pub fn poster_url(poster_path: Option<&str>, size: PosterSize) -> String {
    match poster_path {
        Some(path) if !path.is_empty() => format!("{IMAGE_BASE_URL}/{}{path}", size.as_str()),
        _ => String::from(PLACEHOLDER_POSTER),
    }
}
