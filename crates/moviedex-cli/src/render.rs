//! Text rendering of listing and detail states.
//!
//! Functions here return lines; callers emit them through `tracing`.

use chrono::NaiveDate;
use moviedex_api::tmdb::{Movie, MovieDetails, MoviePage, PosterSize, poster_url};
use moviedex_query::{QueryState, QueryStatus};

/// Scale the star rating is drawn on.
const STAR_COUNT: u8 = 5;

/// Formats a runtime in minutes as `"2h 15m"`.
pub fn format_runtime(minutes: Option<u32>) -> String {
    match minutes {
        None | Some(0) => String::from("Unknown"),
        Some(minutes) => format!("{}h {}m", minutes / 60, minutes % 60),
    }
}

/// Returns the English name of the first spoken language.
pub fn primary_language(details: &MovieDetails) -> &str {
    details
        .spoken_languages
        .first()
        .map_or("Unknown", |language| language.english_name.as_str())
}

/// Formats an ISO date (`2023-01-01`) as `"January 1, 2023"`.
///
/// Dates that do not parse are returned unchanged.
pub fn format_release_date(date: Option<&str>) -> String {
    match date.filter(|d| !d.is_empty()) {
        None => String::from("Unknown release date"),
        Some(date) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_or_else(|_| String::from(date), |d| d.format("%B %-d, %Y").to_string()),
    }
}

/// Draws `value` (out of `max_value`) as five stars with half-star
/// rounding, followed by the numeric score.
pub fn rating_stars(value: f64, max_value: f64) -> String {
    let normalized = if max_value > 0.0 {
        (value * f64::from(STAR_COUNT) / max_value).clamp(0.0, f64::from(STAR_COUNT))
    } else {
        0.0
    };
    let stars: String = (0..STAR_COUNT)
        .map(f64::from)
        .map(|slot| {
            if normalized >= slot + 1.0 {
                '★'
            } else if normalized - slot >= 0.5 {
                '½'
            } else {
                '☆'
            }
        })
        .collect();
    format!("{stars} {value:.1}/{max_value}")
}

fn release_year(movie: &Movie) -> &str {
    movie
        .release_date
        .as_deref()
        .and_then(|date| date.get(..4))
        .unwrap_or("----")
}

/// Renders a listing.
///
/// `empty_message` is shown for a successful page without results.
pub fn listing_lines(heading: &str, state: &QueryState<MoviePage>, empty_message: &str) -> Vec<String> {
    let page = match (&state.data, state.status) {
        (Some(page), _) => page,
        (None, QueryStatus::Idle) => return vec![String::from("Nothing to show yet.")],
        (None, QueryStatus::Loading | QueryStatus::Success) => {
            return vec![String::from("Loading movies...")];
        }
        (None, QueryStatus::Error) => return error_lines("Error loading movies. Please try again.", state),
    };

    let mut lines = vec![format!(
        "{heading} (page {} of {}, {} results)",
        page.page, page.total_pages, page.total_results
    )];
    if state.is_placeholder_data {
        lines.push(String::from("Loading more... (showing previous results)"));
    } else if state.is_error() {
        lines.extend(error_lines("Error loading movies. Please try again.", state));
    }
    if page.results.is_empty() {
        lines.push(String::from(empty_message));
        return lines;
    }
    lines.push(String::from("ID\tYear\tRating\t\tTitle"));
    lines.extend(page.results.iter().map(|movie| {
        format!(
            "{}\t{}\t{}\t{}",
            movie.id,
            release_year(movie),
            rating_stars(movie.vote_average, 10.0),
            movie.title
        )
    }));
    lines
}

/// Renders a movie details screen.
pub fn details_lines(state: &QueryState<MovieDetails>) -> Vec<String> {
    let Some(movie) = &state.data else {
        return match state.status {
            QueryStatus::Idle => vec![String::from("No movie selected.")],
            QueryStatus::Loading | QueryStatus::Success => {
                vec![String::from("Loading movie details...")]
            }
            QueryStatus::Error => error_lines("Error loading movie details. Please try again.", state),
        };
    };

    let genres = movie
        .genres
        .iter()
        .map(|genre| genre.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let mut lines = vec![
        movie.title.clone(),
        format_release_date(movie.release_date.as_deref()),
        format!("Genres: {}", if genres.is_empty() { "-" } else { &genres }),
        format!(
            "{}  |  {}  |  {}",
            rating_stars(movie.vote_average, 10.0),
            format_runtime(movie.runtime),
            primary_language(movie)
        ),
    ];
    if let Some(tagline) = movie.tagline.as_deref().filter(|t| !t.is_empty()) {
        lines.push(format!("\"{tagline}\""));
    }
    lines.push(String::from("Overview:"));
    lines.push(
        movie
            .overview
            .clone()
            .filter(|o| !o.is_empty())
            .unwrap_or_else(|| String::from("No overview available.")),
    );
    lines.push(format!(
        "Poster: {}",
        poster_url(movie.poster_path.as_deref(), PosterSize::W500)
    ));
    lines
}

fn error_lines<T>(headline: &str, state: &QueryState<T>) -> Vec<String> {
    let mut lines = vec![String::from(headline)];
    if let Some(error) = &state.error {
        lines.push(format!("  ({error})"));
    }
    lines
}
