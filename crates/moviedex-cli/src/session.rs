//! Interactive `browse` session.
//!
//! One long-lived cache serves every command, so switching back to a
//! listing seen recently is answered from cache, paging keeps the
//! previous page on screen until the next one arrives, and
//! `invalidate` forces observed listings to refresh.

use anyhow::{Context, Result, bail};
use moviedex_api::tmdb::{
    MovieDetailsParams, MoviePage, PopularMoviesParams, SearchMoviesParams, TmdbApi,
};
use moviedex_query::{
    BoundQuery, MovieDetails, MovieQueries, PopularMovies, QueryKey, QueryObserver, QueryState,
    SearchMovies, TopRatedMovies,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::render::{details_lines, listing_lines};

/// Help text listing the session commands.
const HELP: &[&str] = &[
    "Commands:",
    "  popular [page]           popular movies",
    "  top                      top-rated movies",
    "  search <text>            search movies by title",
    "  page <n>                 go to page n of the current listing",
    "  details <id>             show one movie",
    "  invalidate <KEY_PREFIX>  refresh cached queries, e.g. POPULAR_MOVIES",
    "  stats                    show cache statistics",
    "  help                     show this help",
    "  quit                     leave the session",
];

/// One parsed session command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Show popular movies, optionally at a page.
    Popular(Option<u32>),
    /// Show top-rated movies.
    TopRated,
    /// Search movies.
    Search(String),
    /// Change page of the current listing.
    Page(u32),
    /// Show one movie.
    Details(u64),
    /// Invalidate cached queries under a key prefix.
    Invalidate(QueryKey),
    /// Show cache statistics.
    Stats,
    /// Show help.
    Help,
    /// Leave the session.
    Quit,
}

/// Parses one input line. Blank lines yield `None`.
///
/// # Errors
///
/// Returns an error for unknown commands and malformed arguments.
pub fn parse_command(line: &str) -> Result<Option<SessionCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (name, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(name, rest)| (name, rest.trim()));

    let command = match name.to_ascii_lowercase().as_str() {
        "popular" if rest.is_empty() => SessionCommand::Popular(None),
        "popular" => SessionCommand::Popular(Some(parse_page(rest)?)),
        "top" | "top-rated" => SessionCommand::TopRated,
        "search" => SessionCommand::Search(String::from(rest)),
        "page" => SessionCommand::Page(parse_page(rest)?),
        "details" => SessionCommand::Details(
            rest.parse()
                .with_context(|| format!("invalid movie id: {rest:?}"))?,
        ),
        "invalidate" if rest.is_empty() => bail!("invalidate needs a key prefix"),
        "invalidate" => SessionCommand::Invalidate(rest.parse()?),
        "stats" => SessionCommand::Stats,
        "help" | "?" => SessionCommand::Help,
        "quit" | "exit" | "q" => SessionCommand::Quit,
        other => bail!("unknown command: {other} (try `help`)"),
    };
    Ok(Some(command))
}

fn parse_page(text: &str) -> Result<u32> {
    let page: u32 = text
        .parse()
        .with_context(|| format!("invalid page number: {text:?}"))?;
    if page == 0 {
        bail!("page numbers start at 1");
    }
    Ok(page)
}

/// Which listing the session currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    /// Popular movies at a page.
    Popular(u32),
    /// Top-rated movies.
    TopRated,
    /// Search results for a term at a page.
    Search(String, u32),
}

impl Listing {
    /// Returns the same listing at another page, if it is paged.
    pub fn at_page(&self, page: u32) -> Option<Self> {
        match self {
            Self::Popular(_) => Some(Self::Popular(page)),
            Self::TopRated => None,
            Self::Search(query, _) => Some(Self::Search(query.clone(), page)),
        }
    }

    fn heading(&self) -> String {
        match self {
            Self::Popular(_) => String::from("Popular Movies"),
            Self::TopRated => String::from("Top Rated Movies"),
            Self::Search(query, _) => format!("Search Results for \"{query}\""),
        }
    }

    fn empty_message(&self) -> String {
        match self {
            Self::Search(query, _) => format!("No results found for \"{query}\""),
            Self::Popular(_) => String::from("No popular movies available right now."),
            Self::TopRated => String::from("No top-rated movies available right now."),
        }
    }
}

/// Request defaults applied to every listing.
#[derive(Debug, Clone)]
pub struct SessionDefaults {
    /// Response language.
    pub language: String,
    /// Region for popular listings.
    pub region: Option<String>,
}

/// Interactive session state.
pub struct Session<A> {
    queries: MovieQueries<A>,
    defaults: SessionDefaults,
    listing: Listing,
    listing_observer: QueryObserver<MoviePage>,
}

impl<A> std::fmt::Debug for Session<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("listing", &self.listing)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl<A: TmdbApi + Sync + 'static> Session<A> {
    /// Starts a session showing popular movies, page 1.
    pub fn new(queries: MovieQueries<A>, defaults: SessionDefaults) -> Self {
        let listing = Listing::Popular(1);
        let listing_observer = QueryObserver::new(
            queries.cache(),
            bind_listing(&queries, &defaults, &listing),
        );
        Self {
            queries,
            defaults,
            listing,
            listing_observer,
        }
    }

    /// Reads commands from `input` until `quit` or end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from `input` fails.
    pub async fn run<R: AsyncBufRead + Unpin>(mut self, input: R) -> Result<()> {
        for line in HELP {
            tracing::info!("{line}");
        }
        self.show_listing().await;

        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await.context("failed to read input")? {
            let command = match parse_command(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!("{e:#}");
                    continue;
                }
            };
            if command == SessionCommand::Quit {
                break;
            }
            self.execute(command).await;

            let evicted = self.queries.cache().collect_garbage();
            if evicted > 0 {
                tracing::debug!(evicted, "collected unused cache entries");
            }
        }

        self.queries.cache().dispose_all();
        tracing::info!("Bye.");
        Ok(())
    }

    /// Runs one command and renders its result.
    pub async fn execute(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Popular(page) => {
                self.switch_listing(Listing::Popular(page.unwrap_or(1))).await;
            }
            SessionCommand::TopRated => self.switch_listing(Listing::TopRated).await,
            SessionCommand::Search(query) => {
                self.switch_listing(Listing::Search(query, 1)).await;
            }
            SessionCommand::Page(page) => match self.listing.at_page(page) {
                Some(listing) => self.switch_listing(listing).await,
                None => tracing::info!("The current listing has no pages."),
            },
            SessionCommand::Details(id) => self.show_details(id).await,
            SessionCommand::Invalidate(prefix) => {
                let matched = self.queries.invalidate(&prefix);
                tracing::info!("Invalidated {matched} cached queries under {prefix}");
                self.show_listing().await;
            }
            SessionCommand::Stats => {
                let stats = self.queries.cache().stats();
                tracing::info!(
                    "Cache: {} entries, {} observed, {} fetching",
                    stats.entries,
                    stats.subscribed,
                    stats.fetching
                );
            }
            SessionCommand::Help => {
                for line in HELP {
                    tracing::info!("{line}");
                }
            }
            SessionCommand::Quit => {}
        }
    }

    async fn switch_listing(&mut self, listing: Listing) {
        let query = bind_listing(&self.queries, &self.defaults, &listing);
        self.listing = listing;
        self.listing_observer.set_query(query);

        let pending = self.listing_observer.state();
        if pending.is_placeholder_data {
            self.render_listing(&pending);
        }
        self.show_listing().await;
    }

    async fn show_listing(&mut self) {
        let state = self.listing_observer.settled().await;
        self.render_listing(&state);
    }

    fn render_listing(&self, state: &QueryState<MoviePage>) {
        for line in listing_lines(
            &self.listing.heading(),
            state,
            &self.listing.empty_message(),
        ) {
            tracing::info!("{line}");
        }
    }

    async fn show_details(&self, id: u64) {
        let params = MovieDetailsParams::new(id).language(self.defaults.language.as_str());
        let mut observer = self.queries.observe(&MovieDetails::new(params));
        let state = observer.settled().await;
        for line in details_lines(&state) {
            tracing::info!("{line}");
        }
    }
}

/// Builds the query for a listing.
fn bind_listing<A: TmdbApi + Sync + 'static>(
    queries: &MovieQueries<A>,
    defaults: &SessionDefaults,
    listing: &Listing,
) -> BoundQuery<MoviePage> {
    let language = defaults.language.as_str();
    match listing {
        Listing::Popular(page) => {
            let mut params = PopularMoviesParams::new().page(*page).language(language);
            if let Some(region) = &defaults.region {
                params = params.region(region.as_str());
            }
            queries.bind(&PopularMovies::new(params))
        }
        Listing::TopRated => queries.bind(&TopRatedMovies),
        Listing::Search(query, page) => queries.bind(&SearchMovies::new(
            SearchMoviesParams::new(query.as_str())
                .page(*page)
                .language(language),
        )),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::Arc;

    use moviedex_api::tmdb::TmdbClient;
    use moviedex_query::{QueryCache, SEARCH_MOVIES};
    use url::Url;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn test_parse_blank_line() {
        // Arrange & Act & Assert
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_listing_commands() {
        // Arrange & Act & Assert
        assert_eq!(
            parse_command("popular").unwrap(),
            Some(SessionCommand::Popular(None))
        );
        assert_eq!(
            parse_command("popular 3").unwrap(),
            Some(SessionCommand::Popular(Some(3)))
        );
        assert_eq!(
            parse_command("TOP").unwrap(),
            Some(SessionCommand::TopRated)
        );
        assert_eq!(
            parse_command("page 2").unwrap(),
            Some(SessionCommand::Page(2))
        );
    }

    #[test]
    fn test_parse_search_keeps_text_verbatim() {
        // Arrange & Act
        let command = parse_command("search  The Dark Knight ").unwrap();

        // Assert
        assert_eq!(
            command,
            Some(SessionCommand::Search(String::from("The Dark Knight")))
        );
    }

    #[test]
    fn test_parse_search_without_text_is_an_empty_search() {
        // Arrange & Act
        let command = parse_command("search").unwrap();

        // Assert
        assert_eq!(command, Some(SessionCommand::Search(String::new())));
    }

    #[test]
    fn test_parse_details_and_invalidate() {
        // Arrange & Act & Assert
        assert_eq!(
            parse_command("details 550").unwrap(),
            Some(SessionCommand::Details(550))
        );
        assert_eq!(
            parse_command("invalidate SEARCH_MOVIES").unwrap(),
            Some(SessionCommand::Invalidate(QueryKey::new(SEARCH_MOVIES)))
        );
        assert_eq!(
            parse_command(r#"invalidate ["SEARCH_MOVIES","batman"]"#).unwrap(),
            Some(SessionCommand::Invalidate(
                QueryKey::new(SEARCH_MOVIES).with("batman")
            ))
        );
    }

    #[test]
    fn test_parse_errors() {
        // Arrange & Act & Assert
        assert!(parse_command("page 0").is_err());
        assert!(parse_command("page two").is_err());
        assert!(parse_command("details abc").is_err());
        assert!(parse_command("invalidate").is_err());
        assert!(parse_command("rewind").is_err());
    }

    #[test]
    fn test_parse_quit_aliases() {
        // Arrange & Act & Assert
        for alias in ["quit", "exit", "q"] {
            assert_eq!(parse_command(alias).unwrap(), Some(SessionCommand::Quit));
        }
    }

    #[test]
    fn test_listing_at_page() {
        // Arrange
        let search = Listing::Search(String::from("batman"), 1);

        // Act & Assert
        assert_eq!(
            search.at_page(2),
            Some(Listing::Search(String::from("batman"), 2))
        );
        assert_eq!(Listing::Popular(1).at_page(4), Some(Listing::Popular(4)));
        assert_eq!(Listing::TopRated.at_page(2), None);
    }

    #[tokio::test]
    async fn test_session_script_serves_revisited_page_from_cache() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3/movie/popular"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(include_str!(
                "../../../fixtures/tmdb/popular_movies.json"
            )))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/3/movie/popular"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(include_str!(
                "../../../fixtures/tmdb/popular_movies.json"
            )))
            .expect(1)
            .mount(&server)
            .await;
        let client = TmdbClient::builder()
            .api_token("test-token")
            .user_agent("moviedex-test")
            .base_url(Url::parse(&format!("{}/3/", server.uri())).unwrap())
            .build()
            .unwrap();
        let queries = MovieQueries::new(QueryCache::default(), Arc::new(client));
        let defaults = SessionDefaults {
            language: String::from("en-US"),
            region: None,
        };
        let script: &[u8] = b"page 2\nstats\nrewind\n\npopular\nquit\npopular 3\n";

        // Act
        let result = Session::new(queries.clone(), defaults).run(script).await;

        // Assert
        assert!(result.is_ok());
        assert_eq!(queries.cache().stats().entries, 0);
    }
}
