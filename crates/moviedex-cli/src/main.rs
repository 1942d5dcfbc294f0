//! moviedex - movie discovery CLI backed by a query cache.

/// Application configuration (TOML).
mod config;
/// Text rendering of query states.
mod render;
/// Interactive browse session.
mod session;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use moviedex_api::tmdb::{
    MovieDetailsParams, PopularMoviesParams, SearchMoviesParams, TmdbClient,
};
use moviedex_query::{MovieQueries, QueryCache};
use tracing::instrument;
use tracing_subscriber::filter::EnvFilter;
#[cfg(not(feature = "otel"))]
use tracing_subscriber::fmt;
#[cfg(feature = "otel")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "otel")]
use tracing_subscriber::util::SubscriberInitExt;
use url::Url;

use crate::config::{AppConfig, TmdbSection, resolve_config_path};
use crate::render::{details_lines, listing_lines};
use crate::session::{Session, SessionDefaults};

/// CLI argument parser.
#[derive(Parser)]
#[command(about, version)]
struct Cli {
    /// Override config directory.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// List popular movies.
    Popular(PopularArgs),
    /// List top-rated movies.
    TopRated,
    /// Search movies by title.
    Search(SearchArgs),
    /// Show details of one movie.
    Details(DetailsArgs),
    /// Browse interactively over one shared cache.
    Browse,
}

/// Arguments for the `popular` subcommand.
#[derive(clap::Args)]
struct PopularArgs {
    /// Page number, starting at 1.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    page: u32,
    /// Response language (default: config or "en-US").
    #[arg(long)]
    language: Option<String>,
    /// ISO 3166-1 region filter (e.g. "JP").
    #[arg(long)]
    region: Option<String>,
}

/// Arguments for the `search` subcommand.
#[derive(clap::Args)]
struct SearchArgs {
    /// Search text (e.g. "batman").
    #[arg(long, required = true)]
    query: String,
    /// Page number, starting at 1.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    page: u32,
    /// Response language (default: config or "en-US").
    #[arg(long)]
    language: Option<String>,
}

/// Arguments for the `details` subcommand.
#[derive(clap::Args)]
struct DetailsArgs {
    /// TMDB movie ID.
    #[arg(long, required = true, value_parser = clap::value_parser!(u64).range(1..))]
    id: u64,
    /// Response language (default: config or "en-US").
    #[arg(long)]
    language: Option<String>,
    /// Extra responses to append (e.g. "credits,videos").
    #[arg(long)]
    append: Option<String>,
}

/// Loaded configuration plus the query set built from it.
struct App {
    config: AppConfig,
    queries: MovieQueries<TmdbClient>,
}

/// Builds a `TmdbClient` from the `TMDB_API_TOKEN` environment variable
/// and the `[tmdb]` config section.
///
/// # Errors
///
/// Returns an error if `TMDB_API_TOKEN` is not set, the base URL is
/// invalid, or the client fails to build.
#[instrument(skip_all)]
fn build_tmdb_client(section: &TmdbSection) -> Result<TmdbClient> {
    let api_token = std::env::var("TMDB_API_TOKEN")
        .context("TMDB_API_TOKEN environment variable is required")?;

    let mut builder = TmdbClient::builder().api_token(api_token).user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
    ));
    if let Some(base_url) = &section.base_url {
        let url = Url::parse(base_url).with_context(|| format!("invalid tmdb.base_url: {base_url}"))?;
        builder = builder.base_url(url);
    }
    if let Some(secs) = section.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build().context("failed to build TMDB client")
}

/// Loads config and builds the cache and client.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded or the client cannot be built.
#[instrument(skip_all)]
fn build_app(dir: Option<&Path>) -> Result<App> {
    let config_path = resolve_config_path(dir).context("failed to resolve config path")?;
    let config = AppConfig::load(&config_path).context("failed to load config")?;
    let client = build_tmdb_client(&config.tmdb)?;
    let cache = QueryCache::new(config.cache.to_cache_config());
    tracing::debug!(config = %config_path.display(), "configuration loaded");
    Ok(App {
        queries: MovieQueries::new(cache, Arc::new(client)),
        config,
    })
}

/// Runs the `popular` subcommand.
///
/// # Errors
///
/// Returns an error if the listing fails to load.
#[instrument(skip_all)]
async fn run_popular(app: &App, args: PopularArgs) -> Result<()> {
    let mut params = PopularMoviesParams::new()
        .page(args.page)
        .language(app.config.tmdb.language_or_default(args.language));
    if let Some(region) = args.region.or_else(|| app.config.tmdb.region.clone()) {
        params = params.region(region);
    }

    let mut observer = app.queries.popular(params);
    let state = observer.settled().await;
    for line in listing_lines("Popular Movies", &state, "No popular movies available right now.") {
        tracing::info!("{line}");
    }
    if let Some(error) = state.error {
        bail!("failed to load popular movies: {error}");
    }
    Ok(())
}

/// Runs the `top-rated` subcommand.
///
/// # Errors
///
/// Returns an error if the listing fails to load.
#[instrument(skip_all)]
async fn run_top_rated(app: &App) -> Result<()> {
    let mut observer = app.queries.top_rated();
    let state = observer.settled().await;
    for line in listing_lines("Top Rated Movies", &state, "No top-rated movies available right now.") {
        tracing::info!("{line}");
    }
    if let Some(error) = state.error {
        bail!("failed to load top-rated movies: {error}");
    }
    Ok(())
}

/// Runs the `search` subcommand.
///
/// # Errors
///
/// Returns an error if the search fails.
#[instrument(skip_all)]
async fn run_search(app: &App, args: SearchArgs) -> Result<()> {
    let params = SearchMoviesParams::new(args.query.as_str())
        .page(args.page)
        .language(app.config.tmdb.language_or_default(args.language));

    let mut observer = app.queries.search(params);
    let state = observer.settled().await;
    let heading = format!("Search Results for \"{}\"", args.query);
    let empty = format!("No results found for \"{}\"", args.query);
    for line in listing_lines(&heading, &state, &empty) {
        tracing::info!("{line}");
    }
    if let Some(error) = state.error {
        bail!("search failed: {error}");
    }
    Ok(())
}

/// Runs the `details` subcommand.
///
/// # Errors
///
/// Returns an error if the movie fails to load.
#[instrument(skip_all)]
async fn run_details(app: &App, args: DetailsArgs) -> Result<()> {
    let mut params = MovieDetailsParams::new(args.id)
        .language(app.config.tmdb.language_or_default(args.language));
    if let Some(append) = args.append {
        params = params.append_to_response(append);
    }

    let mut observer = app.queries.movie_details(params);
    let state = observer.settled().await;
    for line in details_lines(&state) {
        tracing::info!("{line}");
    }
    if let Some(error) = state.error {
        bail!("failed to load movie {}: {error}", args.id);
    }
    Ok(())
}

/// Runs the `browse` subcommand on standard input.
///
/// # Errors
///
/// Returns an error if reading standard input fails.
#[instrument(skip_all)]
async fn run_browse(app: App) -> Result<()> {
    let defaults = SessionDefaults {
        language: app.config.tmdb.language_or_default(None),
        region: app.config.tmdb.region.clone(),
    };
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    Session::new(app.queries, defaults).run(stdin).await
}

/// Entry point.
///
/// # Errors
///
/// Returns an error if subcommand execution fails.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    #[cfg(not(feature = "otel"))]
    {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_target(false)
            .init();
    }

    #[cfg(feature = "otel")]
    {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

        let otel_layer = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .and_then(|_| {
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_http()
                    .build()
                    .ok()?;

                let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
                    .with_simple_exporter(exporter)
                    .build();

                let tracer = opentelemetry::trace::TracerProvider::tracer(
                    &tracer_provider,
                    env!("CARGO_PKG_NAME"),
                );
                opentelemetry::global::set_tracer_provider(tracer_provider);

                Some(tracing_opentelemetry::layer().with_tracer(tracer))
            });

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .init();
    }

    let cli = Cli::parse();
    let app = build_app(cli.dir.as_deref())?;
    match cli.command {
        Commands::Popular(args) => run_popular(&app, args).await,
        Commands::TopRated => run_top_rated(&app).await,
        Commands::Search(args) => run_search(&app, args).await,
        Commands::Details(args) => run_details(&app, args).await,
        Commands::Browse => run_browse(app).await,
    }
}
