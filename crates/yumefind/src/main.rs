//! YumeFind - browse and search the Jikan anime catalog from the terminal
//!
//! Drives the same store a graphical front end would: commands go in through
//! a `StoreHandle`, and the resulting snapshot is printed once the relevant
//! slice has finished loading.

use anyhow::{Context, Result};
use clap::Parser;
use jikan_client::api::Anime;
use jikan_client::{
    AiringStatus, AnimeType, ContentRating, Filter, FilterPatch, JikanClient, OrderBy,
    SortDirection,
};
use shared::config::Config;
use shared::logging::{self, LogConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, Level};
use yumefind::search::SearchStatus;
use yumefind::view::{render_page_strip, summary_line};
use yumefind::{AppState, Store, StoreHandle, StoreSettings};

/// YumeFind CLI arguments
#[derive(Parser, Debug)]
#[command(name = "yumefind")]
#[command(about = "Search and browse anime from the Jikan catalog")]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Search text (empty browses the catalog)
    #[arg(short, long, default_value = "")]
    query: String,

    /// Result page to show
    #[arg(short, long, default_value = "1")]
    page: u32,

    /// Format: tv, movie, ova, ona, special, music
    #[arg(long = "type")]
    anime_type: Option<AnimeType>,

    /// Airing status: airing, complete, upcoming
    #[arg(long)]
    status: Option<AiringStatus>,

    /// Audience rating: g, pg, pg13, r17, r, rx
    #[arg(long)]
    rating: Option<ContentRating>,

    /// Genre ids to include, comma separated
    #[arg(long, value_delimiter = ',')]
    genres: Vec<u32>,

    /// Genre ids to exclude, comma separated
    #[arg(long, value_delimiter = ',')]
    exclude_genres: Vec<u32>,

    #[arg(long)]
    min_score: Option<f64>,

    #[arg(long)]
    max_score: Option<f64>,

    /// Release year
    #[arg(long)]
    year: Option<i32>,

    #[arg(long)]
    order_by: Option<OrderBy>,

    #[arg(long)]
    sort: Option<SortDirection>,

    /// Include adult entries
    #[arg(long)]
    no_sfw: bool,

    /// Show full details for one MAL ID instead of searching
    #[arg(long)]
    detail: Option<u32>,

    /// Show the top-ranked carousel
    #[arg(long)]
    top: bool,
}

impl Args {
    fn filter_patch(&self) -> FilterPatch {
        FilterPatch {
            anime_type: self.anime_type.map(Some),
            status: self.status.map(Some),
            rating: self.rating.map(Some),
            sfw: self.no_sfw.then_some(false),
            genres: (!self.genres.is_empty()).then(|| self.genres.clone()),
            genres_exclude: (!self.exclude_genres.is_empty()).then(|| self.exclude_genres.clone()),
            min_score: self.min_score.map(Some),
            max_score: self.max_score.map(Some),
            year: self.year.map(Some),
            order_by: self.order_by.map(Some),
            sort: self.sort.map(Some),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load_or_default(&args.config);

    let mut log_config = LogConfig::from_settings(&config.logging, "yumefind");
    if args.verbose {
        log_config.default_level = Level::DEBUG;
    }
    logging::init(log_config)?;

    info!(base_url = %config.api.base_url, "Starting YumeFind");

    let client = JikanClient::new(
        &config.api.base_url,
        config.api.page_size,
        Duration::from_secs(config.api.timeout_seconds),
        &config.api.user_agent,
    )
    .context("Failed to create Jikan client")?;

    let handle = Store::spawn(Arc::new(client), StoreSettings::from(&config));

    let outcome = if let Some(mal_id) = args.detail {
        show_detail(&handle, mal_id).await
    } else if args.top {
        show_top(&handle).await
    } else {
        show_search(&handle, &args).await
    };

    handle.shutdown().ok();
    outcome
}

async fn show_search(handle: &StoreHandle, args: &Args) -> Result<()> {
    let patch = args.filter_patch();
    let expected = Filter::default().merged(patch.clone());

    handle.set_query_text(args.query.as_str())?;
    if !patch.is_empty() {
        handle.set_filters(patch)?;
    }

    let mut state = wait_for_results(handle, &args.query, &expected, 1).await?;

    if args.page > 1 && state.search.status() == SearchStatus::Loaded {
        match state.search.last_page() {
            Some(last) if args.page <= last => {
                handle.set_page(args.page)?;
                state = wait_for_results(handle, &args.query, &expected, args.page).await?;
            }
            last => {
                println!(
                    "Page {} is out of range (last page: {})",
                    args.page,
                    last.unwrap_or(1)
                );
            }
        }
    }

    print_search(&state);
    Ok(())
}

/// Wait until the search slice reflects the given inputs and has settled
async fn wait_for_results(
    handle: &StoreHandle,
    query: &str,
    filter: &Filter,
    page: u32,
) -> Result<AppState> {
    let state = handle
        .wait_until(|s| {
            let search = &s.search;
            search.query() == query
                && search.filter() == filter
                && search.page() == page
                && !search.debounce_pending()
                && !search.is_loading()
                && matches!(search.status(), SearchStatus::Loaded | SearchStatus::Failed)
        })
        .await?;
    debug!(page = page, "Search settled");
    Ok(state)
}

fn print_search(state: &AppState) {
    let search = &state.search;

    if let Some(error) = search.error() {
        println!("Error: {error}");
        return;
    }

    let refinements = search.filter().active_count();
    if search.query().is_empty() {
        println!("Browsing catalog ({refinements} filters active)");
    } else {
        println!("Results for \"{}\" ({refinements} filters active)", search.query());
    }

    if search.results().is_empty() {
        println!("No results.");
        return;
    }

    for anime in search.results() {
        println!("{}", summary_line(anime));
    }

    if let Some(last) = search.last_page() {
        println!();
        println!("Pages: {}", render_page_strip(search.page(), last));
    }
}

async fn show_detail(handle: &StoreHandle, mal_id: u32) -> Result<()> {
    handle.request_detail(mal_id)?;
    let state = handle
        .wait_until(|s| s.detail.requested() == Some(mal_id) && !s.detail.is_loading())
        .await?;

    match (state.detail.anime(), state.detail.error()) {
        (Some(anime), _) => print_detail(anime),
        (None, Some(error)) => println!("Error: {error}"),
        (None, None) => println!("Nothing to show for {mal_id}"),
    }
    Ok(())
}

fn print_detail(anime: &Anime) {
    println!("{}", anime.display_title());
    if anime.display_title() != anime.title {
        println!("  Original title: {}", anime.title);
    }
    if let Some(japanese) = &anime.title_japanese {
        println!("  Japanese: {japanese}");
    }

    let facts = [
        ("Type", anime.anime_type.clone()),
        ("Episodes", anime.episodes.map(|e| e.to_string())),
        ("Status", anime.status.clone()),
        ("Score", anime.score.map(|s| format!("{s:.2}"))),
        ("Rank", anime.rank.map(|r| format!("#{r}"))),
        ("Rating", anime.rating.clone()),
        ("Year", anime.year.map(|y| y.to_string())),
    ];
    for (label, value) in facts {
        if let Some(value) = value {
            println!("  {label}: {value}");
        }
    }

    let genres = anime.genre_names();
    if !genres.is_empty() {
        println!("  Genres: {}", genres.join(", "));
    }
    let studios: Vec<_> = anime.studios.iter().map(|s| s.name.as_str()).collect();
    if !studios.is_empty() {
        println!("  Studios: {}", studios.join(", "));
    }
    if let Some(poster) = anime.poster_url() {
        println!("  Poster: {poster}");
    }
    if let Some(synopsis) = &anime.synopsis {
        println!();
        println!("{synopsis}");
    }
}

async fn show_top(handle: &StoreHandle) -> Result<()> {
    let state = handle
        .wait_until(|s| {
            !s.carousel.is_loading() && (!s.carousel.items().is_empty() || s.carousel.error().is_some())
        })
        .await?;

    let carousel = &state.carousel;
    if let Some(error) = carousel.error() {
        println!("Error: {error}");
        return Ok(());
    }

    println!("Top anime by popularity");
    for (i, anime) in carousel.items().iter().enumerate() {
        let marker = if i == carousel.current_index() { ">" } else { " " };
        println!("{marker} {}", summary_line(anime));
    }
    Ok(())
}
