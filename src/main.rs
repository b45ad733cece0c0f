use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::Context, eyre::eyre};

use playlist_sync::{
    config::Config,
    logging::init_tracing,
    ports::{playlist::PlaylistClient, store::PairStore},
    services::{
        auth::StaticTokenProvider,
        runner::{RunSummary, run_all},
        spotify::SpotifyClient,
        store::JsonPairStore,
        youtube::YoutubeMusicClient,
    },
    sync::{
        SyncEngine, SyncOptions,
        executor::{ExecutionReport, SyncExecutor},
        rate_limit::SlidingWindowLimiter,
        scheduler::MatchScheduler,
        types::{PlaylistRef, Service},
    },
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "PLAYLIST_SYNC_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "info" or "playlist_sync=debug"
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: String,

    /// OTLP gRPC endpoint to export traces to
    #[arg(long, env = "OTLP_ENDPOINT", global = true)]
    otlp_endpoint: Option<String>,

    /// Spotify Web API access token
    #[arg(long, env = "SPOTIFY_ACCESS_TOKEN", hide_env_values = true, global = true)]
    spotify_token: Option<String>,

    /// YouTube Data API access token
    #[arg(long, env = "YOUTUBE_ACCESS_TOKEN", hide_env_values = true, global = true)]
    youtube_token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sync every configured playlist pair
    Sync {
        /// Sync even when track counts are unchanged
        #[arg(short, long)]
        force: bool,

        /// Show what would be added without writing anything
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Log every missing and matched track
        #[arg(short, long)]
        verbose: bool,

        /// Only sync the pair with this id
        #[arg(short, long)]
        pair: Option<u32>,
    },
    /// Show the last sync state of every pair
    Status,
    #[command(subcommand)]
    Pairs(PairCommands),
    #[command(subcommand)]
    Errors(ErrorCommands),
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum PairCommands {
    /// List playlist pairs
    List,
    /// Pair a Spotify playlist with a YouTube Music playlist
    Add {
        #[arg(long)]
        spotify_id: String,
        #[arg(long)]
        spotify_name: String,
        #[arg(long)]
        youtube_id: String,
        #[arg(long)]
        youtube_name: String,
    },
    /// Remove a playlist pair
    Remove { id: u32 },
    /// Forget sync snapshots so every pair is synced on the next run
    Reset {
        /// Remove every pair and clear the error log instead
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ErrorCommands {
    /// Show the most recent error log entries
    List {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Clear the error log
    Clear,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let tracer_provider = init_tracing(
        "playlist-sync",
        args.otlp_endpoint.as_deref(),
        &args.log_level,
    )?;

    let result = run(args).await;

    if let Some(provider) = tracer_provider {
        if let Err(error) = provider.shutdown() {
            eprintln!("Failed to flush traces: {:?}", error);
        }
    }

    result
}

async fn run(args: Args) -> Result<()> {
    match args.command {
        Commands::Config(command) => config_command(command, args.config.as_deref())?,
        Commands::Sync {
            force,
            dry_run,
            verbose,
            pair,
        } => {
            let config = load_config(args.config.as_deref())?;
            let store = open_store(&config);
            let engine = build_engine(&config, args.spotify_token, args.youtube_token);
            let options = SyncOptions {
                verbose,
                force,
                dry_run,
            };
            let summary = run_all(&engine, &store, &options, pair).await?;
            print_summary(&summary);

            if !summary.all_succeeded() {
                return Err(eyre!("{} playlist pair(s) failed to sync", summary.failed_count()));
            }
        }
        Commands::Status => {
            let config = load_config(args.config.as_deref())?;
            print_status(&open_store(&config)).await?;
        }
        Commands::Pairs(command) => {
            let config = load_config(args.config.as_deref())?;
            let store = open_store(&config);
            match command {
                PairCommands::List => print_status(&store).await?,
                PairCommands::Add {
                    spotify_id,
                    spotify_name,
                    youtube_id,
                    youtube_name,
                } => {
                    let pair = store
                        .add_pair(
                            PlaylistRef {
                                id: spotify_id,
                                name: spotify_name,
                            },
                            PlaylistRef {
                                id: youtube_id,
                                name: youtube_name,
                            },
                        )
                        .await?;
                    println!(
                        "Added pair {}: {} <-> {}",
                        pair.id, pair.playlist_a.name, pair.playlist_b.name
                    );
                }
                PairCommands::Remove { id } => {
                    if !store.remove_pair(id).await? {
                        return Err(eyre!("Playlist pair {} not found", id));
                    }
                    println!("Removed pair {}", id);
                }
                PairCommands::Reset { all: false } => {
                    let cleared = store.clear_snapshots().await?;
                    println!("Cleared snapshots for {} pair(s)", cleared);
                }
                PairCommands::Reset { all: true } => {
                    store.reset_all().await?;
                    println!("Removed all playlist pairs and cleared the error log");
                }
            }
        }
        Commands::Errors(command) => {
            let config = load_config(args.config.as_deref())?;
            let store = open_store(&config);
            match command {
                ErrorCommands::List { limit } => {
                    let entries = store.recent_errors(limit).await?;
                    if entries.is_empty() {
                        println!("No errors recorded");
                    }
                    for entry in entries {
                        println!(
                            "{} [{}] {}",
                            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                            entry.kind,
                            entry.message
                        );
                    }
                }
                ErrorCommands::Clear => {
                    store.clear_errors().await?;
                    println!("Error log cleared");
                }
            }
        }
    }

    Ok(())
}

fn config_command(command: ConfigCommands, path: Option<&Path>) -> Result<()> {
    match command {
        ConfigCommands::CreateDefault => {
            tracing::debug!("Creating default config");
            let path = Config::create_default(path)?;
            println!("{}", path.display());
        }
        ConfigCommands::Path => match path.map(Path::to_path_buf).or_else(Config::config_path) {
            Some(path) => println!("{}", path.display()),
            None => println!("No default config path found"),
        },
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    tracing::debug!("Loading configuration");
    match path {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    }
    .wrap_err("Failed to load playlist-sync config (try `playlist-sync config create-default`)")
}

fn open_store(config: &Config) -> JsonPairStore {
    let store = JsonPairStore::new(config.store_directory_path());
    tracing::debug!(directory = %store.directory().display(), "Using pair store");
    store
}

fn build_engine(
    config: &Config,
    spotify_token: Option<String>,
    youtube_token: Option<String>,
) -> SyncEngine {
    let tokens = StaticTokenProvider::new()
        .with_token(Service::Spotify, spotify_token)
        .with_token(Service::YoutubeMusic, youtube_token);
    for service in [Service::Spotify, Service::YoutubeMusic] {
        if !tokens.has_token(service) {
            tracing::warn!(%service, "No access token configured");
        }
    }
    let tokens = Arc::new(tokens);

    let spotify: Arc<dyn PlaylistClient> = Arc::new(SpotifyClient::new(
        tokens.clone(),
        config.spotify.max_batch_size,
    ));
    let youtube: Arc<dyn PlaylistClient> = Arc::new(YoutubeMusicClient::new(
        tokens,
        config.youtube_music.max_batch_size,
    ));

    let scheduler = MatchScheduler::new(config.scheduler_config())
        .with_limiter(
            Service::Spotify,
            SlidingWindowLimiter::per_second(config.spotify.requests_per_second),
        )
        .with_limiter(
            Service::YoutubeMusic,
            SlidingWindowLimiter::per_second(config.youtube_music.requests_per_second),
        );

    SyncEngine::new(
        spotify,
        youtube,
        scheduler,
        SyncExecutor::new(config.matching.preview_size),
    )
}

fn print_summary(summary: &RunSummary) {
    if summary.pairs.is_empty() {
        println!("No playlist pairs configured. Add one with `playlist-sync pairs add`.");
        return;
    }

    for pair in &summary.pairs {
        println!("[{}] {}", pair.pair_id, pair.name);
        match &pair.result {
            Ok(report) => print_report(report),
            Err(error) => println!("  failed: {}", error),
        }
    }
}

fn print_report(report: &ExecutionReport) {
    if report.skipped {
        println!("  unchanged since last sync, skipped");
        return;
    }

    if report.dry_run {
        println!(
            "  would add {} to Spotify, {} to YouTube Music",
            report.planned_a, report.planned_b
        );
        for (label, preview, total) in [
            ("Spotify", &report.preview_a, report.planned_a),
            ("YouTube Music", &report.preview_b, report.planned_b),
        ] {
            for add in preview {
                println!(
                    "    + {} -> {} ({:.0}%)",
                    add.source,
                    label,
                    add.score.clamp(0.0, 1.0) * 100.0
                );
            }
            if total > preview.len() {
                println!("    ... and {} more for {}", total - preview.len(), label);
            }
        }
    } else {
        println!(
            "  added {} to Spotify, {} to YouTube Music ({} already present)",
            report.added_count_a, report.added_count_b, report.skipped_existing
        );
    }

    if !report.unmatched.is_empty() {
        println!("  {} unmatched:", report.unmatched.len());
        for track in &report.unmatched {
            println!("    - {} ({})", track, track.service);
        }
    }
    if !report.suggestions.is_empty() {
        println!("  possible matches to check by hand:");
        for suggestion in &report.suggestions {
            println!(
                "    ? {} -> {} - {} [{}] ({:.0}%)",
                suggestion.source,
                suggestion.candidate.title,
                suggestion.candidate.artist,
                suggestion.candidate.service_id,
                suggestion.confidence * 100.0
            );
        }
    }
    for error in &report.errors {
        println!("  error: {}", error);
    }
    println!("  status: {}", report.status);
}

async fn print_status(store: &JsonPairStore) -> Result<()> {
    let pairs = store.load_pairs().await?;
    if pairs.is_empty() {
        println!("No playlist pairs configured");
        return Ok(());
    }

    for pair in pairs {
        println!(
            "[{}] {} ({}) <-> {} ({})",
            pair.id, pair.playlist_a.name, pair.playlist_a.id, pair.playlist_b.name, pair.playlist_b.id
        );
        match (&pair.last_sync_at, &pair.last_sync_status) {
            (Some(at), Some(status)) => {
                println!("  last sync: {} ({})", at.format("%Y-%m-%d %H:%M:%S"), status)
            }
            _ => println!("  never synced"),
        }
        if let Some(snapshot) = &pair.snapshot {
            println!(
                "  tracks: {} on Spotify, {} on YouTube Music",
                snapshot.count_a, snapshot.count_b
            );
        }
    }

    let recent = store.recent_errors(5).await?;
    if !recent.is_empty() {
        println!("{} recent errors, see `playlist-sync errors list`", recent.len());
    }
    Ok(())
}
