use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use marquee::config::{self, CollectionKind, IngestConfig, LibrarySpec};
use marquee::download::{ensure_dataset, Dataset, HttpTransport};
use marquee::fs_store::FsCatalogStore;
use marquee::models::EntityKind;
use marquee::progress::BarProgress;
use marquee::provision::TokioClock;
use marquee::IngestTask;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "marquee")]
#[command(about = "Ingest the public IMDb title datasets into a media catalog")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the datasets and write every title into the catalog
    Ingest(IngestArgs),
    /// Only make sure both datasets are in the cache directory
    Fetch(FetchArgs),
}

#[derive(Args)]
struct SourceArgs {
    /// Directory holding the downloaded datasets
    #[arg(long, default_value = config::DEFAULT_CACHE_DIR)]
    cache_dir: PathBuf,

    /// Base URL the datasets are published under
    #[arg(long, default_value = config::DEFAULT_BASE_URL)]
    base_url: String,
}

#[derive(Args)]
struct FetchArgs {
    #[command(flatten)]
    source: SourceArgs,
}

#[derive(Args)]
struct IngestArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Catalog directory (created if missing)
    #[arg(short, long)]
    store: PathBuf,

    /// Root directory of the movies library
    #[arg(long, default_value = config::DEFAULT_MOVIES_PATH)]
    movies_path: PathBuf,

    /// Display name of the movies library
    #[arg(long, default_value = config::DEFAULT_MOVIES_NAME)]
    movies_name: String,

    /// Root directory of the shows library
    #[arg(long, default_value = config::DEFAULT_SHOWS_PATH)]
    shows_path: PathBuf,

    /// Display name of the shows library
    #[arg(long, default_value = config::DEFAULT_SHOWS_NAME)]
    shows_name: String,

    /// Entities per store write, per kind
    #[arg(long, default_value_t = config::BATCH_SIZE)]
    batch_size: usize,

    /// Report progress every N committed entities
    #[arg(long, default_value_t = config::PROGRESS_INTERVAL)]
    progress_interval: u64,

    /// Seconds between library materialization checks
    #[arg(long, default_value_t = config::POLL_INTERVAL_SECS)]
    poll_interval: u64,

    /// Seconds to wait for a new library to materialize
    #[arg(long, default_value_t = config::MATERIALIZE_TIMEOUT_SECS)]
    materialize_timeout: u64,

    /// Stop after this many primary rows (for trial runs)
    #[arg(long)]
    limit: Option<u64>,

    /// Force rebuild of the linkage index cache
    #[arg(long)]
    no_cache: bool,
}

impl IngestArgs {
    fn into_config(self) -> IngestConfig {
        IngestConfig {
            cache_dir: self.source.cache_dir,
            base_url: self.source.base_url,
            movies: LibrarySpec {
                path: self.movies_path,
                name: self.movies_name,
                kind: CollectionKind::Movies,
            },
            shows: LibrarySpec {
                path: self.shows_path,
                name: self.shows_name,
                kind: CollectionKind::TvShows,
            },
            batch_size: self.batch_size,
            progress_interval: self.progress_interval,
            poll_interval: Duration::from_secs(self.poll_interval),
            materialize_timeout: Duration::from_secs(self.materialize_timeout),
            use_index_cache: !self.no_cache,
            row_limit: self.limit,
            ..IngestConfig::default()
        }
    }
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("marquee-worker")
        .enable_io()
        .enable_time()
        .build()
        .context("Failed to start async runtime")
}

fn run_ingest(args: IngestArgs) -> Result<()> {
    let store_dir = args.store.clone();
    let config = args.into_config();
    let store = Arc::new(
        FsCatalogStore::open(&store_dir)
            .with_context(|| format!("Failed to open catalog store: {:?}", store_dir))?,
    );

    let mut task = IngestTask::new(
        store.clone(),
        Arc::new(HttpTransport::new()),
        Arc::new(TokioClock),
        config,
    );

    let info = task.info();
    info!(task = info.name, key = info.key, "Starting task");

    let rt = build_runtime()?;
    let cancel = CancellationToken::new();
    let progress = BarProgress::new("ingest");

    let report = rt.block_on(async {
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling after the current row");
                on_signal.cancel();
            }
        });
        task.execute(&progress, &cancel).await
    });
    progress.finish();
    let report = report.with_context(|| format!("Ingestion stopped in {:?}", task.stage()))?;

    let stats = &report.stats;
    println!();
    println!("=== Summary ===");
    println!("Total time:         {:.2}s", report.elapsed.as_secs_f64());
    println!();
    println!("Rows read:          {}", stats.rows_read);
    println!("Rows skipped:       {}", stats.rows_skipped);
    println!("Linkage entries:    {}", stats.linkage_entries);
    println!("Movies:             {}", stats.movies);
    println!("Series:             {}", stats.series);
    println!("Episodes:           {}", stats.episodes);
    println!("Unplaced episodes:  {}", stats.unplaced_episodes);
    println!("Ignored titles:     {}", stats.ignored_titles);
    println!("Entities built:     {}", stats.reconstructed());
    println!("Entities committed: {}", stats.committed);
    println!();
    println!("Catalog now holds:");
    for kind in EntityKind::FLUSH_ORDER {
        println!("  {:<10} {}", kind.as_str(), store.item_count(kind));
    }

    Ok(())
}

fn run_fetch(args: FetchArgs) -> Result<()> {
    let transport = HttpTransport::new();
    let rt = build_runtime()?;
    rt.block_on(async {
        for dataset in [
            Dataset::title_basics(&args.source.base_url),
            Dataset::title_episode(&args.source.base_url),
        ] {
            let path = ensure_dataset(&transport, &dataset, &args.source.cache_dir).await?;
            info!(path = ?path, "Dataset ready");
            println!("{}", path.display());
        }
        Ok::<(), anyhow::Error>(())
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
    }

    let result = match cli.command {
        Commands::Ingest(args) => run_ingest(args),
        Commands::Fetch(args) => run_fetch(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
