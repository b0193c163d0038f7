use std::path::PathBuf;
use std::time::Duration;

/// Literal token the datasets use for a missing value
pub const NULL_SENTINEL: &str = r"\N";

/// First column name of both dataset headers
pub const HEADER_TOKEN: &str = "tconst";

/// Minimum column counts; shorter rows are skipped
pub const PRIMARY_MIN_FIELDS: usize = 9;
pub const LINKAGE_MIN_FIELDS: usize = 4;

pub const TITLE_BASICS_FILE: &str = "title.basics.tsv.gz";
pub const TITLE_EPISODE_FILE: &str = "title.episode.tsv.gz";
pub const DEFAULT_BASE_URL: &str = "https://datasets.imdbws.com";
pub const DEFAULT_CACHE_DIR: &str = "/tmp/imdb-cache";

pub const DEFAULT_MOVIES_PATH: &str = "/media/movies";
pub const DEFAULT_MOVIES_NAME: &str = "External Movies";
pub const DEFAULT_SHOWS_PATH: &str = "/media/shows";
pub const DEFAULT_SHOWS_NAME: &str = "External Shows";

/// Entities per batched store write
pub const BATCH_SIZE: usize = 500;

/// Report progress every N committed entities
pub const PROGRESS_INTERVAL: u64 = 5000;

/// Rough size of the primary dataset, used as the progress denominator.
/// The real row count is unknown until the stream ends.
pub const ESTIMATED_TOTAL_ROWS: u64 = 1_500_000;

/// Spinner tick interval while building the linkage index (rows)
pub const INDEX_TICK_INTERVAL: u64 = 10_000;

pub const POLL_INTERVAL_SECS: u64 = 1;
pub const MATERIALIZE_TIMEOUT_SECS: u64 = 60;

/// Bump when the serialized linkage index layout changes
pub const INDEX_CACHE_VERSION: u32 = 1;

/// Placeholder written into library directories so the store's scan sees them
pub const SEED_FILE_NAME: &str = "stub.txt";

/// Scheme used for the virtual locators of ingested items
pub const VIRTUAL_SCHEME: &str = "stremio";

/// Provider tag attached to every ingested item
pub const PROVIDER_KEY: &str = "Imdb";

/// Kind of library a container is created as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Movies,
    TvShows,
}

/// A library root the pipeline parents its items under.
#[derive(Debug, Clone)]
pub struct LibrarySpec {
    pub path: PathBuf,
    pub name: String,
    pub kind: CollectionKind,
}

/// Every tunable of one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub cache_dir: PathBuf,
    pub base_url: String,
    pub movies: LibrarySpec,
    pub shows: LibrarySpec,
    pub batch_size: usize,
    pub progress_interval: u64,
    pub estimated_total: u64,
    pub poll_interval: Duration,
    pub materialize_timeout: Duration,
    pub use_index_cache: bool,
    pub row_limit: Option<u64>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            base_url: DEFAULT_BASE_URL.to_string(),
            movies: LibrarySpec {
                path: PathBuf::from(DEFAULT_MOVIES_PATH),
                name: DEFAULT_MOVIES_NAME.to_string(),
                kind: CollectionKind::Movies,
            },
            shows: LibrarySpec {
                path: PathBuf::from(DEFAULT_SHOWS_PATH),
                name: DEFAULT_SHOWS_NAME.to_string(),
                kind: CollectionKind::TvShows,
            },
            batch_size: BATCH_SIZE,
            progress_interval: PROGRESS_INTERVAL,
            estimated_total: ESTIMATED_TOTAL_ROWS,
            poll_interval: Duration::from_secs(POLL_INTERVAL_SECS),
            materialize_timeout: Duration::from_secs(MATERIALIZE_TIMEOUT_SECS),
            use_index_cache: true,
            row_limit: None,
        }
    }
}
