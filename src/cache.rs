use crate::config::INDEX_CACHE_VERSION;
use crate::index::LinkageIndex;
use crate::models::EpisodeLink;
use anyhow::{Context, Result};
use bincode::Options;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

#[derive(Serialize, Deserialize)]
pub struct CacheMetadata {
    pub version: u32,
    pub input_path: String,
    pub input_mtime: u64,
    pub input_size: u64,
    pub episode_count: usize,
}

#[derive(Deserialize)]
struct IndexCacheDe {
    metadata: CacheMetadata,
    links: FxHashMap<String, EpisodeLink>,
}

/// Borrows the map so saving never clones millions of keys.
#[derive(Serialize)]
struct IndexCacheSer<'a> {
    metadata: CacheMetadata,
    links: &'a FxHashMap<String, EpisodeLink>,
}

/// `title.episode.tsv.gz` → `title.episode.tsv.gz.index`
pub fn cache_path(dataset_path: &Path) -> PathBuf {
    let mut name = dataset_path.as_os_str().to_os_string();
    name.push(".index");
    PathBuf::from(name)
}

fn get_input_metadata(input_path: &Path) -> Result<(u64, u64)> {
    let metadata = fs::metadata(input_path)
        .with_context(|| format!("Failed to get metadata for: {:?}", input_path))?;
    let mtime = metadata
        .modified()
        .context("Failed to get modification time")?
        .duration_since(SystemTime::UNIX_EPOCH)
        .context("Invalid modification time")?
        .as_secs();
    Ok((mtime, metadata.len()))
}

/// Returns `Ok(Some(index))` if the cache matches the dataset, `Ok(None)` if it is
/// missing, stale or unreadable.
pub fn try_load_index(cache_path: &Path, input_path: &Path) -> Result<Option<LinkageIndex>> {
    if !cache_path.exists() {
        return Ok(None);
    }

    let file_size = fs::metadata(cache_path).map(|m| m.len()).unwrap_or(0);
    let file = File::open(cache_path).context("Failed to open index cache")?;
    let reader = BufReader::with_capacity(256 * 1024, file);

    let options = bincode::options().with_limit(file_size.saturating_add(1024));

    let cache: IndexCacheDe = match options.deserialize_from(reader) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Index cache is corrupt or unreadable");
            return Ok(None);
        }
    };

    if cache.metadata.version != INDEX_CACHE_VERSION {
        info!(
            cached = cache.metadata.version,
            current = INDEX_CACHE_VERSION,
            "Index cache version mismatch"
        );
        return Ok(None);
    }

    let input_str = input_path.to_string_lossy();
    if cache.metadata.input_path != input_str {
        info!(
            cached = cache.metadata.input_path,
            current = %input_str,
            "Index cache input path mismatch"
        );
        return Ok(None);
    }

    let (mtime, size) = get_input_metadata(input_path)?;
    if cache.metadata.input_mtime != mtime || cache.metadata.input_size != size {
        info!(
            cached_mtime = cache.metadata.input_mtime,
            current_mtime = mtime,
            cached_size = cache.metadata.input_size,
            current_size = size,
            "Linkage dataset changed since the index was cached"
        );
        return Ok(None);
    }

    info!(
        episodes = cache.metadata.episode_count,
        "Linkage index loaded from cache"
    );

    Ok(Some(LinkageIndex::from_map(cache.links)))
}

/// Writes to a temp file first and renames, so a crash never leaves a half cache.
pub fn save_index(index: &LinkageIndex, input_path: &Path) -> Result<PathBuf> {
    let path = cache_path(input_path);
    let (mtime, size) = get_input_metadata(input_path)?;

    let cache = IndexCacheSer {
        metadata: CacheMetadata {
            version: INDEX_CACHE_VERSION,
            input_path: input_path.to_string_lossy().into_owned(),
            input_mtime: mtime,
            input_size: size,
            episode_count: index.len(),
        },
        links: index.map(),
    };

    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let file = File::create(&tmp_path)
        .with_context(|| format!("Failed to create temp index cache: {:?}", tmp_path))?;
    let writer = BufWriter::new(file);

    bincode::DefaultOptions::new()
        .serialize_into(writer, &cache)
        .context("Failed to serialize linkage index")?;

    fs::rename(&tmp_path, &path)
        .with_context(|| format!("Failed to rename temp index cache to: {:?}", path))?;

    info!(episodes = index.len(), path = ?path, "Linkage index cached");

    Ok(path)
}
