//! Marquee: external title catalog ingestion
//!
//! This crate mirrors the public IMDb title datasets into a media catalog store as
//! virtual items (movies, series, seasons and episodes) without any media files on
//! disk:
//!
//! 1. **Provisioning** -- Make sure a movies library and a shows library exist in the
//!    store, creating them and waiting for the store to materialize them if needed
//! 2. **Index Pass** -- Download `title.episode.tsv.gz` once and build an in-memory
//!    episode → (series, season, episode) map, cached on disk between runs
//! 3. **Streaming Pass** -- Stream `title.basics.tsv.gz` row by row, rebuild each row
//!    into catalog entities and write them in bounded per-kind batches
//! 4. **Validation** -- Flush what is left and ask the store to rescan
//!
//! # Architecture
//!
//! - **Streaming decompression** -- The primary table is never held in memory; only
//!   the linkage index grows with the dataset
//! - **Deterministic identities** -- Every entity id is a UUID v5 of its external id,
//!   so re-running over the same snapshot upserts instead of duplicating
//! - **Parent-first batching** -- A season is always buffered before the episode that
//!   references it and flushed no later than that episode's batch
//! - **Cooperative cancellation** -- Checked once per row and before every batch write
//! - **Injected collaborators** -- Store, transport and clock sit behind traits
//!
//! # Key Modules
//!
//! - [`download`] -- Dataset cache and HTTP transport
//! - [`reader`] -- Gzip line streaming
//! - [`parser`] -- Tab-separated row parsing with `\N` handling
//! - [`index`] -- Episode linkage index
//! - [`cache`] -- Linkage index persistence
//! - [`reconstruct`] -- Row → entity reconstruction
//! - [`batch`] -- Per-kind batch writer
//! - [`provision`] -- Library creation and materialization polling
//! - [`store`] -- Catalog store interface
//! - [`fs_store`] -- Directory-backed catalog store
//! - [`pipeline`] -- The ingestion task
//! - [`identity`] -- Derived entity ids
//! - [`models`] -- Records and entities
//! - [`stats`] -- Run counters
//! - [`config`] -- Constants and run configuration
//!
//! # Example Usage
//!
//! ```bash
//! # Ingest into a local directory-backed catalog
//! marquee ingest --store ./catalog --movies-path ./media/movies --shows-path ./media/shows
//!
//! # Only download the datasets
//! marquee fetch --cache-dir /tmp/imdb-cache
//! ```

pub mod batch;
pub mod cache;
pub mod config;
pub mod download;
pub mod error;
pub mod fs_store;
pub mod identity;
pub mod index;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod progress;
pub mod provision;
pub mod reader;
pub mod reconstruct;
pub mod stats;
pub mod store;

pub use error::{IngestError, StoreError};
pub use pipeline::{IngestReport, IngestTask, Stage};
