//! Turns flat title rows into catalog items.
//!
//! Movies and series come straight from their own row. Episodes need the linkage
//! index to find their series and numbering; an episode that cannot be placed is
//! dropped, and a placed one also yields the season it belongs to.

use crate::config::{PROVIDER_KEY, VIRTUAL_SCHEME};
use crate::identity;
use crate::index::LinkageIndex;
use crate::models::{
    Entity, Episode, ItemMeta, Movie, PrimaryRecord, ProviderRef, Season, Series, TitleKind,
};
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

/// Library roots new top-level items are parented to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parents {
    pub movies: Uuid,
    pub shows: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reconstructed {
    Movie(Movie),
    Series(Series),
    /// The season is re-derived for every episode; the store folds the repeats.
    Episode { season: Season, episode: Episode },
}

impl Reconstructed {
    /// Season first, so it is buffered ahead of its episode.
    pub fn into_entities(self) -> Vec<Entity> {
        match self {
            Reconstructed::Movie(m) => vec![Entity::Movie(m)],
            Reconstructed::Series(s) => vec![Entity::Series(s)],
            Reconstructed::Episode { season, episode } => {
                vec![Entity::Season(season), Entity::Episode(episode)]
            }
        }
    }
}

/// Maps one primary row to zero or one reconstruction. Reads the index, touches
/// nothing else.
pub fn reconstruct(
    record: PrimaryRecord,
    index: &LinkageIndex,
    parents: &Parents,
    now: DateTime<Utc>,
) -> Option<Reconstructed> {
    match record.kind {
        TitleKind::Movie => Some(Reconstructed::Movie(into_movie(record, parents.movies, now))),
        TitleKind::TvSeries => Some(Reconstructed::Series(into_series(
            record,
            parents.shows,
            now,
        ))),
        TitleKind::TvEpisode => into_episode(record, index, now),
        _ => None,
    }
}

fn display_name(title: String, external_id: &str) -> String {
    if title.trim().is_empty() {
        external_id.to_string()
    } else {
        title
    }
}

fn meta(
    id: Uuid,
    name: String,
    parent_id: Uuid,
    path: String,
    external_id: String,
    now: DateTime<Utc>,
) -> ItemMeta {
    ItemMeta {
        id,
        name,
        parent_id,
        path,
        is_virtual: true,
        provider: ProviderRef {
            provider: PROVIDER_KEY,
            external_id,
        },
        created_at: now,
        modified_at: now,
    }
}

fn into_movie(record: PrimaryRecord, parent: Uuid, now: DateTime<Utc>) -> Movie {
    let name = display_name(record.primary_title, &record.id);
    let movie = Movie {
        meta: meta(
            identity::movie_id(&record.id),
            name,
            parent,
            format!("{VIRTUAL_SCHEME}://movie/{}", record.id),
            record.id,
            now,
        ),
        original_title: record.original_title,
        is_adult: record.is_adult,
        production_year: record.start_year,
        runtime_minutes: record.runtime_minutes,
        genres: record.genres,
    };
    debug!(title = %movie.meta.name, imdb = %movie.meta.provider.external_id, "Prepared movie");
    movie
}

fn into_series(record: PrimaryRecord, parent: Uuid, now: DateTime<Utc>) -> Series {
    let name = display_name(record.primary_title, &record.id);
    let series = Series {
        meta: meta(
            identity::series_id(&record.id),
            name,
            parent,
            format!("{VIRTUAL_SCHEME}://series/{}", record.id),
            record.id,
            now,
        ),
        original_title: record.original_title,
        is_adult: record.is_adult,
        production_year: record.start_year,
        end_year: record.end_year,
        genres: record.genres,
    };
    debug!(title = %series.meta.name, imdb = %series.meta.provider.external_id, "Prepared series");
    series
}

fn into_episode(
    record: PrimaryRecord,
    index: &LinkageIndex,
    now: DateTime<Utc>,
) -> Option<Reconstructed> {
    let Some(link) = index.get(&record.id) else {
        debug!(imdb = %record.id, "Episode without linkage, dropped");
        return None;
    };
    let (Some(season_number), Some(episode_number)) = (link.season_number, link.episode_number)
    else {
        debug!(imdb = %record.id, "Episode without season/episode numbers, dropped");
        return None;
    };

    let series_external = link.parent_id.as_str();
    let series_id = identity::series_id(series_external);
    let season_id = identity::season_id(series_external, season_number);

    let season = Season {
        meta: meta(
            season_id,
            format!("Season {season_number}"),
            series_id,
            format!("{VIRTUAL_SCHEME}://series/{series_external}/season/{season_number}"),
            format!("{series_external}:S{season_number}"),
            now,
        ),
        index_number: season_number,
    };

    let name = display_name(record.primary_title, &record.id);
    let episode = Episode {
        meta: meta(
            identity::episode_id(&record.id),
            name,
            season_id,
            format!(
                "{VIRTUAL_SCHEME}://series/{series_external}/season/{season_number}/ep/{episode_number}"
            ),
            record.id,
            now,
        ),
        series_id,
        index_number: episode_number,
        parent_index_number: season_number,
        runtime_minutes: record.runtime_minutes,
        genres: record.genres,
    };

    debug!(
        season = season_number,
        episode = episode_number,
        imdb = %episode.meta.provider.external_id,
        "Prepared episode"
    );
    Some(Reconstructed::Episode { season, episode })
}
