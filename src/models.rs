use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title type column of the primary dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TitleKind {
    Movie,
    Short,
    TvEpisode,
    TvMiniSeries,
    TvMovie,
    TvPilot,
    TvSeries,
    TvShort,
    TvSpecial,
    Video,
    VideoGame,
    #[default]
    Unknown,
}

impl TitleKind {
    /// Unrecognized tokens map to `Unknown` instead of failing the row.
    pub fn from_token(token: &str) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "movie" => TitleKind::Movie,
            "short" => TitleKind::Short,
            "tvepisode" => TitleKind::TvEpisode,
            "tvminiseries" => TitleKind::TvMiniSeries,
            "tvmovie" => TitleKind::TvMovie,
            "tvpilot" => TitleKind::TvPilot,
            "tvseries" => TitleKind::TvSeries,
            "tvshort" => TitleKind::TvShort,
            "tvspecial" => TitleKind::TvSpecial,
            "video" => TitleKind::Video,
            "videogame" => TitleKind::VideoGame,
            _ => TitleKind::Unknown,
        }
    }
}

/// One row of `title.basics`.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryRecord {
    pub id: String,
    pub kind: TitleKind,
    pub primary_title: String,
    pub original_title: String,
    pub is_adult: bool,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub runtime_minutes: Option<u32>,
    pub genres: Vec<String>,
}

/// One row of `title.episode`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkageRecord {
    pub child_id: String,
    pub parent_id: String,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
}

/// Value side of the linkage index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeLink {
    pub parent_id: String,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
}

/// Points an ingested item back at the dataset it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRef {
    pub provider: &'static str,
    pub external_id: String,
}

/// Bookkeeping shared by every reconstructed item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemMeta {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Uuid,
    pub path: String,
    pub is_virtual: bool,
    pub provider: ProviderRef,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Movie {
    pub meta: ItemMeta,
    pub original_title: String,
    pub is_adult: bool,
    pub production_year: Option<i32>,
    pub runtime_minutes: Option<u32>,
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub meta: ItemMeta,
    pub original_title: String,
    pub is_adult: bool,
    pub production_year: Option<i32>,
    pub end_year: Option<i32>,
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Season {
    pub meta: ItemMeta,
    pub index_number: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    pub meta: ItemMeta,
    pub series_id: Uuid,
    pub index_number: i32,
    pub parent_index_number: i32,
    pub runtime_minutes: Option<u32>,
    pub genres: Vec<String>,
}

/// Item kinds the pipeline writes, in flush order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Series,
    Season,
    Episode,
    Movie,
}

impl EntityKind {
    /// Parents before children, so a season never lands after its episodes.
    pub const FLUSH_ORDER: [EntityKind; 4] = [
        EntityKind::Series,
        EntityKind::Season,
        EntityKind::Episode,
        EntityKind::Movie,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Series => "series",
            EntityKind::Season => "season",
            EntityKind::Episode => "episode",
            EntityKind::Movie => "movie",
        }
    }

    pub fn index(self) -> usize {
        match self {
            EntityKind::Series => 0,
            EntityKind::Season => 1,
            EntityKind::Episode => 2,
            EntityKind::Movie => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Movie(Movie),
    Series(Series),
    Season(Season),
    Episode(Episode),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Movie(_) => EntityKind::Movie,
            Entity::Series(_) => EntityKind::Series,
            Entity::Season(_) => EntityKind::Season,
            Entity::Episode(_) => EntityKind::Episode,
        }
    }

    pub fn meta(&self) -> &ItemMeta {
        match self {
            Entity::Movie(m) => &m.meta,
            Entity::Series(s) => &s.meta,
            Entity::Season(s) => &s.meta,
            Entity::Episode(e) => &e.meta,
        }
    }

    pub fn id(&self) -> Uuid {
        self.meta().id
    }

    pub fn name(&self) -> &str {
        &self.meta().name
    }

    pub fn parent_id(&self) -> Uuid {
        self.meta().parent_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_kind_known_tokens() {
        assert_eq!(TitleKind::from_token("movie"), TitleKind::Movie);
        assert_eq!(TitleKind::from_token("tvEpisode"), TitleKind::TvEpisode);
        assert_eq!(TitleKind::from_token("tvSeries"), TitleKind::TvSeries);
        assert_eq!(TitleKind::from_token("tvMiniSeries"), TitleKind::TvMiniSeries);
        assert_eq!(TitleKind::from_token("videoGame"), TitleKind::VideoGame);
    }

    #[test]
    fn title_kind_is_case_insensitive() {
        assert_eq!(TitleKind::from_token("TVSERIES"), TitleKind::TvSeries);
        assert_eq!(TitleKind::from_token("Movie"), TitleKind::Movie);
    }

    #[test]
    fn title_kind_unknown_fallback() {
        assert_eq!(TitleKind::from_token("radioPlay"), TitleKind::Unknown);
        assert_eq!(TitleKind::from_token(""), TitleKind::Unknown);
        assert_eq!(TitleKind::default(), TitleKind::Unknown);
    }

    #[test]
    fn flush_order_puts_seasons_before_episodes() {
        let order = EntityKind::FLUSH_ORDER;
        let season = order.iter().position(|k| *k == EntityKind::Season).unwrap();
        let episode = order.iter().position(|k| *k == EntityKind::Episode).unwrap();
        assert!(season < episode);
    }

    #[test]
    fn kind_indices_are_distinct() {
        let mut seen = [false; 4];
        for kind in EntityKind::FLUSH_ORDER {
            assert!(!seen[kind.index()]);
            seen[kind.index()] = true;
        }
    }
}
