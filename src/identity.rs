//! Derived identities.
//!
//! The datasets only carry ids for titles, and seasons have none at all, so every
//! catalog id is a UUID v5 over a namespaced key. The same key always yields the
//! same id, which is what makes a re-run an upsert instead of a duplicate.

use crate::models::EntityKind;
use std::path::Path;
use uuid::Uuid;

/// Fixed namespace for every id this crate derives. Changing it orphans all
/// previously ingested items.
pub const NAMESPACE: Uuid = Uuid::from_u128(0x6d61_7271_7565_4500_8000_696d_6462_0001);

fn derive(kind: &str, key: &str) -> Uuid {
    let mut name = String::with_capacity(kind.len() + 1 + key.len());
    name.push_str(kind);
    name.push(':');
    name.push_str(key);
    Uuid::new_v5(&NAMESPACE, name.as_bytes())
}

pub fn movie_id(external_id: &str) -> Uuid {
    derive(EntityKind::Movie.as_str(), external_id)
}

pub fn series_id(external_id: &str) -> Uuid {
    derive(EntityKind::Series.as_str(), external_id)
}

pub fn episode_id(external_id: &str) -> Uuid {
    derive(EntityKind::Episode.as_str(), external_id)
}

/// `{series}:season:{n}`; seasons have no external id of their own.
pub fn season_key(series_external_id: &str, season_number: i32) -> String {
    format!("{series_external_id}:season:{season_number}")
}

pub fn season_id(series_external_id: &str, season_number: i32) -> Uuid {
    derive(
        EntityKind::Season.as_str(),
        &season_key(series_external_id, season_number),
    )
}

/// Identity a store assigns to the container materialized for `path`.
pub fn container_id(path: &Path) -> Uuid {
    derive("container", &path.to_string_lossy())
}
