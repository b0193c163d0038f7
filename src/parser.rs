//! Tab-separated row parsing for the two IMDb tables.
//!
//! Parsing is lenient: headers, ragged rows and rows without a usable key yield
//! `None` rather than an error, since the upstream dumps routinely contain partial
//! lines and one bad row must not abort a multi-million row run.

use crate::config::{HEADER_TOKEN, LINKAGE_MIN_FIELDS, NULL_SENTINEL, PRIMARY_MIN_FIELDS};
use crate::models::{LinkageRecord, PrimaryRecord, TitleKind};

/// Parses one `title.basics` line.
pub fn parse_primary(line: &str) -> Option<PrimaryRecord> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < PRIMARY_MIN_FIELDS || fields[0] == HEADER_TOKEN {
        return None;
    }

    let id = null_to_empty(fields[0]);
    if id.is_empty() {
        return None;
    }

    Some(PrimaryRecord {
        id: id.to_string(),
        kind: TitleKind::from_token(fields[1]),
        primary_title: null_to_empty(fields[2]).to_string(),
        original_title: null_to_empty(fields[3]).to_string(),
        is_adult: fields[4] == "1",
        start_year: parse_optional_int(fields[5]),
        end_year: parse_optional_int(fields[6]),
        runtime_minutes: parse_optional_int(fields[7])
            .and_then(|m| u32::try_from(m).ok())
            .filter(|m| *m > 0),
        genres: parse_genres(fields[8]),
    })
}

/// Parses one `title.episode` line. Rows whose parent is the null sentinel carry no
/// linkage and are skipped.
pub fn parse_linkage(line: &str) -> Option<LinkageRecord> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < LINKAGE_MIN_FIELDS || fields[0] == HEADER_TOKEN {
        return None;
    }

    let child_id = null_to_empty(fields[0]);
    let parent_id = null_to_empty(fields[1]);
    if child_id.is_empty() || parent_id.is_empty() {
        return None;
    }

    Some(LinkageRecord {
        child_id: child_id.to_string(),
        parent_id: parent_id.to_string(),
        season_number: parse_optional_int(fields[2]),
        episode_number: parse_optional_int(fields[3]),
    })
}

fn null_to_empty(field: &str) -> &str {
    if field == NULL_SENTINEL {
        ""
    } else {
        field
    }
}

fn parse_optional_int(field: &str) -> Option<i32> {
    let field = null_to_empty(field).trim();
    if field.is_empty() {
        return None;
    }
    field.parse().ok()
}

fn parse_genres(field: &str) -> Vec<String> {
    null_to_empty(field)
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_movie_row() {
        let rec = parse_primary(
            "tt0133093\tmovie\tThe Matrix\tThe Matrix\t0\t1999\t\\N\t136\tAction,Sci-Fi",
        )
        .unwrap();
        assert_eq!(rec.id, "tt0133093");
        assert_eq!(rec.kind, TitleKind::Movie);
        assert_eq!(rec.primary_title, "The Matrix");
        assert_eq!(rec.original_title, "The Matrix");
        assert!(!rec.is_adult);
        assert_eq!(rec.start_year, Some(1999));
        assert_eq!(rec.end_year, None);
        assert_eq!(rec.runtime_minutes, Some(136));
        assert_eq!(rec.genres, vec!["Action", "Sci-Fi"]);
    }

    #[test]
    fn primary_header_is_skipped() {
        let header = "tconst\ttitleType\tprimaryTitle\toriginalTitle\tisAdult\tstartYear\tendYear\truntimeMinutes\tgenres";
        assert!(parse_primary(header).is_none());
    }

    #[test]
    fn primary_short_row_is_skipped() {
        assert!(parse_primary("tt0000001\tshort\tCarmencita").is_none());
        assert!(parse_primary("").is_none());
    }

    #[test]
    fn primary_sentinels_become_empty() {
        let rec = parse_primary("tt0000002\tshort\t\\N\t\\N\t\\N\t\\N\t\\N\t\\N\t\\N").unwrap();
        assert_eq!(rec.primary_title, "");
        assert_eq!(rec.original_title, "");
        assert!(!rec.is_adult);
        assert_eq!(rec.start_year, None);
        assert_eq!(rec.end_year, None);
        assert_eq!(rec.runtime_minutes, None);
        assert!(rec.genres.is_empty());
    }

    #[test]
    fn primary_bad_numbers_become_absent() {
        let rec = parse_primary("tt1\tmovie\tX\tX\t1\tabcd\t19x9\t-5\tDrama").unwrap();
        assert!(rec.is_adult);
        assert_eq!(rec.start_year, None);
        assert_eq!(rec.end_year, None);
        assert_eq!(rec.runtime_minutes, None);
    }

    #[test]
    fn primary_zero_runtime_is_absent() {
        let rec = parse_primary("tt1\tmovie\tX\tX\t0\t2000\t\\N\t0\tDrama").unwrap();
        assert_eq!(rec.runtime_minutes, None);
    }

    #[test]
    fn primary_extra_fields_are_tolerated() {
        let rec = parse_primary("tt1\tmovie\tX\tX\t0\t2000\t\\N\t90\tDrama\textra").unwrap();
        assert_eq!(rec.runtime_minutes, Some(90));
        assert_eq!(rec.genres, vec!["Drama"]);
    }

    #[test]
    fn primary_unknown_kind_keeps_row() {
        let rec = parse_primary("tt1\tpodcastEpisode\tX\tX\t0\t2000\t\\N\t90\tDrama").unwrap();
        assert_eq!(rec.kind, TitleKind::Unknown);
    }

    #[test]
    fn genres_trim_and_drop_empty() {
        assert_eq!(
            parse_genres(" Comedy , ,Drama,"),
            vec!["Comedy".to_string(), "Drama".to_string()]
        );
        assert!(parse_genres("").is_empty());
        assert!(parse_genres("\\N").is_empty());
    }

    #[test]
    fn optional_int_handles_whitespace_and_sign() {
        assert_eq!(parse_optional_int(" 42 "), Some(42));
        assert_eq!(parse_optional_int("-3"), Some(-3));
        assert_eq!(parse_optional_int("\\N"), None);
        assert_eq!(parse_optional_int(""), None);
        assert_eq!(parse_optional_int("4.5"), None);
    }

    #[test]
    fn linkage_row() {
        let rec = parse_linkage("tt0583459\ttt0096697\t5\t3").unwrap();
        assert_eq!(rec.child_id, "tt0583459");
        assert_eq!(rec.parent_id, "tt0096697");
        assert_eq!(rec.season_number, Some(5));
        assert_eq!(rec.episode_number, Some(3));
    }

    #[test]
    fn linkage_missing_numbers() {
        let rec = parse_linkage("tt0041951\ttt0041038\t\\N\t\\N").unwrap();
        assert_eq!(rec.season_number, None);
        assert_eq!(rec.episode_number, None);
    }

    #[test]
    fn linkage_null_parent_is_skipped() {
        assert!(parse_linkage("tt0041951\t\\N\t1\t2").is_none());
    }

    #[test]
    fn linkage_header_and_short_rows_are_skipped() {
        assert!(parse_linkage("tconst\tparentTconst\tseasonNumber\tepisodeNumber").is_none());
        assert!(parse_linkage("tt0041951\ttt0041038\t1").is_none());
    }
}
