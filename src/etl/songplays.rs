//! Play reconciliation: resolve song and artist identity for play events.

use std::collections::HashMap;

use chrono::Datelike;
use rayon::prelude::*;

use crate::models::{CatalogRecord, PlayEvent, SongplayRow};

/// Left-join play events against the catalog on (title, artist name).
///
/// Matching is exact and case-sensitive. Every event yields exactly one row;
/// an event with no catalog match keeps null identifiers. The synthetic
/// songplay_id is the event's position in the batch, which is unique and
/// monotonically increasing.
pub fn build_songplays(events: &[PlayEvent], catalog: &[CatalogRecord]) -> Vec<SongplayRow> {
    let index = catalog_index(catalog);
    events
        .par_iter()
        .enumerate()
        .map(|(id, event)| {
            let resolved = index.get(&(event.song.as_str(), event.artist.as_str()));
            SongplayRow {
                songplay_id: id as i64,
                start_time: event.start_time,
                year: event.start_time.year(),
                month: event.start_time.month(),
                user_id: event.user_id.clone(),
                level: event.level.clone(),
                song_id: resolved.map(|(song_id, _)| (*song_id).to_string()),
                artist_id: resolved.map(|(_, artist_id)| (*artist_id).to_string()),
                session_id: event.session_id,
                location: event.location.clone(),
                user_agent: event.user_agent.clone(),
            }
        })
        .collect()
}

/// Build the (title, artist name) lookup.
///
/// When several catalog rows share a key, the lowest song_id wins so the
/// join is deterministic.
fn catalog_index<'a>(
    catalog: &'a [CatalogRecord],
) -> HashMap<(&'a str, &'a str), (&'a str, &'a str)> {
    let mut index: HashMap<(&str, &str), (&str, &str)> = HashMap::new();
    for rec in catalog {
        let key = (rec.title.as_str(), rec.artist_name.as_str());
        let value = (rec.song_id.as_str(), rec.artist_id.as_str());
        index
            .entry(key)
            .and_modify(|current| {
                if value.0 < current.0 {
                    *current = value;
                }
            })
            .or_insert(value);
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::etl::activity::derive_datetime;

    fn event(song: &str, artist: &str, ts: i64) -> PlayEvent {
        PlayEvent {
            user_id: "U1".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            gender: "F".to_string(),
            level: "free".to_string(),
            start_time: derive_datetime(ts).unwrap(),
            song: song.to_string(),
            artist: artist.to_string(),
            session_id: 1,
            location: "LA".to_string(),
            user_agent: "UA".to_string(),
        }
    }

    fn catalog_record(song_id: &str, title: &str, artist_id: &str, artist_name: &str) -> CatalogRecord {
        CatalogRecord {
            song_id: song_id.to_string(),
            title: title.to_string(),
            artist_id: artist_id.to_string(),
            artist_name: artist_name.to_string(),
            artist_location: None,
            artist_latitude: None,
            artist_longitude: None,
            year: 2000,
            duration: 180.0,
        }
    }

    #[test]
    fn test_every_event_produces_exactly_one_row() {
        let events = vec![
            event("Song A", "Artist X", 1_000_000_000_000),
            event("Nowhere", "Nobody", 1_000_000_000_001),
        ];
        let catalog = vec![catalog_record("S1", "Song A", "AR1", "Artist X")];
        let rows = build_songplays(&events, &catalog);
        assert_eq!(rows.len(), events.len());
    }

    #[test]
    fn test_match_resolves_identifiers() {
        let events = vec![event("Song A", "Artist X", 1_000_000_000_000)];
        let catalog = vec![catalog_record("S1", "Song A", "AR1", "Artist X")];
        let rows = build_songplays(&events, &catalog);
        assert_eq!(rows[0].song_id.as_deref(), Some("S1"));
        assert_eq!(rows[0].artist_id.as_deref(), Some("AR1"));
        assert_eq!(rows[0].year, 2001);
        assert_eq!(rows[0].month, 9);
    }

    #[test]
    fn test_no_match_keeps_row_with_null_identifiers() {
        let events = vec![event("Song A", "Artist X", 1_000_000_000_000)];
        let catalog = vec![catalog_record("S1", "Song B", "AR1", "Artist X")];
        let rows = build_songplays(&events, &catalog);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].song_id, None);
        assert_eq!(rows[0].artist_id, None);
        assert_eq!(rows[0].user_id, "U1");
        assert_eq!(rows[0].level, "free");
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let events = vec![event("song a", "Artist X", 1_000_000_000_000)];
        let catalog = vec![catalog_record("S1", "Song A", "AR1", "Artist X")];
        let rows = build_songplays(&events, &catalog);
        assert_eq!(rows[0].song_id, None);
    }

    #[test]
    fn test_ambiguous_key_resolves_to_lowest_song_id() {
        let events = vec![event("Song A", "Artist X", 1_000_000_000_000)];
        let catalog = vec![
            catalog_record("S9", "Song A", "AR9", "Artist X"),
            catalog_record("S1", "Song A", "AR1", "Artist X"),
            catalog_record("S5", "Song A", "AR5", "Artist X"),
        ];
        let rows = build_songplays(&events, &catalog);
        assert_eq!(rows[0].song_id.as_deref(), Some("S1"));
        assert_eq!(rows[0].artist_id.as_deref(), Some("AR1"));
    }

    #[test]
    fn test_songplay_ids_are_unique_and_increasing() {
        let events: Vec<PlayEvent> = (0..50)
            .map(|i| event("Song A", "Artist X", 1_000_000_000_000 + i))
            .collect();
        let rows = build_songplays(&events, &[]);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.songplay_id, i as i64);
        }
    }
}
