//! Catalog extraction: the songs and artists dimensions.

use std::collections::HashSet;

use crate::models::{ArtistRow, CatalogRecord, SongRow};

/// Project catalog records into the songs dimension.
///
/// Exact-duplicate rows (equal across all five fields) collapse to one;
/// duration is compared by bit pattern so the reduction is total. Output is
/// sorted so reruns over the same input are byte-identical.
pub fn extract_songs(records: &[CatalogRecord]) -> Vec<SongRow> {
    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    for rec in records {
        let key = (
            rec.song_id.clone(),
            rec.title.clone(),
            rec.artist_id.clone(),
            rec.year,
            rec.duration.to_bits(),
        );
        if seen.insert(key) {
            rows.push(SongRow {
                song_id: rec.song_id.clone(),
                title: rec.title.clone(),
                artist_id: rec.artist_id.clone(),
                year: rec.year,
                duration: rec.duration,
            });
        }
    }
    rows.sort_by(|a, b| (&a.song_id, &a.title).cmp(&(&b.song_id, &b.title)));
    rows
}

/// Project and rename catalog records into the artists dimension.
///
/// Same exact-duplicate semantics as [`extract_songs`].
pub fn extract_artists(records: &[CatalogRecord]) -> Vec<ArtistRow> {
    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    for rec in records {
        let key = (
            rec.artist_id.clone(),
            rec.artist_name.clone(),
            rec.artist_location.clone(),
            rec.artist_latitude.map(f64::to_bits),
            rec.artist_longitude.map(f64::to_bits),
        );
        if seen.insert(key) {
            rows.push(ArtistRow {
                artist_id: rec.artist_id.clone(),
                name: rec.artist_name.clone(),
                location: rec.artist_location.clone(),
                latitude: rec.artist_latitude,
                longitude: rec.artist_longitude,
            });
        }
    }
    rows.sort_by(|a, b| (&a.artist_id, &a.name).cmp(&(&b.artist_id, &b.name)));
    rows
}
