//! Source record schemas.
//!
//! Both input families are declared up front with explicit field types, so a
//! malformed document fails at decode time instead of surfacing later as a
//! missing column.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One catalog entry describing a song and its artist.
///
/// Unknown fields in the source documents (e.g. `num_songs`) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogRecord {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub artist_name: String,
    pub artist_location: Option<String>,
    pub artist_latitude: Option<f64>,
    pub artist_longitude: Option<f64>,
    /// Release year; the source data uses 0 for unknown.
    pub year: i32,
    /// Track length in seconds.
    pub duration: f64,
}

/// One logged application event.
///
/// Identity fields are optional because anonymous page views carry none of
/// them. They become required once a record is refined into a [`PlayEvent`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub page: String,
    pub user_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
    /// Event time in epoch milliseconds.
    pub ts: i64,
    pub song: Option<String>,
    pub artist: Option<String>,
    pub session_id: i64,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

/// A validated playback event.
///
/// The refinement from [`ActivityRecord`] makes every identity field required
/// and derives the UTC calendar timestamp from the raw epoch milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayEvent {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: String,
    pub level: String,
    pub start_time: DateTime<Utc>,
    pub song: String,
    pub artist: String,
    pub session_id: i64,
    pub location: String,
    pub user_agent: String,
}
