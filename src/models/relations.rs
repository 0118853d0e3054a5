//! Star-schema relation rows.

use chrono::{DateTime, Datelike, Timelike, Utc};

/// Row of the songs dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct SongRow {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub year: i32,
    pub duration: f64,
}

/// Row of the artists dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtistRow {
    pub artist_id: String,
    pub name: String,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Row of the users dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRow {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: String,
    pub level: String,
}

/// Row of the time dimension. All components are derived from `start_time`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeRow {
    pub start_time: DateTime<Utc>,
    pub hour: u32,
    pub day: u32,
    pub week: u32,
    pub month: u32,
    pub year: i32,
    pub weekday: u32,
}

impl TimeRow {
    /// Decompose a timestamp into its calendar components.
    ///
    /// Week is the ISO week of year. Weekday numbering is 1 = Sunday through
    /// 7 = Saturday.
    pub fn from_start_time(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            hour: start_time.hour(),
            day: start_time.day(),
            week: start_time.iso_week().week(),
            month: start_time.month(),
            year: start_time.year(),
            weekday: start_time.weekday().num_days_from_sunday() + 1,
        }
    }
}

/// Row of the songplays fact relation.
///
/// `song_id` and `artist_id` are `None` when the play event matched nothing
/// in the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct SongplayRow {
    pub songplay_id: i64,
    pub start_time: DateTime<Utc>,
    pub year: i32,
    pub month: u32,
    pub user_id: String,
    pub level: String,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: i64,
    pub location: String,
    pub user_agent: String,
}
