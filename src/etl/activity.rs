//! Activity extraction: play filtering, timestamp decomposition, and the
//! users and time dimensions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{ActivityRecord, PlayEvent, TimeRow, UserRow};

/// Page value identifying a playback event. Records with any other page are
/// discarded.
pub const PLAY_PAGE: &str = "play";

/// Errors raised while refining activity records.
#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("play event at ts {ts} is missing required field `{field}`")]
    MissingField { ts: i64, field: &'static str },

    #[error("timestamp {0} ms is outside the representable range")]
    TimestampOutOfRange(i64),
}

/// Convert an epoch-millisecond timestamp to a UTC calendar timestamp.
///
/// UTC is the fixed decoding zone; hour/day/week partitions must not depend
/// on where a batch happens to run.
pub fn derive_datetime(ts_millis: i64) -> Result<DateTime<Utc>, ActivityError> {
    DateTime::from_timestamp_millis(ts_millis)
        .ok_or(ActivityError::TimestampOutOfRange(ts_millis))
}

/// Keep only playback events, refining each retained record into a
/// [`PlayEvent`].
///
/// Non-play records are discarded with no side effect. A play record missing
/// an identity field is malformed input and aborts the batch.
pub fn filter_plays(records: Vec<ActivityRecord>) -> Result<Vec<PlayEvent>, ActivityError> {
    records
        .into_iter()
        .filter(|r| r.page == PLAY_PAGE)
        .map(refine)
        .collect()
}

fn refine(record: ActivityRecord) -> Result<PlayEvent, ActivityError> {
    let ts = record.ts;
    let require = |field: &'static str, value: Option<String>| {
        value.ok_or(ActivityError::MissingField { ts, field })
    };
    Ok(PlayEvent {
        user_id: require("userId", record.user_id)?,
        first_name: require("firstName", record.first_name)?,
        last_name: require("lastName", record.last_name)?,
        gender: require("gender", record.gender)?,
        level: require("level", record.level)?,
        start_time: derive_datetime(ts)?,
        song: require("song", record.song)?,
        artist: require("artist", record.artist)?,
        session_id: record.session_id,
        location: require("location", record.location)?,
        user_agent: require("userAgent", record.user_agent)?,
    })
}

/// Build the users dimension: one row per user_id.
///
/// When a user's subscription level changed mid-batch, the level of the
/// latest event by start_time wins. Output is sorted by user_id.
pub fn extract_users(events: &[PlayEvent]) -> Vec<UserRow> {
    let mut latest: HashMap<&str, &PlayEvent> = HashMap::new();
    for event in events {
        latest
            .entry(event.user_id.as_str())
            .and_modify(|current| {
                if event.start_time >= current.start_time {
                    *current = event;
                }
            })
            .or_insert(event);
    }

    let mut rows: Vec<UserRow> = latest
        .into_values()
        .map(|e| UserRow {
            user_id: e.user_id.clone(),
            first_name: e.first_name.clone(),
            last_name: e.last_name.clone(),
            gender: e.gender.clone(),
            level: e.level.clone(),
        })
        .collect();
    rows.sort_by(|a, b| a.user_id.cmp(&b.user_id));
    rows
}

/// Build the time dimension: one row per distinct start_time, sorted.
///
/// The calendar decomposition is a pure function of the timestamp.
pub fn extract_time(events: &[PlayEvent]) -> Vec<TimeRow> {
    let mut stamps: Vec<DateTime<Utc>> = events.iter().map(|e| e.start_time).collect();
    stamps.sort_unstable();
    stamps.dedup();
    stamps.into_iter().map(TimeRow::from_start_time).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(page: &str, ts: i64) -> ActivityRecord {
        ActivityRecord {
            page: page.to_string(),
            user_id: Some("U1".to_string()),
            first_name: Some("A".to_string()),
            last_name: Some("B".to_string()),
            gender: Some("F".to_string()),
            level: Some("free".to_string()),
            ts,
            song: Some("Song A".to_string()),
            artist: Some("Artist X".to_string()),
            session_id: 1,
            location: Some("LA".to_string()),
            user_agent: Some("UA".to_string()),
        }
    }

    #[test]
    fn test_filter_plays_keeps_only_play_pages() {
        let records = vec![
            record("play", 1_000),
            record("Home", 2_000),
            record("play", 3_000),
            record("Logout", 4_000),
        ];
        let input_len = records.len();
        let events = filter_plays(records).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.len() <= input_len);
    }

    #[test]
    fn test_filter_plays_rejects_play_record_missing_identity() {
        let mut bad = record("play", 5_000);
        bad.user_id = None;
        let err = filter_plays(vec![bad]).unwrap_err();
        match err {
            ActivityError::MissingField { ts, field } => {
                assert_eq!(ts, 5_000);
                assert_eq!(field, "userId");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_filter_plays_ignores_missing_fields_on_non_play_records() {
        let mut anon = record("Home", 5_000);
        anon.user_id = None;
        anon.gender = None;
        anon.song = None;
        let events = filter_plays(vec![anon]).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_derive_datetime_decodes_utc() {
        // 1000000000000 ms = 2001-09-09T01:46:40Z, a Sunday in ISO week 36.
        let dt = derive_datetime(1_000_000_000_000).unwrap();
        assert_eq!(dt.to_rfc3339(), "2001-09-09T01:46:40+00:00");

        let row = TimeRow::from_start_time(dt);
        assert_eq!(row.hour, 1);
        assert_eq!(row.day, 9);
        assert_eq!(row.week, 36);
        assert_eq!(row.month, 9);
        assert_eq!(row.year, 2001);
        assert_eq!(row.weekday, 1);
    }

    #[test]
    fn test_derive_datetime_rejects_out_of_range() {
        assert!(derive_datetime(i64::MAX).is_err());
    }

    #[test]
    fn test_extract_users_last_seen_level_wins() {
        let mut early = record("play", 1_000);
        early.level = Some("free".to_string());
        let mut late = record("play", 9_000);
        late.level = Some("paid".to_string());

        // Batch order should not matter, only event time.
        let events = filter_plays(vec![late, early]).unwrap();
        let rows = extract_users(&events);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, "U1");
        assert_eq!(rows[0].level, "paid");
    }

    #[test]
    fn test_extract_users_sorted_by_user_id() {
        let mut u2 = record("play", 1_000);
        u2.user_id = Some("U2".to_string());
        let u1 = record("play", 2_000);

        let events = filter_plays(vec![u2, u1]).unwrap();
        let rows = extract_users(&events);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].user_id, "U1");
        assert_eq!(rows[1].user_id, "U2");
    }

    #[test]
    fn test_extract_time_one_row_per_distinct_timestamp() {
        let events = filter_plays(vec![
            record("play", 1_000),
            record("play", 1_000),
            record("play", 2_000),
        ])
        .unwrap();
        let rows = extract_time(&events);
        assert_eq!(rows.len(), 2);
        assert!(rows[0].start_time < rows[1].start_time);
    }

    #[test]
    fn test_time_decomposition_is_pure() {
        let dt = derive_datetime(1_541_106_106_796).unwrap();
        assert_eq!(TimeRow::from_start_time(dt), TimeRow::from_start_time(dt));
    }
}
