//! Partitioned parquet sink.
//!
//! Persists each relation under the output root, one directory per relation.
//! Songs, time, and songplays are subdivided into Hive-style `key=value`
//! partition directories; partition columns live in the directory name and
//! are not repeated inside the data files. Every write replaces the relation
//! directory wholesale (overwrite-on-write, no incremental merge).

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    ArrayRef, Float64Array, Int32Array, Int64Array, StringArray, TimestampMillisecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use thiserror::Error;

use crate::models::{ArtistRow, SongRow, SongplayRow, TimeRow, UserRow};

/// Errors that can occur while persisting a relation.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

/// Data file name inside each partition directory.
const DATA_FILE: &str = "part-00000.parquet";

fn timestamp_utc() -> DataType {
    DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into()))
}

/// Writes relations as snappy-compressed parquet under an output root.
pub struct ParquetSink {
    output_root: PathBuf,
}

impl ParquetSink {
    /// Create a sink rooted at `output_root`. The root is created on first
    /// write.
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    /// Write the songs dimension, partitioned by year and artist_id.
    pub fn write_songs(&self, rows: &[SongRow]) -> Result<(), SinkError> {
        let root = self.reset_relation_dir("songs")?;

        let mut partitions: BTreeMap<(i32, &str), Vec<&SongRow>> = BTreeMap::new();
        for row in rows {
            partitions
                .entry((row.year, row.artist_id.as_str()))
                .or_default()
                .push(row);
        }

        let schema = Arc::new(Schema::new(vec![
            Field::new("song_id", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, false),
            Field::new("duration", DataType::Float64, false),
        ]));
        for ((year, artist_id), rows) in partitions {
            let dir = root
                .join(format!("year={year}"))
                .join(format!("artist_id={}", partition_value(artist_id)));
            let columns: Vec<ArrayRef> = vec![
                Arc::new(StringArray::from_iter_values(
                    rows.iter().map(|r| r.song_id.as_str()),
                )),
                Arc::new(StringArray::from_iter_values(
                    rows.iter().map(|r| r.title.as_str()),
                )),
                Arc::new(Float64Array::from_iter_values(
                    rows.iter().map(|r| r.duration),
                )),
            ];
            write_batch(&dir, schema.clone(), columns)?;
        }
        tracing::info!("wrote {} songs rows", rows.len());
        Ok(())
    }

    /// Write the artists dimension, unpartitioned.
    pub fn write_artists(&self, rows: &[ArtistRow]) -> Result<(), SinkError> {
        let dir = self.reset_relation_dir("artists")?;

        let schema = Arc::new(Schema::new(vec![
            Field::new("artist_id", DataType::Utf8, false),
            Field::new("name", DataType::Utf8, false),
            Field::new("location", DataType::Utf8, true),
            Field::new("latitude", DataType::Float64, true),
            Field::new("longitude", DataType::Float64, true),
        ]));
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.artist_id.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.name.as_str()),
            )),
            Arc::new(StringArray::from_iter(
                rows.iter().map(|r| r.location.as_deref()),
            )),
            Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.latitude))),
            Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.longitude))),
        ];
        write_batch(&dir, schema, columns)?;
        tracing::info!("wrote {} artists rows", rows.len());
        Ok(())
    }

    /// Write the users dimension, unpartitioned.
    pub fn write_users(&self, rows: &[UserRow]) -> Result<(), SinkError> {
        let dir = self.reset_relation_dir("users")?;

        let schema = Arc::new(Schema::new(vec![
            Field::new("user_id", DataType::Utf8, false),
            Field::new("first_name", DataType::Utf8, false),
            Field::new("last_name", DataType::Utf8, false),
            Field::new("gender", DataType::Utf8, false),
            Field::new("level", DataType::Utf8, false),
        ]));
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.user_id.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.first_name.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.last_name.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.gender.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.level.as_str()),
            )),
        ];
        write_batch(&dir, schema, columns)?;
        tracing::info!("wrote {} users rows", rows.len());
        Ok(())
    }

    /// Write the time dimension, partitioned by year and month.
    pub fn write_time(&self, rows: &[TimeRow]) -> Result<(), SinkError> {
        let root = self.reset_relation_dir("time")?;

        let mut partitions: BTreeMap<(i32, u32), Vec<&TimeRow>> = BTreeMap::new();
        for row in rows {
            partitions
                .entry((row.year, row.month))
                .or_default()
                .push(row);
        }

        let schema = Arc::new(Schema::new(vec![
            Field::new("start_time", timestamp_utc(), false),
            Field::new("hour", DataType::Int32, false),
            Field::new("day", DataType::Int32, false),
            Field::new("week", DataType::Int32, false),
            Field::new("weekday", DataType::Int32, false),
        ]));
        for ((year, month), rows) in partitions {
            let dir = root
                .join(format!("year={year}"))
                .join(format!("month={month}"));
            let columns: Vec<ArrayRef> = vec![
                Arc::new(
                    TimestampMillisecondArray::from_iter_values(
                        rows.iter().map(|r| r.start_time.timestamp_millis()),
                    )
                    .with_timezone("UTC"),
                ),
                Arc::new(Int32Array::from_iter_values(
                    rows.iter().map(|r| r.hour as i32),
                )),
                Arc::new(Int32Array::from_iter_values(
                    rows.iter().map(|r| r.day as i32),
                )),
                Arc::new(Int32Array::from_iter_values(
                    rows.iter().map(|r| r.week as i32),
                )),
                Arc::new(Int32Array::from_iter_values(
                    rows.iter().map(|r| r.weekday as i32),
                )),
            ];
            write_batch(&dir, schema.clone(), columns)?;
        }
        tracing::info!("wrote {} time rows", rows.len());
        Ok(())
    }

    /// Write the songplays fact relation, partitioned by year and month.
    pub fn write_songplays(&self, rows: &[SongplayRow]) -> Result<(), SinkError> {
        let root = self.reset_relation_dir("songplays")?;

        let mut partitions: BTreeMap<(i32, u32), Vec<&SongplayRow>> = BTreeMap::new();
        for row in rows {
            partitions
                .entry((row.year, row.month))
                .or_default()
                .push(row);
        }

        let schema = Arc::new(Schema::new(vec![
            Field::new("songplay_id", DataType::Int64, false),
            Field::new("start_time", timestamp_utc(), false),
            Field::new("user_id", DataType::Utf8, false),
            Field::new("level", DataType::Utf8, false),
            Field::new("song_id", DataType::Utf8, true),
            Field::new("artist_id", DataType::Utf8, true),
            Field::new("session_id", DataType::Int64, false),
            Field::new("location", DataType::Utf8, false),
            Field::new("user_agent", DataType::Utf8, false),
        ]));
        for ((year, month), rows) in partitions {
            let dir = root
                .join(format!("year={year}"))
                .join(format!("month={month}"));
            let columns: Vec<ArrayRef> = vec![
                Arc::new(Int64Array::from_iter_values(
                    rows.iter().map(|r| r.songplay_id),
                )),
                Arc::new(
                    TimestampMillisecondArray::from_iter_values(
                        rows.iter().map(|r| r.start_time.timestamp_millis()),
                    )
                    .with_timezone("UTC"),
                ),
                Arc::new(StringArray::from_iter_values(
                    rows.iter().map(|r| r.user_id.as_str()),
                )),
                Arc::new(StringArray::from_iter_values(
                    rows.iter().map(|r| r.level.as_str()),
                )),
                Arc::new(StringArray::from_iter(
                    rows.iter().map(|r| r.song_id.as_deref()),
                )),
                Arc::new(StringArray::from_iter(
                    rows.iter().map(|r| r.artist_id.as_deref()),
                )),
                Arc::new(Int64Array::from_iter_values(
                    rows.iter().map(|r| r.session_id),
                )),
                Arc::new(StringArray::from_iter_values(
                    rows.iter().map(|r| r.location.as_str()),
                )),
                Arc::new(StringArray::from_iter_values(
                    rows.iter().map(|r| r.user_agent.as_str()),
                )),
            ];
            write_batch(&dir, schema.clone(), columns)?;
        }
        tracing::info!("wrote {} songplays rows", rows.len());
        Ok(())
    }

    /// Replace the relation directory, returning its fresh path.
    fn reset_relation_dir(&self, relation: &str) -> Result<PathBuf, SinkError> {
        let dir = self.output_root.join(relation);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// Encode a partition value for use in a `key=value` path segment.
fn partition_value(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

fn write_batch(dir: &Path, schema: Arc<Schema>, columns: Vec<ArrayRef>) -> Result<(), SinkError> {
    fs::create_dir_all(dir)?;
    let batch = RecordBatch::try_new(schema.clone(), columns)?;
    let file = File::create(dir.join(DATA_FILE))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}
