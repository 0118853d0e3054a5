//! Pipeline orchestration.
//!
//! Runs the two extraction pipelines and the reconciliation end-to-end:
//! catalog records feed the songs and artists dimensions, activity records
//! feed the users and time dimensions, and both feed the songplays fact
//! relation. The reconciler only starts once both input batches are fully
//! materialized.

pub mod activity;
pub mod catalog;
pub mod songplays;

use thiserror::Error;

use crate::config::EtlConfig;
use crate::models::{ActivityRecord, CatalogRecord};
use crate::sink::{ParquetSink, SinkError};
use crate::source::{self, SourceError};

pub use activity::ActivityError;

/// Input subtree holding catalog documents.
const SONG_DATA_PREFIX: &str = "song_data";

/// Input subtree holding activity-log documents.
const LOG_DATA_PREFIX: &str = "log_data";

/// Errors that can occur during a run.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("activity error: {0}")]
    Activity(#[from] ActivityError),

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Record and row counts for one complete run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub catalog_records: usize,
    pub activity_records: usize,
    pub play_events: usize,
    pub songs: usize,
    pub artists: usize,
    pub users: usize,
    pub time: usize,
    pub songplays: usize,
    /// Songplays rows whose (title, artist) resolved against the catalog.
    pub matched_plays: usize,
}

/// One full batch run over an input tree.
pub struct Pipeline {
    config: EtlConfig,
    sink: ParquetSink,
}

impl Pipeline {
    pub fn new(config: EtlConfig) -> Self {
        let sink = ParquetSink::new(&config.output_root);
        Self { config, sink }
    }

    /// Run both extraction pipelines and the reconciliation.
    ///
    /// Each relation is fully materialized before its write starts, so a
    /// transformation failure never leaves a partially written relation.
    pub fn run(&self) -> Result<RunSummary, EtlError> {
        let mut summary = RunSummary::default();

        let catalog: Vec<CatalogRecord> =
            source::read_records(&self.config.input_root.join(SONG_DATA_PREFIX))?;
        summary.catalog_records = catalog.len();
        tracing::info!("decoded {} catalog records", catalog.len());

        let songs = catalog::extract_songs(&catalog);
        summary.songs = songs.len();
        self.sink.write_songs(&songs)?;

        let artists = catalog::extract_artists(&catalog);
        summary.artists = artists.len();
        self.sink.write_artists(&artists)?;

        let records: Vec<ActivityRecord> =
            source::read_records(&self.config.input_root.join(LOG_DATA_PREFIX))?;
        summary.activity_records = records.len();
        tracing::info!("decoded {} activity records", records.len());

        let events = activity::filter_plays(records)?;
        summary.play_events = events.len();
        tracing::info!("retained {} play events", events.len());

        let users = activity::extract_users(&events);
        summary.users = users.len();
        self.sink.write_users(&users)?;

        let time = activity::extract_time(&events);
        summary.time = time.len();
        self.sink.write_time(&time)?;

        let plays = songplays::build_songplays(&events, &catalog);
        summary.songplays = plays.len();
        summary.matched_plays = plays.iter().filter(|p| p.song_id.is_some()).count();
        self.sink.write_songplays(&plays)?;

        Ok(summary)
    }
}
