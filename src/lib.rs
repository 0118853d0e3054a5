//! Song playback ETL library.

pub mod config;
pub mod etl;
pub mod models;
pub mod sink;
pub mod source;
