//! Songlake: batch ETL from playback logs to a partitioned star schema.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use songlake::config::{AwsCredentials, EtlConfig};
use songlake::etl::Pipeline;

/// Transform song-catalog and playback-log documents into a partitioned
/// parquet star schema.
#[derive(Parser)]
#[command(name = "songlake")]
#[command(about = "Transform song catalog and playback logs into a star schema")]
struct Cli {
    /// Root of the input tree (expects song_data/ and log_data/ below it)
    #[arg(short, long, default_value = "data")]
    input_root: String,

    /// Root of the output tree (one directory per relation)
    #[arg(short, long, default_value = "data_output")]
    output_root: String,
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "songlake=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Optional .env next to the binary; deployed environments set the
    // variables directly.
    dotenvy::dotenv().ok();

    let credentials = match AwsCredentials::from_env() {
        Ok(creds) => creds,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };
    tracing::debug!(?credentials, "loaded storage credentials");

    let config = EtlConfig::new(&cli.input_root, &cli.output_root, credentials);
    let pipeline = Pipeline::new(config);

    match pipeline.run() {
        Ok(summary) => {
            println!("\nRun complete:");
            println!("  Catalog records:  {}", summary.catalog_records);
            println!("  Activity records: {}", summary.activity_records);
            println!("  Play events:      {}", summary.play_events);
            println!("  Songs rows:       {}", summary.songs);
            println!("  Artists rows:     {}", summary.artists);
            println!("  Users rows:       {}", summary.users);
            println!("  Time rows:        {}", summary.time);
            println!(
                "  Songplays rows:   {} ({} matched)",
                summary.songplays, summary.matched_plays
            );
        }
        Err(e) => {
            eprintln!("ETL run failed: {e}");
            std::process::exit(1);
        }
    }
}
