//! `devcamper-seed`: load or wipe fixture data. Run while the server is stopped.

use clap::{Parser, Subcommand};
use devcamper_core::config;
use devcamper_core::model::ensure_collections;
use devcamper_core::storage::{open_database, snapshot_database};
use devcamper_server::geocoder::GeocoderArgs;
use devcamper_server::seed::{destroy_data, import_data, read_records};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "devcamper-seed", about = "Import or delete DevCamper fixture data")]
struct Args {
    /// Data directory for snapshots and the write-ahead log
    #[arg(short, long, env = "DATA_DIR", default_value = config::DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import bootcamps.json and courses.json
    Import {
        /// Directory holding the fixture files
        #[arg(long, default_value = "_data")]
        from: PathBuf,

        #[command(flatten)]
        geocoder: GeocoderArgs,
    },
    /// Delete every bootcamp and course
    Destroy,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::from_path("config/config.env").ok();
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(
                    "devcamper_server=info"
                        .parse()
                        .expect("valid directive literal"),
                )
                .add_directive(
                    "devcamper_core=info"
                        .parse()
                        .expect("valid directive literal"),
                ),
        )
        .init();

    let args = Args::parse();
    let (db, _) = open_database(&args.data_dir)?;
    ensure_collections(&db)?;

    match args.command {
        Command::Import { from, geocoder } => {
            let geocoder = geocoder.build()?;
            let bootcamps = read_records(&from.join("bootcamps.json"))?;
            let courses = read_records(&from.join("courses.json"))?;
            let report = import_data(&db, geocoder.as_ref(), bootcamps, courses).await?;
            println!(
                "Data imported: {} bootcamps, {} courses ({} without location)",
                report.bootcamps, report.courses, report.ungeocoded
            );
        }
        Command::Destroy => {
            let (bootcamps, courses) = destroy_data(&db)?;
            println!("Data deleted: {bootcamps} bootcamps, {courses} courses");
        }
    }

    let saved = snapshot_database(&db, &args.data_dir)?;
    tracing::info!(collections = saved, "Snapshot written");
    Ok(())
}
