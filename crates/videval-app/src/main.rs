//! Videval CLI: ingest, cut and manage dataset videos from the command line.
//!
//! Configuration comes from the environment (see `Config::from_env`).

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;
use videval_app::{ingest_video, AppState, Dispatcher, IngestRequest};
use videval_core::{Config, CutInterval};
use videval_worker::{TaskQueue, TaskQueueConfig};

#[derive(Parser)]
#[command(name = "videval", about = "Video dataset segmentation toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Migrate,
    /// Store a video with its tracks, attach it to a dataset and cut it
    Ingest {
        /// Dataset name, created if missing
        #[arg(long)]
        dataset: String,
        #[arg(long)]
        video: PathBuf,
        /// Separate audio track
        #[arg(long)]
        audio: Option<PathBuf>,
        #[arg(long)]
        subtitles: Option<PathBuf>,
        /// Cut intervals as JSON, e.g. '[[0, 10], [15]]'
        #[arg(long)]
        cuts: Option<String>,
        #[arg(long)]
        owner: Option<String>,
    },
    /// Cut a dataset video again, optionally with new intervals
    Recut {
        id: Uuid,
        #[arg(long)]
        cuts: Option<String>,
    },
    /// Move a dataset video's files to the remote tier
    Delocalize { id: Uuid },
    /// Delete a dataset video, its segments and files nothing else uses
    DeleteVideo { id: Uuid },
    /// Delete files no longer referenced
    Vacuum,
    /// Show a dataset video or project with its status messages
    Status { id: Uuid },
}

#[derive(Serialize)]
struct VideoStatus {
    video: videval_core::DatasetVideo,
    segments: Vec<videval_core::Segment>,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

fn parse_cuts(cuts: Option<&str>) -> anyhow::Result<Vec<CutInterval>> {
    match cuts {
        Some(json) => Ok(CutInterval::parse_list(json)?),
        None => Ok(Vec::new()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    videval_infra::init_telemetry(config.log_json)
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    let queue = Arc::new(TaskQueue::new(TaskQueueConfig::from(&config)));
    let state = Arc::new(AppState::from_config(config).await?);
    let dispatcher = Dispatcher::new(state, queue);

    let result = run(cli.command, &dispatcher).await;

    dispatcher.shutdown().await;
    videval_infra::shutdown_telemetry().await;
    result
}

async fn run(command: Commands, dispatcher: &Dispatcher) -> anyhow::Result<()> {
    let state = dispatcher.state();
    match command {
        Commands::Migrate => {
            // AppState applies the schema on startup
            println!("Database schema is up to date");
        }
        Commands::Ingest {
            dataset,
            video,
            audio,
            subtitles,
            cuts,
            owner,
        } => {
            let request = IngestRequest {
                dataset,
                video,
                audio,
                subtitles,
                cut_intervals: parse_cuts(cuts.as_deref())?,
                owner,
            };
            let dataset_video = ingest_video(state, request).await?;
            let segments = dispatcher.segment(dataset_video.id)?.wait().await?;
            print_json(&VideoStatus {
                video: state.videos.require(dataset_video.id).await?,
                segments,
            })?;
        }
        Commands::Recut { id, cuts } => {
            if cuts.is_some() {
                let intervals = parse_cuts(cuts.as_deref())?;
                state.videos.set_cut_intervals(id, &intervals).await?;
            }
            let segments = dispatcher.segment(id)?.wait().await?;
            print_json(&VideoStatus {
                video: state.videos.require(id).await?,
                segments,
            })?;
        }
        Commands::Delocalize { id } => {
            if state.tier().is_none() {
                bail!("REMOTE_LOCATION is not configured");
            }
            let moved = dispatcher.delocalize(id)?.wait().await?;
            println!("Moved {} files to the remote tier", moved);
        }
        Commands::DeleteVideo { id } => {
            let report = state.deletion.delete_dataset_video(id, state.tier()).await?;
            print_json(&report)?;
            if !report.is_success() {
                bail!("{} files could not be deleted", report.failures.len());
            }
        }
        Commands::Vacuum => {
            let report = state.files.vacuum(state.tier()).await?;
            print_json(&report)?;
            if !report.is_success() {
                bail!("{} files could not be deleted", report.failures.len());
            }
        }
        Commands::Status { id } => {
            if let Some(video) = state.videos.get(id).await? {
                let segments = state.segments.list_for_video(id).await?;
                print_json(&VideoStatus { video, segments })?;
            } else if let Some(project) = state.projects.get(id).await? {
                print_json(&project)?;
            } else {
                bail!("No dataset video or project with id {}", id);
            }
        }
    }
    Ok(())
}
