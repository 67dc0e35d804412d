use std::fs::File;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, Level};

use foldrun::cli::{Cli, Command};
use foldrun::jobs::{InMemoryJobStore, JobStatus, JobSupervisor, SubmitRequest};
use foldrun::selection;
use foldrun::tools::{alphafold, proteinmpnn};
use foldrun::{ArchiveMode, Config};

const POLL_INTERVAL: Duration = Duration::from_secs(2);
const FAILURE_LOG_TAIL: usize = 50;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level: Level = cli.log_level.parse().unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    if let Err(e) = run(cli).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Command::Selection { structure, spec } => {
            let available = selection::enumerate_residues(&structure)?;
            let selected = selection::parse_spec(&spec, &available);
            let payload = selection::freeze_payload(&structure, &selected);
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        }
        Command::Fold {
            input,
            model_preset,
            db_preset,
            max_template_date,
            download,
            mode,
        } => {
            let request = SubmitRequest::ContainerPipeline {
                upload: input,
                params: alphafold::AlphaFoldParams {
                    model_preset: model_preset.into(),
                    db_preset: db_preset.into(),
                    max_template_date,
                },
            };
            supervise(config, request, download, mode.into()).await
        }
        Command::Design {
            input,
            model_name,
            num_seqs,
            batch_size,
            sampling_temp,
            freeze,
            download,
            mode,
        } => {
            let request = SubmitRequest::DirectScript {
                upload: input,
                params: proteinmpnn::ProteinMpnnParams {
                    model: model_name.parse()?,
                    num_seqs,
                    batch_size,
                    sampling_temp,
                    freeze_spec: freeze,
                },
            };
            supervise(config, request, download, mode.into()).await
        }
    }
}

/// Submit one job, wait for it to terminate, then report and optionally
/// download the archive.
async fn supervise(
    config: Config,
    request: SubmitRequest,
    download: Option<std::path::PathBuf>,
    mode: ArchiveMode,
) -> anyhow::Result<()> {
    let supervisor = JobSupervisor::new(config, Arc::new(InMemoryJobStore::new()));

    let job = supervisor.submit(&request)?;
    info!(job = %job.id, "submitted");

    let report = supervisor.wait_for_terminal(&job.id, POLL_INTERVAL).await?;
    match report.status {
        JobStatus::Finished => info!(job = %job.id, "finished"),
        _ => {
            error!(job = %job.id, exit_code = ?report.exit_code, "job failed");
            let tail = supervisor.logs(&job.id, FAILURE_LOG_TAIL)?;
            eprintln!("{tail}");
            std::process::exit(1);
        }
    }

    if let Some(dest) = download {
        let file = File::create(&dest)?;
        supervisor.download_to(&job.id, mode, file)?;
        info!(archive = %dest.display(), "archive written");
    }
    Ok(())
}
