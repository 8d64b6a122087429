mod cli;
mod error;
mod export;
mod pipeline;
mod run_artifacts;
mod run_context;
mod video;

use anyhow::{Context, Result};
use cli::Args;
use pipeline::finalize::chapter_listing;
use pipeline::orchestrator;
use pipeline::progress::SpinnerProgress;
use pipeline::types::ScanState;
use run_context::RunContext;
use std::sync::Arc;
use std::time::Duration;

/// Frames cropped by `--preview-dir`
const PREVIEW_FRAMES: usize = 5;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let args = Args::parse_args();
    let ctx = RunContext::from_args(&args)?;

    if let Some(dir) = &args.preview_dir {
        let written = video::calibration::extract_roi_previews(&ctx, dir, PREVIEW_FRAMES)?;
        println!("Wrote {} ROI previews to {}", written.len(), dir.display());
        return Ok(());
    }

    let spinner = SpinnerProgress::new()?;
    let state = Arc::new(ScanState::new(Box::new(spinner.clone())));

    let worker_state = state.clone();
    let mut scan = tokio::task::spawn_blocking(move || orchestrator::run(&ctx, &worker_state));

    let timeout = async {
        match args.timeout_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };

    let joined = tokio::select! {
        joined = &mut scan => joined,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted, cancelling scan");
            state.cancel();
            scan.await
        }
        _ = timeout => {
            tracing::warn!("timeout reached, cancelling scan");
            state.cancel();
            scan.await
        }
    };
    spinner.finish();

    let report = joined.context("scan worker panicked")??;

    if report.chapters.is_empty() {
        println!("No chapters found");
    } else {
        println!("{}", chapter_listing(&report.chapters));
    }
    if let Some(output) = &report.output {
        println!("Chaptered copy written to {}", output);
    }

    Ok(())
}
