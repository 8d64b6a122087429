// Batch coordinator: splits the frame range into batches, scans them on
// parallel workers and merges their transitions into one ordered list.
//
// Endpoint probes for all batches go through one shared cursor behind a
// mutex; a batch that needs bisection clones its own cursor.

use crate::error::ScanError;
use crate::export::export_chapters;
use crate::pipeline::bisect;
use crate::pipeline::cursor::{probe, SampleCursor, VideoCursor};
use crate::pipeline::finalize::consolidate;
use crate::pipeline::oracle::{LabelPattern, TesseractOracle};
use crate::pipeline::types::{Batch, Interval, LabeledSample, ScanState};
use crate::run_artifacts::{NormalizedRoi, ScanReport};
use crate::run_context::RunContext;
use crate::video::open_reader;
use crossbeam::channel::{self, Receiver};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

/// Splits `[0, total_frames - 1]` into at most `batch_count` contiguous
/// batches of equal width; the last one absorbs the remainder.
pub fn plan_batches(total_frames: usize, batch_count: usize) -> Vec<Batch> {
    if total_frames == 0 {
        return Vec::new();
    }
    let count = batch_count.clamp(1, total_frames);
    let width = total_frames / count;

    (0..count)
        .map(|index| Batch {
            index,
            start: index * width,
            end: if index + 1 == count {
                total_frames - 1
            } else {
                (index + 1) * width - 1
            },
        })
        .collect()
}

fn lock_shared<C>(shared: &Mutex<C>) -> Result<MutexGuard<'_, C>, ScanError> {
    shared
        .lock()
        .map_err(|_| ScanError::Internal("shared cursor mutex poisoned".to_string()))
}

/// Scans one batch. Always emits the batch's first sample; cross-batch
/// duplicates are left to the consolidator.
fn scan_batch<C: SampleCursor>(
    shared: &Mutex<C>,
    batch: Batch,
    accuracy: usize,
    state: &ScanState,
) -> Result<Vec<LabeledSample>, ScanError> {
    let first = probe(&mut *lock_shared(shared)?, batch.start, state)?;
    let last = if batch.end == batch.start {
        first.clone()
    } else {
        probe(&mut *lock_shared(shared)?, batch.end, state)?
    };

    if first.same_label(&last) {
        tracing::debug!(
            "batch {} [{}..{}] is a single run {:?}",
            batch.index,
            batch.start,
            batch.end,
            first.label
        );
        return Ok(vec![first]);
    }

    // Clone only copies the open parameters; the decoder opens in this worker
    let mut cursor = lock_shared(shared)?.try_clone()?;
    let outcome = bisect::scan(&mut cursor, &Interval::new(first, last), accuracy, state)?;

    let closes_on_new_run = !outcome.right.same_label(&outcome.left);
    let mut emitted = Vec::with_capacity(outcome.transitions.len() + 2);
    emitted.push(outcome.left);
    emitted.extend(outcome.transitions);
    if closes_on_new_run {
        emitted.push(outcome.right);
    }
    Ok(emitted)
}

fn collect_batches(
    rx: Receiver<(usize, Result<Vec<LabeledSample>, ScanError>)>,
) -> Result<Vec<LabeledSample>, ScanError> {
    let mut merged = Vec::new();
    let mut failure: Option<ScanError> = None;

    // Completion order, not batch order
    for (index, result) in rx {
        match result {
            Ok(samples) => {
                tracing::info!("batch {} finished with {} samples", index, samples.len());
                merged.extend(samples);
            }
            Err(e) => {
                tracing::debug!("batch {} failed: {}", index, e);
                // Keep the root cause over the cancellations it triggered
                if matches!(failure, None | Some(ScanError::Cancelled)) {
                    failure = Some(e);
                }
            }
        }
    }

    match failure {
        Some(e) => Err(e),
        None => {
            merged.sort_by_key(|s| s.position);
            Ok(merged)
        }
    }
}

/// Runs every batch concurrently and returns all emitted samples sorted by
/// position. Any failing batch cancels the others and fails the whole scan.
pub fn execute<C: SampleCursor>(
    shared: C,
    total_frames: usize,
    batch_count: usize,
    accuracy: usize,
    state: &ScanState,
) -> Result<Vec<LabeledSample>, ScanError> {
    if accuracy == 0 {
        return Err(ScanError::InvalidConfig(
            "accuracy must be at least 1".to_string(),
        ));
    }
    if batch_count == 0 {
        return Err(ScanError::InvalidConfig(
            "batch count must be at least 1".to_string(),
        ));
    }

    let batches = plan_batches(total_frames, batch_count);
    tracing::info!(
        "scanning {} frames in {} batches (accuracy {})",
        total_frames,
        batches.len(),
        accuracy
    );

    let shared = Mutex::new(shared);
    let (tx, rx) = channel::unbounded();

    thread::scope(|scope| {
        for batch in &batches {
            let tx = tx.clone();
            let shared = &shared;
            let batch = *batch;
            scope.spawn(move || {
                let result = scan_batch(shared, batch, accuracy, state);
                if result.is_err() {
                    state.cancel();
                }
                // Receiver outlives every worker
                let _ = tx.send((batch.index, result));
            });
        }
        drop(tx);
        collect_batches(rx)
    })
}

/// Full run: open the media, scan, consolidate and export.
pub fn run(ctx: &RunContext, state: &ScanState) -> Result<ScanReport, ScanError> {
    let input = ctx.input_str()?;
    let reader = open_reader(input, ctx.backend).map_err(|e| ScanError::open(input, e))?;
    let open_err = |e| ScanError::open(input, e);
    let total_frames = reader.frame_count().map_err(open_err)?;
    let fps = reader.source_fps().map_err(open_err)?;
    let (width, height) = reader.frame_size().map_err(open_err)?;
    if total_frames == 0 {
        return Err(ScanError::open(
            input,
            anyhow::anyhow!("video track has no frames"),
        ));
    }

    let roi = ctx
        .roi_pixels
        .map(|rect| NormalizedRoi::from_pixels(rect, width, height))
        .unwrap_or_else(NormalizedRoi::full_frame);
    tracing::info!("region of interest (normalized, bottom-left origin): {:?}", roi);

    let pattern = LabelPattern::new(&ctx.tag).map_err(|e| ScanError::InvalidConfig(e.to_string()))?;
    let oracle = Arc::new(TesseractOracle::new(ctx.tesseract.clone()));
    let cursor = VideoCursor::from_reader(
        input,
        ctx.backend,
        reader,
        oracle,
        Arc::new(pattern),
        roi,
    );

    state.total_frames.store(total_frames, Ordering::Relaxed);
    let transitions = execute(cursor, total_frames, ctx.batch_count, ctx.accuracy, state)?;
    state.report("scan complete");

    let chapters = consolidate(&transitions);
    tracing::info!(
        "scan complete: {} decodes, {} transitions, {} chapters in {:.1}s",
        state.decode_count(),
        transitions.len(),
        chapters.len(),
        state.start_time.elapsed().as_secs_f64()
    );

    let output = if ctx.dry_run {
        None
    } else {
        export_chapters(&ctx.input, &ctx.output, &chapters, state)?;
        Some(ctx.output.to_string_lossy().into_owned())
    };

    let report = ScanReport {
        input: input.to_string(),
        output,
        created_at: chrono::Utc::now(),
        roi,
        accuracy: ctx.accuracy,
        batch_count: ctx.batch_count,
        total_frames,
        fps,
        decodes: state.decode_count(),
        elapsed_secs: state.start_time.elapsed().as_secs_f64(),
        transitions,
        chapters,
    };

    if let Some(path) = &ctx.report_path {
        report
            .write(path)
            .map_err(|e| ScanError::export(path.to_string_lossy(), e))?;
        tracing::info!("scan report written to {}", path.display());
    }

    Ok(report)
}
