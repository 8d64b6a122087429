// Chapter export: stream-copy remux of the input with chapter metadata added.

use crate::error::ScanError;
use crate::pipeline::types::{Chapter, ScanState};
use anyhow::{anyhow, Context, Result};
use ffmpeg_next::{codec, encoder, ffi, format, media, Rational};
use std::path::Path;

/// Chapter time base: milliseconds
const CHAPTER_TIME_BASE: (i32, i32) = (1, 1000);

/// `(start_ms, end_ms)` per chapter. A chapter ends where the next one
/// starts; the last one ends at the media duration, or one second after its
/// start when the duration is unknown or shorter.
pub fn chapter_spans(chapters: &[Chapter], duration_secs: f64) -> Vec<(i64, i64)> {
    let to_ms = |secs: f64| (secs.max(0.0) * 1000.0).round() as i64;
    let starts: Vec<i64> = chapters.iter().map(|c| to_ms(c.timestamp)).collect();
    let media_end = to_ms(duration_secs);

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = match starts.get(i + 1) {
                Some(&next) => next,
                None if media_end > start => media_end,
                None => start + 1000,
            };
            (start, end)
        })
        .collect()
}

/// Writes `output`: every audio, video and subtitle stream of `input`
/// copied untouched, container metadata preserved, `chapters` embedded.
pub fn export_chapters(
    input: &Path,
    output: &Path,
    chapters: &[Chapter],
    state: &ScanState,
) -> Result<(), ScanError> {
    tracing::info!(
        "exporting {} chapters to {}",
        chapters.len(),
        output.display()
    );
    state.ensure_active()?;
    state.report("beginning export - this could take a while");

    remux_with_chapters(input, output, chapters, state).map_err(|e| {
        match e.downcast::<ScanError>() {
            Ok(scan_error) => scan_error,
            Err(e) => ScanError::export(output.to_string_lossy(), e),
        }
    })?;

    state.report("export complete");
    tracing::info!("export complete: {}", output.display());
    Ok(())
}

/// Per-packet bookkeeping of the copy loop: whole-percent progress against
/// the media duration, and cancellation.
struct ExportProgress<'a> {
    state: &'a ScanState,
    duration_secs: f64,
    last_percent: u32,
}

impl<'a> ExportProgress<'a> {
    fn new(state: &'a ScanState, duration_secs: f64) -> Self {
        Self {
            state,
            duration_secs,
            last_percent: 0,
        }
    }

    fn packet(&mut self, position_secs: Option<f64>) -> Result<(), ScanError> {
        self.state.ensure_active()?;
        if self.duration_secs <= 0.0 {
            return Ok(());
        }
        if let Some(secs) = position_secs {
            let percent = ((secs / self.duration_secs) * 100.0).clamp(0.0, 100.0) as u32;
            if percent > self.last_percent {
                self.last_percent = percent;
                self.state
                    .report(&format!("export progress: {}%", percent));
            }
        }
        Ok(())
    }
}

fn remux_with_chapters(
    input: &Path,
    output: &Path,
    chapters: &[Chapter],
    state: &ScanState,
) -> Result<()> {
    ffmpeg_next::init().context("Failed to initialize FFmpeg")?;

    let mut ictx = format::input(&input).context("Failed to open input for export")?;
    let mut octx = format::output(&output).context("Failed to create output file")?;

    let copied = copy_with_chapters(&mut ictx, &mut octx, chapters, state);
    if copied.is_err() {
        // Close the output before removing what was written so far
        drop(octx);
        if let Err(e) = std::fs::remove_file(output) {
            tracing::warn!("failed to remove partial {}: {}", output.display(), e);
        }
    }
    copied
}

fn copy_with_chapters(
    ictx: &mut format::context::Input,
    octx: &mut format::context::Output,
    chapters: &[Chapter],
    state: &ScanState,
) -> Result<()> {
    let duration_secs = if ictx.duration() > 0 {
        ictx.duration() as f64 / ffi::AV_TIME_BASE as f64
    } else {
        0.0
    };

    // Input stream index -> output stream index, None for dropped streams
    let mut stream_mapping: Vec<Option<usize>> = Vec::new();
    let mut in_time_bases: Vec<Rational> = Vec::new();
    for ist in ictx.streams() {
        in_time_bases.push(ist.time_base());
        let medium = ist.parameters().medium();
        if !matches!(
            medium,
            media::Type::Video | media::Type::Audio | media::Type::Subtitle
        ) {
            stream_mapping.push(None);
            continue;
        }

        let mut ost = octx
            .add_stream(encoder::find(codec::Id::None))
            .context("Failed to add output stream")?;
        ost.set_parameters(ist.parameters());
        // Let the muxer pick a tag valid for the output container
        unsafe {
            (*ost.parameters().as_mut_ptr()).codec_tag = 0;
        }
        stream_mapping.push(Some(ost.index()));
    }

    octx.set_metadata(ictx.metadata().to_owned());

    let time_base = Rational::new(CHAPTER_TIME_BASE.0, CHAPTER_TIME_BASE.1);
    for (id, (chapter, (start, end))) in chapters
        .iter()
        .zip(chapter_spans(chapters, duration_secs))
        .enumerate()
    {
        octx.add_chapter(id as i64, time_base, start, end, &chapter.title)
            .with_context(|| format!("Failed to add chapter {:?}", chapter.title))?;
    }

    octx.write_header().context("Failed to write output header")?;

    let out_time_bases: Vec<Rational> = octx.streams().map(|s| s.time_base()).collect();
    let mut packet = ffmpeg_next::codec::packet::Packet::empty();
    let mut progress = ExportProgress::new(state, duration_secs);

    loop {
        match packet.read(ictx) {
            Ok(()) => {}
            Err(ffmpeg_next::Error::Eof) => break,
            Err(e) => return Err(anyhow!("Failed to read packet: {}", e)),
        }

        let ist_index = packet.stream();
        let Some(ost_index) = stream_mapping.get(ist_index).copied().flatten() else {
            continue;
        };

        let in_tb = in_time_bases[ist_index];
        let position_secs = packet
            .pts()
            .map(|pts| pts as f64 * in_tb.numerator() as f64 / in_tb.denominator() as f64);
        progress.packet(position_secs)?;

        packet.rescale_ts(in_tb, out_time_bases[ost_index]);
        packet.set_position(-1);
        packet.set_stream(ost_index);
        packet
            .write_interleaved(octx)
            .context("Failed to write packet")?;
    }

    octx.write_trailer().context("Failed to write output trailer")?;
    Ok(())
}
