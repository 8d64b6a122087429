// ROI preview: crops a handful of frames so the rectangle can be checked by
// eye before committing to a long scan.

use crate::pipeline::crop::crop_roi;
use crate::pipeline::oracle::{LabelOracle, LabelPattern, TesseractOracle};
use crate::run_artifacts::NormalizedRoi;
use crate::run_context::RunContext;
use crate::video::open_reader;
use anyhow::{anyhow, Context, Result};
use opencv::core::Vector;
use opencv::imgcodecs;
use std::path::{Path, PathBuf};

/// Frame indices spread evenly over `[0, total_frames)`, away from both ends.
pub fn preview_positions(total_frames: usize, count: usize) -> Vec<usize> {
    if total_frames == 0 || count == 0 {
        return Vec::new();
    }
    let count = count.min(total_frames);
    (0..count)
        .map(|i| (2 * i + 1) * total_frames / (2 * count))
        .collect()
}

pub fn extract_roi_previews(
    ctx: &RunContext,
    output_dir: &Path,
    frame_count: usize,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;

    let input = ctx.input_str()?;
    let mut reader = open_reader(input, ctx.backend)?;
    let total_frames = reader.frame_count()?;
    let (width, height) = reader.frame_size()?;
    let roi = ctx
        .roi_pixels
        .map(|rect| NormalizedRoi::from_pixels(rect, width, height))
        .unwrap_or_else(NormalizedRoi::full_frame);

    let pattern = LabelPattern::new(&ctx.tag)?;
    let oracle = TesseractOracle::new(ctx.tesseract.clone());

    let mut written = Vec::new();
    for (i, position) in preview_positions(total_frames, frame_count)
        .into_iter()
        .enumerate()
    {
        let frame = match reader.read_frame_at(position) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("preview: failed to read frame {}: {}", position, e);
                continue;
            }
        };

        let crop = crop_roi(&frame.mat, &roi)?;
        let output_path = output_dir.join(format!("roi_{:03}.jpg", i + 1));
        let path_str = output_path
            .to_str()
            .ok_or_else(|| anyhow!("Non UTF-8 preview path"))?;
        imgcodecs::imwrite(path_str, &crop, &Vector::<i32>::new())
            .with_context(|| format!("Failed to write {}", output_path.display()))?;

        match oracle.recognize(&frame.mat, &roi) {
            Ok(candidates) => tracing::info!(
                "preview {} (frame {}, {:.2}s): {:?} -> {:?}",
                output_path.display(),
                position,
                frame.timestamp,
                candidates,
                pattern.extract(&candidates)
            ),
            Err(e) => tracing::warn!("preview: recognition failed on frame {}: {}", position, e),
        }

        written.push(output_path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_positions_spread() {
        assert_eq!(preview_positions(100, 4), vec![12, 37, 62, 87]);
        assert_eq!(preview_positions(3, 5), vec![0, 1, 2]);
        assert!(preview_positions(0, 5).is_empty());
        assert!(preview_positions(10, 0).is_empty());
    }
}
