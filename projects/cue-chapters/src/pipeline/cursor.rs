// Sample cursors: one decoder plus the label oracle, addressed by frame index.
//
// A cursor is driven through `&mut self`, so a given instance can only ever
// serve one scan at a time. Independent readers come from `try_clone`.

use crate::error::ScanError;
use crate::pipeline::oracle::{LabelOracle, LabelPattern};
use crate::pipeline::types::{LabeledSample, ScanState};
use crate::run_artifacts::NormalizedRoi;
use crate::video::{open_reader, Backend, VideoReader};
use std::sync::Arc;

pub trait SampleCursor: Send {
    /// Decode the frame at `position` and read its label.
    fn sample(&mut self, position: usize) -> Result<LabeledSample, ScanError>;

    /// Open an independent cursor on the same source with its own position.
    fn try_clone(&self) -> Result<Self, ScanError>
    where
        Self: Sized;
}

/// One oracle call on behalf of a scan: honours cancellation and feeds the
/// progress counters.
pub fn probe<C: SampleCursor + ?Sized>(
    cursor: &mut C,
    position: usize,
    state: &ScanState,
) -> Result<LabeledSample, ScanError> {
    state.ensure_active()?;
    let sample = cursor.sample(position)?;
    state.record_decode();
    tracing::debug!(
        "probe: frame {} ({:.3}s) -> {:?}",
        sample.position,
        sample.timestamp,
        sample.label
    );
    Ok(sample)
}

/// Cursor over a media file, recognizing labels inside a fixed ROI
pub struct VideoCursor {
    path: String,
    backend: Backend,
    /// Opened on first use, so cloning never waits on a decoder
    reader: Option<Box<dyn VideoReader>>,
    oracle: Arc<dyn LabelOracle>,
    pattern: Arc<LabelPattern>,
    roi: NormalizedRoi,
}

impl VideoCursor {
    /// Wraps a reader that is already open on `path`.
    pub fn from_reader(
        path: &str,
        backend: Backend,
        reader: Box<dyn VideoReader>,
        oracle: Arc<dyn LabelOracle>,
        pattern: Arc<LabelPattern>,
        roi: NormalizedRoi,
    ) -> Self {
        Self {
            path: path.to_string(),
            backend,
            reader: Some(reader),
            oracle,
            pattern,
            roi,
        }
    }

    fn reader(&mut self) -> Result<&mut Box<dyn VideoReader>, ScanError> {
        if self.reader.is_none() {
            tracing::debug!("opening {:?} reader on {}", self.backend, self.path);
            let reader =
                open_reader(&self.path, self.backend).map_err(|e| ScanError::open(&self.path, e))?;
            self.reader = Some(reader);
        }
        self.reader
            .as_mut()
            .ok_or_else(|| ScanError::Internal("cursor reader missing".to_string()))
    }
}

impl SampleCursor for VideoCursor {
    fn sample(&mut self, position: usize) -> Result<LabeledSample, ScanError> {
        let frame = self
            .reader()?
            .read_frame_at(position)
            .map_err(|e| ScanError::decode(position, e))?;
        if frame.index != position {
            tracing::debug!(
                "frame {} not in stream, sampled frame {} instead",
                position,
                frame.index
            );
        }
        let candidates = self
            .oracle
            .recognize(&frame.mat, &self.roi)
            .map_err(|e| ScanError::recognition(position, e))?;

        Ok(LabeledSample {
            position,
            timestamp: frame.timestamp,
            label: self.pattern.extract(&candidates),
        })
    }

    /// Cheap: the clone opens its own reader on its first sample.
    fn try_clone(&self) -> Result<Self, ScanError> {
        Ok(Self {
            path: self.path.clone(),
            backend: self.backend,
            reader: None,
            oracle: self.oracle.clone(),
            pattern: self.pattern.clone(),
            roi: self.roi,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::SyntheticCursor;
    use super::*;

    #[test]
    fn test_probe_counts_decodes() {
        let mut cursor = SyntheticCursor::from_runs(&[(0, ""), (3, "Cue 1")], 6);
        let state = ScanState::silent();

        let sample = probe(&mut cursor, 4, &state).unwrap();
        assert_eq!(sample.label, "Cue 1");
        assert_eq!(sample.timestamp, 4.0 / 25.0);
        assert_eq!(state.decode_count(), 1);
    }

    #[test]
    fn test_probe_refuses_after_cancel() {
        let mut cursor = SyntheticCursor::from_runs(&[(0, "Cue 1")], 4);
        let state = ScanState::silent();
        state.cancel();

        assert!(matches!(
            probe(&mut cursor, 0, &state),
            Err(ScanError::Cancelled)
        ));
        assert_eq!(cursor.calls(), 0);
    }

    struct NoText;

    impl LabelOracle for NoText {
        fn recognize(
            &self,
            _raster: &opencv::core::Mat,
            _roi: &NormalizedRoi,
        ) -> anyhow::Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_video_clone_defers_open_to_first_sample() {
        let cursor = VideoCursor {
            path: "/nonexistent/show.mkv".to_string(),
            backend: Backend::Ffmpeg,
            reader: None,
            oracle: Arc::new(NoText),
            pattern: Arc::new(LabelPattern::new("Cue").unwrap()),
            roi: NormalizedRoi::full_frame(),
        };
        let mut clone = cursor.try_clone().unwrap();
        assert!(clone.reader.is_none());
        assert!(matches!(clone.sample(0), Err(ScanError::Open { .. })));
    }

    #[test]
    fn test_past_end_is_decode_error() {
        let mut cursor = SyntheticCursor::from_runs(&[(0, "Cue 1")], 4);
        let state = ScanState::silent();
        assert!(matches!(
            probe(&mut cursor, 4, &state),
            Err(ScanError::Decode { position: 4, .. })
        ));
    }
}
