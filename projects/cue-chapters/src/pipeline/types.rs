use crate::error::ScanError;
use crate::pipeline::progress::{NoProgress, ProgressObserver};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

/// One oracle answer: the label read at a frame position.
/// An empty label means no tag was recognized there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub position: usize,
    /// Presentation time in seconds
    pub timestamp: f64,
    pub label: String,
}

impl LabeledSample {
    pub fn same_label(&self, other: &LabeledSample) -> bool {
        self.label == other.label
    }
}

/// A range whose two endpoint labels are already known.
#[derive(Debug, Clone)]
pub struct Interval {
    pub left_sample: LabeledSample,
    pub right_sample: LabeledSample,
}

impl Interval {
    pub fn new(left_sample: LabeledSample, right_sample: LabeledSample) -> Self {
        debug_assert!(left_sample.position <= right_sample.position);
        Self {
            left_sample,
            right_sample,
        }
    }

    pub fn left(&self) -> usize {
        self.left_sample.position
    }

    pub fn right(&self) -> usize {
        self.right_sample.position
    }

    pub fn width(&self) -> usize {
        self.right() - self.left()
    }
}

/// Contiguous slice of the frame range handled by one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

/// Output record handed to the exporter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub timestamp: f64,
    pub title: String,
}

/// Counters and control flags shared by every worker of a scan
pub struct ScanState {
    pub total_frames: AtomicUsize,
    pub is_active: AtomicBool,
    pub decodes: AtomicUsize,
    pub transitions: AtomicUsize,
    pub start_time: Instant,
    observer: Box<dyn ProgressObserver>,
}

impl ScanState {
    pub fn new(observer: Box<dyn ProgressObserver>) -> Self {
        Self {
            total_frames: AtomicUsize::new(0),
            is_active: AtomicBool::new(true),
            decodes: AtomicUsize::new(0),
            transitions: AtomicUsize::new(0),
            start_time: Instant::now(),
            observer,
        }
    }

    pub fn silent() -> Self {
        Self::new(Box::new(NoProgress))
    }

    pub fn ensure_active(&self) -> Result<(), ScanError> {
        if self.is_active.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(ScanError::Cancelled)
        }
    }

    pub fn cancel(&self) {
        self.is_active.store(false, Ordering::Relaxed);
    }

    pub fn record_decode(&self) {
        self.decodes.fetch_add(1, Ordering::Relaxed);
        self.report_counts();
    }

    pub fn record_transitions(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.transitions.fetch_add(count, Ordering::Relaxed);
        self.report_counts();
    }

    pub fn decode_count(&self) -> usize {
        self.decodes.load(Ordering::Relaxed)
    }

    pub fn report(&self, message: &str) {
        self.observer.report(message);
    }

    fn report_counts(&self) {
        self.observer.report(&format!(
            "Decoded Frames: {}, Cues Found: {}",
            self.decodes.load(Ordering::Relaxed),
            self.transitions.load(Ordering::Relaxed)
        ));
    }
}
