// Run artifact struct definitions
//
// Values that are persisted as JSON next to a run's output.

use crate::pipeline::types::{Chapter, LabeledSample};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Region of interest in normalized coordinates [0, 1], origin bottom-left
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct NormalizedRoi {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl NormalizedRoi {
    pub fn full_frame() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        }
    }

    /// Converts a pixel rectangle with a top-left origin.
    /// A zero-sized rectangle selects the whole frame.
    pub fn from_pixels(rect: [u32; 4], frame_width: u32, frame_height: u32) -> Self {
        let [x, y, w, h] = rect;
        if w == 0 || h == 0 || frame_width == 0 || frame_height == 0 {
            return Self::full_frame();
        }
        let fw = frame_width as f32;
        let fh = frame_height as f32;
        Self {
            x: x as f32 / fw,
            y: 1.0 - (y as f32 + h as f32) / fh,
            width: w as f32 / fw,
            height: h as f32 / fh,
        }
        .clamped()
    }

    fn clamped(self) -> Self {
        let x = self.x.clamp(0.0, 1.0);
        let y = self.y.clamp(0.0, 1.0);
        Self {
            x,
            y,
            width: self.width.clamp(0.0, 1.0 - x),
            height: self.height.clamp(0.0, 1.0 - y),
        }
    }
}

/// Summary of one chaptering run
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScanReport {
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub created_at: DateTime<Utc>,
    pub roi: NormalizedRoi,
    pub accuracy: usize,
    pub batch_count: usize,
    pub total_frames: usize,
    pub fps: f64,
    pub decodes: usize,
    pub elapsed_secs: f64,
    pub transitions: Vec<LabeledSample>,
    pub chapters: Vec<Chapter>,
}

impl ScanReport {
    pub fn write(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
