use super::{DecodedFrame, VideoReader, FORWARD_DECODE_WINDOW};
use anyhow::{anyhow, Result};
use opencv::{
    prelude::*,
    videoio::{
        VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT, CAP_PROP_FRAME_HEIGHT,
        CAP_PROP_FRAME_WIDTH, CAP_PROP_POS_FRAMES,
    },
};

pub struct OpencvReader {
    capture: VideoCapture,
    source_fps: f64,
    total_frames: usize,
    width: u32,
    height: u32,
}

impl OpencvReader {
    pub fn new(path: &str) -> Result<Self> {
        let capture = VideoCapture::from_file(path, CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(anyhow!("Failed to open video file: {}", path));
        }

        let mut fps = capture.get(CAP_PROP_FPS)?;
        if fps <= 0.0 {
            tracing::warn!("OpencvReader: Failed to get FPS from metadata, falling back to 30.0");
            fps = 30.0;
        }
        let raw_count = capture.get(CAP_PROP_FRAME_COUNT)?.max(0.0) as usize;
        let width = capture.get(CAP_PROP_FRAME_WIDTH)?.max(0.0) as u32;
        let height = capture.get(CAP_PROP_FRAME_HEIGHT)?.max(0.0) as u32;

        tracing::info!(
            "OpencvReader: opened {}, duration={:.2}s, fps={:.2}, stream_frames={}, size={}x{}",
            path,
            raw_count as f64 / fps,
            fps,
            raw_count,
            width,
            height
        );

        Ok(Self {
            capture,
            source_fps: fps,
            total_frames: raw_count,
            width,
            height,
        })
    }

    fn read_next(&mut self) -> Result<Mat> {
        let mut frame = Mat::default();
        let success = self.capture.read(&mut frame)?;
        if !success || frame.empty() {
            return Err(anyhow!("Failed to read frame"));
        }
        Ok(frame)
    }
}

impl VideoReader for OpencvReader {
    fn frame_count(&self) -> Result<usize> {
        Ok(self.total_frames)
    }

    fn source_fps(&self) -> Result<f64> {
        Ok(self.source_fps)
    }

    fn frame_size(&self) -> Result<(u32, u32)> {
        Ok((self.width, self.height))
    }

    fn seek_to_frame(&mut self, frame_num: usize) -> Result<()> {
        if !self.capture.set(CAP_PROP_POS_FRAMES, frame_num as f64)? {
            return Err(anyhow!("Failed to seek to frame {}", frame_num));
        }
        Ok(())
    }

    fn read_frame_at(&mut self, index: usize) -> Result<DecodedFrame> {
        let current = self.capture.get(CAP_PROP_POS_FRAMES)?.max(0.0) as usize;

        if index < current || index - current > FORWARD_DECODE_WINDOW {
            self.seek_to_frame(index)?;
        } else {
            for _ in current..index {
                if !self.capture.grab()? {
                    return Err(anyhow!("Failed to grab frame on the way to {}", index));
                }
            }
        }

        let mat = self.read_next()?;
        Ok(DecodedFrame {
            index,
            timestamp: index as f64 / self.source_fps,
            mat,
        })
    }
}
