pub mod calibration;
pub mod ffmpeg_reader;
pub mod opencv_reader;

use anyhow::Result;
use clap::ValueEnum;
use opencv::core::Mat;

/// Forward requests closer than this are decoded through instead of seeking.
pub const FORWARD_DECODE_WINDOW: usize = 50;

/// A decoded frame together with where it sits in the stream
pub struct DecodedFrame {
    /// Index actually decoded; later than the requested one when the stream
    /// skips frames
    pub index: usize,
    /// Presentation time in seconds
    pub timestamp: f64,
    pub mat: Mat,
}

pub trait VideoReader: Send {
    fn frame_count(&self) -> Result<usize>;
    fn source_fps(&self) -> Result<f64>;
    fn frame_size(&self) -> Result<(u32, u32)>;
    fn seek_to_frame(&mut self, frame_num: usize) -> Result<()>;
    /// Decode the frame at `index`. Cheap when `index` is at or slightly
    /// past the previous request, a seek otherwise.
    fn read_frame_at(&mut self, index: usize) -> Result<DecodedFrame>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Ffmpeg,
    Opencv,
}

pub fn open_reader(path: &str, backend: Backend) -> Result<Box<dyn VideoReader>> {
    let reader: Box<dyn VideoReader> = match backend {
        Backend::Ffmpeg => Box::new(ffmpeg_reader::FfmpegReader::new(path)?),
        Backend::Opencv => Box::new(opencv_reader::OpencvReader::new(path)?),
    };
    Ok(reader)
}
