use super::{DecodedFrame, VideoReader, FORWARD_DECODE_WINDOW};
use anyhow::{anyhow, Context, Result};
use opencv::{core, prelude::*};
use std::path::Path;

use ffmpeg_next::ffi;

/// Video reader backed by FFmpeg via ffmpeg-next.
///
/// Frames are addressed by index; the index of every decoded frame is
/// derived from its presentation timestamp, so a seek (which lands on the
/// preceding keyframe) followed by a decode-forward always stops on the
/// requested frame.
pub struct FfmpegReader {
    input_ctx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::codec::decoder::Video,
    video_stream_index: usize,
    /// Lazily created on first frame (source format is only known then).
    scaler: Option<ffmpeg_next::software::scaling::Context>,
    width: u32,
    height: u32,
    source_fps: f64,
    /// Seconds per stream timestamp tick
    time_base: f64,
    start_pts: i64,
    total_frames: usize,
    /// Index of the frame the decoder will hand out next
    next_index: usize,
    reuse_packet: ffmpeg_next::codec::packet::Packet,
    /// Whether we've sent EOF to the decoder.
    eof_sent: bool,
}

// SAFETY: a reader is owned by exactly one cursor, and a cursor is driven by
// one thread at a time. The raw pointers inside ffmpeg-next types are never
// shared.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new(path: &str) -> Result<Self> {
        ffmpeg_next::init().context("Failed to initialize FFmpeg")?;

        let source = Path::new(path);
        if !source.exists() {
            return Err(anyhow!("Video file not found: {}", path));
        }

        let input_ctx = ffmpeg_next::format::input(&source).context("Failed to open video file")?;

        let video_stream = input_ctx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| anyhow!("No video stream found in {}", path))?;

        let video_stream_index = video_stream.index();

        let rational_fps = video_stream.avg_frame_rate();
        let source_fps = if rational_fps.denominator() > 0 && rational_fps.numerator() > 0 {
            rational_fps.numerator() as f64 / rational_fps.denominator() as f64
        } else {
            tracing::warn!("FfmpegReader: could not determine FPS, defaulting to 30.0");
            30.0
        };

        let tb = video_stream.time_base();
        let time_base = if tb.denominator() > 0 {
            tb.numerator() as f64 / tb.denominator() as f64
        } else {
            1.0 / source_fps
        };
        let start_pts = match video_stream.start_time() {
            ffi::AV_NOPTS_VALUE => 0,
            pts => pts,
        };

        let stream_frames = video_stream.frames().max(0) as usize;
        let stream_duration = match video_stream.duration() {
            d if d == ffi::AV_NOPTS_VALUE || d <= 0 => None,
            d => Some(d as f64 * time_base),
        };
        let container_duration = match input_ctx.duration() {
            d if d == ffi::AV_NOPTS_VALUE || d <= 0 => None,
            d => Some(d as f64 / ffi::AV_TIME_BASE as f64),
        };
        let duration_secs = stream_duration.or(container_duration).unwrap_or(0.0);
        let total_frames =
            estimate_frame_count(stream_frames, stream_duration, container_duration, source_fps);

        tracing::info!(
            "FfmpegReader: opened {}, duration={:.2}s, fps={:.2}, stream_frames={}, total={}",
            path,
            duration_secs,
            source_fps,
            stream_frames,
            total_frames
        );

        let decoder_ctx =
            ffmpeg_next::codec::context::Context::from_parameters(video_stream.parameters())
                .context("Failed to create decoder context")?;
        let decoder = decoder_ctx
            .decoder()
            .video()
            .context("Failed to open video decoder")?;

        let width = decoder.width();
        let height = decoder.height();
        tracing::debug!("FfmpegReader: software decoding ({}x{})", width, height);

        Ok(Self {
            input_ctx,
            decoder,
            video_stream_index,
            scaler: None,
            width,
            height,
            source_fps,
            time_base,
            start_pts,
            total_frames,
            next_index: 0,
            reuse_packet: ffmpeg_next::codec::packet::Packet::empty(),
            eof_sent: false,
        })
    }

    /// Pull the next decoded frame out of the stream, feeding packets as needed.
    fn decode_loop(&mut self, target_frame: &mut ffmpeg_next::util::frame::Video) -> Result<()> {
        loop {
            match self.decoder.receive_frame(target_frame) {
                Ok(()) => return Ok(()),
                Err(ffmpeg_next::Error::Other { errno: ffi::EAGAIN }) => {
                    if self.eof_sent {
                        return Err(anyhow!("End of stream"));
                    }
                }
                Err(ffmpeg_next::Error::Eof) => {
                    return Err(anyhow!("End of stream"));
                }
                Err(e) => return Err(anyhow!("Decoder error: {}", e)),
            }

            if self.eof_sent {
                return Err(anyhow!("End of stream"));
            }

            let mut found_packet = false;
            while self.reuse_packet.read(&mut self.input_ctx).is_ok() {
                if self.reuse_packet.stream() == self.video_stream_index {
                    self.decoder
                        .send_packet(&self.reuse_packet)
                        .context("Failed to send packet to decoder")?;
                    found_packet = true;
                    break;
                }
            }

            if !found_packet {
                // Input exhausted: flush the frames still buffered in the decoder
                self.decoder
                    .send_eof()
                    .context("Failed to send EOF to decoder")?;
                self.eof_sent = true;
            }
        }
    }

    fn index_of(&self, frame: &ffmpeg_next::util::frame::Video) -> usize {
        match frame.timestamp().or_else(|| frame.pts()) {
            Some(pts) => {
                let secs = (pts - self.start_pts) as f64 * self.time_base;
                (secs * self.source_fps).round().max(0.0) as usize
            }
            None => self.next_index,
        }
    }

    /// Decode forward until the frame at or past `target` comes out; returns
    /// its index alongside it.
    fn decode_until(&mut self, target: usize) -> Result<(usize, ffmpeg_next::util::frame::Video)> {
        let mut frame = ffmpeg_next::util::frame::Video::empty();
        loop {
            self.decode_loop(&mut frame)?;
            let index = self.index_of(&frame);
            self.next_index = index + 1;
            if index >= target {
                if index > target {
                    tracing::debug!(
                        "FfmpegReader: frame {} missing from stream, using {}",
                        target,
                        index
                    );
                }
                return Ok((index, frame));
            }
        }
    }

    fn get_or_create_scaler(
        &mut self,
        src_format: ffmpeg_next::format::Pixel,
    ) -> Result<&mut ffmpeg_next::software::scaling::Context> {
        let (width, height) = (self.width, self.height);
        let scaler = match self.scaler.take() {
            Some(scaler) => scaler,
            None => ffmpeg_next::software::scaling::Context::get(
                src_format,
                width,
                height,
                ffmpeg_next::format::Pixel::BGR24,
                width,
                height,
                ffmpeg_next::software::scaling::Flags::BILINEAR,
            )
            .context("Failed to create scaler")?,
        };
        Ok(self.scaler.insert(scaler))
    }

    fn to_bgr(
        &mut self,
        frame: &ffmpeg_next::util::frame::Video,
    ) -> Result<ffmpeg_next::util::frame::Video> {
        let scaler = self.get_or_create_scaler(frame.format())?;
        let mut bgr = ffmpeg_next::util::frame::Video::empty();
        scaler.run(frame, &mut bgr).context("Scaler failed")?;
        Ok(bgr)
    }
}

/// Frame count of the video stream. Without a stored count it is estimated
/// from the video stream's own duration before the container's, which also
/// spans longer audio tracks. Rounded down so the last index is decodable.
fn estimate_frame_count(
    stream_frames: usize,
    stream_duration_secs: Option<f64>,
    container_duration_secs: Option<f64>,
    fps: f64,
) -> usize {
    if stream_frames > 0 {
        return stream_frames;
    }
    match stream_duration_secs.or(container_duration_secs) {
        Some(secs) if secs > 0.0 => (secs * fps).floor() as usize,
        _ => 0,
    }
}

/// Convert a BGR24 ffmpeg frame to an OpenCV Mat.
/// The Mat owns a copy of the pixels so it outlives the ffmpeg frame.
fn bgr_frame_to_mat(frame: &ffmpeg_next::util::frame::Video) -> Result<core::Mat> {
    let width = frame.width() as i32;
    let height = frame.height() as i32;
    let data = frame.data(0);
    let stride = frame.stride(0);
    let row_bytes = width as usize * 3;

    let mut mat = unsafe { core::Mat::new_rows_cols(height, width, core::CV_8UC3)? };

    for y in 0..height as usize {
        let src_offset = y * stride;
        let src_row = &data[src_offset..src_offset + row_bytes];
        let dst_ptr = mat.ptr_mut(y as i32)?;
        unsafe {
            std::ptr::copy_nonoverlapping(src_row.as_ptr(), dst_ptr, row_bytes);
        }
    }

    Ok(mat)
}

impl VideoReader for FfmpegReader {
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
        let time_secs = frame_num as f64 / self.source_fps;
        let timestamp = (time_secs * ffi::AV_TIME_BASE as f64) as i64;
        self.input_ctx
            .seek(timestamp, ..timestamp)
            .context("Failed to seek")?;
        self.decoder.flush();
        self.eof_sent = false;
        self.scaler = None; // format might change after a seek
        // Real position is only known once the next frame is decoded
        self.next_index = 0;
        Ok(())
    }

    fn read_frame_at(&mut self, index: usize) -> Result<DecodedFrame> {
        if index >= self.total_frames {
            return Err(anyhow!(
                "Frame {} is out of bounds ({} frames)",
                index,
                self.total_frames
            ));
        }

        if index < self.next_index || index - self.next_index > FORWARD_DECODE_WINDOW {
            self.seek_to_frame(index)?;
        }

        let (decoded_index, raw) = self.decode_until(index)?;
        let timestamp = match raw.timestamp().or_else(|| raw.pts()) {
            Some(pts) => (pts - self.start_pts) as f64 * self.time_base,
            None => decoded_index as f64 / self.source_fps,
        };
        let bgr = self.to_bgr(&raw)?;
        let mat = bgr_frame_to_mat(&bgr)?;

        Ok(DecodedFrame {
            index: decoded_index,
            timestamp,
            mat,
        })
    }
}
