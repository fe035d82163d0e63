//! FrameSink - the pixel buffer target the scan loop draws into.
//!
//! The sink is a fixed-dimension RGB buffer. Each capture tick copies the
//! stream's current frame into it; the decoder then reads the sink's pixels.
//! The sink never owns the stream or the decoder.

use crate::platform::VideoFrame;
use crate::{CaptureFailure, Dimensions};

const BYTES_PER_PIXEL: usize = 3; // RGB

/// Fixed-dimension RGB pixel buffer.
pub struct FrameSink {
    dimensions: Dimensions,
    pixels: Vec<u8>,
}

impl FrameSink {
    /// Create a sink at the given target dimensions.
    ///
    /// This doubles as the drawing-capability probe: a host without a usable
    /// pixel surface gets `None`, and the scan loop degrades to a
    /// non-functional but non-crashing state.
    pub fn create(dimensions: Dimensions) -> Option<Self> {
        if dimensions.width == 0 || dimensions.height == 0 {
            return None;
        }
        let len = dimensions.width as usize * dimensions.height as usize * BYTES_PER_PIXEL;
        Some(Self {
            dimensions,
            pixels: vec![0u8; len],
        })
    }

    pub fn width(&self) -> u32 {
        self.dimensions.width
    }

    pub fn height(&self) -> u32 {
        self.dimensions.height
    }

    /// The sink's pixel data, row-major RGB.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Copy a video frame into the sink at the sink's dimensions.
    ///
    /// Frames at other dimensions are resampled with nearest-neighbour; an
    /// empty or short frame fails the capture attempt.
    pub fn draw(&mut self, frame: &VideoFrame) -> Result<(), CaptureFailure> {
        if frame.data.is_empty() || frame.width == 0 || frame.height == 0 {
            return Err(CaptureFailure::FrameNotReady);
        }
        let expected = frame.width as usize * frame.height as usize * BYTES_PER_PIXEL;
        if frame.data.len() < expected {
            return Err(CaptureFailure::Draw(format!(
                "short frame: {} bytes for {}x{}",
                frame.data.len(),
                frame.width,
                frame.height
            )));
        }

        if frame.width == self.dimensions.width && frame.height == self.dimensions.height {
            self.pixels.copy_from_slice(&frame.data[..expected]);
            return Ok(());
        }

        // Nearest-neighbour resample into the target dimensions.
        let dst_w = self.dimensions.width as usize;
        let dst_h = self.dimensions.height as usize;
        let src_w = frame.width as usize;
        let src_h = frame.height as usize;
        for dy in 0..dst_h {
            let sy = dy * src_h / dst_h;
            for dx in 0..dst_w {
                let sx = dx * src_w / dst_w;
                let src = (sy * src_w + sx) * BYTES_PER_PIXEL;
                let dst = (dy * dst_w + dx) * BYTES_PER_PIXEL;
                self.pixels[dst..dst + BYTES_PER_PIXEL]
                    .copy_from_slice(&frame.data[src..src + BYTES_PER_PIXEL]);
            }
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, value: u8) -> VideoFrame {
        VideoFrame {
            width,
            height,
            data: vec![value; width as usize * height as usize * BYTES_PER_PIXEL],
        }
    }

    #[test]
    fn zero_dimensions_have_no_surface() {
        assert!(FrameSink::create(Dimensions {
            width: 0,
            height: 480
        })
        .is_none());
    }

    #[test]
    fn draw_copies_matching_frame() {
        let dims = Dimensions {
            width: 4,
            height: 4,
        };
        let mut sink = FrameSink::create(dims).unwrap();
        sink.draw(&solid_frame(4, 4, 7)).unwrap();
        assert!(sink.pixels().iter().all(|&p| p == 7));
    }

    #[test]
    fn draw_resamples_mismatched_frame() {
        let dims = Dimensions {
            width: 2,
            height: 2,
        };
        let mut sink = FrameSink::create(dims).unwrap();
        sink.draw(&solid_frame(8, 8, 9)).unwrap();
        assert_eq!(sink.pixels().len(), 2 * 2 * BYTES_PER_PIXEL);
        assert!(sink.pixels().iter().all(|&p| p == 9));
    }

    #[test]
    fn empty_frame_is_not_ready() {
        let mut sink = FrameSink::create(Dimensions::default()).unwrap();
        let frame = VideoFrame {
            width: 0,
            height: 0,
            data: vec![],
        };
        assert_eq!(sink.draw(&frame), Err(CaptureFailure::FrameNotReady));
    }

    #[test]
    fn short_frame_fails_the_draw() {
        let mut sink = FrameSink::create(Dimensions::default()).unwrap();
        let frame = VideoFrame {
            width: 640,
            height: 480,
            data: vec![0u8; 10],
        };
        assert!(matches!(sink.draw(&frame), Err(CaptureFailure::Draw(_))));
    }
}
