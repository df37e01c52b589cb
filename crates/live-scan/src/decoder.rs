//! Frame decoders.

use crate::error::DecodeWarning;
use crate::media::Frame;

/// Position in video-pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A decoded code and, when the backend reports them, its corner points.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub text: String,
    pub points: Vec<Point>,
}

impl Detection {
    pub fn new(text: impl Into<String>, points: Vec<Point>) -> Self {
        Self {
            text: text.into(),
            points,
        }
    }
}

/// Extracts at most one code from a frame.
///
/// `Ok(None)` is the steady state: nothing in view.
pub trait FrameDecoder: Send + Sync {
    fn decode(&self, frame: &Frame) -> Result<Option<Detection>, DecodeWarning>;
}

/// Decoder backed by the rqrr crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RqrrDecoder;

impl RqrrDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl FrameDecoder for RqrrDecoder {
    fn decode(&self, frame: &Frame) -> Result<Option<Detection>, DecodeWarning> {
        if frame.luma.len() != frame.expected_len() {
            return Err(DecodeWarning::MalformedFrame {
                expected: frame.expected_len(),
                actual: frame.luma.len(),
            });
        }

        let width = frame.width as usize;
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width, frame.height as usize, |x, y| {
                frame.luma[y * width + x]
            });

        let mut last_error = None;
        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_, text)) => {
                    let points = grid
                        .bounds
                        .iter()
                        .map(|p| Point::new(f64::from(p.x), f64::from(p.y)))
                        .collect();
                    return Ok(Some(Detection { text, points }));
                }
                Err(e) => last_error = Some(e.to_string()),
            }
        }

        match last_error {
            Some(e) => Err(DecodeWarning::Undecodable(e)),
            None => Ok(None),
        }
    }
}
