//! Composited full-color frames as handed over by a frame source.

use std::time::Duration;

use super::Color;

/// A full-color composited frame.
///
/// Pixels are stored row-major: `pixels[y * width + x]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
}

impl Frame {
    /// Wrap a pixel buffer, checking it matches the given dimensions.
    pub fn new(width: u32, height: u32, pixels: Vec<Color>) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::ZeroSize { width, height });
        }
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(FrameError::BufferSize {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Frame filled with a single color.
    pub fn filled(width: u32, height: u32, color: Color) -> Result<Self, FrameError> {
        Self::new(width, height, vec![color; width as usize * height as usize])
    }

    /// Build a frame from tightly packed RGBA8 bytes.
    pub fn from_rgba_bytes(width: u32, height: u32, bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() % 4 != 0 {
            return Err(FrameError::BufferSize {
                expected: width as usize * height as usize * 4,
                actual: bytes.len(),
            });
        }
        let pixels = bytes
            .chunks_exact(4)
            .map(|px| Color::rgba(px[0], px[1], px[2], px[3]))
            .collect();
        Self::new(width, height, pixels)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of pixels.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    #[inline]
    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [Color] {
        &mut self.pixels
    }

    /// Pixel at (x, y). Panics when out of bounds.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Color {
        self.pixels[self.offset(x, y)]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        let offset = self.offset(x, y);
        self.pixels[offset] = color;
    }

    /// Raw RGBA8 bytes of the whole frame.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        y as usize * self.width as usize + x as usize
    }
}

/// A composited frame together with how long it stays on screen.
#[derive(Debug, Clone)]
pub struct ComposedFrame {
    pub frame: Frame,
    pub duration: Duration,
}

impl ComposedFrame {
    pub fn new(frame: Frame, duration: Duration) -> Self {
        Self { frame, duration }
    }
}

/// Frame construction errors.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Frame dimensions {width}x{height} must be non-zero")]
    ZeroSize { width: u32, height: u32 },
    #[error("Pixel buffer holds {actual} entries, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rejects_wrong_buffer() {
        let result = Frame::new(2, 2, vec![Color::BLACK; 3]);
        assert!(matches!(
            result,
            Err(FrameError::BufferSize {
                expected: 4,
                actual: 3
            })
        ));
        assert!(matches!(
            Frame::new(0, 4, Vec::new()),
            Err(FrameError::ZeroSize { .. })
        ));
    }

    #[test]
    fn test_frame_row_major_access() {
        let mut frame = Frame::filled(3, 2, Color::BLACK).unwrap();
        frame.set_pixel(2, 1, Color::WHITE);
        assert_eq!(frame.pixels()[5], Color::WHITE);
        assert_eq!(frame.pixel(2, 1), Color::WHITE);
        assert_eq!(frame.pixel(0, 0), Color::BLACK);
    }

    #[test]
    fn test_from_rgba_bytes() {
        let bytes = [1, 2, 3, 4, 5, 6, 7, 8];
        let frame = Frame::from_rgba_bytes(2, 1, &bytes).unwrap();
        assert_eq!(frame.pixel(1, 0), Color::rgba(5, 6, 7, 8));
        assert_eq!(frame.as_bytes(), &bytes);
        assert!(Frame::from_rgba_bytes(2, 1, &bytes[..7]).is_err());
    }
}
