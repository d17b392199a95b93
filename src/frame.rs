use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::SystemTime;

/// Pixel layout of a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// 8-bit greyscale
    Luma8,
    /// Packed 8-bit RGB
    Rgb24,
    /// Packed 8-bit RGBA
    Rgba32,
}

impl FrameFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Luma8 => 1,
            FrameFormat::Rgb24 => 3,
            FrameFormat::Rgba32 => 4,
        }
    }
}

/// One frame drawn from a frame source
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Frame sequence number within its source
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Pixel data, tightly packed rows
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
}

impl FrameData {
    /// Create a new frame data instance
    pub fn new(id: u64, data: Vec<u8>, width: u32, height: u32, format: FrameFormat) -> Self {
        Self::from_shared(id, Arc::new(data), width, height, format)
    }

    /// Create a frame over an already shared buffer
    pub fn from_shared(
        id: u64,
        data: Arc<Vec<u8>>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp: SystemTime::now(),
            data,
            width,
            height,
            format,
        }
    }

    pub fn expected_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        self.data.len() == self.expected_size()
    }

    /// Get frame age in milliseconds
    pub fn age_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.timestamp)
            .unwrap_or_default()
            .as_millis() as u64
    }

    /// Greyscale view of the frame, converting colour formats with BT.601 weights.
    /// Returns `None` when the buffer does not match the declared geometry.
    pub fn to_luma(&self) -> Option<Cow<'_, [u8]>> {
        if !self.validate_size() {
            return None;
        }

        match self.format {
            FrameFormat::Luma8 => Some(Cow::Borrowed(self.data.as_slice())),
            FrameFormat::Rgb24 | FrameFormat::Rgba32 => {
                let bpp = self.format.bytes_per_pixel();
                let luma = self
                    .data
                    .chunks_exact(bpp)
                    .map(|px| {
                        let y = 299 * px[0] as u32 + 587 * px[1] as u32 + 114 * px[2] as u32;
                        (y / 1000) as u8
                    })
                    .collect();
                Some(Cow::Owned(luma))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luma_passthrough() {
        let frame = FrameData::new(1, vec![10, 20, 30, 40], 2, 2, FrameFormat::Luma8);
        let luma = frame.to_luma().unwrap();
        assert!(matches!(luma, Cow::Borrowed(_)));
        assert_eq!(&*luma, &[10, 20, 30, 40]);
    }

    #[test]
    fn test_rgb_to_luma() {
        let frame = FrameData::new(
            2,
            vec![255, 255, 255, 0, 0, 0],
            2,
            1,
            FrameFormat::Rgb24,
        );
        let luma = frame.to_luma().unwrap();
        assert_eq!(&*luma, &[255, 0]);
    }

    #[test]
    fn test_rgba_drops_alpha() {
        let frame = FrameData::new(3, vec![255, 0, 0, 7], 1, 1, FrameFormat::Rgba32);
        let luma = frame.to_luma().unwrap();
        assert_eq!(&*luma, &[76]);
    }

    #[test]
    fn test_size_mismatch() {
        let frame = FrameData::new(4, vec![0; 5], 2, 2, FrameFormat::Luma8);
        assert!(!frame.validate_size());
        assert!(frame.to_luma().is_none());
    }
}
