use crate::error::DecodeError;
use crate::frame::FrameData;
use tracing::{debug, trace};

/// Look for a QR code in a single frame.
///
/// Grids that are found but fail to decode are treated as "nothing in this
/// frame"; only a frame the detector cannot consume at all is an error.
pub(crate) fn decode_frame(frame: &FrameData) -> Result<Option<String>, DecodeError> {
    let luma = frame.to_luma().ok_or_else(|| DecodeError::UnsupportedFrame {
        frame_id: frame.id,
        details: format!(
            "buffer of {} bytes does not match {}x{} {:?}",
            frame.data.len(),
            frame.width,
            frame.height,
            frame.format
        ),
    })?;

    let width = frame.width as usize;
    let height = frame.height as usize;
    if width == 0 || height == 0 {
        return Err(DecodeError::UnsupportedFrame {
            frame_id: frame.id,
            details: "empty frame".to_string(),
        });
    }

    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| luma[y * width + x]);
    let grids = prepared.detect_grids();
    trace!("Frame {}: {} candidate grids", frame.id, grids.len());

    for grid in &grids {
        match grid.decode() {
            Ok((meta, content)) => {
                debug!(
                    "QR decoded from frame {}: {} bytes, ECC={:?}",
                    frame.id,
                    content.len(),
                    meta.ecc_level
                );
                return Ok(Some(content));
            }
            Err(e) => trace!("Grid in frame {} failed to decode: {:?}", frame.id, e),
        }
    }

    Ok(None)
}
