mod handle;
#[cfg(all(feature = "camera", target_os = "linux"))]
mod pipeline;
#[cfg(feature = "stills")]
mod still;
#[cfg(test)]
mod tests;

pub use handle::{open_camera, CameraHandle};
#[cfg(all(feature = "camera", target_os = "linux"))]
pub use pipeline::GstFrameSource;
#[cfg(feature = "stills")]
pub use still::StillImageSource;
