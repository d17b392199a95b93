use crate::capability::{CameraRequest, FrameSource};
use crate::error::CameraError;
use crate::frame::{FrameData, FrameFormat};
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// How long to wait for the first sample when negotiating the stream
const FIRST_SAMPLE_TIMEOUT: Duration = Duration::from_secs(5);

/// V4L2 camera read through a GStreamer pipeline as GRAY8 frames
pub struct GstFrameSource {
    pipeline: Option<Pipeline>,
    appsink: AppSink,
    resolution: (u32, u32),
    pending: Option<FrameData>,
    frame_counter: u64,
}

impl GstFrameSource {
    /// Open `/dev/video{device}` and start streaming
    pub fn open(device: u32, request: &CameraRequest) -> Result<Self, CameraError> {
        let device_path = format!("/dev/video{}", device);
        if !Path::new(&device_path).exists() {
            return Err(CameraError::NotFound {
                device: device_path,
            });
        }

        gstreamer::init().map_err(|e| CameraError::Configuration {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        let pipeline_desc = Self::build_pipeline_string(&device_path, request);
        info!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| CameraError::Configuration {
                details: format!("Failed to create pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| CameraError::Configuration {
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| CameraError::Configuration {
                details: "Pipeline has no appsink".to_string(),
            })?
            .downcast::<AppSink>()
            .map_err(|_| CameraError::Configuration {
                details: "Failed to downcast to AppSink".to_string(),
            })?;

        if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(Self::classify_start_failure(&device_path, &e.to_string()));
        }

        // Negotiated caps are only known once the first sample arrives
        let first = match appsink.try_pull_sample(gstreamer::ClockTime::from_nseconds(
            FIRST_SAMPLE_TIMEOUT.as_nanos() as u64,
        )) {
            Some(sample) => sample,
            None => {
                let _ = pipeline.set_state(gstreamer::State::Null);
                return Err(CameraError::DeviceOpen {
                    device: device_path,
                    details: format!("no frames within {:?}", FIRST_SAMPLE_TIMEOUT),
                });
            }
        };

        let mut source = Self {
            pipeline: Some(pipeline),
            appsink,
            resolution: (0, 0),
            pending: None,
            frame_counter: 0,
        };

        let frame = source.sample_to_frame(&first)?;
        source.resolution = (frame.width, frame.height);
        source.pending = Some(frame);

        info!(
            "Camera {} streaming at {}x{}",
            device_path, source.resolution.0, source.resolution.1
        );
        Ok(source)
    }

    /// Raw GRAY8 output without fixing the size, so the driver can settle
    /// on whatever it supports up to the ideal resolution
    fn build_pipeline_string(device_path: &str, request: &CameraRequest) -> String {
        let (width, height) = request.ideal_resolution;
        format!(
            "v4l2src device={} io-mode=mmap ! \
             video/x-raw,width=[1,{}],height=[1,{}],framerate=[1/1,{}/1] ! \
             videoconvert ! video/x-raw,format=GRAY8 ! \
             appsink name=sink sync=false max-buffers=1 drop=true emit-signals=false",
            device_path, width, height, request.fps
        )
    }

    fn classify_start_failure(device_path: &str, details: &str) -> CameraError {
        let lowered = details.to_lowercase();
        if lowered.contains("permission") || lowered.contains("not allowed") {
            CameraError::PermissionDenied {
                details: format!("{}: {}", device_path, details),
            }
        } else {
            CameraError::DeviceOpen {
                device: device_path.to_string(),
                details: details.to_string(),
            }
        }
    }

    fn sample_to_frame(&mut self, sample: &gstreamer::Sample) -> Result<FrameData, CameraError> {
        let buffer = sample.buffer().ok_or_else(|| CameraError::CaptureStream {
            details: "No buffer in sample".to_string(),
        })?;

        let caps = sample.caps().ok_or_else(|| CameraError::CaptureStream {
            details: "No caps in sample".to_string(),
        })?;

        let video_info = VideoInfo::from_caps(caps).map_err(|e| CameraError::CaptureStream {
            details: format!("Failed to get video info: {}", e),
        })?;

        let width = video_info.width();
        let height = video_info.height();
        let stride = video_info.stride()[0] as usize;

        let map = buffer
            .map_readable()
            .map_err(|e| CameraError::CaptureStream {
                details: format!("Failed to map buffer: {}", e),
            })?;

        // Drop row padding
        let row = width as usize;
        let mut data = Vec::with_capacity(row * height as usize);
        for line in map.as_slice().chunks(stride).take(height as usize) {
            if line.len() < row {
                return Err(CameraError::CaptureStream {
                    details: "Short frame buffer".to_string(),
                });
            }
            data.extend_from_slice(&line[..row]);
        }

        let frame_id = self.frame_counter;
        self.frame_counter += 1;
        trace!("Captured GRAY8 frame {} ({}x{})", frame_id, width, height);

        Ok(FrameData::new(frame_id, data, width, height, FrameFormat::Luma8))
    }
}

impl FrameSource for GstFrameSource {
    fn latest_frame(&mut self) -> Result<Option<FrameData>, CameraError> {
        if self.pipeline.is_none() {
            return Err(CameraError::CaptureStream {
                details: "Pipeline stopped".to_string(),
            });
        }

        if let Some(frame) = self.pending.take() {
            return Ok(Some(frame));
        }

        match self.appsink.try_pull_sample(gstreamer::ClockTime::ZERO) {
            Some(sample) => self.sample_to_frame(&sample).map(Some),
            None if self.appsink.is_eos() => {
                error!("Camera stream reached end of stream");
                Err(CameraError::CaptureStream {
                    details: "End of stream".to_string(),
                })
            }
            None => Ok(None),
        }
    }

    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    fn stop(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            match pipeline.set_state(gstreamer::State::Null) {
                Ok(_) => debug!("GStreamer pipeline stopped"),
                Err(e) => warn!("Failed to stop GStreamer pipeline: {}", e),
            }
        }
    }

    fn is_live(&self) -> bool {
        self.pipeline.is_some()
    }
}

impl Drop for GstFrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}
