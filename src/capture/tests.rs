use super::*;
use crate::capability::{CameraRequest, FacingMode, ScriptedCapability};
use crate::config::CameraConfig;
use crate::error::CameraError;

fn create_test_request() -> CameraRequest {
    CameraRequest::environment(&CameraConfig {
        ideal_resolution: (1280, 720),
        ..CameraConfig::default()
    })
}

#[test]
fn test_request_is_environment_facing() {
    let request = create_test_request();
    assert_eq!(request.facing, FacingMode::Environment);
    assert_eq!(request.ideal_resolution, (1280, 720));
}

#[tokio::test]
async fn test_open_and_read_frames() {
    let capability = ScriptedCapability::new().with_resolution(1280, 720);
    let mut handle = open_camera(&capability, &create_test_request())
        .await
        .unwrap();

    assert!(handle.is_open());
    assert_eq!(capability.opens(), 1);

    let first = handle.latest_frame().unwrap().unwrap();
    let second = handle.latest_frame().unwrap().unwrap();
    assert_eq!(first.width, 1280);
    assert_eq!(second.id, first.id + 1);
}

#[tokio::test]
async fn test_lower_resolution_is_tolerated() {
    let capability = ScriptedCapability::new().with_resolution(640, 480);
    let handle = open_camera(&capability, &create_test_request())
        .await
        .unwrap();

    assert_eq!(handle.resolution(), (640, 480));
}

#[tokio::test]
async fn test_permission_denied_is_reported() {
    let capability = ScriptedCapability::new().with_camera_error(CameraError::PermissionDenied {
        details: "user dismissed the prompt".to_string(),
    });

    let result = open_camera(&capability, &create_test_request()).await;
    assert!(matches!(result, Err(CameraError::PermissionDenied { .. })));
    assert_eq!(capability.opens(), 0);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let capability = ScriptedCapability::new();
    let mut handle = open_camera(&capability, &create_test_request())
        .await
        .unwrap();

    assert!(handle.close());
    assert!(!handle.close());
    assert!(!handle.close());

    assert!(!handle.is_open());
    assert_eq!(capability.releases(), 1);
    assert_eq!(capability.stop_calls(), 1);
    assert!(handle.latest_frame().is_err());

    drop(handle);
    assert_eq!(capability.releases(), 1);
}

#[tokio::test]
async fn test_drop_releases_camera() {
    let capability = ScriptedCapability::new();
    {
        let _handle = open_camera(&capability, &create_test_request())
            .await
            .unwrap();
        assert_eq!(capability.releases(), 0);
    }
    assert_eq!(capability.releases(), 1);
}

#[cfg(feature = "stills")]
#[test]
fn test_still_image_source() {
    use crate::capability::FrameSource;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pass.png");
    image::GrayImage::from_pixel(32, 24, image::Luma([200u8]))
        .save(&path)
        .unwrap();

    let mut source = StillImageSource::open(&path).unwrap();
    assert_eq!(source.resolution(), (32, 24));

    let frame = source.latest_frame().unwrap().unwrap();
    assert_eq!(frame.data.len(), 32 * 24);
    assert!(frame.data.iter().all(|&p| p == 200));

    source.stop();
    source.stop();
    assert!(!source.is_live());
    assert!(source.latest_frame().is_err());
}

#[cfg(feature = "stills")]
#[test]
fn test_still_image_missing_file() {
    let result = StillImageSource::open("/nonexistent/pass.png");
    assert!(matches!(result, Err(CameraError::NotFound { .. })));
}
