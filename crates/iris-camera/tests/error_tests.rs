use iris_camera::CameraError;
use std::io;

#[test]
fn test_from_io_error() {
    let io_err = io::Error::new(io::ErrorKind::NotFound, "device not found");
    let cam_err: CameraError = io_err.into();

    match cam_err {
        CameraError::DeviceUnavailable(msg) => assert!(msg.contains("device not found")),
        _ => panic!("Expected CameraError::DeviceUnavailable variant"),
    }
}

#[test]
fn test_error_display() {
    let unavailable = CameraError::DeviceUnavailable("open(/dev/video0) failed".to_string());
    assert!(unavailable.to_string().contains("/dev/video0"));

    let unsupported = CameraError::UnsupportedDevice("no capture capability".to_string());
    assert!(unsupported.to_string().contains("unsupported device"));

    let negotiation = CameraError::FormatNegotiation("VIDIOC_G_FMT failed".to_string());
    assert!(negotiation.to_string().contains("format negotiation"));

    let streaming = CameraError::Streaming("VIDIOC_DQBUF failed".to_string());
    assert!(streaming.to_string().contains("VIDIOC_DQBUF"));
}

#[test]
fn test_insufficient_buffers_names_the_floor() {
    let err = CameraError::InsufficientBuffers { granted: 1 };
    let msg = err.to_string();
    assert!(msg.contains("1 buffer(s)"));
    assert!(msg.contains("need 2"));
}

#[test]
fn test_error_is_std_error() {
    fn takes_error(_: &dyn std::error::Error) {}
    takes_error(&CameraError::MappingFailed("mmap: EINVAL".to_string()));
    takes_error(&CameraError::QueueSubmission("VIDIOC_QBUF: EIO".to_string()));
}
