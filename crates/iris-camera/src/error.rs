use std::fmt;

/// Errors produced by the capture engine.
///
/// Setup errors (`DeviceUnavailable` through `QueueSubmission`) abort
/// a start sequence and leave no partial session behind. `Streaming`
/// covers runtime dequeue/requeue faults not explained by a transient
/// would-block condition.
#[derive(Debug)]
pub enum CameraError {
    /// Opening the device node failed (missing path, permissions).
    DeviceUnavailable(String),
    /// The device reports neither video-capture capability nor
    /// streaming I/O.
    UnsupportedDevice(String),
    /// No pixel encoding could be established, including the
    /// current-format fallback.
    FormatNegotiation(String),
    /// The kernel granted fewer buffers than the pipelining floor.
    InsufficientBuffers { granted: u32 },
    /// Memory-mapping a buffer plane failed.
    MappingFailed(String),
    /// Submitting a buffer to the capture queue was rejected.
    QueueSubmission(String),
    /// Runtime streaming fault (select/dequeue/requeue).
    Streaming(String),
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::DeviceUnavailable(msg) => write!(f, "device unavailable: {msg}"),
            CameraError::UnsupportedDevice(msg) => write!(f, "unsupported device: {msg}"),
            CameraError::FormatNegotiation(msg) => write!(f, "format negotiation failed: {msg}"),
            CameraError::InsufficientBuffers { granted } => {
                write!(f, "insufficient buffer memory: {granted} buffer(s) granted, need 2")
            }
            CameraError::MappingFailed(msg) => write!(f, "mmap failed: {msg}"),
            CameraError::QueueSubmission(msg) => write!(f, "buffer queueing failed: {msg}"),
            CameraError::Streaming(msg) => write!(f, "streaming error: {msg}"),
        }
    }
}

impl std::error::Error for CameraError {}

impl From<std::io::Error> for CameraError {
    fn from(err: std::io::Error) -> Self {
        CameraError::DeviceUnavailable(err.to_string())
    }
}
