//! V4L2 camera capture engine.
//!
//! This crate talks to a Linux video-capture device node directly:
//! it negotiates a pixel format over the V4L2 ioctl interface, maps
//! the kernel's capture buffers into process memory, cycles them
//! through the capture queue on a dedicated thread, and converts each
//! dequeued buffer into an interleaved RGB frame.
//!
//! [`CameraController`] is the entry point for applications: start,
//! stop and switch cameras, and receive [`CameraEvent`]s (frames,
//! errors, state changes) over a bounded channel.

pub mod capture;
pub mod config;
pub mod controller;
pub mod convert;
pub mod device;
pub mod error;
pub mod format;
pub mod frame;
pub mod pool;
pub mod sys;

pub use capture::{CameraEvent, CaptureEngine, EngineStatus, SessionInfo};
pub use config::CameraConfig;
pub use controller::CameraController;
pub use error::CameraError;
pub use format::{PixelEncoding, PlanarLayout};
pub use frame::RgbFrame;
