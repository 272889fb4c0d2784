//! Application-facing control surface: start, stop and switch
//! cameras, plus the state queries a UI binds to.

use crate::capture::{CameraEvent, CaptureEngine, EngineStatus, SessionInfo};
use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::format::PixelEncoding;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

/// Camera indices the controller accepts; anything else clamps to
/// the default.
const VALID_INDICES: std::ops::RangeInclusive<u32> = 0..=1;
const DEFAULT_INDEX: u32 = 0;

/// Event channel depth. Small on purpose: frame delivery blocks the
/// capture loop, so a deep queue would only add latency.
const EVENT_CHANNEL_CAPACITY: usize = 8;

struct ReconfigState {
    engine: CaptureEngine,
    config: CameraConfig,
}

#[derive(Default)]
struct QueryState {
    current_index: u32,
    format_hint: Option<PixelEncoding>,
    last_error: Option<String>,
}

/// Thread-safe façade over the capture engine.
///
/// All methods take `&self`. The `reconfig` mutex is held across
/// every stop/reopen/renegotiate/restart sequence, so concurrent
/// reconfiguration requests cannot interleave teardown and setup.
/// Queries read the engine's atomics or the short-lived `query` lock
/// and never wait behind a reconfiguration in progress.
pub struct CameraController {
    reconfig: Mutex<ReconfigState>,
    query: Mutex<QueryState>,
    status: EngineStatus,
    events_tx: mpsc::Sender<CameraEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<CameraEvent>>>,
}

impl CameraController {
    pub fn new(config: CameraConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let engine = CaptureEngine::new();
        let status = engine.status();
        CameraController {
            reconfig: Mutex::new(ReconfigState { engine, config }),
            query: Mutex::new(QueryState::default()),
            status,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Take the event receiver. Yields `Some` exactly once.
    pub fn take_events(&self) -> Option<mpsc::Receiver<CameraEvent>> {
        lock(&self.events_rx).take()
    }

    /// Start capturing from camera `index`.
    ///
    /// Out-of-range indices clamp to the default camera. The engine
    /// tears down any previous session (running or already faulted)
    /// before opening, so two device handles are never open at once.
    pub fn start_camera(&self, index: u32) -> Result<SessionInfo, CameraError> {
        let mut reconfig = lock(&self.reconfig);
        let index = clamp_index(index);
        log::info!("start requested for camera {index}");

        let hint = {
            let mut query = lock(&self.query);
            query.current_index = index;
            query.format_hint
        };
        let config = reconfig.config.clone().with_device(device_path(index));

        match reconfig.engine.start(&config, hint, self.events_tx.clone()) {
            Ok(info) => {
                lock(&self.query).last_error = None;
                Ok(info)
            }
            Err(err) => {
                let message = err.to_string();
                log::warn!("camera start failed: {message}");
                lock(&self.query).last_error = Some(message.clone());
                // try_send: the caller may sit on a runtime thread,
                // and a full queue must not wedge the control surface.
                let _ = self.events_tx.try_send(CameraEvent::Error(message));
                Err(err)
            }
        }
    }

    /// Stop the session and join its thread. Safe to call when idle
    /// or after the loop already drained on a fault.
    pub fn stop_camera(&self) {
        log::info!("stop requested");
        lock(&self.reconfig).engine.stop();
    }

    /// Toggle between cameras 0 and 1 with a full stop-then-start.
    pub fn switch_camera(&self) -> Result<SessionInfo, CameraError> {
        let next = if lock(&self.query).current_index == 0 {
            1
        } else {
            0
        };
        log::info!("switching camera to {next}");
        self.start_camera(next)
    }

    /// Advisory encoding hint, consumed at the next negotiation. Not
    /// applied to an already-streaming session.
    pub fn set_pixel_format(&self, encoding: PixelEncoding) {
        log::debug!("pixel format hint set to {encoding}");
        lock(&self.query).format_hint = Some(encoding);
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    /// Frames per second over the last measurement window; 0 when
    /// stopped.
    pub fn frame_rate(&self) -> u32 {
        self.status.frame_rate()
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.query).last_error.clone()
    }

    pub fn current_camera(&self) -> u32 {
        lock(&self.query).current_index
    }

    pub fn pixel_format_hint(&self) -> Option<PixelEncoding> {
        lock(&self.query).format_hint
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn clamp_index(index: u32) -> u32 {
    if VALID_INDICES.contains(&index) {
        index
    } else {
        DEFAULT_INDEX
    }
}

fn device_path(index: u32) -> String {
    format!("/dev/video{index}")
}
