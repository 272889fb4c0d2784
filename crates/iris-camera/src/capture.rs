//! The capture engine: session setup plus the dedicated thread that
//! cycles buffers between the kernel queue and the converter.

use crate::config::CameraConfig;
use crate::convert;
use crate::device::Session;
use crate::error::CameraError;
use crate::format::{PixelEncoding, PlanarLayout};
use crate::frame::RgbFrame;
use crate::pool::BufferPool;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// How long one readiness wait may block. A timeout is not an error;
/// it bounds shutdown latency and lets the loop observe the stop flag
/// even when the device produces nothing.
const WAIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Backoff after a would-block dequeue, instead of busy-spinning on
/// the fd.
const WOULD_BLOCK_BACKOFF: Duration = Duration::from_millis(2);

/// Notifications emitted by the capture engine.
#[derive(Debug)]
pub enum CameraEvent {
    /// One decoded frame. The receiver owns it from here on.
    Frame(RgbFrame),
    /// The running flag changed.
    Running(bool),
    /// Frames delivered over the last one-second window.
    FrameRate(u32),
    /// A reportable failure, already formatted for display.
    Error(String),
}

/// The format a start call actually established.
#[derive(Clone, Copy, Debug)]
pub struct SessionInfo {
    pub width: u32,
    pub height: u32,
    pub encoding: PixelEncoding,
    pub layout: PlanarLayout,
}

#[derive(Debug, Default)]
struct EngineShared {
    stop: AtomicBool,
    running: AtomicBool,
    frame_rate: AtomicU32,
}

/// Owns the capture thread and the shared flags crossing into it.
///
/// `start` performs the whole negotiation sequence (open, capability
/// query, format negotiation, buffer allocation, stream-on) on the
/// caller and only spawns the loop thread once streaming is live, so
/// a failed start leaves nothing behind and the running flag false.
#[derive(Debug, Default)]
pub struct CaptureEngine {
    shared: Arc<EngineShared>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the device and start streaming. Idempotent restart: an
    /// already-running session is stopped and torn down first.
    pub fn start(
        &mut self,
        config: &CameraConfig,
        hint: Option<PixelEncoding>,
        events: mpsc::Sender<CameraEvent>,
    ) -> Result<SessionInfo, CameraError> {
        // Unconditional: a fatal drain clears the running flag before
        // the thread exits, so gating on it would skip the join and
        // leave the old session's fd alive past the new open.
        self.stop();

        let session = Session::open(config, hint)?;
        let pool = BufferPool::allocate(&session, config.buffer_count())?;
        session.stream_on()?;

        let info = SessionInfo {
            width: session.width(),
            height: session.height(),
            encoding: session.encoding(),
            layout: session.layout(),
        };
        log::info!(
            "streaming {} {}x{} from {} with {} buffer(s)",
            info.encoding,
            info.width,
            info.height,
            session.path(),
            pool.len()
        );

        self.shared.stop.store(false, Ordering::Relaxed);
        self.shared.running.store(true, Ordering::Relaxed);
        let shared = Arc::clone(&self.shared);
        self.handle = Some(thread::spawn(move || {
            run_loop(session, pool, shared, events);
        }));
        Ok(info)
    }

    /// Request a cooperative stop and wait for the loop to drain.
    ///
    /// The loop observes the flag within one readiness-wait timeout.
    /// Also joins a thread that already drained on its own after a
    /// fatal fault; no-op when no thread was ever spawned.
    pub fn stop(&mut self) {
        self.shared.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Relaxed)
    }

    pub fn frame_rate(&self) -> u32 {
        self.shared.frame_rate.load(Ordering::Relaxed)
    }

    /// A cloneable view of the running flag and frame rate that can
    /// be read without waiting behind a reconfiguration in progress.
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Lock-free read access to the engine's atomic state.
#[derive(Clone, Debug)]
pub struct EngineStatus {
    shared: Arc<EngineShared>,
}

impl EngineStatus {
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Relaxed)
    }

    pub fn frame_rate(&self) -> u32 {
        self.shared.frame_rate.load(Ordering::Relaxed)
    }
}

impl Drop for CaptureEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Loop states after a successful start. `Draining` releases stream,
/// pool and device in order before the running flag drops.
enum LoopState {
    Streaming,
    Draining,
    Idle,
}

struct FrameRateCounter {
    frames: u32,
    window_start: Instant,
}

impl FrameRateCounter {
    fn new() -> Self {
        Self {
            frames: 0,
            window_start: Instant::now(),
        }
    }

    /// Count one frame; yields the rate once per one-second window.
    fn tick(&mut self) -> Option<u32> {
        self.frames += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            let rate = (self.frames as f64 / elapsed.as_secs_f64()).round() as u32;
            self.frames = 0;
            self.window_start = Instant::now();
            Some(rate)
        } else {
            None
        }
    }
}

fn run_loop(
    session: Session,
    mut pool: BufferPool,
    shared: Arc<EngineShared>,
    events: mpsc::Sender<CameraEvent>,
) {
    let _ = events.blocking_send(CameraEvent::Running(true));
    let mut rate = FrameRateCounter::new();
    let mut state = LoopState::Streaming;

    loop {
        state = match state {
            LoopState::Streaming => {
                streaming_iteration(&session, &pool, &shared, &events, &mut rate)
            }
            LoopState::Draining => {
                session.stream_off();
                pool.release();
                shared.frame_rate.store(0, Ordering::Relaxed);
                shared.running.store(false, Ordering::Relaxed);
                let _ = events.blocking_send(CameraEvent::Running(false));
                LoopState::Idle
            }
            LoopState::Idle => break,
        };
    }
    // Dropping the session here closes the device, after stream-off
    // and unmap have already run.
    log::debug!("capture loop for {} exited", session.path());
}

/// One pass of the streaming self-loop: wait, dequeue, convert,
/// deliver, requeue. Fatal faults and the stop flag fall through to
/// `Draining`.
fn streaming_iteration(
    session: &Session,
    pool: &BufferPool,
    shared: &EngineShared,
    events: &mpsc::Sender<CameraEvent>,
    rate: &mut FrameRateCounter,
) -> LoopState {
    if shared.stop.load(Ordering::Relaxed) {
        return LoopState::Draining;
    }

    match crate::sys::wait_readable(session.raw_fd(), WAIT_TIMEOUT) {
        Ok(true) => {}
        // Timeout with no frame: loop again, not an error.
        Ok(false) => return LoopState::Streaming,
        Err(err) => {
            let _ = events.blocking_send(CameraEvent::Error(format!("poll failed: {err}")));
            return LoopState::Draining;
        }
    }

    let index = match pool.dequeue(session.raw_fd()) {
        Ok(Some(index)) => index,
        Ok(None) => {
            // Not ready after all; back off briefly.
            thread::sleep(WOULD_BLOCK_BACKOFF);
            return LoopState::Streaming;
        }
        Err(err) => {
            let _ = events.blocking_send(CameraEvent::Error(err.to_string()));
            return LoopState::Draining;
        }
    };

    let frame = decode_buffer(session, pool, index);
    // Blocking delivery: at most one frame in flight, a slow consumer
    // throttles capture rather than queueing stale frames.
    if events.blocking_send(CameraEvent::Frame(frame)).is_err() {
        // Receiver dropped: treat as a stop request.
        return LoopState::Draining;
    }

    if let Some(fps) = rate.tick() {
        shared.frame_rate.store(fps, Ordering::Relaxed);
        let _ = events.blocking_send(CameraEvent::FrameRate(fps));
    }

    if let Err(err) = pool.queue(session.raw_fd(), index) {
        let _ = events.blocking_send(CameraEvent::Error(err.to_string()));
        return LoopState::Draining;
    }

    LoopState::Streaming
}

/// Borrow the dequeued buffer's planes and convert them; the borrow
/// ends before the buffer is requeued.
fn decode_buffer(session: &Session, pool: &BufferPool, index: u32) -> RgbFrame {
    let (width, height, encoding) = (session.width(), session.height(), session.encoding());
    match pool.buffer(index) {
        Some(buffer) => {
            let planes: Vec<&[u8]> = (0..buffer.plane_count()).map(|p| buffer.plane(p)).collect();
            convert::decode(encoding, &planes, width, height)
        }
        None => convert::decode(encoding, &[], width, height),
    }
}
