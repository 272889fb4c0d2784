use iris_base::log;
use iris_camera::{CameraConfig, CameraController, CameraEvent, RgbFrame};
use std::io::Write;

const FRAME_LIMIT: usize = 60;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    iris_base::init_stdout_logger();

    // Parse camera index from args or use default
    let index: u32 = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(0);

    log::info!("Capture Probe");
    log::info!("Starting camera {index}");

    let controller = CameraController::new(CameraConfig::default());
    let mut events = controller.take_events().expect("fresh controller");

    let info = controller.start_camera(index)?;
    log::info!(
        "Negotiated {} {}x{} ({:?})",
        info.encoding,
        info.width,
        info.height,
        info.layout
    );

    let mut frames_seen = 0usize;
    let mut first_frame_saved = false;

    while let Some(event) = events.recv().await {
        match event {
            CameraEvent::Frame(frame) => {
                frames_seen += 1;
                if !first_frame_saved {
                    save_ppm(&frame, "frame.ppm")?;
                    log::info!("Saved first frame to frame.ppm");
                    first_frame_saved = true;
                }
                if frames_seen >= FRAME_LIMIT {
                    break;
                }
            }
            CameraEvent::FrameRate(fps) => log::info!("Frame rate: {fps} fps"),
            CameraEvent::Running(running) => log::info!("Running: {running}"),
            CameraEvent::Error(message) => log::error!("Camera error: {message}"),
        }
    }

    log::info!("Captured {frames_seen} frame(s), stopping");
    controller.stop_camera();
    Ok(())
}

/// Dump a frame as binary PPM, the simplest thing an image viewer
/// opens.
fn save_ppm(frame: &RgbFrame, path: &str) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    write!(file, "P6\n{} {}\n255\n", frame.width(), frame.height())?;
    file.write_all(frame.data())
}
