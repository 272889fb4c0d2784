use log::{Level, LevelFilter, Log, Metadata, Record};
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

/// A logger that writes timestamped lines to stdout.
///
/// Line format: `HH:MM:SS.mmm [LEVEL] target - message` (time of day, UTC).
pub struct StdoutLogger;

impl Log for StdoutLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let pad = match record.level() {
            Level::Info | Level::Warn => " ",
            _ => "",
        };
        println!(
            "{} [{}]{} {} - {}",
            time_of_day(),
            record.level(),
            pad,
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        std::io::stdout().flush().ok();
    }
}

/// Format the current UTC time of day as `HH:MM:SS.mmm`.
pub fn time_of_day() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs = now.as_secs() % 86400;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60,
        now.subsec_millis()
    )
}

/// Initialize the global logger with `StdoutLogger`.
///
/// Debug builds log at `Debug` and above, release builds at `Info`.
/// Calling this more than once per process is a silent no-op.
pub fn init_stdout_logger() {
    static LOGGER: StdoutLogger = StdoutLogger;

    let max_level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(max_level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_of_day_shape() {
        let ts = time_of_day();
        // HH:MM:SS.mmm
        assert_eq!(ts.len(), 12);
        assert_eq!(&ts[2..3], ":");
        assert_eq!(&ts[5..6], ":");
        assert_eq!(&ts[8..9], ".");
    }

    #[test]
    fn test_time_of_day_in_range() {
        let ts = time_of_day();
        let hours: u32 = ts[0..2].parse().unwrap();
        let minutes: u32 = ts[3..5].parse().unwrap();
        let seconds: u32 = ts[6..8].parse().unwrap();
        assert!(hours < 24);
        assert!(minutes < 60);
        assert!(seconds < 60);
    }
}
