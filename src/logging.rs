use log::LevelFilter;
use simplelog::{ConfigBuilder, WriteLogger};
use std::io;

/// Install the process-wide logger writing to standard error.
///
/// Does nothing when `level` is `Off`. Calling it twice keeps the first logger.
pub fn init(level: LevelFilter) {
    if level == LevelFilter::Off {
        return;
    }
    let config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Error)
        .build();
    if let Err(e) = WriteLogger::init(level, config, io::stderr()) {
        eprintln!("pipesh: logger already initialized: {e}");
    }
}
