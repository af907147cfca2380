mod cleanup;
mod filename;
mod rolling_file;

use std::io;

use crate::config::{LoggingConfig, LoggingOutput};

pub use cleanup::prune_rotated_logs;
pub use filename::{format_rotated_filename, parse_rotated_filename, RotatedLogName};
pub use rolling_file::RollingFileWriter;

/// Destination for the subscriber's log lines.
pub enum LogDestination {
    Stdout,
    File(RollingFileWriter),
}

/// Open the destination selected by the `logger` config section.
pub fn open_destination(cfg: &LoggingConfig) -> io::Result<LogDestination> {
    match cfg.output {
        LoggingOutput::Stdout => Ok(LogDestination::Stdout),
        LoggingOutput::File => Ok(LogDestination::File(RollingFileWriter::open(
            cfg.file.clone(),
        )?)),
    }
}
