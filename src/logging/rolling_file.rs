//! Size-based rolling log file writer.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use crate::config::RollingFileConfig;

use super::cleanup::prune_rotated_logs;
use super::filename::format_rotated_filename;

/// An append-only writer that rotates its file once it exceeds the
/// configured size, renaming the current file into the rotation set and
/// pruning old rotations.
pub struct RollingFileWriter {
    config: RollingFileConfig,
    file: File,
    written: u64,
}

impl RollingFileWriter {
    pub fn open(config: RollingFileConfig) -> io::Result<Self> {
        let file = open_append(&config.path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            config,
            file,
            written,
        })
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        let rotated = format_rotated_filename(&self.config.path);
        std::fs::rename(&self.config.path, &rotated)?;
        self.file = open_append(&self.config.path)?;
        self.written = 0;
        prune_rotated_logs(&self.config.path, self.config.max_files)?;
        Ok(())
    }
}

fn open_append(path: &PathBuf) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

impl Write for RollingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written + buf.len() as u64 > self.config.max_size_bytes && self.written > 0 {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
