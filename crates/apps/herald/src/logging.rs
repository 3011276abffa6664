//! Console plus rotating file logging
//!
//! Records go to stderr and, unless disabled, to `herald.log` in the Herald
//! data directory. The file rolls over at 1 MiB and keeps three backups
//! (`herald.log.1` .. `herald.log.3`), so unattended runs leave an audit
//! trail of every message outcome.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use env_logger::{Env, Target, WriteStyle};
use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use log::warn;

/// Log filename in the Herald data directory
pub const LOG_FILE: &str = "herald.log";

const MAX_LOG_BYTES: usize = 1024 * 1024;
const LOG_BACKUPS: usize = 3;

/// Default log file location
pub fn default_log_path() -> Option<PathBuf> {
    config::data_path(LOG_FILE)
}

/// Install the global logger
///
/// A log file that cannot be opened disables file logging with a warning
/// instead of failing startup.
pub fn init(log_file: Option<&Path>) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();

    let mut file_error = None;
    if let Some(path) = log_file {
        match open_rotating(path) {
            Ok(file) => {
                builder
                    .write_style(WriteStyle::Never)
                    .target(Target::Pipe(Box::new(Tee::new(io::stderr(), file))));
            }
            Err(e) => file_error = Some(e),
        }
    }

    builder.init();

    if let Some(e) = file_error {
        warn!("File logging disabled: {:#}", e);
    }
}

/// Open `path` for appending, rotating by size
pub fn open_rotating(path: &Path) -> Result<FileRotate<AppendCount>> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }

    Ok(FileRotate::new(
        path,
        AppendCount::new(LOG_BACKUPS),
        ContentLimit::Bytes(MAX_LOG_BYTES),
        Compression::None,
        #[cfg(unix)]
        None,
    ))
}

/// Writes every record to both the console and the log file
pub struct Tee<C, F> {
    console: C,
    file: F,
}

impl<C: Write, F: Write> Tee<C, F> {
    pub fn new(console: C, file: F) -> Self {
        Self { console, file }
    }
}

impl<C: Write, F: Write> Write for Tee<C, F> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // The file copy matters more than the console one
        self.file.write_all(buf)?;
        self.console.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.console.flush()
    }
}
