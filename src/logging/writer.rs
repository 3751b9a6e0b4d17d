// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Daily log files: `<dir>/app_<YYYY-MM-DD>.log`

use chrono::{Local, NaiveDate};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::MakeWriter;

pub const LOG_FILE_PREFIX: &str = "app_";
pub const LOG_FILE_EXTENSION: &str = "log";

/// Path of the log file for `date` inside `dir`
pub fn log_file_for(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!(
        "{}{}.{}",
        LOG_FILE_PREFIX,
        date.format("%Y-%m-%d"),
        LOG_FILE_EXTENSION
    ))
}

/// `MakeWriter` that appends each event to the file for the current local date
#[derive(Debug, Clone)]
pub struct DailyLogWriter {
    dir: PathBuf,
}

impl DailyLogWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn current_file(&self) -> PathBuf {
        log_file_for(&self.dir, Local::now().date_naive())
    }
}

impl<'a> MakeWriter<'a> for DailyLogWriter {
    type Writer = LogFileHandle;

    fn make_writer(&'a self) -> Self::Writer {
        LogFileHandle {
            path: self.current_file(),
            file: None,
        }
    }
}

/// Lazily opened append handle for one event
pub struct LogFileHandle {
    path: PathBuf,
    file: Option<File>,
}

impl LogFileHandle {
    fn file(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file unavailable"))
    }
}

impl Write for LogFileHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// `[YYYY-MM-DD HH:MM:SS]` in local time
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "[{}]", Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}
