//! Size-capped JSONL log file.
//!
//! Once a line would push the file past `max_bytes`, the current file is
//! renamed to `<name>.1` (replacing any previous one) and a fresh file is
//! started.

use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// Default cap before rolling over: 10 MiB.
pub const DEFAULT_MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

struct Active {
    file: File,
    len: u64,
}

/// Shared handle onto the log file. Each `write` call is treated as one
/// whole record; rollover only happens between records.
#[derive(Clone)]
pub struct RollingLogFile {
    path: Arc<PathBuf>,
    max_bytes: u64,
    active: Arc<Mutex<Active>>,
}

impl RollingLogFile {
    /// Open `path` for appending, creating parent directories. A `max_bytes`
    /// of 0 disables rollover.
    pub fn open(path: &Path, max_bytes: u64) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = append_to(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            path: Arc::new(path.to_path_buf()),
            max_bytes,
            active: Arc::new(Mutex::new(Active { file, len })),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the previous file goes on rollover.
    pub fn rolled_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".1");
        PathBuf::from(name)
    }

    fn append(&self, record: &[u8]) -> io::Result<()> {
        let mut active = self.active.lock();
        let incoming = record.len() as u64;
        if self.max_bytes > 0 && active.len > 0 && active.len + incoming > self.max_bytes {
            active.file.flush()?;
            fs::rename(self.path.as_path(), self.rolled_path())?;
            active.file = append_to(&self.path)?;
            active.len = 0;
        }
        active.file.write_all(record)?;
        active.len += incoming;
        Ok(())
    }
}

fn append_to(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl Write for RollingLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.active.lock().file.flush()
    }
}

impl<'a> MakeWriter<'a> for RollingLogFile {
    type Writer = RollingLogFile;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
