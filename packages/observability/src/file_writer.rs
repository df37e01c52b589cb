//! Append-only JSONL file writer.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// Line-flushed file writer shared by every event.
#[derive(Clone)]
pub struct FileLogWriter {
    inner: Arc<Mutex<BufWriter<File>>>,
}

impl FileLogWriter {
    /// Open `path` for appending, creating parent directories as needed.
    pub fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(BufWriter::with_capacity(8192, file))),
        })
    }
}

impl io::Write for FileLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock();
        let result = guard.write(buf);
        // One flush per line keeps concurrent tailers in sync.
        guard.flush()?;
        result
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

/// `MakeWriter` adapter for tracing-subscriber.
#[derive(Clone)]
pub struct WriterFactory {
    writer: FileLogWriter,
}

impl WriterFactory {
    pub fn new(writer: FileLogWriter) -> Self {
        Self { writer }
    }
}

impl<'a> MakeWriter<'a> for WriterFactory {
    type Writer = FileLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.writer.clone()
    }
}
