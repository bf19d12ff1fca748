//! Append-only audit log
//!
//! [`AuditLog`] is shared by every trigger task and the termination monitor.
//! Appends are best-effort: the first sink failure is reported once and the
//! run carries on without a durability guarantee for later records.
//!
//! A writer first [`reserve`](AuditLog::reserve)s a position, then fills it.
//! Records reach the sink in position order, so a writer that reserves while
//! holding a state lock keeps its place even when building the record is slow.

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::events::LogRecord;
use crate::types::LogFormat;

/// Destination of audit records
pub trait AuditSink: Send {
    /// Write one record
    fn write(&mut self, record: &LogRecord) -> io::Result<()>;

    /// Flush buffered records
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Path of the backing file, if any
    fn location(&self) -> Option<&Path> {
        None
    }
}

/// Audit sink writing text or JSON lines to a file
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    format: LogFormat,
    writer: BufWriter<File>,
}

impl FileSink {
    /// Create `<directory>/<name>/<name>_<YYYYmmdd_HHMMSS>.<ext>`
    pub fn create(
        directory: impl AsRef<Path>,
        simulation_name: &str,
        format: LogFormat,
        started_at: DateTime<Local>,
    ) -> io::Result<Self> {
        let folder = directory.as_ref().join(simulation_name);
        fs::create_dir_all(&folder)?;

        let file_name = format!(
            "{}_{}.{}",
            simulation_name,
            started_at.format("%Y%m%d_%H%M%S"),
            format.extension()
        );
        Self::open(folder.join(file_name), format)
    }

    /// Create or truncate the file at `path`
    pub fn open(path: impl Into<PathBuf>, format: LogFormat) -> io::Result<Self> {
        let path = path.into();
        let file = File::create(&path)?;
        info!("Writing audit log to {}", path.display());
        Ok(Self { path, format, writer: BufWriter::new(file) })
    }

    /// Path of the audit file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for FileSink {
    fn write(&mut self, record: &LogRecord) -> io::Result<()> {
        match self.format {
            LogFormat::Text => writeln!(self.writer, "{}", record.to_text())?,
            LogFormat::Json => {
                serde_json::to_writer(&mut self.writer, record)?;
                writeln!(self.writer)?;
            }
        }
        self.writer.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// In-memory audit sink
///
/// Clones share the same buffer, so a caller can keep one clone and hand the
/// other to the simulation.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record written so far
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Number of records written so far
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl AuditSink for MemorySink {
    fn write(&mut self, record: &LogRecord) -> io::Result<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// Sink plus the filled positions still waiting for an earlier one
struct Writer {
    sink: Box<dyn AuditSink>,
    next: u64,
    held: BTreeMap<u64, Option<LogRecord>>,
}

/// Reserved position in an [`AuditLog`]
///
/// Dropping a slot without filling it releases the position, so later
/// records are never held back by a writer that gave up.
#[must_use = "an unfilled slot only releases its position"]
pub struct AuditSlot<'a> {
    log: &'a AuditLog,
    position: u64,
    filled: bool,
}

impl fmt::Debug for AuditSlot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditSlot").field("position", &self.position).finish()
    }
}

impl AuditSlot<'_> {
    /// Position of this slot in the log
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Write `record` at this slot's position
    pub fn fill(mut self, record: LogRecord) {
        self.filled = true;
        self.log.settle(self.position, Some(record));
    }
}

impl Drop for AuditSlot<'_> {
    fn drop(&mut self) {
        if !self.filled {
            self.log.settle(self.position, None);
        }
    }
}

/// Thread-safe, append-only audit log
pub struct AuditLog {
    writer: Mutex<Writer>,
    next_position: Mutex<u64>,
    location: Option<PathBuf>,
    appended: AtomicU64,
    failed: AtomicBool,
    closed: AtomicBool,
}

impl fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditLog")
            .field("location", &self.location)
            .field("appended", &self.appended())
            .field("held", &self.held())
            .field("failed", &self.has_failed())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl AuditLog {
    /// Create a log writing to `sink`
    pub fn new(sink: impl AuditSink + 'static) -> Self {
        Self::from_boxed(Box::new(sink))
    }

    /// Create a log writing to an already boxed sink
    pub fn from_boxed(sink: Box<dyn AuditSink>) -> Self {
        let location = sink.location().map(Path::to_path_buf);
        Self {
            writer: Mutex::new(Writer { sink, next: 0, held: BTreeMap::new() }),
            next_position: Mutex::new(0),
            location,
            appended: AtomicU64::new(0),
            failed: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Reserve the next position, calling `stamp` while it is being handed out
    ///
    /// Positions are handed out one at a time, so values produced by `stamp`
    /// (typically the record timestamp) follow position order.
    pub fn reserve<T>(&self, stamp: impl FnOnce() -> T) -> (AuditSlot<'_>, T) {
        let mut next = self.next_position.lock();
        let value = stamp();
        let position = *next;
        *next += 1;
        (AuditSlot { log: self, position, filled: false }, value)
    }

    /// Append a record after everything reserved so far
    ///
    /// Never fails. Records appended after [`finalize`](Self::finalize) are dropped.
    pub fn append(&self, record: LogRecord) {
        let (slot, ()) = self.reserve(|| ());
        slot.fill(record);
    }

    fn settle(&self, position: u64, record: Option<LogRecord>) {
        let mut writer = self.writer.lock();
        writer.held.insert(position, record);

        loop {
            let next = writer.next;
            let Some(entry) = writer.held.remove(&next) else {
                break;
            };
            writer.next += 1;
            if let Some(record) = entry {
                self.write(&mut writer, &record);
            }
        }
    }

    fn write(&self, writer: &mut Writer, record: &LogRecord) {
        if self.closed.load(Ordering::Acquire) {
            debug!("Dropping audit record after finalize: {}", record.description());
            return;
        }

        match writer.sink.write(record) {
            Ok(()) => {
                self.appended.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => self.report_failure(&e),
        }
    }

    /// Flush the sink and refuse further records
    ///
    /// Records still waiting behind an unfilled position are written first,
    /// in position order.
    pub fn finalize(&self) {
        let mut writer = self.writer.lock();
        if self.closed.load(Ordering::Acquire) {
            return;
        }

        let held = std::mem::take(&mut writer.held);
        if !held.is_empty() {
            debug!("Writing {} audit records held behind unfilled positions", held.len());
        }
        for record in held.into_values().flatten() {
            self.write(&mut writer, &record);
        }

        if let Err(e) = writer.sink.flush() {
            self.report_failure(&e);
        }
        self.closed.store(true, Ordering::Release);
        debug!("Audit log finalized after {} records", self.appended());
    }

    fn report_failure(&self, e: &io::Error) {
        if !self.failed.swap(true, Ordering::AcqRel) {
            error!("Audit log sink failed, later records may be lost: {}", e);
        }
    }

    /// Number of records successfully written
    pub fn appended(&self) -> u64 {
        self.appended.load(Ordering::Relaxed)
    }

    /// Number of filled records waiting for an earlier position
    pub fn held(&self) -> usize {
        self.writer.lock().held.len()
    }

    /// Whether the sink ever reported a failure
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Whether the log was finalized
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Path of the backing file, if any
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }
}
