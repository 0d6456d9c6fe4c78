// ImpactWatch — Synchronized multi-stream CSV logger
//
// Every registered stream contributes columns to one row per sample index.
// A sync writes `min(len)` rows across all streams so rows never go ragged,
// then (in `Consume` mode) pops exactly that many entries from every stream.
// Rows are built with `peek` and popped only after the write succeeded, so a
// failed write leaves the buffered history untouched for the next attempt.
// Records go through a `csv::Writer` with CRLF terminators.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use csv::{StringRecord, Terminator, WriterBuilder};
use thiserror::Error;

use crate::buffer::{ScalarStream, VectorStream};
use crate::config::{MAX_SCALAR_STREAMS, MAX_VECTOR_STREAMS};

#[derive(Debug, Error)]
pub enum LogError {
    #[error("no log file name configured")]
    NoFilename,
    #[error("storage error on {name}: {source}")]
    Storage {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("{kind} stream registry is full ({max} streams)")]
    RegistryFull { kind: &'static str, max: usize },
}

// ---------------------------------------------------------------------------
// Storage backend
// ---------------------------------------------------------------------------

/// Flat namespace of append-only files.
pub trait Storage: Send {
    fn exists(&self, name: &str) -> bool;
    /// Open `name` for appending, creating it if needed.
    fn append(&mut self, name: &str) -> io::Result<Box<dyn Write + Send>>;
}

/// Files under a directory (the SD card mount point on the device).
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Use an already-mounted directory as is. Failures surface on open.
    pub fn mounted(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Storage for FsStorage {
    fn exists(&self, name: &str) -> bool {
        self.root.join(name).exists()
    }

    fn append(&mut self, name: &str) -> io::Result<Box<dyn Write + Send>> {
        let file = OpenOptions::new().create(true).append(true).open(self.root.join(name))?;
        Ok(Box::new(file))
    }
}

// ---------------------------------------------------------------------------
// Stream registry
// ---------------------------------------------------------------------------

pub type ScalarAccessor<C> = fn(&mut C) -> &mut ScalarStream;
pub type VectorAccessor<C> = fn(&mut C) -> &mut VectorStream;

/// Which streams feed the log, as accessors into a context `C` that owns them.
/// Scalar columns come first, then four columns per vector stream.
pub struct StreamRegistry<C> {
    scalars: Vec<ScalarAccessor<C>>,
    vectors: Vec<VectorAccessor<C>>,
}

impl<C> Default for StreamRegistry<C> {
    fn default() -> Self {
        Self { scalars: Vec::new(), vectors: Vec::new() }
    }
}

impl<C> StreamRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_scalar(&mut self, stream: ScalarAccessor<C>) -> Result<(), LogError> {
        if self.scalars.len() >= MAX_SCALAR_STREAMS {
            return Err(LogError::RegistryFull { kind: "scalar", max: MAX_SCALAR_STREAMS });
        }
        self.scalars.push(stream);
        Ok(())
    }

    pub fn register_vector(&mut self, stream: VectorAccessor<C>) -> Result<(), LogError> {
        if self.vectors.len() >= MAX_VECTOR_STREAMS {
            return Err(LogError::RegistryFull { kind: "vector", max: MAX_VECTOR_STREAMS });
        }
        self.vectors.push(stream);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty() && self.vectors.is_empty()
    }

    pub fn stream_count(&self) -> usize {
        self.scalars.len() + self.vectors.len()
    }

    /// Column names.
    pub fn header(&self, ctx: &mut C) -> StringRecord {
        let mut record = StringRecord::new();
        for stream in &self.scalars {
            record.push_field(stream(ctx).header());
        }
        for stream in &self.vectors {
            let name = stream(ctx).header().to_string();
            for axis in ["X", "Y", "Z", "Magnitude"] {
                record.push_field(&format!("{}:{}", name, axis));
            }
        }
        record
    }

    /// Rows every registered stream can fill. 0 with nothing registered.
    pub fn min_len(&self, ctx: &mut C) -> usize {
        let mut min: Option<usize> = None;
        for stream in &self.scalars {
            let len = stream(ctx).len();
            min = Some(min.map_or(len, |m| m.min(len)));
        }
        for stream in &self.vectors {
            let len = stream(ctx).len();
            min = Some(min.map_or(len, |m| m.min(len)));
        }
        min.unwrap_or(0)
    }

    /// One row of values at `index` (0 = newest), without consuming anything.
    pub fn row(&self, ctx: &mut C, index: usize) -> StringRecord {
        let mut record = StringRecord::new();
        let mut push = |v: f64| record.push_field(&format!("{:.6}", v));
        for stream in &self.scalars {
            push(stream(ctx).peek(index).unwrap_or_default());
        }
        for stream in &self.vectors {
            let s = stream(ctx).peek(index).unwrap_or_default();
            push(s.x);
            push(s.y);
            push(s.z);
            push(s.magnitude());
        }
        record
    }

    /// Drop the `rows` newest entries from every stream.
    pub fn consume(&self, ctx: &mut C, rows: usize) {
        for _ in 0..rows {
            for stream in &self.scalars {
                stream(ctx).pop_front();
            }
            for stream in &self.vectors {
                stream(ctx).pop_front();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Logger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainMode {
    /// Pop written rows (recording session).
    Consume,
    /// Leave streams untouched.
    Retain,
}

pub struct SynchronizedLogger<C> {
    storage: Box<dyn Storage>,
    registry: StreamRegistry<C>,
    base: String,
    extension: String,
    sequence: u32,
    file: Option<(String, csv::Writer<Box<dyn Write + Send>>)>,
    header_written: bool,
}

impl<C> SynchronizedLogger<C> {
    pub fn new(storage: Box<dyn Storage>, base: &str, extension: &str) -> Self {
        Self {
            storage,
            registry: StreamRegistry::new(),
            base: base.to_string(),
            extension: extension.to_string(),
            sequence: 0,
            file: None,
            header_written: false,
        }
    }

    pub fn registry(&self) -> &StreamRegistry<C> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut StreamRegistry<C> {
        &mut self.registry
    }

    /// Change the file naming; takes effect on the next open.
    pub fn set_filename(&mut self, base: &str, extension: &str) {
        self.base = base.to_string();
        self.extension = extension.to_string();
    }

    pub fn file_name(&self, sequence: u32) -> String {
        format!("{}_{}{}", self.base, sequence, self.extension)
    }

    /// Name of the open file, if any.
    pub fn current_file(&self) -> Option<&str> {
        self.file.as_ref().map(|(name, _)| name.as_str())
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Select the sequence number for the next file. A different number
    /// closes the current file so the next sync starts fresh.
    pub fn set_sequence(&mut self, sequence: u32) {
        if sequence != self.sequence {
            self.close();
            self.sequence = sequence;
        }
    }

    /// Open the first unused `<base>_<n><ext>` with `n >= sequence`.
    pub fn open(&mut self) -> Result<(), LogError> {
        if self.file.is_some() {
            return Ok(());
        }
        if self.base.is_empty() {
            return Err(LogError::NoFilename);
        }
        let mut sequence = self.sequence;
        while self.storage.exists(&self.file_name(sequence)) {
            sequence += 1;
        }
        let name = self.file_name(sequence);
        let writer = self
            .storage
            .append(&name)
            .map_err(|source| LogError::Storage { name: name.clone(), source })?;
        log::info!("Logging to {}", name);
        let writer = WriterBuilder::new().terminator(Terminator::CRLF).from_writer(writer);
        self.sequence = sequence;
        self.header_written = false;
        self.file = Some((name, writer));
        Ok(())
    }

    pub fn close(&mut self) {
        if let Some((name, mut writer)) = self.file.take() {
            if let Err(e) = writer.flush() {
                log::warn!("Flush on close of {} failed: {}", name, e);
            }
            log::info!("Closed {}", name);
        }
        self.header_written = false;
    }

    /// Write every complete row to the open file (opening it first if
    /// needed). Returns the number of rows written.
    pub fn sync(&mut self, ctx: &mut C, mode: DrainMode) -> Result<usize, LogError> {
        self.open()?;

        let rows = self.registry.min_len(ctx);
        let mut records = Vec::with_capacity(rows + 1);
        if !self.header_written {
            records.push(self.registry.header(ctx));
        }
        for index in 0..rows {
            records.push(self.registry.row(ctx, index));
        }

        if let Err(e) = self.write(&records) {
            let name = self.current_file().unwrap_or_default().to_string();
            log::warn!("Write to {} failed ({}); will reopen next cycle", name, e);
            self.file = None;
            self.header_written = false;
            return Err(LogError::Storage { name, source: e });
        }
        self.header_written = true;

        if mode == DrainMode::Consume {
            self.registry.consume(ctx, rows);
        }
        Ok(rows)
    }

    fn write(&mut self, records: &[StringRecord]) -> io::Result<()> {
        match self.file.as_mut() {
            Some((_, writer)) => {
                for record in records {
                    writer.write_record(record)?;
                }
                writer.flush()
            }
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "no file open")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Sample3;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[derive(Default)]
    struct Streams {
        a: ScalarStream,
        b: ScalarStream,
        v: VectorStream,
    }

    fn filled(a: usize, b: usize, v: usize) -> Streams {
        let mut s = Streams {
            a: ScalarStream::with_header("A"),
            b: ScalarStream::with_header("B"),
            v: VectorStream::with_header("V"),
        };
        for i in 0..a {
            s.a.prepend(i as f64);
        }
        for i in 0..b {
            s.b.prepend(10.0 + i as f64);
        }
        for i in 0..v {
            s.v.prepend(Sample3::new(i as f64, 0.0, 0.0));
        }
        s
    }

    fn logger(storage: Box<dyn Storage>) -> SynchronizedLogger<Streams> {
        let mut logger: SynchronizedLogger<Streams> = SynchronizedLogger::new(storage, "impact", ".csv");
        let reg = logger.registry_mut();
        reg.register_scalar(|s| &mut s.a).unwrap();
        reg.register_scalar(|s| &mut s.b).unwrap();
        reg.register_vector(|s| &mut s.v).unwrap();
        logger
    }

    #[test]
    fn header_expands_vector_columns() {
        let log = logger(Box::new(FsStorage::new(tempdir().unwrap().path()).unwrap()));
        let mut s = filled(0, 0, 0);
        let header = log.registry().header(&mut s);
        assert_eq!(header.iter().collect::<Vec<_>>(), ["A", "B", "V:X", "V:Y", "V:Z", "V:Magnitude"]);
    }

    #[test]
    fn header_names_are_quoted_when_needed() {
        let dir = tempdir().unwrap();
        let mut log = logger(Box::new(FsStorage::new(dir.path()).unwrap()));
        let mut s = filled(1, 1, 1);
        s.a = ScalarStream::with_header("Force, N");
        s.a.prepend(1.5);
        log.sync(&mut s, DrainMode::Consume).unwrap();
        log.close();

        let text = fs::read_to_string(dir.path().join("impact_0.csv")).unwrap();
        assert_eq!(
            text,
            "\"Force, N\",B,V:X,V:Y,V:Z,V:Magnitude\r\n1.500000,10.000000,0.000000,0.000000,0.000000,0.000000\r\n"
        );

        let mut reader = csv::ReaderBuilder::new().from_path(dir.path().join("impact_0.csv")).unwrap();
        assert_eq!(&reader.headers().unwrap()[0], "Force, N");
        assert_eq!(reader.records().count(), 1);
    }

    #[test]
    fn consume_writes_min_rows_and_pops_them() {
        let dir = tempdir().unwrap();
        let mut log = logger(Box::new(FsStorage::new(dir.path()).unwrap()));
        let mut s = filled(7, 3, 5);

        assert_eq!(log.sync(&mut s, DrainMode::Consume).unwrap(), 3);
        assert_eq!((s.a.len(), s.b.len(), s.v.len()), (4, 0, 2));

        let text = fs::read_to_string(dir.path().join("impact_0.csv")).unwrap();
        let lines: Vec<&str> = text.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "A,B,V:X,V:Y,V:Z,V:Magnitude");
        assert_eq!(lines[1], "6.000000,12.000000,4.000000,0.000000,0.000000,4.000000");
        assert!(text.ends_with("\r\n"));
    }

    #[test]
    fn retain_leaves_streams_untouched() {
        let dir = tempdir().unwrap();
        let mut log = logger(Box::new(FsStorage::new(dir.path()).unwrap()));
        let mut s = filled(7, 3, 5);
        assert_eq!(log.sync(&mut s, DrainMode::Retain).unwrap(), 3);
        assert_eq!((s.a.len(), s.b.len(), s.v.len()), (7, 3, 5));
    }

    #[test]
    fn header_written_once_per_file() {
        let dir = tempdir().unwrap();
        let mut log = logger(Box::new(FsStorage::new(dir.path()).unwrap()));
        let mut s = filled(2, 2, 2);
        log.sync(&mut s, DrainMode::Consume).unwrap();
        let mut s = filled(1, 1, 1);
        log.sync(&mut s, DrainMode::Consume).unwrap();
        log.close();

        let text = fs::read_to_string(dir.path().join("impact_0.csv")).unwrap();
        assert_eq!(text.matches("A,B,V:X").count(), 1);
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn open_skips_existing_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("impact_0.csv"), "old").unwrap();
        fs::write(dir.path().join("impact_1.csv"), "old").unwrap();
        let mut log = logger(Box::new(FsStorage::new(dir.path()).unwrap()));
        log.open().unwrap();
        assert_eq!(log.sequence(), 2);
        assert_eq!(log.current_file(), Some("impact_2.csv"));
        assert_eq!(fs::read_to_string(dir.path().join("impact_0.csv")).unwrap(), "old");
    }

    #[test]
    fn new_sequence_starts_a_new_file() {
        let dir = tempdir().unwrap();
        let mut log = logger(Box::new(FsStorage::new(dir.path()).unwrap()));
        let mut s = filled(1, 1, 1);
        log.sync(&mut s, DrainMode::Consume).unwrap();
        log.set_sequence(log.sequence() + 1);
        assert!(!log.is_open());
        let mut s = filled(1, 1, 1);
        log.sync(&mut s, DrainMode::Consume).unwrap();
        assert_eq!(log.current_file(), Some("impact_1.csv"));
        let text = fs::read_to_string(dir.path().join("impact_1.csv")).unwrap();
        assert!(text.starts_with("A,B,V:X"));
    }

    #[test]
    fn missing_filename_is_reported() {
        let dir = tempdir().unwrap();
        let mut log = logger(Box::new(FsStorage::new(dir.path()).unwrap()));
        log.set_filename("", ".csv");
        let mut s = filled(1, 1, 1);
        assert!(matches!(log.sync(&mut s, DrainMode::Consume), Err(LogError::NoFilename)));
        assert_eq!(s.a.len(), 1);
    }

    #[test]
    fn registry_is_bounded() {
        let mut reg = StreamRegistry::<Streams>::new();
        for _ in 0..MAX_SCALAR_STREAMS {
            reg.register_scalar(|s| &mut s.a).unwrap();
        }
        assert!(matches!(
            reg.register_scalar(|s| &mut s.b),
            Err(LogError::RegistryFull { kind: "scalar", .. })
        ));
    }

    /// Storage whose writers start failing once `broken` is set.
    struct FlakyStorage {
        inner: FsStorage,
        broken: Arc<AtomicBool>,
    }

    struct FlakyWriter {
        inner: Box<dyn Write + Send>,
        broken: Arc<AtomicBool>,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::Other, "card removed"));
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.flush()
        }
    }

    impl Storage for FlakyStorage {
        fn exists(&self, name: &str) -> bool {
            self.inner.exists(name)
        }

        fn append(&mut self, name: &str) -> io::Result<Box<dyn Write + Send>> {
            let inner = self.inner.append(name)?;
            Ok(Box::new(FlakyWriter { inner, broken: Arc::clone(&self.broken) }))
        }
    }

    #[test]
    fn failed_write_keeps_data_and_recovers_with_new_file() {
        let dir = tempdir().unwrap();
        let broken = Arc::new(AtomicBool::new(false));
        let storage = FlakyStorage {
            inner: FsStorage::new(dir.path()).unwrap(),
            broken: Arc::clone(&broken),
        };
        let mut log = logger(Box::new(storage));
        let mut s = filled(1, 1, 1);
        log.sync(&mut s, DrainMode::Consume).unwrap();

        let mut s = filled(4, 4, 4);
        broken.store(true, Ordering::SeqCst);
        assert!(matches!(log.sync(&mut s, DrainMode::Consume), Err(LogError::Storage { .. })));
        assert!(!log.is_open());
        assert_eq!(s.a.len(), 4);

        broken.store(false, Ordering::SeqCst);
        assert_eq!(log.sync(&mut s, DrainMode::Consume).unwrap(), 4);
        assert_eq!(log.current_file(), Some("impact_1.csv"));
        let text = fs::read_to_string(dir.path().join("impact_1.csv")).unwrap();
        assert!(text.starts_with("A,B,V:X"));
        assert_eq!(s.a.len(), 0);
    }
}
