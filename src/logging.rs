// src/logging.rs
//! Logging setup
//!
//! Console output goes through the usual `EnvFilter`-driven fmt layer. A
//! second, non-ANSI layer writes the same records to `<output>/log/drvpkg.log`.
//! The output directory only exists once the assembler has prepared it, so
//! records emitted before then are held in memory and flushed when the file
//! is attached.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

enum Sink {
    Pending(Vec<u8>),
    Open(File),
}

/// Log file writer that buffers until [`attach`](Self::attach) is called
#[derive(Clone)]
pub struct DeferredLogFile {
    sink: Arc<Mutex<Sink>>,
}

impl DeferredLogFile {
    pub fn new() -> Self {
        Self {
            sink: Arc::new(Mutex::new(Sink::Pending(Vec::new()))),
        }
    }

    /// Create `path`, write everything buffered so far, then write through
    pub fn attach(&self, path: &Path) -> io::Result<()> {
        let mut file = File::create(path)?;
        let mut sink = self
            .sink
            .lock()
            .map_err(|_| io::Error::other("log sink poisoned"))?;
        if let Sink::Pending(buffered) = &*sink {
            file.write_all(buffered)?;
        }
        *sink = Sink::Open(file);
        Ok(())
    }
}

impl Default for DeferredLogFile {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for DeferredLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut sink = self
            .sink
            .lock()
            .map_err(|_| io::Error::other("log sink poisoned"))?;
        match &mut *sink {
            Sink::Pending(buffered) => {
                buffered.extend_from_slice(buf);
                Ok(buf.len())
            }
            Sink::Open(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut sink = self
            .sink
            .lock()
            .map_err(|_| io::Error::other("log sink poisoned"))?;
        match &mut *sink {
            Sink::Pending(_) => Ok(()),
            Sink::Open(file) => file.flush(),
        }
    }
}

/// Install the global subscriber; returns the file writer to attach later
pub fn init(verbose: bool) -> DeferredLogFile {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let log_file = DeferredLogFile::new();
    let writer = log_file.clone();

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(move || writer.clone()),
        )
        .init();

    log_file
}
