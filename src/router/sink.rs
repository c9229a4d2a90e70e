use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};

use parking_lot::Mutex;
use tracing::debug;

use crate::utils::error::SinkError;

/// Destination of decoded payloads: a file or standard output.
///
/// Opened once; writers are serialised so each payload lands in one piece.
pub struct OutputSink {
    label: String,
    inner: Mutex<Box<dyn Write + Send>>,
}

impl OutputSink {
    /// Opens `path` (created or truncated), or stdout when `path` is `None`.
    pub fn open(path: Option<&str>) -> Result<Self, SinkError> {
        match path {
            None => Ok(Self::stdout()),
            Some(path) => {
                let file = File::create(path).map_err(|source| SinkError::Create {
                    path: path.to_string(),
                    source,
                })?;
                debug!("Output file is {path}");
                Ok(Self::from_writer(path, BufWriter::new(file)))
            }
        }
    }

    pub fn stdout() -> Self {
        Self::from_writer("stdout", io::stdout())
    }

    pub fn from_writer(label: impl Into<String>, writer: impl Write + Send + 'static) -> Self {
        Self {
            label: label.into(),
            inner: Mutex::new(Box::new(writer)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Writes one whole payload and flushes it.
    pub fn write_payload(&self, payload: &[u8]) -> Result<(), SinkError> {
        let mut inner = self.inner.lock();
        inner
            .write_all(payload)
            .map_err(|source| SinkError::Write {
                sink: self.label.clone(),
                len: payload.len(),
                source,
            })?;
        inner.flush().map_err(|source| SinkError::Flush {
            sink: self.label.clone(),
            source,
        })
    }

    pub fn flush(&self) -> Result<(), SinkError> {
        self.inner.lock().flush().map_err(|source| SinkError::Flush {
            sink: self.label.clone(),
            source,
        })
    }
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSink")
            .field("label", &self.label)
            .finish()
    }
}
