//! JSON-lines push sink
//!
//! Stands in for the upstream pipeline: every pushed message is written as
//! one JSON object per line.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::warn;

use invsync_api::PushMessage;
use invsync_core::PushSink;

/// Push status for an accepted message
pub const PUSH_OK: i32 = 0;
/// Push status when the message could not be written
pub const PUSH_FAILED: i32 = -1;

/// Writes push messages as JSON lines
pub struct JsonLinesSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesSink {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Append to `path`, creating it and its parent directory if needed
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened.
    pub fn append(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file: File = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(Box::new(file)))
    }

    fn write_line(&self, message: &PushMessage) -> io::Result<()> {
        let line = serde_json::to_string(message)?;
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "{line}")?;
        out.flush()
    }
}

#[async_trait]
impl PushSink for JsonLinesSink {
    async fn push(&self, message: PushMessage) -> i32 {
        match self.write_line(&message) {
            Ok(()) => PUSH_OK,
            Err(e) => {
                warn!(error = %e, "failed to write push message");
                PUSH_FAILED
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn message(payload: &str) -> PushMessage {
        PushMessage {
            kind: invsync_api::MessageKind::Stateless,
            module: "inventory".to_string(),
            payload: payload.to_string(),
        }
    }

    #[tokio::test]
    async fn test_one_line_per_message() {
        let buf = SharedBuf::default();
        let sink = JsonLinesSink::new(Box::new(buf.clone()));

        assert_eq!(sink.push(message("{\"a\":1}")).await, PUSH_OK);
        assert_eq!(sink.push(message("{\"b\":2}")).await, PUSH_OK);

        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: PushMessage = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.payload, "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_write_failure_reports_status() {
        let sink = JsonLinesSink::new(Box::new(BrokenPipe));
        assert_eq!(sink.push(message("{}")).await, PUSH_FAILED);
    }
}
