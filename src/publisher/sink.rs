//! Destinations for serialized status events

use std::io::Write;
use std::time::Duration;

use super::PublishError;

/// Append-only message channel addressed by topic
pub trait EventSink: Send {
    fn send(&mut self, topic: &str, key: Option<&[u8]>, payload: &[u8]) -> Result<(), PublishError>;

    /// Block until buffered messages are handed off or `timeout` passes
    fn flush(&mut self, _timeout: Duration) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Writes each payload as one line of JSON
pub struct WriterSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> EventSink for WriterSink<W> {
    fn send(&mut self, _topic: &str, _key: Option<&[u8]>, payload: &[u8]) -> Result<(), PublishError> {
        self.writer.write_all(payload)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self, _timeout: Duration) -> Result<(), PublishError> {
        self.writer.flush()?;
        Ok(())
    }
}
