//! DataStream: the byte stream a protocol hands to a parser

use tokio::io::AsyncBufRead;
use tokio::task::JoinHandle;

/// A readable byte source plus per-stream framing position.
///
/// Streams backed by a live connection carry the task feeding them; the
/// task is aborted when the stream is dropped.
pub struct DataStream {
    reader: Box<dyn AsyncBufRead + Send + Unpin>,
    frames_read: usize,
    feeder: Option<JoinHandle<()>>,
}

impl DataStream {
    pub fn from_reader(reader: impl AsyncBufRead + Send + Unpin + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            frames_read: 0,
            feeder: None,
        }
    }

    /// An in-memory stream over a fetched body.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::from_reader(std::io::Cursor::new(bytes))
    }

    /// Attach the task that feeds this stream.
    pub fn with_feeder(mut self, feeder: JoinHandle<()>) -> Self {
        self.feeder = Some(feeder);
        self
    }

    pub fn reader(&mut self) -> &mut (dyn AsyncBufRead + Send + Unpin) {
        &mut *self.reader
    }

    /// Number of frames consumed so far
    pub fn frames_read(&self) -> usize {
        self.frames_read
    }

    /// Mark one frame consumed, returning its zero-based index.
    pub fn next_frame_index(&mut self) -> usize {
        let index = self.frames_read;
        self.frames_read += 1;
        index
    }
}

impl Drop for DataStream {
    fn drop(&mut self) {
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
    }
}

impl std::fmt::Debug for DataStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStream")
            .field("frames_read", &self.frames_read)
            .field("live", &self.feeder.is_some())
            .finish()
    }
}
