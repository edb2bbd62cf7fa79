//! Line-buffered output channel.
//!
//! Guest programs are written against a native, line-buffered stdout and
//! assume their text is not interleaved mid-line with other output. The
//! channel accumulates fragments and only releases complete lines to its
//! sink; whatever trails the last newline waits for more text or an
//! explicit [`OutputChannel::flush`].

use std::io::Write;
use std::sync::{Arc, Mutex};

/// Destination for released text.
pub trait OutputSink {
    fn emit(&mut self, text: &str);
}

impl<F: FnMut(&str)> OutputSink for F {
    fn emit(&mut self, text: &str) {
        self(text)
    }
}

/// Writes released text to the process stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn emit(&mut self, text: &str) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
            tracing::warn!("dropping {} bytes of guest output: {e}", text.len());
        }
    }
}

/// Sink that records every emission; clones share the same record.
#[derive(Debug, Default, Clone)]
pub struct CaptureSink {
    chunks: Arc<Mutex<Vec<String>>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every emitted chunk, one entry per sink call.
    pub fn chunks(&self) -> Vec<String> {
        self.chunks.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// All emitted text concatenated.
    pub fn text(&self) -> String {
        self.chunks().concat()
    }
}

impl OutputSink for CaptureSink {
    fn emit(&mut self, text: &str) {
        if let Ok(mut chunks) = self.chunks.lock() {
            chunks.push(text.to_string());
        }
    }
}

/// Accumulates guest text and releases it line by line.
pub struct OutputChannel {
    buffer: String,
    sink: Box<dyn OutputSink>,
}

impl OutputChannel {
    pub fn new(sink: impl OutputSink + 'static) -> Self {
        Self {
            buffer: String::new(),
            sink: Box::new(sink),
        }
    }

    /// Append `text`; if the buffer now holds a newline, emit everything up
    /// to and including the last one in a single sink call.
    pub fn write(&mut self, text: &str) {
        self.buffer.push_str(text);
        if let Some(idx) = self.buffer.rfind('\n') {
            let rest = self.buffer.split_off(idx + 1);
            let lines = std::mem::replace(&mut self.buffer, rest);
            self.sink.emit(&lines);
        }
    }

    /// Emit whatever is pending, newline or not. No-op when empty.
    pub fn flush(&mut self) {
        if !self.buffer.is_empty() {
            let pending = std::mem::take(&mut self.buffer);
            self.sink.emit(&pending);
        }
    }

    /// Text waiting for a newline or a flush.
    pub fn pending(&self) -> &str {
        &self.buffer
    }
}

impl std::fmt::Debug for OutputChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputChannel")
            .field("pending", &self.buffer)
            .finish_non_exhaustive()
    }
}
