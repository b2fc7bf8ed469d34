//! Where orchestration output goes.

use std::io::Write;

use parking_lot::Mutex;

/// Receives text fragments as they stream, plus status and error lines.
pub trait OutputSink: Send + Sync {
    /// A text fragment, in arrival order.
    fn text(&self, fragment: &str);

    /// A status line.
    fn status(&self, _line: &str) {}

    /// An error line.
    fn error(&self, _line: &str) {}
}

/// Text to stdout, flushed per fragment; status and errors to stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn text(&self, fragment: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(fragment.as_bytes());
        let _ = out.flush();
    }

    fn status(&self, line: &str) {
        eprintln!("[STATUS] {line}");
    }

    fn error(&self, line: &str) {
        eprintln!("[ERROR] {line}");
    }
}

/// In-memory sink.
#[derive(Debug, Default)]
pub struct BufferSink {
    text: Mutex<String>,
    statuses: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl BufferSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Concatenated text so far.
    pub fn text_output(&self) -> String {
        self.text.lock().clone()
    }

    /// Status lines so far.
    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().clone()
    }

    /// Error lines so far.
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

impl OutputSink for BufferSink {
    fn text(&self, fragment: &str) {
        self.text.lock().push_str(fragment);
    }

    fn status(&self, line: &str) {
        self.statuses.lock().push(line.to_string());
    }

    fn error(&self, line: &str) {
        self.errors.lock().push(line.to_string());
    }
}
