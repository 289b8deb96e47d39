use std::path::PathBuf;
use std::sync::mpsc::Sender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Progress reported by a running workflow. The front end renders these;
/// the workflow never touches presentation state directly.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    Log { level: LogLevel, message: String },
    Started { prompt: String, width: u32, height: u32, total: u32 },
    Iteration { index: u32, total: u32 },
    Attempt { attempt: u32, max: u32 },
    Saved(PathBuf),
    Cancelled,
}

impl WorkflowEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self::Log { level: LogLevel::Info, message: message.into() }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::Log { level: LogLevel::Warn, message: message.into() }
    }
}

/// Where a workflow pushes its events. Implementations must be cheap and
/// must not block; a disconnected receiver is silently ignored.
pub trait EventSink: Send {
    fn emit(&self, event: WorkflowEvent);
}

impl EventSink for Sender<WorkflowEvent> {
    fn emit(&self, event: WorkflowEvent) {
        let _ = self.send(event);
    }
}

/// Discards everything.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: WorkflowEvent) {}
}
