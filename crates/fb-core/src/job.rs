#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Done,
    Failed,
}

impl JobStatus {
    /// Map a raw server status. Anything that is not terminal
    /// (INITIAL, PROCESSING, ...) is still pending from our point of view.
    pub fn from_server(status: &str) -> Self {
        match status {
            "DONE" => Self::Done,
            "FAILED" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// What a single status call reports about a task.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: JobStatus,
    /// First file of the result, base64 encoded.
    pub result_payload: Option<String>,
    pub error: Option<String>,
}

impl StatusUpdate {
    pub fn pending() -> Self {
        Self {
            status: JobStatus::Pending,
            result_payload: None,
            error: None,
        }
    }

    pub fn done(payload: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Done,
            result_payload: Some(payload.into()),
            error: None,
        }
    }

    pub fn failed(error: Option<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            result_payload: None,
            error,
        }
    }
}

/// One server-side task, created on submit and updated by polling.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub pipeline_id: String,
    pub task_id: String,
    pub status: JobStatus,
    pub result_payload: Option<String>,
    pub error: Option<String>,
}

impl Job {
    pub fn pending(pipeline_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            task_id: task_id.into(),
            status: JobStatus::Pending,
            result_payload: None,
            error: None,
        }
    }

    /// Take over the latest status. A payload, once received, is kept.
    pub fn apply(&mut self, update: StatusUpdate) {
        self.status = update.status;
        self.error = update.error;
        if update.result_payload.is_some() {
            self.result_payload = update.result_payload;
        }
    }
}
