pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod job;
pub mod persist;
pub mod poll;
pub mod schemas;
pub mod workflow;

pub use cancel::CancelToken;
pub use client::{FusionBrainClient, GenApi};
pub use config::{AppConfig, Credentials};
pub use error::{Error, Result};
pub use events::{EventSink, LogLevel, WorkflowEvent};
pub use history::PromptHistory;
pub use job::{Job, JobStatus, StatusUpdate};
pub use persist::ResultPersister;
pub use poll::{PollConfig, PollOutcome};
pub use workflow::{GenerationRequest, RunSummary, SizeChoice, WorkflowContext};
