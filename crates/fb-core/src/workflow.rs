use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use chrono::Local;
use log::info;
use crate::cancel::CancelToken;
use crate::client::GenApi;
use crate::error::{Error, Result};
use crate::events::{EventSink, WorkflowEvent};
use crate::job::Job;
use crate::persist::ResultPersister;
use crate::poll::{poll_job, PollConfig, PollOutcome};

pub const DEFAULT_SIZE: u32 = 1024;
pub const PRESET_SIZES: [u32; 7] = [128, 256, 512, 768, 1024, 1280, 1536];
pub const MIN_CUSTOM_SIZE: u32 = 64;
pub const MAX_CUSTOM_SIZE: u32 = 4096;
pub const MAX_REPEATS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeChoice {
    Preset(u32),
    Custom { width: u32, height: u32 },
}

impl Default for SizeChoice {
    fn default() -> Self {
        Self::Preset(DEFAULT_SIZE)
    }
}

impl SizeChoice {
    pub fn dimensions(&self) -> Result<(u32, u32)> {
        match *self {
            Self::Preset(n) if PRESET_SIZES.contains(&n) => Ok((n, n)),
            Self::Preset(n) => Err(Error::Validation(format!(
                "{n} is not a preset size (choose one of {PRESET_SIZES:?} or WxH)"
            ))),
            Self::Custom { width, height } => {
                let range = MIN_CUSTOM_SIZE..=MAX_CUSTOM_SIZE;
                if !range.contains(&width) || !range.contains(&height) {
                    return Err(Error::Validation(format!(
                        "custom size must be between {MIN_CUSTOM_SIZE}x{MIN_CUSTOM_SIZE} and {MAX_CUSTOM_SIZE}x{MAX_CUSTOM_SIZE}, got {width}x{height}"
                    )));
                }
                Ok((width, height))
            }
        }
    }
}

impl FromStr for SizeChoice {
    type Err = Error;

    /// `1024` selects a preset, `800x600` a custom size.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        let number = |v: &str| {
            v.trim()
                .parse::<u32>()
                .map_err(|_| Error::Validation(format!("'{v}' is not a valid size")))
        };

        match s.split_once('x') {
            Some((w, h)) => Ok(Self::Custom { width: number(w)?, height: number(h)? }),
            None => Ok(Self::Preset(number(&s)?)),
        }
    }
}

impl fmt::Display for SizeChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preset(n) => write!(f, "{n}x{n}"),
            Self::Custom { width, height } => write!(f, "{width}x{height}"),
        }
    }
}

/// A validated request. Construct through [`GenerationRequest::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub repeat_count: u32,
    pub save_original_size: bool,
}

impl GenerationRequest {
    pub fn new(prompt: &str, size: SizeChoice, repeat_count: u32, save_original_size: bool) -> Result<Self> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(Error::Validation("prompt is empty".into()));
        }

        if !(1..=MAX_REPEATS).contains(&repeat_count) {
            return Err(Error::Validation(format!(
                "repeat count must be between 1 and {MAX_REPEATS}, got {repeat_count}"
            )));
        }

        let (width, height) = size.dimensions()?;

        Ok(Self {
            prompt: prompt.to_string(),
            width,
            height,
            repeat_count,
            save_original_size,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub saved: Vec<PathBuf>,
    pub completed: u32,
    pub cancelled: bool,
}

/// Everything a generation run needs, passed in explicitly.
pub struct WorkflowContext {
    pub api: Box<dyn GenApi + Send>,
    pub persister: ResultPersister,
    pub poll: PollConfig,
    pub cancel: CancelToken,
    pub events: Box<dyn EventSink>,
}

impl WorkflowContext {
    pub fn new(api: Box<dyn GenApi + Send>, persister: ResultPersister, events: Box<dyn EventSink>) -> Self {
        Self {
            api,
            persister,
            poll: PollConfig::default(),
            cancel: CancelToken::new(),
            events,
        }
    }

    fn emit(&self, event: WorkflowEvent) {
        self.events.emit(event);
    }
}

/// Run submit, poll and save `repeat_count` times in sequence.
///
/// The first error aborts the remaining iterations. A set cancel token stops
/// the run at the next iteration or poll attempt without an error.
pub fn run_generation(ctx: &WorkflowContext, request: &GenerationRequest) -> Result<RunSummary> {
    let total = request.repeat_count;
    let size = (request.width, request.height);
    let mut summary = RunSummary::default();

    ctx.emit(WorkflowEvent::Started {
        prompt: request.prompt.clone(),
        width: request.width,
        height: request.height,
        total,
    });

    let folder = ctx.persister.prepare(&request.prompt)?;
    ctx.emit(WorkflowEvent::info(format!("Output folder: {}", folder.display())));

    let pipeline_id = ctx.api.list_pipelines()?;
    ctx.emit(WorkflowEvent::info(format!("Pipeline ID: {pipeline_id}")));

    for index in 1..=total {
        if ctx.cancel.is_cancelled() {
            summary.cancelled = true;
            break;
        }

        ctx.emit(WorkflowEvent::Iteration { index, total });
        if total > 1 {
            ctx.emit(WorkflowEvent::info(format!("Repeat {index} of {total}")));
        }

        let task_id = ctx.api.submit_job(&pipeline_id, &request.prompt, request.width, request.height)?;
        ctx.emit(WorkflowEvent::info(format!("Task created, ID: {task_id}")));

        let mut job = Job::pending(pipeline_id.as_str(), task_id);
        let payload = match poll_job(ctx.api.as_ref(), &mut job, &ctx.poll, &ctx.cancel, ctx.events.as_ref())? {
            PollOutcome::Completed(payload) => payload,
            PollOutcome::Cancelled => {
                summary.cancelled = true;
                break;
            }
        };

        let saved = ctx.persister.save(&folder, &payload, size, index, &Local::now(), request.save_original_size)?;
        if saved.resized {
            ctx.emit(WorkflowEvent::info(format!("Resized and saved: {}", saved.path.display())));
        }
        ctx.emit(WorkflowEvent::Saved(saved.path.clone()));

        summary.saved.push(saved.path);
        summary.completed = index;
    }

    if summary.cancelled {
        ctx.emit(WorkflowEvent::Cancelled);
    }

    info!(
        "Generation for '{}' finished: {} of {} images saved{}",
        request.prompt,
        summary.saved.len(),
        total,
        if summary.cancelled { " (stopped)" } else { "" }
    );

    Ok(summary)
}
