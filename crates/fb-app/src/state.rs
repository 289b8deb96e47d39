use chrono::Local;
use fb_core::poll::{MAX_ATTEMPTS, POLL_DELAY};
use fb_core::{GenerationRequest, LogLevel, PromptHistory, RunSummary, WorkflowEvent};
use tracing::warn;
use crate::commands::{GenArgs, HELP};
use crate::error::AppError;
use crate::events::{GenEvent, UiEvent};
use crate::recent::RecentImages;
use crate::worker::GenWorker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub iteration: u32,
    pub total: u32,
    pub attempt: u32,
    pub max_attempts: u32,
}

impl Progress {
    fn new(total: u32) -> Self {
        Self {
            iteration: 0,
            total,
            attempt: 0,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    /// Share of the worst-case poll budget used so far.
    pub fn fraction(&self) -> f32 {
        let steps = self.total * self.max_attempts;
        if steps == 0 {
            return 0.0;
        }
        let done = self.iteration.saturating_sub(1) * self.max_attempts + self.attempt;
        (done as f32 / steps as f32).min(1.0)
    }

    /// Upper bound on the remaining wait, assuming every job uses its full budget.
    pub fn max_remaining_secs(&self) -> u64 {
        let steps = u64::from(self.total * self.max_attempts);
        let done = u64::from(self.iteration.saturating_sub(1) * self.max_attempts + self.attempt);
        steps.saturating_sub(done) * POLL_DELAY.as_secs()
    }
}

/// UI-side state. Only the dispatch loop touches it.
pub struct AppState {
    worker: GenWorker,
    pub history: PromptHistory,
    pub recent: RecentImages,
    pub progress: Option<Progress>,
    pub last_result: Option<Result<RunSummary, String>>,
    busy: bool,
    selected_prompt: Option<String>,
    quit_when_idle: bool,
    output: Vec<String>,
}

impl AppState {
    pub fn new(worker: GenWorker, history: PromptHistory) -> Self {
        Self {
            worker,
            history,
            recent: RecentImages::default(),
            progress: None,
            last_result: None,
            busy: false,
            selected_prompt: None,
            quit_when_idle: false,
            output: Vec::new(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Quit as soon as the running workflow ends (or right away if idle).
    pub fn quit_when_idle(&mut self) -> Control {
        if self.busy {
            self.quit_when_idle = true;
            Control::Continue
        } else {
            Control::Quit
        }
    }

    /// Lines produced since the last call, in order.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    pub fn log(&mut self, level: LogLevel, message: impl AsRef<str>) {
        let prefix = match level {
            LogLevel::Info => "",
            LogLevel::Warn => "warning: ",
            LogLevel::Error => "error: ",
        };
        let line = format!("[{}] {prefix}{}", Local::now().format("%H:%M:%S"), message.as_ref());
        self.output.push(line);
    }

    fn info(&mut self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message);
    }

    fn error(&mut self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message);
    }

    fn print(&mut self, line: impl Into<String>) {
        self.output.push(line.into());
    }

    pub fn on_ui_event(&mut self, event: UiEvent) -> Control {
        match event {
            UiEvent::Generate(args) => {
                if let Err(e) = self.start_generation(&args) {
                    self.error(e);
                }
            }
            UiEvent::UseHistory(index) => match index.checked_sub(1).and_then(|i| self.history.get(i)) {
                Some(prompt) => {
                    let prompt = prompt.to_string();
                    self.info(format!("Prompt selected from history: {}", preview(&prompt)));
                    self.selected_prompt = Some(prompt);
                }
                None => self.error(format!("No history entry {index} (1..={})", self.history.len())),
            },
            UiEvent::Stop => {
                if self.busy {
                    self.worker.cancel();
                    self.info("Stop requested, finishing current step...");
                } else {
                    self.info("Nothing is running");
                }
            }
            UiEvent::Status => self.show_status(),
            UiEvent::ShowHistory => {
                if self.history.is_empty() {
                    self.print("History is empty");
                }
                let lines: Vec<String> = self
                    .history
                    .iter()
                    .enumerate()
                    .map(|(i, p)| format!("{:>3}. {p}", i + 1))
                    .collect();
                self.output.extend(lines);
            }
            UiEvent::ClearHistory => match self.history.clear() {
                Ok(()) => self.info("Prompt history cleared"),
                Err(e) => self.error(format!("Could not clear history: {e}")),
            },
            UiEvent::ShowRecent => {
                if self.recent.is_empty() {
                    self.print("No images saved yet");
                }
                let lines: Vec<String> = self
                    .recent
                    .iter()
                    .map(|t| format!("  {:<18} {}", t.label, t.path.display()))
                    .collect();
                self.output.extend(lines);
            }
            UiEvent::Help => self.print(HELP),
            UiEvent::Invalid(message) => self.error(format!("{message} (type `help`)")),
            UiEvent::InputClosed => return self.quit_when_idle(),
            UiEvent::Quit => {
                if self.busy {
                    self.worker.cancel();
                    self.info("Stopping the running generation before exit...");
                }
                return Control::Quit;
            }
        }

        Control::Continue
    }

    pub fn on_gen_event(&mut self, event: GenEvent) -> Control {
        match event {
            GenEvent::Workflow(event) => self.on_workflow_event(event),
            GenEvent::Finished(result) => {
                self.busy = false;
                self.progress = None;

                match &result {
                    Ok(summary) if summary.cancelled => {
                        self.info(format!("Generation stopped, {} image(s) saved", summary.saved.len()))
                    }
                    Ok(summary) => self.info(format!("Generation complete, {} image(s) saved", summary.saved.len())),
                    Err(e) => self.error(e),
                }
                self.last_result = Some(result);

                if self.quit_when_idle {
                    return Control::Quit;
                }
            }
        }

        Control::Continue
    }

    fn on_workflow_event(&mut self, event: WorkflowEvent) {
        match event {
            WorkflowEvent::Log { level, message } => self.log(level, message),
            WorkflowEvent::Started { prompt, width, height, total } => {
                self.progress = Some(Progress::new(total));
                self.info(format!("Starting generation: '{prompt}'"));
                self.info(format!("Image size: {width}x{height}"));
            }
            WorkflowEvent::Iteration { index, total } => {
                let progress = self.progress.get_or_insert_with(|| Progress::new(total));
                progress.iteration = index;
                progress.attempt = 0;
            }
            WorkflowEvent::Attempt { attempt, max } => {
                if let Some(progress) = self.progress.as_mut() {
                    progress.attempt = attempt;
                    progress.max_attempts = max;
                }
            }
            WorkflowEvent::Saved(path) => {
                self.info(format!("Image saved: {}", path.display()));
                self.recent.push(&path);
            }
            WorkflowEvent::Cancelled => self.info("Generation interrupted by user"),
        }
    }

    fn start_generation(&mut self, args: &GenArgs) -> Result<(), String> {
        if self.busy {
            return Err(AppError::Busy.to_string());
        }

        let prompt = args
            .prompt_text()
            .or_else(|| self.selected_prompt.clone())
            .ok_or_else(|| "No prompt entered".to_string())?;

        let request = GenerationRequest::new(
            &prompt,
            args.size.unwrap_or_default(),
            args.repeat.unwrap_or(1),
            !args.resize,
        )
        .map_err(|e| e.to_string())?;

        if self.history.add(&request.prompt) {
            if let Err(e) = self.history.save() {
                warn!("Could not save history to {}: {e}", self.history.path().display());
                self.log(LogLevel::Warn, format!("Could not save history: {e}"));
            }
        }

        let total = request.repeat_count;
        self.worker.start(request).map_err(|e| e.to_string())?;

        self.busy = true;
        self.progress = Some(Progress::new(total));
        self.selected_prompt = None;
        Ok(())
    }

    fn show_status(&mut self) {
        match self.progress {
            Some(p) if self.busy => {
                let line = format!(
                    "Repeat {}/{}, attempt {}/{}, {:.0}% of the poll budget used, at most {}s left",
                    p.iteration,
                    p.total,
                    p.attempt,
                    p.max_attempts,
                    p.fraction() * 100.0,
                    p.max_remaining_secs()
                );
                self.print(line);
            }
            _ => self.print("Idle"),
        }
    }
}

fn preview(prompt: &str) -> String {
    if prompt.chars().count() > 50 {
        format!("{}...", prompt.chars().take(50).collect::<String>())
    } else {
        prompt.to_string()
    }
}
