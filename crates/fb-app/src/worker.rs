use std::sync::mpsc::{channel, Sender};
use std::thread::{self, JoinHandle};
use fb_core::workflow::run_generation;
use fb_core::{CancelToken, GenerationRequest, WorkflowContext};
use tracing::{info, info_span};
use crate::error::AppError;
use crate::events::{FbEvent, GenEvent};

pub enum WorkerCommand {
    Generate(GenerationRequest),
    Shutdown,
}

/// Owns the thread that runs generation workflows one at a time. All
/// blocking work (HTTP, sleeps, file writes) happens there.
pub struct GenWorker {
    command_tx: Sender<WorkerCommand>,
    cancel: CancelToken,
    thread_handle: Option<JoinHandle<()>>,
}

impl GenWorker {
    pub fn new(ctx: WorkflowContext, event_tx: Sender<FbEvent>) -> Self {
        let (cmd_tx, cmd_rx) = channel::<WorkerCommand>();
        let cancel = ctx.cancel.clone();

        let thread_handle = thread::spawn(move || {
            loop {
                match cmd_rx.recv() {
                    Ok(WorkerCommand::Generate(request)) => {
                        let span = info_span!("generation", prompt = %request.prompt, repeats = request.repeat_count);
                        let _guard = span.enter();

                        let result = run_generation(&ctx, &request).map_err(|e| e.to_string());

                        info!(ok = result.is_ok(), "workflow finished");
                        let _ = event_tx.send(FbEvent::Gen(GenEvent::Finished(result)));
                    }

                    Ok(WorkerCommand::Shutdown) => {
                        break;
                    }

                    Err(_) => {
                        break;
                    }
                }
            }
        });

        Self {
            command_tx: cmd_tx,
            cancel,
            thread_handle: Some(thread_handle),
        }
    }

    /// Queue a workflow. The cancel flag is cleared here, before the command
    /// is sent, so a stop issued right after this call is never lost.
    pub fn start(&self, request: GenerationRequest) -> Result<(), AppError> {
        self.cancel.reset();
        self.command_tx
            .send(WorkerCommand::Generate(request))
            .map_err(|e| AppError::WorkerGone(e.to_string()))
    }

    /// Ask the running workflow to stop at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        let _ = self.command_tx.send(WorkerCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for GenWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
