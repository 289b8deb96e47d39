use std::io::{self, BufRead, Write};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;
use anyhow::{anyhow, bail};
use fb_core::{GenApi, PollConfig, PromptHistory, ResultPersister, RunSummary, WorkflowContext};
use tracing::debug;
use crate::commands::{parse_line, GenArgs};
use crate::events::{EventProxy, FbEvent, UiEvent};
use crate::state::{AppState, Control};
use crate::worker::GenWorker;

/// Single-threaded dispatch loop. UI commands and worker events arrive on
/// one channel and are applied to [`AppState`] in order.
pub struct App {
    event_tx: Sender<FbEvent>,
    event_rx: Receiver<FbEvent>,
    pub(crate) state: AppState,
}

impl App {
    pub fn new(
        api: Box<dyn GenApi + Send>,
        persister: ResultPersister,
        poll: PollConfig,
        history: PromptHistory,
    ) -> Self {
        let (event_tx, event_rx) = channel::<FbEvent>();

        let mut ctx = WorkflowContext::new(api, persister, Box::new(EventProxy::new(event_tx.clone())));
        ctx.poll = poll;

        let worker = GenWorker::new(ctx, event_tx.clone());

        Self {
            event_tx,
            event_rx,
            state: AppState::new(worker, history),
        }
    }

    /// Feed typed lines into the event channel from a background thread.
    pub fn spawn_stdin_reader(&self) {
        let tx = self.event_tx.clone();

        thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if let Some(event) = parse_line(&line) {
                    if tx.send(FbEvent::Ui(event)).is_err() {
                        return;
                    }
                }
            }
            let _ = tx.send(FbEvent::Ui(UiEvent::InputClosed));
        });
    }

    pub fn dispatch(&mut self, event: FbEvent) -> Control {
        debug!(?event, "dispatch");
        match event {
            FbEvent::Ui(e) => self.state.on_ui_event(e),
            FbEvent::Gen(e) => self.state.on_gen_event(e),
        }
    }

    pub fn run(&mut self) {
        self.flush();
        while let Ok(event) = self.event_rx.recv() {
            let control = self.dispatch(event);
            self.flush();
            if control == Control::Quit {
                break;
            }
        }
    }

    /// Run one workflow to completion without reading stdin.
    pub fn run_once(&mut self, args: GenArgs) -> anyhow::Result<RunSummary> {
        self.dispatch(FbEvent::Ui(UiEvent::Generate(args)));
        if !self.state.is_busy() {
            self.flush();
            bail!("generation was not started");
        }

        if self.state.quit_when_idle() == Control::Continue {
            self.run();
        }

        match self.state.last_result.take() {
            Some(Ok(summary)) => Ok(summary),
            Some(Err(e)) => Err(anyhow!(e)),
            None => bail!("generation ended without a result"),
        }
    }

    fn flush(&mut self) {
        let lines = self.state.take_output();
        if lines.is_empty() {
            return;
        }

        let mut out = io::stdout().lock();
        for line in lines {
            let _ = writeln!(out, "{line}");
        }
        let _ = out.flush();
    }
}
