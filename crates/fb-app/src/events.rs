use std::sync::mpsc::Sender;
use fb_core::{EventSink, RunSummary, WorkflowEvent};
use crate::commands::GenArgs;

/// Everything the dispatch loop reacts to, from any thread.
#[derive(Debug, Clone)]
pub enum FbEvent {
    Ui(UiEvent),
    Gen(GenEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Generate(GenArgs),
    UseHistory(usize),
    Stop,
    Status,
    ShowHistory,
    ClearHistory,
    ShowRecent,
    Help,
    Quit,
    InputClosed,
    Invalid(String),
}

#[derive(Debug, Clone)]
pub enum GenEvent {
    Workflow(WorkflowEvent),
    Finished(Result<RunSummary, String>),
}

/// Forwards workflow events from the worker thread into the dispatch loop.
pub struct EventProxy {
    tx: Sender<FbEvent>,
}

impl EventProxy {
    pub fn new(tx: Sender<FbEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for EventProxy {
    fn emit(&self, event: WorkflowEvent) {
        let _ = self.tx.send(FbEvent::Gen(GenEvent::Workflow(event)));
    }
}
