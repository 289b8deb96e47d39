use std::time::Duration;
use log::{debug, warn};
use crate::cancel::CancelToken;
use crate::client::GenApi;
use crate::error::{Error, Result};
use crate::events::{EventSink, WorkflowEvent};
use crate::job::{Job, JobStatus};

pub const MAX_ATTEMPTS: u32 = 15;
pub const POLL_DELAY: Duration = Duration::from_secs(5);

const FAILED_FALLBACK: &str = "generation failed";

#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    pub max_attempts: u32,
    /// Waited before every attempt, the first one included.
    pub delay: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            delay: POLL_DELAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Base64 payload of the first result file.
    Completed(String),
    Cancelled,
}

/// Poll `job` until it finishes, the attempt budget runs out, or `cancel`
/// is set. Transport errors use up an attempt instead of aborting.
pub fn poll_job(
    api: &dyn GenApi,
    job: &mut Job,
    config: &PollConfig,
    cancel: &CancelToken,
    events: &dyn EventSink,
) -> Result<PollOutcome> {
    for attempt in 1..=config.max_attempts {
        if cancel.is_cancelled() || cancel.sleep(config.delay) {
            events.emit(WorkflowEvent::info("Generation stopped by user"));
            return Ok(PollOutcome::Cancelled);
        }

        events.emit(WorkflowEvent::Attempt { attempt, max: config.max_attempts });

        let failure = match api.get_status(&job.task_id) {
            Ok(update) => {
                job.apply(update);

                match job.status {
                    JobStatus::Done => match &job.result_payload {
                        Some(payload) => {
                            return Ok(PollOutcome::Completed(payload.clone()));
                        }
                        None => Error::Network("job finished without result files".into()),
                    },
                    JobStatus::Failed => {
                        let message = job.error.clone().unwrap_or_else(|| FAILED_FALLBACK.to_string());
                        return Err(Error::JobFailed(message));
                    }
                    JobStatus::Pending => {
                        debug!(
                            "Task {} on pipeline {} pending (attempt {attempt}/{})",
                            job.task_id, job.pipeline_id, config.max_attempts
                        );
                        events.emit(WorkflowEvent::info(format!(
                            "Waiting... (attempt {attempt}/{})",
                            config.max_attempts
                        )));
                        continue;
                    }
                }
            }
            Err(e) => e,
        };

        if attempt == config.max_attempts {
            warn!("Task {}: last status check failed: {failure}", job.task_id);
            return Err(Error::Timeout { attempts: config.max_attempts });
        }

        warn!("Task {}: status check {attempt} failed, retrying: {failure}", job.task_id);
        events.emit(WorkflowEvent::warn(format!("Status check failed, retrying: {failure}")));
    }

    Err(Error::Timeout { attempts: config.max_attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use crate::events::NullSink;
    use crate::job::StatusUpdate;

    enum Reply {
        Pending,
        Done(&'static str),
        DoneEmpty,
        Failed(Option<&'static str>),
        Broken,
    }

    struct ScriptedApi {
        replies: RefCell<VecDeque<Reply>>,
        status_calls: Cell<u32>,
        cancel_on_call: Option<(u32, CancelToken)>,
    }

    impl ScriptedApi {
        fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: RefCell::new(replies.into()),
                status_calls: Cell::new(0),
                cancel_on_call: None,
            }
        }
    }

    impl GenApi for ScriptedApi {
        fn list_pipelines(&self) -> Result<String> {
            Ok("pipeline".into())
        }

        fn submit_job(&self, _: &str, _: &str, _: u32, _: u32) -> Result<String> {
            Ok("task".into())
        }

        fn get_status(&self, _: &str) -> Result<StatusUpdate> {
            let calls = self.status_calls.get() + 1;
            self.status_calls.set(calls);

            if let Some((at, token)) = &self.cancel_on_call {
                if *at == calls {
                    token.cancel();
                }
            }

            match self.replies.borrow_mut().pop_front().unwrap_or(Reply::Pending) {
                Reply::Pending => Ok(StatusUpdate::pending()),
                Reply::Done(payload) => Ok(StatusUpdate::done(payload)),
                Reply::DoneEmpty => Ok(StatusUpdate {
                    status: JobStatus::Done,
                    ..StatusUpdate::pending()
                }),
                Reply::Failed(msg) => Ok(StatusUpdate::failed(msg.map(str::to_string))),
                Reply::Broken => Err(Error::Network("connection reset".into())),
            }
        }
    }

    fn fast() -> PollConfig {
        PollConfig {
            max_attempts: MAX_ATTEMPTS,
            delay: Duration::ZERO,
        }
    }

    fn run(api: &ScriptedApi, cancel: &CancelToken) -> (Result<PollOutcome>, Job) {
        let mut job = Job::pending("pipeline", "task");
        let outcome = poll_job(api, &mut job, &fast(), cancel, &NullSink);
        (outcome, job)
    }

    #[test]
    fn test_done_on_third_attempt() {
        let api = ScriptedApi::new(vec![Reply::Pending, Reply::Pending, Reply::Done("aGk=")]);
        let (outcome, job) = run(&api, &CancelToken::new());

        assert_eq!(outcome.unwrap(), PollOutcome::Completed("aGk=".into()));
        assert_eq!(api.status_calls.get(), 3);
        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.result_payload.as_deref(), Some("aGk="));
    }

    #[test]
    fn test_all_pending_times_out_after_fifteen_calls() {
        let api = ScriptedApi::new(vec![]);
        let (outcome, _) = run(&api, &CancelToken::new());

        assert!(matches!(outcome, Err(Error::Timeout { attempts: 15 })));
        assert_eq!(api.status_calls.get(), 15);
    }

    #[test]
    fn test_failed_uses_server_message() {
        let api = ScriptedApi::new(vec![Reply::Pending, Reply::Failed(Some("nsfw prompt"))]);
        let (outcome, job) = run(&api, &CancelToken::new());

        match outcome {
            Err(Error::JobFailed(msg)) => assert_eq!(msg, "nsfw prompt"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(api.status_calls.get(), 2);
    }

    #[test]
    fn test_failed_without_message_uses_fallback() {
        let api = ScriptedApi::new(vec![Reply::Failed(None)]);
        let (outcome, _) = run(&api, &CancelToken::new());

        match outcome {
            Err(Error::JobFailed(msg)) => assert_eq!(msg, FAILED_FALLBACK),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_transport_errors_are_retried() {
        let api = ScriptedApi::new(vec![Reply::Broken, Reply::Broken, Reply::DoneEmpty, Reply::Done("eA==")]);
        let (outcome, _) = run(&api, &CancelToken::new());

        assert_eq!(outcome.unwrap(), PollOutcome::Completed("eA==".into()));
        assert_eq!(api.status_calls.get(), 4);
    }

    #[test]
    fn test_error_on_last_attempt_is_timeout() {
        let mut replies: Vec<Reply> = (0..14).map(|_| Reply::Pending).collect();
        replies.push(Reply::Broken);
        let api = ScriptedApi::new(replies);
        let (outcome, _) = run(&api, &CancelToken::new());

        assert!(matches!(outcome, Err(Error::Timeout { attempts: 15 })));
        assert_eq!(api.status_calls.get(), 15);
    }

    #[test]
    fn test_cancelled_before_first_attempt() {
        let api = ScriptedApi::new(vec![Reply::Done("aGk=")]);
        let cancel = CancelToken::new();
        cancel.cancel();

        let (outcome, job) = run(&api, &cancel);
        assert_eq!(outcome.unwrap(), PollOutcome::Cancelled);
        assert_eq!(api.status_calls.get(), 0);
        assert!(job.result_payload.is_none());
    }

    #[test]
    fn test_cancelled_between_attempts() {
        let cancel = CancelToken::new();
        let mut api = ScriptedApi::new(vec![]);
        api.cancel_on_call = Some((2, cancel.clone()));

        let (outcome, _) = run(&api, &cancel);
        assert_eq!(outcome.unwrap(), PollOutcome::Cancelled);
        assert_eq!(api.status_calls.get(), 2);
    }

    #[test]
    fn test_attempt_events_are_emitted() {
        let api = ScriptedApi::new(vec![Reply::Pending, Reply::Done("aGk=")]);
        let (tx, rx) = std::sync::mpsc::channel();
        let mut job = Job::pending("pipeline", "task");

        poll_job(&api, &mut job, &fast(), &CancelToken::new(), &tx).unwrap();
        drop(tx);

        let attempts: Vec<u32> = rx
            .iter()
            .filter_map(|e| match e {
                WorkflowEvent::Attempt { attempt, .. } => Some(attempt),
                _ => None,
            })
            .collect();
        assert_eq!(attempts, vec![1, 2]);
    }
}
