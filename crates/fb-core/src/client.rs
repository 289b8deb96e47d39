use std::time::Duration;
use log::{debug, info, warn};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use crate::config::Credentials;
use crate::error::{Error, Result};
use crate::job::{JobStatus, StatusUpdate};
use crate::schemas::{GenerateParams, PipelineInfo, RunResponse, StatusResponse};

const LIST_TIMEOUT: Duration = Duration::from_secs(10);
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);
const STATUS_TIMEOUT: Duration = Duration::from_secs(10);

/// The three calls the generation workflow needs from the service.
pub trait GenApi {
    /// Id of the first pipeline the service offers.
    fn list_pipelines(&self) -> Result<String>;

    /// Start one generation and return its task id.
    fn submit_job(&self, pipeline_id: &str, prompt: &str, width: u32, height: u32) -> Result<String>;

    fn get_status(&self, task_id: &str) -> Result<StatusUpdate>;
}

pub struct FusionBrainClient {
    http: Client,
    base_url: String,
    credentials: Credentials,
}

impl FusionBrainClient {
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self> {
        let http = Client::builder().build()?;

        let mut base_url = base_url.trim().to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}key/api/v1/{}", self.base_url, path)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("X-Key", self.credentials.key_header())
            .header("X-Secret", self.credentials.secret_header())
    }

    fn parse<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(Error::Network(format!("{what}: HTTP {status}: {body}")));
        }

        response
            .json()
            .map_err(|e| Error::Network(format!("{what}: malformed response: {e}")))
    }
}

impl GenApi for FusionBrainClient {
    fn list_pipelines(&self) -> Result<String> {
        let response = self
            .authorized(self.http.get(self.url("pipelines")))
            .timeout(LIST_TIMEOUT)
            .send()?;

        let pipelines: Vec<PipelineInfo> = Self::parse(response, "list pipelines")?;
        let first = pipelines
            .into_iter()
            .next()
            .ok_or_else(|| Error::Network("service returned no pipelines".into()))?;

        info!("Using pipeline {} ({})", first.id, first.name.as_deref().unwrap_or("unnamed"));
        Ok(first.id)
    }

    fn submit_job(&self, pipeline_id: &str, prompt: &str, width: u32, height: u32) -> Result<String> {
        let params = serde_json::to_string(&GenerateParams::new(prompt, width, height))
            .map_err(|e| Error::Network(format!("cannot encode request: {e}")))?;

        let form = Form::new()
            .text("pipeline_id", pipeline_id.to_string())
            .part("params", Part::text(params).mime_str("application/json")?);

        let response = self
            .authorized(self.http.post(self.url("pipeline/run")))
            .multipart(form)
            .timeout(SUBMIT_TIMEOUT)
            .send()?;

        let run: RunResponse = Self::parse(response, "submit job")?;
        match run.uuid {
            Some(uuid) => {
                debug!("Submitted task {uuid} (status {:?})", run.status);
                Ok(uuid)
            }
            None => Err(Error::Network(format!(
                "service did not accept the job (model status: {})",
                run.model_status.as_deref().unwrap_or("unknown")
            ))),
        }
    }

    fn get_status(&self, task_id: &str) -> Result<StatusUpdate> {
        let response = self
            .authorized(self.http.get(self.url(&format!("pipeline/status/{task_id}"))))
            .timeout(STATUS_TIMEOUT)
            .send()?;

        let status: StatusResponse = Self::parse(response, "job status")?;

        let mut update = StatusUpdate::pending();
        update.status = JobStatus::from_server(&status.status);
        update.error = status.error.or(status.error_description);

        if let Some(result) = status.result {
            if result.censored {
                warn!("Task {task_id}: result was flagged as censored");
            }
            update.result_payload = result.files.into_iter().next();
        }

        Ok(update)
    }
}
