use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// `params` part of the run request.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateParams {
    #[serde(rename = "type")]
    pub kind: String,
    pub num_images: u32,
    pub width: u32,
    pub height: u32,
    pub generate_params: QueryParams,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueryParams {
    pub query: String,
}

impl GenerateParams {
    pub fn new(prompt: &str, width: u32, height: u32) -> Self {
        Self {
            kind: "GENERATE".to_string(),
            num_images: 1,
            width,
            height,
            generate_params: QueryParams {
                query: prompt.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RunResponse {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub model_status: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StatusResponse {
    #[serde(default)]
    pub uuid: Option<String>,
    pub status: String,
    #[serde(default)]
    pub result: Option<StatusResult>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, rename = "errorDescription")]
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StatusResult {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub censored: bool,
}
