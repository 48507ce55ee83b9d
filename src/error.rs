use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("missing required input: {0}")]
    InputMissing(String),

    #[error("template '{0}' not found")]
    TemplateNotFound(String),

    #[error("template file missing for '{0}': {1}")]
    TemplateFileMissing(String, String),

    #[error("could not reach jenkins server '{0}': {1}")]
    JenkinsUnreachable(String, String),

    #[error("jenkins API error: {0}")]
    JenkinsApiError(String),

    #[error("timed out waiting for build to leave the queue (job '{0}')")]
    QueueTimeout(String),

    #[error("timed out streaming console output for build {0}#{1}")]
    StreamingTimeout(String, u64),

    #[error("metadata store error: {0}")]
    StoreError(String),

    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
