use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("workflow not found: {}", .0.display())]
    WorkflowNotFound(PathBuf),

    #[error("experiment file not found: {}", .0.display())]
    SuiteNotFound(PathBuf),

    #[error("malformed experiment file: {0}")]
    MalformedSuite(String),

    #[error("experiment '{title}' declares no trigger event")]
    MissingEvent { title: String },

    #[error("experiment '{title}' declares multiple trigger events: {events}")]
    AmbiguousEvent { title: String, events: String },

    #[error("step '{0}' not found in any job of the workflow")]
    StepNotFound(String),

    #[error("workflow runner '{0}' not found on PATH")]
    RunnerNotFound(String),

    #[error("failed to spawn workflow runner: {0}")]
    SpawnFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
