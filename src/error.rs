use std::path::PathBuf;

use crate::store::FileHandle;

/// Errors surfaced by stages, collaborators and the task graph.
///
/// Stage wrappers never classify or retry: whatever the file store or the
/// container runtime returns is propagated unchanged through `?`.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("ERROR: invalid configuration -> {0}")]
    Config(String),
    #[error("ERROR: I/O failure -> {0}")]
    Io(#[from] std::io::Error),
    #[error("ERROR: could not parse config file -> {0}")]
    Toml(#[from] toml::de::Error),
    #[error("ERROR: handle {0} was never written to the file store")]
    UnknownHandle(FileHandle),
    #[error("ERROR: {tool} exited with status {code:?}\n{stderr}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("ERROR: declared input {} not found before running {tool}", path.display())]
    MissingInput { tool: String, path: PathBuf },
    #[error("ERROR: declared output {} not produced by {tool}", path.display())]
    MissingOutput { tool: String, path: PathBuf },
    #[error("ERROR: task {task} has not produced output #{index} yet")]
    UnresolvedPromise { task: String, index: usize },
    #[error("ERROR: invalid task graph -> {0}")]
    Graph(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
