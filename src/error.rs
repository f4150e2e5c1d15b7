use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by resolution, listing and query execution.
#[derive(Debug, Error)]
pub enum Error {
    /// No discovered resource matches the requested type string.
    #[error("the server doesn't have a resource type {0:?}")]
    NotFound(String),

    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("failed to list {resource}: {source}")]
    List {
        resource: String,
        #[source]
        source: kube::Error,
    },

    #[error(transparent)]
    Exec(#[from] ExecError),

    /// The caller's cancellation token fired before the operation finished.
    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Api(#[from] kube::Error),

    #[error("unexpected group version string: {0:?}")]
    GroupVersion(String),
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{program} exited with status {exit_code}: {stderr}")]
    Status {
        program: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExecError {
    /// Captured standard error of the failed run, if the process started at all.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            ExecError::Status { stderr, .. } => Some(stderr),
            ExecError::Spawn { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("current_context is not set")]
    MissingContext,

    #[error("failed to create Kubernetes client: {0}")]
    Client(#[source] kube::Error),
}
