use std::path::PathBuf;

use thiserror::Error as TError;

/// Errors that abort a dump before any unit is scheduled.
#[derive(Debug, TError)]
pub enum DumpError {
    #[error("minimum number of threads is 1")]
    InvalidConcurrency,

    #[error("failed getting server groups: {0}")]
    ServerGroups(anyhow::Error),

    #[error(transparent)]
    Semaphore(#[from] tokio::sync::AcquireError),
}

/// Failures of a single object write. The dump logs them and moves on.
#[derive(Debug, TError)]
pub enum WriteError {
    #[error("failed marshalling: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("failed creating dir {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed writing file {path:?}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
