use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum LimiterError {
    #[error("program `{0}` was not found on the sandbox PATH")]
    ProgramNotFound(String),

    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to wait for process {pid}: {source}")]
    Wait {
        pid: i32,
        #[source]
        source: io::Error,
    },

    #[error("invalid limits: {0}")]
    InvalidLimits(String),

    #[error("supervisor thread failed: {0}")]
    Supervisor(String),

    #[error("execution aborted by caller")]
    Aborted,
}

/// Judge-side faults. Any of these turns a submission into `ERROR`.
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("failed to prepare working directory: {0}")]
    Workdir(#[source] io::Error),

    #[error("fixture {path} is missing or unreadable: {source}")]
    Fixture {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid fixture manifest {path}: {msg}")]
    Manifest { path: PathBuf, msg: String },

    #[error("invalid problem specification {path}: {msg}")]
    Problem { path: PathBuf, msg: String },

    #[error("all {0} sandbox identities are in use")]
    IdentitiesExhausted(u32),

    #[error("submission aborted by caller")]
    Aborted,

    #[error(transparent)]
    Limiter(LimiterError),
}

impl From<LimiterError> for SystemError {
    fn from(err: LimiterError) -> Self {
        match err {
            LimiterError::Aborted => SystemError::Aborted,
            other => SystemError::Limiter(other),
        }
    }
}
