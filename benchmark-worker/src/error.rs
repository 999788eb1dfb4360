use thiserror::Error;
use tonic::{Code, Status};

/// Failure to bring up a benchmark server
///
/// `InvalidArgument` and `Unimplemented` describe a bad configuration record and are
/// safe to report back to whoever sent it. `Fatal` describes a broken environment
/// (missing credentials, a listener that cannot bind) and the worker is expected to
/// stop rather than keep running with misleading results.
#[derive(Error, Debug)]
pub enum StartError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unimplemented: {0}")]
    Unimplemented(String),

    #[error("fatal: {0:#}")]
    Fatal(anyhow::Error),
}

impl StartError {
    /// Whether the worker process should halt instead of reporting the error
    pub fn is_fatal(&self) -> bool {
        matches!(self, StartError::Fatal(_))
    }

    /// gRPC status code for the non-fatal kinds
    pub fn code(&self) -> Code {
        match self {
            StartError::InvalidArgument(_) => Code::InvalidArgument,
            StartError::Unimplemented(_) => Code::Unimplemented,
            StartError::Fatal(_) => Code::Internal,
        }
    }
}

impl From<StartError> for Status {
    fn from(err: StartError) -> Self {
        Status::new(err.code(), err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StartError>;
