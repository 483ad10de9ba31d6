use std::error::Error;
use std::fmt;
use tokio_cron_scheduler::JobSchedulerError;

/// Custom Error and Result types to unify errors from all sources.
pub type BoardResult<T> = Result<T, BoardError>;

#[derive(Debug)]
pub enum BoardError {
    Unreachable(String),
    Auth,
    Protocol(String),
    MalformedPayload(String),
    Config(String),
    Scheduler(String),
    Template(String),
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BoardError::Unreachable(s) => write!(f, "Unreachable: {}", s),
            BoardError::Auth => write!(f, "RCON Error: authentication rejected"),
            BoardError::Protocol(s) => write!(f, "RCON Error: {}", s),
            BoardError::MalformedPayload(s) => write!(f, "Parse Error: {}", s),
            BoardError::Config(s) => write!(f, "Config Error: {}", s),
            BoardError::Scheduler(s) => write!(f, "Scheduler Error: {}", s),
            BoardError::Template(s) => write!(f, "Template Error: {}", s),
        }
    }
}

impl Error for BoardError {}

impl From<std::io::Error> for BoardError {
    fn from(error: std::io::Error) -> Self {
        BoardError::Protocol(error.to_string())
    }
}

impl From<serde_json::Error> for BoardError {
    fn from(error: serde_json::Error) -> Self {
        BoardError::MalformedPayload(error.to_string())
    }
}

impl From<figment::Error> for BoardError {
    fn from(error: figment::Error) -> Self {
        BoardError::Config(error.to_string())
    }
}

impl From<JobSchedulerError> for BoardError {
    fn from(error: JobSchedulerError) -> Self {
        BoardError::Scheduler(error.to_string())
    }
}

impl From<minijinja::Error> for BoardError {
    fn from(error: minijinja::Error) -> Self {
        BoardError::Template(error.to_string())
    }
}
