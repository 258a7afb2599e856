use reel_sources::SourceError;
use thiserror::Error;
use tokio_cron_scheduler::JobSchedulerError;

#[derive(Debug, Error)]
pub enum CuratorError {
    /// Setup problems, reported as stable error codes (e.g. `plex_token_missing`)
    #[error("configuration incomplete: {}", .0.join(", "))]
    Configuration(Vec<String>),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Upstream(SourceError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] JobSchedulerError),
}

impl From<SourceError> for CuratorError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::MissingCredentials(codes) => CuratorError::Configuration(codes),
            other if other.is_configuration() => CuratorError::Configuration(vec![other.to_string()]),
            other => CuratorError::Upstream(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, CuratorError>;
