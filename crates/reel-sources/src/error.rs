use thiserror::Error;

/// Failure talking to one of the external services
#[derive(Debug, Error)]
pub enum SourceError {
    /// Credentials that are absent or still placeholders, as error codes
    #[error("missing credentials: {}", .0.join(", "))]
    MissingCredentials(Vec<String>),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned HTTP {status}: {message}")]
    Status {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("failed to parse {service} response: {message}")]
    Parse {
        service: &'static str,
        message: String,
    },

    #[error("{0} not found")]
    NotFound(String),
}

impl SourceError {
    pub fn parse(service: &'static str, message: impl Into<String>) -> Self {
        SourceError::Parse {
            service,
            message: message.into(),
        }
    }

    /// Errors that retrying will not fix
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SourceError::MissingCredentials(_) | SourceError::Configuration(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SourceError>;

/// Turn a non-2xx response into `SourceError::Status`, keeping the body for context
pub(crate) async fn ensure_success(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(SourceError::Status {
        service,
        status: status.as_u16(),
        message,
    })
}
