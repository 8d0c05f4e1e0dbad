use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// An authenticated call was made with no active session.
    #[error("not logged in")]
    NoSession,

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    /// The API answered with an error envelope.
    #[error("API error ({status}) {code}: {message}")]
    Api { status: u16, code: String, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    /// Reason code from the error envelope, e.g. `missing_source_url`.
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            ClientError::Timeout
        } else if value.is_decode() {
            ClientError::Parse(value.to_string())
        } else {
            ClientError::Transport(value.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(value: serde_json::Error) -> Self {
        ClientError::Parse(value.to_string())
    }
}
