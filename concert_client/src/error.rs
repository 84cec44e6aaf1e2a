use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Request did not complete within the client timeout
    #[error("upstream request timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    Network(reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-2xx response from the service
    #[error("API error ({status}): {message}")]
    Api { message: String, status: u16 },

    #[error("Authentication error: {0}")]
    Auth(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
