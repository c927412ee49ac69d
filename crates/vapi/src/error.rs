use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} is required")]
    MissingArgument(&'static str),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("invalid phone number {0:?}: expected E.164 format, e.g. +12345678900")]
    InvalidPhoneNumber(String),

    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),

    #[error("config error: {0}")]
    Config(String),

    #[error("connection error: {0}")]
    Connect(String),

    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("Vapi returned {status}: {message}")]
    Platform { status: u16, message: String },

    #[error("malformed response from Vapi: {0}")]
    MalformedResponse(String),
}

impl Error {
    /// True for errors raised before any request is sent.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::MissingArgument(_) | Error::InvalidArguments(_) | Error::InvalidPhoneNumber(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        let detail = error_chain(&e);
        if e.is_connect() {
            Error::Connect(detail)
        } else {
            Error::Network(detail)
        }
    }
}

/// Render an error with all of its sources, `outer: inner: root`.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

pub type Result<T> = std::result::Result<T, Error>;
