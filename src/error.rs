use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReportError>;

#[derive(Debug, Error)]
pub enum ReportError {
    /// Non-2xx answer other than 429; never retried.
    #[error("HTTP {status} for {url}: {body}")]
    Http {
        status: StatusCode,
        url: String,
        body: String,
    },

    #[error("max retries ({attempts}) exceeded for {url}: still rate limited")]
    RateLimitExceeded { url: String, attempts: u32 },

    #[error("max retries ({attempts}) exceeded for {url}: {source}")]
    TransientNetwork {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("export polling timed out after {} minutes", format_minutes(.elapsed))]
    ExportTimeout { elapsed: Duration },

    #[error("export job failed: {message}")]
    ExportFailed { message: String },

    #[error("failed to parse {context}: {message}")]
    Parse { context: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to format date: {0}")]
    Format(#[from] time::error::Format),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A request could not be built (bad URL, bad header value).
    #[error("invalid request for {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("cancelled")]
    Cancelled,
}

impl ReportError {
    pub fn parse(context: impl Into<String>, message: impl ToString) -> Self {
        ReportError::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }
}

fn format_minutes(d: &Duration) -> String {
    let mins = d.as_secs_f64() / 60.0;
    if mins.fract() == 0.0 {
        format!("{mins:.0}")
    } else {
        format!("{mins:.1}")
    }
}
