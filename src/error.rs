use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum OnappError {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config from {path}: {message}")]
    ConfigParse { path: String, message: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("bad response on '{url}' call: HTTP {status}")]
    BadResponse { url: String, status: u16 },

    #[error("failed to decode {what}: {message}")]
    Decode { what: String, message: String },

    #[error("HTTP 422 - the VM can't currently be {action}")]
    ActionRejected { action: String },

    #[error("couldn't find a VM matching '{query}'")]
    NoMatch { query: String },

    #[error("user cancelled action")]
    Cancelled,

    #[error("gave up waiting for {action} transaction")]
    TimedOut { action: String },

    #[error("cache doesn't exist")]
    CacheMissing,

    #[error("cache unreadable: {message}")]
    CacheUnreadable { message: String },

    #[error("I/O error while {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}
