//! Client-side error taxonomy.

use colloquy_protocol::ServeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection or request failure before a response arrived.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Non-2xx response from the service, with its error message.
    #[error("service returned status {status}: {message}")]
    Api { status: u16, message: String },
    /// A wire payload that would not decode.
    #[error("failed decoding wire payload: {0}")]
    Decode(#[from] serde_json::Error),
    /// The service violated the stream contract (e.g. hung up before a
    /// terminal event).
    #[error("protocol violation: {0}")]
    Protocol(String),
    /// Error from the in-process engine (local mode).
    #[error(transparent)]
    Serve(#[from] ServeError),
    /// Failure setting up or misusing the blocking runtime shim.
    #[error("runtime error: {0}")]
    Runtime(String),
}
