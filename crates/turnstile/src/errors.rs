use thiserror::Error;

/// Failure calling the platform. Calls are never retried inside this crate;
/// retry policy belongs to the caller.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("platform returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed platform payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("missing configuration: set {0}")]
    MissingConfig(&'static str),
}

/// Failure of a single logical turn through the approval loop.
#[derive(Error, Debug)]
pub enum TurnError {
    /// The platform kept returning pending approvals past the round cap.
    /// Reported distinctly from transport failures so operators can tell
    /// "the tool kept asking" from "the network died".
    #[error("approval loop exceeded {limit} rounds without a terminal response")]
    RoundLimitExceeded { limit: usize },

    #[error("turn cancelled before completion")]
    Cancelled,

    #[error(transparent)]
    Client(#[from] ClientError),
}
