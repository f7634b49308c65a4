/// Failure kinds of a single decision attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecisionError {
    /// The vendor answered with a non-success HTTP status.
    #[error("{service} API Error: {status} {status_text}")]
    ServiceError {
        service: String,
        status: u16,
        status_text: String,
    },

    /// The response envelope or its JSON payload could not be read.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The request never produced a response (connect, TLS, timeout).
    #[error("Request failed: {0}")]
    Transport(String),

    /// A well-formed decision whose move is not in the legal set.
    #[error("Invalid move: {mv}. Must be one of: {}", .legal_moves.join(", "))]
    InvalidMove { mv: String, legal_moves: Vec<String> },

    #[error("No API key configured for {0}")]
    MissingCredential(String),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Unknown model {model} for service {service}")]
    UnknownModel { service: String, model: String },
}

impl From<reqwest::Error> for DecisionError {
    fn from(e: reqwest::Error) -> Self {
        DecisionError::Transport(e.to_string())
    }
}
