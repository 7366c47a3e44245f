use serde::Deserialize;

/// Errors from talking to the amortization-network service.
#[derive(Debug, thiserror::Error)]
pub enum ProposalError {
    /// The service closed the connection.
    #[error("Proposal service closed the connection")]
    ConnectionClosed,

    /// A request timed out after the specified number of seconds.
    #[error("Proposal request timed out after {0}s")]
    Timeout(u64),

    /// JSON parse error or unexpected reply format.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The service reported an error for this request.
    #[error("Proposal service error: {0}")]
    Service(String),

    /// IO error on the connection.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Tuning for the proposal client.
#[derive(Debug, Clone, Deserialize)]
pub struct ProposalConfig {
    /// Timeout in seconds for one request round-trip.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ProposalConfig {
    fn default() -> Self {
        Self { request_timeout_secs: default_request_timeout() }
    }
}
