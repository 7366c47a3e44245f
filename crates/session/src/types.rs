use model::ResolutionError;
use proposal::ProposalError;

/// Errors that can occur while building or running a session.
///
/// `InvalidConfig`, `Resolution`, `Bind`, and `Connect` are fatal to the
/// invocation and occur before or during startup. `Exchange` is caught at
/// the compile-mode serving loop and never escapes it; `Sample` aborts the
/// infer-mode state sequence.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Missing or contradictory options, detected before any resolution.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Symbol lookup failed; nothing network-facing was touched.
    #[error("Resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    /// The compile-mode server socket could not be bound.
    #[error("Failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// The infer-mode connection or handshake failed.
    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: ProposalError,
    },

    /// One compile-mode exchange failed; the server keeps serving.
    #[error("Exchange failed: {0}")]
    Exchange(#[source] anyhow::Error),

    /// One infer-mode sample failed; the state sequence is aborted.
    #[error("Sample production failed: {0}")]
    Sample(#[source] anyhow::Error),
}
