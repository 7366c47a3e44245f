/// Errors that can occur while executing a query or one of its transforms.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Query arguments were present but not in a shape the query accepts.
    #[error("Invalid arguments for query `{query}`: {reason}")]
    InvalidArguments { query: String, reason: String },

    /// A distribution was constructed or evaluated with invalid parameters.
    #[error("Distribution error: {0}")]
    Distribution(String),

    /// A guided execution reached an observation point with no observed value.
    #[error("No observed value for address `{0}`")]
    MissingObservation(String),

    /// A combine transform rejected its input.
    #[error("Combine transform failed: {0}")]
    Combine(String),

    /// A guided execution failed to obtain a proposal from the peer.
    #[error("Proposal request failed: {0}")]
    Proposal(String),

    /// A rejection sampler exceeded its iteration cap.
    #[error("Rejection loop exceeded {0} rounds")]
    RejectionOverflow(u32),
}
