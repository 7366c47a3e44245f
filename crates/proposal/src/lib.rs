//! Client for a trained amortization-network service.
//!
//! Infer-mode sessions dial the service once, register the observe-embedder
//! input, then request one proposal distribution per latent address. The
//! protocol is newline-delimited JSON over TCP with strictly sequential
//! request/reply pairs.
//!
//! # Key types
//!
//! - [`ProposalClient`] — the TCP JSON-lines client
//! - [`ProposalRequest`] — outgoing wire frames
//! - [`ProposalConfig`] — request-timeout tuning
//! - [`ProposalError`] — connection, timeout, and protocol failures

pub mod client;
pub mod protocol;
pub mod types;

pub use client::ProposalClient;
pub use protocol::{parse_observe_init, parse_proposal, ProposalRequest};
pub use types::{ProposalConfig, ProposalError};
