//! Dual-mode session orchestration for amortized inference.
//!
//! A compile-mode session binds a socket and serves synthetic training
//! episodes to a neural trainer; an infer-mode session connects to a trained
//! amortization network and produces a lazy sequence of weighted posterior
//! states. Both are driven by the same registry-resolved queries, and the
//! [`ProposalProvider`] seam lets the infer-mode machinery run against mocks.
//!
//! # Key types
//!
//! - [`CompileSession`] / [`EpisodeServer`] — episode serving for trainers
//! - [`InferSession`] / [`StateStream`] — lazy weighted posterior states
//! - [`ProposalProvider`] — trait over the amortization-network client
//! - [`SessionError`] — the session-level error taxonomy

pub mod adapters;
pub mod compile;
pub mod config;
pub mod infer;
pub mod mocks;
pub mod types;

pub use compile::{CompileSession, EpisodeFrame, EpisodeServer};
pub use config::{
    CompileOptions, Endpoint, InferOptions, DEFAULT_COMPILE_ENDPOINT, DEFAULT_INFER_ENDPOINT,
};
pub use infer::{InferSession, ProposalProvider, StateStream};
pub use types::SessionError;
