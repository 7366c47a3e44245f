//! Core data model for amortized-inference sessions.
//!
//! Probabilistic programs are [`Query`] implementations written against the
//! [`Tracer`] callbacks, so the same program can be run generatively (to
//! produce training episodes) or guided by a trained network (to produce
//! weighted posterior samples). Programs, combine transforms, and canned
//! values are resolved from string names through the [`ModelRegistry`].
//!
//! # Key types
//!
//! - [`Query`] / [`Tracer`] — the probabilistic-program seam
//! - [`Distribution`] — closed set of first-class distributions
//! - [`Trace`] / [`ObserveEvent`] / [`SampleEntry`] — one execution record
//! - [`State`] — one weighted inference outcome
//! - [`ModelRegistry`] — (namespace, name) resolution to typed handles
//! - [`builtin_registry`] — registry with the `demo.q` namespace installed

pub mod demo;
pub mod distribution;
pub mod query;
pub mod registry;
pub mod trace;
pub mod types;

pub use distribution::Distribution;
pub use query::{PriorTracer, Query, Tracer};
pub use registry::{
    builtin_registry, CombineObservesFn, CombineSamplesFn, ModelRegistry, Namespace,
    RegistryEntry, ResolutionError,
};
pub use trace::{ObserveEvent, SampleEntry, State, Trace};
pub use types::ModelError;
