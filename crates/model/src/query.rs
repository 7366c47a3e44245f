//! The query abstraction and the generative tracer.
//!
//! A [`Query`] is a probabilistic program written against the [`Tracer`]
//! callbacks. The tracer decides what execution means: [`PriorTracer`] runs
//! the program generatively for training-episode production, while the
//! infer-mode tracer (in the session crate) substitutes proposals from a
//! trained network and scores real observations. Queries are identical
//! across modes.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::distribution::Distribution;
use crate::trace::{ObserveEvent, SampleEntry, Trace};
use crate::types::ModelError;

/// Execution-side callbacks a query uses to draw latents and record
/// observation points.
#[async_trait]
pub trait Tracer: Send {
    /// Draw one latent value at `address` under the given prior.
    async fn sample(
        &mut self,
        address: &str,
        prior: &Distribution,
    ) -> Result<serde_json::Value, ModelError>;

    /// Record one observation point at `address` with the given likelihood.
    async fn observe(&mut self, address: &str, likelihood: &Distribution)
        -> Result<(), ModelError>;
}

/// A probabilistic program resolvable by (namespace, name).
#[async_trait]
pub trait Query: Send + Sync {
    /// Execute the program once against the given tracer.
    ///
    /// `args` carries the session's query arguments; `Value::Null` when the
    /// invocation supplied none.
    async fn simulate(
        &self,
        tracer: &mut dyn Tracer,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, ModelError>;
}

impl std::fmt::Debug for dyn Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Query")
    }
}

/// Tracer that runs a query generatively: latents from the prior, observed
/// values drawn from the likelihood. Each execution yields the synthetic
/// trace a compile-mode session turns into one training episode.
pub struct PriorTracer {
    rng: StdRng,
    trace: Trace,
}

impl PriorTracer {
    pub fn new() -> Self {
        Self { rng: StdRng::from_entropy(), trace: Trace::default() }
    }

    /// Deterministic variant for tests.
    pub fn from_seed(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed), trace: Trace::default() }
    }

    /// Finish the execution and take the accumulated trace.
    pub fn into_trace(self) -> Trace {
        self.trace
    }
}

impl Default for PriorTracer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tracer for PriorTracer {
    async fn sample(
        &mut self,
        address: &str,
        prior: &Distribution,
    ) -> Result<serde_json::Value, ModelError> {
        let value = prior.sample(&mut self.rng)?;
        self.trace.samples.push(SampleEntry {
            address: address.to_string(),
            distribution: prior.clone(),
            value: value.clone(),
        });
        Ok(value)
    }

    async fn observe(
        &mut self,
        address: &str,
        likelihood: &Distribution,
    ) -> Result<(), ModelError> {
        let value = likelihood.sample(&mut self.rng)?;
        self.trace.observes.push(ObserveEvent {
            address: address.to_string(),
            distribution: likelihood.clone(),
            value,
        });
        Ok(())
    }
}
