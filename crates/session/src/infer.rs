//! Infer-mode session: guided sequential importance sampling against a
//! trained amortization network.
//!
//! Lifecycle: [`InferSession::build`] resolves symbols without dialing out,
//! [`InferSession::connect`] opens the connection and performs the
//! `observe.init` handshake, and the resulting [`StateStream`] produces one
//! weighted state per pull. Nothing is computed ahead of the consumer, and a
//! failed sample aborts the whole sequence.

use async_trait::async_trait;
use futures::Stream;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

use model::{Distribution, ModelError, ModelRegistry, Query, State, Tracer};
use proposal::{ProposalClient, ProposalConfig, ProposalError};

use crate::config::{Endpoint, InferOptions, ValueSource};
use crate::types::SessionError;

/// Source of proposal distributions during guided execution.
///
/// The production implementation is [`proposal::ProposalClient`]; tests use
/// [`crate::mocks::MockProposalProvider`].
#[async_trait]
pub trait ProposalProvider: Send {
    /// Register the observe-embedder input for this session.
    async fn observe_init(&mut self, input: &serde_json::Value) -> Result<(), ProposalError>;

    /// Request a proposal distribution for one latent address.
    async fn request_proposal(
        &mut self,
        address: &str,
        prior: &Distribution,
        prefix: &[serde_json::Value],
    ) -> Result<Distribution, ProposalError>;
}

/// A validated infer-mode session, not yet connected.
pub struct InferSession {
    query: Arc<dyn Query>,
    query_args: serde_json::Value,
    observe_input: serde_json::Value,
    endpoint: Endpoint,
}

impl std::fmt::Debug for InferSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferSession")
            .field("query_args", &self.query_args)
            .field("observe_input", &self.observe_input)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl InferSession {
    /// Validate the options, then resolve all symbols.
    ///
    /// Configuration problems surface before any lookup, and a failure of
    /// either stage means no connection was ever dialed.
    pub fn build(registry: &ModelRegistry, options: &InferOptions) -> Result<Self, SessionError> {
        let endpoint = Endpoint::parse(&options.endpoint)?;
        let observe_source = ValueSource::parse(
            "observe-embedder input",
            options.observe_name.as_deref(),
            options.observe_literal.as_deref(),
        )?;
        let args_source = ValueSource::parse(
            "query arguments",
            options.query_args_name.as_deref(),
            options.query_args_literal.as_deref(),
        )?;

        let query = registry.resolve_query(&options.namespace, &options.query)?;
        let observe_input = observe_source.resolve(registry, &options.namespace)?;
        let query_args = args_source.resolve(registry, &options.namespace)?;
        Ok(Self { query, query_args, observe_input, endpoint })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn query_args(&self) -> &serde_json::Value {
        &self.query_args
    }

    pub fn observe_input(&self) -> &serde_json::Value {
        &self.observe_input
    }

    /// Dial the endpoint and perform the `observe.init` handshake.
    pub async fn connect(
        self,
        config: ProposalConfig,
    ) -> Result<StateStream<ProposalClient>, SessionError> {
        let addr = self.endpoint.connect_addr();
        let client =
            ProposalClient::connect(&addr, config).await.map_err(|source| SessionError::Connect {
                endpoint: self.endpoint.to_string(),
                source,
            })?;
        self.attach(client).await
    }

    /// Attach an already-connected provider and perform the handshake.
    ///
    /// Split out from [`InferSession::connect`] so tests can substitute a
    /// mock provider.
    pub async fn attach<P: ProposalProvider>(
        self,
        mut provider: P,
    ) -> Result<StateStream<P>, SessionError> {
        provider.observe_init(&self.observe_input).await.map_err(|source| {
            SessionError::Connect { endpoint: self.endpoint.to_string(), source }
        })?;
        tracing::info!(endpoint = %self.endpoint, "Inference session connected");
        Ok(StateStream { session: self, provider })
    }
}

/// Tracer that substitutes peer proposals for the prior at latent points and
/// scores observation points against the session's observed values.
///
/// Accumulates the importance weight
/// `sum log p(obs | trace) + sum (log prior(x) - log proposal(x))`.
struct GuidedTracer<'a, P: ProposalProvider> {
    provider: &'a mut P,
    observed: &'a serde_json::Value,
    rng: StdRng,
    prefix: Vec<serde_json::Value>,
    log_weight: f64,
}

#[async_trait]
impl<'a, P: ProposalProvider> Tracer for GuidedTracer<'a, P> {
    async fn sample(
        &mut self,
        address: &str,
        prior: &Distribution,
    ) -> Result<serde_json::Value, ModelError> {
        let proposal = self
            .provider
            .request_proposal(address, prior, &self.prefix)
            .await
            .map_err(|e| ModelError::Proposal(e.to_string()))?;
        let value = proposal.sample(&mut self.rng)?;
        self.log_weight += prior.log_prob(&value)? - proposal.log_prob(&value)?;
        self.prefix.push(value.clone());
        Ok(value)
    }

    async fn observe(
        &mut self,
        address: &str,
        likelihood: &Distribution,
    ) -> Result<(), ModelError> {
        let value = self
            .observed
            .get(address)
            .cloned()
            .ok_or_else(|| ModelError::MissingObservation(address.to_string()))?;
        self.log_weight += likelihood.log_prob(&value)?;
        Ok(())
    }
}

/// Lazy, ordered sequence of weighted inference states.
///
/// Each [`StateStream::next_state`] call runs exactly one guided execution;
/// nothing runs ahead of the consumer. The sequence has no natural end: it
/// stops when the stream is dropped or when a sample fails.
pub struct StateStream<P: ProposalProvider> {
    session: InferSession,
    provider: P,
}

impl<P: ProposalProvider> std::fmt::Debug for StateStream<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStream")
            .field("endpoint", &self.session.endpoint)
            .finish_non_exhaustive()
    }
}

impl<P: ProposalProvider> StateStream<P> {
    /// Produce the next weighted state.
    ///
    /// An error means this sample could not be produced faithfully; the
    /// caller must treat the whole sequence as aborted.
    pub async fn next_state(&mut self) -> Result<State, SessionError> {
        let mut tracer = GuidedTracer {
            provider: &mut self.provider,
            observed: &self.session.observe_input,
            rng: StdRng::from_entropy(),
            prefix: Vec::new(),
            log_weight: 0.0,
        };
        let result = self
            .session
            .query
            .simulate(&mut tracer, &self.session.query_args)
            .await
            .map_err(|e| SessionError::Sample(anyhow::Error::new(e)))?;
        let log_weight = tracer.log_weight;
        tracing::debug!(log_weight, "Produced state");
        Ok(State { result, log_weight })
    }

    /// Adapt the pull loop to a [`futures::Stream`].
    ///
    /// One state is computed per item polled, so consuming N items performs
    /// exactly N executions. After an error item the stream is exhausted.
    pub fn into_stream(self) -> impl Stream<Item = Result<State, SessionError>> {
        futures::stream::unfold(Some(self), |state| async move {
            let mut stream = state?;
            match stream.next_state().await {
                Ok(item) => Some((Ok(item), Some(stream))),
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}
