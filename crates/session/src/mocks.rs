//! Mock proposal provider for testing sessions without a network service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use model::Distribution;
use proposal::ProposalError;

use crate::infer::ProposalProvider;

/// Mock provider with canned proposal distributions keyed by address.
///
/// Addresses without a canned entry echo the prior back, so a guided
/// execution degenerates to prior sampling with a zero proposal correction.
/// The request counters survive moving the mock into a session.
pub struct MockProposalProvider {
    responses: HashMap<String, Distribution>,
    failures: HashMap<String, String>,
    init_failure: Option<String>,
    requests: Arc<AtomicUsize>,
    inits: Arc<AtomicUsize>,
}

impl MockProposalProvider {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            failures: HashMap::new(),
            init_failure: None,
            requests: Arc::new(AtomicUsize::new(0)),
            inits: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Canned proposal for one address.
    pub fn add_response(&mut self, address: &str, proposal: Distribution) {
        self.responses.insert(address.to_string(), proposal);
    }

    /// Make proposal requests for one address fail with a service error.
    pub fn fail_address(&mut self, address: &str, message: &str) {
        self.failures.insert(address.to_string(), message.to_string());
    }

    /// Make the `observe.init` handshake fail with a service error.
    pub fn fail_observe_init(&mut self, message: &str) {
        self.init_failure = Some(message.to_string());
    }

    /// Handle counting proposal requests across the move into a session.
    pub fn request_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.requests)
    }

    /// Handle counting handshakes across the move into a session.
    pub fn init_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.inits)
    }
}

impl Default for MockProposalProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProposalProvider for MockProposalProvider {
    async fn observe_init(&mut self, _input: &serde_json::Value) -> Result<(), ProposalError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        match &self.init_failure {
            Some(message) => Err(ProposalError::Service(message.clone())),
            None => Ok(()),
        }
    }

    async fn request_proposal(
        &mut self,
        address: &str,
        prior: &Distribution,
        _prefix: &[serde_json::Value],
    ) -> Result<Distribution, ProposalError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failures.get(address) {
            return Err(ProposalError::Service(message.clone()));
        }
        Ok(self.responses.get(address).cloned().unwrap_or_else(|| prior.clone()))
    }
}
