//! Bridges between session traits and production types.

use async_trait::async_trait;

use model::Distribution;
use proposal::{ProposalClient, ProposalError};

use crate::infer::ProposalProvider;

#[async_trait]
impl ProposalProvider for ProposalClient {
    async fn observe_init(&mut self, input: &serde_json::Value) -> Result<(), ProposalError> {
        ProposalClient::observe_init(self, input).await
    }

    async fn request_proposal(
        &mut self,
        address: &str,
        prior: &Distribution,
        prefix: &[serde_json::Value],
    ) -> Result<Distribution, ProposalError> {
        ProposalClient::request_proposal(self, address, prior, prefix).await
    }
}
