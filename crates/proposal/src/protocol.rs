//! Wire protocol for the amortization-network service.
//!
//! Requests are single-line JSON in `{"cmd": "...", "payload": {...}}` form;
//! replies are single-line JSON objects. A reply carrying an `"error"` field
//! is a service-side failure and is surfaced as [`ProposalError::Service`].

use serde::{Deserialize, Serialize};

use model::Distribution;

use crate::types::ProposalError;

/// A request to send to the amortization-network service.
#[derive(Debug, Clone)]
pub enum ProposalRequest {
    /// Register the observe-embedder input for this session.
    ObserveInit { input: serde_json::Value },
    /// Request a proposal distribution for one latent address.
    Proposal {
        address: String,
        /// The model's prior at this address, for calibration on the peer.
        prior: Distribution,
        /// Values already drawn earlier in this execution, in order.
        prefix: Vec<serde_json::Value>,
    },
}

#[derive(Serialize)]
struct CommandWire {
    cmd: &'static str,
    payload: serde_json::Value,
}

#[derive(Serialize)]
struct ObserveInitPayload {
    input: serde_json::Value,
}

#[derive(Serialize)]
struct ProposalPayload {
    address: String,
    prior: Distribution,
    prefix: Vec<serde_json::Value>,
}

impl ProposalRequest {
    /// Serialize this request to one JSON line (without the newline).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            ProposalRequest::ObserveInit { input } => {
                let payload = serde_json::to_value(ObserveInitPayload { input: input.clone() })?;
                serde_json::to_string(&CommandWire { cmd: "observe.init", payload })
            }
            ProposalRequest::Proposal { address, prior, prefix } => {
                let payload = serde_json::to_value(ProposalPayload {
                    address: address.clone(),
                    prior: prior.clone(),
                    prefix: prefix.clone(),
                })?;
                serde_json::to_string(&CommandWire { cmd: "proposal.request", payload })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Reply parsing
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct AckReply {
    ok: bool,
}

#[derive(Deserialize)]
struct ProposalReply {
    distribution: Distribution,
}

fn parse_value(json: &str) -> Result<serde_json::Value, ProposalError> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| ProposalError::Protocol(format!("Invalid JSON: {e}. Raw: {json}")))?;
    if let Some(message) = value.get("error").and_then(|v| v.as_str()) {
        return Err(ProposalError::Service(message.to_string()));
    }
    Ok(value)
}

/// Parse the reply to `observe.init`. The service acknowledges with
/// `{"ok": true}`.
pub fn parse_observe_init(json: &str) -> Result<(), ProposalError> {
    let value = parse_value(json)?;
    let ack: AckReply = serde_json::from_value(value).map_err(|e| {
        ProposalError::Protocol(format!("Failed to parse observe.init reply: {e}. Raw: {json}"))
    })?;
    if !ack.ok {
        return Err(ProposalError::Service("observe.init rejected".to_string()));
    }
    Ok(())
}

/// Parse the reply to `proposal.request` into a usable distribution.
pub fn parse_proposal(json: &str) -> Result<Distribution, ProposalError> {
    let value = parse_value(json)?;
    let reply: ProposalReply = serde_json::from_value(value).map_err(|e| {
        ProposalError::Protocol(format!("Failed to parse proposal reply: {e}. Raw: {json}"))
    })?;
    Ok(reply.distribution)
}
