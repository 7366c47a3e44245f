//! Execution records produced by tracers.

use serde::{Deserialize, Serialize};

use crate::distribution::Distribution;

/// One observation point recorded during a query execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserveEvent {
    /// Address of the observation point (e.g. `obs0`).
    pub address: String,
    /// The likelihood the value was drawn from or scored under.
    pub distribution: Distribution,
    /// The observed value.
    pub value: serde_json::Value,
}

/// One latent draw recorded during a query execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleEntry {
    /// Address of the latent point (e.g. `mu`).
    pub address: String,
    /// The prior at this point.
    pub distribution: Distribution,
    /// The drawn value.
    pub value: serde_json::Value,
}

/// A full execution record: observation events in program order, then the
/// latent sample trace in program order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Trace {
    pub observes: Vec<ObserveEvent>,
    pub samples: Vec<SampleEntry>,
}

/// One weighted inference outcome: the query's return value and its
/// importance weight in log space.
#[derive(Debug, Clone, Serialize)]
pub struct State {
    pub result: serde_json::Value,
    pub log_weight: f64,
}
