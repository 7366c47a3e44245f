//! The `demo.q` namespace: Gaussian-with-unknown-mean demonstration models.
//!
//! Two queries over the same model (one latent mean, two noisy
//! observations), the combine transforms a trainer pairs them with, and the
//! canned values invocations can reference by name.

use async_trait::async_trait;
use serde_json::json;

use crate::distribution::{numeric, Distribution};
use crate::query::{Query, Tracer};
use crate::registry::Namespace;
use crate::trace::{ObserveEvent, SampleEntry};
use crate::types::ModelError;

/// Parameters shared by the demo models, overridable via query arguments.
#[derive(Debug, Clone, Copy)]
struct GumParams {
    prior_mean: f64,
    prior_stddev: f64,
    likelihood_stddev: f64,
}

impl GumParams {
    fn defaults() -> Self {
        Self {
            prior_mean: 1.0,
            prior_stddev: 5.0f64.sqrt(),
            likelihood_stddev: 2.0f64.sqrt(),
        }
    }

    /// Read overrides from the query arguments. Null means all defaults; an
    /// object may override any subset of the three parameters.
    fn from_args(query: &str, args: &serde_json::Value) -> Result<Self, ModelError> {
        let mut params = Self::defaults();
        match args {
            serde_json::Value::Null => {}
            serde_json::Value::Object(map) => {
                for (key, value) in map {
                    let number = value.as_f64().ok_or_else(|| ModelError::InvalidArguments {
                        query: query.to_string(),
                        reason: format!("`{key}` must be a number"),
                    })?;
                    match key.as_str() {
                        "prior_mean" => params.prior_mean = number,
                        "prior_stddev" => params.prior_stddev = number,
                        "likelihood_stddev" => params.likelihood_stddev = number,
                        other => {
                            return Err(ModelError::InvalidArguments {
                                query: query.to_string(),
                                reason: format!("unknown parameter `{other}`"),
                            })
                        }
                    }
                }
            }
            other => {
                return Err(ModelError::InvalidArguments {
                    query: query.to_string(),
                    reason: format!("expected an object or null, got {other}"),
                })
            }
        }
        Ok(params)
    }
}

async fn observe_both(
    tracer: &mut dyn Tracer,
    mu: f64,
    params: &GumParams,
) -> Result<(), ModelError> {
    let likelihood = Distribution::Normal { mean: mu, stddev: params.likelihood_stddev };
    tracer.observe("obs0", &likelihood).await?;
    tracer.observe("obs1", &likelihood).await?;
    Ok(())
}

/// Gaussian with unknown mean: one latent `mu`, two observation points.
pub struct Gaussian;

#[async_trait]
impl Query for Gaussian {
    async fn simulate(
        &self,
        tracer: &mut dyn Tracer,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, ModelError> {
        let params = GumParams::from_args("gaussian", args)?;
        let prior = Distribution::Normal { mean: params.prior_mean, stddev: params.prior_stddev };
        let mu = numeric(&tracer.sample("mu", &prior).await?)?;
        observe_both(tracer, mu, &params).await?;
        Ok(serde_json::Value::from(mu))
    }
}

const MARSAGLIA_MAX_ROUNDS: u32 = 1000;

/// The same model with the latent drawn via the Marsaglia polar method,
/// which exposes the rejection loop to the tracer as pairs of uniform draws.
pub struct Marsaglia;

async fn marsaglia_normal(
    tracer: &mut dyn Tracer,
    mean: f64,
    stddev: f64,
) -> Result<f64, ModelError> {
    let uniform = Distribution::Uniform { low: -1.0, high: 1.0 };
    for round in 0..MARSAGLIA_MAX_ROUNDS {
        let x = numeric(&tracer.sample(&format!("x/{round}"), &uniform).await?)?;
        let y = numeric(&tracer.sample(&format!("y/{round}"), &uniform).await?)?;
        let s = x * x + y * y;
        // s == 0 would put ln(s) at -inf; treat it as a reject.
        if s < 1.0 && s > 0.0 {
            return Ok(mean + stddev * (x * (-2.0 * s.ln() / s).sqrt()));
        }
    }
    Err(ModelError::RejectionOverflow(MARSAGLIA_MAX_ROUNDS))
}

#[async_trait]
impl Query for Marsaglia {
    async fn simulate(
        &self,
        tracer: &mut dyn Tracer,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, ModelError> {
        let params = GumParams::from_args("marsaglia", args)?;
        let mu = marsaglia_normal(tracer, params.prior_mean, params.prior_stddev).await?;
        observe_both(tracer, mu, &params).await?;
        Ok(serde_json::Value::from(mu))
    }
}

/// Flatten the observed values, in order, into one JSON array.
fn embed_obs(observes: &[ObserveEvent]) -> Result<serde_json::Value, ModelError> {
    Ok(serde_json::Value::Array(observes.iter().map(|o| o.value.clone()).collect()))
}

/// Keep only the sampled values, dropping addresses and distributions.
fn sample_values(samples: &[SampleEntry]) -> Result<serde_json::Value, ModelError> {
    Ok(serde_json::Value::Array(samples.iter().map(|s| s.value.clone()).collect()))
}

/// Build the `demo.q` namespace.
pub fn namespace() -> Namespace {
    let defaults = GumParams::defaults();
    let mut ns = Namespace::new("demo.q");
    ns.register_query("gaussian", Gaussian);
    ns.register_query("marsaglia", Marsaglia);
    ns.register_combine_observes("embed-obs", embed_obs);
    ns.register_combine_samples("sample-values", sample_values);
    ns.register_value(
        "default-args",
        json!({
            "prior_mean": defaults.prior_mean,
            "prior_stddev": defaults.prior_stddev,
            "likelihood_stddev": defaults.likelihood_stddev,
        }),
    );
    ns.register_value("example-obs", json!({ "obs0": 8.0, "obs1": 9.0 }));
    ns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::PriorTracer;

    #[tokio::test]
    async fn test_gaussian_trace_shape() {
        let mut tracer = PriorTracer::from_seed(11);
        let result = Gaussian
            .simulate(&mut tracer, &serde_json::Value::Null)
            .await
            .unwrap();
        let trace = tracer.into_trace();

        assert_eq!(trace.samples.len(), 1);
        assert_eq!(trace.samples[0].address, "mu");
        let observed: Vec<_> = trace.observes.iter().map(|o| o.address.as_str()).collect();
        assert_eq!(observed, ["obs0", "obs1"]);
        // The query returns the latent it drew
        assert_eq!(result, trace.samples[0].value);
    }

    #[tokio::test]
    async fn test_gaussian_args_override() {
        let mut tracer = PriorTracer::from_seed(12);
        let args = json!({ "prior_mean": 100.0, "prior_stddev": 0.001 });
        let result = Gaussian.simulate(&mut tracer, &args).await.unwrap();
        let mu = result.as_f64().unwrap();
        assert!((mu - 100.0).abs() < 0.1);
    }

    #[tokio::test]
    async fn test_gaussian_rejects_bad_args() {
        let mut tracer = PriorTracer::from_seed(13);
        let err = Gaussian
            .simulate(&mut tracer, &json!({ "prior_mean": "wide" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidArguments { .. }));

        let mut tracer = PriorTracer::from_seed(13);
        let err = Gaussian
            .simulate(&mut tracer, &json!({ "bandwidth": 2.0 }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bandwidth"));

        let mut tracer = PriorTracer::from_seed(13);
        let err = Gaussian.simulate(&mut tracer, &json!([1, 2])).await.unwrap_err();
        assert!(matches!(err, ModelError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_marsaglia_samples_in_pairs() {
        let mut tracer = PriorTracer::from_seed(21);
        let result = Marsaglia
            .simulate(&mut tracer, &serde_json::Value::Null)
            .await
            .unwrap();
        assert!(result.is_f64());

        let trace = tracer.into_trace();
        assert!(trace.samples.len() >= 2);
        assert_eq!(trace.samples.len() % 2, 0);
        assert_eq!(trace.samples[0].address, "x/0");
        assert_eq!(trace.samples[1].address, "y/0");
        assert_eq!(trace.observes.len(), 2);
    }

    /// Tracer that forces every uniform draw to a rejecting point.
    struct AlwaysReject;

    #[async_trait]
    impl Tracer for AlwaysReject {
        async fn sample(
            &mut self,
            _address: &str,
            _prior: &Distribution,
        ) -> Result<serde_json::Value, ModelError> {
            Ok(json!(0.99))
        }

        async fn observe(
            &mut self,
            _address: &str,
            _likelihood: &Distribution,
        ) -> Result<(), ModelError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_marsaglia_rejection_cap() {
        let mut tracer = AlwaysReject;
        let err = Marsaglia
            .simulate(&mut tracer, &serde_json::Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::RejectionOverflow(1000)));
    }

    #[test]
    fn test_embed_obs_flattens_values() {
        let likelihood = Distribution::Normal { mean: 0.0, stddev: 1.0 };
        let observes = vec![
            ObserveEvent { address: "obs0".into(), distribution: likelihood.clone(), value: json!(8.0) },
            ObserveEvent { address: "obs1".into(), distribution: likelihood, value: json!(9.0) },
        ];
        assert_eq!(embed_obs(&observes).unwrap(), json!([8.0, 9.0]));
    }

    #[test]
    fn test_sample_values_drops_metadata() {
        let prior = Distribution::Uniform { low: -1.0, high: 1.0 };
        let samples = vec![
            SampleEntry { address: "x/0".into(), distribution: prior.clone(), value: json!(0.25) },
            SampleEntry { address: "y/0".into(), distribution: prior, value: json!(-0.5) },
        ];
        assert_eq!(sample_values(&samples).unwrap(), json!([0.25, -0.5]));
    }

    #[test]
    fn test_default_args_value_matches_model() {
        let ns = namespace();
        assert_eq!(ns.name(), "demo.q");
        let mut registry = crate::registry::ModelRegistry::new();
        registry.install(ns);
        let args = registry.resolve_value("demo.q", "default-args").unwrap();
        assert_eq!(args["prior_mean"], 1.0);
        assert!((args["prior_stddev"].as_f64().unwrap() - 5.0f64.sqrt()).abs() < 1e-12);
        assert!((args["likelihood_stddev"].as_f64().unwrap() - 2.0f64.sqrt()).abs() < 1e-12);
    }
}
