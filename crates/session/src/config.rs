//! Session options and endpoint parsing.

use serde::Deserialize;

use model::ModelRegistry;

use crate::types::SessionError;

/// Default compile-mode endpoint: bind-all on the trainer port.
pub const DEFAULT_COMPILE_ENDPOINT: &str = "tcp://*:5555";

/// Default infer-mode endpoint: a local amortization-network service.
pub const DEFAULT_INFER_ENDPOINT: &str = "tcp://localhost:6666";

/// A network endpoint in `tcp://host:port` form.
///
/// The scheme is optional and only `tcp` is accepted. `*` as the host means
/// bind-all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Parse an endpoint descriptor.
    pub fn parse(raw: &str) -> Result<Self, SessionError> {
        let rest = match raw.split_once("://") {
            Some(("tcp", rest)) => rest,
            Some((scheme, _)) => {
                return Err(SessionError::InvalidConfig(format!(
                    "Unsupported endpoint scheme `{scheme}` in `{raw}`"
                )))
            }
            None => raw,
        };
        let (host, port) = rest.rsplit_once(':').ok_or_else(|| {
            SessionError::InvalidConfig(format!("Endpoint `{raw}` is missing a port"))
        })?;
        if host.is_empty() {
            return Err(SessionError::InvalidConfig(format!(
                "Endpoint `{raw}` is missing a host"
            )));
        }
        let port: u16 = port.parse().map_err(|_| {
            SessionError::InvalidConfig(format!("Endpoint `{raw}` has an invalid port `{port}`"))
        })?;
        Ok(Self { host: host.to_string(), port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Address for `TcpListener::bind` (`*` becomes `0.0.0.0`).
    pub fn bind_addr(&self) -> String {
        let host = if self.host == "*" { "0.0.0.0" } else { self.host.as_str() };
        format!("{host}:{}", self.port)
    }

    /// Address for `TcpStream::connect`.
    pub fn connect_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tcp://{}:{}", self.host, self.port)
    }
}

/// Options for a compile-mode session.
#[derive(Debug, Clone, Deserialize)]
pub struct CompileOptions {
    /// Namespace holding the query and combine functions.
    pub namespace: String,

    /// Query name within the namespace.
    pub query: String,

    /// Name of the combine-observes function. Required: the trainer cannot
    /// consume raw observation events.
    pub combine_observes: String,

    /// Name of the combine-samples function. Identity when absent.
    #[serde(default)]
    pub combine_samples: Option<String>,

    /// Name of a registry value to use as query arguments.
    #[serde(default)]
    pub query_args_name: Option<String>,

    /// Literal JSON to use as query arguments.
    #[serde(default)]
    pub query_args_literal: Option<String>,

    /// Endpoint to bind the episode server on.
    #[serde(default = "default_compile_endpoint")]
    pub endpoint: String,
}

fn default_compile_endpoint() -> String {
    DEFAULT_COMPILE_ENDPOINT.to_string()
}

/// Options for an infer-mode session.
#[derive(Debug, Clone, Deserialize)]
pub struct InferOptions {
    /// Namespace holding the query.
    pub namespace: String,

    /// Query name within the namespace.
    pub query: String,

    /// Name of a registry value seeding the observation embedder.
    #[serde(default)]
    pub observe_name: Option<String>,

    /// Literal JSON seeding the observation embedder.
    #[serde(default)]
    pub observe_literal: Option<String>,

    /// Name of a registry value to use as query arguments.
    #[serde(default)]
    pub query_args_name: Option<String>,

    /// Literal JSON to use as query arguments.
    #[serde(default)]
    pub query_args_literal: Option<String>,

    /// Endpoint of the trained amortization-network service.
    #[serde(default = "default_infer_endpoint")]
    pub endpoint: String,

    /// Number of weighted states the invocation will consume.
    #[serde(default = "default_sample_count")]
    pub sample_count: u64,
}

fn default_infer_endpoint() -> String {
    DEFAULT_INFER_ENDPOINT.to_string()
}

fn default_sample_count() -> u64 {
    1
}

/// A "named value or JSON literal, else absent" option pair.
///
/// [`ValueSource::parse`] does the pure configuration checks (exclusivity,
/// literal syntax) so they surface before any symbol resolution;
/// [`ValueSource::resolve`] then goes to the registry.
#[derive(Debug, Clone)]
pub(crate) enum ValueSource {
    Named(String),
    Literal(serde_json::Value),
    Absent,
}

impl ValueSource {
    pub(crate) fn parse(
        option: &str,
        name: Option<&str>,
        literal: Option<&str>,
    ) -> Result<Self, SessionError> {
        match (name, literal) {
            (Some(_), Some(_)) => Err(SessionError::InvalidConfig(format!(
                "Both a registry name and a literal were given for {option}; pick one"
            ))),
            (Some(name), None) => Ok(ValueSource::Named(name.to_string())),
            (None, Some(literal)) => {
                let value = serde_json::from_str(literal).map_err(|e| {
                    SessionError::InvalidConfig(format!(
                        "Literal for {option} is not valid JSON: {e}"
                    ))
                })?;
                Ok(ValueSource::Literal(value))
            }
            (None, None) => Ok(ValueSource::Absent),
        }
    }

    pub(crate) fn resolve(
        &self,
        registry: &ModelRegistry,
        namespace: &str,
    ) -> Result<serde_json::Value, SessionError> {
        match self {
            ValueSource::Named(name) => Ok(registry.resolve_value(namespace, name)?),
            ValueSource::Literal(value) => Ok(value.clone()),
            ValueSource::Absent => Ok(serde_json::Value::Null),
        }
    }
}
