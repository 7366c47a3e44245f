//! Optional TOML configuration for the infcomp CLI.
//!
//! A config file can pin endpoints and tuning; CLI flags win over the file,
//! and the file wins over built-in defaults.

use std::path::Path;

use serde::Deserialize;

use proposal::ProposalConfig;

/// Top-level structure of the config file.
#[derive(Debug, Default, Deserialize)]
pub struct InfcompToml {
    /// `[compile]` section.
    #[serde(default)]
    pub compile: CompileToml,

    /// `[infer]` section.
    #[serde(default)]
    pub infer: InferToml,

    /// `[proposal]` section.
    #[serde(default)]
    pub proposal: ProposalConfig,
}

/// Compile-mode file overrides.
#[derive(Debug, Default, Deserialize)]
pub struct CompileToml {
    /// Endpoint to bind the episode server on.
    pub endpoint: Option<String>,
}

/// Infer-mode file overrides.
#[derive(Debug, Default, Deserialize)]
pub struct InferToml {
    /// Endpoint of the trained amortization-network service.
    pub endpoint: Option<String>,
    /// Number of weighted samples to produce.
    pub sample_count: Option<u64>,
}

/// Load and deserialize a config file.
pub fn load_config_toml(path: &Path) -> anyhow::Result<InfcompToml> {
    let contents = std::fs::read_to_string(path)?;
    let config: InfcompToml = toml::from_str(&contents)?;
    tracing::info!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Pick the first set value: CLI flag, then config file, then default.
pub fn resolve_option<T>(cli: Option<T>, file: Option<T>, default: T) -> T {
    cli.or(file).unwrap_or(default)
}
