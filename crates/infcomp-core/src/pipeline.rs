/// Compile and infer session pipelines driven by the CLI.

use std::path::PathBuf;

use anyhow::Context;
use futures::StreamExt;

use model::builtin_registry;
use session::{
    CompileOptions, CompileSession, InferOptions, InferSession, DEFAULT_COMPILE_ENDPOINT,
    DEFAULT_INFER_ENDPOINT,
};

use crate::config::{load_config_toml, resolve_option, InfcompToml};

/// Arguments for the `compile` subcommand.
#[derive(Debug)]
pub struct CompileArgs {
    /// Namespace holding the query and combine functions.
    pub namespace: String,
    /// Query name within the namespace.
    pub query: String,
    /// Name of the combine-observes function.
    pub combine_observes: String,
    /// Optional name of the combine-samples function.
    pub combine_samples: Option<String>,
    /// Optional registry name for the query arguments.
    pub query_args_name: Option<String>,
    /// Optional literal JSON query arguments.
    pub query_args: Option<String>,
    /// Optional CLI override for the bind endpoint.
    pub endpoint: Option<String>,
    /// Optional TOML config file.
    pub config: Option<PathBuf>,
}

/// Arguments for the `infer` subcommand.
#[derive(Debug)]
pub struct InferArgs {
    /// Namespace holding the query.
    pub namespace: String,
    /// Query name within the namespace.
    pub query: String,
    /// Optional registry name for the observe-embedder input.
    pub observe_name: Option<String>,
    /// Optional literal JSON observe-embedder input.
    pub observe: Option<String>,
    /// Optional registry name for the query arguments.
    pub query_args_name: Option<String>,
    /// Optional literal JSON query arguments.
    pub query_args: Option<String>,
    /// Optional CLI override for the service endpoint.
    pub endpoint: Option<String>,
    /// Optional CLI override for the number of samples.
    pub sample_count: Option<u64>,
    /// Optional TOML config file.
    pub config: Option<PathBuf>,
}

fn load_file_config(path: &Option<PathBuf>) -> anyhow::Result<InfcompToml> {
    match path {
        Some(path) => load_config_toml(path)
            .with_context(|| format!("Failed to load config file {}", path.display())),
        None => Ok(InfcompToml::default()),
    }
}

/// Single-line preview of a JSON value for the summary block.
fn preview(value: &serde_json::Value) -> String {
    let text = value.to_string();
    if text.chars().count() > 60 {
        let head: String = text.chars().take(60).collect();
        format!("{head}...")
    } else {
        text
    }
}

/// Serve training episodes until interrupted.
pub async fn run_compile(args: CompileArgs) -> anyhow::Result<()> {
    // 1. Merge the config file with CLI flags
    let file = load_file_config(&args.config)?;
    let endpoint = resolve_option(
        args.endpoint.clone(),
        file.compile.endpoint.clone(),
        DEFAULT_COMPILE_ENDPOINT.to_string(),
    );

    let options = CompileOptions {
        namespace: args.namespace.clone(),
        query: args.query.clone(),
        combine_observes: args.combine_observes.clone(),
        combine_samples: args.combine_samples.clone(),
        query_args_name: args.query_args_name.clone(),
        query_args_literal: args.query_args.clone(),
        endpoint,
    };

    // 2. Resolve every symbol before touching the network
    let registry = builtin_registry();
    let session = CompileSession::build(&registry, &options).with_context(|| {
        format!(
            "Failed to configure compile session (namespace `{}`, query `{}`)",
            args.namespace, args.query
        )
    })?;

    println!("\n--- Compile Session ---");
    println!("Mode: compile");
    println!("Namespace: {}", options.namespace);
    println!("Query: {}", options.query);
    println!("Endpoint: {}", session.endpoint());
    println!("Combine observes: {}", options.combine_observes);
    println!(
        "Combine samples: {}",
        options.combine_samples.as_deref().unwrap_or("(identity)")
    );
    println!("Query args: {}", preview(session.query_args()));

    // 3. Bind, then serve until ctrl-c
    let server = session.bind().await.context("Failed to start episode server")?;
    println!("Episode server started; serving training episodes until interrupted.\n");

    tokio::select! {
        _ = server.serve() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted; shutting down episode server");
        }
    }

    Ok(())
}

/// Produce and report weighted samples from a trained network.
pub async fn run_infer(args: InferArgs) -> anyhow::Result<()> {
    // 1. Merge the config file with CLI flags
    let file = load_file_config(&args.config)?;
    let endpoint = resolve_option(
        args.endpoint.clone(),
        file.infer.endpoint.clone(),
        DEFAULT_INFER_ENDPOINT.to_string(),
    );
    let sample_count = resolve_option(args.sample_count, file.infer.sample_count, 1);

    let options = InferOptions {
        namespace: args.namespace.clone(),
        query: args.query.clone(),
        observe_name: args.observe_name.clone(),
        observe_literal: args.observe.clone(),
        query_args_name: args.query_args_name.clone(),
        query_args_literal: args.query_args.clone(),
        endpoint,
        sample_count,
    };

    // 2. Resolve every symbol before dialing out
    let registry = builtin_registry();
    let session = InferSession::build(&registry, &options).with_context(|| {
        format!(
            "Failed to configure infer session (namespace `{}`, query `{}`)",
            args.namespace, args.query
        )
    })?;

    println!("\n--- Infer Session ---");
    println!("Mode: infer");
    println!("Namespace: {}", options.namespace);
    println!("Query: {}", options.query);
    println!("Endpoint: {}", session.endpoint());
    println!("Sample count: {}", options.sample_count);
    println!("Observe input: {}", preview(session.observe_input()));
    println!("Query args: {}", preview(session.query_args()));
    println!();

    // 3. Connect, then pull exactly sample_count states
    let states = session
        .connect(file.proposal.clone())
        .await
        .context("Failed to reach the amortization network")?;

    // One "<result>,<log-weight>" line per state, in production order
    let mut states = Box::pin(states.into_stream().take(options.sample_count as usize));
    while let Some(state) = states.next().await {
        let state = state.context("Inference aborted")?;
        println!("{},{}", state.result, state.log_weight);
    }

    Ok(())
}
