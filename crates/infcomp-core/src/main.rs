mod config;
mod pipeline;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pipeline::{CompileArgs, InferArgs};

/// infcomp: dual-mode session orchestrator for amortized inference.
#[derive(Parser)]
#[command(name = "infcomp", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands for episode serving and guided importance sampling.
#[derive(Subcommand)]
enum Command {
    /// Serve synthetic training episodes to a neural trainer
    Compile {
        /// Namespace holding the query and combine functions (e.g. demo.q)
        #[arg(long)]
        namespace: String,

        /// Query name within the namespace
        #[arg(long)]
        query: String,

        /// Name of the combine-observes function
        #[arg(long)]
        combine_observes: String,

        /// Name of the combine-samples function (identity when omitted)
        #[arg(long)]
        combine_samples: Option<String>,

        /// Name of a registry value to use as query arguments
        #[arg(long, conflicts_with = "query_args")]
        query_args_name: Option<String>,

        /// Literal JSON to use as query arguments
        #[arg(long)]
        query_args: Option<String>,

        /// Endpoint to bind the episode server on (default tcp://*:5555)
        #[arg(long)]
        endpoint: Option<String>,

        /// Path to a TOML config file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run guided importance sampling against a trained network
    Infer {
        /// Namespace holding the query (e.g. demo.q)
        #[arg(long)]
        namespace: String,

        /// Query name within the namespace
        #[arg(long)]
        query: String,

        /// Name of a registry value seeding the observation embedder
        #[arg(long, conflicts_with = "observe")]
        observe_name: Option<String>,

        /// Literal JSON seeding the observation embedder
        #[arg(long)]
        observe: Option<String>,

        /// Name of a registry value to use as query arguments
        #[arg(long, conflicts_with = "query_args")]
        query_args_name: Option<String>,

        /// Literal JSON to use as query arguments
        #[arg(long)]
        query_args: Option<String>,

        /// Endpoint of the trained network (default tcp://localhost:6666)
        #[arg(long)]
        endpoint: Option<String>,

        /// Number of weighted samples to produce
        #[arg(long)]
        sample_count: Option<u64>,

        /// Path to a TOML config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Compile {
            namespace,
            query,
            combine_observes,
            combine_samples,
            query_args_name,
            query_args,
            endpoint,
            config,
        } => {
            pipeline::run_compile(CompileArgs {
                namespace,
                query,
                combine_observes,
                combine_samples,
                query_args_name,
                query_args,
                endpoint,
                config,
            })
            .await
        }
        Command::Infer {
            namespace,
            query,
            observe_name,
            observe,
            query_args_name,
            query_args,
            endpoint,
            sample_count,
            config,
        } => {
            pipeline::run_infer(InferArgs {
                namespace,
                query,
                observe_name,
                observe,
                query_args_name,
                query_args,
                endpoint,
                sample_count,
                config,
            })
            .await
        }
    }
}
