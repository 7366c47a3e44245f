//! Compile-mode session: serve synthetic training episodes to a trainer.
//!
//! Lifecycle: [`CompileSession::build`] resolves every symbol without
//! touching the network, [`CompileSession::bind`] opens the listener, and
//! [`EpisodeServer::serve`] accepts trainer connections until the task is
//! cancelled. Each request line triggers one generative execution; the
//! combined (observations, samples) pair goes back as one reply line.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};

use model::{CombineObservesFn, CombineSamplesFn, ModelRegistry, PriorTracer, Query, Trace};

use crate::config::{CompileOptions, Endpoint, ValueSource};
use crate::types::SessionError;

/// One reply frame: the trainer-ready representation of one execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeFrame {
    /// Output of the combine-observes function.
    pub observations: serde_json::Value,
    /// Output of the combine-samples function, or the raw sample trace.
    pub samples: serde_json::Value,
}

/// A validated compile-mode session, not yet listening.
pub struct CompileSession {
    query: Arc<dyn Query>,
    query_args: serde_json::Value,
    combine_observes: CombineObservesFn,
    combine_samples: Option<CombineSamplesFn>,
    endpoint: Endpoint,
}

impl std::fmt::Debug for CompileSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileSession")
            .field("query_args", &self.query_args)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl CompileSession {
    /// Validate the options, then resolve all symbols.
    ///
    /// Configuration problems surface before any lookup, and a failure of
    /// either stage means no port was ever bound.
    pub fn build(registry: &ModelRegistry, options: &CompileOptions) -> Result<Self, SessionError> {
        let endpoint = Endpoint::parse(&options.endpoint)?;
        let args_source = ValueSource::parse(
            "query arguments",
            options.query_args_name.as_deref(),
            options.query_args_literal.as_deref(),
        )?;

        let query = registry.resolve_query(&options.namespace, &options.query)?;
        let combine_observes =
            registry.resolve_combine_observes(&options.namespace, &options.combine_observes)?;
        let combine_samples = options
            .combine_samples
            .as_deref()
            .map(|name| registry.resolve_combine_samples(&options.namespace, name))
            .transpose()?;
        let query_args = args_source.resolve(registry, &options.namespace)?;
        Ok(Self { query, query_args, combine_observes, combine_samples, endpoint })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn query_args(&self) -> &serde_json::Value {
        &self.query_args
    }

    /// Bind the endpoint, moving to the listening state.
    pub async fn bind(self) -> Result<EpisodeServer, SessionError> {
        let bind_addr = self.endpoint.bind_addr();
        let listener = TcpListener::bind(&bind_addr).await.map_err(|source| SessionError::Bind {
            endpoint: self.endpoint.to_string(),
            source,
        })?;
        tracing::info!(endpoint = %self.endpoint, "Episode server listening");
        Ok(EpisodeServer { session: Arc::new(self), listener })
    }

    /// One generative execution under a fresh prior tracer.
    async fn execute_once(&self) -> Result<Trace, SessionError> {
        let mut tracer = PriorTracer::new();
        self.query
            .simulate(&mut tracer, &self.query_args)
            .await
            .map_err(|e| SessionError::Exchange(anyhow::Error::new(e).context("query execution")))?;
        Ok(tracer.into_trace())
    }

    /// Handle one request line: execute, combine, serialize.
    ///
    /// Observations are combined before samples, and a failure in either
    /// poisons the whole exchange.
    async fn handle_exchange(&self, request: &str) -> Result<String, SessionError> {
        let request: serde_json::Value = serde_json::from_str(request)
            .map_err(|e| SessionError::Exchange(anyhow::anyhow!("Malformed request: {e}")))?;
        let cmd = request.get("cmd").and_then(|v| v.as_str()).unwrap_or("");
        if cmd != "episode.request" {
            return Err(SessionError::Exchange(anyhow::anyhow!("Unknown command `{cmd}`")));
        }

        let trace = self.execute_once().await?;
        let observations = (self.combine_observes)(&trace.observes)
            .map_err(|e| SessionError::Exchange(anyhow::Error::new(e).context("combine-observes")))?;
        let samples = match &self.combine_samples {
            Some(combine) => combine(&trace.samples)
                .map_err(|e| SessionError::Exchange(anyhow::Error::new(e).context("combine-samples")))?,
            None => serde_json::to_value(&trace.samples)
                .map_err(|e| SessionError::Exchange(anyhow::anyhow!("Serializing samples: {e}")))?,
        };

        serde_json::to_string(&EpisodeFrame { observations, samples })
            .map_err(|e| SessionError::Exchange(anyhow::anyhow!("Serializing episode: {e}")))
    }

    /// Serve one trainer connection until it disconnects.
    async fn serve_connection(&self, stream: TcpStream) -> std::io::Result<()> {
        let (read_half, write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut writer = BufWriter::new(write_half);
        let mut line = String::new();

        loop {
            line.clear();
            let n = reader.read_line(&mut line).await?;
            if n == 0 {
                tracing::debug!("Trainer disconnected");
                return Ok(());
            }

            match self.handle_exchange(line.trim()).await {
                Ok(frame) => {
                    writer.write_all(frame.as_bytes()).await?;
                    writer.write_all(b"\n").await?;
                    writer.flush().await?;
                }
                Err(e) => {
                    // Dropped exchange: no reply goes out, the connection
                    // stays open for the next request.
                    tracing::warn!(error = %e, "Exchange dropped");
                }
            }
        }
    }
}

/// A compile session holding its bound listener.
pub struct EpisodeServer {
    session: Arc<CompileSession>,
    listener: TcpListener,
}

impl EpisodeServer {
    /// The bound address; differs from the endpoint when it asked for port 0.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept trainer connections and serve exchanges until cancelled.
    ///
    /// Each connection runs on its own task. There is no terminal success
    /// state; the server runs until its future is dropped.
    pub async fn serve(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "Trainer connected");
                    let session = Arc::clone(&self.session);
                    tokio::spawn(async move {
                        if let Err(e) = session.serve_connection(stream).await {
                            tracing::warn!(%peer, error = %e, "Connection closed with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                }
            }
        }
    }
}
