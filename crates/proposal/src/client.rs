//! TCP client for the amortization-network service.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use model::Distribution;

use crate::protocol::{parse_observe_init, parse_proposal, ProposalRequest};
use crate::types::{ProposalConfig, ProposalError};

/// Client connection to a trained amortization-network service.
///
/// Speaks newline-delimited JSON over TCP. Requests are strictly sequential:
/// one in flight at a time, each reply read under the configured timeout.
pub struct ProposalClient {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    config: ProposalConfig,
}

impl ProposalClient {
    /// Connect to the service at `addr` (`host:port`).
    pub async fn connect(addr: &str, config: ProposalConfig) -> Result<Self, ProposalError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();
        tracing::debug!(addr, "Connected to proposal service");
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
            config,
        })
    }

    /// Send one JSON line and read one reply line, with timeout.
    async fn send_line(&mut self, json: &str) -> Result<String, ProposalError> {
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        let timeout_secs = self.config.request_timeout_secs;
        let mut reply = String::new();
        let read_result = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            self.reader.read_line(&mut reply),
        )
        .await;

        match read_result {
            Ok(Ok(0)) => Err(ProposalError::ConnectionClosed),
            Ok(Ok(_)) => Ok(reply),
            Ok(Err(e)) => Err(ProposalError::Io(e)),
            Err(_) => Err(ProposalError::Timeout(timeout_secs)),
        }
    }

    async fn round_trip(&mut self, request: &ProposalRequest) -> Result<String, ProposalError> {
        let json = request
            .to_json()
            .map_err(|e| ProposalError::Protocol(format!("Serialization error: {e}")))?;
        self.send_line(&json).await
    }

    /// Register the observe-embedder input for this session.
    ///
    /// Must complete before any proposal request; the service conditions the
    /// whole session on this input.
    pub async fn observe_init(&mut self, input: &serde_json::Value) -> Result<(), ProposalError> {
        let request = ProposalRequest::ObserveInit { input: input.clone() };
        let reply = self.round_trip(&request).await?;
        parse_observe_init(reply.trim())
    }

    /// Request a proposal distribution for one latent address.
    pub async fn request_proposal(
        &mut self,
        address: &str,
        prior: &Distribution,
        prefix: &[serde_json::Value],
    ) -> Result<Distribution, ProposalError> {
        let request = ProposalRequest::Proposal {
            address: address.to_string(),
            prior: prior.clone(),
            prefix: prefix.to_vec(),
        };
        let reply = self.round_trip(&request).await?;
        parse_proposal(reply.trim())
    }
}
