//! Integration tests exercising both session modes over real sockets.
//!
//! The compile tests play the trainer side of the episode protocol; the
//! infer tests stand up a canned amortization-network service.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use model::builtin_registry;
use proposal::ProposalConfig;
use session::{
    CompileOptions, CompileSession, EpisodeFrame, InferOptions, InferSession, SessionError,
};

fn compile_options() -> CompileOptions {
    CompileOptions {
        namespace: "demo.q".to_string(),
        query: "gaussian".to_string(),
        combine_observes: "embed-obs".to_string(),
        combine_samples: None,
        query_args_name: None,
        query_args_literal: None,
        endpoint: "tcp://127.0.0.1:0".to_string(),
    }
}

async fn start_server(options: CompileOptions) -> std::net::SocketAddr {
    let registry = builtin_registry();
    let session = CompileSession::build(&registry, &options).unwrap();
    let server = session.bind().await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.serve());
    addr
}

async fn request_episode(
    reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
) -> EpisodeFrame {
    writer
        .write_all(b"{\"cmd\": \"episode.request\", \"payload\": {}}\n")
        .await
        .unwrap();
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    serde_json::from_str(line.trim()).unwrap()
}

#[tokio::test]
async fn test_compile_server_streams_episodes() {
    let addr = start_server(compile_options()).await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    // Two exchanges on one connection, each a fresh execution
    for _ in 0..2 {
        let frame = request_episode(&mut reader, &mut write_half).await;

        let observations = frame.observations.as_array().expect("observations array");
        assert_eq!(observations.len(), 2);
        assert!(observations.iter().all(|v| v.is_f64()));

        // Identity combine-samples: raw entries survive
        let samples = frame.samples.as_array().expect("samples array");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0]["address"], "mu");
    }
}

#[tokio::test]
async fn test_compile_server_applies_sample_combiner() {
    let mut options = compile_options();
    options.query = "marsaglia".to_string();
    options.combine_samples = Some("sample-values".to_string());
    let addr = start_server(options).await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let frame = request_episode(&mut reader, &mut write_half).await;
    let samples = frame.samples.as_array().unwrap();
    // Marsaglia draws uniforms in pairs and sample-values keeps bare numbers
    assert!(samples.len() >= 2);
    assert_eq!(samples.len() % 2, 0);
    assert!(samples.iter().all(|v| v.is_f64()));
}

#[tokio::test]
async fn test_compile_server_drops_bad_exchange_without_reply() {
    let addr = start_server(compile_options()).await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    // A malformed line produces no reply; the next valid request still works,
    // so the first line read back is that request's episode.
    write_half.write_all(b"this is not json\n").await.unwrap();
    let frame = request_episode(&mut reader, &mut write_half).await;
    assert!(frame.observations.is_array());
}

#[tokio::test]
async fn test_compile_server_survives_disconnects() {
    let addr = start_server(compile_options()).await;

    // First trainer connects and walks away mid-protocol
    {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"{\"cmd\": \"episode.req").await.unwrap();
    }

    // Second trainer still gets served
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let frame = request_episode(&mut reader, &mut write_half).await;
    assert_eq!(frame.observations.as_array().unwrap().len(), 2);
}

#[test]
fn test_unresolvable_query_fails_before_any_socket() {
    let registry = builtin_registry();
    let mut options = compile_options();
    options.namespace = "prod.models".to_string();

    // build is synchronous: resolution happens with no listener in sight
    let err = CompileSession::build(&registry, &options).unwrap_err();
    assert!(matches!(err, SessionError::Resolution(_)));
    assert!(err.to_string().contains("prod.models"));
}

// ---------------------------------------------------------------------------
// Infer mode against a canned service
// ---------------------------------------------------------------------------

/// Canned amortization-network service: acks `observe.init`, then answers
/// every proposal request with a fixed normal. Returns the bound address and
/// a counter of proposal requests served.
async fn spawn_proposal_service() -> (std::net::SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&requests);

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut line = String::new();

        reader.read_line(&mut line).await.unwrap();
        let init: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(init["cmd"], "observe.init");
        write_half.write_all(b"{\"ok\": true}\n").await.unwrap();

        loop {
            line.clear();
            if reader.read_line(&mut line).await.unwrap() == 0 {
                return;
            }
            let request: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
            assert_eq!(request["cmd"], "proposal.request");
            counter.fetch_add(1, Ordering::SeqCst);
            write_half
                .write_all(
                    b"{\"distribution\": {\"type\": \"normal\", \"mean\": 8.5, \"stddev\": 0.5}}\n",
                )
                .await
                .unwrap();
        }
    });

    (addr, requests)
}

fn infer_options(addr: std::net::SocketAddr) -> InferOptions {
    InferOptions {
        namespace: "demo.q".to_string(),
        query: "gaussian".to_string(),
        observe_name: Some("example-obs".to_string()),
        observe_literal: None,
        query_args_name: None,
        query_args_literal: None,
        endpoint: format!("tcp://{addr}"),
        sample_count: 3,
    }
}

#[tokio::test]
async fn test_infer_session_end_to_end() {
    let (addr, requests) = spawn_proposal_service().await;

    let registry = builtin_registry();
    let session = InferSession::build(&registry, &infer_options(addr)).unwrap();
    let mut stream = session.connect(ProposalConfig::default()).await.unwrap();

    for n in 1..=3u64 {
        let state = stream.next_state().await.unwrap();
        let mu = state.result.as_f64().unwrap();
        // Proposals concentrate near the posterior mean, far from the prior
        assert!((mu - 8.5).abs() < 5.0);
        assert!(state.log_weight.is_finite());
        // One latent in the model, so exactly one request per state
        assert_eq!(requests.load(Ordering::SeqCst), n as usize);
    }
}

#[tokio::test]
async fn test_infer_connect_failure_is_fatal() {
    // Grab a port and close it again so nothing is listening there
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let registry = builtin_registry();
    let session = InferSession::build(&registry, &infer_options(addr)).unwrap();
    let err = session.connect(ProposalConfig::default()).await.unwrap_err();
    match err {
        SessionError::Connect { endpoint, .. } => {
            assert_eq!(endpoint, format!("tcp://{addr}"));
        }
        other => panic!("expected Connect error, got {other:?}"),
    }
}
