//! Integration tests composing the full stack the CLI drives: registry
//! resolution, episode serving, and guided sampling over real sockets.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use model::builtin_registry;
use proposal::ProposalConfig;
use session::{CompileOptions, CompileSession, EpisodeFrame, InferOptions, InferSession};

/// A trainer pulling a batch of episodes over one connection.
#[tokio::test]
async fn test_trainer_collects_fresh_episodes() {
    let registry = builtin_registry();
    let options = CompileOptions {
        namespace: "demo.q".to_string(),
        query: "gaussian".to_string(),
        combine_observes: "embed-obs".to_string(),
        combine_samples: Some("sample-values".to_string()),
        query_args_name: Some("default-args".to_string()),
        query_args_literal: None,
        endpoint: "tcp://127.0.0.1:0".to_string(),
    };
    let session = CompileSession::build(&registry, &options).unwrap();
    let server = session.bind().await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.serve());

    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut episodes = Vec::new();
    for _ in 0..5 {
        write_half
            .write_all(b"{\"cmd\": \"episode.request\", \"payload\": {}}\n")
            .await
            .unwrap();
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let frame: EpisodeFrame = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(frame.observations.as_array().unwrap().len(), 2);
        assert_eq!(frame.samples.as_array().unwrap().len(), 1);
        episodes.push(frame);
    }

    // Every exchange runs a fresh execution, so the latents differ
    let first = episodes[0].samples[0].as_f64().unwrap();
    let second = episodes[1].samples[0].as_f64().unwrap();
    assert_ne!(first, second);
}

/// Canned service that proposes the prior-shaped uniform for every address.
async fn spawn_uniform_service() -> (std::net::SocketAddr, Arc<AtomicUsize>) {
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
        write_half.write_all(b"{\"ok\": true}\n").await.unwrap();

        loop {
            line.clear();
            if reader.read_line(&mut line).await.unwrap() == 0 {
                return;
            }
            counter.fetch_add(1, Ordering::SeqCst);
            write_half
                .write_all(
                    b"{\"distribution\": {\"type\": \"uniform\", \"low\": -1.0, \"high\": 1.0}}\n",
                )
                .await
                .unwrap();
        }
    });

    (addr, requests)
}

/// Guided sampling through a query whose trace length varies per execution.
#[tokio::test]
async fn test_infer_marsaglia_variable_length_traces() {
    let (addr, requests) = spawn_uniform_service().await;

    let registry = builtin_registry();
    let options = InferOptions {
        namespace: "demo.q".to_string(),
        query: "marsaglia".to_string(),
        observe_name: None,
        observe_literal: Some(r#"{"obs0": 8.0, "obs1": 9.0}"#.to_string()),
        query_args_name: None,
        query_args_literal: None,
        endpoint: format!("tcp://{addr}"),
        sample_count: 2,
    };
    let session = InferSession::build(&registry, &options).unwrap();
    let mut states = session.connect(ProposalConfig::default()).await.unwrap();

    let mut served = 0;
    for _ in 0..2 {
        let state = states.next_state().await.unwrap();
        assert!(state.result.is_f64());
        assert!(state.log_weight.is_finite());

        // The rejection loop draws uniforms in x, y pairs
        let now = requests.load(Ordering::SeqCst);
        let drawn = now - served;
        assert!(drawn >= 2);
        assert_eq!(drawn % 2, 0);
        served = now;
    }
}
