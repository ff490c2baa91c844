//! Ordering, truncation and failure behaviour shared by every embedding
//! backend, exercised through the public factory.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ndarray::Array1;
use ragsage_core::{ProviderConfig, ProviderError};
use ragsage_infer::local::LOCAL_MAX_CHARS;
use ragsage_infer::{create_embedding_model, EmbeddingBackend, LocalEncoder, LocalModels};
use serde_json::{json, Value};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// OpenAI-style vendor that answers each chunk in rotated order, tagging
/// every vector with its position. The vector holds the text's number.
struct RotatingVendor;

impl Respond for RotatingVendor {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = request.body_json().unwrap();
        let inputs: Vec<String> = serde_json::from_value(body["input"].clone()).unwrap();
        let n = inputs.len();
        let data: Vec<Value> = (0..n)
            .map(|k| (k + 1) % n)
            .map(|i| {
                let value: f32 = inputs[i].trim_start_matches("doc ").parse().unwrap();
                json!({"index": i, "embedding": [value, 1.0]})
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({"data": data, "usage": {"total_tokens": n}}))
    }
}

fn documents(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("doc {}", i)).collect()
}

fn pool() -> LocalModels {
    LocalModels::with_default_loader(std::env::temp_dir())
}

#[tokio::test]
async fn order_preserved_for_every_batch_size() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(RotatingVendor)
        .mount(&server)
        .await;

    let config = ProviderConfig::new("sk-test", "").with_endpoint(server.uri());
    let model = create_embedding_model(EmbeddingBackend::OpenAi, &config, &pool()).unwrap();

    let texts = documents(9);
    for batch_size in [1, texts.len(), texts.len() + 100] {
        let batch = model.encode(&texts, batch_size).await.unwrap();
        assert_eq!(batch.len(), texts.len());
        for (i, vector) in batch.vectors.iter().enumerate() {
            assert_eq!(vector[0], i as f32, "batch_size={}", batch_size);
        }
        assert_eq!(batch.token_usage, texts.len() as u64);
    }
}

#[tokio::test]
async fn empty_input_makes_no_upstream_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(RotatingVendor)
        .expect(0)
        .mount(&server)
        .await;

    let config = ProviderConfig::new("sk-test", "").with_endpoint(server.uri());
    let model = create_embedding_model(EmbeddingBackend::OpenAi, &config, &pool()).unwrap();
    let batch = model.encode(&[], 32).await.unwrap();
    assert!(batch.is_empty());
    assert_eq!(batch.token_usage, 0);
}

#[tokio::test]
async fn long_texts_cut_to_vendor_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"index": 0, "embedding": [0.0]}]
        })))
        .mount(&server)
        .await;

    let config = ProviderConfig::new("sk-test", "").with_endpoint(server.uri());
    let model = create_embedding_model(EmbeddingBackend::OpenAi, &config, &pool()).unwrap();
    model.encode(&["长".repeat(10_000)], 1).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: Value = requests[0].body_json().unwrap();
    let sent = body["input"][0].as_str().unwrap();
    assert_eq!(sent.chars().count(), model.max_input_chars());
}

#[tokio::test]
async fn transport_failure_propagates() {
    // Bind then drop to get a port nobody listens on
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let endpoint = format!("http://127.0.0.1:{}", port);

    for backend in [
        EmbeddingBackend::OpenAi,
        EmbeddingBackend::Xinference,
        EmbeddingBackend::ZhipuAi,
        EmbeddingBackend::Qwen,
        EmbeddingBackend::Ollama,
    ] {
        let config = ProviderConfig::new("key", "some-model").with_endpoint(endpoint.clone());
        let model = create_embedding_model(backend, &config, &pool()).unwrap();

        let err = model.encode(&documents(3), 2).await.unwrap_err();
        assert!(matches!(err, ProviderError::Transport(_)), "{}: {:?}", backend, err);
        assert!(model.encode_query("q").await.is_err(), "{}", backend);
    }
}

#[tokio::test]
async fn slow_vendor_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(3))
                .set_body_json(json!({"data": [{"index": 0, "embedding": [1.0]}]})),
        )
        .mount(&server)
        .await;

    let config = ProviderConfig::new("sk-test", "")
        .with_endpoint(server.uri())
        .with_extra("timeout_secs", json!(1));
    let model = create_embedding_model(EmbeddingBackend::OpenAi, &config, &pool()).unwrap();

    match model.encode(&documents(1), 8).await {
        Err(ProviderError::Transport(message)) => {
            assert!(message.starts_with("timed out"), "{}", message)
        }
        other => panic!("expected a transport error, got {:?}", other),
    }
}

struct CountingEncoder;

impl LocalEncoder for CountingEncoder {
    fn encode(&self, texts: &[String]) -> Result<Vec<Array1<f32>>, ProviderError> {
        Ok(texts
            .iter()
            .map(|t| Array1::from_vec(vec![t.chars().count() as f32]))
            .collect())
    }

    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

#[tokio::test]
async fn local_model_loads_once_across_instances() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = loads.clone();
    let local = LocalModels::new(std::env::temp_dir(), move |_source| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(CountingEncoder) as Arc<dyn LocalEncoder>)
    });

    let config = ProviderConfig::default();
    let first = create_embedding_model(EmbeddingBackend::Baai, &config, &local).unwrap();
    let second = create_embedding_model(EmbeddingBackend::Baai, &config, &local).unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 0);

    let docs = documents(4);
    let long = ["x".repeat(4000)];
    let (a, b) = tokio::join!(first.encode(&docs, 2), second.encode(&long, 8));
    assert_eq!(a.unwrap().token_usage, 8);
    assert_eq!(b.unwrap().vectors[0][0], LOCAL_MAX_CHARS as f32);
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[cfg(not(feature = "onnx"))]
#[tokio::test]
async fn local_model_unavailable_without_runtime() {
    let model =
        create_embedding_model(EmbeddingBackend::FastEmbed, &ProviderConfig::default(), &pool())
            .unwrap();
    let err = model.encode_query("hello").await.unwrap_err();
    assert!(matches!(err, ProviderError::ResourceInit(_)));
}
