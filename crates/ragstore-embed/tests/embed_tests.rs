use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ragstore_core::config::{EmbeddingProviderKind, EmbeddingSettings};
use ragstore_core::error::Error;
use ragstore_core::traits::Embedder;
use ragstore_embed::{build_embedder, HashEmbedder, TimeoutEmbedder};

#[test]
fn hash_embedder_shapes_and_determinism() {
    let embedder = HashEmbedder::new(1024).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_many(&texts).expect("embed_many");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 1024, "embedding dim is 1024");

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Deterministic for same input
    for (a, b) in v1.iter().zip(v2.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[test]
fn embed_one_matches_batch_entry() {
    let embedder = HashEmbedder::new(64).unwrap();
    let batch = embedder.embed_many(&["a".to_string(), "外滩".to_string()]).unwrap();
    assert_eq!(embedder.embed_one("外滩").unwrap(), batch[1]);
}

#[test]
fn factory_honours_provider_and_fake_override() {
    let none = EmbeddingSettings { provider: EmbeddingProviderKind::None, ..Default::default() };
    assert!(build_embedder(&none, false).unwrap().is_none());

    let hash = EmbeddingSettings { dimension: 32, ..Default::default() };
    let embedder = build_embedder(&hash, false).unwrap().expect("hash provider");
    assert_eq!(embedder.embed_one("x").unwrap().len(), 32);

    let candle = EmbeddingSettings {
        provider: EmbeddingProviderKind::Candle,
        model_dir: Some("/no/such/model".into()),
        dimension: 16,
        ..Default::default()
    };
    assert!(build_embedder(&candle, false).is_err());
    let forced = build_embedder(&candle, true).unwrap().expect("forced fake");
    assert_eq!(forced.embed_one("x").unwrap().len(), 16);
}

struct SlowEmbedder {
    delay: Duration,
    completed: AtomicUsize,
}

impl SlowEmbedder {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self { delay, completed: AtomicUsize::new(0) })
    }
}

impl Embedder for SlowEmbedder {
    fn embedder_id(&self) -> &str {
        "slow"
    }

    fn embed_many(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        thread::sleep(self.delay);
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

#[test]
fn timeout_wrapper_raises_typed_timeout() {
    let slow = SlowEmbedder::new(Duration::from_millis(300));
    let wrapped = TimeoutEmbedder::new(slow.clone(), Duration::from_millis(20)).unwrap();
    let err = wrapped.embed_one("late").unwrap_err();
    assert!(matches!(Error::from_provider(err), Error::Timeout(d) if d == Duration::from_millis(20)));
    assert_eq!(slow.completed.load(Ordering::SeqCst), 0, "caller returned before the call finished");
    // Dropping the wrapper waits for the abandoned call.
    drop(wrapped);
    assert_eq!(slow.completed.load(Ordering::SeqCst), 1);
}

#[test]
fn timeout_wrapper_passes_fast_results_through() {
    let fast = SlowEmbedder::new(Duration::ZERO);
    let wrapped = TimeoutEmbedder::new(fast, Duration::from_secs(5)).unwrap();
    assert_eq!(wrapped.embed_many(&["a".into(), "b".into()]).unwrap().len(), 2);
    assert_eq!(wrapped.embedder_id(), "slow");
}
