use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

use ragstore_core::error::Error;
use ragstore_core::traits::Embedder;

/// Bounds every provider call by a deadline.
///
/// The inner call runs on a blocking thread; when the deadline passes the
/// caller gets `Error::Timeout` while the abandoned call finishes in the
/// background. Must not be used from inside another tokio runtime.
pub struct TimeoutEmbedder {
    inner: Arc<dyn Embedder>,
    timeout: Duration,
    runtime: Runtime,
}

impl TimeoutEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, timeout: Duration) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_time().build()?;
        Ok(Self { inner, timeout, runtime })
    }
}

impl Embedder for TimeoutEmbedder {
    fn embedder_id(&self) -> &str {
        self.inner.embedder_id()
    }

    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let inner = Arc::clone(&self.inner);
        let texts = texts.to_vec();
        let call = self.runtime.spawn_blocking(move || inner.embed_many(&texts));
        match self.runtime.block_on(async { tokio::time::timeout(self.timeout, call).await }) {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(anyhow!("embedding task failed: {join}")),
            Err(_elapsed) => Err(anyhow::Error::new(Error::Timeout(self.timeout))),
        }
    }
}
