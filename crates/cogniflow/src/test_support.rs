//! Deterministic providers for unit tests

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, FragmentStream, LlmProvider};
use crate::types::{Chunk, Message};

const GEOGRAPHY_VOCAB: &[&str] = &[
    "paris", "berlin", "madrid", "rome", "kyiv", "capital", "france", "germany", "spain",
    "italy", "ukraine", "river", "seine",
];

/// Five one-sentence chunks, one capital each
pub fn geography_chunks() -> Vec<Chunk> {
    [
        "Paris is the capital of France.",
        "Berlin is the capital of Germany.",
        "Madrid is the capital of Spain.",
        "Rome is the capital of Italy.",
        "Kyiv is the capital of Ukraine.",
    ]
    .iter()
    .map(|text| Chunk::new(*text).with_metadata("source", "geography.txt").with_metadata("page", 1))
    .collect()
}

/// Bag-of-words embedder over a fixed vocabulary
pub struct VocabEmbedder {
    vocab: Vec<&'static str>,
    batches: Mutex<Vec<usize>>,
    fail_on_batch: Option<usize>,
    drop_last: bool,
    reported_dimensions: Option<usize>,
}

impl VocabEmbedder {
    pub fn geography() -> Self {
        Self {
            vocab: GEOGRAPHY_VOCAB.to_vec(),
            batches: Mutex::new(Vec::new()),
            fail_on_batch: None,
            drop_last: false,
            reported_dimensions: None,
        }
    }

    /// Fail the `n`th (1-based) `embed_batch` call
    pub fn failing_on_batch(mut self, n: usize) -> Self {
        self.fail_on_batch = Some(n);
        self
    }

    /// Return one vector too few per batch
    pub fn dropping_last_vector(mut self) -> Self {
        self.drop_last = true;
        self
    }

    /// Report `n` from `dimensions()` while still returning vocabulary-sized vectors
    pub fn reporting_dimensions(mut self, n: usize) -> Self {
        self.reported_dimensions = Some(n);
        self
    }

    /// Sizes of all `embed_batch` calls so far
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().clone()
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.vocab.len()];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            if let Some(i) = self.vocab.iter().position(|v| *v == word) {
                vector[i] += 1.0;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for VocabEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch_no = {
            let mut batches = self.batches.lock();
            batches.push(texts.len());
            batches.len()
        };
        if self.fail_on_batch == Some(batch_no) {
            return Err(Error::embedding(format!("simulated outage on batch {}", batch_no)));
        }

        let mut vectors: Vec<Vec<f32>> = texts.iter().map(|t| self.vectorize(t)).collect();
        if self.drop_last {
            vectors.pop();
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.reported_dimensions.unwrap_or(self.vocab.len())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "vocab"
    }
}

struct ScriptedInner {
    reply: Option<String>,
    calls: AtomicUsize,
    last_messages: Mutex<Vec<Message>>,
}

/// LLM that answers every request with the same reply, or always fails
#[derive(Clone)]
pub struct ScriptedLlm {
    inner: Arc<ScriptedInner>,
}

impl ScriptedLlm {
    pub fn new(reply: impl Into<String>) -> Self {
        Self::with_reply(Some(reply.into()))
    }

    pub fn failing() -> Self {
        Self::with_reply(None)
    }

    fn with_reply(reply: Option<String>) -> Self {
        Self {
            inner: Arc::new(ScriptedInner {
                reply,
                calls: AtomicUsize::new(0),
                last_messages: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Vec<Message> {
        self.inner.last_messages.lock().clone()
    }

    fn record(&self, messages: &[Message]) -> Result<String> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        *self.inner.last_messages.lock() = messages.to_vec();
        self.inner
            .reply
            .clone()
            .ok_or_else(|| Error::llm("model unavailable"))
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        self.record(messages)
    }

    async fn stream(&self, messages: &[Message]) -> Result<FragmentStream> {
        let reply = self.record(messages)?;
        let fragments: Vec<Result<String>> = reply
            .split_inclusive(' ')
            .map(|f| Ok(f.to_string()))
            .collect();
        Ok(stream::iter(fragments).boxed())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.inner.reply.is_some())
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// LLM whose stream never ends; records when the stream is dropped
#[derive(Default)]
pub struct EndlessLlm {
    dropped: Arc<AtomicBool>,
}

impl EndlessLlm {
    pub fn upstream_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for EndlessLlm {
    async fn complete(&self, _messages: &[Message]) -> Result<String> {
        Ok("tick".to_string())
    }

    async fn stream(&self, _messages: &[Message]) -> Result<FragmentStream> {
        let flag = DropFlag(Arc::clone(&self.dropped));
        Ok(stream::unfold(flag, |flag| async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            Some((Ok::<_, Error>("tick ".to_string()), flag))
        })
        .boxed())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "endless"
    }

    fn model(&self) -> &str {
        "endless-model"
    }
}
