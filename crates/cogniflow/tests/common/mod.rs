//! Shared providers for integration tests

use async_trait::async_trait;
use cogniflow::providers::{EmbeddingProvider, FragmentStream, LlmProvider};
use cogniflow::{Error, Message, Result};
use futures_util::{stream, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

const VOCAB: &[&str] = &[
    "paris", "berlin", "madrid", "rome", "kyiv", "capital", "france", "germany", "spain",
    "italy", "ukraine",
];

pub const GEOGRAPHY: &str = "Paris is the capital of France.\n\n\
Berlin is the capital of Germany.\n\n\
Madrid is the capital of Spain.\n\n\
Rome is the capital of Italy.\n\n\
Kyiv is the capital of Ukraine.";

/// Word-count embedder over a small geography vocabulary
#[derive(Default)]
pub struct WordEmbedder {
    batches: AtomicUsize,
    fail_on_batch: Option<usize>,
}

impl WordEmbedder {
    pub fn failing_on_batch(n: usize) -> Self {
        Self {
            batches: AtomicUsize::new(0),
            fail_on_batch: Some(n),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for WordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0; VOCAB.len()];
        for word in text.split(|c: char| !c.is_alphanumeric()) {
            let word = word.to_lowercase();
            if let Some(i) = VOCAB.iter().position(|v| *v == word) {
                vector[i] += 1.0;
            }
        }
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch_no = self.batches.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_batch == Some(batch_no) {
            return Err(Error::embedding(format!("connection reset on batch {}", batch_no)));
        }
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        VOCAB.len()
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "words"
    }
}

/// LLM echoing a fixed reply and remembering the last request
pub struct EchoLlm {
    reply: String,
    pub last_request: Mutex<Vec<Message>>,
}

impl EchoLlm {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            last_request: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LlmProvider for EchoLlm {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        *self.last_request.lock() = messages.to_vec();
        Ok(self.reply.clone())
    }

    async fn stream(&self, messages: &[Message]) -> Result<FragmentStream> {
        *self.last_request.lock() = messages.to_vec();
        let fragments: Vec<Result<String>> = self
            .reply
            .split_inclusive(' ')
            .map(|f| Ok(f.to_string()))
            .collect();
        Ok(stream::iter(fragments).boxed())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "echo"
    }

    fn model(&self) -> &str {
        "echo"
    }
}
