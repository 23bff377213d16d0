//! Tutor reply generation over retrieved context
//!
//! Streamed replies are produced by a background task that forwards model
//! fragments into a bounded channel. The consumer side is [`ResponseStream`];
//! dropping it (or calling [`ResponseStream::stop`]) aborts the producer, which
//! drops the upstream model stream and closes its HTTP connection.

use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::config::ConversationConfig;
use crate::error::Result;
use crate::providers::LlmProvider;
use crate::types::{Chunk, Message};

use super::prompt::PromptBuilder;

/// Produces Socratic tutor replies from history, context and a question
pub struct ConversationEngine {
    llm: Arc<dyn LlmProvider>,
    prompts: PromptBuilder,
    stream_buffer: usize,
}

impl ConversationEngine {
    pub fn new(llm: Arc<dyn LlmProvider>, max_history: usize, stream_buffer: usize) -> Self {
        Self {
            llm,
            prompts: PromptBuilder::new(max_history),
            stream_buffer: stream_buffer.max(1),
        }
    }

    pub fn from_config(llm: Arc<dyn LlmProvider>, config: &ConversationConfig) -> Self {
        Self::new(llm, config.max_history, config.stream_buffer)
    }

    /// Model backing this engine
    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// Generate the complete reply
    ///
    /// An empty `context` still goes to the model; the tutor then answers
    /// from the conversation alone.
    pub async fn respond(&self, history: &[Message], context: &[Chunk], query: &str) -> Result<String> {
        let messages = self.prompts.build_messages(history, context, query);
        debug!(
            "Requesting reply from {} ({} messages, {} context chunks)",
            self.llm.name(),
            messages.len(),
            context.len()
        );
        self.llm.complete(&messages).await
    }

    /// Generate the reply as a stream of fragments
    ///
    /// Errors opening the upstream stream are returned here; errors after the
    /// first fragment arrive as the last stream item.
    pub async fn respond_stream(
        &self,
        history: &[Message],
        context: &[Chunk],
        query: &str,
    ) -> Result<ResponseStream> {
        let messages = self.prompts.build_messages(history, context, query);
        let mut upstream = self.llm.stream(&messages).await?;

        let (tx, rx) = mpsc::channel(self.stream_buffer);
        let producer = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => {
                        debug!("Reply consumer went away, stopping producer");
                        break;
                    }
                    next = upstream.next() => match next {
                        Some(item) => {
                            let failed = item.is_err();
                            if let Err(e) = &item {
                                warn!("Model stream failed: {}", e);
                            }
                            if tx.send(item).await.is_err() || failed {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        });

        Ok(ResponseStream {
            inner: ReceiverStream::new(rx),
            producer,
        })
    }
}

/// Finite, non-restartable stream of reply fragments
pub struct ResponseStream {
    inner: ReceiverStream<Result<String>>,
    producer: JoinHandle<()>,
}

impl ResponseStream {
    /// Stop generation; fragments already buffered are still yielded
    pub fn stop(&mut self) {
        self.producer.abort();
        self.inner.close();
    }
}

impl Stream for ResponseStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for ResponseStream {
    fn drop(&mut self) {
        self.producer.abort();
    }
}
