//! End-to-end ingestion and retrieval scenarios

mod common;

use cogniflow::ingestion::{FileLoader, TextSplitter};
use cogniflow::retrieval::DEFAULT_SESSION;
use cogniflow::{
    ContextRetriever, ConversationEngine, Error, IndexBuilder, IngestionPipeline, JobState,
    JobTracker, SessionStore,
};
use common::{EchoLlm, WordEmbedder, GEOGRAPHY};
use futures_util::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;

struct World {
    dir: tempfile::TempDir,
    jobs: Arc<JobTracker>,
    sessions: Arc<SessionStore>,
}

impl World {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            jobs: Arc::new(JobTracker::new()),
            sessions: Arc::new(SessionStore::new()),
        }
    }

    fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    fn pipeline(&self, embedder: WordEmbedder) -> IngestionPipeline {
        IngestionPipeline::new(
            Arc::new(FileLoader::new()),
            TextSplitter::new(40, 0),
            IndexBuilder::new(5),
            Arc::new(embedder),
            Arc::clone(&self.jobs),
            Arc::clone(&self.sessions),
        )
        .with_cache_dir(self.cache_dir())
    }

    fn write(&self, name: &str, text: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }
}

#[tokio::test]
async fn upload_then_ask_grounds_reply_in_document() {
    let world = World::new();
    let path = world.write("abc.txt", GEOGRAPHY);
    world
        .pipeline(WordEmbedder::default())
        .run("abc", &path, "geography.txt")
        .await
        .unwrap();

    let retriever = ContextRetriever::new(Arc::clone(&world.sessions), Arc::new(WordEmbedder::default()));
    let hits = retriever.retrieve(Some("abc"), "capital of France", 3).await.unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].chunk.text, "Paris is the capital of France.");
    assert_eq!(hits[0].chunk.source(), Some("geography.txt"));

    let llm = Arc::new(EchoLlm::new("What do you know about French cities?"));
    let engine = ConversationEngine::new(llm.clone(), 20, 4);
    let context: Vec<_> = hits.into_iter().map(|h| h.chunk).collect();
    let reply = engine.respond(&[], &context, "capital of France").await.unwrap();

    assert_eq!(reply, "What do you know about French cities?");
    let request = llm.last_request.lock().clone();
    assert!(request[1].content.starts_with("Context from material:\nParis is the capital of France."));
    assert!(request[1].content.ends_with("Student question: capital of France"));
}

#[tokio::test]
async fn unknown_session_without_default_still_answers() {
    let world = World::new();
    let retriever = ContextRetriever::new(Arc::clone(&world.sessions), Arc::new(WordEmbedder::default()));

    let context: Vec<cogniflow::Chunk> = match retriever.retrieve(Some("missing"), "capital of France", 3).await {
        Ok(hits) => hits.into_iter().map(|h| h.chunk).collect(),
        Err(Error::SessionNotFound(_)) => Vec::new(),
        Err(e) => panic!("unexpected error: {}", e),
    };
    assert!(context.is_empty());

    let engine = ConversationEngine::new(Arc::new(EchoLlm::new("Let's start from what you know.")), 20, 4);
    let reply = engine.respond(&[], &context, "capital of France").await.unwrap();
    assert_eq!(reply, "Let's start from what you know.");
}

#[tokio::test]
async fn failed_build_keeps_previous_default() {
    let world = World::new();
    let good = world.write("good.txt", GEOGRAPHY);
    world
        .pipeline(WordEmbedder::default())
        .run("good", &good, "good.txt")
        .await
        .unwrap();
    let previous = world.sessions.get(DEFAULT_SESSION).unwrap();

    let facts = (0..15)
        .map(|i| format!("Rome fact number {}.", i))
        .collect::<Vec<_>>()
        .join("\n\n");
    let bad = world.write("bad.txt", &facts);
    let result = world
        .pipeline(WordEmbedder::failing_on_batch(2))
        .run("bad", &bad, "bad.txt")
        .await;

    assert!(result.is_err());
    let status = world.jobs.get("bad").unwrap();
    assert_eq!(status.status, JobState::Error);
    assert!(status.message.contains("connection reset on batch 2"));
    assert!(world.sessions.get("bad").is_none());
    assert!(Arc::ptr_eq(&previous, &world.sessions.get(DEFAULT_SESSION).unwrap()));
}

#[tokio::test]
async fn restart_restores_default_from_cache() {
    let world = World::new();
    let path = world.write("abc.txt", GEOGRAPHY);
    world
        .pipeline(WordEmbedder::default())
        .run("abc", &path, "geography.txt")
        .await
        .unwrap();

    let restarted = Arc::new(SessionStore::new());
    assert!(restarted.load_default_from_cache(&world.cache_dir()));
    assert!(restarted.get("abc").is_none());

    let retriever = ContextRetriever::new(restarted, Arc::new(WordEmbedder::default()));
    let hits = retriever.retrieve(Some("abc"), "capital of France", 1).await.unwrap();
    assert_eq!(hits[0].chunk.text, "Paris is the capital of France.");

    std::fs::remove_file(&path).unwrap();
    assert!(!SessionStore::new().load_default_from_cache(&world.cache_dir()));
}

#[tokio::test]
async fn streamed_reply_concatenates_to_full_answer() {
    let engine = ConversationEngine::new(Arc::new(EchoLlm::new("Which river runs through Paris?")), 20, 2);

    let stream = engine.respond_stream(&[], &[], "Tell me about Paris").await.unwrap();
    let parts: Vec<String> = stream.map(|p| p.unwrap()).collect().await;

    assert_eq!(parts.concat(), "Which river runs through Paris?");
}
