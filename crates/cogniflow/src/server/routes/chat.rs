//! Tutor chat endpoint (blocking JSON or server-sent events)

use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Response, Sse,
    },
    Json,
};
use futures_util::{stream, StreamExt};
use std::convert::Infallible;

use crate::retrieval::SearchHit;
use crate::server::state::AppState;
use crate::types::{ChatRequest, ChatResponse, Chunk, SourceRef};

/// POST /chat - Answer a student question over the uploaded material
///
/// Retrieval problems (unknown session, empty index, embedding outage) only
/// remove the context; the tutor still answers.
pub async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    let top_k = request.top_k.unwrap_or(state.config().index.top_k);

    let hits: Vec<SearchHit> = match state
        .retriever()
        .retrieve(request.file_id.as_deref(), &request.message, top_k)
        .await
    {
        Ok(hits) => hits,
        Err(e) => {
            tracing::warn!("Answering without context: {}", e);
            Vec::new()
        }
    };
    let context: Vec<Chunk> = hits.iter().map(|h| h.chunk.clone()).collect();

    if request.stream {
        return stream_reply(&state, &request, &context).await;
    }

    let reply = match state
        .engine()
        .respond(&request.history, &context, &request.message)
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!("Tutor reply failed: {}", e);
            state.config().conversation.fallback_reply.clone()
        }
    };

    Json(ChatResponse {
        reply,
        model: state.engine().model().to_string(),
        sources: hits.iter().map(SourceRef::from_hit).collect(),
    })
    .into_response()
}

async fn stream_reply(state: &AppState, request: &ChatRequest, context: &[Chunk]) -> Response {
    let done = || Ok::<_, Infallible>(Event::default().event("done").data("[DONE]"));

    match state
        .engine()
        .respond_stream(&request.history, context, &request.message)
        .await
    {
        Ok(fragments) => {
            let events = fragments
                .map(|fragment| {
                    Ok::<_, Infallible>(match fragment {
                        Ok(text) => Event::default().data(text),
                        Err(e) => Event::default().event("error").data(e.to_string()),
                    })
                })
                .chain(stream::once(async move { done() }));

            Sse::new(events).keep_alive(KeepAlive::default()).into_response()
        }
        Err(e) => {
            tracing::error!("Tutor stream failed to start: {}", e);
            let events = stream::iter(vec![
                Ok(Event::default().event("error").data(e.to_string())),
                done(),
            ]);
            Sse::new(events).into_response()
        }
    }
}
