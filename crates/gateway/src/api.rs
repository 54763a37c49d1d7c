//! Request handlers and wire types.
//!
//! Errors are returned as `{"error": "..."}` with a 4xx/5xx status.

use axum::{extract::State, http::StatusCode, response::Json};
use parley_core::message::{ConversationTurn, History, Role};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::SharedState;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn api_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

// --- Health ---

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub chunks: usize,
    pub uptime_secs: i64,
}

pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        chunks: state.engine.retriever().index().len(),
        uptime_secs: (chrono::Utc::now() - state.started_at).num_seconds(),
    })
}

// --- One-shot query ---

#[derive(Debug, Deserialize)]
pub struct RagQueryRequest {
    #[serde(default)]
    pub question: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RagQueryResponse {
    pub answer: String,
    pub source: String,
    pub confidence: u8,
    pub question: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

pub async fn rag_query(
    State(state): State<SharedState>,
    Json(body): Json<RagQueryRequest>,
) -> ApiResult<RagQueryResponse> {
    let question = body.question.unwrap_or_default();
    let question = question.trim();
    if question.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Question is required"));
    }

    info!(question_len = question.len(), "RAG query received");
    let answer = state.engine.answer(question).await;

    Ok(Json(RagQueryResponse {
        answer: answer.text,
        source: answer.source_id,
        confidence: answer.confidence,
        question: question.to_string(),
        timestamp: chrono::Utc::now(),
    }))
}

// --- Stateless chat ---

/// The client owns the conversation and sends it back on every call.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<ConversationTurn>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub conversation_history: Vec<ConversationTurn>,
}

pub async fn chat(
    State(state): State<SharedState>,
    Json(body): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    let message = body.message.trim();
    if message.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Message is required"));
    }

    let mut history = History::from_turns(body.conversation_history)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
    if history.last_role() == Some(Role::User) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Conversation history must end with an assistant turn",
        ));
    }

    let reply = state.engine.respond(message, &history).await.map_err(|e| {
        warn!(error = %e, "Chat turn failed");
        api_error(StatusCode::BAD_GATEWAY, e.to_string())
    })?;

    history
        .push_exchange(message, reply.text.clone())
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    Ok(Json(ChatResponse {
        response: reply.text,
        conversation_history: history.into_turns(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GatewayState, build_router};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use parley_agent::TurnEngine;
    use parley_config::GatewayConfig;
    use parley_core::persona::Persona;
    use parley_knowledge::{Chunker, RetrievalPolicy, Retriever, build_corpus, builtin};
    use parley_providers::{HashingEmbedder, MockProvider};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn app_with(provider: MockProvider) -> axum::Router {
        let corpus = build_corpus(
            builtin::sources(),
            Chunker::default(),
            Arc::new(HashingEmbedder::new(256)),
            None,
        )
        .await
        .unwrap();
        let engine = TurnEngine::new(
            Retriever::new(corpus.index, RetrievalPolicy::default()),
            Arc::new(provider),
            Persona::default(),
        );
        build_router(
            Arc::new(GatewayState::new(Arc::new(engine))),
            &GatewayConfig::default(),
        )
    }

    async fn app() -> axum::Router {
        app_with(MockProvider::new(vec![
            "You need a passport, proof of address and tax forms.".into(),
        ]))
        .await
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_indexed_chunks() {
        let response = app()
            .await
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert!(body["chunks"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn rag_query_answers_with_source() {
        let response = app()
            .await
            .oneshot(post_json(
                "/api/rag-query",
                serde_json::json!({"question": "What documents does KYC AML require?"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: RagQueryResponse = json_body(response).await;
        assert_eq!(body.answer, "You need a passport, proof of address and tax forms.");
        assert_eq!(body.question, "What documents does KYC AML require?");
        assert_ne!(body.source, "error");
        assert_ne!(body.source, "no_match");
        assert!(body.confidence > 0);
    }

    #[tokio::test]
    async fn rag_query_without_question_is_rejected() {
        for payload in [serde_json::json!({}), serde_json::json!({"question": "   "})] {
            let response = app()
                .await
                .oneshot(post_json("/api/rag-query", payload))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body: ErrorResponse = json_body(response).await;
            assert_eq!(body.error, "Question is required");
        }
    }

    #[tokio::test]
    async fn rag_query_backend_failure_is_still_an_answer() {
        let response = app_with(MockProvider::new(vec![]))
            .await
            .oneshot(post_json(
                "/api/rag-query",
                serde_json::json!({"question": "What is the escalation path?"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: RagQueryResponse = json_body(response).await;
        assert_eq!(body.source, "error");
        assert_eq!(body.confidence, 0);
        assert_eq!(body.answer, Persona::default().error_reply);
    }

    #[tokio::test]
    async fn chat_appends_the_exchange() {
        let response = app()
            .await
            .oneshot(post_json(
                "/api/chat",
                serde_json::json!({
                    "message": "Which documents does KYC need?",
                    "conversationHistory": [
                        {"role": "assistant", "content": "Hi, I'm Max."},
                        {"role": "user", "content": "Hello"},
                        {"role": "assistant", "content": "How can I help?"}
                    ]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: ChatResponse = json_body(response).await;
        assert_eq!(body.response, "You need a passport, proof of address and tax forms.");
        assert_eq!(body.conversation_history.len(), 5);
        assert_eq!(
            body.conversation_history[3],
            ConversationTurn::user("Which documents does KYC need?")
        );
        assert_eq!(
            body.conversation_history[4],
            ConversationTurn::assistant("You need a passport, proof of address and tax forms.")
        );
    }

    #[tokio::test]
    async fn chat_rejects_broken_alternation() {
        let response = app()
            .await
            .oneshot(post_json(
                "/api/chat",
                serde_json::json!({
                    "message": "and now?",
                    "conversationHistory": [
                        {"role": "user", "content": "one"},
                        {"role": "user", "content": "two"}
                    ]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_rejects_blank_message() {
        let response = app()
            .await
            .oneshot(post_json("/api/chat", serde_json::json!({"message": "  "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_backend_failure_is_bad_gateway() {
        let response = app_with(MockProvider::new(vec![]))
            .await
            .oneshot(post_json(
                "/api/chat",
                serde_json::json!({"message": "What is the escalation path?"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body: ErrorResponse = json_body(response).await;
        assert!(body.error.contains("Generation failed"));
    }

    #[tokio::test]
    async fn oversized_body_is_refused() {
        let corpus = build_corpus(
            builtin::sources(),
            Chunker::default(),
            Arc::new(HashingEmbedder::new(64)),
            None,
        )
        .await
        .unwrap();
        let engine = TurnEngine::new(
            Retriever::new(corpus.index, RetrievalPolicy::default()),
            Arc::new(MockProvider::default()),
            Persona::default(),
        );
        let config = GatewayConfig {
            max_body_bytes: 64,
            ..GatewayConfig::default()
        };
        let app = build_router(Arc::new(GatewayState::new(Arc::new(engine))), &config);

        let response = app
            .oneshot(post_json(
                "/api/rag-query",
                serde_json::json!({"question": "x".repeat(500)}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
