// Web module
// The online query flow: one page that accepts a question, retrieves the
// most similar documentation sections and renders the model's answer.


use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use askama::Template;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::answer::{generate_answer, segment_answer, SegmentedAnswer};
use crate::links::{citation_label, SupportingTexts};
use crate::openai::OpenAiClient;
use crate::pinecone::PineconeIndexClient;

/// Number of nearest sections retrieved per question.
const TOP_K: usize = 5;

/// Shared state for all handlers. Clients are constructed once at startup
/// and injected, never reached for as globals.
pub struct AppState {
    pub openai: OpenAiClient,
    pub index: PineconeIndexClient,
}

#[derive(Debug, Deserialize)]
pub struct QuestionForm {
    question: String,
    /// Empty string means "use the default persona".
    #[serde(default)]
    system_message: String,
}

/// Result of one question: the segmented answer plus the citations backing
/// it, in relevance order.
#[derive(Debug)]
pub struct QueryOutcome {
    pub answer: SegmentedAnswer,
    pub supporting: SupportingTexts,
}

/// Run the full query pipeline for one question: embed, retrieve, build
/// citations, generate and segment the answer.
///
/// A question with no embedding (empty after normalization) yields an empty
/// match set and therefore the fixed no-match answer. Stored keys that fail
/// citation formatting are skipped with a warning rather than failing the
/// request.
#[inline]
pub fn answer_question(
    openai: &OpenAiClient,
    index: &PineconeIndexClient,
    question: &str,
    system_message: Option<&str>,
) -> Result<QueryOutcome> {
    let mut supporting = SupportingTexts::new();

    if let Some(embedding) = openai
        .embed(question)
        .context("Failed to embed question")?
    {
        let matches = index
            .query(embedding, TOP_K)
            .context("Vector index query failed")?;

        for index_match in &matches {
            match citation_label(&index_match.id) {
                Ok(label) => supporting.insert(index_match.id.clone(), label),
                Err(e) => warn!("Skipping malformed index key {}: {}", index_match.id, e),
            }
        }
    }

    let raw = generate_answer(openai, question, &supporting, system_message)
        .context("Answer generation failed")?;

    Ok(QueryOutcome {
        answer: segment_answer(&raw),
        supporting,
    })
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexPage {
    answer: Option<AnswerView>,
}

struct AnswerView {
    segments: Vec<SegmentView>,
    supporting: Vec<(String, String)>,
}

struct SegmentView {
    text: String,
    is_code: bool,
}

impl From<QueryOutcome> for AnswerView {
    fn from(outcome: QueryOutcome) -> Self {
        let segments = outcome
            .answer
            .segments
            .iter()
            .enumerate()
            .map(|(i, text)| SegmentView {
                text: text.clone(),
                is_code: outcome.answer.is_code(i),
            })
            .collect();

        let supporting = outcome
            .supporting
            .iter()
            .map(|(link, label)| (link.to_string(), label.to_string()))
            .collect();

        Self {
            segments,
            supporting,
        }
    }
}

fn render_template<T: Template>(template: &T) -> Response {
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Template render error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}

async fn index_page() -> Response {
    render_template(&IndexPage { answer: None })
}

async fn ask(State(state): State<Arc<AppState>>, Form(form): Form<QuestionForm>) -> Response {
    let question = form.question;
    let system_message = if form.system_message.is_empty() {
        None
    } else {
        Some(form.system_message)
    };

    let worker_state = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || {
        answer_question(
            &worker_state.openai,
            &worker_state.index,
            &question,
            system_message.as_deref(),
        )
    })
    .await;

    match result {
        Ok(Ok(outcome)) => render_template(&IndexPage {
            answer: Some(AnswerView::from(outcome)),
        }),
        Ok(Err(e)) => {
            error!("Query pipeline failed: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
        Err(e) => {
            error!("Query task panicked: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

#[inline]
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_page).post(ask))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve the question-answering page until the process exits.
#[inline]
pub async fn run_server(state: Arc<AppState>, bind: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{bind}:{port}")
        .parse()
        .with_context(|| format!("Invalid bind address {bind}:{port}"))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Listening on http://{}", addr);
    axum::serve(listener, build_router(state))
        .await
        .context("Server error")
}
