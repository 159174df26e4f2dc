//! Retrieval-augmentation advisor.
//!
//! Looks up documents relevant to the user turn through a
//! [`DocumentRetriever`] and appends them to the user message as context.
//! The retrieved documents are recorded in the request context under
//! [`QA_RETRIEVED_DOCUMENTS`] on both paths, so every stage after this
//! advisor sees them. A blocking call also copies them into the response
//! context. A streamed call has no response context to copy into: the
//! caller receives text fragments only, and advisors ordered before this one
//! aggregate against their own request.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use spindle_core::advisor::{Advisor, CallChain, StreamChain};
use spindle_core::provider::ChunkStream;
use spindle_core::request::{ChatRequest, ChatResponse};
use spindle_core::template::render;
use spindle_core::{Error, Result};
use tokio::sync::RwLock;
use tracing::debug;

/// Context key holding the documents used for augmentation.
pub const QA_RETRIEVED_DOCUMENTS: &str = "qa_retrieved_documents";

const DEFAULT_TEMPLATE: &str = "{query}

Context information is below, surrounded by ---------------------

---------------------
{context}
---------------------

Given the context and provided history information and not prior knowledge,
reply to the user comment. If the answer is not in the context, inform
the user that you can't answer the question.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: serde_json::Map::new(),
        }
    }
}

/// Source of context documents (a vector store, a search index, ...).
#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>>;
}

pub struct QuestionAnswerAdvisor {
    retriever: Arc<dyn DocumentRetriever>,
    template: String,
    order: i32,
}

impl QuestionAnswerAdvisor {
    pub fn new(retriever: Arc<dyn DocumentRetriever>) -> Self {
        Self {
            retriever,
            template: DEFAULT_TEMPLATE.to_string(),
            order: 0,
        }
    }

    /// `template` must contain `{query}` and `{context}`.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    async fn augment(&self, request: ChatRequest) -> Result<ChatRequest> {
        let Some(query) = request.user_text().map(str::to_string) else {
            return Ok(request);
        };
        let documents = self
            .retriever
            .retrieve(&query)
            .await
            .map_err(|e| Error::aborted(self.name(), e.to_string()))?;
        debug!(documents = documents.len(), "Retrieved context documents");

        let context = documents
            .iter()
            .map(|d| d.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let recorded = serde_json::to_value(&documents)?;
        let template = &self.template;

        Ok(request
            .map_user_text(|query| {
                let params = HashMap::from([
                    ("query".to_string(), query.to_string()),
                    ("context".to_string(), context),
                ]);
                render(template, &params)
            })
            .with_context(QA_RETRIEVED_DOCUMENTS, recorded))
    }
}

#[async_trait]
impl Advisor for QuestionAnswerAdvisor {
    fn name(&self) -> &str {
        "QuestionAnswerAdvisor"
    }

    fn order(&self) -> i32 {
        self.order
    }

    async fn advise_call(&self, request: ChatRequest, next: CallChain<'_>) -> Result<ChatResponse> {
        let request = self.augment(request).await?;
        let documents = request.context.get(QA_RETRIEVED_DOCUMENTS).cloned();
        let mut response = next.next_call(request).await?;
        if let Some(documents) = documents {
            response.context.insert(QA_RETRIEVED_DOCUMENTS.into(), documents);
        }
        Ok(response)
    }

    async fn advise_stream(&self, request: ChatRequest, next: StreamChain<'_>) -> Result<ChunkStream> {
        let request = self.augment(request).await?;
        next.next_stream(request).await
    }
}

/// Keyword-overlap retriever over documents held in memory.
///
/// Scores each document by how many distinct query terms (three or more
/// characters, case-insensitive) it contains and returns the best `top_k`.
pub struct InMemoryDocumentStore {
    documents: RwLock<Vec<Document>>,
    top_k: usize,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
            top_k: 4,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub async fn add(&self, documents: impl IntoIterator<Item = Document>) {
        self.documents.write().await.extend(documents);
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

fn terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

#[async_trait]
impl DocumentRetriever for InMemoryDocumentStore {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>> {
        let query_terms = terms(query);
        let documents = self.documents.read().await;

        let mut scored: Vec<(usize, &Document)> = documents
            .iter()
            .map(|doc| {
                let doc_terms = terms(&doc.content);
                let score = query_terms
                    .iter()
                    .filter(|t| doc_terms.binary_search(t).is_ok())
                    .count();
                (score, doc)
            })
            .filter(|(score, _)| *score > 0)
            .collect();
        // Stable: equal scores keep insertion order.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(self.top_k)
            .map(|(_, doc)| doc.clone())
            .collect())
    }
}
