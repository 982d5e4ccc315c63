use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::RagConfig;
use crate::database::VectorStore;
use crate::error::{ServiceError, ServiceResult};
use crate::language::answer_language_instruction;
use crate::providers::{ChatMessage, ChatProvider, EmbeddingProvider};

/// Characters of retrieved text quoted back per cited source
const SNIPPET_CHARS: usize = 200;

/// A prior turn of the conversation, supplied by the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// A cited source backing an answer
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub page_number: i32,
    pub chunk_index: usize,
    pub score: f32,
    pub snippet: String,
}

/// Generated answer with its supporting sources
#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// Retrieval-augmented question answering over one lecture's embedded
/// chunks.
pub struct RagEngine {
    vectors: Arc<VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatProvider>,
    top_k: u64,
    expand_queries: bool,
}

impl RagEngine {
    pub fn new(
        vectors: Arc<VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatProvider>,
        config: &RagConfig,
    ) -> Self {
        RagEngine {
            vectors,
            embedder,
            chat,
            top_k: config.top_k,
            expand_queries: config.expand_queries,
        }
    }

    /// Answer a question against a lecture's collection.
    ///
    /// A lecture that has no embedded chunks yet surfaces `RetrievalMiss` so
    /// callers can tell "not indexed" apart from an upstream outage.
    pub async fn answer(
        &self,
        lecture_id: &Uuid,
        question: &str,
        history: &[ChatTurn],
        top_k: Option<u64>,
        language: &str,
    ) -> ServiceResult<RagAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ServiceError::Validation("question is empty".into()));
        }

        if self.vectors.chunk_count(lecture_id).await? == 0 {
            return Err(ServiceError::RetrievalMiss(format!(
                "lecture {} has no embedded content",
                lecture_id
            )));
        }

        let search_query = if self.expand_queries {
            self.expand_query(question).await
        } else {
            question.to_string()
        };

        let query_embedding = self.embedder.embed_one(&search_query).await?;
        let limit = top_k.unwrap_or(self.top_k).max(1);
        let mut hits = self.vectors.search(lecture_id, query_embedding, limit).await?;

        if hits.is_empty() {
            return Err(ServiceError::RetrievalMiss(format!(
                "no relevant chunks found in lecture {}",
                lecture_id
            )));
        }

        // The store returns hits ranked already; keep the ordering defensive
        // against provider changes.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        info!(
            "Retrieved {} chunks for lecture {} (best score {:.3})",
            hits.len(),
            lecture_id,
            hits[0].score
        );

        let context = hits
            .iter()
            .map(|hit| hit.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(format!(
            "You are a teaching assistant answering questions about lecture material. \
             Answer using only the provided context. If the context does not contain \
             the information, say the lecture materials do not cover it. Keep answers \
             clear and concise. {}",
            answer_language_instruction(language)
        )));
        for turn in history {
            messages.push(ChatMessage {
                role: turn.role.clone(),
                content: turn.content.clone(),
            });
        }
        messages.push(ChatMessage::user(format!(
            "Context:\n{}\n\nQuestion: {}\n\nAnswer:",
            context, question
        )));

        let answer = self.chat.complete(&messages, 0.3).await?;

        let sources = hits
            .iter()
            .map(|hit| SourceRef {
                page_number: hit.page_number,
                chunk_index: hit.chunk_index,
                score: hit.score,
                snippet: snippet(&hit.text),
            })
            .collect();

        Ok(RagAnswer { answer, sources })
    }

    /// Rewrite a terse or conversational query into a retrieval-friendly
    /// one. Falls back to the original question on upstream failure, since a
    /// degraded search beats a failed request.
    async fn expand_query(&self, question: &str) -> String {
        let messages = [
            ChatMessage::system(
                "Rewrite the user's question as a short, self-contained search query \
                 for finding relevant lecture passages. Reply with the query only.",
            ),
            ChatMessage::user(question),
        ];

        match self.chat.complete(&messages, 0.2).await {
            Ok(expanded) if !expanded.trim().is_empty() => expanded.trim().to_string(),
            Ok(_) => question.to_string(),
            Err(e) => {
                warn!("query expansion failed, using original question: {}", e);
                question.to_string()
            }
        }
    }
}

fn snippet(text: &str) -> String {
    if text.chars().count() <= SNIPPET_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(SNIPPET_CHARS).collect();
    format!("{}…", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_truncates_on_char_boundaries() {
        let long = "강의".repeat(300);
        let s = snippet(&long);
        assert!(s.chars().count() <= SNIPPET_CHARS + 1);
        assert!(s.ends_with('…'));

        let short = "short text";
        assert_eq!(snippet(short), short);
    }
}
