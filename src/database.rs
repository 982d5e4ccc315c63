use qdrant_client::qdrant::{
    with_payload_selector, CreateCollectionBuilder, Distance, PointStruct, SearchPoints,
    UpsertPointsBuilder, Value, VectorParams, WithPayloadSelector,
};
use qdrant_client::Qdrant;
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

use crate::chunking::PageChunk;
use crate::config::QdrantConfig;
use crate::error::{ServiceError, ServiceResult};

/// Adapter around the Qdrant vector database. One collection per lecture,
/// named deterministically from the lecture id so re-embedding targets the
/// same collection.
pub struct VectorStore {
    client: Qdrant,
    vector_size: u64,
}

/// A retrieved chunk with its similarity score and provenance
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub text: String,
    pub page_number: i32,
    pub chunk_index: usize,
    pub score: f32,
}

impl VectorStore {
    /// Create a new vector store client
    pub fn new(config: QdrantConfig) -> ServiceResult<Self> {
        let builder = Qdrant::from_url(&config.url);
        let builder = if let Some(api_key) = config.api_key {
            builder.api_key(api_key)
        } else {
            builder
        };

        let client = builder
            .build()
            .map_err(|e| ServiceError::VectorStore(format!("failed to connect to Qdrant: {}", e)))?;

        Ok(VectorStore {
            client,
            vector_size: config.vector_size,
        })
    }

    /// Check if a lecture's collection exists
    pub async fn collection_exists(&self, lecture_id: &Uuid) -> ServiceResult<bool> {
        let name = collection_name(lecture_id);

        match self.client.collection_info(&name).await {
            Ok(_) => Ok(true),
            Err(qdrant_client::QdrantError::ResponseError { status })
                if status.code() == tonic::Code::NotFound =>
            {
                Ok(false)
            }
            Err(e) => Err(ServiceError::VectorStore(format!(
                "failed to check collection {}: {}",
                name, e
            ))),
        }
    }

    /// Number of vectors stored for a lecture; zero when the collection is
    /// missing
    pub async fn chunk_count(&self, lecture_id: &Uuid) -> ServiceResult<u64> {
        let name = collection_name(lecture_id);

        match self.client.collection_info(&name).await {
            Ok(info) => Ok(info
                .result
                .and_then(|r| r.points_count)
                .unwrap_or_default()),
            Err(qdrant_client::QdrantError::ResponseError { status })
                if status.code() == tonic::Code::NotFound =>
            {
                Ok(0)
            }
            Err(e) => Err(ServiceError::VectorStore(format!(
                "failed to read collection {}: {}",
                name, e
            ))),
        }
    }

    /// Create the lecture's collection if it does not exist yet
    pub async fn ensure_collection(&self, lecture_id: &Uuid) -> ServiceResult<()> {
        if self.collection_exists(lecture_id).await? {
            return Ok(());
        }

        let name = collection_name(lecture_id);
        let create_collection =
            CreateCollectionBuilder::new(name.clone()).vectors_config(VectorParams {
                size: self.vector_size,
                distance: Distance::Cosine.into(),
                ..Default::default()
            });

        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| {
                ServiceError::VectorStore(format!("failed to create collection {}: {}", name, e))
            })?;

        Ok(())
    }

    /// Delete a lecture's collection
    pub async fn delete_collection(&self, lecture_id: &Uuid) -> ServiceResult<()> {
        let name = collection_name(lecture_id);

        self.client.delete_collection(name.clone()).await.map_err(|e| {
            ServiceError::VectorStore(format!("failed to delete collection {}: {}", name, e))
        })?;

        Ok(())
    }

    /// Upsert chunk vectors. Point ids are the chunk indices, which are
    /// stable for a given document and chunking config, so re-embedding
    /// overwrites instead of duplicating.
    pub async fn upsert_chunks(
        &self,
        lecture_id: &Uuid,
        chunks: &[PageChunk],
        embeddings: Vec<Vec<f32>>,
    ) -> ServiceResult<()> {
        let name = collection_name(lecture_id);

        if chunks.len() != embeddings.len() {
            return Err(ServiceError::VectorStore(format!(
                "chunk/vector count mismatch for {}: {} chunks, {} vectors",
                name,
                chunks.len(),
                embeddings.len()
            )));
        }

        let points: Vec<PointStruct> = chunks
            .iter()
            .zip(embeddings.into_iter())
            .map(|(chunk, embedding)| {
                let payload: HashMap<String, Value> = serde_json::from_value(json!({
                    "text": chunk.text,
                    "lecture_id": chunk.lecture_id.to_string(),
                    "page_number": chunk.page_number,
                    "chunk_index": chunk.chunk_index,
                    "start_offset": chunk.start_offset,
                }))
                .expect("chunk payload is valid JSON");

                PointStruct::new(chunk.chunk_index as u64, embedding, payload)
            })
            .collect();

        let upsert_request = UpsertPointsBuilder::new(name.clone(), points).build();

        self.client.upsert_points(upsert_request).await.map_err(|e| {
            ServiceError::VectorStore(format!("failed to upsert points in {}: {}", name, e))
        })?;

        Ok(())
    }

    /// Search a lecture's collection, returning chunks with their scores in
    /// descending relevance order
    pub async fn search(
        &self,
        lecture_id: &Uuid,
        query_embedding: Vec<f32>,
        limit: u64,
    ) -> ServiceResult<Vec<ScoredChunk>> {
        let name = collection_name(lecture_id);

        let search_request = SearchPoints {
            collection_name: name.clone(),
            vector: query_embedding,
            limit,
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(with_payload_selector::SelectorOptions::Enable(true)),
            }),
            ..Default::default()
        };

        let search_response = self.client.search_points(search_request).await.map_err(|e| {
            ServiceError::VectorStore(format!("failed to search collection {}: {}", name, e))
        })?;

        let chunks = search_response
            .result
            .into_iter()
            .filter_map(|scored_point| {
                let payload = scored_point.payload;
                let text = payload.get("text")?.as_str()?.to_string();
                let page_number = payload
                    .get("page_number")
                    .and_then(|v| v.as_integer())
                    .unwrap_or(0) as i32;
                let chunk_index = payload
                    .get("chunk_index")
                    .and_then(|v| v.as_integer())
                    .unwrap_or(0) as usize;

                Some(ScoredChunk {
                    text,
                    page_number,
                    chunk_index,
                    score: scored_point.score,
                })
            })
            .collect();

        Ok(chunks)
    }
}

/// Generate a collection name from a lecture id
pub fn collection_name(lecture_id: &Uuid) -> String {
    format!("lecture_{}", lecture_id.simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_name_is_deterministic_and_sanitized() {
        let id = Uuid::parse_str("6f9619ff-8b86-4d01-b42d-00cf4fc964ff").unwrap();
        let name = collection_name(&id);

        assert_eq!(name, collection_name(&id));
        assert_eq!(name, "lecture_6f9619ff8b864d01b42d00cf4fc964ff");
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }
}
