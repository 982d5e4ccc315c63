use log::{error, info, warn};
use std::sync::Arc;
use uuid::Uuid;

use crate::chunking::{chunk_page, ChunkConfig, PageChunk};
use crate::database::VectorStore;
use crate::document::{self, OcrEngine, PageIssue, RawPage};
use crate::error::{ServiceError, ServiceResult};
use crate::providers::EmbeddingProvider;
use crate::storage::Storage;
use crate::store::{Lecture, LectureStore, NewLecture, Page};

/// Result of ingesting one uploaded PDF
pub struct IngestReport {
    pub lecture: Lecture,
    pub pages: Vec<Page>,
    /// Per-page extraction problems; never fatal to the upload
    pub issues: Vec<PageIssue>,
}

/// Upload pipeline: extract pages, persist rows and the PDF, then embed the
/// chunks into the lecture's collection.
pub struct IngestService {
    store: LectureStore,
    storage: Storage,
    vectors: Arc<VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunking: ChunkConfig,
    ocr: Option<Arc<dyn OcrEngine>>,
}

impl IngestService {
    pub fn new(
        store: LectureStore,
        storage: Storage,
        vectors: Arc<VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        chunking: ChunkConfig,
        ocr: Option<Arc<dyn OcrEngine>>,
    ) -> Self {
        IngestService {
            store,
            storage,
            vectors,
            embedder,
            chunking,
            ocr,
        }
    }

    /// Ingest an uploaded PDF synchronously up to the persisted rows: every
    /// PDF page gets a row, pages that failed extraction get an issue
    /// record. Embedding runs separately (see [`IngestService::embed_lecture`]).
    pub async fn ingest_upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        title: String,
        description: Option<String>,
        language: &str,
    ) -> ServiceResult<IngestReport> {
        if title.trim().is_empty() {
            return Err(ServiceError::Validation("title must not be empty".into()));
        }
        if !document::is_pdf(file_name, &bytes) {
            return Err(ServiceError::Validation(
                "only PDF uploads are supported".into(),
            ));
        }

        // Text extraction is CPU-bound; keep it off the request executor
        let extraction_input = bytes.clone();
        let mut pages = tokio::task::spawn_blocking(move || document::extract_pages(&extraction_input))
            .await
            .map_err(|e| ServiceError::Extraction(format!("extraction task failed: {}", e)))??;

        let mut issues = Vec::new();
        self.recover_empty_pages(&bytes, &mut pages, &mut issues, language)
            .await;

        let total_pages = pages.len() as i32;
        info!(
            "Ingesting '{}': {} pages, {} with issues",
            title,
            total_pages,
            issues.len()
        );

        // The stored PDF is named after the lecture id, so pick the id
        // before the row exists and insert it with the final URL.
        let lecture_id = Uuid::new_v4();
        let pdf_url = self.storage.store_pdf(lecture_id, &bytes).await?;

        let lecture = self
            .store
            .create_lecture(NewLecture {
                id: lecture_id,
                title,
                description,
                pdf_url,
                total_pages,
            })
            .await?;

        let mut page_rows = Vec::with_capacity(pages.len());
        for page in &pages {
            let row = self
                .store
                .insert_page(lecture.id, page.page_number, &page.text)
                .await?;
            page_rows.push(row);
        }

        Ok(IngestReport {
            lecture,
            pages: page_rows,
            issues,
        })
    }

    /// Try OCR on pages that came back without a text layer; record an
    /// issue for every page that stays empty.
    async fn recover_empty_pages(
        &self,
        pdf: &[u8],
        pages: &mut [RawPage],
        issues: &mut Vec<PageIssue>,
        language: &str,
    ) {
        for page in pages.iter_mut() {
            if !page.text.is_empty() {
                continue;
            }

            match &self.ocr {
                Some(ocr) => match ocr.recognize(pdf, page.page_number, language).await {
                    Ok(text) if !text.is_empty() => {
                        info!("OCR recovered text for page {}", page.page_number);
                        page.text = text;
                    }
                    Ok(_) => issues.push(PageIssue {
                        page_number: page.page_number,
                        reason: "no text layer and OCR found nothing".into(),
                    }),
                    Err(e) => {
                        warn!("OCR failed for page {}: {}", page.page_number, e);
                        issues.push(PageIssue {
                            page_number: page.page_number,
                            reason: format!("no text layer, OCR failed: {}", e),
                        });
                    }
                },
                None => issues.push(PageIssue {
                    page_number: page.page_number,
                    reason: "no extractable text layer".into(),
                }),
            }
        }
    }

    /// Chunk and embed a lecture's pages into its vector collection.
    /// Idempotent: chunk ids are deterministic, so re-running overwrites.
    pub async fn embed_lecture(&self, lecture_id: Uuid, pages: &[Page]) -> ServiceResult<usize> {
        let mut chunks: Vec<PageChunk> = Vec::new();
        for page in pages {
            let produced = chunk_page(
                &self.chunking,
                lecture_id,
                page.page_number,
                &page.content,
                chunks.len(),
            );
            chunks.extend(produced);
        }

        if chunks.is_empty() {
            warn!("lecture {} produced no chunks to embed", lecture_id);
            return Ok(0);
        }

        self.vectors.ensure_collection(&lecture_id).await?;

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        self.vectors
            .upsert_chunks(&lecture_id, &chunks, embeddings)
            .await?;

        info!("Embedded {} chunks for lecture {}", chunks.len(), lecture_id);
        Ok(chunks.len())
    }

    /// Background wrapper around [`IngestService::embed_lecture`]; failures
    /// are logged since nobody is waiting on the result.
    pub async fn embed_lecture_background(self: Arc<Self>, lecture_id: Uuid, pages: Vec<Page>) {
        if let Err(e) = self.embed_lecture(lecture_id, &pages).await {
            error!("background embedding for lecture {} failed: {}", lecture_id, e);
        }
    }

    /// Remove a lecture everywhere: rows (pages cascade), vector
    /// collection, stored files.
    pub async fn delete_lecture(&self, lecture_id: Uuid) -> ServiceResult<()> {
        let existed = self.store.delete_lecture(lecture_id).await?;
        if !existed {
            return Err(ServiceError::NotFound(format!("lecture {}", lecture_id)));
        }

        if self.vectors.collection_exists(&lecture_id).await? {
            self.vectors.delete_collection(&lecture_id).await?;
        }
        self.storage.remove_lecture_artifacts(lecture_id).await;

        info!("Deleted lecture {}", lecture_id);
        Ok(())
    }
}
