use log::{error, info, warn};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::language::{answer_language_instruction, voice_for_language};
use crate::providers::{ChatMessage, ChatProvider};
use crate::speech::SpeechService;
use crate::storage::Storage;
use crate::store::{Lecture, LectureStore, Page};

/// Outcome of a lecture-wide audio generation run
#[derive(Debug, Clone, serde::Serialize)]
pub struct GenerationSummary {
    pub lecture_id: Uuid,
    pub pages_completed: usize,
    pub pages_failed: usize,
    pub pages_skipped: usize,
}

/// Turns page text into a spoken lecture: chat model writes the script,
/// TTS renders it, storage keeps the MP3, and the page row is updated last.
pub struct ScriptService {
    store: LectureStore,
    storage: Storage,
    chat: Arc<dyn ChatProvider>,
    speech: Arc<SpeechService>,
}

impl ScriptService {
    pub fn new(
        store: LectureStore,
        storage: Storage,
        chat: Arc<dyn ChatProvider>,
        speech: Arc<SpeechService>,
    ) -> Self {
        ScriptService {
            store,
            storage,
            chat,
            speech,
        }
    }

    /// Generate script + audio for every page of a lecture. One page's
    /// failure never blocks its siblings; a page's `audio_url` is written
    /// only after both steps succeeded.
    pub async fn generate_lecture_audio(
        &self,
        lecture: &Lecture,
        language: &str,
    ) -> ServiceResult<GenerationSummary> {
        let pages = self.store.lecture_pages(lecture.id).await?;
        if pages.is_empty() {
            return Err(ServiceError::NotFound(format!(
                "lecture {} has no pages",
                lecture.id
            )));
        }

        let mut summary = GenerationSummary {
            lecture_id: lecture.id,
            pages_completed: 0,
            pages_failed: 0,
            pages_skipped: 0,
        };

        for page in &pages {
            if page.content.trim().is_empty() {
                summary.pages_skipped += 1;
                continue;
            }

            match self.generate_page_audio(lecture, page, language).await {
                Ok(()) => summary.pages_completed += 1,
                Err(e) => {
                    warn!(
                        "audio generation failed for lecture {} page {}: {}",
                        lecture.id, page.page_number, e
                    );
                    summary.pages_failed += 1;
                }
            }
        }

        info!(
            "Lecture {} audio generation done: {} ok, {} failed, {} skipped",
            lecture.id, summary.pages_completed, summary.pages_failed, summary.pages_skipped
        );
        Ok(summary)
    }

    async fn generate_page_audio(
        &self,
        lecture: &Lecture,
        page: &Page,
        language: &str,
    ) -> ServiceResult<()> {
        let script = self.generate_page_script(lecture, page, language).await?;
        let voice = voice_for_language(language);
        let audio = self.speech.synthesize_long(&script, voice).await?;

        let audio_url = self
            .storage
            .store_page_audio(lecture.id, page.page_number, &audio)
            .await?;
        self.store.set_page_audio(page.id, &audio_url).await?;

        Ok(())
    }

    /// Write a lecturer-style narration script for one page
    async fn generate_page_script(
        &self,
        lecture: &Lecture,
        page: &Page,
        language: &str,
    ) -> ServiceResult<String> {
        let messages = [
            ChatMessage::system(format!(
                "You are a university lecturer recording an audio lecture. Turn the \
                 given slide text into a natural spoken narration. Explain the content \
                 as if presenting to students; do not mention slides, pages, or \
                 formatting. {}",
                answer_language_instruction(language)
            )),
            ChatMessage::user(format!(
                "Lecture: {}\nPage {} of {}\n\nPage content:\n{}",
                lecture.title, page.page_number, lecture.total_pages, page.content
            )),
        ];

        self.chat.complete(&messages, 0.7).await
    }

    /// Background wrapper; failures are logged since the request that
    /// kicked generation off has already been answered.
    pub async fn generate_lecture_audio_background(
        self: Arc<Self>,
        lecture: Lecture,
        language: String,
    ) {
        if let Err(e) = self.generate_lecture_audio(&lecture, &language).await {
            error!(
                "background audio generation for lecture {} failed: {}",
                lecture.id, e
            );
        }
    }
}
