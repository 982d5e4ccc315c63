use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::PageIssue;
use crate::rag::{ChatTurn, SourceRef};
use crate::store::{Lecture, Page};

/// Response for a successful lecture upload
#[derive(Serialize)]
pub struct UploadResponse {
    pub lecture: Lecture,
    pub page_count: usize,
    /// Pages that extracted with problems; the upload still succeeded
    pub issues: Vec<PageIssue>,
}

/// Lecture listing, wrapped for forward compatibility
#[derive(Serialize)]
pub struct LecturesResponse {
    pub data: Vec<Lecture>,
}

/// One lecture with all of its pages
#[derive(Serialize)]
pub struct LectureDetail {
    pub lecture: Lecture,
    pub pages: Vec<Page>,
}

/// Optional parameters for spoken-lecture generation
#[derive(Deserialize)]
pub struct GenerateAudioRequest {
    pub language: Option<String>,
}

/// Acknowledgement that generation was scheduled
#[derive(Serialize)]
pub struct GenerateAudioResponse {
    pub lecture_id: Uuid,
    pub status: &'static str,
    pub page_count: usize,
}

/// Text question against one lecture
#[derive(Deserialize)]
pub struct ChatRequest {
    pub lecture_id: Uuid,
    pub question: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    pub top_k: Option<u64>,
    pub language: Option<String>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub language: String,
    pub sources: Vec<SourceRef>,
}

/// Answer to a spoken question, with the transcript that was understood and
/// optional synthesized reply audio (base64 MP3)
#[derive(Serialize)]
pub struct AudioChatResponse {
    pub transcript: String,
    pub answer: String,
    pub language: String,
    pub sources: Vec<SourceRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_audio: Option<String>,
}
