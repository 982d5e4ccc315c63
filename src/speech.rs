use log::info;
use std::sync::Arc;

use crate::chunking::split_sentences;
use crate::error::{ServiceError, ServiceResult};
use crate::providers::{SpeechToText, TextToSpeech};

/// Smallest audio payload worth sending to the transcription API. Anything
/// below this is noise or a truncated upload.
const MIN_AUDIO_BYTES: usize = 1024;

const SENTENCE_TERMINATORS: [char; 3] = ['.', '!', '?'];

/// Voice question input and spoken-lecture output, on top of the configured
/// speech providers.
pub struct SpeechService {
    stt: Arc<dyn SpeechToText>,
    tts: Arc<dyn TextToSpeech>,
}

impl SpeechService {
    pub fn new(stt: Arc<dyn SpeechToText>, tts: Arc<dyn TextToSpeech>) -> Self {
        SpeechService { stt, tts }
    }

    /// Transcribe a spoken question. Audio below the size floor or yielding
    /// an empty transcript fails with a distinct, client-visible error.
    pub async fn transcribe_question(
        &self,
        audio: Vec<u8>,
        language: Option<&str>,
    ) -> ServiceResult<String> {
        if audio.len() < MIN_AUDIO_BYTES {
            return Err(ServiceError::UnusableAudio(format!(
                "audio too short ({} bytes)",
                audio.len()
            )));
        }

        let transcript = self.stt.transcribe(audio, language).await?;
        let transcript = transcript.trim().to_string();

        if transcript.is_empty() {
            return Err(ServiceError::UnusableAudio(
                "no speech recognized in audio".into(),
            ));
        }

        info!("Transcribed question ({} chars)", transcript.chars().count());
        Ok(transcript)
    }

    /// Synthesize text of any length. Input is segmented at sentence
    /// boundaries to fit the provider's per-request limit, and the resulting
    /// audio segments are concatenated in order.
    pub async fn synthesize_long(&self, text: &str, voice: &str) -> ServiceResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::Validation("nothing to synthesize".into()));
        }

        let segments = segment_for_synthesis(text, self.tts.max_input_chars());
        info!("Synthesizing {} segment(s) of speech", segments.len());

        let mut audio = Vec::new();
        for segment in &segments {
            let part = self.tts.synthesize(segment, voice).await?;
            audio.extend_from_slice(&part);
        }

        Ok(audio)
    }
}

/// Split text into pieces of at most `max_chars`, cutting only at sentence
/// boundaries when possible. A single sentence longer than the limit is
/// hard-split as a last resort.
pub fn segment_for_synthesis(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for (_, sentence) in split_sentences(text, &SENTENCE_TERMINATORS) {
        let sentence_len = sentence.chars().count();

        if sentence_len > max_chars {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
                current_len = 0;
            }
            // Hard-split the oversized sentence
            let chars: Vec<char> = sentence.chars().collect();
            for piece in chars.chunks(max_chars) {
                segments.push(piece.iter().collect());
            }
            continue;
        }

        if current_len + sentence_len + 1 > max_chars && !current.is_empty() {
            segments.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(&sentence);
        current_len += sentence_len;
    }

    if !current.is_empty() {
        segments.push(current);
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubStt {
        transcript: String,
    }

    #[async_trait]
    impl SpeechToText for StubStt {
        async fn transcribe(&self, _audio: Vec<u8>, _language: Option<&str>) -> ServiceResult<String> {
            Ok(self.transcript.clone())
        }
    }

    struct StubTts {
        limit: usize,
    }

    #[async_trait]
    impl TextToSpeech for StubTts {
        fn max_input_chars(&self) -> usize {
            self.limit
        }

        async fn synthesize(&self, text: &str, _voice: &str) -> ServiceResult<Vec<u8>> {
            // Encode the segment length so ordering is observable
            Ok(vec![text.chars().count() as u8])
        }
    }

    fn service(transcript: &str, limit: usize) -> SpeechService {
        SpeechService::new(
            Arc::new(StubStt {
                transcript: transcript.to_string(),
            }),
            Arc::new(StubTts { limit }),
        )
    }

    #[tokio::test]
    async fn short_audio_is_rejected_before_the_api_call() {
        let svc = service("hello", 100);
        let err = svc.transcribe_question(vec![0u8; 10], None).await.unwrap_err();
        assert!(matches!(err, ServiceError::UnusableAudio(_)));
    }

    #[tokio::test]
    async fn empty_transcript_is_unusable_audio() {
        let svc = service("   ", 100);
        let err = svc
            .transcribe_question(vec![0u8; MIN_AUDIO_BYTES], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UnusableAudio(_)));
    }

    #[test]
    fn segments_respect_the_length_limit() {
        let text = "One sentence here. Another sentence there. A third one follows. And a fourth.";
        let segments = segment_for_synthesis(text, 40);

        assert!(segments.len() > 1);
        for segment in &segments {
            assert!(segment.chars().count() <= 40, "segment too long: {:?}", segment);
        }
    }

    #[test]
    fn segment_order_preserves_the_script() {
        let text = "First part. Second part. Third part.";
        let segments = segment_for_synthesis(text, 15);
        let rejoined = segments.join(" ");

        assert!(rejoined.find("First").unwrap() < rejoined.find("Second").unwrap());
        assert!(rejoined.find("Second").unwrap() < rejoined.find("Third").unwrap());
    }

    #[tokio::test]
    async fn long_text_concatenates_audio_in_order() {
        let svc = service("ok", 20);
        let audio = svc
            .synthesize_long("Alpha one two. Beta three four. Gamma five six.", "alloy")
            .await
            .unwrap();

        // One byte per segment, so several segments produce several bytes
        assert!(audio.len() > 1);
    }
}
