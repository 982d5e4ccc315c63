use std::str::FromStr;

use uuid::Uuid;

/// How page text is segmented before packing into chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStrategy {
    /// Pack whole sentences; a chunk never ends mid-sentence
    Sentence,
    /// Pack paragraphs separated by blank lines
    Paragraph,
    /// Fixed-size character windows
    Character,
}

impl FromStr for ChunkStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sentence" => Ok(ChunkStrategy::Sentence),
            "paragraph" => Ok(ChunkStrategy::Paragraph),
            "character" => Ok(ChunkStrategy::Character),
            other => Err(format!("unknown chunk strategy: {}", other)),
        }
    }
}

/// Chunking parameters. Overlap is expressed as a fraction of the target
/// chunk size and resolved to characters at chunk time.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    pub strategy: ChunkStrategy,
    /// Target chunk size in characters
    pub target_size: usize,
    /// Overlap between consecutive chunks, as a fraction of `target_size`
    pub overlap_ratio: f32,
    /// Characters that terminate a sentence for the sentence strategy
    pub sentence_terminators: Vec<char>,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        ChunkConfig {
            strategy: ChunkStrategy::Sentence,
            target_size: 1000,
            overlap_ratio: 0.2,
            sentence_terminators: vec!['.', '!', '?'],
        }
    }
}

impl ChunkConfig {
    /// Overlap budget in characters
    pub fn overlap_chars(&self) -> usize {
        (self.target_size as f32 * self.overlap_ratio.clamp(0.0, 0.9)) as usize
    }
}

/// A bounded text segment cut from one page, carrying its provenance
#[derive(Debug, Clone)]
pub struct PageChunk {
    pub lecture_id: Uuid,
    pub page_number: i32,
    /// Position of this chunk in the lecture-wide chunk sequence
    pub chunk_index: usize,
    /// Character offset of the chunk's first segment within the page text
    pub start_offset: usize,
    pub text: String,
}

/// Split one page of text into chunks. `next_index` is the lecture-wide
/// index of the first chunk produced, so indices stay unique and stable
/// across pages.
pub fn chunk_page(
    config: &ChunkConfig,
    lecture_id: Uuid,
    page_number: i32,
    text: &str,
    next_index: usize,
) -> Vec<PageChunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let pieces = match config.strategy {
        ChunkStrategy::Sentence => pack_segments(
            split_sentences(text, &config.sentence_terminators),
            config.target_size,
            config.overlap_chars(),
        ),
        ChunkStrategy::Paragraph => pack_segments(
            split_paragraphs(text),
            config.target_size,
            config.overlap_chars(),
        ),
        ChunkStrategy::Character => {
            character_windows(text, config.target_size, config.overlap_chars())
        }
    };

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, (start_offset, text))| PageChunk {
            lecture_id,
            page_number,
            chunk_index: next_index + i,
            start_offset,
            text,
        })
        .collect()
}

/// Split text into sentences, keeping the terminator with its sentence.
/// Returns each sentence with its character offset in the input.
pub fn split_sentences(text: &str, terminators: &[char]) -> Vec<(usize, String)> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut start = 0usize;
    let mut offset = 0usize;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if current.is_empty() && c.is_whitespace() {
            offset += 1;
            continue;
        }
        if current.is_empty() {
            start = offset;
        }
        current.push(c);
        offset += 1;

        // A terminator only ends the sentence at a whitespace boundary, so
        // "3.14" or "e.g." stay intact.
        if terminators.contains(&c) {
            let at_boundary = match chars.peek() {
                Some(next) => next.is_whitespace(),
                None => true,
            };
            if at_boundary {
                sentences.push((start, current.trim_end().to_string()));
                current.clear();
            }
        }
    }

    if !current.trim().is_empty() {
        sentences.push((start, current.trim_end().to_string()));
    }

    sentences
}

/// Split text on blank lines, returning each paragraph with its offset
fn split_paragraphs(text: &str) -> Vec<(usize, String)> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut start = 0usize;
    let mut offset = 0usize;

    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            if !current.trim().is_empty() {
                paragraphs.push((start, current.trim().to_string()));
            }
            current.clear();
        } else {
            if current.is_empty() {
                start = offset;
            }
            current.push_str(line);
        }
        offset += line.chars().count();
    }

    if !current.trim().is_empty() {
        paragraphs.push((start, current.trim().to_string()));
    }

    paragraphs
}

/// Pack ordered segments into chunks of at most `target` characters,
/// carrying trailing segments up to `overlap` characters into the next
/// chunk. A single oversized segment becomes its own chunk rather than
/// being split.
fn pack_segments(
    segments: Vec<(usize, String)>,
    target: usize,
    overlap: usize,
) -> Vec<(usize, String)> {
    let mut chunks = Vec::new();
    // (offset, text) of segments in the chunk being built
    let mut buffer: Vec<(usize, String)> = Vec::new();
    let mut buffer_len = 0usize;

    for (offset, segment) in segments {
        let segment_len = segment.chars().count();

        if buffer_len + segment_len > target && !buffer.is_empty() {
            chunks.push(flush(&buffer));

            // Seed the next chunk with trailing segments within the overlap
            // budget, preserving their order.
            let mut carried: Vec<(usize, String)> = Vec::new();
            let mut carried_len = 0usize;
            for (o, s) in buffer.iter().rev() {
                let len = s.chars().count();
                if carried_len + len > overlap {
                    break;
                }
                carried_len += len;
                carried.push((*o, s.clone()));
            }
            carried.reverse();
            buffer = carried;
            buffer_len = carried_len;
        }

        buffer_len += segment_len;
        buffer.push((offset, segment));
    }

    if !buffer.is_empty() {
        chunks.push(flush(&buffer));
    }

    chunks
}

fn flush(buffer: &[(usize, String)]) -> (usize, String) {
    let start = buffer[0].0;
    let text = buffer
        .iter()
        .map(|(_, s)| s.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    (start, text)
}

/// Sliding character windows with fixed overlap
fn character_windows(text: &str, target: usize, overlap: usize) -> Vec<(usize, String)> {
    let chars: Vec<char> = text.trim().chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    // Guarantee forward progress even with a degenerate overlap
    let step = target.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let end = (start + target).min(chars.len());
        let piece: String = chars[start..end].iter().collect();
        chunks.push((start, piece));
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(strategy: ChunkStrategy, target: usize, ratio: f32) -> ChunkConfig {
        ChunkConfig {
            strategy,
            target_size: target,
            overlap_ratio: ratio,
            ..ChunkConfig::default()
        }
    }

    #[test]
    fn sentence_strategy_never_splits_inside_a_sentence() {
        let text = "Rust is a systems language. It has no garbage collector! Is it fast? Yes.";
        let cfg = config(ChunkStrategy::Sentence, 40, 0.0);
        let chunks = chunk_page(&cfg, Uuid::nil(), 1, text, 0);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            let last = chunk.text.trim_end().chars().last().unwrap();
            assert!(
                cfg.sentence_terminators.contains(&last),
                "chunk ends mid-sentence: {:?}",
                chunk.text
            );
        }
    }

    #[test]
    fn terminator_inside_a_number_does_not_end_the_sentence() {
        let sentences = split_sentences("Pi is 3.14 exactly. Almost.", &['.', '!', '?']);
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].1, "Pi is 3.14 exactly.");
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = "First paragraph with some sentences. Another sentence here.\n\n\
                    Second paragraph follows. It also has content. More text to pad the page out.";
        let cfg = config(ChunkStrategy::Sentence, 60, 0.25);

        let a = chunk_page(&cfg, Uuid::nil(), 1, text, 0);
        let b = chunk_page(&cfg, Uuid::nil(), 1, text, 0);

        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.text, y.text);
            assert_eq!(x.start_offset, y.start_offset);
            assert_eq!(x.chunk_index, y.chunk_index);
        }
    }

    #[test]
    fn overlap_carries_trailing_sentences_forward() {
        let text =
            "Alpha sentence one. Beta sentence two. Gamma sentence three. Delta sentence four.";
        let cfg = config(ChunkStrategy::Sentence, 45, 0.5);
        let chunks = chunk_page(&cfg, Uuid::nil(), 1, text, 0);

        assert!(chunks.len() >= 2);
        // The second chunk starts with material repeated from the first
        let first_tail = chunks[0].text.split(". ").last().unwrap();
        assert!(
            chunks[1].text.contains(first_tail.trim_end_matches('.')),
            "expected overlap between {:?} and {:?}",
            chunks[0].text,
            chunks[1].text
        );
    }

    #[test]
    fn character_strategy_windows_cover_the_whole_page() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        let cfg = config(ChunkStrategy::Character, 10, 0.2);
        let chunks = chunk_page(&cfg, Uuid::nil(), 1, text, 0);

        assert_eq!(chunks[0].text.chars().count(), 10);
        assert!(chunks.last().unwrap().text.ends_with('z'));
        // Window step is target minus overlap
        assert_eq!(chunks[1].start_offset, 8);
    }

    #[test]
    fn paragraph_strategy_splits_on_blank_lines() {
        let text = "Paragraph one line.\n\nParagraph two line.\n\nParagraph three line.";
        let cfg = config(ChunkStrategy::Paragraph, 25, 0.0);
        let chunks = chunk_page(&cfg, Uuid::nil(), 1, text, 0);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "Paragraph one line.");
    }

    #[test]
    fn chunk_indices_continue_across_pages() {
        let cfg = config(ChunkStrategy::Sentence, 1000, 0.2);
        let first = chunk_page(&cfg, Uuid::nil(), 1, "Page one text.", 0);
        let second = chunk_page(&cfg, Uuid::nil(), 2, "Page two text.", first.len());

        assert_eq!(first[0].chunk_index, 0);
        assert_eq!(second[0].chunk_index, 1);
        assert_eq!(second[0].page_number, 2);
    }

    #[test]
    fn empty_page_yields_no_chunks() {
        let cfg = ChunkConfig::default();
        assert!(chunk_page(&cfg, Uuid::nil(), 1, "   \n\n  ", 0).is_empty());
    }
}
