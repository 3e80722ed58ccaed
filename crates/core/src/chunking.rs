use crate::error::IngestError;
use crate::models::DocumentChunk;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHUNK_SIZE: usize = 1_000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size must be positive".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Collapses whitespace runs, strips control characters, and keeps blank
/// lines as paragraph breaks so boundary detection still has something to
/// work with.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_newlines = 0u32;
    let mut pending_space = false;

    for mut ch in text.chars() {
        if ch == '\u{a0}' || ch == '\t' {
            ch = ' ';
        }
        if ch == '\n' {
            pending_newlines += 1;
            continue;
        }
        if ch == '\r' {
            continue;
        }
        if ch == '\u{fffd}' || ch.is_control() {
            continue;
        }
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if !out.is_empty() {
            if pending_newlines >= 2 {
                out.push_str("\n\n");
            } else if pending_newlines == 1 || pending_space {
                out.push(' ');
            }
        }
        pending_newlines = 0;
        pending_space = false;
        out.push(ch);
    }

    out
}

/// Whether a page's raw text looks like decodable prose rather than binary
/// garbage. Pages failing this are skipped with a warning, not a pipeline
/// abort.
pub fn page_is_decodable(text: &str) -> bool {
    let total = text.chars().count();
    if total == 0 {
        return false;
    }
    let garbage = text
        .chars()
        .filter(|ch| *ch == '\u{fffd}' || (ch.is_control() && !matches!(ch, '\n' | '\r' | '\t')))
        .count();
    garbage * 5 < total
}

/// Splits one page of text into overlapping windows of at most
/// `chunk_size` characters. Each window after the first starts
/// `chunk_overlap` characters before the previous window's end. Pages are
/// chunked independently, so overlap never crosses a page boundary and
/// `page_number` provenance stays exact. Pure function, empty input yields
/// an empty sequence.
pub fn chunk_page(text: &str, page_number: u32, config: &ChunkingConfig) -> Vec<DocumentChunk> {
    let normalized = normalize_text(text);
    if normalized.trim().is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = normalized.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let hard_end = (start + config.chunk_size).min(chars.len());
        let end = if hard_end < chars.len() {
            natural_break(&chars, start, hard_end, config.chunk_size)
        } else {
            hard_end
        };

        let piece: String = chars[start..end].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            chunks.push(DocumentChunk {
                text: trimmed.to_string(),
                page_number,
                source_offset: Some(start),
            });
        }

        if end == chars.len() {
            break;
        }
        start = end.saturating_sub(config.chunk_overlap).max(start + 1);
    }

    chunks
}

/// Looks backwards from the hard cut for a sentence or paragraph boundary,
/// never shrinking the window below half its size. Falls back to the hard
/// character cut.
fn natural_break(chars: &[char], start: usize, hard_end: usize, chunk_size: usize) -> usize {
    let floor = start + chunk_size / 2;

    for i in (floor..hard_end).rev() {
        if chars[i] == '\n' {
            return i;
        }
        if matches!(chars[i], '.' | '!' | '?') {
            let next_is_space = chars.get(i + 1).map_or(true, |c| c.is_whitespace());
            if next_is_space {
                return i + 1;
            }
        }
    }

    hard_end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_size: usize, chunk_overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size,
            chunk_overlap,
        }
    }

    #[test]
    fn whitespace_is_normalized() {
        let input = "A  \t  lot\nof   spacing";
        assert_eq!(normalize_text(input), "A lot of spacing");
    }

    #[test]
    fn paragraph_breaks_survive_normalization() {
        let input = "First paragraph.\n\n\nSecond   paragraph.";
        assert_eq!(normalize_text(input), "First paragraph.\n\nSecond paragraph.");
    }

    #[test]
    fn control_characters_are_stripped() {
        let input = "clean\u{0}\u{1} text";
        assert_eq!(normalize_text(input), "clean text");
    }

    #[test]
    fn empty_page_yields_no_chunks() {
        assert!(chunk_page("", 1, &ChunkingConfig::default()).is_empty());
        assert!(chunk_page("   \n\t  ", 1, &ChunkingConfig::default()).is_empty());
    }

    #[test]
    fn short_page_is_a_single_chunk() {
        let chunks = chunk_page("just a few words", 7, &ChunkingConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "just a few words");
        assert_eq!(chunks[0].page_number, 7);
        assert_eq!(chunks[0].source_offset, Some(0));
    }

    #[test]
    fn twenty_four_hundred_chars_make_three_chunks() {
        let text = "abcdefghij".repeat(240);
        assert_eq!(text.len(), 2400);

        let chunks = chunk_page(&text, 1, &config(1000, 200));

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].source_offset, Some(0));
        assert_eq!(chunks[1].source_offset, Some(800));
        assert_eq!(chunks[2].source_offset, Some(1600));
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 1000);
        }
    }

    #[test]
    fn consecutive_chunks_share_the_overlap() {
        let text = "abcdefghij".repeat(240);
        let chunks = chunk_page(&text, 1, &config(1000, 200));

        let tail: String = chunks[0].text.chars().skip(800).collect();
        let head: String = chunks[1].text.chars().take(200).collect();
        assert_eq!(tail, head);
    }

    #[test]
    fn cut_prefers_a_sentence_boundary() {
        let mut text = "x".repeat(950);
        text.push_str(". ");
        text.push_str(&"y".repeat(400));

        let chunks = chunk_page(&text, 1, &config(1000, 200));

        assert!(chunks[0].text.ends_with('.'));
        assert!(chunks.len() >= 2);
    }

    #[test]
    fn chunks_never_merge_across_pages() {
        let page_one = chunk_page("first page text", 1, &ChunkingConfig::default());
        let page_two = chunk_page("second page text", 2, &ChunkingConfig::default());

        assert!(page_one.iter().all(|chunk| chunk.page_number == 1));
        assert!(page_two.iter().all(|chunk| chunk.page_number == 2));
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = "Sentences repeat. ".repeat(200);
        let first = chunk_page(&text, 3, &config(500, 100));
        let second = chunk_page(&text, 3, &config(500, 100));
        assert_eq!(first, second);
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        assert!(config(100, 100).validate().is_err());
        assert!(config(100, 150).validate().is_err());
        assert!(config(0, 0).validate().is_err());
        assert!(config(100, 20).validate().is_ok());
    }

    #[test]
    fn garbage_pages_are_flagged() {
        assert!(page_is_decodable("ordinary readable text"));
        assert!(!page_is_decodable(""));
        let garbage: String = std::iter::repeat('\u{1}').take(80).chain("ok".chars()).collect();
        assert!(!page_is_decodable(&garbage));
    }
}
