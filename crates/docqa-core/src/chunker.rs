//! Splits extracted document text into overlapping, position-tracked chunks.
//!
//! Cuts prefer, in order: a paragraph break, a sentence end, any whitespace,
//! and finally a hard character cut. Chunk `i + 1` starts `overlap`
//! characters before chunk `i` ends, so dropping the first `overlap`
//! characters of every chunk after the first reconstructs the source text.

use std::ops::Range;

use crate::config::ChunkingSettings;
use crate::error::Result;
use crate::types::{chunk_id, Chunk, Document};

const PAGE_BREAK: char = '\x0c';

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    settings: ChunkingSettings,
}

impl Chunker {
    pub fn new(settings: ChunkingSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> ChunkingSettings {
        self.settings
    }

    /// Chunk a document. Whitespace-only text yields no chunks.
    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        let text = &document.raw_text;
        let spans = split_spans(text, self.settings.target_size, self.settings.overlap);
        if spans.is_empty() {
            return Vec::new();
        }

        let byte_at = char_byte_offsets(text);
        let pages = text.contains(PAGE_BREAK).then(|| page_starts(text));

        spans
            .into_iter()
            .enumerate()
            .map(|(sequence_index, span)| Chunk {
                chunk_id: chunk_id(&document.document_id, sequence_index),
                document_id: document.document_id.clone(),
                session_id: document.session_id.clone(),
                sequence_index,
                text: text[byte_at[span.start]..byte_at[span.end]].to_string(),
                char_start: span.start,
                char_end: span.end,
                page_number: pages.as_ref().map(|p| page_of(p, span.start)),
            })
            .collect()
    }
}

/// Character ranges of each chunk. Sizes are in characters; callers must
/// guarantee `overlap < target_size` (see [`ChunkingSettings::validate`]).
pub fn split_spans(text: &str, target_size: usize, overlap: usize) -> Vec<Range<usize>> {
    if text.trim().is_empty() || target_size == 0 || overlap >= target_size {
        return Vec::new();
    }
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    let mut spans = Vec::new();
    let mut start = 0;
    loop {
        if len - start <= target_size {
            spans.push(start..len);
            break;
        }
        let hard_end = start + target_size;
        // the next chunk starts at `end - overlap`, which must move forward;
        // a boundary in the first half of the window is not worth a short chunk
        let min_end = (start + overlap + 1).max(start + target_size / 2);
        let end = find_cut(&chars, min_end, hard_end).unwrap_or(hard_end);
        spans.push(start..end);
        start = end - overlap;
    }
    spans
}

fn find_cut(chars: &[char], min_end: usize, max_end: usize) -> Option<usize> {
    let candidates = || (min_end..=max_end).rev();
    let paragraph = |p: usize| p >= 2 && chars[p - 1] == '\n' && chars[p - 2] == '\n';
    let sentence = |p: usize| {
        p >= 2 && (chars[p - 1] == '\n' || (chars[p - 1].is_whitespace() && matches!(chars[p - 2], '.' | '!' | '?')))
    };
    let word = |p: usize| p >= 1 && chars[p - 1].is_whitespace();

    candidates()
        .find(|&p| paragraph(p))
        .or_else(|| candidates().find(|&p| sentence(p)))
        .or_else(|| candidates().find(|&p| word(p)))
}

fn char_byte_offsets(text: &str) -> Vec<usize> {
    let mut offsets: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
    offsets.push(text.len());
    offsets
}

/// Character offsets at which each page begins; page 1 starts at 0.
fn page_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    starts.extend(text.chars().enumerate().filter(|(_, c)| *c == PAGE_BREAK).map(|(i, _)| i + 1));
    starts
}

fn page_of(page_starts: &[usize], char_pos: usize) -> u32 {
    let page = page_starts.partition_point(|&s| s <= char_pos);
    u32::try_from(page.max(1)).unwrap_or(u32::MAX)
}

/// Rebuild the source text from ordered chunks by dropping each chunk's
/// overlap with its predecessor.
pub fn reassemble(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    let mut covered: usize = 0;
    for chunk in chunks {
        let skip = covered.saturating_sub(chunk.char_start);
        out.extend(chunk.text.chars().skip(skip));
        covered = chunk.char_end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::new("session_test", "doc1.txt", text)
    }

    fn chunker(target_size: usize, overlap: usize) -> Chunker {
        Chunker::new(ChunkingSettings { target_size, overlap }).unwrap()
    }

    #[test]
    fn whitespace_only_yields_nothing() {
        assert!(chunker(100, 10).chunk_document(&doc("")).is_empty());
        assert!(chunker(100, 10).chunk_document(&doc(" \n\n\t ")).is_empty());
    }

    #[test]
    fn short_text_is_single_chunk() {
        let chunks = chunker(100, 10).chunk_document(&doc("Short text."));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Short text.");
        assert_eq!((chunks[0].char_start, chunks[0].char_end), (0, 11));
        assert_eq!(chunks[0].page_number, None);
    }

    #[test]
    fn invalid_overlap_is_configuration_error() {
        let err = Chunker::new(ChunkingSettings { target_size: 50, overlap: 60 }).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn prefers_paragraph_breaks() {
        let text = format!("{}\n\n{}", "a".repeat(60), "b".repeat(60));
        let chunks = chunker(100, 10).chunk_document(&doc(&text));
        assert_eq!(chunks[0].char_end, 62, "cut right after the blank line");
        assert!(chunks[0].text.ends_with("\n\n"));
        assert_eq!(chunks[1].char_start, 52);
    }

    #[test]
    fn early_paragraph_break_does_not_end_chunk() {
        let text = format!("{}\n\n{}", "a".repeat(15), "b".repeat(200));
        let chunks = chunker(100, 10).chunk_document(&doc(&text));
        assert_eq!(chunks[0].char_end, 100);
        assert_eq!(chunks[1].char_start, 90);
    }

    #[test]
    fn falls_back_to_hard_cuts() {
        let text = "x".repeat(250);
        let chunks = chunker(100, 20).chunk_document(&doc(&text));
        let spans: Vec<_> = chunks.iter().map(|c| (c.char_start, c.char_end)).collect();
        assert_eq!(spans, vec![(0, 100), (80, 180), (160, 250)]);
    }

    #[test]
    fn overlap_duplicates_trailing_characters() {
        let text = "One sentence here. Another sentence follows. ".repeat(20);
        let chunks = chunker(120, 25).chunk_document(&doc(&text));
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].text.chars().collect();
            let tail: String = prev[prev.len() - 25..].iter().collect();
            assert!(pair[1].text.starts_with(&tail));
            assert_eq!(pair[0].char_end - pair[1].char_start, 25);
        }
    }

    #[test]
    fn coverage_reconstructs_multibyte_text() {
        let text = "Über die Brücke — naïve café.\n\nΣύνοψη κειμένου. ".repeat(15);
        let chunks = chunker(90, 17).chunk_document(&doc(&text));
        assert_eq!(reassemble(&chunks), text);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.sequence_index, i);
            assert!(c.char_start < c.char_end);
            assert_eq!(c.text.chars().count(), c.char_end - c.char_start);
        }
    }

    #[test]
    fn page_numbers_follow_form_feeds() {
        let text = format!("{}\x0c{}\x0c{}", "p1 ".repeat(30), "p2 ".repeat(30), "p3 ".repeat(30));
        let chunks = chunker(60, 5).chunk_document(&doc(&text));
        assert_eq!(chunks.first().unwrap().page_number, Some(1));
        assert_eq!(chunks.last().unwrap().page_number, Some(3));
        let pages: Vec<u32> = chunks.iter().filter_map(|c| c.page_number).collect();
        assert!(pages.windows(2).all(|w| w[0] <= w[1]));
    }
}
