//! Overlapping-window text chunker
//!
//! Splits over-sized symbol source and knowledge-base documents into windows
//! sized to the embedder's input budget. Windows carry their index, the total
//! count and byte offsets into the original text.

use serde::{Deserialize, Serialize};

/// One window of a chunked text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkWindow {
    pub chunk_index: usize,
    pub chunk_count: usize,
    pub start_offset: usize,
    pub end_offset: usize,
    pub content: String,
}

/// Overlapping-window splitter with a fixed `(chunk_size, overlap)` pair
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Build a chunker; overlap must be strictly smaller than the window
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        debug_assert!(overlap < chunk_size, "overlap must be below chunk size");
        Self {
            chunk_size: chunk_size.max(1),
            overlap: overlap.min(chunk_size.saturating_sub(1)),
        }
    }

    /// Split `content` into overlapping windows
    ///
    /// Consecutive windows overlap by exactly `overlap` bytes except possibly
    /// the final one, which may start earlier so it still ends at the text
    /// end. Offsets are snapped to UTF-8 boundaries.
    pub fn split(&self, content: &str) -> Vec<ChunkWindow> {
        if content.is_empty() {
            return Vec::new();
        }
        if content.len() <= self.chunk_size {
            return vec![ChunkWindow {
                chunk_index: 0,
                chunk_count: 1,
                start_offset: 0,
                end_offset: content.len(),
                content: content.to_string(),
            }];
        }

        let step = self.chunk_size - self.overlap;
        let mut windows = Vec::new();
        let mut start = 0usize;
        loop {
            let start_snapped = snap_to_boundary(content, start);
            let end = snap_to_boundary(content, (start_snapped + self.chunk_size).min(content.len()));
            if let Some(slice) = content.get(start_snapped..end) {
                windows.push(ChunkWindow {
                    chunk_index: windows.len(),
                    chunk_count: 0, // fixed up below
                    start_offset: start_snapped,
                    end_offset: end,
                    content: slice.to_string(),
                });
            }
            if end >= content.len() {
                break;
            }
            start = start_snapped + step;
        }

        let count = windows.len();
        for window in &mut windows {
            window.chunk_count = count;
        }
        windows
    }
}

fn snap_to_boundary(content: &str, mut offset: usize) -> usize {
    offset = offset.min(content.len());
    while offset > 0 && !content.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// Build the text embedded for a symbol or chunk, truncated to the
/// embedder's reported input budget
pub fn embedding_prompt(kind: &str, name: &str, content: &str, max_chars: usize) -> String {
    let prompt = format!("{kind} {name}: {content}");
    if prompt.len() <= max_chars {
        return prompt;
    }
    let cut = snap_to_boundary(&prompt, max_chars);
    prompt.get(..cut).unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_is_one_window() {
        let chunker = Chunker::new(800, 100);
        let windows = chunker.split("short text");
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].chunk_index, 0);
        assert_eq!(windows[0].chunk_count, 1);
        assert_eq!(windows[0].start_offset, 0);
        assert_eq!(windows[0].end_offset, 10);
    }

    #[test]
    fn empty_content_yields_nothing() {
        let chunker = Chunker::new(800, 100);
        assert!(chunker.split("").is_empty());
    }

    #[test]
    fn windows_cover_and_overlap_exactly() {
        let chunker = Chunker::new(100, 20);
        let content = "a".repeat(1000);
        let windows = chunker.split(&content);

        assert!(windows.len() > 1);
        let count = windows.len();
        for (i, window) in windows.iter().enumerate() {
            assert_eq!(window.chunk_index, i);
            assert_eq!(window.chunk_count, count);
        }
        // Exact overlap between consecutive windows (ASCII content)
        for pair in windows.windows(2) {
            let overlap = pair[0].end_offset.saturating_sub(pair[1].start_offset);
            if pair[1].chunk_index + 1 < count {
                assert_eq!(overlap, 20);
            }
        }
        // Full coverage
        assert_eq!(windows[0].start_offset, 0);
        assert_eq!(windows.last().unwrap().end_offset, content.len());
    }

    #[test]
    fn offsets_map_back_into_the_original() {
        let chunker = Chunker::new(64, 16);
        let content: String = (0..500).map(|i| ((i % 26) as u8 + b'a') as char).collect();
        for window in chunker.split(&content) {
            assert_eq!(
                &content[window.start_offset..window.end_offset],
                window.content
            );
        }
    }

    #[test]
    fn multibyte_content_never_splits_a_char() {
        let chunker = Chunker::new(10, 3);
        let content = "héllo wörld ünïcode çhars repeated ".repeat(5);
        for window in chunker.split(&content) {
            assert!(content.is_char_boundary(window.start_offset));
            assert!(content.is_char_boundary(window.end_offset));
        }
    }

    #[test]
    fn prompt_is_truncated_to_budget() {
        let long = "x".repeat(2000);
        let prompt = embedding_prompt("function", "do_work", &long, 900);
        assert_eq!(prompt.len(), 900);
        assert!(prompt.starts_with("function do_work: "));

        let short = embedding_prompt("function", "tiny", "body", 900);
        assert_eq!(short, "function tiny: body");
    }
}
