//! Text chunking for document ingestion
//!
//! Recursive character splitting: text is split on the coarsest separator
//! that appears, oversized fragments recurse onto finer separators, and
//! adjacent fragments are merged back into chunks of at most `chunk_size`
//! characters with `chunk_overlap` characters carried between neighbors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Text cannot be empty")]
    EmptyText,
}

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Separator cascade, coarsest first; the empty separator is a
/// character-level hard cut
const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Splits document text into overlapping chunks
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap: chunk_overlap.min(chunk_size.max(1) - 1),
        }
    }

    /// Split text into chunks. Fails with `EmptyText` on blank input.
    pub fn chunk_text(&self, text: &str) -> Result<Vec<String>, IngestError> {
        if text.trim().is_empty() {
            return Err(IngestError::EmptyText);
        }

        let mut chunks = Vec::new();
        self.split_recursive(text, SEPARATORS, &mut chunks);

        if chunks.is_empty() {
            return Err(IngestError::EmptyText);
        }

        tracing::info!(
            "Text chunked into {} chunks (size: {}, overlap: {})",
            chunks.len(),
            self.chunk_size,
            self.chunk_overlap
        );

        Ok(chunks)
    }

    fn split_recursive(&self, text: &str, separators: &[&str], out: &mut Vec<String>) {
        let Some((position, separator)) = separators
            .iter()
            .enumerate()
            .find(|(_, sep)| sep.is_empty() || text.contains(**sep))
            .map(|(i, sep)| (i, *sep))
        else {
            // No separator matched anywhere; emit as-is
            if !text.trim().is_empty() {
                out.push(text.to_string());
            }
            return;
        };

        if separator.is_empty() {
            self.hard_cut(text, out);
            return;
        }

        let mut pending: Vec<&str> = Vec::new();
        for piece in text.split(separator) {
            if piece.len() <= self.chunk_size {
                pending.push(piece);
            } else {
                self.merge(&pending, separator, out);
                pending.clear();
                self.split_recursive(piece, &separators[position + 1..], out);
            }
        }
        self.merge(&pending, separator, out);
    }

    /// Merge small fragments into chunks, carrying an overlap tail forward
    fn merge(&self, pieces: &[&str], separator: &str, out: &mut Vec<String>) {
        let sep_len = separator.len();
        let mut window: Vec<&str> = Vec::new();

        for &piece in pieces {
            if !window.is_empty()
                && joined_len(&window, sep_len) + sep_len + piece.len() > self.chunk_size
            {
                let chunk = window.join(separator);
                if !chunk.trim().is_empty() {
                    out.push(chunk);
                }

                while !window.is_empty()
                    && (joined_len(&window, sep_len) > self.chunk_overlap
                        || joined_len(&window, sep_len) + sep_len + piece.len()
                            > self.chunk_size)
                {
                    window.remove(0);
                }
            }
            window.push(piece);
        }

        if !window.is_empty() {
            let chunk = window.join(separator);
            if !chunk.trim().is_empty() {
                out.push(chunk);
            }
        }
    }

    /// Character-level cut for text with no usable separator
    fn hard_cut(&self, text: &str, out: &mut Vec<String>) {
        let chars: Vec<char> = text.chars().collect();
        let step = self.chunk_size.saturating_sub(self.chunk_overlap).max(1);

        let mut start = 0;
        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            let chunk: String = chars[start..end].iter().collect();
            if !chunk.trim().is_empty() {
                out.push(chunk);
            }
            if end == chars.len() {
                break;
            }
            start += step;
        }
    }
}

fn joined_len(window: &[&str], sep_len: usize) -> usize {
    if window.is_empty() {
        return 0;
    }
    window.iter().map(|piece| piece.len()).sum::<usize>() + sep_len * (window.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_rejected() {
        let chunker = Chunker::default();
        assert!(matches!(
            chunker.chunk_text("   \n  "),
            Err(IngestError::EmptyText)
        ));
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = Chunker::default();
        let chunks = chunker.chunk_text("a short document").unwrap();
        assert_eq!(chunks, vec!["a short document".to_string()]);
    }

    #[test]
    fn test_paragraphs_preferred() {
        let chunker = Chunker::new(40, 0);
        let text = "first paragraph here\n\nsecond paragraph here\n\nthird one";
        let chunks = chunker.chunk_text(text).unwrap();

        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.len() <= 40);
        }
    }

    #[test]
    fn test_chunks_respect_size_limit() {
        let chunker = Chunker::new(50, 10);
        let text = "word ".repeat(100);
        let chunks = chunker.chunk_text(&text).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 50, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn test_overlap_carries_text() {
        let chunker = Chunker::new(30, 12);
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let chunks = chunker.chunk_text(text).unwrap();

        assert!(chunks.len() > 1);
        // Consecutive chunks share at least one word
        for pair in chunks.windows(2) {
            let tail_word = pair[0].split_whitespace().last().unwrap();
            assert!(
                pair[1].contains(tail_word) || pair[0].len() <= 30,
                "no overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_unbroken_text_hard_cut() {
        let chunker = Chunker::new(10, 2);
        let text = "abcdefghijklmnopqrstuvwxyz";
        let chunks = chunker.chunk_text(text).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 10);
        }
        // Every character of the input appears somewhere
        assert!(chunks.concat().contains("z"));
    }

    #[test]
    fn test_overlap_clamped_below_size() {
        let chunker = Chunker::new(10, 50);
        let chunks = chunker.chunk_text("abcdefghijklmnop").unwrap();
        assert!(!chunks.is_empty());
    }
}
