//! Overlapping text chunking for the knowledge index.
//!
//! Chunks target a fixed size in characters and overlap their predecessor,
//! so context that straddles a cut survives in at least one chunk. Cuts
//! prefer a paragraph break, then a sentence end, then a line break, then
//! whitespace, searched in the second half of the window.

/// Chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            overlap: 100,
        }
    }
}

impl From<&crate::config::KnowledgeConfig> for ChunkConfig {
    fn from(config: &crate::config::KnowledgeConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
        }
    }
}

/// Position just past the best break in `chars[lo..hi]`, if any.
fn find_break(chars: &[char], lo: usize, hi: usize) -> Option<usize> {
    let lo = lo.max(1);
    if lo >= hi {
        return None;
    }

    let paragraph = (lo..hi).rev().find(|&i| chars[i] == '\n' && chars[i - 1] == '\n');
    if let Some(i) = paragraph {
        return Some(i + 1);
    }

    let sentence = (lo..hi).rev().find(|&i| {
        matches!(chars[i - 1], '.' | '!' | '?') && chars[i].is_whitespace()
    });
    if let Some(i) = sentence {
        return Some(i);
    }

    (lo..hi)
        .rev()
        .find(|&i| chars[i] == '\n')
        .or_else(|| (lo..hi).rev().find(|&i| chars[i].is_whitespace()))
        .map(|i| i + 1)
}

/// Split `text` into overlapping chunks. Empty chunks are dropped.
pub fn chunk_text(text: &str, config: ChunkConfig) -> Vec<String> {
    let size = config.chunk_size.max(1);
    let overlap = config.overlap.min(size / 2);
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < len {
        let hard_end = (start + size).min(len);
        let end = if hard_end == len {
            len
        } else {
            find_break(&chars, start + size / 2, hard_end)
                .filter(|&cut| cut > start)
                .unwrap_or(hard_end)
        };

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end >= len {
            break;
        }

        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }

    chunks
}
