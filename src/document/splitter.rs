use crate::error::{RagError, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Splits text into overlapping windows counted in Unicode scalar values.
///
/// Text no longer than `chunk_size` is returned as a single, untrimmed chunk.
/// Longer text is walked with a window of `chunk_size` that steps forward by
/// `chunk_size - chunk_overlap`; every window is trimmed of surrounding
/// whitespace, so a whitespace-only window becomes an empty string but still
/// takes its place in the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        // Byte offset of every code point, plus the end of the string.
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let length = offsets.len() - 1;

        if length <= self.chunk_size {
            return vec![text.to_string()];
        }

        self.windows(length)
            .into_iter()
            .map(|(start, end)| text[offsets[start]..offsets[end]].trim().to_string())
            .collect()
    }

    /// Untrimmed `[start, end)` windows in code points for text of `length` code points.
    fn windows(&self, length: usize) -> Vec<(usize, usize)> {
        let mut windows = Vec::with_capacity(length / (self.chunk_size - self.chunk_overlap) + 1);
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(length);
            windows.push((start, end));
            if end == length {
                break;
            }
            start = end.saturating_sub(self.chunk_overlap);
        }
        windows
    }
}
