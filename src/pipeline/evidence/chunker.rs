use crate::config::ConfigError;

/// One window produced by [`WindowChunker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextWindow {
    pub text: String,
    /// Start of the window in the input, in chars.
    pub char_offset: usize,
}

/// Fixed-size sliding windows over text, measured in chars.
///
/// Each window starts `size - overlap` chars after the previous one; the last
/// window ends at the end of the input and may be shorter than `size`.
#[derive(Debug, Clone, Copy)]
pub struct WindowChunker {
    size: usize,
    overlap: usize,
}

impl WindowChunker {
    pub fn new(size: usize, overlap: usize) -> Result<Self, ConfigError> {
        if size == 0 {
            return Err(ConfigError::ZeroValue { name: "chunk_size" });
        }
        if overlap >= size {
            return Err(ConfigError::InvalidChunkWindow { size, overlap });
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        self.chunk_with_offsets(text)
            .into_iter()
            .map(|w| w.text)
            .collect()
    }

    pub fn chunk_with_offsets(&self, text: &str) -> Vec<TextWindow> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        // Byte index of every char start, plus the end, so windows slice on
        // char boundaries.
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_len = bounds.len() - 1;
        let step = self.size - self.overlap;

        let mut windows = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.size).min(char_len);
            windows.push(TextWindow {
                text: text[bounds[start]..bounds[end]].to_string(),
                char_offset: start,
            });
            if end == char_len {
                break;
            }
            start += step;
        }
        windows
    }
}

/// Split `text` into windows of `size` chars sharing `overlap` chars.
pub fn chunk(text: &str, size: usize, overlap: usize) -> Result<Vec<String>, ConfigError> {
    Ok(WindowChunker::new(size, overlap)?.chunk(text))
}
