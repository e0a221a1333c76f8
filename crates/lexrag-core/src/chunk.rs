//! Fixed-window text chunker.
//!
//! Splits extracted document text into overlapping windows of `size`
//! characters. Each window starts `size - overlap` characters after the
//! previous one, so consecutive chunks share exactly `overlap` characters.
//!
//! # Algorithm
//!
//! 1. Validate `size > 0` and `overlap < size`.
//! 2. Index the character boundaries of the text (windows never split a
//!    UTF-8 sequence).
//! 3. Emit `[start, min(start + size, len))`, advance `start` by
//!    `size - overlap`, and stop once a window reaches the end of the text.
//!
//! Empty text yields no chunks. The final window may be shorter than `size`;
//! every other window is exactly `size` characters long.
//!
//! # Example
//!
//! ```rust
//! use lexrag_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("abcdefghij", 4, 1).unwrap();
//! assert_eq!(chunks, vec!["abcd", "defg", "ghij"]);
//! ```

use crate::error::{Error, Result};
use crate::models::PendingChunk;

/// Split `text` into overlapping windows of `size` characters.
///
/// Deterministic: the same input always yields the same sequence.
///
/// # Errors
///
/// [`Error::InvalidParameter`] when `size == 0` or `overlap >= size`.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Result<Vec<String>> {
    Ok(chunk_spans(text, size, overlap)?
        .into_iter()
        .map(|c| c.text)
        .collect())
}

/// Like [`chunk_text`], but keeps the character range each window covers.
pub fn chunk_spans(text: &str, size: usize, overlap: usize) -> Result<Vec<PendingChunk>> {
    validate(size, overlap)?;

    // Byte offset of every char plus the end of the string.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = boundaries.len() - 1;
    let step = size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < char_len {
        let end = (start + size).min(char_len);
        chunks.push(PendingChunk {
            text: text[boundaries[start]..boundaries[end]].to_string(),
            source_offset: start..end,
        });
        if end == char_len {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

fn validate(size: usize, overlap: usize) -> Result<()> {
    if size == 0 {
        return Err(Error::InvalidParameter(
            "chunk size must be greater than 0".to_string(),
        ));
    }
    if overlap >= size {
        return Err(Error::InvalidParameter(format!(
            "chunk overlap ({}) must be smaller than chunk size ({})",
            overlap, size
        )));
    }
    Ok(())
}
