//! Naive fixed-size character chunking with overlap.
//!
//! Windows are measured in characters (Unicode scalar values), trimmed, and
//! dropped when only whitespace remains. Dropping a blank window means the
//! effective overlap between two emitted neighbours can differ from the
//! configured one; this is accepted behaviour.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_MAX_CHARS: usize = 800;
pub const DEFAULT_OVERLAP: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_chars: DEFAULT_MAX_CHARS, overlap: DEFAULT_OVERLAP }
    }
}

impl ChunkingConfig {
    pub fn new(max_chars: usize, overlap: usize) -> Result<Self> {
        let config = Self { max_chars, overlap };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_chars == 0 || self.overlap >= self.max_chars {
            return Err(Error::InvalidChunking { max_chars: self.max_chars, overlap: self.overlap });
        }
        Ok(())
    }

    /// Distance between the starts of two consecutive windows.
    pub fn step(&self) -> usize {
        self.max_chars - self.overlap
    }
}

/// Lazy iterator over the chunks of one text.
///
/// Holds no state beyond the current offset, so calling [`chunks`] again on
/// the same input replays the identical sequence.
pub struct Chunks<'a> {
    text: &'a str,
    // Byte offset of every char boundary, plus `text.len()` at the end.
    boundaries: Vec<usize>,
    start: usize,
    config: ChunkingConfig,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let char_len = self.boundaries.len() - 1;
        while self.start < char_len {
            let end = self.start.saturating_add(self.config.max_chars).min(char_len);
            let window = &self.text[self.boundaries[self.start]..self.boundaries[end]];
            self.start = self.start.saturating_add(self.config.step());
            let trimmed = window.trim();
            if !trimmed.is_empty() {
                return Some(trimmed);
            }
        }
        None
    }
}

pub fn chunks(text: &str, config: ChunkingConfig) -> Result<Chunks<'_>> {
    config.validate()?;
    let boundaries = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    Ok(Chunks { text, boundaries, start: 0, config })
}

pub fn chunk_text(text: &str, max_chars: usize, overlap: usize) -> Result<Vec<String>> {
    let config = ChunkingConfig::new(max_chars, overlap)?;
    Ok(chunks(text, config)?.map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_nothing() {
        assert!(chunk_text("", 800, 200).unwrap().is_empty());
    }

    #[test]
    fn short_text_is_one_trimmed_chunk() {
        let out = chunk_text("  hello world \n", 800, 200).unwrap();
        assert_eq!(out, vec!["hello world".to_string()]);
    }

    #[test]
    fn windows_advance_by_step() {
        let text: String = ('a'..='j').collect();
        let out = chunk_text(&text, 4, 1).unwrap();
        assert_eq!(out, vec!["abcd", "defg", "ghij", "j"]);
    }

    #[test]
    fn whitespace_only_windows_are_dropped() {
        let text = format!("abc{}xyz", " ".repeat(9));
        let out = chunk_text(&text, 3, 0).unwrap();
        assert_eq!(out, vec!["abc", "xyz"]);
    }

    #[test]
    fn offsets_count_characters_not_bytes() {
        let out = chunk_text("ééééé", 2, 0).unwrap();
        assert_eq!(out, vec!["éé", "éé", "é"]);
    }

    #[test]
    fn rejects_non_advancing_step() {
        assert!(matches!(
            chunk_text("abc", 5, 5),
            Err(Error::InvalidChunking { max_chars: 5, overlap: 5 })
        ));
        assert!(matches!(chunk_text("abc", 0, 0), Err(Error::InvalidChunking { .. })));
    }

    #[test]
    fn huge_window_sizes_do_not_overflow() {
        let out = chunk_text("abcdef", usize::MAX, usize::MAX - 1).unwrap();
        assert_eq!(out, vec!["abcdef", "bcdef", "cdef", "def", "ef", "f"]);
        assert_eq!(chunk_text("abc", usize::MAX, 0).unwrap(), vec!["abc"]);
    }

    #[test]
    fn iterator_is_restartable() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(20);
        let config = ChunkingConfig::new(50, 10).unwrap();
        let first: Vec<&str> = chunks(&text, config).unwrap().collect();
        let second: Vec<&str> = chunks(&text, config).unwrap().collect();
        assert_eq!(first, second);
        assert!(first.len() > 1);
    }
}
