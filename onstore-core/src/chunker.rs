use crate::error::{Result, UploadError};
use crate::word::{WORD_SIZE, Word};

/// 24 KiB of payload per write.
pub const DEFAULT_BATCH_WORDS: usize = 768;

/// A contiguous run of words sent in one write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch<'a> {
    pub index: usize,
    /// Offset of the first word within the asset.
    pub first_word: u64,
    pub words: &'a [Word],
}

impl Batch<'_> {
    pub fn end_word(&self) -> u64 {
        self.first_word + self.words.len() as u64
    }

    /// Byte range of the stored payload this batch carries, padding excluded.
    pub fn byte_range(&self, stored_len: u64) -> (u64, u64) {
        let start = (self.first_word * WORD_SIZE as u64).min(stored_len);
        let end = (self.end_word() * WORD_SIZE as u64).min(stored_len);
        (start, end)
    }
}

pub fn chunk(words: &[Word], batch_size: usize) -> Result<Vec<Batch<'_>>> {
    if batch_size == 0 {
        return Err(UploadError::Format("batch size must be positive".into()));
    }
    Ok(words
        .chunks(batch_size)
        .enumerate()
        .map(|(index, words)| Batch {
            index,
            first_word: (index * batch_size) as u64,
            words,
        })
        .collect())
}

/// Largest word count whose payload fits in `max_bytes`, never below one.
pub fn batch_words_for_budget(max_bytes: usize) -> usize {
    (max_bytes / WORD_SIZE).max(1)
}
