use crate::error::{Result, UploadError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const WORD_SIZE: usize = 32;

/// One 256-bit storage slot, big-endian.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Word(pub [u8; WORD_SIZE]);

impl Word {
    pub const ZERO: Word = Word([0u8; WORD_SIZE]);

    /// Copies up to 32 bytes into a word, right-padding with zeros.
    pub fn from_stride(stride: &[u8]) -> Self {
        let mut out = [0u8; WORD_SIZE];
        let n = stride.len().min(WORD_SIZE);
        out[..n].copy_from_slice(&stride[..n]);
        Word(out)
    }

    /// Left-padded unsigned integer, the layout of a `uint256` argument.
    pub fn from_u128(v: u128) -> Self {
        let mut out = [0u8; WORD_SIZE];
        out[16..].copy_from_slice(&v.to_be_bytes());
        Word(out)
    }

    /// Two's complement, sign-extended to 256 bits.
    pub fn from_i128(v: i128) -> Self {
        let fill = if v < 0 { 0xff } else { 0x00 };
        let mut out = [fill; WORD_SIZE];
        out[16..].copy_from_slice(&v.to_be_bytes());
        Word(out)
    }

    pub fn from_bool(v: bool) -> Self {
        Self::from_u128(v as u128)
    }

    /// `None` when the value does not fit in 128 bits.
    pub fn to_u128(&self) -> Option<u128> {
        if self.0[..16].iter().any(|b| *b != 0) {
            return None;
        }
        let mut lo = [0u8; 16];
        lo.copy_from_slice(&self.0[16..]);
        Some(u128::from_be_bytes(lo))
    }

    pub fn as_bytes(&self) -> &[u8; WORD_SIZE] {
        &self.0
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word({self})")
    }
}

impl FromStr for Word {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self> {
        let t = s.trim();
        let digits = t
            .strip_prefix("0x")
            .or_else(|| t.strip_prefix("0X"))
            .unwrap_or(t);
        if digits.len() != WORD_SIZE * 2 {
            return Err(UploadError::Format(format!(
                "word must be {} hex digits, got {}",
                WORD_SIZE * 2,
                digits.len()
            )));
        }
        let mut out = [0u8; WORD_SIZE];
        hex::decode_to_slice(digits, &mut out)
            .map_err(|e| UploadError::Format(format!("invalid hex: {e}")))?;
        Ok(Word(out))
    }
}

impl Serialize for Word {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Word {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Flattens words back into their raw bytes, padding included.
pub fn words_to_bytes(words: &[Word]) -> Vec<u8> {
    let mut out = Vec::with_capacity(words.len() * WORD_SIZE);
    for w in words {
        out.extend_from_slice(&w.0);
    }
    out
}

/// Number of words needed to hold `len` bytes.
pub fn word_count(len: u64) -> u64 {
    len.div_ceil(WORD_SIZE as u64)
}
