use crate::codec::{CodecId, MAX_LEVEL, compressor_for};
use crate::error::{Result, UploadError};
use crate::word::{WORD_SIZE, Word, word_count, words_to_bytes};
use std::path::Path;

/// An asset split into storage words, plus the lengths needed to undo it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedAsset {
    pub words: Vec<Word>,
    /// Source byte count before compression.
    pub original_len: u64,
    /// Byte count of the payload the words carry.
    pub stored_len: u64,
    pub codec: CodecId,
}

impl EncodedAsset {
    pub fn is_compressed(&self) -> bool {
        self.codec == CodecId::Deflate
    }
}

/// Splits `bytes` into words, optionally deflating first.
pub fn encode(bytes: &[u8], compress: bool) -> Result<EncodedAsset> {
    let codec = if compress {
        CodecId::Deflate
    } else {
        CodecId::Store
    };

    let payload = if compress {
        let mut out = Vec::with_capacity(bytes.len() / 2 + 16);
        compressor_for(codec).compress(&mut &bytes[..], &mut out, MAX_LEVEL)?;
        out
    } else {
        bytes.to_vec()
    };

    Ok(EncodedAsset {
        words: split_words(&payload),
        original_len: bytes.len() as u64,
        stored_len: payload.len() as u64,
        codec,
    })
}

pub fn encode_file(path: &Path, compress: bool) -> Result<EncodedAsset> {
    let bytes = std::fs::read(path)?;
    encode(&bytes, compress)
}

pub fn split_words(payload: &[u8]) -> Vec<Word> {
    payload.chunks(WORD_SIZE).map(Word::from_stride).collect()
}

/// Concatenates words and cuts the padding using the recorded length.
pub fn reconstitute(words: &[Word], len: u64) -> Result<Vec<u8>> {
    let need = word_count(len);
    if need != words.len() as u64 {
        return Err(UploadError::Format(format!(
            "{len} bytes need {need} words, got {}",
            words.len()
        )));
    }
    let mut out = words_to_bytes(words);
    out.truncate(len as usize);
    Ok(out)
}

/// Inverse of [`encode`]: reconstitute, then inflate if needed.
pub fn decode(words: &[Word], stored_len: u64, codec: CodecId) -> Result<Vec<u8>> {
    let payload = reconstitute(words, stored_len)?;
    match codec {
        CodecId::Store => Ok(payload),
        CodecId::Deflate => {
            let mut out = Vec::with_capacity(payload.len() * 2);
            compressor_for(codec).decompress(&mut &payload[..], &mut out)?;
            Ok(out)
        }
    }
}

pub fn encode_str(s: &str) -> Vec<Word> {
    split_words(s.as_bytes())
}

/// String words carry no length, so NUL padding is stripped.
pub fn reconstitute_str(words: &[Word]) -> Result<String> {
    let bytes: Vec<u8> = words_to_bytes(words)
        .into_iter()
        .filter(|b| *b != 0)
        .collect();
    String::from_utf8(bytes).map_err(|e| UploadError::Format(format!("string attribute: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(n: usize) -> Vec<u8> {
        (0..n).map(|i| (i * 7 + 3) as u8).collect()
    }

    #[test]
    fn hundred_bytes_make_four_words() {
        let enc = encode(&sample(100), false).unwrap();
        assert_eq!(enc.words.len(), 4);
        assert_eq!(enc.original_len, 100);
        assert_eq!(enc.stored_len, 100);
        // last word: 4 data bytes then 28 zero bytes
        assert!(enc.words[3].0[4..].iter().all(|b| *b == 0));
        assert_eq!(enc.words[3].0[..4], sample(100)[96..]);
    }

    #[test]
    fn empty_input_has_no_words() {
        let enc = encode(&[], false).unwrap();
        assert!(enc.words.is_empty());
        assert_eq!(reconstitute(&enc.words, 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn round_trip_keeps_trailing_zeros() {
        // padding must be cut by length, not by guessing
        let mut data = sample(45);
        data.extend_from_slice(&[0, 0, 0]);
        for compress in [false, true] {
            let enc = encode(&data, compress).unwrap();
            let back = decode(&enc.words, enc.stored_len, enc.codec).unwrap();
            assert_eq!(back, data);
        }
    }

    #[test]
    fn round_trip_over_odd_lengths() {
        for n in [1, 31, 32, 33, 64, 65, 1000] {
            let data = sample(n);
            let enc = encode(&data, false).unwrap();
            assert_eq!(reconstitute(&enc.words, enc.stored_len).unwrap(), data);
        }
    }

    #[test]
    fn compressed_keeps_original_length() {
        let data = b"<svg><path d=\"M0 0L10 10\"/></svg>".repeat(30);
        let enc = encode(&data, true).unwrap();
        assert!(enc.is_compressed());
        assert_eq!(enc.original_len, data.len() as u64);
        assert!(enc.stored_len < enc.original_len);
        assert_eq!(enc.words.len() as u64, word_count(enc.stored_len));
    }

    #[test]
    fn tiny_inputs_may_grow_when_compressed() {
        let enc = encode(&[0x42], true).unwrap();
        assert_eq!(enc.original_len, 1);
        assert!(enc.stored_len >= 1);
    }

    #[test]
    fn encoding_is_deterministic() {
        let data = sample(777);
        assert_eq!(encode(&data, true).unwrap(), encode(&data, true).unwrap());
    }

    #[test]
    fn reconstitute_rejects_bad_length() {
        let enc = encode(&sample(40), false).unwrap();
        assert!(reconstitute(&enc.words, 100).is_err());
        assert!(reconstitute(&enc.words, 10).is_err());
    }

    #[test]
    fn strings_round_trip() {
        let words = encode_str("_inflatedSize");
        assert_eq!(words.len(), 1);
        assert_eq!(reconstitute_str(&words).unwrap(), "_inflatedSize");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = encode_file(Path::new("/definitely/not/here.mp3"), false).unwrap_err();
        assert!(matches!(err, UploadError::Io(_)));
    }
}
