use super::{CodecId, Compressor, MAX_LEVEL};
use crate::error::Result;
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use std::io::{Read, Write};

/// Raw deflate (RFC 1951), no zlib or gzip framing.
pub struct RawDeflate;

impl Compressor for RawDeflate {
    fn id(&self) -> CodecId {
        CodecId::Deflate
    }

    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write, level: u32) -> Result<u64> {
        let mut enc = DeflateEncoder::new(dst, Compression::new(level.clamp(1, MAX_LEVEL)));
        let consumed = std::io::copy(src, &mut enc)?;
        enc.finish()?;
        Ok(consumed)
    }

    fn decompress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> Result<u64> {
        let mut dec = DeflateDecoder::new(src);
        Ok(std::io::copy(&mut dec, dst)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inflates_what_it_deflates() {
        let input = b"never gonna give you up, never gonna let you down ".repeat(40);
        let mut packed = Vec::new();
        let n = RawDeflate
            .compress(&mut &input[..], &mut packed, MAX_LEVEL)
            .unwrap();
        assert_eq!(n, input.len() as u64);
        assert!(packed.len() < input.len());

        let mut out = Vec::new();
        RawDeflate.decompress(&mut &packed[..], &mut out).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn output_is_headerless() {
        // zlib framing would start with 0x78
        let mut packed = Vec::new();
        RawDeflate
            .compress(&mut &b"abc"[..], &mut packed, MAX_LEVEL)
            .unwrap();
        assert_ne!(packed[0], 0x78);
    }
}
