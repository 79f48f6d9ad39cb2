use crate::error::Result;
use std::io::{Read, Write};

/// Highest deflate level; what the on-chain inflater was tested against.
pub const MAX_LEVEL: u32 = 9;

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CodecId {
    Store = 0,
    Deflate = 1,
}

pub trait Compressor: Send + Sync {
    fn id(&self) -> CodecId;
    /// Returns the number of uncompressed bytes consumed from `src`.
    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write, level: u32) -> Result<u64>;
    /// Returns the number of uncompressed bytes written to `dst`.
    fn decompress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> Result<u64>;
}

pub fn compressor_for(id: CodecId) -> &'static dyn Compressor {
    match id {
        CodecId::Store => &store::Identity,
        CodecId::Deflate => &deflate::RawDeflate,
    }
}

pub mod deflate;
pub mod store;
