#![forbid(unsafe_code)]

pub mod error;
pub mod config;
pub mod word;

pub mod codec;
pub mod encode;
pub mod chunker;
pub mod minify;
pub mod source;

pub mod domain;
pub mod store;
pub mod store_factory;
pub mod upload;

// Re-exports: stable API surface
pub use chunker::{Batch, DEFAULT_BATCH_WORDS, chunk};
pub use config::UploadConfig;
pub use encode::{EncodedAsset, decode, encode, reconstitute};
pub use store::{AssetStore, FsStore, MemStore};
pub use upload::{INFLATED_SIZE_KEY, Uploader, check_id_range, fetch_asset};
pub use word::Word;
