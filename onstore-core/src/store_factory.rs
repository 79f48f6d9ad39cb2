use std::path::PathBuf;

use crate::error::{Result, UploadError};
use crate::store::{AssetStore, FsStore, MemStore};

pub enum Backend {
    Mem,
    Fs,
}

#[derive(Clone, Debug, Default)]
pub struct StoreParams {
    /// Required by the Fs backend.
    pub root: Option<PathBuf>,
    pub max_batch_words: Option<usize>,
}

pub fn open_store(backend: Backend, p: StoreParams) -> Result<Box<dyn AssetStore>> {
    match backend {
        Backend::Mem => Ok(Box::new(match p.max_batch_words {
            Some(max) => MemStore::with_batch_limit(max),
            None => MemStore::new(),
        })),
        Backend::Fs => {
            let root = p
                .root
                .ok_or_else(|| UploadError::Config("fs store needs a root directory".into()))?;
            Ok(Box::new(
                FsStore::open(&root)?.with_batch_limit(p.max_batch_words),
            ))
        }
    }
}
