use crate::encode::{encode_str, reconstitute_str};
use crate::error::{Result, UploadError};
use crate::word::Word;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

pub mod fs;
pub mod mem;

/// Why a remote write or read did not go through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreFault {
    /// The store evaluated the write and refused it.
    Rejected(String),
    /// The write may or may not have landed.
    Network(String),
}

impl fmt::Display for StoreFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreFault::Rejected(r) => write!(f, "rejected: {r}"),
            StoreFault::Network(r) => write!(f, "network: {r}"),
        }
    }
}

impl StoreFault {
    pub fn into_upload_error(self, asset_id: u64, op: &'static str, attempts: usize) -> UploadError {
        match self {
            StoreFault::Rejected(reason) => UploadError::StoreRejected {
                asset_id,
                op,
                reason,
                attempts,
            },
            StoreFault::Network(reason) => UploadError::Network {
                asset_id,
                op,
                reason,
                attempts,
            },
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreFault>;

/// Identifier of a confirmed write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_id: Word,
}

impl fmt::Display for TxReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.tx_id.fmt(f)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttrType {
    String,
    Bool,
    Uint,
    Int,
    Timestamp,
}

impl FromStr for AttrType {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "STRING" => Ok(AttrType::String),
            "BOOL" => Ok(AttrType::Bool),
            "UINT" => Ok(AttrType::Uint),
            "INT" => Ok(AttrType::Int),
            "TIMESTAMP" => Ok(AttrType::Timestamp),
            other => Err(UploadError::Format(format!("unknown attribute type {other:?}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttrValue {
    String(String),
    Bool(bool),
    Uint(u128),
    Int(i128),
    Timestamp(OffsetDateTime),
}

impl AttrValue {
    pub fn attr_type(&self) -> AttrType {
        match self {
            AttrValue::String(_) => AttrType::String,
            AttrValue::Bool(_) => AttrType::Bool,
            AttrValue::Uint(_) => AttrType::Uint,
            AttrValue::Int(_) => AttrType::Int,
            AttrValue::Timestamp(_) => AttrType::Timestamp,
        }
    }

    pub fn to_words(&self) -> Vec<Word> {
        match self {
            AttrValue::String(s) => encode_str(s),
            AttrValue::Bool(b) => vec![Word::from_bool(*b)],
            AttrValue::Uint(v) => vec![Word::from_u128(*v)],
            AttrValue::Int(v) => vec![Word::from_i128(*v)],
            AttrValue::Timestamp(t) => vec![Word::from_i128(t.unix_timestamp() as i128)],
        }
    }

    /// Parses CLI text; timestamps are unix seconds.
    pub fn parse(ty: AttrType, text: &str) -> Result<Self> {
        let bad = |e: &dyn fmt::Display| UploadError::Format(format!("{ty:?} value {text:?}: {e}"));
        match ty {
            AttrType::String => Ok(AttrValue::String(text.to_string())),
            AttrType::Bool => text.parse().map(AttrValue::Bool).map_err(|e| bad(&e)),
            AttrType::Uint => text.parse().map(AttrValue::Uint).map_err(|e| bad(&e)),
            AttrType::Int => text.parse().map(AttrValue::Int).map_err(|e| bad(&e)),
            AttrType::Timestamp => {
                let secs: i64 = text.parse().map_err(|e| bad(&e))?;
                OffsetDateTime::from_unix_timestamp(secs)
                    .map(AttrValue::Timestamp)
                    .map_err(|e| bad(&e))
            }
        }
    }

    pub fn from_words(ty: AttrType, words: &[Word]) -> Result<Self> {
        let single = || {
            words.first().copied().filter(|_| words.len() == 1).ok_or_else(|| {
                UploadError::Format(format!("{ty:?} attribute needs one word, got {}", words.len()))
            })
        };
        match ty {
            AttrType::String => reconstitute_str(words).map(AttrValue::String),
            AttrType::Bool => Ok(AttrValue::Bool(single()? != Word::ZERO)),
            AttrType::Uint => single()?
                .to_u128()
                .map(AttrValue::Uint)
                .ok_or_else(|| UploadError::Format("uint attribute exceeds 128 bits".into())),
            AttrType::Int => Ok(AttrValue::Int(signed_low(single()?))),
            AttrType::Timestamp => {
                let secs = i64::try_from(signed_low(single()?))
                    .map_err(|_| UploadError::Format("timestamp out of range".into()))?;
                OffsetDateTime::from_unix_timestamp(secs)
                    .map(AttrValue::Timestamp)
                    .map_err(|e| UploadError::Format(format!("timestamp: {e}")))
            }
        }
    }
}

/// Low 128 bits of a sign-extended word.
fn signed_low(w: Word) -> i128 {
    let mut lo = [0u8; 16];
    lo.copy_from_slice(&w.0[16..]);
    i128::from_be_bytes(lo)
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::String(s) => write!(f, "{s}"),
            AttrValue::Bool(b) => write!(f, "{b}"),
            AttrValue::Uint(v) => write!(f, "{v}"),
            AttrValue::Int(v) => write!(f, "{v}"),
            AttrValue::Timestamp(t) => write!(f, "{}", t.unix_timestamp()),
        }
    }
}

/// The remote word store. Appends are positional: the store trusts that
/// batches for one asset arrive in order.
pub trait AssetStore: Send + Sync {
    fn create_asset(&self, asset_id: u64, first_batch: &[Word], total_len: u64)
    -> StoreResult<TxReceipt>;

    fn append_asset_content(&self, asset_id: u64, batch: &[Word]) -> StoreResult<TxReceipt>;

    /// Words durably committed; 0 for an unknown asset.
    fn progress(&self, asset_id: u64) -> StoreResult<u64>;

    /// Byte length declared at creation, `None` if the asset does not exist.
    fn asset_length(&self, asset_id: u64) -> StoreResult<Option<u64>>;

    fn set_asset_attribute(
        &self,
        asset_id: u64,
        key: &str,
        ty: AttrType,
        value: &[Word],
    ) -> StoreResult<TxReceipt>;

    fn asset_attribute(&self, asset_id: u64, key: &str)
    -> StoreResult<Option<(AttrType, Vec<Word>)>>;

    fn read_asset_words(&self, asset_id: u64) -> StoreResult<Vec<Word>>;
}

/// Server-side record of one asset, shared by the reference stores.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AssetRecord {
    pub total_len: u64,
    pub cursor: u64,
    pub attributes: BTreeMap<String, (AttrType, Vec<Word>)>,
    /// Confirmed writes so far; feeds receipt ids.
    pub writes: u64,
}

impl AssetRecord {
    pub fn capacity_words(&self) -> u64 {
        crate::word::word_count(self.total_len)
    }

    /// Checks an append of `n` words against the declared length.
    pub fn check_append(&self, asset_id: u64, n: usize) -> StoreResult<()> {
        let end = self.cursor + n as u64;
        if end > self.capacity_words() {
            return Err(StoreFault::Rejected(format!(
                "asset {asset_id}: append to word {end} overflows declared {} words",
                self.capacity_words()
            )));
        }
        Ok(())
    }
}

pub fn check_batch_limit(limit: Option<usize>, n: usize) -> StoreResult<()> {
    match limit {
        Some(max) if n > max => Err(StoreFault::Rejected(format!(
            "batch of {n} words exceeds the {max}-word write limit"
        ))),
        _ => Ok(()),
    }
}

/// Deterministic receipt id for a write.
pub fn receipt_for(op: &str, asset_id: u64, seq: u64, words: &[Word]) -> TxReceipt {
    let mut hasher = blake3::Hasher::new();
    hasher.update(op.as_bytes());
    hasher.update(&asset_id.to_le_bytes());
    hasher.update(&seq.to_le_bytes());
    for w in words {
        hasher.update(w.as_bytes());
    }
    TxReceipt {
        tx_id: Word(*hasher.finalize().as_bytes()),
    }
}

pub use fs::FsStore;
pub use mem::MemStore;
