use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{
    AssetRecord, AssetStore, AttrType, StoreFault, StoreResult, TxReceipt, check_batch_limit,
    receipt_for,
};
use crate::word::Word;

#[derive(Default)]
struct Inner {
    assets: HashMap<u64, (AssetRecord, Vec<Word>)>,
}

/// In-process store with the same write rules as the contract.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
    max_batch_words: Option<usize>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects writes carrying more than `max` words.
    pub fn with_batch_limit(max: usize) -> Self {
        Self {
            inner: Mutex::default(),
            max_batch_words: Some(max),
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreFault::Rejected("store lock poisoned".into()))
    }
}

impl AssetStore for MemStore {
    fn create_asset(
        &self,
        asset_id: u64,
        first_batch: &[Word],
        total_len: u64,
    ) -> StoreResult<TxReceipt> {
        check_batch_limit(self.max_batch_words, first_batch.len())?;
        let mut g = self.lock()?;
        if g.assets.contains_key(&asset_id) {
            return Err(StoreFault::Rejected(format!("asset {asset_id} already exists")));
        }
        let mut rec = AssetRecord {
            total_len,
            ..Default::default()
        };
        rec.check_append(asset_id, first_batch.len())?;
        rec.cursor = first_batch.len() as u64;
        rec.writes = 1;
        let receipt = receipt_for("create", asset_id, rec.writes, first_batch);
        g.assets.insert(asset_id, (rec, first_batch.to_vec()));
        Ok(receipt)
    }

    fn append_asset_content(&self, asset_id: u64, batch: &[Word]) -> StoreResult<TxReceipt> {
        check_batch_limit(self.max_batch_words, batch.len())?;
        let mut g = self.lock()?;
        let (rec, words) = g
            .assets
            .get_mut(&asset_id)
            .ok_or_else(|| StoreFault::Rejected(format!("asset {asset_id} does not exist")))?;
        rec.check_append(asset_id, batch.len())?;
        words.extend_from_slice(batch);
        rec.cursor = words.len() as u64;
        rec.writes += 1;
        Ok(receipt_for("append", asset_id, rec.writes, batch))
    }

    fn progress(&self, asset_id: u64) -> StoreResult<u64> {
        let g = self.lock()?;
        Ok(g.assets.get(&asset_id).map(|(r, _)| r.cursor).unwrap_or(0))
    }

    fn asset_length(&self, asset_id: u64) -> StoreResult<Option<u64>> {
        let g = self.lock()?;
        Ok(g.assets.get(&asset_id).map(|(r, _)| r.total_len))
    }

    fn set_asset_attribute(
        &self,
        asset_id: u64,
        key: &str,
        ty: AttrType,
        value: &[Word],
    ) -> StoreResult<TxReceipt> {
        let mut g = self.lock()?;
        let (rec, _) = g
            .assets
            .get_mut(&asset_id)
            .ok_or_else(|| StoreFault::Rejected(format!("asset {asset_id} does not exist")))?;
        rec.attributes
            .insert(key.to_string(), (ty, value.to_vec()));
        rec.writes += 1;
        Ok(receipt_for(key, asset_id, rec.writes, value))
    }

    fn asset_attribute(
        &self,
        asset_id: u64,
        key: &str,
    ) -> StoreResult<Option<(AttrType, Vec<Word>)>> {
        let g = self.lock()?;
        Ok(g
            .assets
            .get(&asset_id)
            .and_then(|(r, _)| r.attributes.get(key).cloned()))
    }

    fn read_asset_words(&self, asset_id: u64) -> StoreResult<Vec<Word>> {
        let g = self.lock()?;
        Ok(g.assets
            .get(&asset_id)
            .map(|(_, w)| w.clone())
            .unwrap_or_default())
    }
}
