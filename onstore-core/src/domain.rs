use crate::chunker::chunk;
use crate::encode::EncodedAsset;
use crate::error::Result;
use crate::store::TxReceipt;

/// One line of an upload plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchRow {
    pub asset_id: u64,
    pub index: usize,
    pub first_word: u64,
    pub end_word: u64,
    pub byte_start: u64,
    pub byte_end: u64,
}

#[derive(Clone, Debug, Default)]
pub struct AssetReport {
    pub asset_id: u64,
    pub label: String,
    pub words: u64,
    pub batches_sent: usize,
    pub batches_skipped: usize,
    /// Receipts of writes confirmed in this run; `None` where the
    /// acknowledgement was lost but the cursor showed the write landed.
    pub receipts: Vec<Option<TxReceipt>>,
    pub inflated_size: Option<u64>,
}

pub fn plan_rows(asset_id: u64, asset: &EncodedAsset, batch_words: usize) -> Result<Vec<BatchRow>> {
    Ok(chunk(&asset.words, batch_words)?
        .iter()
        .map(|b| {
            let (byte_start, byte_end) = b.byte_range(asset.stored_len);
            BatchRow {
                asset_id,
                index: b.index,
                first_word: b.first_word,
                end_word: b.end_word(),
                byte_start,
                byte_end,
            }
        })
        .collect())
}
