use std::thread::sleep;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::chunker::{Batch, chunk};
use crate::codec::CodecId;
use crate::config::UploadConfig;
use crate::domain::AssetReport;
use crate::encode::{EncodedAsset, decode};
use crate::error::{Result, UploadError};
use crate::source::PreparedAsset;
use crate::store::{AssetStore, AttrType, AttrValue, StoreFault, StoreResult, TxReceipt};

/// Attribute recording the pre-compression size of a deflated asset.
pub const INFLATED_SIZE_KEY: &str = "_inflatedSize";

/// Drives encoded assets into a store, one confirmed batch at a time.
pub struct Uploader<'s> {
    store: &'s dyn AssetStore,
    cfg: UploadConfig,
}

impl<'s> Uploader<'s> {
    pub fn new(store: &'s dyn AssetStore, cfg: UploadConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self { store, cfg })
    }

    pub fn config(&self) -> &UploadConfig {
        &self.cfg
    }

    /// Retries a read until it answers or the attempt budget runs out.
    fn read<T>(&self, asset_id: u64, op: &'static str, f: impl Fn() -> StoreResult<T>) -> Result<T> {
        let mut attempt = 1;
        loop {
            match f() {
                Ok(v) => return Ok(v),
                Err(fault) if attempt >= self.cfg.max_retries => {
                    return Err(fault.into_upload_error(asset_id, op, attempt));
                }
                Err(fault) => {
                    warn!(asset_id, op, attempt, %fault, "store read failed, retrying");
                    sleep(self.cfg.backoff_for(attempt));
                    attempt += 1;
                }
            }
        }
    }

    /// Submits a write, resubmitting only while `landed` says the store
    /// has not already applied it. `Ok(None)` means it landed but the
    /// acknowledgement was lost.
    fn write(
        &self,
        asset_id: u64,
        op: &'static str,
        send: impl Fn() -> StoreResult<TxReceipt>,
        landed: impl Fn() -> Result<bool>,
    ) -> Result<Option<TxReceipt>> {
        let mut attempt = 1;
        loop {
            match send() {
                Ok(r) => return Ok(Some(r)),
                Err(fault) if attempt >= self.cfg.max_retries => {
                    return Err(fault.into_upload_error(asset_id, op, attempt));
                }
                Err(fault) => {
                    warn!(asset_id, op, attempt, %fault, "write failed");
                    sleep(self.cfg.backoff_for(attempt));
                    if landed()? {
                        info!(asset_id, op, "write landed despite the failure, not resending");
                        return Ok(None);
                    }
                    attempt += 1;
                }
            }
        }
    }

    fn cursor(&self, asset_id: u64) -> Result<u64> {
        self.read(asset_id, "progress", || self.store.progress(asset_id))
    }

    /// Fails unless the cursor sits on a batch boundary of the local plan.
    fn check_cursor(&self, asset_id: u64, batches: &[Batch<'_>], cursor: u64, total: u64) -> Result<()> {
        if cursor > total {
            return Err(UploadError::SizeMismatch {
                asset_id,
                detail: format!("store cursor {cursor} is past the {total} local words"),
            });
        }
        let on_boundary = cursor == 0 || batches.iter().any(|b| b.end_word() == cursor);
        if !on_boundary {
            return Err(UploadError::SizeMismatch {
                asset_id,
                detail: format!("store cursor {cursor} falls inside a local batch"),
            });
        }
        Ok(())
    }

    fn log_batch(&self, asset_id: u64, batch: &Batch<'_>, asset: &EncodedAsset, receipt: Option<TxReceipt>) {
        let (start, end) = batch.byte_range(asset.stored_len);
        let tx = receipt.map_or_else(|| "unknown".to_string(), |r| r.to_string());
        info!(
            asset_id,
            batch = batch.index,
            bytes = %format!("{start}..{end}"),
            words = %format!("{}..{}", batch.first_word, batch.end_word()),
            total_words = asset.words.len(),
            tx = %tx,
            "batch confirmed"
        );
    }

    pub fn upload_asset(&self, asset_id: u64, label: &str, asset: &EncodedAsset) -> Result<AssetReport> {
        let store = self.store;
        let batches = chunk(&asset.words, self.cfg.batch_words)?;
        let total = asset.words.len() as u64;
        let mut report = AssetReport {
            asset_id,
            label: label.to_string(),
            words: total,
            ..Default::default()
        };

        let declared = self.read(asset_id, "asset_length", || store.asset_length(asset_id))?;
        let mut cursor = self.cursor(asset_id)?;
        if let Some(len) = declared
            && len != asset.stored_len
        {
            return Err(UploadError::SizeMismatch {
                asset_id,
                detail: format!(
                    "store declares {len} bytes, local source encodes to {}",
                    asset.stored_len
                ),
            });
        }
        self.check_cursor(asset_id, &batches, cursor, total)?;

        let mut next = 0;
        if declared.is_none() {
            if cursor != 0 {
                return Err(UploadError::SizeMismatch {
                    asset_id,
                    detail: format!("store reports cursor {cursor} for an asset it never created"),
                });
            }
            info!(asset_id, label, bytes = asset.stored_len, words = total, "creating asset");
            let first: &[crate::word::Word] = batches.first().map(|b| b.words).unwrap_or(&[]);
            let want = first.len() as u64;
            let receipt = self.write(
                asset_id,
                "createAsset",
                || store.create_asset(asset_id, first, asset.stored_len),
                || {
                    let exists = self.read(asset_id, "asset_length", || store.asset_length(asset_id))?;
                    Ok(exists.is_some() && self.cursor(asset_id)? >= want)
                },
            )?;
            match batches.first() {
                Some(b) => self.log_batch(asset_id, b, asset, receipt),
                None => info!(asset_id, tx = ?receipt.map(|r| r.to_string()), "empty asset created"),
            }
            report.receipts.push(receipt);
            report.batches_sent += 1;
            cursor = want;
            next = 1;
        } else {
            info!(asset_id, label, cursor, words = total, "resuming asset");
        }

        for batch in batches.iter().skip(next) {
            if batch.end_word() <= cursor {
                debug!(asset_id, batch = batch.index, "already stored, skipping");
                report.batches_skipped += 1;
                continue;
            }
            let end = batch.end_word();
            let receipt = self.write(
                asset_id,
                "appendAssetContent",
                || store.append_asset_content(asset_id, batch.words),
                || {
                    let now = self.cursor(asset_id)?;
                    self.check_cursor(asset_id, &batches, now, total)?;
                    Ok(now >= end)
                },
            )?;
            self.log_batch(asset_id, batch, asset, receipt);
            report.receipts.push(receipt);
            report.batches_sent += 1;
            cursor = end;
        }

        if asset.codec == CodecId::Deflate {
            let value = AttrValue::Uint(asset.original_len as u128);
            let words = value.to_words();
            let attribute_stored = || -> Result<bool> {
                let got = self.read(asset_id, "asset_attribute", || {
                    store.asset_attribute(asset_id, INFLATED_SIZE_KEY)
                })?;
                Ok(got.is_some_and(|(_, w)| w == words))
            };
            if attribute_stored()? {
                debug!(asset_id, key = INFLATED_SIZE_KEY, "attribute already stored, skipping");
            } else {
                let receipt = self.write(
                    asset_id,
                    "setAssetAttribute",
                    || store.set_asset_attribute(asset_id, INFLATED_SIZE_KEY, AttrType::Uint, &words),
                    &attribute_stored,
                )?;
                info!(
                    asset_id,
                    key = INFLATED_SIZE_KEY,
                    value = asset.original_len,
                    tx = ?receipt.map(|r| r.to_string()),
                    "attribute set"
                );
                report.receipts.push(receipt);
            }
            report.inflated_size = Some(asset.original_len);
        }

        info!(
            asset_id,
            sent = report.batches_sent,
            skipped = report.batches_skipped,
            "asset complete"
        );
        Ok(report)
    }

    /// Uploads assets under consecutive ids starting at `first_asset_id`.
    /// Sequential mode stops at the first failure; parallel mode attempts
    /// every asset and returns the first failure in id order.
    pub fn upload_all(&self, assets: &[PreparedAsset]) -> Result<Vec<AssetReport>> {
        let first = self.cfg.first_asset_id;
        check_id_range(first, assets.len())?;
        if self.cfg.parallelism <= 1 {
            let mut reports = Vec::with_capacity(assets.len());
            for (i, a) in assets.iter().enumerate() {
                reports.push(self.upload_asset(first + i as u64, &a.label, &a.encoded)?);
            }
            return Ok(reports);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.cfg.parallelism)
            .build()
            .map_err(|e| UploadError::Config(format!("thread pool: {e}")))?;
        let results: Vec<Result<AssetReport>> = pool.install(|| {
            assets
                .par_iter()
                .enumerate()
                .map(|(i, a)| self.upload_asset(first + i as u64, &a.label, &a.encoded))
                .collect()
        });
        results.into_iter().collect()
    }
}

/// Fails when `count` consecutive ids from `first` would run past `u64::MAX`.
pub fn check_id_range(first: u64, count: usize) -> Result<()> {
    if count > 0 && first.checked_add(count as u64 - 1).is_none() {
        return Err(UploadError::Config(format!(
            "{count} assets starting at id {first} overflow the id space"
        )));
    }
    Ok(())
}

/// Reads an asset back out of the store, inflating it when it carries an
/// `_inflatedSize` attribute.
pub fn fetch_asset(store: &dyn AssetStore, asset_id: u64) -> Result<Vec<u8>> {
    let to_err = |op: &'static str, fault: StoreFault| fault.into_upload_error(asset_id, op, 1);
    let len = store
        .asset_length(asset_id)
        .map_err(|f| to_err("asset_length", f))?
        .ok_or_else(|| UploadError::Format(format!("asset {asset_id} does not exist")))?;
    let words = store
        .read_asset_words(asset_id)
        .map_err(|f| to_err("read_asset_words", f))?;
    let inflated = store
        .asset_attribute(asset_id, INFLATED_SIZE_KEY)
        .map_err(|f| to_err("asset_attribute", f))?;

    let Some((ty, value)) = inflated else {
        return decode(&words, len, CodecId::Store);
    };
    let AttrValue::Uint(size) = AttrValue::from_words(ty, &value)? else {
        return Err(UploadError::Format(format!("{INFLATED_SIZE_KEY} is not a uint")));
    };
    let out = decode(&words, len, CodecId::Deflate)?;
    if out.len() as u128 != size {
        return Err(UploadError::SizeMismatch {
            asset_id,
            detail: format!("inflated {} bytes, attribute says {size}", out.len()),
        });
    }
    Ok(out)
}
