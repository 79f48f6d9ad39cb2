use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use onstore_core::error::UploadError;
use onstore_core::store::{AttrType, StoreFault, StoreResult, TxReceipt};
use onstore_core::{
    AssetStore, FsStore, INFLATED_SIZE_KEY, MemStore, UploadConfig, Uploader, Word, chunk, encode,
    fetch_asset,
};
use tempfile::TempDir;

fn cfg(batch_words: usize) -> UploadConfig {
    UploadConfig {
        batch_words,
        max_retries: 1,
        backoff_ms: 0,
        ..Default::default()
    }
}

/// Pseudo-random bytes, so deflate cannot shrink them much.
fn payload(n: usize, seed: u8) -> Vec<u8> {
    let mut x = 0x2545_f491u32 ^ seed as u32;
    (0..n)
        .map(|_| {
            x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (x >> 16) as u8
        })
        .collect()
}

/// Stands in for the contract: it knows what each asset must contain and
/// refuses appends that do not continue it.
struct StrictStore {
    inner: MemStore,
    expected: HashMap<u64, Vec<Word>>,
}

impl AssetStore for StrictStore {
    fn create_asset(&self, id: u64, first: &[Word], len: u64) -> StoreResult<TxReceipt> {
        self.inner.create_asset(id, first, len)
    }

    fn append_asset_content(&self, id: u64, batch: &[Word]) -> StoreResult<TxReceipt> {
        let at = self.inner.progress(id)? as usize;
        let want = self
            .expected
            .get(&id)
            .and_then(|w| w.get(at..at + batch.len()));
        if want != Some(batch) {
            return Err(StoreFault::Rejected(format!(
                "asset {id}: batch does not continue at word {at}"
            )));
        }
        self.inner.append_asset_content(id, batch)
    }

    fn progress(&self, id: u64) -> StoreResult<u64> {
        self.inner.progress(id)
    }

    fn asset_length(&self, id: u64) -> StoreResult<Option<u64>> {
        self.inner.asset_length(id)
    }

    fn set_asset_attribute(
        &self,
        id: u64,
        key: &str,
        ty: AttrType,
        value: &[Word],
    ) -> StoreResult<TxReceipt> {
        self.inner.set_asset_attribute(id, key, ty, value)
    }

    fn asset_attribute(&self, id: u64, key: &str) -> StoreResult<Option<(AttrType, Vec<Word>)>> {
        self.inner.asset_attribute(id, key)
    }

    fn read_asset_words(&self, id: u64) -> StoreResult<Vec<Word>> {
        self.inner.read_asset_words(id)
    }
}

/// Lets `budget` writes through, then behaves like a dead process.
struct Crashing<'a> {
    inner: &'a MemStore,
    budget: AtomicUsize,
}

impl Crashing<'_> {
    fn spend(&self) -> StoreResult<()> {
        let left = self.budget.load(Ordering::SeqCst);
        if left == 0 {
            return Err(StoreFault::Network("process killed".into()));
        }
        self.budget.store(left - 1, Ordering::SeqCst);
        Ok(())
    }
}

impl AssetStore for Crashing<'_> {
    fn create_asset(&self, id: u64, first: &[Word], len: u64) -> StoreResult<TxReceipt> {
        self.spend()?;
        self.inner.create_asset(id, first, len)
    }

    fn append_asset_content(&self, id: u64, batch: &[Word]) -> StoreResult<TxReceipt> {
        self.spend()?;
        self.inner.append_asset_content(id, batch)
    }

    fn progress(&self, id: u64) -> StoreResult<u64> {
        self.inner.progress(id)
    }

    fn asset_length(&self, id: u64) -> StoreResult<Option<u64>> {
        self.inner.asset_length(id)
    }

    fn set_asset_attribute(
        &self,
        id: u64,
        key: &str,
        ty: AttrType,
        value: &[Word],
    ) -> StoreResult<TxReceipt> {
        self.spend()?;
        self.inner.set_asset_attribute(id, key, ty, value)
    }

    fn asset_attribute(&self, id: u64, key: &str) -> StoreResult<Option<(AttrType, Vec<Word>)>> {
        self.inner.asset_attribute(id, key)
    }

    fn read_asset_words(&self, id: u64) -> StoreResult<Vec<Word>> {
        self.inner.read_asset_words(id)
    }
}

#[test]
fn hundred_byte_scenario() {
    let data = payload(100, 1);
    let asset = encode(&data, false).unwrap();
    assert_eq!(asset.words.len(), 4);
    assert!(asset.words[3].0[4..].iter().all(|b| *b == 0));

    let batches = chunk(&asset.words, 2).unwrap();
    let sizes: Vec<usize> = batches.iter().map(|b| b.words.len()).collect();
    assert_eq!(sizes, vec![2, 2]);

    let store = MemStore::new();
    Uploader::new(&store, cfg(2))
        .unwrap()
        .upload_asset(0, "scenario", &asset)
        .unwrap();
    assert_eq!(store.progress(0).unwrap(), 4);
}

#[test]
fn reordered_appends_are_rejected_by_the_store() {
    let asset = encode(&payload(32 * 6, 2), false).unwrap();
    let store = StrictStore {
        inner: MemStore::new(),
        expected: HashMap::from([(0, asset.words.clone())]),
    };
    let mut batches = chunk(&asset.words, 2).unwrap();
    store
        .create_asset(0, batches[0].words, asset.stored_len)
        .unwrap();
    batches.swap(1, 2);
    assert!(matches!(
        store.append_asset_content(0, batches[1].words),
        Err(StoreFault::Rejected(_))
    ));
    assert_eq!(store.progress(0).unwrap(), 2);
}

#[test]
fn driver_appends_in_order() {
    let assets: Vec<_> = (0..3)
        .map(|i| encode(&payload(1000 + i * 100, i as u8), false).unwrap())
        .collect();
    let store = StrictStore {
        inner: MemStore::new(),
        expected: assets
            .iter()
            .enumerate()
            .map(|(i, a)| (i as u64, a.words.clone()))
            .collect(),
    };
    let up = Uploader::new(&store, cfg(5)).unwrap();
    for (i, a) in assets.iter().enumerate() {
        up.upload_asset(i as u64, "strict", a).unwrap();
        assert_eq!(store.progress(i as u64).unwrap(), a.words.len() as u64);
    }
}

#[test]
fn interrupted_run_resumes_to_the_same_state() {
    let data = payload(5000, 9);
    let asset = encode(&data, true).unwrap();
    let n_batches = chunk(&asset.words, 8).unwrap().len();
    assert!(n_batches > 3);

    let clean = MemStore::new();
    Uploader::new(&clean, cfg(8))
        .unwrap()
        .upload_asset(0, "clean", &asset)
        .unwrap();

    // k == n_batches: every content batch landed, only the attribute is missing
    for k in 1..=n_batches {
        let resumed = MemStore::new();
        let crashing = Crashing {
            inner: &resumed,
            budget: AtomicUsize::new(k),
        };
        let err = Uploader::new(&crashing, cfg(8))
            .unwrap()
            .upload_asset(0, "resume", &asset)
            .unwrap_err();
        assert!(matches!(err, UploadError::Network { .. }));
        assert_eq!(
            resumed.progress(0).unwrap(),
            (k * 8).min(asset.words.len()) as u64
        );
        assert_eq!(resumed.asset_attribute(0, INFLATED_SIZE_KEY).unwrap(), None);

        // a fresh run recomputes everything from the source bytes
        let again = encode(&data, true).unwrap();
        let report = Uploader::new(&resumed, cfg(8))
            .unwrap()
            .upload_asset(0, "resume", &again)
            .unwrap();
        assert_eq!(report.batches_skipped, k);
        assert_eq!(report.batches_sent, n_batches - k);
        assert_eq!(report.inflated_size, Some(data.len() as u64));
        if k == n_batches {
            // the attribute is the only write left
            assert_eq!(report.receipts.len(), 1);
        }

        assert_eq!(resumed.read_asset_words(0).unwrap(), clean.read_asset_words(0).unwrap());
        assert_eq!(
            resumed.asset_attribute(0, INFLATED_SIZE_KEY).unwrap(),
            clean.asset_attribute(0, INFLATED_SIZE_KEY).unwrap()
        );
        assert_eq!(fetch_asset(&resumed, 0).unwrap(), data);
    }
}

#[test]
fn inflated_size_matches_even_when_compression_grows() {
    let data = payload(3, 0);
    let asset = encode(&data, true).unwrap();
    let store = MemStore::new();
    Uploader::new(&store, cfg(4))
        .unwrap()
        .upload_asset(0, "tiny", &asset)
        .unwrap();
    let (_, words) = store.asset_attribute(0, INFLATED_SIZE_KEY).unwrap().unwrap();
    assert_eq!(words[0].to_u128(), Some(3));
    assert_eq!(fetch_asset(&store, 0).unwrap(), data);
}

#[test]
fn fs_store_resumes_across_processes() {
    let dir = TempDir::new().unwrap();
    let data = payload(32 * 50 + 7, 4);
    let asset = encode(&data, false).unwrap();

    {
        // an earlier process got two batches in before dying
        let store = FsStore::open(dir.path()).unwrap();
        store
            .create_asset(0, &asset.words[..10], asset.stored_len)
            .unwrap();
        store.append_asset_content(0, &asset.words[10..20]).unwrap();
    }

    let store = FsStore::open(dir.path()).unwrap();
    let report = Uploader::new(&store, cfg(10))
        .unwrap()
        .upload_asset(0, "x", &asset)
        .unwrap();
    assert_eq!(report.batches_skipped, 2);
    assert_eq!(store.progress(0).unwrap(), asset.words.len() as u64);
    assert_eq!(fetch_asset(&store, 0).unwrap(), data);
}
