use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;

use super::{
    AssetRecord, AssetStore, AttrType, StoreFault, StoreResult, TxReceipt, check_batch_limit,
    receipt_for,
};
use crate::error::Result;
use crate::word::{WORD_SIZE, Word, words_to_bytes};

/// Directory-backed store. The cursor in each `.meta` record is
/// authoritative; bytes past it in the `.words` file are a torn write.
pub struct FsStore {
    root: PathBuf,
    write_lock: Mutex<()>,
    max_batch_words: Option<usize>,
}

/// A record that does not decode will not decode on retry either.
fn io_fault(e: io::Error) -> StoreFault {
    match e.kind() {
        io::ErrorKind::InvalidData => StoreFault::Rejected(format!("corrupt store record: {e}")),
        _ => StoreFault::Network(format!("io: {e}")),
    }
}

fn poisoned<T>(_: T) -> StoreFault {
    StoreFault::Rejected("store lock poisoned".into())
}

impl FsStore {
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            write_lock: Mutex::new(()),
            max_batch_words: None,
        })
    }

    pub fn with_batch_limit(mut self, max: Option<usize>) -> Self {
        self.max_batch_words = max;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn meta_path(&self, asset_id: u64) -> PathBuf {
        self.root.join(format!("asset-{asset_id}.meta"))
    }

    fn words_path(&self, asset_id: u64) -> PathBuf {
        self.root.join(format!("asset-{asset_id}.words"))
    }

    /// Ids of every asset created in this store, ascending.
    pub fn asset_ids(&self) -> Result<Vec<u64>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(id) = name
                .strip_prefix("asset-")
                .and_then(|s| s.strip_suffix(".meta"))
                .and_then(|s| s.parse().ok())
            {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    fn load(&self, asset_id: u64) -> io::Result<Option<AssetRecord>> {
        let f = match File::open(self.meta_path(asset_id)) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let rec: AssetRecord = ciborium::de::from_reader(io::BufReader::new(f))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("meta decode: {e}")))?;
        Ok(Some(rec))
    }

    fn save(&self, asset_id: u64, rec: &AssetRecord) -> io::Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        ciborium::ser::into_writer(rec, &mut tmp)
            .map_err(|e| io::Error::other(format!("meta encode: {e}")))?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.meta_path(asset_id)).map_err(|e| e.error)?;
        Ok(())
    }

    fn write_words_at(&self, asset_id: u64, cursor: u64, batch: &[Word]) -> io::Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.words_path(asset_id))?;
        let off = cursor * WORD_SIZE as u64;
        f.set_len(off)?;
        f.seek(SeekFrom::Start(off))?;
        f.write_all(&words_to_bytes(batch))?;
        f.sync_all()
    }

    fn commit(&self, asset_id: u64, mut rec: AssetRecord, op: &str, batch: &[Word]) -> StoreResult<TxReceipt> {
        rec.check_append(asset_id, batch.len())?;
        self.write_words_at(asset_id, rec.cursor, batch)
            .map_err(io_fault)?;
        rec.cursor += batch.len() as u64;
        rec.writes += 1;
        let receipt = receipt_for(op, asset_id, rec.writes, batch);
        self.save(asset_id, &rec).map_err(io_fault)?;
        Ok(receipt)
    }
}

impl AssetStore for FsStore {
    fn create_asset(
        &self,
        asset_id: u64,
        first_batch: &[Word],
        total_len: u64,
    ) -> StoreResult<TxReceipt> {
        check_batch_limit(self.max_batch_words, first_batch.len())?;
        let _g = self.write_lock.lock().map_err(poisoned)?;
        if self.load(asset_id).map_err(io_fault)?.is_some() {
            return Err(StoreFault::Rejected(format!("asset {asset_id} already exists")));
        }
        let rec = AssetRecord {
            total_len,
            ..Default::default()
        };
        self.commit(asset_id, rec, "create", first_batch)
    }

    fn append_asset_content(&self, asset_id: u64, batch: &[Word]) -> StoreResult<TxReceipt> {
        check_batch_limit(self.max_batch_words, batch.len())?;
        let _g = self.write_lock.lock().map_err(poisoned)?;
        let rec = self
            .load(asset_id)
            .map_err(io_fault)?
            .ok_or_else(|| StoreFault::Rejected(format!("asset {asset_id} does not exist")))?;
        self.commit(asset_id, rec, "append", batch)
    }

    fn progress(&self, asset_id: u64) -> StoreResult<u64> {
        Ok(self.load(asset_id).map_err(io_fault)?.map(|r| r.cursor).unwrap_or(0))
    }

    fn asset_length(&self, asset_id: u64) -> StoreResult<Option<u64>> {
        Ok(self.load(asset_id).map_err(io_fault)?.map(|r| r.total_len))
    }

    fn set_asset_attribute(
        &self,
        asset_id: u64,
        key: &str,
        ty: AttrType,
        value: &[Word],
    ) -> StoreResult<TxReceipt> {
        let _g = self.write_lock.lock().map_err(poisoned)?;
        let mut rec = self
            .load(asset_id)
            .map_err(io_fault)?
            .ok_or_else(|| StoreFault::Rejected(format!("asset {asset_id} does not exist")))?;
        rec.attributes.insert(key.to_string(), (ty, value.to_vec()));
        rec.writes += 1;
        let receipt = receipt_for(key, asset_id, rec.writes, value);
        self.save(asset_id, &rec).map_err(io_fault)?;
        Ok(receipt)
    }

    fn asset_attribute(
        &self,
        asset_id: u64,
        key: &str,
    ) -> StoreResult<Option<(AttrType, Vec<Word>)>> {
        Ok(self
            .load(asset_id)
            .map_err(io_fault)?
            .and_then(|r| r.attributes.get(key).cloned()))
    }

    fn read_asset_words(&self, asset_id: u64) -> StoreResult<Vec<Word>> {
        let Some(rec) = self.load(asset_id).map_err(io_fault)? else {
            return Ok(Vec::new());
        };
        let mut buf = vec![0u8; rec.cursor as usize * WORD_SIZE];
        let mut f = File::open(self.words_path(asset_id)).map_err(io_fault)?;
        f.read_exact(&mut buf).map_err(io_fault)?;
        Ok(buf.chunks(WORD_SIZE).map(Word::from_stride).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn w(n: u128) -> Word {
        Word::from_u128(n)
    }

    #[test]
    fn survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let s = FsStore::open(dir.path()).unwrap();
            s.create_asset(0, &[w(1), w(2)], 128).unwrap();
            s.append_asset_content(0, &[w(3)]).unwrap();
        }
        let s = FsStore::open(dir.path()).unwrap();
        assert_eq!(s.progress(0).unwrap(), 3);
        assert_eq!(s.asset_length(0).unwrap(), Some(128));
        assert_eq!(s.read_asset_words(0).unwrap(), vec![w(1), w(2), w(3)]);
        assert_eq!(s.asset_ids().unwrap(), vec![0]);
    }

    #[test]
    fn corrupt_meta_is_rejected_not_retried() {
        let dir = TempDir::new().unwrap();
        let s = FsStore::open(dir.path()).unwrap();
        s.create_asset(3, &[w(1)], 32).unwrap();
        fs::write(dir.path().join("asset-3.meta"), b"\xff\x00 not cbor").unwrap();
        assert!(matches!(s.progress(3), Err(StoreFault::Rejected(_))));
        assert!(matches!(
            s.append_asset_content(3, &[w(2)]),
            Err(StoreFault::Rejected(_))
        ));
    }

    #[test]
    fn torn_tail_is_ignored_and_overwritten() {
        let dir = TempDir::new().unwrap();
        let s = FsStore::open(dir.path()).unwrap();
        s.create_asset(7, &[w(1)], 96).unwrap();

        // a crash after the word write but before the meta update
        let mut f = OpenOptions::new()
            .append(true)
            .open(dir.path().join("asset-7.words"))
            .unwrap();
        f.write_all(&[0xee; 40]).unwrap();
        drop(f);

        assert_eq!(s.progress(7).unwrap(), 1);
        s.append_asset_content(7, &[w(2), w(3)]).unwrap();
        assert_eq!(s.read_asset_words(7).unwrap(), vec![w(1), w(2), w(3)]);
        let len = fs::metadata(dir.path().join("asset-7.words")).unwrap().len();
        assert_eq!(len, 96);
    }

    #[test]
    fn attributes_persist() {
        let dir = TempDir::new().unwrap();
        let s = FsStore::open(dir.path()).unwrap();
        s.create_asset(1, &[w(1)], 32).unwrap();
        s.set_asset_attribute(1, "_inflatedSize", AttrType::Uint, &[w(4096)])
            .unwrap();
        let s = FsStore::open(dir.path()).unwrap();
        assert_eq!(
            s.asset_attribute(1, "_inflatedSize").unwrap(),
            Some((AttrType::Uint, vec![w(4096)]))
        );
        assert_eq!(s.asset_attribute(1, "missing").unwrap(), None);
    }

    #[test]
    fn rejects_like_the_contract() {
        let dir = TempDir::new().unwrap();
        let s = FsStore::open(dir.path()).unwrap().with_batch_limit(Some(1));
        assert!(matches!(
            s.append_asset_content(0, &[w(1)]),
            Err(StoreFault::Rejected(_))
        ));
        assert!(matches!(
            s.create_asset(0, &[w(1), w(2)], 64),
            Err(StoreFault::Rejected(_))
        ));
        s.create_asset(0, &[w(1)], 64).unwrap();
        assert!(matches!(
            s.create_asset(0, &[w(1)], 64),
            Err(StoreFault::Rejected(_))
        ));
    }
}
