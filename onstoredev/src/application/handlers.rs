use std::path::{Path, PathBuf};

use onstore_core::chunker::batch_words_for_budget;
use onstore_core::domain::plan_rows;
use onstore_core::error::{Result, UploadError};
use onstore_core::source::{prepare_file, prepare_files};
use onstore_core::store::{AssetStore, AttrType, AttrValue};
use onstore_core::store_factory::{Backend, StoreParams, open_store};
use onstore_core::{
    FsStore, INFLATED_SIZE_KEY, UploadConfig, Uploader, check_id_range, fetch_asset,
};
use tracing::debug;
use walkdir::WalkDir;

use super::claims;
use crate::presentation::cli::EncodeArgs;

/// Flags that win over the TOML upload settings.
pub struct UploadOverrides {
    pub first_id: Option<u64>,
    pub enc: EncodeArgs,
    pub max_retries: Option<usize>,
    pub backoff_ms: Option<u64>,
    pub parallelism: Option<usize>,
}

fn apply_encode_args(cfg: &mut UploadConfig, enc: &EncodeArgs) {
    if enc.compress {
        cfg.compress = true;
    }
    if enc.no_compress {
        cfg.compress = false;
    }
    if enc.minify {
        cfg.minify_svg = true;
    }
    if enc.no_minify {
        cfg.minify_svg = false;
    }
    if let Some(n) = enc.batch_words {
        cfg.batch_words = n;
    }
    if let Some(bytes) = enc.batch_bytes {
        cfg.batch_words = batch_words_for_budget(bytes);
    }
}

fn numeric_stem(p: &Path) -> Option<u64> {
    p.file_stem()?.to_str()?.parse().ok()
}

/// Orders a directory's files: by number when every stem is one
/// (`2.svg` before `10.svg`), by path otherwise.
pub fn sort_assets(files: &mut [PathBuf]) {
    if files.iter().all(|f| numeric_stem(f).is_some()) {
        files.sort_by(|a, b| numeric_stem(a).cmp(&numeric_stem(b)).then_with(|| a.cmp(b)));
    } else {
        files.sort();
    }
}

/// Expands directories into their files; plain files keep their position.
pub fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut files = Vec::new();
            for entry in WalkDir::new(input) {
                let entry = entry.map_err(std::io::Error::from)?;
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
            sort_assets(&mut files);
            out.extend(files);
        } else {
            out.push(input.clone());
        }
    }
    if out.is_empty() {
        return Err(UploadError::Config("no input files".into()));
    }
    debug!(files = out.len(), "collected inputs");
    Ok(out)
}

fn open_fs(store: &Path) -> Result<FsStore> {
    FsStore::open(store)
}

pub fn handle_encode(input: PathBuf, enc: EncodeArgs) -> Result<()> {
    let mut cfg = UploadConfig::default();
    apply_encode_args(&mut cfg, &enc);
    let asset = prepare_file(&input, &cfg)?;
    for w in &asset.encoded.words {
        println!("{w}");
    }
    eprintln!(
        "encode: {} bytes -> {} stored, {} words ({:?})",
        asset.encoded.original_len,
        asset.encoded.stored_len,
        asset.encoded.words.len(),
        asset.encoded.codec
    );
    Ok(())
}

pub fn handle_plan(inputs: Vec<PathBuf>, first_id: Option<u64>, enc: EncodeArgs) -> Result<()> {
    let mut cfg = UploadConfig::default();
    apply_encode_args(&mut cfg, &enc);
    if let Some(id) = first_id {
        cfg.first_asset_id = id;
    }
    cfg.validate()?;

    let files = collect_inputs(&inputs)?;
    let refs: Vec<_> = files.iter().map(|p| p.as_path()).collect();
    check_id_range(cfg.first_asset_id, files.len())?;
    let assets = prepare_files(&refs, &cfg)?;
    for (i, a) in assets.iter().enumerate() {
        let asset_id = cfg.first_asset_id + i as u64;
        println!(
            "asset {asset_id} {} original={} stored={} words={}",
            a.label,
            a.encoded.original_len,
            a.encoded.stored_len,
            a.encoded.words.len()
        );
        for r in plan_rows(asset_id, &a.encoded, cfg.batch_words)? {
            println!(
                "  #{:<5} words={}..{} bytes={}..{}",
                r.index, r.first_word, r.end_word, r.byte_start, r.byte_end
            );
        }
    }
    Ok(())
}

pub fn handle_upload(
    store: Option<PathBuf>,
    inputs: Vec<PathBuf>,
    dry_run: bool,
    config: Option<PathBuf>,
    overrides: UploadOverrides,
) -> Result<()> {
    let mut cfg = match &config {
        Some(path) => UploadConfig::from_toml_file(path)?,
        None => UploadConfig::default(),
    };
    apply_encode_args(&mut cfg, &overrides.enc);
    if let Some(id) = overrides.first_id {
        cfg.first_asset_id = id;
    }
    if let Some(n) = overrides.max_retries {
        cfg.max_retries = n;
    }
    if let Some(ms) = overrides.backoff_ms {
        cfg.backoff_ms = ms;
    }
    if let Some(n) = overrides.parallelism {
        cfg.parallelism = n;
    }

    let files = collect_inputs(&inputs)?;
    let refs: Vec<_> = files.iter().map(|p| p.as_path()).collect();
    let assets = prepare_files(&refs, &cfg)?;

    let store = if dry_run {
        open_store(Backend::Mem, StoreParams::default())?
    } else {
        open_store(
            Backend::Fs,
            StoreParams {
                root: store,
                ..Default::default()
            },
        )?
    };
    let uploader = Uploader::new(store.as_ref(), cfg)?;
    let reports = uploader.upload_all(&assets)?;
    for r in &reports {
        println!(
            "asset {} {} words={} sent={} skipped={}{}",
            r.asset_id,
            r.label,
            r.words,
            r.batches_sent,
            r.batches_skipped,
            r.inflated_size
                .map(|n| format!(" inflated={n}"))
                .unwrap_or_default()
        );
    }
    let sent: usize = reports.iter().map(|r| r.batches_sent).sum();
    eprintln!(
        "upload: {} assets, {sent} batches sent{}",
        reports.len(),
        if dry_run { " (dry run)" } else { "" }
    );
    Ok(())
}

pub fn handle_progress(store: PathBuf, asset_id: Option<u64>) -> Result<()> {
    let fs = open_fs(&store)?;
    let ids = match asset_id {
        Some(id) => vec![id],
        None => fs.asset_ids()?,
    };
    for id in ids {
        let cursor = fs
            .progress(id)
            .map_err(|f| f.into_upload_error(id, "progress", 1))?;
        let Some(len) = fs
            .asset_length(id)
            .map_err(|f| f.into_upload_error(id, "asset_length", 1))?
        else {
            println!("asset {id}: missing");
            continue;
        };
        let words = onstore_core::word::word_count(len);
        let state = if cursor == words { "complete" } else { "partial" };
        let inflated = fs
            .asset_attribute(id, INFLATED_SIZE_KEY)
            .map_err(|f| f.into_upload_error(id, "asset_attribute", 1))?
            .map(|(ty, w)| AttrValue::from_words(ty, &w))
            .transpose()?
            .map(|v| format!(" inflated={v}"))
            .unwrap_or_default();
        println!("asset {id}: {cursor}/{words} words, {len} bytes, {state}{inflated}");
    }
    Ok(())
}

pub fn handle_get(store: PathBuf, asset_id: u64, out: PathBuf) -> Result<()> {
    let fs = open_fs(&store)?;
    let bytes = fetch_asset(&fs, asset_id)?;
    std::fs::write(&out, &bytes)?;
    eprintln!("get: wrote {} bytes to {}", bytes.len(), out.display());
    Ok(())
}

pub fn handle_attr(store: PathBuf, asset_id: u64, key: String, ty: String, value: String) -> Result<()> {
    let ty: AttrType = ty.parse()?;
    let value = AttrValue::parse(ty, &value)?;
    let fs = open_fs(&store)?;
    let receipt = fs
        .set_asset_attribute(asset_id, &key, ty, &value.to_words())
        .map_err(|f| f.into_upload_error(asset_id, "set_asset_attribute", 1))?;
    println!("{receipt}");
    eprintln!("attr: {key}={value} on asset {asset_id}");
    Ok(())
}

pub fn handle_claims(input: PathBuf, output: PathBuf) -> Result<()> {
    let text = std::fs::read_to_string(&input)?;
    let balances: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| UploadError::Format(format!("{}: {e}", input.display())))?;
    let list = claims::build_claim_list(&balances)?;
    let json = serde_json::to_string_pretty(&list).map_err(|e| UploadError::Format(e.to_string()))?;
    std::fs::write(&output, json)?;
    eprintln!(
        "claims: {} addresses, root {}",
        list.claims.len(),
        list.merkle_root
    );
    Ok(())
}
