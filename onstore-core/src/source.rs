use std::path::Path;

use crate::config::UploadConfig;
use crate::encode::{EncodedAsset, encode};
use crate::error::{Result, UploadError};
use crate::minify::{is_svg, minify_svg};

/// An asset read from disk and encoded, ready for the driver.
#[derive(Clone, Debug)]
pub struct PreparedAsset {
    pub label: String,
    pub encoded: EncodedAsset,
}

pub fn prepare_bytes(label: impl Into<String>, bytes: &[u8], compress: bool) -> Result<PreparedAsset> {
    Ok(PreparedAsset {
        label: label.into(),
        encoded: encode(bytes, compress)?,
    })
}

pub fn prepare_file(path: &Path, cfg: &UploadConfig) -> Result<PreparedAsset> {
    let mut bytes = std::fs::read(path)?;
    if cfg.minify_svg && is_svg(path) {
        let text = String::from_utf8(bytes)
            .map_err(|e| UploadError::Format(format!("{}: {e}", path.display())))?;
        bytes = minify_svg(&text).into_bytes();
    }
    prepare_bytes(path.display().to_string(), &bytes, cfg.compress)
}

pub fn prepare_files(paths: &[&Path], cfg: &UploadConfig) -> Result<Vec<PreparedAsset>> {
    paths.iter().map(|p| prepare_file(p, cfg)).collect()
}
