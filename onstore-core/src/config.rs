use crate::chunker::DEFAULT_BATCH_WORDS;
use crate::error::{Result, UploadError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Upload tuning. Every field may be omitted from a config file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Words per write.
    pub batch_words: usize,
    /// Raw-deflate each asset before splitting it into words.
    pub compress: bool,
    /// Collapse SVG whitespace before encoding `.svg` inputs.
    pub minify_svg: bool,
    /// Id given to the first asset; later ones count up from here.
    pub first_asset_id: u64,
    /// Attempts per write, first try included.
    pub max_retries: usize,
    /// Backoff after the first failed attempt; doubles each retry.
    pub backoff_ms: u64,
    /// Assets uploaded at once. Batches of one asset are always sequential.
    pub parallelism: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            batch_words: DEFAULT_BATCH_WORDS,
            compress: false,
            minify_svg: false,
            first_asset_id: 0,
            max_retries: 5,
            backoff_ms: 1000,
            parallelism: 1,
        }
    }
}

impl UploadConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(text).map_err(|e| UploadError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_words == 0 {
            return Err(UploadError::Config("batch_words must be positive".into()));
        }
        if self.max_retries == 0 {
            return Err(UploadError::Config("max_retries must be positive".into()));
        }
        if self.parallelism == 0 {
            return Err(UploadError::Config("parallelism must be positive".into()));
        }
        Ok(())
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// Delay before attempt `attempt + 1`, where `attempt` starts at 1.
    pub fn backoff_for(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        self.backoff_base().saturating_mul(1u32 << shift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = UploadConfig::from_toml_str("compress = true\nbatch_words = 256\n").unwrap();
        assert!(cfg.compress);
        assert_eq!(cfg.batch_words, 256);
        assert_eq!(cfg.max_retries, 5);
        assert_eq!(cfg.parallelism, 1);
    }

    #[test]
    fn rejects_zero_and_unknown_keys() {
        assert!(UploadConfig::from_toml_str("batch_words = 0").is_err());
        assert!(UploadConfig::from_toml_str("max_retries = 0").is_err());
        assert!(UploadConfig::from_toml_str("gas_price = 1").is_err());
    }

    #[test]
    fn backoff_doubles() {
        let cfg = UploadConfig {
            backoff_ms: 100,
            ..Default::default()
        };
        assert_eq!(cfg.backoff_for(1), Duration::from_millis(100));
        assert_eq!(cfg.backoff_for(2), Duration::from_millis(200));
        assert_eq!(cfg.backoff_for(4), Duration::from_millis(800));
    }
}
