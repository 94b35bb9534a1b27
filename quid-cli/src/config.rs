use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use quid_ingest::TesseractOcr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub ocr: OcrSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrSection {
    /// Tesseract language code (e.g. "eng")
    pub language: String,
    /// Rasterization resolution handed to pdftoppm
    pub render_dpi: u32,
    /// Per-call deadline in seconds before a stuck recognizer is killed
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let engine = TesseractOcr::default();
        Self {
            ocr: OcrSection {
                language: engine.language,
                render_dpi: engine.render_dpi,
                timeout_secs: engine.timeout.as_secs(),
            },
        }
    }
}

impl Config {
    pub fn ocr_engine(&self) -> TesseractOcr {
        TesseractOcr {
            language: self.ocr.language.clone(),
            render_dpi: self.ocr.render_dpi,
            timeout: Duration::from_secs(self.ocr.timeout_secs),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".quid").join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    Ok(toml::from_str(&s).context("parse config.toml")?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let cfg = Config::default();
        let s = toml::to_string_pretty(&cfg).unwrap();
        let back: Config = toml::from_str(&s).unwrap();
        assert_eq!(back.ocr.language, cfg.ocr.language);
        assert_eq!(back.ocr.render_dpi, cfg.ocr.render_dpi);
        assert_eq!(back.ocr.timeout_secs, cfg.ocr.timeout_secs);
    }
}
