//! OCR sub-path for scanned statements
//!
//! The engine is a trait so the orchestrator never hard-codes a backend;
//! the default [`TesseractOcr`] shells out to poppler's `pdftoppm` for
//! page rasterization and to `tesseract` for recognition, both located on
//! PATH. Recognized text carries no positional metadata, so downstream falls
//! back to pattern matching over plain text.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use quid_core::ParseError;

/// Scanned multi-page documents are OCR'd up to this many pages; a page
/// of OCR can run to tens of seconds, so latency is bounded here.
pub const OCR_PAGE_CAP: usize = 5;

/// Rasterization resolution for `pdftoppm`. 200 dpi keeps statement body
/// text (7–9 pt) above the glyph sizes tesseract degrades at.
pub const OCR_RENDER_DPI: u32 = 200;

/// Small direct-upload photos are upscaled by this factor before
/// recognition.
pub const OCR_UPSCALE_FACTOR: u32 = 2;

/// Images narrower than this are considered small enough to upscale.
const UPSCALE_WIDTH_THRESHOLD: u32 = 1500;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A text recognizer the pipeline can drive page by page.
pub trait OcrEngine {
    /// Whether the engine can run in this environment at all.
    fn available(&self) -> bool;

    /// Recognize one page (0-based) of a PDF document.
    fn recognize_pdf_page(&self, pdf: &[u8], page: usize) -> Result<String, ParseError>;

    /// Recognize a standalone raster image (JPEG/PNG bytes).
    fn recognize_image(&self, bytes: &[u8]) -> Result<String, ParseError>;
}

/// Subprocess-backed engine: `pdftoppm` + `tesseract`.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    pub language: String,
    pub render_dpi: u32,
    /// Deadline per external call; a stuck recognizer is killed and the
    /// run fails with `OcrFailure`.
    pub timeout: Duration,
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            render_dpi: OCR_RENDER_DPI,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl TesseractOcr {
    fn run_tesseract(&self, image_path: &std::path::Path) -> Result<String, ParseError> {
        let mut command = Command::new("tesseract");
        command
            .arg(image_path)
            .arg("stdout")
            .args(["--psm", "6", "-l", &self.language]);
        let output = run_with_timeout(command, self.timeout)?;
        Ok(output)
    }
}

/// Spawn a command and wait for it up to `timeout`, returning stdout.
fn run_with_timeout(mut command: Command, timeout: Duration) -> Result<String, ParseError> {
    let mut child = command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .spawn()
        .map_err(|e| ParseError::OcrFailure(format!("failed to spawn: {e}")))?;

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let mut stdout = String::new();
                if let Some(mut pipe) = child.stdout.take() {
                    pipe.read_to_string(&mut stdout).ok();
                }
                if !status.success() {
                    let mut stderr = String::new();
                    if let Some(mut pipe) = child.stderr.take() {
                        pipe.read_to_string(&mut stderr).ok();
                    }
                    return Err(ParseError::OcrFailure(format!(
                        "recognizer exited with {status}: {}",
                        stderr.trim()
                    )));
                }
                return Ok(stdout);
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    child.kill().ok();
                    child.wait().ok();
                    return Err(ParseError::OcrFailure(format!(
                        "recognizer timed out after {}s",
                        timeout.as_secs()
                    )));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                return Err(ParseError::OcrFailure(format!("failed to wait: {e}")));
            }
        }
    }
}

impl OcrEngine for TesseractOcr {
    fn available(&self) -> bool {
        which::which("tesseract").is_ok() && which::which("pdftoppm").is_ok()
    }

    fn recognize_pdf_page(&self, pdf: &[u8], page: usize) -> Result<String, ParseError> {
        if !self.available() {
            return Err(ParseError::OcrFailure(
                "tesseract/pdftoppm not found on PATH".to_string(),
            ));
        }

        let dir = tempfile::tempdir()
            .map_err(|e| ParseError::OcrFailure(format!("tempdir: {e}")))?;
        let pdf_path = dir.path().join("page-source.pdf");
        std::fs::write(&pdf_path, pdf)
            .map_err(|e| ParseError::OcrFailure(format!("write pdf: {e}")))?;

        let prefix = dir.path().join("rendered");
        let page_number = (page + 1).to_string();
        let mut render = Command::new("pdftoppm");
        render
            .args(["-png", "-r", &self.render_dpi.to_string()])
            .args(["-f", &page_number, "-l", &page_number, "-singlefile"])
            .arg(&pdf_path)
            .arg(&prefix);
        run_with_timeout(render, self.timeout)?;

        let image_path = prefix.with_extension("png");
        if !image_path.exists() {
            return Err(ParseError::OcrFailure(format!(
                "page {} was not rendered",
                page + 1
            )));
        }
        self.run_tesseract(&image_path)
    }

    fn recognize_image(&self, bytes: &[u8]) -> Result<String, ParseError> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| ParseError::DocumentUnreadable(format!("undecodable image: {e}")))?;

        if which::which("tesseract").is_err() {
            return Err(ParseError::OcrFailure(
                "tesseract not found on PATH".to_string(),
            ));
        }

        let prepared = if decoded.width() < UPSCALE_WIDTH_THRESHOLD {
            decoded.resize(
                decoded.width() * OCR_UPSCALE_FACTOR,
                decoded.height() * OCR_UPSCALE_FACTOR,
                image::imageops::FilterType::Lanczos3,
            )
        } else {
            decoded
        };

        let dir = tempfile::tempdir()
            .map_err(|e| ParseError::OcrFailure(format!("tempdir: {e}")))?;
        let image_path = dir.path().join("upload.png");
        prepared
            .save(&image_path)
            .map_err(|e| ParseError::OcrFailure(format!("encode image: {e}")))?;

        self.run_tesseract(&image_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_kills_stuck_process() {
        let mut command = Command::new("sleep");
        command.arg("30");
        let err = run_with_timeout(command, Duration::from_millis(120)).unwrap_err();
        assert!(matches!(err, ParseError::OcrFailure(_)));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_fast_process_output_captured() {
        let mut command = Command::new("echo");
        command.arg("recognized text");
        let out = run_with_timeout(command, Duration::from_secs(5)).unwrap();
        assert_eq!(out.trim(), "recognized text");
    }

    #[test]
    fn test_missing_binary_is_ocr_failure() {
        let command = Command::new("definitely-not-a-real-binary-5417");
        let err = run_with_timeout(command, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ParseError::OcrFailure(_)));
    }

    #[test]
    fn test_undecodable_image_is_unreadable() {
        let engine = TesseractOcr::default();
        let err = engine.recognize_image(b"not an image").unwrap_err();
        // Image decoding fails before any subprocess is needed.
        assert!(matches!(err, ParseError::DocumentUnreadable(_)));
    }
}
