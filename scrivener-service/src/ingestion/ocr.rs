//! OCR via the system `tesseract` binary.

use std::path::Path;
use std::process::Command;

use image::DynamicImage;
use tracing::debug;

use crate::config::ExtractionConfig;
use crate::error::ProcessingError;

/// Wraps the tesseract CLI. Requires tesseract to be installed on the
/// system (e.g. on Ubuntu: `apt-get install tesseract-ocr`).
#[derive(Clone)]
pub struct OcrEngine {
    language: String,
}

impl OcrEngine {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            language: config.ocr_language.clone(),
        }
    }

    /// Run OCR over an image file and return the recognized text.
    ///
    /// Multi-frame formats (e.g. multi-page TIFF) are handled by tesseract
    /// itself; the form feeds it emits between frames are normalized to
    /// newlines so frame contributions join the same way PDF pages do.
    pub fn recognize_file(&self, path: &Path) -> Result<String, ProcessingError> {
        let output = Command::new("tesseract")
            .arg(path)
            .arg("stdout")
            .args(["-l", &self.language])
            .output()
            .map_err(|e| ProcessingError::Ocr {
                message: format!("failed to run tesseract: {e}"),
            })?;

        if !output.status.success() {
            return Err(ProcessingError::Ocr {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout)
            .replace('\u{c}', "\n")
            .trim_end()
            .to_string();
        debug!(path = %path.display(), chars = text.len(), "OCR completed");
        Ok(text)
    }

    /// Run OCR over an in-memory image (a rasterized PDF page).
    pub fn recognize_image(&self, image: &DynamicImage) -> Result<String, ProcessingError> {
        let tmp = tempfile::Builder::new()
            .prefix("scrivener-ocr-")
            .suffix(".png")
            .tempfile()?;

        image.save(tmp.path()).map_err(|e| ProcessingError::Ocr {
            message: format!("failed to write page image: {e}"),
        })?;

        self.recognize_file(tmp.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_input_reports_ocr_error() {
        let engine = OcrEngine::new(&ExtractionConfig::default());
        let result = engine.recognize_file(Path::new("/nonexistent/image.png"));
        // Either tesseract is absent or it rejects the path; both surface
        // as a typed OCR failure rather than a panic.
        assert!(matches!(result, Err(ProcessingError::Ocr { .. })));
    }
}
