//! Text extraction from uploaded documents.
//!
//! Dispatches a saved upload to the format-specific extractor based on its
//! extension. Extraction only reads the filesystem (plus temp page images
//! for OCR); it never writes into the scratch directory itself.

pub mod docx;
pub mod fingerprint;
pub mod ocr;
pub mod pdf;

use std::path::Path;

use crate::error::ProcessingError;

pub use ocr::OcrEngine;

/// Extract text from a file based on its extension.
///
/// - PDF: embedded text per page, with optional per-page OCR fallback.
/// - DOCX: plain text; embedded-image OCR unimplemented, degrades gracefully.
/// - DOC: always rejected; conversion to DOCX is required.
/// - JPG/JPEG/PNG/TIFF: OCR unconditionally, every frame.
pub fn extract_text(
    path: &Path,
    ocr_enabled: bool,
    ocr: &OcrEngine,
) -> Result<String, ProcessingError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => pdf::extract_pdf(path, ocr_enabled, ocr),
        "docx" => docx::extract_docx(path, ocr_enabled),
        "doc" => Err(ProcessingError::LegacyFormat),
        "jpg" | "jpeg" | "png" | "tiff" => ocr.recognize_file(path),
        other => Err(ProcessingError::UnsupportedExtension {
            extension: format!(".{other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionConfig;

    fn engine() -> OcrEngine {
        OcrEngine::new(&ExtractionConfig::default())
    }

    #[test]
    fn doc_is_always_rejected() {
        // The OCR flag must not change the outcome for legacy .doc files.
        for ocr_enabled in [false, true] {
            let result = extract_text(Path::new("contract.doc"), ocr_enabled, &engine());
            assert!(matches!(result, Err(ProcessingError::LegacyFormat)));
        }
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let result = extract_text(Path::new("data.xyz"), true, &engine());
        match result {
            Err(ProcessingError::UnsupportedExtension { extension }) => {
                assert_eq!(extension, ".xyz");
            }
            other => panic!("expected UnsupportedExtension, got {other:?}"),
        }
    }

    #[test]
    fn missing_extension_is_rejected() {
        let result = extract_text(Path::new("README"), false, &engine());
        assert!(matches!(
            result,
            Err(ProcessingError::UnsupportedExtension { .. })
        ));
    }

    #[test]
    fn dispatch_is_case_insensitive() {
        // Uppercase .DOC still routes to the legacy rejection, not to the
        // unsupported-extension branch.
        let result = extract_text(Path::new("contract.DOC"), false, &engine());
        assert!(matches!(result, Err(ProcessingError::LegacyFormat)));
    }
}
