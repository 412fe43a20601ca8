//! PDF text extraction with per-page OCR fallback.

use std::path::Path;

use pdfium_render::prelude::*;
use tracing::{debug, warn};

use crate::error::ProcessingError;

use super::ocr::OcrEngine;

/// Width in pixels used when rasterizing a page for OCR.
const OCR_RENDER_WIDTH: i32 = 2048;

/// Extract text from a PDF.
///
/// Pages with embedded text contribute it directly. A page without embedded
/// text is rasterized and OCRed when `ocr_enabled` is set; otherwise it
/// contributes nothing. Page contributions are joined with newlines, and a
/// fully textless document yields an empty string rather than an error.
pub fn extract_pdf(
    path: &Path,
    ocr_enabled: bool,
    ocr: &OcrEngine,
) -> Result<String, ProcessingError> {
    let pdfium = create_pdfium()?;

    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| extraction_error(format!("failed to load PDF: {e:?}")))?;

    let page_count = document.pages().len();
    debug!(path = %path.display(), pages = page_count, "Processing PDF pages");

    let mut contributions: Vec<String> = Vec::new();

    for (page_index, page) in document.pages().iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| extraction_error(format!("failed to read page {page_index}: {e:?}")))?;

        let embedded = text.all().trim().to_string();
        if let Some(contribution) =
            resolve_page_text(page_index, embedded, ocr_enabled, || ocr_page(&page, ocr))
        {
            contributions.push(contribution);
        }
    }

    Ok(contributions.join("\n"))
}

/// Decide what a single page contributes to the document text.
///
/// Embedded text wins outright. An empty page falls back to OCR only when
/// enabled; an OCR failure drops the page instead of sinking the document.
fn resolve_page_text<F>(
    page_index: usize,
    embedded: String,
    ocr_enabled: bool,
    run_ocr: F,
) -> Option<String>
where
    F: FnOnce() -> Result<String, ProcessingError>,
{
    if !embedded.is_empty() {
        return Some(embedded);
    }

    if !ocr_enabled {
        debug!(page = page_index, "No embedded text and OCR disabled; skipping page");
        return None;
    }

    match run_ocr() {
        Ok(ocr_text) if !ocr_text.is_empty() => {
            debug!(page = page_index, chars = ocr_text.len(), "OCR recovered page text");
            Some(ocr_text)
        }
        Ok(_) => {
            debug!(page = page_index, "OCR found no text on page");
            None
        }
        Err(e) => {
            warn!(page = page_index, error = %e, "Page OCR failed");
            None
        }
    }
}

fn ocr_page(page: &PdfPage<'_>, ocr: &OcrEngine) -> Result<String, ProcessingError> {
    let config = PdfRenderConfig::new().set_target_width(OCR_RENDER_WIDTH);

    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| extraction_error(format!("failed to render page: {e:?}")))?;

    let image = bitmap.as_image();
    Ok(ocr.recognize_image(&image)?.trim().to_string())
}

/// Create a new Pdfium instance (dynamically linked).
///
/// Searches for libpdfium in the current directory, then vendor/pdfium/lib/,
/// then the system library paths.
pub fn create_pdfium() -> Result<Pdfium, ProcessingError> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "./vendor/pdfium/lib/",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| extraction_error(format!("failed to load PDFium library: {e:?}")))?;

    Ok(Pdfium::new(bindings))
}

fn extraction_error(message: String) -> ProcessingError {
    ProcessingError::Extraction {
        format: "pdf",
        source: Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_text_skips_ocr() {
        let resolved = resolve_page_text(0, "Invoice #123".to_string(), true, || {
            panic!("OCR must not run when the page has embedded text")
        });
        assert_eq!(resolved.as_deref(), Some("Invoice #123"));
    }

    #[test]
    fn textless_page_with_ocr_disabled_contributes_nothing() {
        let resolved = resolve_page_text(1, String::new(), false, || {
            panic!("OCR must not run when disabled")
        });
        assert_eq!(resolved, None);
    }

    #[test]
    fn textless_page_falls_back_to_ocr() {
        let resolved = resolve_page_text(1, String::new(), true, || Ok("Total: $50".to_string()));
        assert_eq!(resolved.as_deref(), Some("Total: $50"));
    }

    #[test]
    fn blank_ocr_result_contributes_nothing() {
        let resolved = resolve_page_text(2, String::new(), true, || Ok(String::new()));
        assert_eq!(resolved, None);
    }

    #[test]
    fn ocr_failure_drops_the_page_only() {
        let resolved = resolve_page_text(2, String::new(), true, || {
            Err(extraction_error("render failed".to_string()))
        });
        assert_eq!(resolved, None);
    }

    #[test]
    fn page_contributions_join_with_newlines() {
        let pages = vec![
            "Invoice #123".to_string(),
            String::new(),
            "Total: $50".to_string(),
        ];

        let contributions: Vec<String> = pages
            .into_iter()
            .enumerate()
            .filter_map(|(index, embedded)| {
                resolve_page_text(index, embedded, false, || unreachable!())
            })
            .collect();

        assert_eq!(contributions.join("\n"), "Invoice #123\nTotal: $50");
    }
}
