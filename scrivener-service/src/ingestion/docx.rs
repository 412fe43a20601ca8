//! DOCX text extraction.

use std::path::Path;

use docx_rs::{DocumentChild, ParagraphChild, RunChild};
use tracing::debug;

use crate::error::ProcessingError;

/// Extract text from a DOCX file.
///
/// OCR of images embedded in DOCX is not implemented: when `ocr_requested`
/// is set the request still succeeds with whatever plain text is present.
pub fn extract_docx(path: &Path, ocr_requested: bool) -> Result<String, ProcessingError> {
    let data = std::fs::read(path)?;

    let doc = docx_rs::read_docx(&data).map_err(|e| ProcessingError::Extraction {
        format: "docx",
        source: Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e.to_string(),
        )),
    })?;

    let mut text = String::new();
    for child in doc.document.children {
        match child {
            DocumentChild::Paragraph(paragraph) => {
                for child in paragraph.children {
                    if let ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let RunChild::Text(t) = child {
                                text.push_str(&t.text);
                            }
                        }
                    }
                }
                text.push('\n');
            }
            // Tables and embedded objects are skipped
            _ => {}
        }
    }

    let text = text.trim_end().to_string();
    if text.is_empty() {
        debug!(path = %path.display(), "DOCX yielded no text; possibly image-based content");
    }
    if ocr_requested {
        debug!("OCR requested for DOCX, but OCR of embedded images is not implemented");
    }

    Ok(text)
}
