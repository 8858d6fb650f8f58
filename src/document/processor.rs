use chrono::{DateTime, Utc};
use pdf_extract::PlainTextOutput;
use std::panic::{self, AssertUnwindSafe};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::document::types::DocumentChunk;
use crate::error::{RagError, Result};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";

/// An uploaded document. Lives for the duration of one upload request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    pub content: String,
    pub chunks: Vec<DocumentChunk>,
    pub uploaded_at: DateTime<Utc>,
}

/// Turns uploaded bytes of a declared MIME type into text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentProcessor;

impl DocumentProcessor {
    pub fn new() -> Self {
        Self
    }

    pub async fn decode(&self, bytes: Vec<u8>, mime_type: &str) -> Result<String> {
        let mime = normalize_mime(mime_type);
        debug!(mime = %mime, size = bytes.len(), "decoding document");

        match mime.as_str() {
            MIME_PDF => {
                // The extractor is CPU bound and may panic on malformed input.
                tokio::task::spawn_blocking(move || extract_pdf_text(&bytes))
                    .await
                    .map_err(|e| RagError::Decode(format!("PDF extraction aborted: {}", e)))?
            }
            MIME_TEXT => Ok(match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => {
                    warn!("plain text upload is not valid UTF-8, decoding lossily");
                    String::from_utf8_lossy(e.as_bytes()).into_owned()
                }
            }),
            _ => Err(RagError::UnsupportedMediaType(mime_type.to_string())),
        }
    }

    pub fn create_document(&self, content: String, file_name: &str) -> Document {
        Document {
            id: Uuid::new_v4().to_string(),
            name: file_name.to_string(),
            content,
            chunks: Vec::new(),
            uploaded_at: Utc::now(),
        }
    }
}

/// Strip parameters such as `; charset=utf-8` and lower-case the type.
pub fn normalize_mime(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    let mut doc = pdf_extract::Document::load_mem(bytes)
        .map_err(|e| RagError::Decode(format!("failed to read PDF: {}", e)))?;
    if doc.is_encrypted() {
        doc.decrypt("")
            .map_err(|e| RagError::Decode(format!("failed to decrypt PDF: {}", e)))?;
    }

    let pages = doc.get_pages();
    debug!(pages = pages.len(), "extracting PDF text");
    let text = join_pages(pages.into_keys().map(|page| render_page(&doc, page)));
    if text.is_empty() {
        return Err(RagError::NoExtractableText);
    }
    Ok(text)
}

/// Plain text of one page, or `None` when the page cannot be decoded.
fn render_page(doc: &pdf_extract::Document, page: u32) -> Option<String> {
    let mut text = String::new();
    // The extractor panics on some malformed pages; losing one page must not lose the rest.
    let rendered = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::output_doc_page(doc, &mut PlainTextOutput::new(&mut text), page)
    }));

    match rendered {
        Ok(Ok(())) => Some(text),
        Ok(Err(e)) => {
            warn!(page, error = %e, "skipping undecodable PDF page");
            None
        }
        Err(_) => {
            warn!(page, "PDF page extraction panicked, skipping");
            None
        }
    }
}

/// Join decoded pages with newlines and trim the result. Failed pages are skipped.
fn join_pages<I>(pages: I) -> String
where
    I: IntoIterator<Item = Option<String>>,
{
    pages
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plain_text_is_returned_verbatim() {
        let processor = DocumentProcessor::new();
        let text = processor
            .decode(b"  The capital of France is Paris.\n".to_vec(), "text/plain")
            .await
            .unwrap();
        assert_eq!(text, "  The capital of France is Paris.\n");
    }

    #[tokio::test]
    async fn mime_parameters_are_ignored() {
        let processor = DocumentProcessor::new();
        let text = processor
            .decode(b"hi".to_vec(), "Text/Plain; charset=utf-8")
            .await
            .unwrap();
        assert_eq!(text, "hi");
    }

    #[tokio::test]
    async fn invalid_utf8_is_decoded_lossily() {
        let processor = DocumentProcessor::new();
        let text = processor
            .decode(vec![b'o', b'k', 0xff], MIME_TEXT)
            .await
            .unwrap();
        assert_eq!(text, "ok\u{fffd}");
    }

    #[tokio::test]
    async fn unsupported_types_are_rejected() {
        let processor = DocumentProcessor::new();
        let err = processor
            .decode(b"{}".to_vec(), "application/json")
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::UnsupportedMediaType(m) if m == "application/json"));
    }

    #[tokio::test]
    async fn garbage_pdf_fails_to_decode() {
        let processor = DocumentProcessor::new();
        let err = processor
            .decode(b"definitely not a pdf".to_vec(), MIME_PDF)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Decode(_)));
    }

    #[test]
    fn pages_are_joined_verbatim_and_failed_pages_skipped() {
        let pages = vec![
            Some(" first page ".to_string()),
            None,
            Some("   ".to_string()),
            Some("second page\n".to_string()),
        ];
        assert_eq!(join_pages(pages), "first page \n   \nsecond page");
        assert_eq!(
            join_pages(vec![Some("a".to_string()), Some("   ".to_string()), Some("b".to_string())]),
            "a\n   \nb"
        );
        assert_eq!(join_pages(vec![Some("\n\n".to_string()), None]), "");
    }

    /// A minimal PDF with one Helvetica text line per page; `None` leaves the page blank.
    fn pdf_fixture(pages: &[Option<&str>]) -> Vec<u8> {
        let page_count = pages.len();
        let kids: Vec<String> = (0..page_count).map(|i| format!("{} 0 R", 4 + 2 * i)).collect();
        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), page_count),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        ];
        for (i, line) in pages.iter().enumerate() {
            let content = line
                .map(|text| format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text))
                .unwrap_or_default();
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                5 + 2 * i
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
                content.len(),
                content
            ));
        }

        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref_at = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for offset in offsets {
            pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        pdf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref_at
            )
            .as_bytes(),
        );
        pdf
    }

    #[tokio::test]
    async fn pdf_pages_are_extracted_in_order() {
        let processor = DocumentProcessor::new();
        let bytes = pdf_fixture(&[Some("Paris is in France"), None, Some("Berlin is in Germany")]);

        let text = processor.decode(bytes, MIME_PDF).await.unwrap();

        let paris = text.find("Paris").expect("first page text");
        let berlin = text.find("Berlin").expect("third page text");
        assert!(paris < berlin);
        assert_eq!(text, text.trim());
    }

    #[tokio::test]
    async fn pdf_without_text_is_rejected() {
        let processor = DocumentProcessor::new();
        let err = processor
            .decode(pdf_fixture(&[None, None]), MIME_PDF)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::NoExtractableText));
    }

    #[test]
    fn created_documents_get_fresh_ids() {
        let processor = DocumentProcessor::new();
        let a = processor.create_document("x".into(), "a.txt");
        let b = processor.create_document("x".into(), "a.txt");
        assert_ne!(a.id, b.id);
        assert!(Uuid::parse_str(&a.id).is_ok());
        assert!(a.chunks.is_empty());
    }
}
