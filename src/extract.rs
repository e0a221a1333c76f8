//! Document text extraction for uploads and corpus files.
//!
//! [`TextExtractor`] turns raw bytes plus a MIME type into plain UTF-8 text.
//! [`DocumentExtractor`] handles PDF, DOCX and plain text; anything else is
//! `UnsupportedFormat`. Parsing is CPU-bound and runs on the blocking pool.

use std::io::Read;

use async_trait::async_trait;

use crate::error::{Error, Result};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_TEXT: &str = "text/plain";

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// MIME type for a filename's extension, if it is one we can extract.
pub fn mime_from_filename(filename: &str) -> Option<&'static str> {
    let ext = std::path::Path::new(filename)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "docx" => Some(MIME_DOCX),
        "txt" | "md" => Some(MIME_TEXT),
        _ => None,
    }
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, bytes: Vec<u8>, mime_type: &str) -> Result<String>;
}

/// PDF via `pdf-extract`, DOCX via `zip` + `quick-xml`, and UTF-8 text.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentExtractor;

#[async_trait]
impl TextExtractor for DocumentExtractor {
    async fn extract(&self, bytes: Vec<u8>, mime_type: &str) -> Result<String> {
        let mime = mime_type.to_string();
        tokio::task::spawn_blocking(move || extract_text(&bytes, &mime))
            .await
            .map_err(|e| Error::ExtractionFailed(format!("extraction task failed: {}", e)))?
    }
}

/// Synchronous dispatch on the MIME type.
pub fn extract_text(bytes: &[u8], mime_type: &str) -> Result<String> {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        MIME_PDF => extract_pdf(bytes),
        MIME_DOCX => extract_docx(bytes),
        MIME_TEXT | "text/markdown" => String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::ExtractionFailed("text file is not valid UTF-8".to_string())),
        _ => Err(Error::UnsupportedFormat(mime_type.to_string())),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| Error::ExtractionFailed(format!("PDF: {}", e)))
}

fn docx_error(e: impl std::fmt::Display) -> Error {
    Error::ExtractionFailed(format!("DOCX: {}", e))
}

fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(docx_error)?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| docx_error("word/document.xml not found"))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(docx_error)?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(docx_error("word/document.xml exceeds size limit"));
    }
    paragraphs_text(&xml)
}

/// Collect `<w:t>` runs, one line per `<w:p>` paragraph.
fn paragraphs_text(xml: &[u8]) -> Result<String> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"tab" => out.push('\t'),
            Ok(Event::Text(te)) if in_text => {
                out.push_str(te.unescape().map_err(docx_error)?.as_ref());
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(docx_error(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}
