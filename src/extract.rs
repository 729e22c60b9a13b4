//! Plain-text extraction for uploaded documents.
//!
//! The format is chosen from the filename extension only (see
//! [`FileType::from_filename`]). PDF pages and DOCX paragraphs are joined
//! with a blank line; empty pages and paragraphs are dropped. Callers treat
//! an empty result as a failed ingestion.

use std::io::Read;

use quick_xml::events::Event;

use knowledge_core::models::FileType;
use knowledge_core::KnowledgeError;

/// Maximum decompressed bytes read from `word/document.xml` (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extracts UTF-8 text from a PDF or Word document.
///
/// Returns [`KnowledgeError::UnsupportedFormat`] for any other extension
/// and [`KnowledgeError::Extraction`] when the bytes cannot be parsed. May
/// return an empty string for image-only or empty documents.
pub fn extract_text(bytes: &[u8], filename: &str) -> Result<String, KnowledgeError> {
    match FileType::from_filename(filename)? {
        FileType::Pdf => extract_pdf(bytes),
        FileType::Docx => extract_docx(bytes),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, KnowledgeError> {
    let raw = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| KnowledgeError::Extraction(format!("PDF: {}", e)))?;

    // pdf-extract separates pages with form feeds.
    let pages: Vec<&str> = raw
        .split('\u{c}')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    Ok(pages.join("\n\n"))
}

fn extract_docx(bytes: &[u8]) -> Result<String, KnowledgeError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| KnowledgeError::Extraction(format!("DOCX: {}", e)))?;

    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| KnowledgeError::Extraction("DOCX: word/document.xml not found".to_string()))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| KnowledgeError::Extraction(format!("DOCX: {}", e)))?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(KnowledgeError::Extraction(
            "DOCX: word/document.xml exceeds size limit".to_string(),
        ));
    }

    let paragraphs = docx_paragraphs(&xml)?;
    Ok(paragraphs.join("\n\n"))
}

/// Collects the text runs of each `w:p`, trimmed, skipping empty paragraphs.
fn docx_paragraphs(xml: &[u8]) -> Result<Vec<String>, KnowledgeError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    // Runs are split mid-sentence; their edge whitespace is significant.
    reader.config_mut().trim_text(false);

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if matches!(e.local_name().as_ref(), b"tab" | b"br") {
                    current.push(' ');
                }
            }
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| KnowledgeError::Extraction(format!("DOCX: {}", e)))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let para = current.trim();
                    if !para.is_empty() {
                        paragraphs.push(para.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(KnowledgeError::Extraction(format!("DOCX: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}
