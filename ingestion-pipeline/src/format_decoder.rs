//! Format decoding and validation (component B): turns arbitrary uploaded
//! bytes into UTF-8 text, gated by size, extension, MIME and magic-byte
//! checks performed in that order.

use common::error::AppError;
use common::hash::sha256_hex;
use common::storage::types::document::ChromeRemovalStats;

use crate::chrome_stripper;

pub const MAX_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024;

const PDF_MAGIC: &[u8] = b"%PDF";
const DOCX_MAGIC: &[u8] = b"PK\x03\x04";
const DOC_MAGIC: &[u8] = b"\xd0\xcf\x11\xe0\xa1\xb1\x1a\xe1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Pdf,
    Docx,
    Doc,
    Html,
    Markdown,
    Text,
}

impl FileFormat {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "doc" => Some(Self::Doc),
            "html" | "htm" => Some(Self::Html),
            "md" | "markdown" => Some(Self::Markdown),
            "txt" => Some(Self::Text),
            _ => None,
        }
    }

    fn allowed_mime_types(self) -> &'static [&'static str] {
        match self {
            Self::Pdf => &["application/pdf"],
            Self::Doc => &["application/msword"],
            Self::Docx => &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"],
            Self::Html => &["text/html"],
            Self::Markdown => &["text/markdown"],
            Self::Text => &["text/plain"],
        }
    }
}

pub struct DecodedDocument {
    pub filename: String,
    pub mime: String,
    pub text: String,
    pub content_hash: String,
    pub file_size: u64,
    pub chrome_removed: bool,
    pub chrome_removal_stats: Option<ChromeRemovalStats>,
}

/// Decodes `content` per the validation order: size, extension, declared
/// MIME, magic bytes; then extracts text in the format-appropriate way.
pub fn decode(filename: &str, content: &[u8], declared_mime: Option<&str>) -> Result<DecodedDocument, AppError> {
    let file_size = content.len() as u64;
    if file_size > MAX_FILE_SIZE_BYTES {
        return Err(AppError::Validation(format!(
            "file exceeds 50MB limit: {filename} ({:.1}MB)",
            file_size as f64 / (1024.0 * 1024.0)
        )));
    }

    let ext = extension_of(filename);
    let format = FileFormat::from_extension(&ext).ok_or_else(|| {
        AppError::Validation(format!(
            "invalid file format: {filename}. allowed formats: pdf, docx, doc, html, markdown, txt"
        ))
    })?;

    if let Some(declared) = declared_mime {
        if !format.allowed_mime_types().contains(&declared) {
            return Err(AppError::Validation(format!("invalid MIME type: {declared} for file {filename}")));
        }
    }

    validate_magic_bytes(filename, format, content)?;

    let (text, chrome_removed, chrome_removal_stats) = extract_text(filename, format, content)?;
    let content_hash = sha256_hex(&text);

    Ok(DecodedDocument {
        filename: filename.to_string(),
        mime: format.allowed_mime_types()[0].to_string(),
        text,
        content_hash,
        file_size,
        chrome_removed,
        chrome_removal_stats,
    })
}

fn extension_of(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase()
}

fn validate_magic_bytes(filename: &str, format: FileFormat, content: &[u8]) -> Result<(), AppError> {
    match format {
        FileFormat::Pdf if !content.starts_with(PDF_MAGIC) => {
            Err(AppError::Validation(format!("corrupted PDF file: {filename}")))
        }
        FileFormat::Docx if !content.starts_with(DOCX_MAGIC) => {
            Err(AppError::Validation(format!("corrupted DOCX file: {filename}")))
        }
        FileFormat::Doc if !content.starts_with(DOC_MAGIC) => {
            Err(AppError::Validation(format!("corrupted DOC file: {filename}")))
        }
        _ => Ok(()),
    }
}

fn extract_text(
    filename: &str,
    format: FileFormat,
    content: &[u8],
) -> Result<(String, bool, Option<ChromeRemovalStats>), AppError> {
    match format {
        FileFormat::Pdf => {
            let text = pdf_extract::extract_text_from_mem(content)
                .map_err(|err| AppError::Validation(format!("failed to extract text from {filename}: {err}")))?;
            Ok((text, false, None))
        }
        FileFormat::Docx => {
            let text = extract_docx_text(content)
                .map_err(|err| AppError::Validation(format!("failed to extract text from {filename}: {err}")))?;
            Ok((text, false, None))
        }
        FileFormat::Doc => Err(AppError::Validation(format!(
            "legacy .doc format not supported: {filename}. please convert to .docx format"
        ))),
        FileFormat::Html => {
            let html = std::str::from_utf8(content)
                .map_err(|err| AppError::Validation(format!("failed to decode {filename} as UTF-8: {err}")))?;
            let (cleaned_html, stats) = chrome_stripper::strip_chrome(html, filename);
            let text = html_to_text(&cleaned_html);
            Ok((text, true, Some(stats)))
        }
        FileFormat::Markdown => {
            let md_text = std::str::from_utf8(content)
                .map_err(|err| AppError::Validation(format!("failed to decode {filename} as UTF-8: {err}")))?;
            let html = markdown::to_html(md_text);
            let (cleaned_html, stats) = chrome_stripper::strip_chrome(&html, filename);
            let text = html_to_text(&cleaned_html);
            Ok((text, true, Some(stats)))
        }
        FileFormat::Text => {
            let text = String::from_utf8(content.to_vec())
                .map_err(|err| AppError::Validation(format!("failed to decode {filename} as UTF-8: {err}")))?;
            Ok((text, false, None))
        }
    }
}

fn extract_docx_text(content: &[u8]) -> Result<String, anyhow::Error> {
    let reader = std::io::Cursor::new(content);
    let mut archive = zip::ZipArchive::new(reader)?;
    let mut document_xml = String::new();
    {
        use std::io::Read;
        let mut entry = archive.by_name("word/document.xml")?;
        entry.read_to_string(&mut document_xml)?;
    }

    let mut reader = quick_xml::Reader::from_str(&document_xml);
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            quick_xml::events::Event::Start(tag) if tag.name().as_ref() == b"w:p" => {
                current.clear();
            }
            quick_xml::events::Event::End(tag) if tag.name().as_ref() == b"w:p" => {
                paragraphs.push(std::mem::take(&mut current));
            }
            quick_xml::events::Event::Text(text) => {
                current.push_str(&text.unescape()?);
            }
            quick_xml::events::Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs.join("\n\n"))
}

/// Strips tags from already chrome-stripped HTML and collapses whitespace,
/// mirroring the original's `get_text()` + blank-line cleanup.
fn html_to_text(html: &str) -> String {
    let fragment = scraper::Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect::<Vec<_>>().join("\n");
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_file() {
        let huge = vec![0u8; (MAX_FILE_SIZE_BYTES + 1) as usize];
        let err = decode("big.txt", &huge, None).unwrap_err();
        assert!(err.to_string().contains("50MB"));
    }

    #[test]
    fn rejects_unknown_extension() {
        let err = decode("file.exe", b"MZ", None).unwrap_err();
        assert!(err.to_string().contains("invalid file format"));
    }

    #[test]
    fn rejects_mismatched_mime() {
        let err = decode("file.txt", b"hello", Some("application/pdf")).unwrap_err();
        assert!(err.to_string().contains("invalid MIME type"));
    }

    #[test]
    fn rejects_corrupted_pdf_magic_bytes() {
        let err = decode("file.pdf", b"not a pdf", None).unwrap_err();
        assert!(err.to_string().contains("corrupted PDF"));
    }

    #[test]
    fn rejects_legacy_doc_format() {
        let err = decode("file.doc", DOC_MAGIC, None).unwrap_err();
        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn extracts_plain_text() {
        let decoded = decode("file.txt", b"hello world", None).expect("valid txt");
        assert_eq!(decoded.text, "hello world");
        assert!(!decoded.chrome_removed);
    }

    #[test]
    fn html_path_runs_chrome_stripper() {
        let html = b"<html><body><div class=\"gem-c-cookie-banner\">accept</div><main><p>Guidance</p></main></body></html>";
        let decoded = decode("file.html", html, None).expect("valid html");
        assert!(decoded.chrome_removed);
        assert!(decoded.text.contains("Guidance"));
        assert!(!decoded.text.contains("accept"));
    }

    #[test]
    fn markdown_is_rendered_then_delegated_to_html_path() {
        let md = b"# Heading\n\nSome **guidance** text.";
        let decoded = decode("file.md", md, None).expect("valid markdown");
        assert!(decoded.chrome_removed);
        assert!(decoded.text.contains("guidance"));
    }
}
