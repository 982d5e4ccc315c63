use async_trait::async_trait;
use log::{debug, info, warn};
use mime_guess::from_path;
use pdf_extract::extract_text_from_mem_by_pages;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};

/// Magic bytes every PDF starts with
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Text extracted from one PDF page
#[derive(Debug, Clone)]
pub struct RawPage {
    /// 1-based page number
    pub page_number: i32,
    pub text: String,
}

/// A non-fatal problem hit while extracting one page
#[derive(Debug, Clone, serde::Serialize)]
pub struct PageIssue {
    pub page_number: i32,
    pub reason: String,
}

/// Check that an upload looks like a PDF, by file name and content
pub fn is_pdf(file_name: &str, bytes: &[u8]) -> bool {
    let mime = from_path(Path::new(file_name)).first_or_octet_stream();
    debug!("Detected MIME type for {}: {}", file_name, mime);
    mime.essence_str() == "application/pdf" && bytes.starts_with(PDF_MAGIC)
}

/// Extract per-page text from a PDF in memory.
///
/// A document that cannot be parsed at all fails with an extraction error;
/// individual pages without a text layer come back empty and are handled by
/// the caller (issue record or OCR fallback).
pub fn extract_pages(bytes: &[u8]) -> ServiceResult<Vec<RawPage>> {
    let pages = extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ServiceError::Extraction(format!("failed to parse PDF: {}", e)))?;

    info!("Extracted text from {} PDF pages", pages.len());

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, raw)| RawPage {
            page_number: (i + 1) as i32,
            text: normalize_whitespace(&raw),
        })
        .collect())
}

/// Normalize whitespace in text (remove multiple consecutive spaces, newlines, etc.)
pub fn normalize_whitespace(text: &str) -> String {
    // Replace multiple spaces with a single space
    let result = text.replace('\r', "");

    // Replace multiple consecutive newlines with double newlines (paragraph separator)
    let mut prev_char = ' ';
    let mut newline_count = 0;
    let mut normalized = String::with_capacity(result.len());

    for c in result.chars() {
        if c == '\n' {
            newline_count += 1;
        } else {
            if newline_count > 0 {
                // Add at most two newlines (paragraph break)
                if newline_count >= 2 {
                    normalized.push_str("\n\n");
                } else {
                    normalized.push('\n');
                }
                newline_count = 0;
            }

            // Don't add consecutive spaces
            if !(c == ' ' && prev_char == ' ') {
                normalized.push(c);
            }

            prev_char = c;
        }
    }

    // Handle trailing newlines
    if newline_count > 0 {
        if newline_count >= 2 {
            normalized.push_str("\n\n");
        } else {
            normalized.push('\n');
        }
    }

    normalized.trim().to_string()
}

/// Fallback used when a page has no extractable text layer
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize text on one page of the given PDF
    async fn recognize(&self, pdf: &[u8], page_number: i32, language: &str) -> ServiceResult<String>;
}

/// OCR via the external `tesseract` binary, rasterizing the page first with
/// `pdftoppm` (both must be on the host).
pub struct TesseractOcr {
    tesseract: PathBuf,
    work_dir: PathBuf,
}

impl TesseractOcr {
    pub fn new(tesseract: PathBuf, work_dir: PathBuf) -> Self {
        TesseractOcr {
            tesseract,
            work_dir,
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, pdf: &[u8], page_number: i32, language: &str) -> ServiceResult<String> {
        let stem = Uuid::new_v4().to_string();
        let pdf_path = self.work_dir.join(format!("{}.pdf", stem));
        let image_prefix = self.work_dir.join(&stem);
        let image_path = self.work_dir.join(format!("{}.png", stem));

        tokio::fs::write(&pdf_path, pdf).await?;

        let rasterize = Command::new("pdftoppm")
            .arg("-f")
            .arg(page_number.to_string())
            .arg("-l")
            .arg(page_number.to_string())
            .arg("-r")
            .arg("300")
            .arg("-singlefile")
            .arg("-png")
            .arg(&pdf_path)
            .arg(&image_prefix)
            .output()
            .await?;

        if !rasterize.status.success() {
            cleanup(&[&pdf_path, &image_path]).await;
            return Err(ServiceError::Extraction(format!(
                "pdftoppm failed on page {}: {}",
                page_number,
                String::from_utf8_lossy(&rasterize.stderr).trim()
            )));
        }

        let ocr = Command::new(&self.tesseract)
            .arg(&image_path)
            .arg("stdout")
            .arg("-l")
            .arg(tesseract_lang(language))
            .output()
            .await?;

        cleanup(&[&pdf_path, &image_path]).await;

        if !ocr.status.success() {
            return Err(ServiceError::Extraction(format!(
                "tesseract failed on page {}: {}",
                page_number,
                String::from_utf8_lossy(&ocr.stderr).trim()
            )));
        }

        let text = normalize_whitespace(&String::from_utf8_lossy(&ocr.stdout));
        if text.is_empty() {
            warn!("OCR produced no text for page {}", page_number);
        }

        Ok(text)
    }
}

async fn cleanup(paths: &[&Path]) {
    for path in paths {
        let _ = tokio::fs::remove_file(path).await;
    }
}

/// Map an ISO language code to tesseract's trained-data naming
fn tesseract_lang(code: &str) -> &'static str {
    match code {
        "ko" => "kor",
        "ja" => "jpn",
        "zh" => "chi_sim",
        _ => "eng",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        let text = "This  has   multiple    spaces.\n\n\nAnd multiple newlines.\r\nAnd Windows line endings.";
        let expected =
            "This has multiple spaces.\n\nAnd multiple newlines.\nAnd Windows line endings.";
        assert_eq!(normalize_whitespace(text), expected);
    }

    #[test]
    fn pdf_detection_requires_name_and_magic() {
        assert!(is_pdf("slides.pdf", b"%PDF-1.7 rest"));
        assert!(!is_pdf("slides.pdf", b"PK\x03\x04 zip content"));
        assert!(!is_pdf("notes.txt", b"%PDF-1.7 rest"));
    }

    #[test]
    fn tesseract_lang_falls_back_to_english() {
        assert_eq!(tesseract_lang("ko"), "kor");
        assert_eq!(tesseract_lang("de"), "eng");
    }
}
