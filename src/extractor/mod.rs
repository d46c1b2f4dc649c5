//! 콘텐츠 추출 모듈
//!
//! 코퍼스 원본 파일에서 텍스트를 추출합니다.
//! - 텍스트 파일: 직접 읽기
//! - PDF 파일: pdf-extract로 페이지별 추출 후 정리

pub mod pdf;

use std::path::Path;

use anyhow::{Context, Result};

use crate::collector::FileType;

pub use pdf::clean_text;

// ============================================================================
// Extracted Content
// ============================================================================

/// 추출된 콘텐츠 (PDF는 페이지 단위)
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    /// 추출된 텍스트
    pub text: String,
    /// PDF 페이지 번호 (1부터 시작)
    pub page_number: Option<usize>,
}

// ============================================================================
// Content Extractor
// ============================================================================

/// 콘텐츠 추출기
#[derive(Debug, Default)]
pub struct ContentExtractor;

impl ContentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 파일에서 콘텐츠 추출
    pub async fn extract(&self, path: &Path, file_type: FileType) -> Result<Vec<ExtractedContent>> {
        match file_type {
            FileType::Text => self.extract_text(path).await,
            FileType::Pdf => self.extract_pdf(path).await,
        }
    }

    /// 텍스트 파일에서 추출
    async fn extract_text(&self, path: &Path) -> Result<Vec<ExtractedContent>> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read text file: {:?}", path))?;

        if text.trim().is_empty() {
            return Ok(vec![]);
        }

        Ok(vec![ExtractedContent {
            text,
            page_number: None,
        }])
    }

    /// PDF 파일에서 추출
    async fn extract_pdf(&self, path: &Path) -> Result<Vec<ExtractedContent>> {
        // PDF 추출은 CPU 바운드이므로 spawn_blocking 사용
        let path = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || pdf::extract_pages(&path))
            .await
            .context("PDF extraction task failed")??;

        Ok(pages
            .into_iter()
            .map(|(page_number, text)| ExtractedContent {
                text,
                page_number: Some(page_number),
            })
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_extract_text_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("faq.md");
        std::fs::write(&path, "# 늘봄학교\n\n운영시간 안내").unwrap();

        let contents = ContentExtractor::new()
            .extract(&path, FileType::Text)
            .await
            .unwrap();

        assert_eq!(contents.len(), 1);
        assert!(contents[0].text.contains("운영시간"));
        assert!(contents[0].page_number.is_none());
    }

    #[tokio::test]
    async fn test_extract_blank_text_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blank.txt");
        std::fs::write(&path, "  \n ").unwrap();

        let contents = ContentExtractor::new()
            .extract(&path, FileType::Text)
            .await
            .unwrap();
        assert!(contents.is_empty());
    }

    #[tokio::test]
    async fn test_extract_missing_file() {
        let result = ContentExtractor::new()
            .extract(Path::new("/nonexistent/faq.txt"), FileType::Text)
            .await;
        assert!(result.is_err());
    }
}
