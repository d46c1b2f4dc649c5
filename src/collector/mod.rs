//! 파일 수집 모듈
//!
//! 코퍼스를 만들 원본 문서(텍스트, PDF)를 수집합니다.
//! .gitignore 패턴을 존중하고, 지원하는 확장자만 수집합니다.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;

// ============================================================================
// File Types
// ============================================================================

/// 지원하는 파일 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// 텍스트 파일 (마크다운, FAQ 텍스트 등)
    Text,
    /// PDF 파일 (안내서, 매뉴얼)
    Pdf,
}

impl FileType {
    /// 확장자로 파일 타입 결정
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "md" | "markdown" | "txt" | "csv" | "json" | "html" | "htm" => Some(FileType::Text),
            "pdf" => Some(FileType::Pdf),
            _ => None,
        }
    }

    /// 파일 경로에서 타입 결정
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// 표시용 약어
    pub fn tag(&self) -> &'static str {
        match self {
            FileType::Text => "TXT",
            FileType::Pdf => "PDF",
        }
    }
}

// ============================================================================
// Collected File
// ============================================================================

/// 수집된 파일 정보
#[derive(Debug, Clone)]
pub struct CollectedFile {
    /// 파일 절대 경로
    pub path: PathBuf,
    /// 파일 타입
    pub file_type: FileType,
    /// 파일 크기 (바이트)
    pub size: u64,
}

impl CollectedFile {
    /// 파일에서 CollectedFile 생성 (지원하지 않는 확장자면 None)
    pub fn from_path(path: PathBuf) -> Result<Option<Self>> {
        let file_type = match FileType::from_path(&path) {
            Some(ft) => ft,
            None => return Ok(None),
        };

        let metadata = std::fs::metadata(&path)
            .with_context(|| format!("Failed to read metadata: {:?}", path))?;

        if !metadata.is_file() {
            return Ok(None);
        }

        Ok(Some(Self {
            path,
            file_type,
            size: metadata.len(),
        }))
    }

    /// 파일 이름 (코퍼스 메타데이터 `source`로 사용)
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string()
    }
}

// ============================================================================
// File Collector
// ============================================================================

/// 파일 수집기 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// .gitignore 패턴 존중 여부
    pub respect_gitignore: bool,
    /// 숨김 파일 포함 여부
    pub include_hidden: bool,
    /// 최대 파일 크기 (바이트, 0이면 제한 없음)
    pub max_file_size: u64,
    /// PDF 파일 건너뛰기
    pub skip_pdfs: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            respect_gitignore: true,
            include_hidden: false,
            max_file_size: 10 * 1024 * 1024, // 10MB
            skip_pdfs: false,
        }
    }
}

/// 파일 수집기
pub struct FileCollector {
    config: CollectorConfig,
}

impl FileCollector {
    /// 새 수집기 생성
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    /// 기본 설정으로 수집기 생성
    pub fn with_defaults() -> Self {
        Self::new(CollectorConfig::default())
    }

    /// 단일 파일 수집
    pub fn collect_file(&self, path: &Path) -> Result<Option<CollectedFile>> {
        let abs_path = absolute(path)?;

        if !abs_path.is_file() {
            anyhow::bail!("File not found: {:?}", abs_path);
        }

        Ok(CollectedFile::from_path(abs_path)?.filter(|f| self.should_include(f)))
    }

    /// 폴더 재귀 수집 (경로 순 정렬)
    pub fn collect_directory(&self, path: &Path) -> Result<Vec<CollectedFile>> {
        let abs_path = absolute(path)?;

        if !abs_path.is_dir() {
            anyhow::bail!("Directory not found: {:?}", abs_path);
        }

        let mut files = Vec::new();

        let walker = WalkBuilder::new(&abs_path)
            .hidden(!self.config.include_hidden)
            .git_ignore(self.config.respect_gitignore)
            .git_global(self.config.respect_gitignore)
            .git_exclude(self.config.respect_gitignore)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }

            match CollectedFile::from_path(entry.path().to_path_buf()) {
                Ok(Some(file)) if self.should_include(&file) => files.push(file),
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to collect file: {}", e),
            }
        }

        // 코퍼스 문서 ID가 실행마다 같도록
        files.sort_by(|a, b| a.path.cmp(&b.path));

        tracing::info!("Collected {} files from {:?}", files.len(), abs_path);
        Ok(files)
    }

    /// 파일이 필터 조건을 만족하는지 확인
    fn should_include(&self, file: &CollectedFile) -> bool {
        if self.config.max_file_size > 0 && file.size > self.config.max_file_size {
            tracing::debug!("Skipping large file: {:?} ({} bytes)", file.path, file.size);
            return false;
        }

        !(self.config.skip_pdfs && file.file_type == FileType::Pdf)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// 수집 통계
#[derive(Debug, Default)]
pub struct CollectionStats {
    pub total_files: usize,
    pub text_files: usize,
    pub pdf_files: usize,
    pub total_size: u64,
}

impl CollectionStats {
    /// 수집된 파일 목록에서 통계 계산
    pub fn from_files(files: &[CollectedFile]) -> Self {
        let mut stats = Self::default();

        for file in files {
            stats.total_files += 1;
            stats.total_size += file.size;

            match file.file_type {
                FileType::Text => stats.text_files += 1,
                FileType::Pdf => stats.pdf_files += 1,
            }
        }

        stats
    }
}

// ============================================================================
// Tests
// ============================================================================
