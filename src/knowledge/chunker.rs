//! Text Chunking Module
//!
//! 한국어 문장 경계를 인식하는 재귀 문자 분할기입니다.
//! 큰 구분자(문단)부터 시도하고, 조각이 여전히 크면 더 작은 구분자로 내려갑니다.
//! 길이는 바이트가 아니라 문자 수로 셉니다.

use std::collections::VecDeque;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 기본 구분자 (우선순위 순)
///
/// 빈 문자열은 문자 단위 분할을 의미합니다.
pub const DEFAULT_SEPARATORS: &[&str] = &[
    "\n\n", // 문단
    "\n",   // 줄바꿈
    ".", "!", "?",
    "다.", "음.", "임.", // 한글 문장 끝
    " ",
    "",
];

/// 청킹 설정
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 최대 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 청크 간 오버랩 (문자 수)
    pub chunk_overlap: usize,
    /// 이보다 짧은 청크는 버림 (trim 후 문자 수)
    pub min_characters: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            min_characters: 50,
        }
    }
}

impl ChunkConfig {
    /// 설정 검증
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chunk_size == 0 {
            anyhow::bail!("chunk_size must be greater than zero");
        }
        if self.chunk_overlap >= self.chunk_size {
            anyhow::bail!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        Ok(())
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// RecursiveChunker
// ============================================================================

/// 재귀 문자 분할 청커
pub struct RecursiveChunker {
    config: ChunkConfig,
    separators: Vec<String>,
}

impl RecursiveChunker {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Self {
        Self {
            config,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// 기본 설정으로 생성
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    /// 재귀 분할
    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        // 텍스트에 존재하는 첫 구분자 선택 (없으면 마지막 구분자)
        let index = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep.as_str()))
            .unwrap_or(separators.len().saturating_sub(1));

        let separator = separators.get(index).map(String::as_str).unwrap_or("");
        let remaining = separators.get(index + 1..).unwrap_or(&[]);

        let mut chunks = Vec::new();
        let mut fitting: Vec<String> = Vec::new();

        for piece in split_keep_separator(text, separator) {
            if char_len(&piece) <= self.config.chunk_size {
                fitting.push(piece);
                continue;
            }

            // 큰 조각 앞까지 병합
            if !fitting.is_empty() {
                chunks.extend(self.merge_pieces(std::mem::take(&mut fitting)));
            }

            if remaining.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_recursive(&piece, remaining));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge_pieces(fitting));
        }

        chunks
    }

    /// 작은 조각들을 chunk_size 이하로 병합 (오버랩 유지)
    fn merge_pieces(&self, pieces: Vec<String>) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(String, usize)> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(&piece);

            if total + len > self.config.chunk_size && !window.is_empty() {
                push_trimmed(&mut chunks, &window);

                // 오버랩 크기 이하가 될 때까지 앞에서 제거
                while total > self.config.chunk_overlap
                    || (total + len > self.config.chunk_size && total > 0)
                {
                    match window.pop_front() {
                        Some((_, front_len)) => total -= front_len,
                        None => break,
                    }
                }
            }

            total += len;
            window.push_back((piece, len));
        }

        push_trimmed(&mut chunks, &window);
        chunks
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }

        let mut chunks = self.split_recursive(text, &self.separators);

        // 너무 짧은 청크 제거
        chunks.retain(|c| char_len(c.trim()) >= self.config.min_characters.max(1));
        chunks
    }

    fn name(&self) -> &'static str {
        "RecursiveChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 문자 수
#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// 구분자를 앞 조각 끝에 붙인 채로 분할
///
/// 빈 구분자는 문자 단위로 분할합니다.
fn split_keep_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    text.split_inclusive(separator)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// 윈도우 내용을 이어붙여 비어있지 않으면 추가
fn push_trimmed(chunks: &mut Vec<String>, window: &VecDeque<(String, usize)>) {
    let joined: String = window.iter().map(|(s, _)| s.as_str()).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 기본 청커 생성
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(RecursiveChunker::with_defaults())
}

/// 재귀 청커 생성 (설정 지정)
pub fn recursive_chunker(config: ChunkConfig) -> Box<dyn Chunker> {
    Box::new(RecursiveChunker::new(config))
}

// ============================================================================
// Tests
// ============================================================================
