//! 설정 모듈
//!
//! 환경변수(및 `.env`)에서 설정을 읽습니다. CLI 플래그가 있으면 그 값이 우선합니다.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::embedding::DEFAULT_EMBEDDING_MODEL;

/// API 키 환경변수 이름
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
/// 기본 OpenAI API 베이스 URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// 기본 채팅 모델
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

/// 데이터 디렉토리 경로 반환
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".neulbom-faq")
}

/// 기본 코퍼스 파일 경로
pub fn default_corpus_path() -> PathBuf {
    get_data_dir().join("corpus.json")
}

// ============================================================================
// Config
// ============================================================================

/// 실행 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenAI API 키 (임베딩/채팅에만 필요)
    pub api_key: Option<String>,
    /// API 베이스 URL
    pub base_url: String,
    /// 코퍼스 JSON 경로
    pub corpus_path: PathBuf,
    /// 임베딩 모델
    pub embedding_model: String,
    /// 채팅 모델
    pub chat_model: String,
    /// 샘플링 온도
    pub temperature: f32,
    /// 응답 최대 토큰
    pub max_tokens: u32,
    /// 질문당 검색할 문서 수
    pub top_k: usize,
    /// 프롬프트/출처에 넣을 문서 수
    pub context_docs: usize,
    /// 이 값 미만이면 저신뢰 안내 문구 추가
    pub low_confidence_threshold: u8,
    /// 유사도 하한 (없으면 필터링 안 함)
    pub min_similarity: Option<f64>,
    /// 질문 최대 길이 (문자 수)
    pub max_question_chars: usize,
    /// 금지어 목록
    pub blocked_words: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            corpus_path: default_corpus_path(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            top_k: 5,
            context_docs: 3,
            low_confidence_threshold: 50,
            min_similarity: None,
            max_question_chars: 1000,
            blocked_words: Vec::new(),
        }
    }
}

impl Config {
    /// `.env`를 읽은 뒤 환경변수에서 설정 생성
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {:?}", path);
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 조회 함수로 설정 생성
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let defaults = Self::default();

        let config = Self {
            api_key: get(API_KEY_ENV),
            base_url: get("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            corpus_path: get("NEULBOM_CORPUS")
                .map(PathBuf::from)
                .unwrap_or(defaults.corpus_path),
            embedding_model: get("NEULBOM_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            chat_model: get("NEULBOM_CHAT_MODEL").unwrap_or(defaults.chat_model),
            temperature: parse_var(&get, "NEULBOM_TEMPERATURE")?.unwrap_or(defaults.temperature),
            max_tokens: parse_var(&get, "NEULBOM_MAX_TOKENS")?.unwrap_or(defaults.max_tokens),
            top_k: parse_var(&get, "NEULBOM_TOP_K")?.unwrap_or(defaults.top_k),
            context_docs: parse_var(&get, "NEULBOM_CONTEXT_DOCS")?
                .unwrap_or(defaults.context_docs),
            low_confidence_threshold: parse_var(&get, "NEULBOM_LOW_CONFIDENCE")?
                .unwrap_or(defaults.low_confidence_threshold),
            min_similarity: parse_var(&get, "NEULBOM_MIN_SIMILARITY")?,
            max_question_chars: parse_var(&get, "NEULBOM_MAX_QUESTION_CHARS")?
                .unwrap_or(defaults.max_question_chars),
            blocked_words: get("NEULBOM_BLOCKED_WORDS")
                .map(|v| parse_word_list(&v))
                .unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// 값 범위 검증
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            anyhow::bail!("NEULBOM_TOP_K must be at least 1");
        }
        if self.context_docs == 0 {
            anyhow::bail!("NEULBOM_CONTEXT_DOCS must be at least 1");
        }
        if self.low_confidence_threshold > 100 {
            anyhow::bail!("NEULBOM_LOW_CONFIDENCE must be between 0 and 100");
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            anyhow::bail!("NEULBOM_TEMPERATURE must be between 0.0 and 2.0");
        }
        if let Some(min) = self.min_similarity {
            if !(-1.0..=1.0).contains(&min) {
                anyhow::bail!("NEULBOM_MIN_SIMILARITY must be between -1.0 and 1.0");
            }
        }
        if self.max_question_chars == 0 {
            anyhow::bail!("NEULBOM_MAX_QUESTION_CHARS must be at least 1");
        }
        Ok(())
    }

    /// API 키 (없으면 에러)
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().with_context(|| {
            format!(
                "{} not set.\n\
                 Set: export {}=your-api-key (or add it to .env)\n\
                 Get your API key at: https://platform.openai.com/api-keys",
                API_KEY_ENV, API_KEY_ENV
            )
        })
    }

    /// API 키 설정 여부
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

/// 숫자 환경변수 파싱 (실패 시 변수 이름을 포함한 에러)
fn parse_var<T, G>(get: &G, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: '{}' ({})", key, raw, e)),
        None => Ok(None),
    }
}

/// 쉼표로 구분된 단어 목록
fn parse_word_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
