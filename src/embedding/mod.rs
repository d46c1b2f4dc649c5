//! 임베딩 모듈 - OpenAI API를 통한 텍스트 벡터화
//!
//! 질문과 코퍼스 문서를 같은 모델로 벡터화해야 코사인 유사도가 의미를 갖습니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = OpenAiEmbedding::from_config(&config)?;
//! let embedding = embedder.embed("늘봄학교 운영시간은?").await?;
//! ```

mod retry;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::Config;

pub(crate) use retry::{post_json, RateLimiter};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수 (모르면 None)
    fn dimension(&self) -> Option<usize>;

    /// 프로바이더(모델) 이름
    fn name(&self) -> &str;
}

// ============================================================================
// OpenAI Embedding
// ============================================================================

/// 기본 임베딩 모델
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// 요청 한 번에 보내는 최대 입력 수
pub const MAX_BATCH_SIZE: usize = 100;

/// OpenAI 임베딩 구현체
#[derive(Debug)]
pub struct OpenAiEmbedding {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

/// 임베딩 요청 본문
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// 임베딩 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedding {
    /// 새 인스턴스 생성
    ///
    /// # Arguments
    /// * `api_key` - OpenAI API 키
    /// * `base_url` - API 베이스 URL (끝의 `/`는 무시)
    /// * `model` - 임베딩 모델 이름
    pub fn new(api_key: String, base_url: &str, model: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            rate_limiter: RateLimiter::shared(),
        })
    }

    /// 설정에서 생성 (API 키 필수)
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.require_api_key()?;
        Self::new(api_key.to_string(), &config.base_url, &config.embedding_model)
    }

    /// 배치 하나 요청 (입력 순서대로 정렬해 반환)
    async fn request(&self, input: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbedRequest {
            model: &self.model,
            input,
        };

        let response: EmbedResponse =
            post_json(&self.client, &self.rate_limiter, &url, &self.api_key, &request).await?;

        if response.data.len() != input.len() {
            anyhow::bail!(
                "Embedding count mismatch: sent {}, received {}",
                input.len(),
                response.data.len()
            );
        }

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            anyhow::bail!("Cannot embed empty text");
        }

        self.request(&[text.to_string()])
            .await?
            .pop()
            .context("Embedding response was empty")
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        let total_batches = texts.len().div_ceil(MAX_BATCH_SIZE);

        for (i, batch) in texts.chunks(MAX_BATCH_SIZE).enumerate() {
            tracing::debug!("Embedding batch {}/{}", i + 1, total_batches);
            results.extend(self.request(batch).await?);
        }

        Ok(results)
    }

    fn dimension(&self) -> Option<usize> {
        known_dimension(&self.model)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// 알려진 OpenAI 임베딩 모델의 차원
pub fn known_dimension(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
