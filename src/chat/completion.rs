//! 채팅 완성 프로바이더 - OpenAI Chat Completions
//!
//! 임베딩 클라이언트와 같은 Rate Limiter / 재시도 정책을 사용합니다.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::embedding::{post_json, RateLimiter};

/// 완성 결과가 비었을 때 반환하는 문구
pub const EMPTY_COMPLETION_FALLBACK: &str = "답변을 생성할 수 없습니다.";

// ============================================================================
// Messages
// ============================================================================

/// 메시지 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// 채팅 메시지 (API 요청용)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

// ============================================================================
// ChatProvider Trait
// ============================================================================

/// 채팅 완성 프로바이더 트레이트
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// 메시지 목록으로 응답 생성
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// 모델 이름
    fn name(&self) -> &str;
}

// ============================================================================
// OpenAI Chat
// ============================================================================

/// OpenAI 채팅 구현체
#[derive(Debug)]
pub struct OpenAiChat {
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionResponse {
    /// 첫 번째 선택지의 본문 (비었으면 대체 문구)
    fn into_answer(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| EMPTY_COMPLETION_FALLBACK.to_string())
    }
}

impl OpenAiChat {
    /// 새 인스턴스 생성
    pub fn new(
        api_key: String,
        base_url: &str,
        model: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature,
            max_tokens,
            client,
            rate_limiter: RateLimiter::shared(),
        })
    }

    /// 설정에서 생성 (API 키 필수)
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.require_api_key()?;
        Self::new(
            api_key.to_string(),
            &config.base_url,
            &config.chat_model,
            config.temperature,
            config.max_tokens,
        )
    }
}

#[async_trait]
impl ChatProvider for OpenAiChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response: CompletionResponse =
            post_json(&self.client, &self.rate_limiter, &url, &self.api_key, &request).await?;

        Ok(response.into_answer())
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let messages = vec![ChatMessage::system("시스템"), ChatMessage::user("질문")];
        let request = CompletionRequest {
            model: "gpt-3.5-turbo",
            messages: &messages,
            temperature: 0.7,
            max_tokens: 1000,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "질문");
        assert_eq!(json["max_tokens"], 1000);
    }

    #[test]
    fn test_response_answer_trimmed() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  운영시간은 오전 7시부터입니다. \n"}}]}"#;
        let response: CompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.into_answer(), "운영시간은 오전 7시부터입니다.");
    }

    #[test]
    fn test_empty_response_fallback() {
        let empty: CompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(empty.into_answer(), EMPTY_COMPLETION_FALLBACK);

        let null: CompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert_eq!(null.into_answer(), EMPTY_COMPLETION_FALLBACK);
    }

    #[test]
    fn test_from_config_requires_key() {
        assert!(OpenAiChat::from_config(&Config::default()).is_err());
    }
}
