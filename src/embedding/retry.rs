//! OpenAI 호출 공통 처리 - Rate Limiter + 재시도
//!
//! 임베딩과 채팅 클라이언트가 같은 정책을 공유합니다.
//! - 호출 간 최소 딜레이 + 분당 요청 수 제한
//! - 429 / 5xx / 전송 실패 시 지수 백오프 재시도

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Rate Limiter 설정 (분당 요청 수)
const RATE_LIMIT_RPM: u32 = 60;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
/// 호출 간 최소 딜레이 (1000ms = 60 RPM 준수)
const MIN_DELAY_MS: u64 = 1000;
/// 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 2000;

// ============================================================================
// Rate Limiter
// ============================================================================

/// Rate Limiter with minimum delay between requests
#[derive(Debug)]
pub(crate) struct RateLimiter {
    requests: Vec<Instant>,
    max_requests: u32,
    window: Duration,
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    pub(crate) fn new(max_requests: u32) -> Self {
        Self {
            requests: Vec::new(),
            max_requests,
            window: RATE_LIMIT_WINDOW,
            min_delay: Duration::from_millis(MIN_DELAY_MS),
            last_request: None,
        }
    }

    /// 공유 가능한 기본 Rate Limiter
    pub(crate) fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new(RATE_LIMIT_RPM)))
    }

    /// 요청 가능 여부 확인 및 대기
    pub(crate) async fn acquire(&mut self) {
        // 1. 최소 딜레이 적용 (버스트 방지)
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                let wait_time = self.min_delay - elapsed;
                tracing::debug!("Min delay: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        let now = Instant::now();

        // 2. 윈도우 밖의 오래된 요청 제거
        self.requests.retain(|&t| now.duration_since(t) < self.window);

        // 3. Rate limit 초과 시 대기
        if self.requests.len() >= self.max_requests as usize {
            if let Some(&oldest) = self.requests.first() {
                let wait_time = self.window.saturating_sub(now.duration_since(oldest));
                if !wait_time.is_zero() {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    tokio::time::sleep(wait_time).await;
                }
                let now = Instant::now();
                self.requests.retain(|&t| now.duration_since(t) < self.window);
            }
        }

        // 4. 현재 요청 기록
        let now = Instant::now();
        self.requests.push(now);
        self.last_request = Some(now);
    }
}

// ============================================================================
// Request with Retry
// ============================================================================

/// OpenAI 에러 응답
#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// 재시도 대상 상태 코드인지 (429, 5xx)
pub(crate) fn is_retryable(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}

/// n번째 재시도 전 대기 시간
pub(crate) fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt))
}

/// Bearer 인증 JSON POST (Rate limit + 재시도)
///
/// 성공 시 응답 본문을 역직렬화해 반환합니다.
pub(crate) async fn post_json<B, R>(
    client: &reqwest::Client,
    limiter: &Mutex<RateLimiter>,
    url: &str,
    api_key: &str,
    body: &B,
) -> Result<R>
where
    B: Serialize + ?Sized,
    R: serde::de::DeserializeOwned,
{
    let mut last_error: Option<anyhow::Error> = None;

    for attempt in 0..=MAX_RETRIES {
        // Rate limiting (매 시도마다)
        limiter.lock().await.acquire().await;

        let response = match client.post(url).bearer_auth(api_key).json(body).send().await {
            Ok(resp) => resp,
            Err(e) => {
                last_error = Some(anyhow::anyhow!("Failed to send request to {}: {}", url, e));
                if attempt < MAX_RETRIES {
                    let wait = backoff(attempt);
                    tracing::warn!(
                        "Request failed, retrying in {:?} (attempt {}/{})",
                        wait,
                        attempt + 1,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }
                break;
            }
        };

        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read response body")?;

        if status.is_success() {
            return serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse response from {}", url));
        }

        if is_retryable(status) {
            last_error = Some(anyhow::anyhow!("OpenAI API error ({})", status));
            if attempt < MAX_RETRIES {
                let wait = backoff(attempt);
                tracing::warn!(
                    "OpenAI API returned {}, backing off {:?} (attempt {}/{})",
                    status,
                    wait,
                    attempt + 1,
                    MAX_RETRIES
                );
                tokio::time::sleep(wait).await;
                continue;
            }
            break;
        }

        // 그 외 에러 - 즉시 실패
        if let Ok(error) = serde_json::from_str::<OpenAiError>(&text) {
            anyhow::bail!(
                "OpenAI API error ({}{}): {}",
                status,
                error
                    .error
                    .kind
                    .map(|k| format!(", {}", k))
                    .unwrap_or_default(),
                error.error.message
            );
        }
        anyhow::bail!("OpenAI API error ({}): {}", status, text);
    }

    Err(last_error
        .unwrap_or_else(|| anyhow::anyhow!("Request failed after {} retries", MAX_RETRIES)))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_status() {
        assert!(is_retryable(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(reqwest::StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(reqwest::StatusCode::UNAUTHORIZED));
        assert!(!is_retryable(reqwest::StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff(0), Duration::from_millis(2000));
        assert_eq!(backoff(1), Duration::from_millis(4000));
        assert_eq!(backoff(2), Duration::from_millis(8000));
    }

    #[tokio::test]
    async fn test_rate_limiter_records_requests() {
        let mut limiter = RateLimiter::new(10);
        limiter.min_delay = Duration::ZERO;
        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(limiter.requests.len(), 2);
        assert!(limiter.last_request.is_some());
    }
}
