//! 채팅 세션
//!
//! 대화 상태를 `tokio::sync::watch` 채널로 게시합니다.
//! 표시 계층은 `subscribe()`로 받은 수신자에서 최신 상태만 읽으면 됩니다.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

use super::assistant::{format_response, AssistantError, ChatResponse, FaqAssistant, Source};

/// 메시지 발신자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// 대화 메시지
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub sender: Sender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// 봇 메시지의 신뢰도
    pub confidence: Option<u8>,
    /// 봇 메시지의 근거 문서
    pub sources: Vec<Source>,
}

impl Message {
    fn user(content: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: Sender::User,
            content: content.to_string(),
            timestamp: Utc::now(),
            confidence: None,
            sources: Vec::new(),
        }
    }

    fn bot(content: String, response: &ChatResponse) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: Sender::Bot,
            content,
            timestamp: Utc::now(),
            confidence: Some(response.confidence),
            sources: response.sources.clone(),
        }
    }
}

/// 세션 상태 스냅샷
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatState {
    pub messages: Vec<Message>,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// 채팅 세션
pub struct ChatSession {
    state: watch::Sender<ChatState>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ChatState::default());
        Self { state }
    }

    /// 상태 변경 수신자
    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.state.subscribe()
    }

    /// 현재 상태 복사본
    pub fn state(&self) -> ChatState {
        self.state.borrow().clone()
    }

    /// 질문 전송
    ///
    /// 사용자 메시지를 추가하고 로딩 상태로 바꾼 뒤, 답변을 봇 메시지로 추가하거나
    /// 에러를 기록합니다. 어느 쪽이든 끝나면 로딩 상태를 해제합니다.
    pub async fn send(
        &self,
        assistant: &FaqAssistant,
        question: &str,
    ) -> Result<ChatResponse, AssistantError> {
        self.state.send_modify(|state| {
            state.messages.push(Message::user(question));
            state.is_loading = true;
            state.error = None;
        });

        let result = assistant.answer(question).await;

        self.state.send_modify(|state| {
            match &result {
                Ok(response) => {
                    let settings = assistant.settings();
                    let content = format_response(
                        response,
                        settings.low_confidence_threshold,
                        settings.context_docs,
                    );
                    state.messages.push(Message::bot(content, response));
                }
                Err(e) => {
                    tracing::warn!("Chat error: {}", e);
                    state.error = Some(e.to_string());
                }
            }
            state.is_loading = false;
        });

        result
    }

    /// 대화 초기화
    pub fn clear(&self) {
        self.state.send_modify(|state| {
            state.messages.clear();
            state.error = None;
        });
    }
}
