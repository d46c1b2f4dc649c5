//! Chat 모듈 - 질문 처리
//!
//! - Completion: ChatProvider 트레이트 + OpenAI 구현
//! - Prompt: 시스템 프롬프트, 컨텍스트 구성
//! - Assistant: 검증 → 임베딩 → 랭킹 → 생성
//! - Session: watch 채널 기반 대화 상태

mod assistant;
mod completion;
mod prompt;
mod session;

// Re-exports
pub use assistant::{
    format_response, AssistantError, AssistantSettings, ChatResponse, FaqAssistant, Retrieval,
    Source, INVALID_QUESTION_MESSAGE, LOW_CONFIDENCE_NOTICE,
};
pub use completion::{ChatMessage, ChatProvider, OpenAiChat, Role, EMPTY_COMPLETION_FALLBACK};
pub use prompt::{build_context, build_messages, user_content, NO_CONTEXT, SYSTEM_PROMPT};
pub use session::{ChatSession, ChatState, Message, Sender};
