//! neulbom-faq - 늘봄학교 FAQ 질의응답 시스템
//!
//! 로컬 코퍼스(문서 + 임베딩 벡터)를 코사인 유사도로 랭킹하고,
//! 상위 문서를 컨텍스트로 OpenAI 채팅 모델에 전달해 답변을 생성합니다.

pub mod chat;
pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod extractor;
pub mod knowledge;
pub mod ranker;

// Re-exports
pub use chat::{
    format_response, AssistantError, AssistantSettings, ChatProvider, ChatResponse, ChatSession,
    ChatState, FaqAssistant, OpenAiChat, Source,
};
pub use config::{get_data_dir, Config, API_KEY_ENV};
pub use embedding::{EmbeddingProvider, OpenAiEmbedding};
pub use knowledge::{
    default_chunker, recursive_chunker, ChunkConfig, Chunker, Corpus, CorpusBuilder,
    CorpusHandle, CorpusStats, Document,
};
pub use ranker::{confidence, cosine_similarity, rank, ConfidenceLevel, RankError, ScoredMatch};
