//! Ranker 모듈 - 로컬 유사도 랭킹
//!
//! 외부 벡터 DB를 쓰지 않고 메모리 코퍼스를 직접 랭킹합니다.
//!
//! - Similarity: 코사인 유사도 (f64 누적)
//! - Local: top-K 랭킹 + 신뢰도 점수
//! - Error: 차원 불일치 / 0 벡터 / 잘못된 인자

mod error;
mod local;
mod similarity;

// Re-exports
pub use error::RankError;
pub use local::{confidence, rank, ConfidenceLevel, ScoredMatch};
pub use similarity::cosine_similarity;
