//! Knowledge 모듈 - FAQ 코퍼스
//!
//! - Corpus: 문서 + 임베딩 벡터 JSON 로드/저장, 스냅샷 교체
//! - Chunker: 한국어 문장 경계 인식 재귀 분할
//! - Builder: 파일 → 청크 → 임베딩 → 코퍼스
//! - Sample: 내장 늘봄학교 안내 문서

mod builder;
mod chunker;
mod corpus;
mod sample;

// Re-exports
pub use builder::{embed_chunks, BuildReport, CorpusBuilder, PendingChunk};
pub use chunker::{
    default_chunker, recursive_chunker, ChunkConfig, Chunker, RecursiveChunker,
    DEFAULT_SEPARATORS,
};
pub use corpus::{
    page_index, source_name, Corpus, CorpusHandle, CorpusStats, Document, Metadata,
};
pub use sample::{build_sample_corpus, sample_chunks};
