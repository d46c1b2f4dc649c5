//! FAQ 어시스턴트
//!
//! 질문 검증 → 질문 임베딩 → 코퍼스 랭킹 → 프롬프트 구성 → 답변 생성.
//! 코퍼스는 질문마다 스냅샷을 잡아 사용하므로 도중에 교체되어도 한 질문은
//! 하나의 코퍼스만 봅니다.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use super::completion::ChatProvider;
use super::prompt::{build_context, build_messages};
use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::knowledge::{page_index, source_name, Corpus, CorpusHandle, Metadata};
use crate::ranker::{self, ConfidenceLevel, RankError, ScoredMatch};

/// 부적절한 질문 안내 문구
pub const INVALID_QUESTION_MESSAGE: &str =
    "메시지가 올바르지 않습니다. 늘봄학교 업무 관련 질문을 해주세요.";
/// 저신뢰 안내 문구
pub const LOW_CONFIDENCE_NOTICE: &str =
    "⚠️ 이 답변의 신뢰도가 낮습니다. 정확한 정보는 담당자에게 문의해주세요.";

// ============================================================================
// Errors
// ============================================================================

/// 질문 처리 에러
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("{0}")]
    InvalidQuestion(String),

    #[error("검색 실패: {0}")]
    Rank(#[from] RankError),

    #[error("질문 임베딩 실패: {0:#}")]
    Embedding(anyhow::Error),

    #[error("답변 생성 실패: {0:#}")]
    Generation(anyhow::Error),
}

// ============================================================================
// Settings
// ============================================================================

/// 질문 처리 설정
#[derive(Debug, Clone)]
pub struct AssistantSettings {
    pub top_k: usize,
    pub context_docs: usize,
    pub low_confidence_threshold: u8,
    pub min_similarity: Option<f64>,
    pub max_question_chars: usize,
    pub blocked_words: Vec<String>,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for AssistantSettings {
    fn from(config: &Config) -> Self {
        Self {
            top_k: config.top_k,
            context_docs: config.context_docs,
            low_confidence_threshold: config.low_confidence_threshold,
            min_similarity: config.min_similarity,
            max_question_chars: config.max_question_chars,
            blocked_words: config
                .blocked_words
                .iter()
                .map(|w| w.to_lowercase())
                .collect(),
        }
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// 답변 근거 문서 (코퍼스와 독립된 복사본)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub similarity: f64,
}

impl Source {
    fn from_match(m: &ScoredMatch<'_>) -> Self {
        Self {
            id: m.document.id.clone(),
            text: m.document.text.clone(),
            metadata: m.document.metadata.clone(),
            similarity: m.similarity,
        }
    }

    /// 표시용 출처 (`source` → `file_name` 순)
    pub fn name(&self) -> Option<&str> {
        source_name(&self.metadata)
    }

    /// 1부터 시작하는 페이지 번호
    pub fn display_page(&self) -> Option<u64> {
        page_index(&self.metadata).map(|p| p + 1)
    }
}

/// 검색 결과 (생성 전 단계)
#[derive(Debug, Clone, Serialize)]
pub struct Retrieval {
    pub sources: Vec<Source>,
    pub confidence: u8,
}

impl Retrieval {
    pub fn level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_score(self.confidence)
    }
}

/// 최종 답변
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub confidence: u8,
}

impl ChatResponse {
    pub fn level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_score(self.confidence)
    }
}

// ============================================================================
// FaqAssistant
// ============================================================================

/// FAQ 어시스턴트
pub struct FaqAssistant {
    embedder: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatProvider>,
    corpus: Arc<CorpusHandle>,
    settings: AssistantSettings,
}

impl FaqAssistant {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatProvider>,
        corpus: Arc<CorpusHandle>,
        settings: AssistantSettings,
    ) -> Self {
        Self {
            embedder,
            chat,
            corpus,
            settings,
        }
    }

    pub fn settings(&self) -> &AssistantSettings {
        &self.settings
    }

    /// 코퍼스 핸들 (재로드용)
    pub fn corpus(&self) -> &Arc<CorpusHandle> {
        &self.corpus
    }

    /// 질문 검증 (앞뒤 공백 제거 후 반환)
    pub fn validate_question<'q>(&self, question: &'q str) -> Result<&'q str, AssistantError> {
        let trimmed = question.trim();

        if trimmed.is_empty() {
            return Err(AssistantError::InvalidQuestion(
                "질문을 입력해주세요.".to_string(),
            ));
        }

        let length = trimmed.chars().count();
        if length > self.settings.max_question_chars {
            return Err(AssistantError::InvalidQuestion(format!(
                "질문은 {}자 이하로 입력해주세요. (현재 {}자)",
                self.settings.max_question_chars, length
            )));
        }

        let lowered = trimmed.to_lowercase();
        if self
            .settings
            .blocked_words
            .iter()
            .any(|word| !word.is_empty() && lowered.contains(word.as_str()))
        {
            return Err(AssistantError::InvalidQuestion(
                INVALID_QUESTION_MESSAGE.to_string(),
            ));
        }

        Ok(trimmed)
    }

    /// 질문과 관련된 문서 검색 (답변 생성 없음)
    pub async fn retrieve(&self, question: &str) -> Result<Retrieval, AssistantError> {
        let question = self.validate_question(question)?;
        let vector = self.embed_question(question).await?;

        let corpus = self.corpus.snapshot();
        let matches = self.rank_in(&corpus, &vector)?;

        Ok(Retrieval {
            confidence: ranker::confidence(&matches),
            sources: matches.iter().map(Source::from_match).collect(),
        })
    }

    /// 질문에 답변
    pub async fn answer(&self, question: &str) -> Result<ChatResponse, AssistantError> {
        let question = self.validate_question(question)?;
        let vector = self.embed_question(question).await?;

        let (messages, sources, confidence) = {
            let corpus = self.corpus.snapshot();
            let matches = self.rank_in(&corpus, &vector)?;

            let context = build_context(
                matches.iter().map(|m| m.document),
                self.settings.context_docs,
            );

            (
                build_messages(&context, question),
                matches.iter().map(Source::from_match).collect::<Vec<_>>(),
                ranker::confidence(&matches),
            )
        };

        tracing::debug!(
            "Generating answer with {} sources (confidence {})",
            sources.len(),
            confidence
        );

        let answer = self
            .chat
            .complete(&messages)
            .await
            .map_err(AssistantError::Generation)?;

        Ok(ChatResponse {
            answer,
            sources,
            confidence,
        })
    }

    async fn embed_question(&self, question: &str) -> Result<Vec<f32>, AssistantError> {
        self.embedder
            .embed(question)
            .await
            .map_err(AssistantError::Embedding)
    }

    /// 랭킹 + 유사도 하한 필터
    fn rank_in<'a>(
        &self,
        corpus: &'a Corpus,
        vector: &[f32],
    ) -> Result<Vec<ScoredMatch<'a>>, RankError> {
        let mut matches = corpus.rank(vector, self.settings.top_k)?;

        if let Some(min) = self.settings.min_similarity {
            let before = matches.len();
            matches.retain(|m| m.similarity >= min);
            if matches.len() < before {
                tracing::debug!(
                    "Dropped {} matches below similarity {}",
                    before - matches.len(),
                    min
                );
            }
        }

        Ok(matches)
    }
}

// ============================================================================
// Formatting
// ============================================================================

/// 사용자에게 보여줄 답변 문자열
///
/// 신뢰도가 `threshold` 미만이면 안내 문구를, 근거 문서가 있으면
/// 최대 `context_docs`개의 출처 목록을 덧붙입니다.
pub fn format_response(response: &ChatResponse, threshold: u8, context_docs: usize) -> String {
    let mut formatted = response.answer.clone();

    if response.confidence < threshold {
        formatted.push_str("\n\n");
        formatted.push_str(LOW_CONFIDENCE_NOTICE);
    }

    if !response.sources.is_empty() && context_docs > 0 {
        formatted.push_str("\n\n📚 참고 자료:");
        for (i, source) in response.sources.iter().take(context_docs).enumerate() {
            let name = source
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("문서 {}", i + 1));

            match source.display_page() {
                Some(page) => formatted.push_str(&format!("\n• {} (페이지: {})", name, page)),
                None => formatted.push_str(&format!("\n• {}", name)),
            }
        }
    }

    formatted
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::chat::completion::{ChatMessage, Role};
    use crate::knowledge::Document;
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// 고정 벡터를 돌려주는 임베더
    pub(crate) struct FixedEmbedder {
        pub vectors: HashMap<String, Vec<f32>>,
        pub fallback: Vec<f32>,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(self
                .vectors
                .get(text)
                .cloned()
                .unwrap_or_else(|| self.fallback.clone()))
        }

        fn dimension(&self) -> Option<usize> {
            Some(self.fallback.len())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            anyhow::bail!("network down")
        }

        fn dimension(&self) -> Option<usize> {
            None
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// 받은 메시지를 기록하고 고정 답변을 돌려주는 채팅 프로바이더
    pub(crate) struct RecordingChat {
        pub reply: String,
        pub received: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl RecordingChat {
        pub(crate) fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                received: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatProvider for RecordingChat {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            self.received.lock().unwrap().push(messages.to_vec());
            Ok(self.reply.clone())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    pub(crate) fn sample_corpus() -> Corpus {
        Corpus::new(
            vec![
                Document::new(
                    "0",
                    "늘봄학교는 오전 7시부터 오후 8시까지 운영합니다.",
                    vec![1.0, 0.0, 0.0],
                )
                .with_metadata("source", "운영 지침")
                .with_metadata("category", "운영시간"),
                Document::new("1", "급식은 영양사가 관리합니다.", vec![0.0, 1.0, 0.0])
                    .with_metadata("source", "급식 관리"),
                Document::new("2", "방학 중에는 오전 9시부터 운영합니다.", vec![0.9, 0.1, 0.0])
                    .with_metadata("source", "늘봄 안내.pdf")
                    .with_metadata("page", 4),
            ],
            Some("fixed".to_string()),
        )
        .unwrap()
    }

    pub(crate) fn assistant_with(
        chat: Arc<dyn ChatProvider>,
        settings: AssistantSettings,
    ) -> FaqAssistant {
        let embedder = FixedEmbedder {
            vectors: HashMap::from([("운영시간은?".to_string(), vec![1.0, 0.0, 0.0])]),
            fallback: vec![0.0, 0.0, 1.0],
        };
        FaqAssistant::new(
            Arc::new(embedder),
            chat,
            Arc::new(CorpusHandle::new(sample_corpus())),
            settings,
        )
    }

    fn settings(top_k: usize) -> AssistantSettings {
        AssistantSettings {
            top_k,
            blocked_words: vec!["욕설".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_answer_builds_prompt_from_top_matches() {
        let chat = Arc::new(RecordingChat::new("오전 7시부터 운영합니다."));
        let assistant = assistant_with(chat.clone(), settings(2));

        let response = assistant.answer("  운영시간은?  ").await.unwrap();

        assert_eq!(response.answer, "오전 7시부터 운영합니다.");
        assert_eq!(response.sources.len(), 2);
        assert_eq!(response.sources[0].id, "0");
        assert_eq!(response.sources[1].id, "2");
        assert_eq!(response.confidence, 100);
        assert_eq!(response.level(), ConfidenceLevel::High);

        let received = chat.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        let messages = &received[0];
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[1].content.starts_with("컨텍스트: [운영 지침] 늘봄학교는"));
        assert!(messages[1].content.contains("[늘봄 안내.pdf] 방학 중에는"));
        assert!(messages[1].content.ends_with("질문: 운영시간은?"));
    }

    #[tokio::test]
    async fn test_retrieve_without_generation() {
        let chat = Arc::new(RecordingChat::new("unused"));
        let assistant = assistant_with(chat.clone(), settings(3));

        let retrieval = assistant.retrieve("운영시간은?").await.unwrap();
        assert_eq!(retrieval.sources.len(), 3);
        assert_eq!(retrieval.sources[2].id, "1");
        // (1.0 + 0.9939 + 0.0) / 3 ≈ 66.5
        assert_eq!(retrieval.confidence, 66);
        assert_eq!(retrieval.level(), ConfidenceLevel::Medium);
        assert!(chat.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_min_similarity_filter() {
        let chat = Arc::new(RecordingChat::new("답"));
        let assistant = assistant_with(
            chat,
            AssistantSettings {
                top_k: 3,
                min_similarity: Some(0.5),
                ..Default::default()
            },
        );

        let retrieval = assistant.retrieve("운영시간은?").await.unwrap();
        let ids: Vec<&str> = retrieval.sources.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "2"]);
        assert_eq!(retrieval.confidence, 100);
    }

    #[tokio::test]
    async fn test_invalid_questions() {
        let chat = Arc::new(RecordingChat::new("답"));
        let assistant = assistant_with(chat.clone(), settings(3));

        assert!(matches!(
            assistant.answer("   ").await,
            Err(AssistantError::InvalidQuestion(_))
        ));
        assert!(matches!(
            assistant.answer(&"가".repeat(1001)).await,
            Err(AssistantError::InvalidQuestion(_))
        ));
        match assistant.answer("이건 욕설 입니다").await {
            Err(AssistantError::InvalidQuestion(msg)) => {
                assert_eq!(msg, INVALID_QUESTION_MESSAGE)
            }
            other => panic!("unexpected: {:?}", other.map(|r| r.answer)),
        }
        assert!(chat.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_degenerate_query_vector() {
        let embedder = FixedEmbedder {
            vectors: HashMap::new(),
            fallback: vec![0.0, 0.0, 0.0],
        };
        let assistant = FaqAssistant::new(
            Arc::new(embedder),
            Arc::new(RecordingChat::new("답")),
            Arc::new(CorpusHandle::new(sample_corpus())),
            settings(3),
        );

        let err = assistant.answer("아무 질문").await.unwrap_err();
        assert!(matches!(
            err,
            AssistantError::Rank(RankError::DegenerateVector { document_id: None })
        ));
    }

    #[tokio::test]
    async fn test_embedding_failure() {
        let assistant = FaqAssistant::new(
            Arc::new(FailingEmbedder),
            Arc::new(RecordingChat::new("답")),
            Arc::new(CorpusHandle::new(sample_corpus())),
            settings(3),
        );

        let err = assistant.retrieve("운영시간은?").await.unwrap_err();
        assert!(matches!(err, AssistantError::Embedding(_)));
        assert!(err.to_string().contains("network down"));
    }

    #[tokio::test]
    async fn test_empty_corpus_answers_without_context() {
        let chat = Arc::new(RecordingChat::new("관련 정보가 없습니다."));
        let assistant = FaqAssistant::new(
            Arc::new(FixedEmbedder {
                vectors: HashMap::new(),
                fallback: vec![1.0, 0.0],
            }),
            chat.clone(),
            Arc::new(CorpusHandle::new(Corpus::empty())),
            settings(3),
        );

        let response = assistant.answer("운영시간은?").await.unwrap();
        assert!(response.sources.is_empty());
        assert_eq!(response.confidence, 0);

        let received = chat.received.lock().unwrap();
        assert!(received[0][1].content.contains("관련 문서를 찾을 수 없습니다."));
    }

    #[test]
    fn test_format_response_with_sources_and_disclaimer() {
        let response = ChatResponse {
            answer: "답변입니다.".to_string(),
            sources: vec![
                Source {
                    id: "0".to_string(),
                    text: "a".to_string(),
                    metadata: Metadata::from([("source".to_string(), Value::from("운영 지침"))]),
                    similarity: 0.4,
                },
                Source {
                    id: "1".to_string(),
                    text: "b".to_string(),
                    metadata: Metadata::from([
                        ("source".to_string(), Value::from("안내.pdf")),
                        ("page".to_string(), Value::from(4)),
                    ]),
                    similarity: 0.3,
                },
                Source {
                    id: "2".to_string(),
                    text: "c".to_string(),
                    metadata: Metadata::new(),
                    similarity: 0.2,
                },
                Source {
                    id: "3".to_string(),
                    text: "d".to_string(),
                    metadata: Metadata::new(),
                    similarity: 0.1,
                },
            ],
            confidence: 25,
        };

        let formatted = format_response(&response, 50, 3);
        assert_eq!(
            formatted,
            "답변입니다.\n\n⚠️ 이 답변의 신뢰도가 낮습니다. 정확한 정보는 담당자에게 문의해주세요.\
             \n\n📚 참고 자료:\n• 운영 지침\n• 안내.pdf (페이지: 5)\n• 문서 3"
        );
    }

    #[test]
    fn test_format_response_confident_without_sources() {
        let response = ChatResponse {
            answer: "답변".to_string(),
            sources: vec![],
            confidence: 50,
        };
        assert_eq!(format_response(&response, 50, 3), "답변");
    }
}
