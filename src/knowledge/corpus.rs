//! Corpus - 정적 문서 코퍼스 (JSON 파일)
//!
//! 코퍼스는 시작 시 한 번 로드되고 이후 읽기 전용입니다.
//! 재로드가 필요하면 [`CorpusHandle`]로 참조를 원자적으로 교체합니다.
//!
//! 파일 형식:
//! ```json
//! {
//!   "embedding_model": "text-embedding-3-small",
//!   "documents": [
//!     { "id": 0, "text": "...", "metadata": { "source": "청약가이드.pdf", "page": 12 }, "vector": [0.1, 0.2] }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::ranker::{self, RankError, ScoredMatch};

/// 메타데이터 (문자열 키 → JSON 스칼라)
pub type Metadata = BTreeMap<String, Value>;

/// 표시용 출처 (`source`, 없으면 `file_name`)
pub fn source_name(metadata: &Metadata) -> Option<&str> {
    ["source", "file_name"]
        .iter()
        .find_map(|key| metadata.get(*key).and_then(Value::as_str))
}

/// 페이지 (0-based)
pub fn page_index(metadata: &Metadata) -> Option<u64> {
    metadata.get("page").and_then(Value::as_u64)
}

// ============================================================================
// Document
// ============================================================================

/// 코퍼스 문서 (로드 후 불변)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// 문서 ID (JSON 숫자 또는 문자열)
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    /// 본문 텍스트
    pub text: String,
    /// 메타데이터 (source, category, page 등)
    #[serde(default)]
    pub metadata: Metadata,
    /// 임베딩 벡터
    pub vector: Vec<f32>,
}

impl Document {
    /// 새 문서 생성
    pub fn new(id: impl Into<String>, text: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: Metadata::new(),
            vector,
        }
    }

    /// 메타데이터 추가 (빌더)
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// 문자열 메타데이터 조회
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// 출처 (`source`, 없으면 `file_name`)
    pub fn source(&self) -> Option<&str> {
        source_name(&self.metadata)
    }

    /// 카테고리
    pub fn category(&self) -> Option<&str> {
        self.metadata_str("category")
    }

    /// 페이지 (0-based)
    pub fn page(&self) -> Option<u64> {
        page_index(&self.metadata)
    }
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "document id must be a string or number, got {}",
            other
        ))),
    }
}

// ============================================================================
// Corpus
// ============================================================================

/// 직렬화 형식
#[derive(Debug, Serialize, Deserialize)]
struct CorpusFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    embedding_model: Option<String>,
    documents: Vec<Document>,
}

/// 읽기 전용 문서 코퍼스
///
/// 모든 문서 벡터는 같은 차원을 가집니다 (생성 시 검증).
#[derive(Debug, Clone)]
pub struct Corpus {
    documents: Arc<[Document]>,
    dimension: Option<usize>,
    embedding_model: Option<String>,
}

impl Corpus {
    /// 문서 목록으로 생성 (검증 포함)
    ///
    /// - ID 중복 불가
    /// - 벡터는 비어있지 않아야 함
    /// - 모든 벡터의 차원이 같아야 함
    pub fn new(documents: Vec<Document>, embedding_model: Option<String>) -> Result<Self> {
        let mut ids = HashSet::with_capacity(documents.len());
        let mut dimension: Option<usize> = None;

        for doc in &documents {
            if !ids.insert(doc.id.as_str()) {
                anyhow::bail!("Duplicate document id: '{}'", doc.id);
            }
            if doc.vector.is_empty() {
                anyhow::bail!("Document '{}' has an empty vector", doc.id);
            }
            match dimension {
                None => dimension = Some(doc.vector.len()),
                Some(dim) if dim != doc.vector.len() => {
                    anyhow::bail!(
                        "Document '{}' has {} dimensions, expected {}",
                        doc.id,
                        doc.vector.len(),
                        dim
                    );
                }
                Some(_) => {}
            }
        }

        Ok(Self {
            documents: documents.into(),
            dimension,
            embedding_model,
        })
    }

    /// 빈 코퍼스
    pub fn empty() -> Self {
        Self {
            documents: Vec::new().into(),
            dimension: None,
            embedding_model: None,
        }
    }

    /// JSON 문자열에서 로드
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: CorpusFile =
            serde_json::from_str(json).context("Failed to parse corpus JSON")?;
        Self::new(file.documents, file.embedding_model)
    }

    /// JSON 파일에서 로드
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read corpus file: {:?}", path))?;
        let corpus = Self::from_json_str(&json)
            .with_context(|| format!("Invalid corpus file: {:?}", path))?;

        tracing::info!(
            "Loaded corpus: {} documents, dimension {:?} ({:?})",
            corpus.len(),
            corpus.dimension,
            path
        );
        Ok(corpus)
    }

    /// JSON 파일로 저장
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create corpus directory")?;
            }
        }

        let file = CorpusFile {
            embedding_model: self.embedding_model.clone(),
            documents: self.documents.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file).context("Failed to serialize corpus")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write corpus file: {:?}", path))?;

        tracing::info!("Saved corpus: {} documents ({:?})", self.len(), path);
        Ok(())
    }

    /// 문서 슬라이스
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// 문서 수
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// 비어있는지 여부
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// 벡터 차원 (빈 코퍼스면 None)
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// 임베딩 모델 이름
    pub fn embedding_model(&self) -> Option<&str> {
        self.embedding_model.as_deref()
    }

    /// ID로 문서 조회
    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    /// 쿼리 벡터로 상위 K개 검색
    pub fn rank(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredMatch<'_>>, RankError> {
        ranker::rank(query, &self.documents, top_k)
    }

    /// 카테고리별 문서
    pub fn by_category(&self, category: &str) -> Vec<&Document> {
        self.documents
            .iter()
            .filter(|d| d.category() == Some(category))
            .collect()
    }

    /// 키워드 검색 (본문 + 문자열 메타데이터, 대소문자 무시)
    pub fn search_text(&self, keyword: &str) -> Vec<&Document> {
        let keyword = keyword.to_lowercase();
        self.documents
            .iter()
            .filter(|d| {
                d.text.to_lowercase().contains(&keyword)
                    || d.metadata.values().any(|v| {
                        v.as_str()
                            .map(|s| s.to_lowercase().contains(&keyword))
                            .unwrap_or(false)
                    })
            })
            .collect()
    }

    /// 코퍼스 통계
    pub fn stats(&self) -> CorpusStats {
        let mut stats = CorpusStats {
            document_count: self.len(),
            dimension: self.dimension,
            embedding_model: self.embedding_model.clone(),
            ..Default::default()
        };

        let mut total_chars = 0usize;
        for doc in self.documents.iter() {
            total_chars += doc.text.chars().count();
            stats.metadata_keys.extend(doc.metadata.keys().cloned());
            if let Some(category) = doc.category() {
                *stats.categories.entry(category.to_string()).or_default() += 1;
            }
            if let Some(source) = doc.source() {
                *stats.sources.entry(source.to_string()).or_default() += 1;
            }
        }

        if !self.is_empty() {
            stats.average_text_chars = total_chars / self.len();
        }
        stats
    }
}

/// 코퍼스 통계
#[derive(Debug, Clone, Default, Serialize)]
pub struct CorpusStats {
    pub document_count: usize,
    pub dimension: Option<usize>,
    pub embedding_model: Option<String>,
    pub average_text_chars: usize,
    pub metadata_keys: BTreeSet<String>,
    pub categories: BTreeMap<String, usize>,
    pub sources: BTreeMap<String, usize>,
}

// ============================================================================
// CorpusHandle
// ============================================================================

/// 교체 가능한 코퍼스 참조
///
/// 각 쿼리는 [`CorpusHandle::snapshot`]으로 하나의 일관된 스냅샷을 사용합니다.
/// 재로드 중에도 진행 중인 쿼리는 이전 스냅샷을 그대로 봅니다.
#[derive(Debug)]
pub struct CorpusHandle {
    current: ArcSwap<Corpus>,
}

impl CorpusHandle {
    /// 코퍼스로 생성
    pub fn new(corpus: Corpus) -> Self {
        Self {
            current: ArcSwap::from_pointee(corpus),
        }
    }

    /// 현재 스냅샷
    pub fn snapshot(&self) -> Arc<Corpus> {
        self.current.load_full()
    }

    /// 코퍼스 교체
    pub fn replace(&self, corpus: Corpus) {
        self.current.store(Arc::new(corpus));
    }

    /// 파일에서 다시 로드 후 교체
    ///
    /// 로드에 실패하면 기존 코퍼스를 유지합니다.
    pub fn reload(&self, path: &Path) -> Result<usize> {
        let corpus = Corpus::load(path)?;
        let count = corpus.len();
        self.replace(corpus);
        Ok(count)
    }
}

// ============================================================================
// Tests
// ============================================================================
