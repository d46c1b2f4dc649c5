//! Local Ranker - 메모리 코퍼스 코사인 랭킹 + 신뢰도
//!
//! 외부 벡터 DB 없이 코퍼스 전체를 쿼리 벡터와 비교합니다.
//! 상태가 없는 순수 함수이므로 같은 코퍼스에 대해 동시에 호출해도 안전합니다.

use serde::Serialize;

use crate::knowledge::Document;

use super::error::RankError;
use super::similarity::{check_finite, cosine_with_norms, norm};

// ============================================================================
// Types
// ============================================================================

/// 랭킹 결과 (문서 참조 + 유사도)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredMatch<'a> {
    /// 코퍼스 문서
    pub document: &'a Document,
    /// 코사인 유사도 (-1.0 ~ 1.0)
    pub similarity: f64,
}

/// 신뢰도 등급
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceLevel {
    /// 80 이상
    High,
    /// 60 이상
    Medium,
    /// 60 미만
    Low,
}

impl ConfidenceLevel {
    /// 신뢰도 점수로 등급 결정
    pub fn from_score(confidence: u8) -> Self {
        match confidence {
            80..=u8::MAX => ConfidenceLevel::High,
            60..=79 => ConfidenceLevel::Medium,
            _ => ConfidenceLevel::Low,
        }
    }

    /// 표시용 라벨
    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "높음",
            ConfidenceLevel::Medium => "보통",
            ConfidenceLevel::Low => "낮음",
        }
    }
}

// ============================================================================
// Ranking
// ============================================================================

/// 코퍼스를 쿼리 벡터로 랭킹
///
/// 모든 문서의 코사인 유사도를 계산하고 내림차순으로 정렬한 뒤
/// 상위 `min(top_k, corpus.len())`개를 반환합니다.
/// 유사도가 같으면 코퍼스 내 원래 순서를 유지합니다 (stable sort).
///
/// # Arguments
/// * `query` - 쿼리 임베딩 (비어있지 않아야 함)
/// * `corpus` - 문서 목록 (모든 벡터가 쿼리와 같은 차원)
/// * `top_k` - 반환할 최대 결과 수 (1 이상)
///
/// # Errors
/// * `top_k == 0`, 빈 쿼리, 유한하지 않은 성분 → [`RankError::InvalidArgument`]
/// * 차원 불일치 → [`RankError::DimensionMismatch`] (점수 계산 전에 전체 검사)
/// * 크기 0 벡터 → [`RankError::DegenerateVector`]
///
/// 빈 코퍼스는 에러가 아니라 빈 결과입니다.
pub fn rank<'a>(
    query: &[f32],
    corpus: &'a [Document],
    top_k: usize,
) -> Result<Vec<ScoredMatch<'a>>, RankError> {
    if top_k == 0 {
        return Err(RankError::InvalidArgument(
            "top_k must be greater than zero".to_string(),
        ));
    }
    if query.is_empty() {
        return Err(RankError::InvalidArgument(
            "query vector must not be empty".to_string(),
        ));
    }
    check_finite(query)?;

    if corpus.is_empty() {
        return Ok(Vec::new());
    }

    // 점수 계산 전에 차원부터 전부 검사
    if let Some(doc) = corpus.iter().find(|d| d.vector.len() != query.len()) {
        return Err(RankError::DimensionMismatch {
            document_id: Some(doc.id.clone()),
            expected: query.len(),
            actual: doc.vector.len(),
        });
    }

    let query_norm = norm(query);
    if query_norm == 0.0 {
        return Err(RankError::DegenerateVector { document_id: None });
    }

    let mut scored = Vec::with_capacity(corpus.len());
    for doc in corpus {
        check_finite(&doc.vector).map_err(|e| match e {
            RankError::InvalidArgument(msg) => {
                RankError::InvalidArgument(format!("document '{}': {}", doc.id, msg))
            }
            other => other,
        })?;

        let doc_norm = norm(&doc.vector);
        if doc_norm == 0.0 {
            return Err(RankError::DegenerateVector {
                document_id: Some(doc.id.clone()),
            });
        }

        scored.push(ScoredMatch {
            document: doc,
            similarity: cosine_with_norms(query, query_norm, &doc.vector, doc_norm),
        });
    }

    // sort_by는 stable: 동점이면 코퍼스 순서 유지
    scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    scored.truncate(top_k);

    tracing::debug!(
        "Ranked {} documents, returning {} (best: {:?})",
        corpus.len(),
        scored.len(),
        scored.first().map(|m| m.similarity)
    );

    Ok(scored)
}

/// 신뢰도 계산 (0 ~ 100)
///
/// `round(100 * 평균 유사도)`를 반올림 후 `[0, 100]`으로 클램프합니다.
/// 결과가 없으면 0입니다.
pub fn confidence(matches: &[ScoredMatch<'_>]) -> u8 {
    if matches.is_empty() {
        return 0;
    }

    let mean = matches.iter().map(|m| m.similarity).sum::<f64>() / matches.len() as f64;
    (mean * 100.0).round().clamp(0.0, 100.0) as u8
}

// ============================================================================
// Tests
// ============================================================================
