//! 랭킹 에러 타입
//!
//! 모든 에러는 동기적이며 재시도 대상이 아닙니다.
//! 호출자의 입력(또는 코퍼스 데이터) 자체가 잘못되었음을 의미합니다.

use thiserror::Error;

/// Local Ranker 에러
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RankError {
    /// 쿼리 벡터와 문서 벡터의 차원이 다름
    ///
    /// `document_id`가 `None`이면 ID 없이 비교한 문서 벡터입니다.
    #[error(
        "Dimension mismatch: query has {expected} dimensions, {doc} has {actual}",
        doc = describe_document(.document_id)
    )]
    DimensionMismatch {
        document_id: Option<String>,
        expected: usize,
        actual: usize,
    },

    /// 크기가 0인 벡터 (코사인 유사도 정의 불가)
    ///
    /// `document_id`가 `None`이면 쿼리 벡터입니다.
    #[error(
        "Degenerate vector ({}): zero magnitude, cosine similarity is undefined",
        describe(.document_id)
    )]
    DegenerateVector { document_id: Option<String> },

    /// 잘못된 인자 (top_k = 0, 빈 쿼리, 유한하지 않은 성분 등)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

fn describe(document_id: &Option<String>) -> String {
    match document_id {
        Some(_) => describe_document(document_id),
        None => "query".to_string(),
    }
}

fn describe_document(document_id: &Option<String>) -> String {
    match document_id.as_deref() {
        Some(id) if !id.is_empty() => format!("document '{}'", id),
        _ => "document".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_message_names_vector() {
        let query = RankError::DegenerateVector { document_id: None };
        assert!(query.to_string().contains("query"));

        let doc = RankError::DegenerateVector {
            document_id: Some("doc_3".to_string()),
        };
        assert!(doc.to_string().contains("document 'doc_3'"));
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = RankError::DimensionMismatch {
            document_id: Some("7".to_string()),
            expected: 2,
            actual: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("2 dimensions"));
        assert!(msg.contains("document '7' has 3"));
    }

    #[test]
    fn test_dimension_mismatch_without_id() {
        let err = RankError::DimensionMismatch {
            document_id: None,
            expected: 2,
            actual: 3,
        };
        let msg = err.to_string();
        assert!(msg.ends_with("query has 2 dimensions, document has 3"));
        assert!(!msg.contains("''"));
    }
}
