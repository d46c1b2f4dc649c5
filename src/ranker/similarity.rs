//! 코사인 유사도
//!
//! 임베딩은 `f32`로 저장되지만 누적 연산은 `f64`로 수행합니다.
//! 같은 벡터끼리의 유사도는 1e-9 이내로 1입니다.

use super::error::RankError;

/// 코사인 유사도 계산
///
/// `dot(a, b) / (‖a‖ * ‖b‖)`, 결과는 -1.0 ~ 1.0 범위입니다.
/// `a`는 쿼리, `b`는 문서 벡터로 취급합니다.
/// 정의되지 않는 경우 0.0 대신 에러를 반환합니다.
///
/// # Errors
/// * 길이가 다르면 [`RankError::DimensionMismatch`] (`b`를 문서로 간주)
/// * 빈 벡터 또는 유한하지 않은 성분이면 [`RankError::InvalidArgument`]
/// * 어느 한쪽의 크기가 0이면 [`RankError::DegenerateVector`]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, RankError> {
    if a.is_empty() || b.is_empty() {
        return Err(RankError::InvalidArgument(
            "vectors must not be empty".to_string(),
        ));
    }
    if a.len() != b.len() {
        return Err(RankError::DimensionMismatch {
            document_id: None,
            expected: a.len(),
            actual: b.len(),
        });
    }
    check_finite(a)?;
    check_finite(b)?;

    let norm_a = norm(a);
    if norm_a == 0.0 {
        return Err(RankError::DegenerateVector { document_id: None });
    }
    let norm_b = norm(b);
    if norm_b == 0.0 {
        return Err(RankError::DegenerateVector {
            document_id: Some(String::new()),
        });
    }

    Ok(cosine_with_norms(a, norm_a, b, norm_b))
}

/// 미리 계산된 노름으로 코사인 유사도 계산
///
/// 호출자가 길이 일치와 노름 > 0을 보장해야 합니다.
pub(crate) fn cosine_with_norms(a: &[f32], norm_a: f64, b: &[f32], norm_b: f64) -> f64 {
    let similarity = dot(a, b) / (norm_a * norm_b);
    // 반올림 오차로 범위를 살짝 벗어나는 경우
    similarity.clamp(-1.0, 1.0)
}

/// 내적
pub(crate) fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}

/// 유클리드 노름
pub(crate) fn norm(v: &[f32]) -> f64 {
    v.iter()
        .map(|x| {
            let x = f64::from(*x);
            x * x
        })
        .sum::<f64>()
        .sqrt()
}

/// NaN / Infinity 성분 거부
pub(crate) fn check_finite(v: &[f32]) -> Result<(), RankError> {
    match v.iter().position(|x| !x.is_finite()) {
        Some(i) => Err(RankError::InvalidArgument(format!(
            "vector component {} is not finite ({})",
            i, v[i]
        ))),
        None => Ok(()),
    }
}

// ============================================================================
// Tests
// ============================================================================
