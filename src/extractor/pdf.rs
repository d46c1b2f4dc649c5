//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트로 텍스트를 뽑고, 한국어 문서에 맞게 정리합니다.

use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;

/// PDF에서 페이지별 텍스트 추출
///
/// (페이지 번호, 정리된 텍스트) 목록을 반환합니다. 페이지 번호는 1부터 시작합니다.
pub fn extract_pages(path: &Path) -> Result<Vec<(usize, String)>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read PDF: {:?}", path))?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .with_context(|| format!("Failed to extract text from PDF: {:?}", path))?;

    if text.trim().is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
        return Ok(vec![]);
    }

    Ok(number_pages(&text))
}

/// 페이지 분리 + 정리 후 (1부터 시작하는 페이지 번호, 텍스트)
///
/// 빈 페이지는 버리지만 번호는 원본 위치를 유지합니다.
fn number_pages(text: &str) -> Vec<(usize, String)> {
    split_pages(text)
        .into_iter()
        .enumerate()
        .map(|(i, page)| (i + 1, clean_text(&page)))
        .filter(|(_, page)| !page.is_empty())
        .collect()
}

/// PDF 텍스트를 페이지별로 분리
///
/// 폼피드(`\x0c`)를 우선 사용하고, 없으면 `--- Page N ---` 형태의 구분선을 찾습니다.
/// 둘 다 실패하면 전체를 한 페이지로 취급합니다.
/// 폼피드로 나눈 빈 페이지는 자리를 유지하도록 빈 문자열로 남깁니다.
fn split_pages(text: &str) -> Vec<String> {
    if text.contains('\x0c') {
        return text.split('\x0c').map(|s| s.trim().to_string()).collect();
    }

    let marker = page_marker_re();
    if marker.is_match(text) {
        let pages: Vec<String> = marker
            .split(text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if pages.len() > 1 {
            return pages;
        }
    }

    vec![text.trim().to_string()]
}

/// PDF 추출 텍스트 정리
///
/// 1. 페이지 번호 줄(`12`, `- 12 -`) 제거
/// 2. NBSP 및 U+2000~U+200F 공백 문자를 일반 공백으로
/// 3. 하이픈 줄바꿈 결합
/// 4. 문장 끝이 아닌 줄바꿈을 공백으로 (`.` `!` `?` `…` `다` `음` `임` 뒤는 유지)
/// 5. 연속 빈 줄은 하나로, 연속 공백은 하나로
pub fn clean_text(text: &str) -> String {
    static PAGE_NUMBER: OnceLock<Regex> = OnceLock::new();
    static DASHED_PAGE_NUMBER: OnceLock<Regex> = OnceLock::new();
    static HYPHEN_BREAK: OnceLock<Regex> = OnceLock::new();
    static BLANK_LINES: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();

    let page_number =
        PAGE_NUMBER.get_or_init(|| Regex::new(r"\n\s*\d+\s*\n").expect("valid regex"));
    let dashed_page_number = DASHED_PAGE_NUMBER
        .get_or_init(|| Regex::new(r"\n\s*-\s*\d+\s*-\s*\n").expect("valid regex"));
    let hyphen_break =
        HYPHEN_BREAK.get_or_init(|| Regex::new(r"(\S)-\n(\S)").expect("valid regex"));
    let blank_lines = BLANK_LINES.get_or_init(|| Regex::new(r"\n{2,}").expect("valid regex"));
    let spaces = SPACES.get_or_init(|| Regex::new(r" {2,}").expect("valid regex"));

    let text = page_number.replace_all(text, "\n");
    let text = dashed_page_number.replace_all(&text, "\n");

    let text: String = text
        .chars()
        .map(|c| match c {
            '\u{a0}' | '\u{2000}'..='\u{200f}' => ' ',
            other => other,
        })
        .collect();

    let text = hyphen_break.replace_all(&text, "$1$2");
    let text = join_soft_line_breaks(&text);
    let text = blank_lines.replace_all(&text, "\n\n");
    let text = spaces.replace_all(&text, " ");

    text.trim().to_string()
}

/// 문장 중간의 줄바꿈을 공백으로 치환
///
/// 다음 문자가 한글/영문이고 이전 문자가 문장 끝이 아닐 때만 치환합니다.
/// 빈 줄 뒤의 줄바꿈은 문단 경계이므로 유지합니다.
fn join_soft_line_breaks(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len());

    for (i, &c) in chars.iter().enumerate() {
        if c == '\n' {
            let prev = if i > 0 { chars.get(i - 1).copied() } else { None };
            let next = chars.get(i + 1).copied();

            let ends_sentence = matches!(
                prev,
                Some('.' | '!' | '?' | '…' | '다' | '음' | '임' | '\n')
            );
            let next_is_letter = matches!(
                next,
                Some(n) if n.is_ascii_alphabetic() || ('가'..='힣').contains(&n)
            );

            if !ends_sentence && next_is_letter {
                result.push(' ');
                continue;
            }
        }
        result.push(c);
    }

    result
}

fn page_marker_re() -> &'static Regex {
    static PAGE_MARKER: OnceLock<Regex> = OnceLock::new();
    PAGE_MARKER.get_or_init(|| {
        Regex::new(r"(?m)^[\s]*[-=]+[\s]*(?:Page[\s]*)?(\d+)[\s]*[-=]+[\s]*$")
            .expect("valid regex")
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_number_pages_keeps_original_positions() {
        let text = "운영시간 안내입니다.\x0c  \x0c신청 방법 안내입니다.";
        assert_eq!(
            number_pages(text),
            vec![
                (1, "운영시간 안내입니다.".to_string()),
                (3, "신청 방법 안내입니다.".to_string()),
            ]
        );
    }

    #[test]
    fn test_extract_pages_rejects_invalid_pdf() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.pdf");
        std::fs::write(&path, "not a pdf").unwrap();

        assert!(extract_pages(&path).is_err());
        assert!(extract_pages(&temp_dir.path().join("missing.pdf")).is_err());
    }

    #[test]
    fn test_split_pages_with_formfeed() {
        let text = "Page 1 content\x0cPage 2 content\x0cPage 3 content";
        let pages = split_pages(text);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0], "Page 1 content");
        assert_eq!(pages[1], "Page 2 content");
    }

    #[test]
    fn test_split_pages_keeps_blank_formfeed_pages() {
        let pages = split_pages("첫 페이지\x0c\x0c셋째 페이지\x0c");
        assert_eq!(pages, vec!["첫 페이지", "", "셋째 페이지", ""]);
    }

    #[test]
    fn test_split_pages_with_marker() {
        let text = "첫 페이지\n--- Page 2 ---\n둘째 페이지";
        let pages = split_pages(text);
        assert_eq!(pages, vec!["첫 페이지", "둘째 페이지"]);
    }

    #[test]
    fn test_split_pages_no_separator() {
        let pages = split_pages("Just some text without page breaks");
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn test_clean_removes_page_numbers() {
        let text = "청약 자격 안내입니다.\n 12 \n다음 내용입니다.";
        assert_eq!(clean_text(text), "청약 자격 안내입니다.\n다음 내용입니다.");

        let dashed = "앞 문장입니다.\n- 3 -\n뒤 문장입니다.";
        assert_eq!(clean_text(dashed), "앞 문장입니다.\n뒤 문장입니다.");
    }

    #[test]
    fn test_clean_joins_soft_line_breaks() {
        let text = "늘봄학교는 초등학생을\n대상으로 합니다.\n운영시간은";
        assert_eq!(
            clean_text(text),
            "늘봄학교는 초등학생을 대상으로 합니다.\n운영시간은"
        );
    }

    #[test]
    fn test_clean_keeps_sentence_end_breaks() {
        let text = "신청 가능함\n다음 항목";
        // '함'은 문장 끝 문자가 아니므로 결합
        assert_eq!(clean_text(text), "신청 가능함 다음 항목");

        let text = "신청 가능임\n다음 항목";
        assert_eq!(clean_text(text), "신청 가능임\n다음 항목");
    }

    #[test]
    fn test_clean_hyphen_and_spaces() {
        let text = "infor-\nmation\u{a0}\u{a0}text    here";
        assert_eq!(clean_text(text), "information text here");
    }

    #[test]
    fn test_clean_collapses_blank_lines() {
        let text = "첫 문단입니다.\n\n\n\n둘째 문단입니다.";
        assert_eq!(clean_text(text), "첫 문단입니다.\n\n둘째 문단입니다.");
    }
}
