//! 프롬프트 구성
//!
//! 검색된 문서를 컨텍스트 문자열로 만들고 시스템/사용자 메시지를 조립합니다.

use super::completion::ChatMessage;
use crate::knowledge::Document;

/// 관련 문서가 없을 때의 컨텍스트
pub const NO_CONTEXT: &str = "관련 문서를 찾을 수 없습니다.";

/// 늘봄학교 어시스턴트 시스템 프롬프트
pub const SYSTEM_PROMPT: &str = "당신은 늘봄학교 업무 전문 AI 어시스턴트입니다.

다음 지침을 따라 답변해주세요:

1. **정확성**: 제공된 컨텍스트를 바탕으로 정확하고 구체적인 정보를 제공하세요.
2. **친근함**: 따뜻하고 친근한 말투로 답변하되, 전문성을 유지하세요.
3. **구조화**: 답변을 이해하기 쉽게 구조화하여 제시하세요.
4. **한계 인정**: 컨텍스트에 관련 정보가 없으면 솔직하게 말씀드리세요.
5. **부가 정보**: 가능하다면 실용적인 조언이나 추가 정보를 제공하세요.

늘봄학교와 관련된 질문에만 답변하며, 다른 주제의 질문에는 정중히 안내해주세요.";

/// 상위 `limit`개 문서를 `[출처] 본문` 형태로 연결
///
/// 출처가 없으면 `문서 N`(1부터)을 사용합니다.
pub fn build_context<'a, I>(documents: I, limit: usize) -> String
where
    I: IntoIterator<Item = &'a Document>,
{
    let parts: Vec<String> = documents
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, doc)| {
            let source = doc
                .source()
                .map(str::to_string)
                .unwrap_or_else(|| format!("문서 {}", i + 1));
            format!("[{}] {}", source, doc.text)
        })
        .collect();

    if parts.is_empty() {
        NO_CONTEXT.to_string()
    } else {
        parts.join("\n\n")
    }
}

/// 사용자 턴 본문
pub fn user_content(context: &str, question: &str) -> String {
    format!("컨텍스트: {}\n\n질문: {}", context, question)
}

/// 시스템 + 사용자 메시지
pub fn build_messages(context: &str, question: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(user_content(context, question)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::completion::Role;

    #[test]
    fn test_build_context_with_sources() {
        let docs = vec![
            Document::new("1", "운영시간 안내", vec![1.0]).with_metadata("source", "운영 지침"),
            Document::new("2", "급식 안내", vec![1.0]),
            Document::new("3", "신청 안내", vec![1.0]).with_metadata("source", "신청 안내"),
            Document::new("4", "제외될 문서", vec![1.0]),
        ];

        let context = build_context(&docs, 3);
        assert_eq!(
            context,
            "[운영 지침] 운영시간 안내\n\n[문서 2] 급식 안내\n\n[신청 안내] 신청 안내"
        );
    }

    #[test]
    fn test_build_context_empty() {
        let docs: Vec<Document> = vec![];
        assert_eq!(build_context(&docs, 3), NO_CONTEXT);
    }

    #[test]
    fn test_build_messages() {
        let messages = build_messages("[a] b", "운영시간은?");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.starts_with("당신은 늘봄학교"));
        assert_eq!(messages[1].content, "컨텍스트: [a] b\n\n질문: 운영시간은?");
    }
}
