//! Corpus Builder
//!
//! 수집된 파일 → 텍스트 추출 → 청킹 → 임베딩 → 코퍼스 생성 파이프라인입니다.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;

use super::chunker::Chunker;
use super::corpus::{Corpus, Document, Metadata};
use crate::collector::CollectedFile;
use crate::embedding::{EmbeddingProvider, MAX_BATCH_SIZE};
use crate::extractor::{ContentExtractor, ExtractedContent};

/// 임베딩 전 청크
#[derive(Debug, Clone)]
pub struct PendingChunk {
    pub text: String,
    pub metadata: Metadata,
}

/// 빌드 결과
#[derive(Debug)]
pub struct BuildReport {
    /// 생성된 코퍼스
    pub corpus: Corpus,
    /// 처리에 성공한 파일 수
    pub files_processed: usize,
    /// 실패한 파일 (파일 이름, 에러 메시지)
    pub failures: Vec<(String, String)>,
}

/// 코퍼스 빌더
pub struct CorpusBuilder {
    extractor: ContentExtractor,
    chunker: Box<dyn Chunker>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl CorpusBuilder {
    pub fn new(chunker: Box<dyn Chunker>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            extractor: ContentExtractor::new(),
            chunker,
            embedder,
        }
    }

    /// 파일 하나를 추출해 청크로 분할
    pub async fn chunk_file(&self, file: &CollectedFile) -> Result<Vec<PendingChunk>> {
        let contents = self
            .extractor
            .extract(&file.path, file.file_type)
            .await
            .with_context(|| format!("Failed to extract {:?}", file.path))?;

        let chunks = self.chunk_contents(file, &contents);
        tracing::debug!("{} -> {} chunks", file.file_name(), chunks.len());
        Ok(chunks)
    }

    /// 추출된 콘텐츠를 청크로 분할
    ///
    /// PDF는 페이지 단위로 청킹하고 `page` 메타데이터(0부터)를 붙입니다.
    pub fn chunk_contents(
        &self,
        file: &CollectedFile,
        contents: &[ExtractedContent],
    ) -> Vec<PendingChunk> {
        let mut chunks = Vec::new();

        for content in contents {
            let metadata = chunk_metadata(file, content);
            for text in self.chunker.chunk(&content.text) {
                chunks.push(PendingChunk {
                    text,
                    metadata: metadata.clone(),
                });
            }
        }

        chunks
    }

    /// 청크 목록을 임베딩해 Document로 변환 (ID는 0부터 순번)
    pub async fn embed_chunks(&self, chunks: Vec<PendingChunk>) -> Result<Vec<Document>> {
        embed_chunks(self.embedder.as_ref(), chunks).await
    }

    /// 파일 목록에서 코퍼스 생성
    ///
    /// 추출에 실패한 파일은 건너뛰고 `failures`에 기록합니다.
    /// 임베딩 실패는 전체 빌드를 중단합니다.
    pub async fn build(&self, files: &[CollectedFile]) -> Result<BuildReport> {
        let mut chunks = Vec::new();
        let mut files_processed = 0;
        let mut failures = Vec::new();

        for (i, file) in files.iter().enumerate() {
            let file_name = file.file_name();
            match self.chunk_file(file).await {
                Ok(file_chunks) => {
                    tracing::info!(
                        "[{}/{}] [{}] {}: {} chunks",
                        i + 1,
                        files.len(),
                        file.file_type.tag(),
                        file_name,
                        file_chunks.len()
                    );
                    chunks.extend(file_chunks);
                    files_processed += 1;
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {:#}", file_name, e);
                    failures.push((file_name, format!("{:#}", e)));
                }
            }
        }

        if chunks.is_empty() {
            anyhow::bail!("No text chunks were produced from {} files", files.len());
        }

        tracing::info!(
            "Embedding {} chunks with {} ({})",
            chunks.len(),
            self.embedder.name(),
            self.chunker.name()
        );

        let documents = self.embed_chunks(chunks).await?;
        let corpus = Corpus::new(documents, Some(self.embedder.name().to_string()))?;

        Ok(BuildReport {
            corpus,
            files_processed,
            failures,
        })
    }
}

/// 콘텐츠 하나에 붙는 메타데이터 (`source`, `file_name`, PDF는 `page`)
fn chunk_metadata(file: &CollectedFile, content: &ExtractedContent) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("source".to_string(), Value::from(file.file_name()));
    metadata.insert(
        "file_name".to_string(),
        Value::from(file.path.display().to_string()),
    );
    if let Some(page) = content.page_number {
        metadata.insert("page".to_string(), Value::from(page.saturating_sub(1)));
    }
    metadata
}

/// 청크를 100개 단위로 임베딩해 Document로 변환 (ID는 0부터 순번)
pub async fn embed_chunks(
    embedder: &dyn EmbeddingProvider,
    chunks: Vec<PendingChunk>,
) -> Result<Vec<Document>> {
    let mut documents = Vec::with_capacity(chunks.len());
    let total_batches = chunks.len().div_ceil(MAX_BATCH_SIZE);

    for (batch_index, batch) in chunks.chunks(MAX_BATCH_SIZE).enumerate() {
        tracing::info!("Embedding batch {}/{}", batch_index + 1, total_batches);

        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder
            .embed_batch(&texts)
            .await
            .with_context(|| format!("Embedding batch {} failed", batch_index + 1))?;

        if vectors.len() != batch.len() {
            anyhow::bail!(
                "Embedding provider returned {} vectors for {} chunks",
                vectors.len(),
                batch.len()
            );
        }

        if let Some(expected) = embedder.dimension() {
            if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
                anyhow::bail!(
                    "{} returned a {}-dimensional vector, expected {}",
                    embedder.name(),
                    bad.len(),
                    expected
                );
            }
        }

        for (chunk, vector) in batch.iter().zip(vectors) {
            let id = documents.len().to_string();
            documents.push(Document {
                id,
                text: chunk.text.clone(),
                metadata: chunk.metadata.clone(),
                vector,
            });
        }
    }

    Ok(documents)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::chat::{format_response, ChatResponse, Source};
    use crate::collector::{FileCollector, FileType};
    use crate::knowledge::chunker::{recursive_chunker, ChunkConfig};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// 글자 수 기반 가짜 임베더 (배치 호출 횟수 기록)
    pub(crate) struct FakeEmbedder {
        pub batch_calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for FakeEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.chars().count() as f32, 1.0, 0.5])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            let mut out = Vec::new();
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }

        fn dimension(&self) -> Option<usize> {
            Some(3)
        }

        fn name(&self) -> &str {
            "fake-embedding"
        }
    }

    fn builder(embedder: Arc<FakeEmbedder>) -> CorpusBuilder {
        let chunker = recursive_chunker(ChunkConfig {
            chunk_size: 60,
            chunk_overlap: 0,
            min_characters: 5,
        });
        CorpusBuilder::new(chunker, embedder)
    }

    pub(crate) fn fake_embedder() -> Arc<FakeEmbedder> {
        Arc::new(FakeEmbedder {
            batch_calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_build_from_text_files() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("운영.md"),
            "늘봄학교는 학기 중 오전 7시부터 오후 8시까지 운영합니다.\n\n\
             방학 중에는 오전 9시부터 운영합니다.",
        )
        .unwrap();
        std::fs::write(
            temp_dir.path().join("신청.txt"),
            "신청은 학교 홈페이지에서 할 수 있습니다.",
        )
        .unwrap();

        let files = FileCollector::with_defaults()
            .collect_directory(temp_dir.path())
            .unwrap();
        let embedder = fake_embedder();
        let report = builder(embedder.clone()).build(&files).await.unwrap();

        assert_eq!(report.files_processed, 2);
        assert!(report.failures.is_empty());
        assert_eq!(report.corpus.embedding_model(), Some("fake-embedding"));
        assert_eq!(report.corpus.dimension(), Some(3));
        assert_eq!(embedder.batch_calls.load(Ordering::SeqCst), 1);

        let docs = report.corpus.documents();
        assert!(docs.len() >= 2);
        for (i, doc) in docs.iter().enumerate() {
            assert_eq!(doc.id, i.to_string());
            assert!(doc.source().is_some());
            assert!(doc.metadata_str("file_name").is_some());
            assert!(doc.page().is_none());
        }
    }

    #[tokio::test]
    async fn test_embed_chunks_batches_of_100() {
        let embedder = fake_embedder();
        let chunks: Vec<PendingChunk> = (0..250)
            .map(|i| PendingChunk {
                text: format!("청크 {}", i),
                metadata: Metadata::new(),
            })
            .collect();

        let docs = builder(embedder.clone()).embed_chunks(chunks).await.unwrap();
        assert_eq!(docs.len(), 250);
        assert_eq!(docs[249].id, "249");
        assert_eq!(embedder.batch_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_build_with_no_text_fails() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("blank.md"), "   ").unwrap();

        let files = FileCollector::with_defaults()
            .collect_directory(temp_dir.path())
            .unwrap();
        let result = builder(fake_embedder()).build(&files).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_pdf_pages_stored_zero_based() {
        let file = CollectedFile {
            path: PathBuf::from("/docs/늘봄 안내.pdf"),
            file_type: FileType::Pdf,
            size: 0,
        };
        let contents = vec![
            ExtractedContent {
                text: "늘봄학교 운영시간은 오전 7시부터 오후 8시까지입니다.".to_string(),
                page_number: Some(1),
            },
            ExtractedContent {
                text: "신청은 학교 홈페이지에서 할 수 있습니다.".to_string(),
                page_number: Some(3),
            },
        ];

        let chunks = builder(fake_embedder()).chunk_contents(&file, &contents);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata["page"], Value::from(0));
        assert_eq!(chunks[1].metadata["page"], Value::from(2));
        assert_eq!(chunks[0].metadata["source"], Value::from("늘봄 안내.pdf"));
        assert_eq!(chunks[0].metadata["file_name"], Value::from("/docs/늘봄 안내.pdf"));

        let response = ChatResponse {
            answer: "오전 7시부터입니다.".to_string(),
            sources: vec![Source {
                id: "0".to_string(),
                text: chunks[0].text.clone(),
                metadata: chunks[0].metadata.clone(),
                similarity: 0.9,
            }],
            confidence: 90,
        };
        assert!(format_response(&response, 50, 3).ends_with("• 늘봄 안내.pdf (페이지: 1)"));
    }
}
