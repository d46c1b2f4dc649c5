//! CLI 모듈
//!
//! neulbom-faq CLI 명령어 정의 및 구현

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::chat::{format_response, AssistantSettings, ChatSession, FaqAssistant, OpenAiChat};
use crate::collector::{CollectionStats, CollectorConfig, FileCollector};
use crate::config::{get_data_dir, Config};
use crate::embedding::OpenAiEmbedding;
use crate::knowledge::{
    build_sample_corpus, recursive_chunker, ChunkConfig, Corpus, CorpusBuilder, CorpusHandle,
};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "neulbom-faq")]
#[command(version, about = "늘봄학교 FAQ 질의응답 (RAG)", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 질문하고 답변 받기
    Ask {
        /// 질문
        question: String,

        /// 코퍼스 파일 경로
        #[arg(short, long)]
        corpus: Option<PathBuf>,

        /// 검색할 문서 수
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// 관련 문서 검색 (답변 생성 없음)
    Search {
        /// 검색 쿼리
        query: String,

        /// 코퍼스 파일 경로
        #[arg(short, long)]
        corpus: Option<PathBuf>,

        /// 결과 개수
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// 임베딩 없이 키워드(부분 문자열)로 검색
        #[arg(long)]
        keyword: bool,
    },

    /// 파일 또는 폴더에서 코퍼스 생성
    Build {
        /// 단일 파일
        #[arg(long)]
        file: Option<PathBuf>,

        /// 폴더 (재귀)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// 출력 코퍼스 경로
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 청크 크기 (문자 수)
        #[arg(long, default_value = "1000")]
        chunk_size: usize,

        /// 청크 오버랩 (문자 수)
        #[arg(long, default_value = "200")]
        chunk_overlap: usize,

        /// PDF 파일 건너뛰기
        #[arg(long)]
        skip_pdfs: bool,
    },

    /// 내장 샘플 FAQ로 코퍼스 생성
    Sample {
        /// 출력 코퍼스 경로
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 기존 코퍼스 덮어쓰기
        #[arg(long)]
        force: bool,
    },

    /// 상태 확인
    Status {
        /// 코퍼스 파일 경로
        #[arg(short, long)]
        corpus: Option<PathBuf>,

        /// 이 카테고리의 문서 목록 표시
        #[arg(long)]
        category: Option<String>,
    },

    /// 대화형 채팅
    Chat {
        /// 코퍼스 파일 경로
        #[arg(short, long)]
        corpus: Option<PathBuf>,
    },
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env().context("설정 로드 실패")?;

    match cli.command {
        Commands::Ask {
            question,
            corpus,
            top_k,
        } => {
            apply_overrides(&mut config, corpus, top_k)?;
            cmd_ask(&config, &question).await
        }
        Commands::Search {
            query,
            corpus,
            top_k,
            keyword,
        } => {
            apply_overrides(&mut config, corpus, top_k)?;
            if keyword {
                cmd_keyword_search(&config, &query)
            } else {
                cmd_search(&config, &query).await
            }
        }
        Commands::Build {
            file,
            dir,
            output,
            chunk_size,
            chunk_overlap,
            skip_pdfs,
        } => {
            apply_overrides(&mut config, output, None)?;
            let chunk_config = ChunkConfig {
                chunk_size,
                chunk_overlap,
                ..Default::default()
            };
            cmd_build(&config, file, dir, chunk_config, skip_pdfs).await
        }
        Commands::Sample { output, force } => {
            apply_overrides(&mut config, output, None)?;
            cmd_sample(&config, force).await
        }
        Commands::Status { corpus, category } => {
            apply_overrides(&mut config, corpus, None)?;
            cmd_status(&config, category.as_deref()).await
        }
        Commands::Chat { corpus } => {
            apply_overrides(&mut config, corpus, None)?;
            cmd_chat(&config).await
        }
    }
}

/// CLI 플래그를 설정에 반영 (반영 후 다시 검증)
fn apply_overrides(
    config: &mut Config,
    corpus: Option<PathBuf>,
    top_k: Option<usize>,
) -> Result<()> {
    if let Some(path) = corpus {
        config.corpus_path = path;
    }
    if let Some(k) = top_k {
        config.top_k = k;
    }
    config.validate().context("잘못된 옵션")
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 질문 명령어 (ask)
async fn cmd_ask(config: &Config, question: &str) -> Result<()> {
    let assistant = build_assistant(config)?;

    println!("[*] 답변 생성 중: \"{}\"", question);

    let response = assistant.answer(question).await?;
    let settings = assistant.settings();

    println!(
        "\n[OK] 신뢰도: {}% ({})\n",
        response.confidence,
        response.level().label()
    );
    println!(
        "{}",
        format_response(
            &response,
            settings.low_confidence_threshold,
            settings.context_docs
        )
    );

    Ok(())
}

/// 검색 명령어 (search)
async fn cmd_search(config: &Config, query: &str) -> Result<()> {
    let assistant = build_assistant(config)?;

    println!("[*] 검색 중: \"{}\"", query);

    let retrieval = assistant.retrieve(query).await?;

    if retrieval.sources.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!(
        "\n[OK] 검색 결과 ({} 건, 신뢰도 {}% {}):\n",
        retrieval.sources.len(),
        retrieval.confidence,
        retrieval.level().label()
    );

    for (i, source) in retrieval.sources.iter().enumerate() {
        println!(
            "{}. [유사도: {:.4}] Doc #{}",
            i + 1,
            source.similarity,
            source.id
        );

        if let Some(name) = source.name() {
            match source.display_page() {
                Some(page) => println!("   출처: {} (페이지: {})", name, page),
                None => println!("   출처: {}", name),
            }
        }

        println!("   내용: {}", truncate_text(&source.text, 200));
        println!();
    }

    Ok(())
}

/// 키워드 검색 명령어 (search --keyword)
///
/// 본문과 메타데이터에서 부분 문자열을 찾습니다. API 키가 필요 없습니다.
fn cmd_keyword_search(config: &Config, keyword: &str) -> Result<()> {
    let corpus = load_corpus(&config.corpus_path)?;
    let docs = corpus.search_text(keyword);

    if docs.is_empty() {
        println!("[!] \"{}\"을(를) 포함한 문서가 없습니다.", keyword);
        return Ok(());
    }

    println!("[OK] 키워드 검색 결과 ({} 건):\n", docs.len());
    for doc in docs.iter().take(config.top_k) {
        println!(
            "  #{:<4} [{}] {}",
            doc.id,
            doc.source().unwrap_or("-"),
            truncate_text(&doc.text, 80)
        );
    }

    Ok(())
}

/// 코퍼스 생성 명령어 (build)
async fn cmd_build(
    config: &Config,
    file: Option<PathBuf>,
    dir: Option<PathBuf>,
    chunk_config: ChunkConfig,
    skip_pdfs: bool,
) -> Result<()> {
    chunk_config.validate()?;
    let embedder = Arc::new(OpenAiEmbedding::from_config(config)?);

    let collector = FileCollector::new(CollectorConfig {
        skip_pdfs,
        ..Default::default()
    });

    // 파일 수집
    let files = if let Some(ref file_path) = file {
        match collector.collect_file(file_path)? {
            Some(f) => vec![f],
            None => {
                println!("[!] 지원하지 않는 파일 형식: {:?}", file_path);
                return Ok(());
            }
        }
    } else if let Some(ref dir_path) = dir {
        collector.collect_directory(dir_path)?
    } else {
        bail!("--file 또는 --dir를 지정해야 합니다");
    };

    if files.is_empty() {
        println!("[!] 수집할 파일이 없습니다.");
        return Ok(());
    }

    // 통계 표시
    let stats = CollectionStats::from_files(&files);
    println!("[*] 수집 대상: {} 파일", stats.total_files);
    println!("    텍스트: {}, PDF: {}", stats.text_files, stats.pdf_files);
    println!("    총 크기: {}", format_bytes(stats.total_size as usize));
    println!();

    let builder = CorpusBuilder::new(recursive_chunker(chunk_config), embedder);
    let report = builder.build(&files).await.context("코퍼스 생성 실패")?;

    for (name, error) in &report.failures {
        println!("[!] {} 건너뜀: {}", name, error);
    }

    report
        .corpus
        .save(&config.corpus_path)
        .context("코퍼스 저장 실패")?;

    println!();
    println!(
        "[OK] 완료: 파일 {} 개 / 실패 {} 개 → 문서 {} 건",
        report.files_processed,
        report.failures.len(),
        report.corpus.len()
    );
    println!("     저장 위치: {}", config.corpus_path.display());

    Ok(())
}

/// 샘플 코퍼스 생성 명령어 (sample)
async fn cmd_sample(config: &Config, force: bool) -> Result<()> {
    if config.corpus_path.exists() && !force {
        println!(
            "[!] 코퍼스 파일이 이미 있습니다: {}",
            config.corpus_path.display()
        );
        println!("    덮어쓰려면 --force 를 사용하세요.");
        return Ok(());
    }

    let embedder = OpenAiEmbedding::from_config(config)?;

    println!("[*] 샘플 문서 임베딩 중...");
    let corpus = build_sample_corpus(&embedder)
        .await
        .context("샘플 코퍼스 생성 실패")?;

    corpus
        .save(&config.corpus_path)
        .context("코퍼스 저장 실패")?;

    println!("[OK] 샘플 문서 {} 건 저장", corpus.len());
    println!("     저장 위치: {}", config.corpus_path.display());

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(config: &Config, category: Option<&str>) -> Result<()> {
    println!("neulbom-faq v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", get_data_dir().display());
    println!("[*] 코퍼스 파일: {}", config.corpus_path.display());
    println!(
        "[*] 모델: 임베딩 {}, 채팅 {}",
        config.embedding_model, config.chat_model
    );
    println!(
        "[*] 검색: top-k {}, 컨텍스트 {} 건, 저신뢰 기준 {}%",
        config.top_k, config.context_docs, config.low_confidence_threshold
    );

    // API 키 상태
    if config.has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export OPENAI_API_KEY=your-key");
    }

    // 코퍼스 통계
    let corpus = match Corpus::load(&config.corpus_path) {
        Ok(corpus) => corpus,
        Err(e) => {
            println!("[!] 코퍼스 로드 실패: {:#}", e);
            return Ok(());
        }
    };

    let stats = corpus.stats();
    println!("[OK] 문서: {} 건", stats.document_count);
    if let Some(dimension) = stats.dimension {
        println!("     벡터 차원: {}", dimension);
    }
    if let Some(ref model) = stats.embedding_model {
        println!("     임베딩 모델: {}", model);
        if model != &config.embedding_model {
            println!(
                "[!] 코퍼스 모델({})과 설정 모델({})이 다릅니다.",
                model, config.embedding_model
            );
        }
    }
    println!("     평균 길이: {} 자", stats.average_text_chars);

    if !stats.metadata_keys.is_empty() {
        let keys: Vec<&str> = stats.metadata_keys.iter().map(String::as_str).collect();
        println!("     메타데이터 키: {}", keys.join(", "));
    }
    for (category, count) in &stats.categories {
        println!("     카테고리 {}: {} 건", category, count);
    }
    for (source, count) in &stats.sources {
        println!("     출처 {}: {} 건", source, count);
    }

    // 카테고리 문서 목록
    if let Some(category) = category {
        let docs = corpus.by_category(category);
        println!();
        println!("[*] 카테고리 '{}': {} 건", category, docs.len());
        for doc in docs {
            println!("  #{:<4} {}", doc.id, truncate_text(&doc.text, 60));
        }
        return Ok(());
    }

    // 샘플 문서
    if !corpus.is_empty() {
        println!();
        println!("[*] 샘플 문서:");
        for doc in corpus.documents().iter().take(3) {
            println!(
                "  #{:<4} [{}] {}",
                doc.id,
                doc.source().unwrap_or("-"),
                truncate_text(&doc.text, 60)
            );
        }
    }

    Ok(())
}

/// 대화형 채팅 명령어 (chat)
async fn cmd_chat(config: &Config) -> Result<()> {
    let assistant = build_assistant(config)?;
    let session = ChatSession::new();

    println!("늘봄학교 FAQ 채팅 (/clear: 초기화, /reload: 코퍼스 다시 읽기, /quit: 종료)");
    println!();

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("질문> ");
        std::io::stdout().flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };

        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear();
                println!("[OK] 대화를 초기화했습니다.\n");
            }
            "/reload" => match assistant.corpus().reload(&config.corpus_path) {
                Ok(count) => println!("[OK] 코퍼스 다시 읽음: {} 건\n", count),
                Err(e) => println!("[!] 코퍼스 로드 실패: {:#}\n", e),
            },
            question => {
                if session.send(&assistant, question).await.is_ok() {
                    let state = session.state();
                    if let Some(message) = state.messages.last() {
                        println!("\n{}\n", message.content);
                    }
                } else if let Some(error) = session.state().error {
                    println!("[!] {}\n", error);
                }
            }
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 설정으로 어시스턴트 구성 (코퍼스 로드 포함)
fn build_assistant(config: &Config) -> Result<FaqAssistant> {
    let corpus = load_corpus(&config.corpus_path)?;
    let embedder = OpenAiEmbedding::from_config(config)?;
    let chat = OpenAiChat::from_config(config)?;

    Ok(FaqAssistant::new(
        Arc::new(embedder),
        Arc::new(chat),
        Arc::new(CorpusHandle::new(corpus)),
        AssistantSettings::from(config),
    ))
}

/// 코퍼스 로드 (없으면 생성 방법 안내)
fn load_corpus(path: &Path) -> Result<Corpus> {
    if !path.exists() {
        bail!(
            "코퍼스 파일이 없습니다: {}\n\
             생성: neulbom-faq build --dir ./docs (샘플: neulbom-faq sample)",
            path.display()
        );
    }

    let corpus = Corpus::load(path)?;
    tracing::info!("Loaded {} documents from {:?}", corpus.len(), path);
    Ok(corpus)
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
