//! CLI 모듈
//!
//! hscode-rag CLI 명령어 정의 및 구현

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::agent::{classify_question, AnalysisLog, CaseAgent};
use crate::knowledge::{
    default_knowledge_dir, CaseScope, KnowledgeBase, PartitionedCaseIndex, DEFAULT_GROUP_RESULTS,
};
use crate::llm::prompts::QuestionType;
use crate::llm::{has_api_key, GeminiClient};
use crate::search::{extract_hs_codes, DualPathConsolidator};
use crate::websearch::{has_serper_key, render_hits, SerperClient, DEFAULT_SEARCH_HITS};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "hscode-rag")]
#[command(version, about = "HS 품목분류 하이브리드 RAG 챗봇", long_about = None)]
pub struct Cli {
    /// 지식 파일 디렉토리 (기본: ~/.hscode-rag/knowledge)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 질문 유형을 자동 분류하여 답변
    Ask {
        /// 질문
        question: String,
    },

    /// 관세율표 + 해설서 이중 경로 품목분류 검색
    Classify {
        /// 품명 또는 질의
        query: String,

        /// 후보 검색 후 모델 답변까지 생성
        #[arg(short, long)]
        answer: bool,
    },

    /// 분류사례 파티션 병렬 검색 + 통합 답변
    Cases {
        /// 질문
        question: String,

        /// 해외(미국·EU) 사례 검색
        #[arg(long)]
        overseas: bool,

        /// 그룹당 검색 결과 수
        #[arg(short, long, default_value_t = DEFAULT_GROUP_RESULTS)]
        max_results: usize,
    },

    /// HS 코드의 해설서 체계(부/류/호) 조회
    Manual {
        /// HS 코드 (텍스트 중에서 추출됨, 예: "3923.10")
        code: String,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let data_dir = cli.data_dir.unwrap_or_else(default_knowledge_dir);

    match cli.command {
        Commands::Ask { question } => cmd_ask(&data_dir, &question).await,
        Commands::Classify { query, answer } => cmd_classify(&data_dir, &query, answer).await,
        Commands::Cases {
            question,
            overseas,
            max_results,
        } => cmd_cases(&data_dir, &question, overseas, max_results).await,
        Commands::Manual { code } => cmd_manual(&data_dir, &code),
        Commands::Status => cmd_status(&data_dir),
    }
}

fn require_api_key() -> Result<()> {
    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n  \
             또는\n  \
             export GOOGLE_AI_API_KEY=your-api-key\n\n\
             API 키 발급: https://aistudio.google.com/app/apikey"
        );
    }
    Ok(())
}

fn build_agent(data_dir: &std::path::Path) -> Result<CaseAgent> {
    let kb = Arc::new(KnowledgeBase::load(data_dir));
    let index = Arc::new(PartitionedCaseIndex::build(&kb));
    let worker = Arc::new(GeminiClient::worker_from_env().context("워커 모델 초기화 실패")?);
    let head = Arc::new(GeminiClient::head_from_env().context("헤드 모델 초기화 실패")?);

    Ok(CaseAgent::new(kb, index, worker, head))
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 질문 명령어 (ask)
///
/// 질문 유형을 분류한 뒤 웹 검색 / 분류사례 검색 / 해설서 분석으로
/// 분기합니다.
async fn cmd_ask(data_dir: &std::path::Path, question: &str) -> Result<()> {
    require_api_key()?;

    let agent = build_agent(data_dir)?;
    let router = GeminiClient::worker_from_env()?;
    let mut log = AnalysisLog::new();

    println!("[*] 질문 유형 분류 중...");
    let question_type = classify_question(&router, question).await;
    println!("[*] 유형: {}", question_type.as_str());

    let answer = match question_type {
        QuestionType::WebSearch => {
            if !has_serper_key() {
                bail!(
                    "웹 검색에는 SERPER_API_KEY가 필요합니다.\n\
                     설정: export SERPER_API_KEY=your-key"
                );
            }
            let serper = SerperClient::from_env()?;
            let hits = serper.search(question, DEFAULT_SEARCH_HITS).await?;
            println!("\n+++ 웹검색 실시 +++\n");
            render_hits(&hits)
        }
        QuestionType::HsClassification => {
            println!("\n+++ HS 분류사례 검색 실시 +++\n");
            let result = agent
                .answer_cases(
                    question,
                    CaseScope::Domestic,
                    &log.render_history(),
                    DEFAULT_GROUP_RESULTS,
                )
                .await?;
            result.merged
        }
        QuestionType::HsManual => {
            println!("\n+++ HS 해설서 분석 실시 +++\n");
            agent.answer_manual(question, &log.render_history()).await?
        }
    };

    println!("{}", answer);
    log.push(question, &answer);

    Ok(())
}

/// 분류 검색 명령어 (classify)
///
/// 이중 경로 통합 검색 후보를 출력하고, --answer 시 모델 답변까지
/// 생성합니다.
async fn cmd_classify(data_dir: &std::path::Path, query: &str, answer: bool) -> Result<()> {
    println!("[*] 검색 중: \"{}\"", query);

    let kb = KnowledgeBase::load(data_dir);
    let consolidator = DualPathConsolidator::new(&kb.tariff, &kb.manual);
    let results = consolidator.consolidate(query);

    if results.is_empty() {
        println!("\n[!] 후보를 찾지 못했습니다.");
        return Ok(());
    }

    println!("\n[OK] HS 코드 후보 ({} 건):\n", results.len());
    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. HS {} [{}] (점수: {:.4})",
            i + 1,
            result.hs_code,
            result.confidence.as_str(),
            result.final_score
        );
        if let Some(ref name) = result.tariff_name {
            println!("   품명: {}", name);
        }
        println!("   경로: {}", result.sources().join(", "));
        if let Some(ref content) = result.manual_content {
            println!("   해설서: {}", truncate_text(content, 200));
        }
        println!();
    }

    if answer {
        require_api_key()?;
        let agent = build_agent(data_dir)?;

        println!("[*] 모델 답변 생성 중...\n");
        let response = agent.answer_classification(query, "").await?;
        println!("{}", response);
    }

    Ok(())
}

/// 분류사례 명령어 (cases)
///
/// 고정 파티션 그룹들을 병렬 질의하고 헤드 모델로 통합합니다.
async fn cmd_cases(
    data_dir: &std::path::Path,
    question: &str,
    overseas: bool,
    max_results: usize,
) -> Result<()> {
    require_api_key()?;

    let scope = if overseas {
        CaseScope::Overseas
    } else {
        CaseScope::Domestic
    };

    let agent = build_agent(data_dir)?;

    println!("[*] 파티션 병렬 검색 중...");
    let result = agent
        .answer_cases(question, scope, "", max_results)
        .await?;

    for group in &result.groups {
        println!(
            "\n--- 그룹 {} ({:.1}초) ---",
            group.group_name,
            group.elapsed.as_secs_f64()
        );
        println!("{}", group.answer);
    }

    println!("\n=== 최종 통합 답변 ===\n");
    println!("{}", result.merged);

    Ok(())
}

/// 해설서 조회 명령어 (manual)
///
/// 입력에서 HS 코드를 추출해 부/류/호 체계를 출력합니다.
fn cmd_manual(data_dir: &std::path::Path, code: &str) -> Result<()> {
    let codes = extract_hs_codes(code);
    if codes.is_empty() {
        bail!("HS 코드를 찾을 수 없습니다 (4자리 이상 숫자 필요): {}", code);
    }

    let kb = KnowledgeBase::load(data_dir);

    for code in &codes {
        let result = kb.manual.lookup(code);
        println!("=== HS {} ===", code);

        for (level, entry) in [
            ("부", result.section),
            ("류", result.chapter),
            ("호", result.heading),
        ] {
            match entry {
                Some(entry) => {
                    println!(
                        "[{}] {} / {}",
                        level, entry.header_primary, entry.header_secondary
                    );
                    println!("{}", truncate_text(&entry.text, 400));
                }
                None => println!("[{}] 찾을 수 없습니다.", level),
            }
        }
        println!();
    }

    Ok(())
}

/// 상태 명령어 (status)
fn cmd_status(data_dir: &std::path::Path) -> Result<()> {
    println!("hscode-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 지식 디렉토리: {}", data_dir.display());

    if has_api_key() {
        println!("[OK] Gemini API 키: 설정됨");
    } else {
        println!("[!] Gemini API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    if has_serper_key() {
        println!("[OK] Serper API 키: 설정됨");
    } else {
        println!("[!] Serper API 키: 미설정 (웹 검색 비활성)");
    }

    let kb = KnowledgeBase::load(data_dir);
    let stats = kb.stats();

    println!();
    println!("[*] 적재된 지식:");
    for (source, count) in &stats.case_counts {
        let marker = if *count > 0 { "OK" } else { "!" };
        println!("  [{}] {}: {} 건", marker, source, count);
    }
    println!("  관세율표: {} 행", stats.tariff_rows);
    println!("  해설서: {} 항목", stats.manual_entries);

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

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

// ============================================================================
// Tests
// ============================================================================
