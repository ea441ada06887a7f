//! 에이전트 모듈 - 파티션 병렬 질의와 답변 통합
//!
//! 분류사례 질의 하나를 고정 파티션 그룹들로 팬아웃합니다. 워커마다
//! (a) 공유 읽기 전용 인덱스에 대한 로컬 질의, (b) 외부 LLM 호출을
//! 수행하고 (그룹 번호, 답변, 소요 시간)을 돌려줍니다. 워커 수는
//! 세마포어로 제한되며, 결과는 완료 순서로 수집된 뒤 그룹 번호로
//! 재정렬되어 헤드 모델 통합 프롬프트에 들어갑니다.
//!
//! 실패 정책: 그룹 하나의 실패는 경고 후 건너뛰고 남은 그룹만으로
//! 통합합니다. 모든 그룹이 실패한 경우에만 오류를 반환합니다.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::knowledge::{CaseScope, KnowledgeBase, PartitionedCaseIndex};
use crate::llm::{prompts, LlmProvider};
use crate::search::{extract_hs_codes, render_context, CandidateResult, DualPathConsolidator};

/// 동시 실행 워커 수 (5개 그룹에 3 워커)
pub const MAX_PARALLEL_WORKERS: usize = 3;

/// 분석 기록 보존 한도 (초과 시 가장 오래된 기록부터 제거)
pub const MAX_HISTORY: usize = 20;

// ============================================================================
// Analysis Log
// ============================================================================

/// 분석 기록 한 건
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRecord {
    pub asked_at: DateTime<Utc>,
    pub question: String,
    pub answer: String,
}

/// 세션 단위 분석 기록
///
/// 추가 전용이며 보존 한도를 넘으면 가장 오래된 기록이 밀려납니다.
/// 병렬 워커는 이 기록을 건드리지 않습니다 - 모든 워커가 합류한 뒤
/// 최상위 호출만 기록을 갱신합니다.
#[derive(Debug, Default)]
pub struct AnalysisLog {
    records: VecDeque<AnalysisRecord>,
}

impl AnalysisLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, question: &str, answer: &str) {
        if self.records.len() >= MAX_HISTORY {
            self.records.pop_front();
        }
        self.records.push_back(AnalysisRecord {
            asked_at: Utc::now(),
            question: question.to_string(),
            answer: answer.to_string(),
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 프롬프트에 넣을 이전 대화 텍스트
    pub fn render_history(&self) -> String {
        self.records
            .iter()
            .map(|r| format!("사용자: {}\n품목분류 전문가: {}", r.question, r.answer))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============================================================================
// CaseAgent
// ============================================================================

/// 그룹 하나의 답변
#[derive(Debug, Clone)]
pub struct GroupAnswer {
    pub group_index: usize,
    pub group_name: String,
    pub answer: String,
    pub elapsed: Duration,
}

/// 파티션 질의 + 헤드 통합 결과
#[derive(Debug, Clone)]
pub struct CaseAnswer {
    /// 헤드 모델의 최종 통합 답변
    pub merged: String,
    /// 그룹 번호 순서로 정렬된 부분 답변
    pub groups: Vec<GroupAnswer>,
}

/// 분류사례 에이전트
///
/// 공유 읽기 전용 인덱스와 두 LLM(워커/헤드)을 쥐고 질의 흐름을
/// 조율합니다.
pub struct CaseAgent {
    kb: Arc<KnowledgeBase>,
    index: Arc<PartitionedCaseIndex>,
    worker: Arc<dyn LlmProvider>,
    head: Arc<dyn LlmProvider>,
}

impl CaseAgent {
    pub fn new(
        kb: Arc<KnowledgeBase>,
        index: Arc<PartitionedCaseIndex>,
        worker: Arc<dyn LlmProvider>,
        head: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            kb,
            index,
            worker,
            head,
        }
    }

    /// 분류사례 질의: 파티션 팬아웃 → 헤드 통합
    pub async fn answer_cases(
        &self,
        question: &str,
        scope: CaseScope,
        history: &str,
        max_results: usize,
    ) -> Result<CaseAnswer> {
        let group_count = self.index.groups(scope).len();
        let semaphore = Arc::new(Semaphore::new(MAX_PARALLEL_WORKERS));
        let mut join_set = JoinSet::new();

        for group_index in 0..group_count {
            let semaphore = Arc::clone(&semaphore);
            let index = Arc::clone(&self.index);
            let worker = Arc::clone(&self.worker);
            let question = question.to_string();
            let history = history.to_string();

            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| anyhow::anyhow!("세마포어 오류: {}", e))?;

                let started = Instant::now();
                let group_name = index.groups(scope)[group_index].name.clone();

                let context = index.query_group(&question, scope, group_index, max_results)?;
                let prompt =
                    prompts::partition_agent(&group_name, &question, &history, &context);
                let answer = worker.complete(&prompt).await?;

                Ok::<GroupAnswer, anyhow::Error>(GroupAnswer {
                    group_index,
                    group_name,
                    answer,
                    elapsed: started.elapsed(),
                })
            });
        }

        // 완료 순서로 수집 (제출 순서 아님)
        let mut answers: Vec<GroupAnswer> = Vec::with_capacity(group_count);
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(answer)) => {
                    tracing::debug!(
                        "그룹 {} 완료 ({:.1}초)",
                        answer.group_name,
                        answer.elapsed.as_secs_f64()
                    );
                    answers.push(answer);
                }
                Ok(Err(e)) => tracing::warn!("그룹 질의 실패, 건너뜀: {:#}", e),
                Err(e) => tracing::warn!("워커 태스크 중단, 건너뜀: {}", e),
            }
        }

        if answers.is_empty() {
            bail!("모든 파티션 질의가 실패했습니다");
        }

        // 헤드 통합은 그룹 번호 순서에 민감하므로 재정렬
        answers.sort_by_key(|a| a.group_index);

        let named: Vec<(String, String)> = answers
            .iter()
            .map(|a| (a.group_name.clone(), a.answer.clone()))
            .collect();
        let prompt = prompts::head_merge(question, history, &named);
        let merged = self
            .head
            .complete(&prompt)
            .await
            .context("헤드 통합 호출 실패")?;

        Ok(CaseAnswer {
            merged,
            groups: answers,
        })
    }

    /// 해설서 분석 질의
    ///
    /// 질문에 HS 코드가 있으면 부/류/호 체계를 직접 해석하고, 없으면
    /// 이중 경로 통합 검색으로 후보를 만든 뒤 답변을 생성합니다.
    /// 임계 길이를 넘는 해설 내용은 워커 모델로 요약해 컨텍스트를
    /// 압축합니다.
    pub async fn answer_manual(&self, question: &str, history: &str) -> Result<String> {
        let codes = extract_hs_codes(question);

        let context = if codes.is_empty() {
            let consolidator = DualPathConsolidator::new(&self.kb.tariff, &self.kb.manual);
            let mut results = consolidator.consolidate(question);
            self.summarize_long_contents(&mut results).await;
            render_context(&results)
        } else {
            let mut blocks = Vec::with_capacity(codes.len());
            for code in &codes {
                let lookup = self.kb.manual.lookup(code);
                match lookup.combined_text() {
                    Some(text) => blocks.push(format!("HS {}:\n{}", code, text)),
                    None => blocks.push(format!("HS {}: 해설서에서 찾을 수 없습니다.", code)),
                }
            }
            blocks.join("\n\n")
        };

        let prompt = prompts::classification_answer(question, history, &context);
        let answer = self.worker.complete(&prompt).await?;
        Ok(answer)
    }

    /// 이중 경로 통합 검색 + 답변 생성
    pub async fn answer_classification(&self, question: &str, history: &str) -> Result<String> {
        let consolidator = DualPathConsolidator::new(&self.kb.tariff, &self.kb.manual);
        let mut results = consolidator.consolidate(question);
        self.summarize_long_contents(&mut results).await;

        let context = render_context(&results);
        let prompt = prompts::classification_answer(question, history, &context);
        let answer = self.worker.complete(&prompt).await?;
        Ok(answer)
    }

    /// 임계 길이를 넘는 해설 내용을 모델 요약으로 교체
    ///
    /// 요약 호출이 실패하면 경고 후 원문을 그대로 둡니다.
    async fn summarize_long_contents(&self, results: &mut [CandidateResult]) {
        for result in results.iter_mut() {
            if !result.needs_summary() {
                continue;
            }
            let Some(content) = result.manual_content.as_ref() else {
                continue;
            };

            let prompt = prompts::summarize_manual(&result.hs_code, content);
            match self.worker.complete(&prompt).await {
                Ok(summary) => result.manual_content = Some(summary),
                Err(e) => {
                    tracing::warn!("해설 요약 실패 (HS {}): {}", result.hs_code, e);
                }
            }
        }
    }
}

// ============================================================================
// Question Routing
// ============================================================================

/// 질문 유형 분류
///
/// 분류 호출이 실패하면 기본 유형(분류사례 검색)으로 폴백합니다.
pub async fn classify_question(llm: &dyn LlmProvider, question: &str) -> prompts::QuestionType {
    let prompt = prompts::classify_question(question);
    match llm.complete(&prompt).await {
        Ok(response) => prompts::parse_question_type(&response),
        Err(e) => {
            tracing::warn!("질문 유형 분류 실패, 기본 유형 사용: {}", e);
            prompts::QuestionType::HsClassification
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
