//! 评审流程 - 流程层
//!
//! 核心职责：定义"一篇论文"的完整评审流程
//!
//! 流程顺序（严格串行，每个阶段只写自己的字段）：
//! 1. Intake → 2. QueryGeneration → 3. RelatedWorkSearch → 4. Ranking
//! 5. Summarization → 6. StrengthIdentification → 7. WeaknessAnalysis
//! 8. ReviewComposition → 9. Scoring
//!
//! 除第 3 阶段（搜索失败降级为零候选）外，任何阶段失败都直接返回 `StageError`

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::ReviewConfig;
use crate::error::StageError;
use crate::models::{
    CandidateWork, ChunkKind, ContentChunk, ExtractedContent, Finding, PeerReview, RelatedWork,
    SearchQuery,
};
use crate::ranking::{build_chunks, tokenize, ContentRanker};
use crate::scoring::{calibrate, interpret_score};
use crate::services::{RelatedWorkSearch, TextCompletion};
use crate::utils::truncate_text;
use crate::workflow::review_parse::{parse_finding_lines, parse_queries, parse_scores, FindingLine};
use crate::workflow::review_state::{DimensionalScores, PaperMeta, ReviewState};
use crate::workflow::ReviewStage;

/// 证据摘录的最大字符数
const MAX_EVIDENCE_CHARS: usize = 300;
/// 相关工作摘要的最大字符数
const MAX_SUMMARY_CHARS: usize = 500;
/// 评分提示词中评审正文的最大字符数
const MAX_REVIEW_CHARS: usize = 4000;

const REVIEWER_SYSTEM: &str = "You are an experienced, fair and specific peer reviewer.";

/// 评审流程
///
/// - 不持有论文内容，每次 `run` 传入
/// - 只依赖能力层（LLM / 搜索）和纯计算模块（排序 / 校准）
pub struct ReviewStateMachine {
    llm: Arc<dyn TextCompletion>,
    search: Arc<dyn RelatedWorkSearch>,
    top_k: usize,
    context_chunks: usize,
    venue: String,
}

impl ReviewStateMachine {
    /// 创建新的评审流程
    pub fn new(
        llm: Arc<dyn TextCompletion>,
        search: Arc<dyn RelatedWorkSearch>,
        config: &ReviewConfig,
    ) -> Self {
        Self {
            llm,
            search,
            top_k: config.top_k.max(1),
            context_chunks: config.context_chunks.max(1),
            venue: config.venue.clone(),
        }
    }

    /// 评审使用的模型
    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// 执行完整评审
    pub async fn run(&self, content: &ExtractedContent) -> Result<PeerReview, StageError> {
        let state = self.execute(content).await?;
        let review = state.into_review()?;
        info!(
            "[评审] ✓ 完成: {:.2}/10 ({})",
            review.overall_score,
            interpret_score(review.overall_score)
        );
        Ok(review)
    }

    /// 执行九个阶段，返回完整的状态（测试中用来检查访问顺序）
    pub async fn execute(&self, content: &ExtractedContent) -> Result<ReviewState, StageError> {
        let mut state = ReviewState::new();
        let paper = ContentRanker::build(build_chunks(content));

        self.intake(&mut state, content)?;
        self.generate_queries(&mut state).await?;
        self.search_related_work(&mut state).await?;
        self.rank_candidates(&mut state)?;
        self.summarize_related_work(&mut state, &paper).await?;
        self.identify_strengths(&mut state, &paper).await?;
        self.analyse_weaknesses(&mut state, &paper).await?;
        self.compose_review(&mut state).await?;
        self.score(&mut state).await?;

        Ok(state)
    }

    // ========== 阶段 1: Intake ==========

    fn intake(&self, state: &mut ReviewState, content: &ExtractedContent) -> Result<(), StageError> {
        let stage = ReviewStage::Intake;
        state.enter(stage)?;

        if content.title.trim().is_empty() {
            return Err(StageError::Intake("缺少标题".to_string()));
        }
        if !content.has_body() {
            return Err(StageError::Intake(format!("《{}》没有正文", content.title)));
        }

        log_stage(stage, &format!("📄 《{}》", truncate_text(&content.title, 60)));
        state.paper_meta.fill(
            stage,
            PaperMeta {
                title: content.title.trim().to_string(),
                authors: content.authors.clone(),
                abstract_text: content.abstract_text.trim().to_string(),
                section_titles: content.sections.iter().map(|s| s.title.clone()).collect(),
            },
        )
    }

    // ========== 阶段 2: QueryGeneration ==========

    async fn generate_queries(&self, state: &mut ReviewState) -> Result<(), StageError> {
        let stage = ReviewStage::QueryGeneration;
        state.enter(stage)?;
        let meta = state.paper_meta.read(stage)?.clone();

        let prompt = format!(
            "Generate search queries to find related work for this paper.\n\
             Return exactly three lines in the form `level: query` where level is one of \
             benchmarks, related_problems, related_techniques.\n\n\
             Title: {}\nAbstract: {}",
            meta.title,
            truncate_text(&meta.abstract_text, 2000)
        );
        let response = self.ask(stage, &prompt).await?;
        let queries = parse_queries(&response, &meta.title);

        log_stage(stage, &format!("🔍 生成 {} 个检索词", queries.len()));
        for q in &queries {
            debug!("  [{}] {}", q.specificity_level, q.text);
        }
        state.queries.fill(stage, queries)
    }

    // ========== 阶段 3: RelatedWorkSearch ==========

    async fn search_related_work(&self, state: &mut ReviewState) -> Result<(), StageError> {
        let stage = ReviewStage::RelatedWorkSearch;
        state.enter(stage)?;
        let queries: Vec<SearchQuery> = state.queries.read(stage)?.clone();

        // 检索词之间互不依赖，并发搜索；结果按检索词顺序合并
        let responses = join_all(queries.iter().map(|q| self.search.search(&q.text))).await;

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for response in responses {
            match response {
                Ok(results) => {
                    for candidate in results {
                        if seen.insert(candidate.dedup_key()) {
                            candidates.push(candidate);
                        }
                    }
                }
                Err(e) => {
                    warn!("[评审 {}/9] ⚠️ 相关工作搜索失败，按无结果处理: {}", stage.number(), e);
                }
            }
        }

        log_stage(stage, &format!("📚 找到 {} 篇候选论文", candidates.len()));
        state.candidates.fill(stage, candidates)
    }

    // ========== 阶段 4: Ranking ==========

    fn rank_candidates(&self, state: &mut ReviewState) -> Result<(), StageError> {
        let stage = ReviewStage::Ranking;
        state.enter(stage)?;
        let candidates = state.candidates.read(stage)?.clone();
        let query = state.paper_meta.read(stage)?.ranking_query().to_string();

        let ranked = rank_by_overlap(&candidates, &query, self.top_k);

        log_stage(
            stage,
            &format!("📊 保留 {}/{} 篇相关工作", ranked.len(), candidates.len()),
        );
        state.ranked_candidates.fill(stage, ranked)
    }

    // ========== 阶段 5: Summarization ==========

    async fn summarize_related_work(
        &self,
        state: &mut ReviewState,
        paper: &ContentRanker,
    ) -> Result<(), StageError> {
        let stage = ReviewStage::Summarization;
        state.enter(stage)?;
        let ranked = state.ranked_candidates.read(stage)?.clone();
        let title = state.paper_meta.read(stage)?.title.clone();

        let mut summaries = Vec::with_capacity(ranked.len());
        for candidate in ranked {
            let summary = if candidate.abstract_or_summary.trim().is_empty() {
                // 没有摘要时用论文中与候选标题最相关的片段做上下文
                let excerpts = render_excerpts(&paper.rank(&candidate.title, self.context_chunks));
                let prompt = format!(
                    "Summarize the related paper \"{}\" ({}) in two sentences, \
                     focusing on how it relates to \"{}\".\n\n\
                     Relevant excerpts from \"{}\":\n{}",
                    candidate.title, candidate.url, title, title, excerpts
                );
                self.ask(stage, &prompt).await?
            } else {
                leading_sentences(&candidate.abstract_or_summary, 2, MAX_SUMMARY_CHARS)
            };

            summaries.push(RelatedWork {
                title: candidate.title,
                url: candidate.url,
                summary,
                relevance_score: candidate.relevance_score,
            });
        }

        log_stage(stage, &format!("📝 生成 {} 条相关工作摘要", summaries.len()));
        state.summaries.fill(stage, summaries)
    }

    // ========== 阶段 6: StrengthIdentification ==========

    async fn identify_strengths(
        &self,
        state: &mut ReviewState,
        paper: &ContentRanker,
    ) -> Result<(), StageError> {
        let stage = ReviewStage::StrengthIdentification;
        state.enter(stage)?;
        let meta = state.paper_meta.read(stage)?.clone();
        let related = related_context(state.summaries.read(stage)?);
        let context = self.paper_context(paper, &meta, "contribution novelty results strengths");

        let prompt = format!(
            "Identify the strengths of this paper as a peer reviewer for {}.\n\
             List 3-5 specific strengths, one per line, as `strength | section`.\n\n\
             Title: {}\n\nPaper excerpts:\n{}\n\nRelated works:\n{}",
            self.venue, meta.title, context, related
        );
        let response = self.ask(stage, &prompt).await?;
        let not_evidence = non_evidence_ids(paper);
        let strengths: Vec<Finding> = parse_finding_lines(&response)
            .into_iter()
            .map(|line| ground_finding(paper, &not_evidence, line))
            .collect();

        log_stage(stage, &format!("✅ 识别 {} 条优点", strengths.len()));
        state.strengths.fill(stage, strengths)
    }

    // ========== 阶段 7: WeaknessAnalysis ==========

    async fn analyse_weaknesses(
        &self,
        state: &mut ReviewState,
        paper: &ContentRanker,
    ) -> Result<(), StageError> {
        let stage = ReviewStage::WeaknessAnalysis;
        state.enter(stage)?;
        let meta = state.paper_meta.read(stage)?.clone();
        let related = related_context(state.summaries.read(stage)?);
        let strengths = state.strengths.read(stage)?.clone();
        let context = self.paper_context(paper, &meta, "limitations assumptions experiments baselines");

        let prompt = format!(
            "Identify the weaknesses of this paper as a peer reviewer for {}.\n\
             List 3-5 specific weaknesses, one per line, as `weakness | section | suggestion`. \
             Every weakness must cite a section or claim of the paper.\n\n\
             Title: {}\n\nPaper excerpts:\n{}\n\nRelated works:\n{}\n\nAlready noted strengths:\n{}",
            self.venue,
            meta.title,
            context,
            related,
            bullet_list(strengths.iter().map(|f| f.statement.as_str()))
        );
        let response = self.ask(stage, &prompt).await?;
        let lines = parse_finding_lines(&response);

        let suggestions: Vec<String> = lines.iter().filter_map(|l| l.suggestion.clone()).collect();
        let not_evidence = non_evidence_ids(paper);
        let weaknesses: Vec<Finding> = lines
            .into_iter()
            .map(|line| ground_finding(paper, &not_evidence, line))
            .collect();

        log_stage(
            stage,
            &format!("⚠️ 识别 {} 条缺点, {} 条建议", weaknesses.len(), suggestions.len()),
        );
        state.weaknesses.fill(stage, weaknesses)?;
        state.suggestions.fill(stage, suggestions)
    }

    // ========== 阶段 8: ReviewComposition ==========

    async fn compose_review(&self, state: &mut ReviewState) -> Result<(), StageError> {
        let stage = ReviewStage::ReviewComposition;
        state.enter(stage)?;
        let meta = state.paper_meta.read(stage)?.clone();
        let related = related_context(state.summaries.read(stage)?);
        let strengths = render_findings(state.strengths.read(stage)?);
        let weaknesses = render_findings(state.weaknesses.read(stage)?);
        let suggestions = bullet_list(state.suggestions.read(stage)?.iter().map(String::as_str));

        let prompt = format!(
            "Write a structured peer review for this paper.\n\
             Include: Summary, Strengths, Weaknesses, Questions, Suggestions, and Overall Assessment.\n\n\
             Title: {}\nVenue: {}\n\nStrengths:\n{}\n\nWeaknesses:\n{}\n\nSuggestions:\n{}\n\nRelated works:\n{}",
            meta.title, self.venue, strengths, weaknesses, suggestions, related
        );
        let review_text = self.ask(stage, &prompt).await?;

        log_stage(stage, &format!("🖊️ 评审正文 {} 字符", review_text.chars().count()));
        state.review_text.fill(stage, review_text)
    }

    // ========== 阶段 9: Scoring ==========

    async fn score(&self, state: &mut ReviewState) -> Result<(), StageError> {
        let stage = ReviewStage::Scoring;
        state.enter(stage)?;
        let meta = state.paper_meta.read(stage)?.clone();
        let strengths = render_findings(state.strengths.read(stage)?);
        let weaknesses = render_findings(state.weaknesses.read(stage)?);
        let review_text = truncate_text(state.review_text.read(stage)?, MAX_REVIEW_CHARS);

        let prompt = format!(
            "Score this paper on a 1-4 scale for soundness, presentation and contribution, \
             and give your confidence on a 1-5 scale.\n\
             Return ONLY a JSON object: \
             {{\"soundness\": n, \"presentation\": n, \"contribution\": n, \"confidence\": n, \
             \"comments\": {{\"soundness\": \"...\", \"presentation\": \"...\", \"contribution\": \"...\"}}}}\n\n\
             Title: {}\n\nStrengths:\n{}\n\nWeaknesses:\n{}\n\nReview:\n{}",
            meta.title, strengths, weaknesses, review_text
        );
        let response = self.ask(stage, &prompt).await?;
        let parsed = parse_scores(&response);

        let final_score = calibrate(parsed.soundness, parsed.presentation, parsed.contribution);
        log_stage(
            stage,
            &format!(
                "🎯 S={:.1} P={:.1} C={:.1} → {:.4}{}",
                parsed.soundness,
                parsed.presentation,
                parsed.contribution,
                final_score,
                if parsed.fallback { " (默认分)" } else { "" }
            ),
        );

        state.dimensional_scores.fill(
            stage,
            DimensionalScores {
                soundness: parsed.soundness,
                presentation: parsed.presentation,
                contribution: parsed.contribution,
                confidence: parsed.confidence,
                comments: parsed.comments,
            },
        )?;
        state.final_score.fill(stage, final_score)
    }

    // ========== 辅助函数 ==========

    async fn ask(&self, stage: ReviewStage, prompt: &str) -> Result<String, StageError> {
        self.llm
            .complete(prompt, Some(REVIEWER_SYSTEM))
            .await
            .map_err(|e| StageError::llm(stage, e))
    }

    fn paper_context(&self, paper: &ContentRanker, meta: &PaperMeta, focus: &str) -> String {
        render_excerpts(&paper.rank_multi(&[meta.title.as_str(), focus], self.context_chunks))
    }
}

fn render_excerpts(chunks: &[ContentChunk]) -> String {
    if chunks.is_empty() {
        return "(none)".to_string();
    }
    chunks
        .iter()
        .map(|c| format!("[{}] {}", c.source_section, truncate_text(&c.text, 800)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 用词重叠对候选排序，保留前 k 个
///
/// 得分 = 重叠词数 / 查询词数；同分保持搜索返回的顺序
fn rank_by_overlap(candidates: &[CandidateWork], query: &str, k: usize) -> Vec<CandidateWork> {
    let chunks: Vec<ContentChunk> = candidates
        .iter()
        .enumerate()
        .map(|(idx, c)| {
            ContentChunk::new(
                format!("candidate-{}", idx),
                c.title.clone(),
                c.abstract_or_summary.clone(),
                ChunkKind::Candidate,
            )
        })
        .collect();
    let ranker = ContentRanker::build(chunks);
    let query_len = tokenize(query).len().max(1) as f64;

    ranker
        .rank_scored(query, k, &HashSet::new())
        .into_iter()
        .map(|scored| CandidateWork {
            relevance_score: scored.score as f64 / query_len,
            ..candidates[scored.position].clone()
        })
        .collect()
}

/// 不能作为证据的 chunk（公式说明、参考文献）
fn non_evidence_ids(paper: &ContentRanker) -> HashSet<String> {
    paper
        .chunks()
        .filter(|c| !matches!(c.kind, ChunkKind::Abstract | ChunkKind::Section))
        .map(|c| c.id.clone())
        .collect()
}

/// 为评审条目找到论文正文中的支撑片段
fn ground_finding(paper: &ContentRanker, exclude: &HashSet<String>, line: FindingLine) -> Finding {
    let query = match &line.section {
        Some(section) => format!("{} {}", section, line.statement),
        None => line.statement.clone(),
    };
    let best = paper.rank_excluding(&query, 1, exclude).into_iter().next();

    let section = line
        .section
        .or_else(|| best.as_ref().map(|c| c.source_section.clone()))
        .unwrap_or_else(|| "General".to_string());
    let evidence = best
        .map(|c| truncate_text(&c.text, MAX_EVIDENCE_CHARS))
        .unwrap_or_default();

    Finding {
        statement: line.statement,
        section,
        evidence,
    }
}

fn leading_sentences(text: &str, count: usize, max_chars: usize) -> String {
    let text = text.trim();
    let mut out = String::new();
    let mut taken = 0;
    for (idx, c) in text.char_indices() {
        out.push(c);
        if matches!(c, '.' | '!' | '?') {
            let next = text[idx + c.len_utf8()..].chars().next();
            if next.map_or(true, char::is_whitespace) {
                taken += 1;
                if taken == count {
                    break;
                }
            }
        }
    }
    truncate_text(out.trim(), max_chars)
}

fn related_context(summaries: &[RelatedWork]) -> String {
    if summaries.is_empty() {
        return "(none found)".to_string();
    }
    summaries
        .iter()
        .map(|w| format!("- {}: {}", w.title, w.summary))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_findings(findings: &[Finding]) -> String {
    let lines: Vec<String> = findings
        .iter()
        .map(|f| format!("{} (section: {})", f.statement, f.section))
        .collect();
    bullet_list(lines.iter().map(String::as_str))
}

fn bullet_list<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let lines: Vec<String> = items.map(|s| format!("- {}", s)).collect();
    if lines.is_empty() {
        "(none)".to_string()
    } else {
        lines.join("\n")
    }
}

fn log_stage(stage: ReviewStage, message: &str) {
    info!("[评审 {}/9] {} {}", stage.number(), stage, message);
}
