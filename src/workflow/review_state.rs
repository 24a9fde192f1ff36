//! 评审状态 - 单写者字段
//!
//! `ReviewState` 是九个阶段共享的累加器。每个字段是一个 `StageSlot`：
//! - 只能由指定阶段写入，且只能写一次
//! - 只能被严格晚于写入阶段的阶段读取
//!
//! 每次读写都记录到访问日志，便于校验"先写后读"。

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::error::StageError;
use crate::models::{CandidateWork, Finding, PeerReview, RelatedWork, SearchQuery, DimensionScore};
use crate::scoring::{WEIGHT_CONTRIBUTION, WEIGHT_PRESENTATION, WEIGHT_SOUNDNESS};
use crate::workflow::ReviewStage;

/// 访问类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Write,
    Read,
}

/// 一次字段访问
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAccess {
    pub field: &'static str,
    pub stage: ReviewStage,
    pub kind: AccessKind,
}

type AccessLog = Arc<Mutex<Vec<SlotAccess>>>;

/// 单写者字段
#[derive(Debug)]
pub struct StageSlot<T> {
    field: &'static str,
    owner: ReviewStage,
    value: Option<T>,
    log: AccessLog,
}

impl<T> StageSlot<T> {
    fn new(field: &'static str, owner: ReviewStage, log: &AccessLog) -> Self {
        Self {
            field,
            owner,
            value: None,
            log: Arc::clone(log),
        }
    }

    pub fn owner(&self) -> ReviewStage {
        self.owner
    }

    pub fn is_written(&self) -> bool {
        self.value.is_some()
    }

    /// 写入字段
    pub fn fill(&mut self, writer: ReviewStage, value: T) -> Result<(), StageError> {
        if writer != self.owner {
            return Err(StageError::ForeignWriter {
                field: self.field,
                owner: self.owner,
                writer,
            });
        }
        if self.value.is_some() {
            return Err(StageError::SlotAlreadyWritten {
                field: self.field,
                owner: self.owner,
            });
        }
        self.record(writer, AccessKind::Write);
        self.value = Some(value);
        Ok(())
    }

    /// 读取字段，读者必须晚于写入阶段
    pub fn read(&self, reader: ReviewStage) -> Result<&T, StageError> {
        let not_written = || StageError::SlotNotWritten {
            field: self.field,
            owner: self.owner,
            reader,
        };
        if reader <= self.owner {
            return Err(not_written());
        }
        let value = self.value.as_ref().ok_or_else(not_written)?;
        self.record(reader, AccessKind::Read);
        Ok(value)
    }

    fn into_inner(self) -> Result<T, StageError> {
        let (field, owner) = (self.field, self.owner);
        self.value.ok_or(StageError::SlotNotWritten {
            field,
            owner,
            reader: ReviewStage::Scoring,
        })
    }

    fn record(&self, stage: ReviewStage, kind: AccessKind) {
        if let Ok(mut log) = self.log.lock() {
            log.push(SlotAccess {
                field: self.field,
                stage,
                kind,
            });
        }
    }
}

/// 论文元信息（Intake 阶段写入）
#[derive(Debug, Clone, PartialEq)]
pub struct PaperMeta {
    pub title: String,
    pub authors: Vec<String>,
    pub abstract_text: String,
    pub section_titles: Vec<String>,
}

impl PaperMeta {
    /// 用于排序和检索词生成的查询文本：优先摘要，否则标题
    pub fn ranking_query(&self) -> &str {
        if self.abstract_text.trim().is_empty() {
            &self.title
        } else {
            &self.abstract_text
        }
    }
}

/// 三个维度分与置信度（Scoring 阶段写入）
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionalScores {
    pub soundness: f64,
    pub presentation: f64,
    pub contribution: f64,
    pub confidence: f64,
    pub comments: BTreeMap<String, String>,
}

/// 评审累加器
#[derive(Debug)]
pub struct ReviewState {
    current: Option<ReviewStage>,
    log: AccessLog,
    pub paper_meta: StageSlot<PaperMeta>,
    pub queries: StageSlot<Vec<SearchQuery>>,
    pub candidates: StageSlot<Vec<CandidateWork>>,
    pub ranked_candidates: StageSlot<Vec<CandidateWork>>,
    pub summaries: StageSlot<Vec<RelatedWork>>,
    pub strengths: StageSlot<Vec<Finding>>,
    pub weaknesses: StageSlot<Vec<Finding>>,
    pub suggestions: StageSlot<Vec<String>>,
    pub review_text: StageSlot<String>,
    pub dimensional_scores: StageSlot<DimensionalScores>,
    pub final_score: StageSlot<f64>,
}

impl Default for ReviewState {
    fn default() -> Self {
        Self::new()
    }
}

impl ReviewState {
    pub fn new() -> Self {
        let log: AccessLog = Arc::new(Mutex::new(Vec::new()));
        use ReviewStage::*;
        Self {
            current: None,
            paper_meta: StageSlot::new("paper_meta", Intake, &log),
            queries: StageSlot::new("queries", QueryGeneration, &log),
            candidates: StageSlot::new("candidates", RelatedWorkSearch, &log),
            ranked_candidates: StageSlot::new("ranked_candidates", Ranking, &log),
            summaries: StageSlot::new("summaries", Summarization, &log),
            strengths: StageSlot::new("strengths", StrengthIdentification, &log),
            weaknesses: StageSlot::new("weaknesses", WeaknessAnalysis, &log),
            suggestions: StageSlot::new("suggestions", WeaknessAnalysis, &log),
            review_text: StageSlot::new("review_text", ReviewComposition, &log),
            dimensional_scores: StageSlot::new("dimensional_scores", Scoring, &log),
            final_score: StageSlot::new("final_score", Scoring, &log),
            log,
        }
    }

    /// 当前所处阶段
    pub fn current_stage(&self) -> Option<ReviewStage> {
        self.current
    }

    /// 进入下一个阶段，顺序不对时报错
    pub fn enter(&mut self, stage: ReviewStage) -> Result<(), StageError> {
        let expected = match self.current {
            None => Some(ReviewStage::Intake),
            Some(current) => current.next(),
        };
        match expected {
            Some(expected) if expected == stage => {
                self.current = Some(stage);
                Ok(())
            }
            Some(expected) => Err(StageError::OutOfOrder {
                expected,
                actual: stage,
            }),
            // Scoring 之后没有阶段
            None => Err(StageError::OutOfOrder {
                expected: ReviewStage::Scoring,
                actual: stage,
            }),
        }
    }

    /// 访问日志快照
    pub fn access_log(&self) -> Vec<SlotAccess> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// 由完整的状态构造最终评审结果
    pub fn into_review(self) -> Result<PeerReview, StageError> {
        let scores = self.dimensional_scores.into_inner()?;
        let overall_score = self.final_score.into_inner()?;

        let mut dimensions = BTreeMap::new();
        for (name, score, weight) in [
            ("soundness", scores.soundness, WEIGHT_SOUNDNESS),
            ("presentation", scores.presentation, WEIGHT_PRESENTATION),
            ("contribution", scores.contribution, WEIGHT_CONTRIBUTION),
        ] {
            dimensions.insert(
                name.to_string(),
                DimensionScore {
                    score,
                    weight,
                    comments: scores.comments.get(name).cloned().unwrap_or_default(),
                },
            );
        }

        Ok(PeerReview {
            overall_score,
            confidence: scores.confidence,
            dimensions,
            strengths: self.strengths.into_inner()?,
            weaknesses: self.weaknesses.into_inner()?,
            suggestions: self.suggestions.into_inner()?,
            related_works: self.summaries.into_inner()?,
            raw_review_text: self.review_text.into_inner()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> PaperMeta {
        PaperMeta {
            title: "T".to_string(),
            authors: vec![],
            abstract_text: String::new(),
            section_titles: vec![],
        }
    }

    #[test]
    fn test_slot_single_writer() {
        let mut state = ReviewState::new();
        state.paper_meta.fill(ReviewStage::Intake, meta()).unwrap();

        let again = state.paper_meta.fill(ReviewStage::Intake, meta());
        assert!(matches!(again, Err(StageError::SlotAlreadyWritten { .. })));

        let foreign = state.queries.fill(ReviewStage::Scoring, vec![]);
        assert!(matches!(foreign, Err(StageError::ForeignWriter { .. })));
        assert!(!state.queries.is_written());
    }

    #[test]
    fn test_slot_read_requires_later_stage() {
        let mut state = ReviewState::new();
        state.paper_meta.fill(ReviewStage::Intake, meta()).unwrap();

        assert!(state.paper_meta.read(ReviewStage::Intake).is_err());
        assert_eq!(
            state.paper_meta.read(ReviewStage::QueryGeneration).unwrap().title,
            "T"
        );

        // 未写入
        let err = state.dimensional_scores.read(ReviewStage::Scoring).unwrap_err();
        assert!(matches!(err, StageError::SlotNotWritten { .. }));
        assert!(state.queries.read(ReviewStage::Scoring).is_err());
    }

    #[test]
    fn test_enter_enforces_order() {
        let mut state = ReviewState::new();
        assert!(matches!(
            state.enter(ReviewStage::QueryGeneration),
            Err(StageError::OutOfOrder { .. })
        ));
        for stage in ReviewStage::ALL {
            state.enter(stage).unwrap();
        }
        assert_eq!(state.current_stage(), Some(ReviewStage::Scoring));
        assert!(state.enter(ReviewStage::Scoring).is_err());
    }

    #[test]
    fn test_access_log_records_reads_and_writes() {
        let mut state = ReviewState::new();
        state.paper_meta.fill(ReviewStage::Intake, meta()).unwrap();
        state.paper_meta.read(ReviewStage::Ranking).unwrap();

        let log = state.access_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].kind, AccessKind::Write);
        assert_eq!(log[1].stage, ReviewStage::Ranking);
    }

    #[test]
    fn test_into_review_requires_all_terminal_fields() {
        let state = ReviewState::new();
        assert!(state.into_review().is_err());
    }
}
