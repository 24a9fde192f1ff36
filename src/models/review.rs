//! 评审相关模型

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 检索词的具体程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecificityLevel {
    Benchmarks,
    RelatedProblems,
    RelatedTechniques,
}

impl SpecificityLevel {
    /// 按固定顺序列出全部层级
    pub const ALL: [SpecificityLevel; 3] = [
        SpecificityLevel::Benchmarks,
        SpecificityLevel::RelatedProblems,
        SpecificityLevel::RelatedTechniques,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SpecificityLevel::Benchmarks => "benchmarks",
            SpecificityLevel::RelatedProblems => "related_problems",
            SpecificityLevel::RelatedTechniques => "related_techniques",
        }
    }
}

impl fmt::Display for SpecificityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 检索词
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub specificity_level: SpecificityLevel,
}

/// 检索到的相关工作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateWork {
    pub title: String,
    #[serde(default)]
    pub abstract_or_summary: String,
    #[serde(default)]
    pub url: String,
    /// 本地词重叠得分（排序阶段之前为 0）
    #[serde(default)]
    pub relevance_score: f64,
    /// 搜索引擎给出的得分，仅展示用
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_score: Option<f64>,
}

impl CandidateWork {
    pub fn new(title: impl Into<String>, abstract_or_summary: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            abstract_or_summary: abstract_or_summary.into(),
            url: url.into(),
            relevance_score: 0.0,
            engine_score: None,
        }
    }

    /// 去重用的键：优先 url，其次小写标题
    pub fn dedup_key(&self) -> String {
        if self.url.trim().is_empty() {
            self.title.trim().to_lowercase()
        } else {
            self.url.trim().to_string()
        }
    }
}

/// 带证据的评审条目（优点 / 缺点）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub statement: String,
    /// 引用的章节
    pub section: String,
    /// 从论文中摘出的支撑文本
    pub evidence: String,
}

/// 单个维度评分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    /// 1~4
    pub score: f64,
    pub weight: f64,
    pub comments: String,
}

/// 相关工作（最终输出）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedWork {
    pub title: String,
    pub url: String,
    pub summary: String,
    pub relevance_score: f64,
}

/// 最终评审结果（不可变）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerReview {
    /// [1, 10]
    pub overall_score: f64,
    /// [1, 5]
    pub confidence: f64,
    pub dimensions: BTreeMap<String, DimensionScore>,
    pub strengths: Vec<Finding>,
    pub weaknesses: Vec<Finding>,
    pub suggestions: Vec<String>,
    pub related_works: Vec<RelatedWork>,
    pub raw_review_text: String,
}

impl PeerReview {
    pub fn dimension(&self, name: &str) -> Option<f64> {
        self.dimensions.get(name).map(|d| d.score)
    }
}
