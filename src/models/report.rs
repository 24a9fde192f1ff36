//! 分析结果模型

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::models::content::ExtractedContent;
use crate::models::review::PeerReview;

/// 图表类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagramType {
    Methodology,
    Architecture,
    Results,
}

impl DiagramType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagramType::Methodology => "methodology",
            DiagramType::Architecture => "architecture",
            DiagramType::Results => "results",
        }
    }

    /// 从配置字符串解析，未知类型返回 None
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "methodology" => Some(DiagramType::Methodology),
            "architecture" => Some(DiagramType::Architecture),
            "results" => Some(DiagramType::Results),
            _ => None,
        }
    }
}

impl fmt::Display for DiagramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 生成的图表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagram {
    pub diagram_type: DiagramType,
    pub caption: String,
    /// 图表格式，例如 `mermaid`
    pub format: String,
    /// 图表源文本
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// 音频句柄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioHandle {
    pub path: PathBuf,
    pub bytes: u64,
    pub format: String,
}

/// 单次分析的开关
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    pub generate_diagrams: bool,
    pub generate_review: bool,
    pub generate_article: bool,
    pub generate_audio: bool,
    pub diagram_types: Vec<DiagramType>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            generate_diagrams: true,
            generate_review: true,
            generate_article: false,
            generate_audio: false,
            diagram_types: vec![DiagramType::Methodology],
        }
    }
}

/// 论文摘要
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperSummary {
    pub one_sentence: String,
    pub abstract_summary: String,
    pub methodology_summary: String,
    pub results_summary: String,
    pub conclusions: String,
}

/// 要点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPoint {
    pub point: String,
    pub evidence: String,
    pub section: String,
    pub importance: String,
}

/// 运行元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub analysed_at: DateTime<Local>,
    pub source: String,
    pub review_model: String,
    pub diagram_provider: String,
    /// 各阶段耗时（毫秒）
    pub stage_timings_ms: BTreeMap<String, u64>,
    pub total_ms: u64,
}

/// 顶层分析结果（组装后不可变）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub content: ExtractedContent,
    pub summary: PaperSummary,
    pub key_points: Vec<KeyPoint>,
    pub review: Option<PeerReview>,
    pub diagrams: Option<Vec<Diagram>>,
    pub article: Option<String>,
    pub audio: Option<AudioHandle>,
    pub metadata: ResultMetadata,
}
