//! 图表生成服务 - 业务能力层
//!
//! 内置实现把论文结构转成 Mermaid 流程图文本，不调用任何图像模型：
//! 1. 按图表类型用关键字找到相关章节（找不到用摘要 / 全文前 2000 字）
//! 2. 根据上下文关键字推导 5 个阶段
//! 3. 输出 `flowchart LR` 源码，可选写入 `<output>/diagrams/<type>.mmd`

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::models::{Diagram, DiagramType, ExtractedContent};

/// 图表生成能力，独立失败域
#[async_trait]
pub trait DiagramGenerator: Send + Sync {
    async fn generate(
        &self,
        content: &ExtractedContent,
        types: &[DiagramType],
    ) -> Result<Vec<Diagram>>;

    /// 写入结果元数据的提供方名称
    fn provider(&self) -> &str;
}

/// Mermaid 文本图表生成器
pub struct MermaidDiagramGenerator {
    /// 为 None 时只返回源码，不写文件
    output_dir: Option<PathBuf>,
}

impl MermaidDiagramGenerator {
    pub fn new(output_dir: Option<PathBuf>) -> Self {
        Self { output_dir }
    }

    fn build(&self, content: &ExtractedContent, diagram_type: DiagramType) -> Diagram {
        let context = source_context(content, diagram_type);
        let stages = derive_stages(diagram_type, &context);
        let caption = match diagram_type {
            DiagramType::Methodology => format!("Methodology pipeline of: {}", content.title),
            DiagramType::Architecture => format!("System architecture of: {}", content.title),
            DiagramType::Results => format!("Key results of: {}", content.title),
        };

        Diagram {
            diagram_type,
            caption,
            format: "mermaid".to_string(),
            source: render_flowchart(&stages),
            path: None,
        }
    }
}

#[async_trait]
impl DiagramGenerator for MermaidDiagramGenerator {
    async fn generate(
        &self,
        content: &ExtractedContent,
        types: &[DiagramType],
    ) -> Result<Vec<Diagram>> {
        let mut diagrams = Vec::with_capacity(types.len());

        for &diagram_type in types {
            let mut diagram = self.build(content, diagram_type);

            if let Some(dir) = &self.output_dir {
                let diagram_dir = dir.join("diagrams");
                tokio::fs::create_dir_all(&diagram_dir)
                    .await
                    .with_context(|| format!("无法创建目录: {}", diagram_dir.display()))?;
                let path = diagram_dir.join(format!("{}.mmd", diagram_type.as_str()));
                tokio::fs::write(&path, &diagram.source)
                    .await
                    .with_context(|| format!("无法写入图表: {}", path.display()))?;
                debug!("图表已写入: {}", path.display());
                diagram.path = Some(path);
            }

            diagrams.push(diagram);
        }

        if diagrams.is_empty() {
            warn!("⚠️ 没有请求任何图表类型");
        }
        Ok(diagrams)
    }

    fn provider(&self) -> &str {
        "mermaid"
    }
}

/// 各类型图表用来定位章节的关键字
fn section_keywords(diagram_type: DiagramType) -> &'static [&'static str] {
    match diagram_type {
        DiagramType::Methodology => &["method", "approach", "framework", "model", "proposed"],
        DiagramType::Architecture => &["architecture", "model", "system", "design", "structure"],
        DiagramType::Results => &["results", "experiments", "evaluation", "performance"],
    }
}

fn source_context(content: &ExtractedContent, diagram_type: DiagramType) -> String {
    let keywords = section_keywords(diagram_type);
    let matching: Vec<&str> = content
        .sections
        .iter()
        .filter(|s| {
            let title = s.title.to_lowercase();
            keywords.iter().any(|kw| title.contains(kw))
        })
        .map(|s| s.body.as_str())
        .collect();

    if !matching.is_empty() {
        return matching.join("\n\n");
    }
    if !content.abstract_text.trim().is_empty() {
        return content.abstract_text.clone();
    }
    content.full_text().chars().take(2000).collect()
}

fn contains_any(context: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| context.contains(t))
}

/// 由上下文关键字推导阶段（最多 5 个）
fn derive_stages(diagram_type: DiagramType, context: &str) -> Vec<(&'static str, &'static str)> {
    let context = context.to_lowercase();
    let mut stages = vec![("Paper Input", "problem and data")];

    match diagram_type {
        DiagramType::Results => {
            stages.push(("Experimental Setup", "datasets and baselines"));
            if contains_any(&context, &["ablation", "analysis"]) {
                stages.push(("Ablation Study", "component contributions"));
            } else {
                stages.push(("Main Comparison", "metrics against baselines"));
            }
        }
        _ => {
            if contains_any(&context, &["framework", "formulation", "objective"]) {
                stages.push(("Method Formulation", "objective and setup"));
            } else {
                stages.push(("Core Model", "representation and update"));
            }
            if contains_any(&context, &["attention", "encoder", "decoder", "layer"]) {
                stages.push(("Network Components", "layers and connections"));
            } else if contains_any(&context, &["constraint", "optimization", "solver"]) {
                stages.push(("Optimization", "constraints and solver"));
            } else {
                stages.push(("Processing", "intermediate computation"));
            }
        }
    }

    if contains_any(&context, &["experiment", "evaluation", "results", "benchmark"]) {
        stages.push(("Evaluation", "metrics and validation"));
    }
    stages.push(("Outputs & Analysis", "findings and conclusions"));
    stages.truncate(5);
    stages
}

fn render_flowchart(stages: &[(&str, &str)]) -> String {
    let mut lines = vec!["flowchart LR".to_string()];
    for (idx, (label, detail)) in stages.iter().enumerate() {
        lines.push(format!("    S{}[\"{}<br/>{}\"]", idx + 1, label, detail));
    }
    for idx in 1..stages.len() {
        lines.push(format!("    S{} --> S{}", idx, idx + 1));
    }
    lines.join("\n")
}
