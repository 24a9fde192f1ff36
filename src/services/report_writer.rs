//! 结果写入服务 - 业务能力层
//!
//! 只负责把组装好的 `AnalysisResult` 写入输出目录，不关心流程

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{debug, info};

use crate::models::AnalysisResult;
use crate::scoring::interpret_score;

/// 结果写入服务
///
/// 输出文件：
/// - `result.json`：完整结果
/// - `report.md`：主分析报告
/// - `key_points.md`：要点和公式
/// - `review.md` / `review_scores.json`：有评审时
/// - `article.md`：有文章时
/// - `metadata.json`：运行元数据
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 写入全部输出，返回写入的文件列表
    pub async fn save_all(&self, result: &AnalysisResult) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("无法创建输出目录: {}", self.output_dir.display()))?;

        let mut written = Vec::new();

        let result_json = serde_json::to_string_pretty(result)?;
        written.push(self.write("result.json", &result_json).await?);
        let report = render_report(result, &self.output_dir);
        written.push(self.write("report.md", &report).await?);
        written.push(self.write("key_points.md", &render_key_points(result)).await?);

        if let Some(review) = &result.review {
            written.push(self.write("review.md", &review.raw_review_text).await?);
            let scores = review_scores(result).unwrap_or_default();
            written.push(self.write("review_scores.json", &scores).await?);
        }

        if let Some(article) = &result.article {
            written.push(self.write("article.md", article).await?);
        }

        let metadata = json!({
            "title": result.content.title,
            "authors": result.content.authors,
            "source": result.metadata.source,
            "analysed_at": result.metadata.analysed_at.to_rfc3339(),
            "review_model": result.metadata.review_model,
            "diagram_provider": result.metadata.diagram_provider,
            "num_sections": result.content.sections.len(),
            "num_equations": result.content.equations.len(),
            "num_references": result.content.references.len(),
            "num_diagrams": result.diagrams.as_ref().map_or(0, |d| d.len()),
            "review_score": result.review.as_ref().map(|r| r.overall_score),
            "stage_timings_ms": result.metadata.stage_timings_ms,
            "total_ms": result.metadata.total_ms,
        });
        written.push(
            self.write("metadata.json", &serde_json::to_string_pretty(&metadata)?)
                .await?,
        );

        info!("💾 已写入 {} 个文件到 {}", written.len(), self.output_dir.display());
        Ok(written)
    }

    async fn write(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.output_dir.join(name);
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("无法写入文件: {}", path.display()))?;
        debug!("已写入: {}", path.display());
        Ok(path)
    }
}

/// 评审分数 JSON（总分精确保留，便于下游复现公式结果）
pub fn review_scores(result: &AnalysisResult) -> Option<String> {
    let review = result.review.as_ref()?;
    let value = json!({
        "overall": review.overall_score,
        "confidence": review.confidence,
        "dimensions": review.dimensions,
        "decision": interpret_score(review.overall_score).label(),
    });
    serde_json::to_string_pretty(&value).ok()
}

/// 渲染主分析报告
///
/// # 参数
/// - `result`: 组装好的分析结果
/// - `output_dir`: 报告所在目录，图表路径在其下时改写为相对路径
///
/// # 返回
/// Markdown 文本：frontmatter、摘要、要点、公式、方法、图表、评审、结果和统计
pub fn render_report(result: &AnalysisResult, output_dir: &Path) -> String {
    let content = &result.content;
    let summary = &result.summary;
    let mut lines = vec![
        "---".to_string(),
        format!("title: \"{}\"", content.title),
        format!("authors: [{}]", content.authors.join(", ")),
        format!("date_analysed: \"{}\"", result.metadata.analysed_at.to_rfc3339()),
        format!("source: \"{}\"", result.metadata.source),
        format!("review_model: \"{}\"", result.metadata.review_model),
        "---".to_string(),
        String::new(),
        format!("# Analysis Report: {}", content.title),
        String::new(),
        "## Summary".to_string(),
        String::new(),
        summary.one_sentence.clone(),
        String::new(),
        summary.abstract_summary.clone(),
        String::new(),
    ];

    if !result.key_points.is_empty() {
        lines.push("## Key Findings".to_string());
        lines.push(String::new());
        for (i, kp) in result.key_points.iter().enumerate() {
            lines.push(format!("{}. **{}**", i + 1, kp.point));
            lines.push(format!("   - Evidence: {}", kp.evidence));
            lines.push(format!("   - Section: {}", kp.section));
        }
        lines.push(String::new());
    }

    let display: Vec<_> = content.display_equations().take(10).collect();
    if !display.is_empty() {
        lines.push("## Key Equations".to_string());
        lines.push(String::new());
        for eq in display {
            match &eq.label {
                Some(label) => lines.push(format!("### {} ({})", eq.id, label)),
                None => lines.push(format!("### {}", eq.id)),
            }
            lines.push(format!("$$\n{}\n$$", eq.latex));
            if let Some(desc) = &eq.description {
                lines.push(format!("> {}", desc));
            }
            lines.push(format!("*Section: {}*", eq.section));
            lines.push(String::new());
        }
    }

    lines.push("## Methodology".to_string());
    lines.push(String::new());
    lines.push(summary.methodology_summary.clone());
    lines.push(String::new());

    if let Some(diagrams) = result.diagrams.as_ref().filter(|d| !d.is_empty()) {
        lines.push("## Generated Diagrams".to_string());
        lines.push(String::new());
        for diagram in diagrams {
            lines.push(format!("### {}", diagram.caption));
            lines.push(String::new());
            if let Some(path) = &diagram.path {
                let relative = path.strip_prefix(output_dir).unwrap_or(path);
                lines.push(format!("Source: `{}`", relative.display()));
                lines.push(String::new());
            }
            lines.push(format!("```{}\n{}\n```", diagram.format, diagram.source.trim_end()));
            lines.push(String::new());
        }
    }

    if let Some(review) = &result.review {
        lines.push("## Peer Review".to_string());
        lines.push(String::new());
        lines.push(format!(
            "**Overall Score: {:.1}/10** ({}) | Confidence: {:.0}/5",
            review.overall_score,
            interpret_score(review.overall_score),
            review.confidence
        ));
        lines.push(String::new());

        lines.push("### Dimensional Scores".to_string());
        lines.push(String::new());
        lines.push("| Dimension | Score | Weight |".to_string());
        lines.push("|-----------|-------|--------|".to_string());
        let total_weight: f64 = review.dimensions.values().map(|d| d.weight).sum();
        for (name, dim) in &review.dimensions {
            let pct = if total_weight > 0.0 {
                dim.weight / total_weight * 100.0
            } else {
                0.0
            };
            lines.push(format!("| {} | {:.1}/4 | {:.1}% |", name, dim.score, pct));
        }
        lines.push(String::new());

        lines.push("### Strengths".to_string());
        lines.push(String::new());
        for f in &review.strengths {
            lines.push(format!("- {} *({})*", f.statement, f.section));
        }
        lines.push(String::new());

        lines.push("### Weaknesses".to_string());
        lines.push(String::new());
        for f in &review.weaknesses {
            lines.push(format!("- {} *({})*", f.statement, f.section));
        }
        lines.push(String::new());

        if !review.suggestions.is_empty() {
            lines.push("### Suggestions".to_string());
            lines.push(String::new());
            for s in &review.suggestions {
                lines.push(format!("- {}", s));
            }
            lines.push(String::new());
        }

        if !review.related_works.is_empty() {
            lines.push("### Related Work".to_string());
            lines.push(String::new());
            for rw in review.related_works.iter().take(10) {
                if rw.url.is_empty() {
                    lines.push(format!("- **{}**", rw.title));
                } else {
                    lines.push(format!("- **{}** - [{}]({})", rw.title, rw.url, rw.url));
                }
            }
            lines.push(String::new());
        }
    }

    lines.push("## Results".to_string());
    lines.push(String::new());
    lines.push(summary.results_summary.clone());
    lines.push(String::new());
    lines.push("## Conclusions".to_string());
    lines.push(String::new());
    lines.push(summary.conclusions.clone());
    lines.push(String::new());

    lines.push("## Statistics".to_string());
    lines.push(String::new());
    lines.push(format!("- **Sections:** {}", content.sections.len()));
    lines.push(format!("- **Equations:** {}", content.equations.len()));
    lines.push(format!("- **References:** {}", content.references.len()));
    lines.push(format!(
        "- **Diagrams:** {}",
        result.diagrams.as_ref().map_or(0, |d| d.len())
    ));
    lines.push(format!("- **Total time:** {} ms", result.metadata.total_ms));
    lines.push(String::new());

    lines.join("\n")
}

fn render_key_points(result: &AnalysisResult) -> String {
    let content = &result.content;
    let mut lines = vec![
        "---".to_string(),
        format!("paper_id: \"{}\"", content.title),
        format!("analysed_at: \"{}\"", result.metadata.analysed_at.to_rfc3339()),
        "---".to_string(),
        String::new(),
        format!("# Key Points: {}", content.title),
        String::new(),
        "## Core Contributions".to_string(),
        String::new(),
    ];

    let high: Vec<_> = result
        .key_points
        .iter()
        .filter(|kp| kp.importance == "high")
        .collect();
    let points: Vec<_> = if high.is_empty() {
        result.key_points.iter().take(5).collect()
    } else {
        high
    };
    for (i, kp) in points.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, kp.point));
    }
    lines.push(String::new());

    let display: Vec<_> = content.display_equations().collect();
    if !display.is_empty() {
        lines.push("## Equations & Formulae".to_string());
        lines.push(String::new());
        for eq in display.iter().take(15) {
            lines.push(format!("### {}", eq.label.as_deref().unwrap_or(&eq.id)));
            lines.push(String::new());
            lines.push(format!("$$\n{}\n$$", eq.latex));
            if let Some(desc) = &eq.description {
                lines.push(format!("> **Description:** {}", desc));
            }
            lines.push(format!("> **Section:** {}", eq.section));
            lines.push(String::new());
        }
    }

    lines.push("## Document Statistics".to_string());
    lines.push(String::new());
    lines.push(format!("- **Sections:** {}", content.sections.len()));
    lines.push(format!(
        "- **Equations:** {} ({} display, {} inline)",
        content.equations.len(),
        display.len(),
        content.equations.len() - display.len()
    ));
    lines.push(format!("- **References:** {}", content.references.len()));
    if let Some(review) = &result.review {
        lines.push(format!(
            "- **Review Score:** {:.1}/10 ({})",
            review.overall_score,
            interpret_score(review.overall_score)
        ));
    }
    lines.push(String::new());

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Diagram, DiagramType, DimensionScore, ExtractedContent, Finding, KeyPoint, PaperSummary,
        PeerReview, RelatedWork, ResultMetadata,
    };
    use crate::scoring::calibrate;
    use std::collections::BTreeMap;

    fn sample(with_review: bool) -> AnalysisResult {
        let review = with_review.then(|| {
            let mut dimensions = BTreeMap::new();
            for (name, score, weight) in [
                ("soundness", 3.0, 0.7134),
                ("presentation", 2.0, 0.4242),
                ("contribution", 4.0, 1.0588),
            ] {
                dimensions.insert(
                    name.to_string(),
                    DimensionScore {
                        score,
                        weight,
                        comments: String::new(),
                    },
                );
            }
            PeerReview {
                overall_score: calibrate(3.0, 2.0, 4.0),
                confidence: 4.0,
                dimensions,
                strengths: vec![],
                weaknesses: vec![],
                suggestions: vec![],
                related_works: vec![],
                raw_review_text: "## Summary\nSolid.".to_string(),
            }
        });

        AnalysisResult {
            content: ExtractedContent {
                title: "Attention Is All You Need".to_string(),
                ..Default::default()
            },
            summary: PaperSummary::default(),
            key_points: vec![KeyPoint {
                point: "Introduces the Transformer".to_string(),
                evidence: "abstract".to_string(),
                section: "Abstract".to_string(),
                importance: "high".to_string(),
            }],
            review,
            diagrams: None,
            article: None,
            audio: None,
            metadata: ResultMetadata {
                analysed_at: chrono::Local::now(),
                source: "paper.json".to_string(),
                review_model: "gpt-4o".to_string(),
                diagram_provider: "mermaid".to_string(),
                stage_timings_ms: BTreeMap::new(),
                total_ms: 12,
            },
        }
    }

    #[tokio::test]
    async fn test_save_all_with_review() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path());
        let result = sample(true);

        let written = writer.save_all(&result).await.unwrap();
        let names: Vec<_> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "result.json",
                "report.md",
                "key_points.md",
                "review.md",
                "review_scores.json",
                "metadata.json"
            ]
        );

        let scores: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("review_scores.json")).unwrap(),
        )
        .unwrap();
        let overall = scores["overall"].as_f64().unwrap();
        assert!((overall - calibrate(3.0, 2.0, 4.0)).abs() < 1e-12);
        assert_eq!(scores["dimensions"]["contribution"]["score"].as_f64(), Some(4.0));
        assert_eq!(scores["decision"], "Weak Accept");

        let round_trip: AnalysisResult = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("result.json")).unwrap(),
        )
        .unwrap();
        // 整个结果可以按值比较，落盘再读回不丢信息
        assert_eq!(round_trip, result);
        let review = round_trip.review.unwrap();
        assert_eq!(review.raw_review_text, "## Summary\nSolid.");
        assert_eq!(review.dimension("soundness"), Some(3.0));
    }

    #[tokio::test]
    async fn test_save_all_without_optional_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("nested"));

        let written = writer.save_all(&sample(false)).await.unwrap();
        assert_eq!(written.len(), 4);
        assert!(dir.path().join("nested/report.md").exists());
        assert!(!dir.path().join("nested/review.md").exists());
        assert!(review_scores(&sample(false)).is_none());
    }

    #[test]
    fn test_report_sections() {
        let mut result = sample(true);
        result.content.authors = vec!["Vaswani, A.".to_string(), "Shazeer, N.".to_string()];
        result.summary.one_sentence = "A model built on attention alone.".to_string();
        if let Some(review) = result.review.as_mut() {
            review.strengths.push(Finding {
                statement: "Strong BLEU".to_string(),
                section: "Results".to_string(),
                evidence: String::new(),
            });
            review.related_works.push(RelatedWork {
                title: "Seq2Seq".to_string(),
                url: "https://arxiv.org/abs/1409.3215".to_string(),
                summary: String::new(),
                relevance_score: 0.5,
            });
        }
        let out = Path::new("/tmp/out");
        result.diagrams = Some(vec![Diagram {
            diagram_type: DiagramType::Methodology,
            caption: "Methodology flow".to_string(),
            format: "mermaid".to_string(),
            source: "flowchart TD\n  A --> B".to_string(),
            path: Some(out.join("diagrams/methodology.mmd")),
        }]);

        let md = render_report(&result, out);
        assert!(md.starts_with("---\ntitle: \"Attention Is All You Need\""));
        assert!(md.contains("authors: [Vaswani, A., Shazeer, N.]"));
        assert!(md.contains("# Analysis Report: Attention Is All You Need"));
        assert!(md.contains("A model built on attention alone."));
        assert!(md.contains("1. **Introduces the Transformer**"));
        assert!(md.contains("**Overall Score: 6.9/10** (Weak Accept) | Confidence: 4/5"));
        assert!(md.contains("| contribution | 4.0/4 | 48.2% |"));
        assert!(md.contains("- Strong BLEU *(Results)*"));
        assert!(md.contains("- **Seq2Seq** - [https://arxiv.org/abs/1409.3215]"));
        assert!(md.contains("Source: `diagrams/methodology.mmd`"));
        assert!(md.contains("```mermaid\nflowchart TD"));
        assert!(md.contains("## Statistics"));

        // 没有评审时不渲染评审章节
        let md = render_report(&sample(false), out);
        assert!(!md.contains("## Peer Review"));
        assert!(md.contains("## Methodology"));
    }

    #[test]
    fn test_key_points_markdown() {
        let md = render_key_points(&sample(true));
        assert!(md.contains("# Key Points: Attention Is All You Need"));
        assert!(md.contains("1. Introduces the Transformer"));
        assert!(md.contains("- **Review Score:**"));
    }
}
