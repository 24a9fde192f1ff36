//! 本地评审与外部评审的分数对比
//!
//! 外部评审可以是 JSON，也可以是 `Soundness: 3` 这类逐行文本；
//! 本地评审读取 `ReportWriter` 写出的 `metadata.json` 和 `review_scores.json`

use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::scoring::interpret_score;

/// 一份评审的分数快照，缺失的分数为 None
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewSnapshot {
    pub source: String,
    pub overall: Option<f64>,
    pub soundness: Option<f64>,
    pub presentation: Option<f64>,
    pub contribution: Option<f64>,
    pub confidence: Option<f64>,
}

const DIMENSIONS: [&str; 3] = ["soundness", "presentation", "contribution"];

/// 解析外部评审
///
/// # 参数
/// - `name`: 来源名称（通常是文件名）
/// - `text`: 文件内容
pub fn parse_external_review(name: &str, text: &str) -> ReviewSnapshot {
    let source = format!("external:{}", name);
    match serde_json::from_str::<JsonValue>(text) {
        Ok(value) if value.is_object() => from_json(&value, source),
        _ => from_labeled_text(text, source),
    }
}

/// 从文件读取外部评审
pub async fn load_external_review(path: &Path) -> Result<ReviewSnapshot> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取外部评审: {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok(parse_external_review(&name, &text))
}

/// 读取本地输出目录中的评审分数
///
/// 文件不存在时对应分数为 None；文件存在但不是合法 JSON 时返回错误
pub async fn load_local_review(output_dir: &Path) -> Result<ReviewSnapshot> {
    let mut snapshot = ReviewSnapshot {
        source: "local".to_string(),
        ..Default::default()
    };

    if let Some(metadata) = read_json(&output_dir.join("metadata.json")).await? {
        snapshot.overall = metadata.get("review_score").and_then(json_number);
    }

    if let Some(scores) = read_json(&output_dir.join("review_scores.json")).await? {
        let parsed = from_json(&scores, String::new());
        snapshot.overall = snapshot.overall.or(parsed.overall);
        snapshot.soundness = parsed.soundness;
        snapshot.presentation = parsed.presentation;
        snapshot.contribution = parsed.contribution;
        snapshot.confidence = parsed.confidence;
    }

    if snapshot.overall.is_none() {
        warn!("⚠️ {} 中没有找到本地评审分数", output_dir.display());
    }
    Ok(snapshot)
}

/// 渲染对比报告（Markdown）
pub fn render_comparison(local: &ReviewSnapshot, external: &ReviewSnapshot) -> String {
    let rows = [
        ("Overall", local.overall, external.overall),
        ("Soundness", local.soundness, external.soundness),
        ("Presentation", local.presentation, external.presentation),
        ("Contribution", local.contribution, external.contribution),
        ("Confidence", local.confidence, external.confidence),
    ];

    let mut lines = vec![
        "# Review Comparison".to_string(),
        String::new(),
        format!("Local source: `{}`", local.source),
        format!("External source: `{}`", external.source),
        String::new(),
        "## Score Table".to_string(),
        String::new(),
        "| Metric | Local | External | Delta (Local-External) |".to_string(),
        "|---|---:|---:|---:|".to_string(),
    ];
    for (metric, ours, theirs) in rows {
        lines.push(format!(
            "| {} | {} | {} | {} |",
            metric,
            fmt_score(ours),
            fmt_score(theirs),
            fmt_delta(ours, theirs)
        ));
    }
    lines.push(String::new());
    lines.push(format!("Local decision: **{}**", decision(local.overall)));
    lines.push(format!("External decision: **{}**", decision(external.overall)));
    lines.push(String::new());
    lines.push("## Notes".to_string());
    lines.push(String::new());
    lines.push("- `n/a` means the score was not found in the provided source.".to_string());
    lines.push(
        "- External reviews parse best as JSON with keys `overall_score`, `soundness`, \
         `presentation`, `contribution`, `confidence`."
            .to_string(),
    );
    lines.push(String::new());

    lines.join("\n")
}

fn decision(overall: Option<f64>) -> String {
    overall.map_or_else(|| "n/a".to_string(), |s| interpret_score(s).to_string())
}

fn fmt_score(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v))
}

fn fmt_delta(ours: Option<f64>, theirs: Option<f64>) -> String {
    match (ours, theirs) {
        (Some(a), Some(b)) => format!("{:+.2}", a - b),
        _ => "n/a".to_string(),
    }
}

async fn read_json(path: &Path) -> Result<Option<JsonValue>> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        debug!("跳过不存在的文件: {}", path.display());
        return Ok(None);
    }
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取: {}", path.display()))?;
    let value = serde_json::from_str(&text)
        .with_context(|| format!("JSON 格式错误: {}", path.display()))?;
    Ok(Some(value))
}

fn json_number(value: &JsonValue) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn from_json(value: &JsonValue, source: String) -> ReviewSnapshot {
    let get = |key: &str| value.get(key).and_then(json_number);
    // 维度分可以是平铺的，也可以是 review_scores.json 的嵌套结构
    let dimension = |name: &str| {
        get(name).or_else(|| {
            value
                .get("dimensions")
                .and_then(|d| d.get(name))
                .and_then(|d| d.get("score").and_then(json_number).or_else(|| json_number(d)))
        })
    };

    ReviewSnapshot {
        source,
        overall: get("overall_score")
            .or_else(|| get("review_score"))
            .or_else(|| get("overall")),
        soundness: dimension(DIMENSIONS[0]),
        presentation: dimension(DIMENSIONS[1]),
        contribution: dimension(DIMENSIONS[2]),
        confidence: get("confidence"),
    }
}

fn label_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            ("overall", r"(?i)overall(?:\s+score)?\s*[:=]\s*([0-9]+(?:\.[0-9]+)?)"),
            ("soundness", r"(?i)soundness\s*[:=]\s*([0-9]+(?:\.[0-9]+)?)"),
            ("presentation", r"(?i)presentation\s*[:=]\s*([0-9]+(?:\.[0-9]+)?)"),
            ("contribution", r"(?i)contribution\s*[:=]\s*([0-9]+(?:\.[0-9]+)?)"),
            ("confidence", r"(?i)confidence\s*[:=]\s*([0-9]+(?:\.[0-9]+)?)"),
        ]
        .into_iter()
        .filter_map(|(key, pattern)| Regex::new(pattern).ok().map(|re| (key, re)))
        .collect()
    })
}

fn from_labeled_text(text: &str, source: String) -> ReviewSnapshot {
    let find = |key: &str| {
        label_patterns()
            .iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, re)| re.captures(text))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    };

    ReviewSnapshot {
        source,
        overall: find("overall"),
        soundness: find("soundness"),
        presentation: find("presentation"),
        contribution: find("contribution"),
        confidence: find("confidence"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_external_json() {
        let snapshot = parse_external_review(
            "openreview.json",
            r#"{"overall_score": 6.5, "soundness": 3, "presentation": "2", "contribution": 3, "confidence": 4}"#,
        );
        assert_eq!(snapshot.source, "external:openreview.json");
        assert_eq!(snapshot.overall, Some(6.5));
        assert_eq!(snapshot.presentation, Some(2.0));
        assert_eq!(snapshot.confidence, Some(4.0));
    }

    #[test]
    fn test_parse_external_nested_dimensions() {
        let snapshot = parse_external_review(
            "other_run.json",
            r#"{"overall": 5.1, "dimensions": {"soundness": {"score": 2.0, "weight": 0.7134}}}"#,
        );
        assert_eq!(snapshot.overall, Some(5.1));
        assert_eq!(snapshot.soundness, Some(2.0));
        assert_eq!(snapshot.contribution, None);
    }

    #[test]
    fn test_parse_external_labeled_text() {
        let snapshot = parse_external_review(
            "review.txt",
            "Overall Score: 7\nSoundness = 3.5\nPRESENTATION: 3\nsome prose about contribution\nConfidence: 4",
        );
        assert_eq!(snapshot.overall, Some(7.0));
        assert_eq!(snapshot.soundness, Some(3.5));
        assert_eq!(snapshot.presentation, Some(3.0));
        assert_eq!(snapshot.contribution, None);
        assert_eq!(snapshot.confidence, Some(4.0));
    }

    #[test]
    fn test_render_comparison_table_and_decisions() {
        let local = ReviewSnapshot {
            source: "local".to_string(),
            overall: Some(6.9181),
            soundness: Some(3.0),
            presentation: Some(2.0),
            contribution: Some(4.0),
            confidence: Some(4.0),
        };
        let external = ReviewSnapshot {
            source: "external:r.json".to_string(),
            overall: Some(7.5),
            soundness: Some(3.0),
            ..Default::default()
        };

        let md = render_comparison(&local, &external);
        assert!(md.contains("| Overall | 6.92 | 7.50 | -0.58 |"));
        assert!(md.contains("| Soundness | 3.00 | 3.00 | +0.00 |"));
        assert!(md.contains("| Presentation | 2.00 | n/a | n/a |"));
        assert!(md.contains("Local decision: **Weak Accept**"));
        assert!(md.contains("External decision: **Accept**"));

        let md = render_comparison(&ReviewSnapshot::default(), &external);
        assert!(md.contains("Local decision: **n/a**"));
    }

    #[tokio::test]
    async fn test_load_local_review_from_written_outputs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("metadata.json"), r#"{"review_score": 6.9181}"#).unwrap();
        std::fs::write(
            dir.path().join("review_scores.json"),
            r#"{"overall": 6.9181, "confidence": 4.0,
                "dimensions": {"soundness": {"score": 3.0, "weight": 0.7134, "comments": ""},
                               "presentation": {"score": 2.0, "weight": 0.4242, "comments": ""},
                               "contribution": {"score": 4.0, "weight": 1.0588, "comments": ""}},
                "decision": "Weak Accept"}"#,
        )
        .unwrap();

        let local = load_local_review(dir.path()).await.unwrap();
        assert_eq!(local.overall, Some(6.9181));
        assert_eq!(local.presentation, Some(2.0));
        assert_eq!(local.confidence, Some(4.0));
    }

    #[tokio::test]
    async fn test_load_local_review_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let local = load_local_review(dir.path()).await.unwrap();
        assert_eq!(local.source, "local");
        assert!(local.overall.is_none());
        assert!(local.soundness.is_none());
    }
}
