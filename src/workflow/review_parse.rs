//! LLM 响应解析
//!
//! 评审各阶段的 LLM 输出都是半结构化文本，这里集中处理解析和兜底

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;
use tracing::warn;

use crate::models::{SearchQuery, SpecificityLevel};
use crate::services::llm_service::{extract_first_number, extract_json_object};

/// 无法解析时的维度分
pub const DEFAULT_DIMENSION_SCORE: f64 = 2.5;
/// 无法解析时的置信度
pub const DEFAULT_CONFIDENCE: f64 = 3.0;

pub const DIMENSION_RANGE: (f64, f64) = (1.0, 4.0);
pub const CONFIDENCE_RANGE: (f64, f64) = (1.0, 5.0);

/// 解析后的评分
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedScores {
    pub soundness: f64,
    pub presentation: f64,
    pub contribution: f64,
    pub confidence: f64,
    pub comments: BTreeMap<String, String>,
    /// 是否使用了默认分
    pub fallback: bool,
}

impl ParsedScores {
    fn fallback() -> Self {
        Self {
            soundness: DEFAULT_DIMENSION_SCORE,
            presentation: DEFAULT_DIMENSION_SCORE,
            contribution: DEFAULT_DIMENSION_SCORE,
            confidence: DEFAULT_CONFIDENCE,
            comments: BTreeMap::new(),
            fallback: true,
        }
    }

    fn clamped(mut self) -> Self {
        let (lo, hi) = DIMENSION_RANGE;
        self.soundness = clamp_or(self.soundness, lo, hi, DEFAULT_DIMENSION_SCORE);
        self.presentation = clamp_or(self.presentation, lo, hi, DEFAULT_DIMENSION_SCORE);
        self.contribution = clamp_or(self.contribution, lo, hi, DEFAULT_DIMENSION_SCORE);
        let (lo, hi) = CONFIDENCE_RANGE;
        self.confidence = clamp_or(self.confidence, lo, hi, DEFAULT_CONFIDENCE);
        self
    }
}

fn clamp_or(value: f64, lo: f64, hi: f64, default: f64) -> f64 {
    if value.is_finite() {
        value.clamp(lo, hi)
    } else {
        default
    }
}

/// 解析评分响应
///
/// 依次尝试：JSON 对象 → `s,p,c` 逗号格式 → `soundness: 3` 逐行格式 → 默认分
pub fn parse_scores(response: &str) -> ParsedScores {
    let parsed = parse_scores_json(response)
        .or_else(|| parse_scores_csv(response))
        .or_else(|| parse_scores_labeled(response));

    match parsed {
        Some(scores) => scores.clamped(),
        None => {
            warn!("⚠️ 无法解析评分响应，使用默认分: '{}'", response.trim());
            ParsedScores::fallback()
        }
    }
}

fn json_number(value: &JsonValue) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn parse_scores_json(response: &str) -> Option<ParsedScores> {
    let value = extract_json_object(response)?;
    let get = |key: &str| value.get(key).and_then(json_number);

    let mut comments = BTreeMap::new();
    if let Some(map) = value.get("comments").and_then(|c| c.as_object()) {
        for (key, text) in map {
            if let Some(text) = text.as_str() {
                comments.insert(key.to_lowercase(), text.to_string());
            }
        }
    }

    Some(ParsedScores {
        soundness: get("soundness")?,
        presentation: get("presentation")?,
        contribution: get("contribution")?,
        confidence: get("confidence").unwrap_or(DEFAULT_CONFIDENCE),
        comments,
        fallback: false,
    })
}

fn parse_scores_csv(response: &str) -> Option<ParsedScores> {
    // 前面可能有带逗号的说明文字，逐行尝试
    response
        .lines()
        .map(str::trim)
        .filter(|l| l.contains(','))
        .find_map(parse_csv_line)
}

fn parse_csv_line(line: &str) -> Option<ParsedScores> {
    let parts: Vec<f64> = line
        .trim_matches(['[', ']', '(', ')'])
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    if parts.len() < 3 {
        return None;
    }
    Some(ParsedScores {
        soundness: parts[0],
        presentation: parts[1],
        contribution: parts[2],
        confidence: parts.get(3).copied().unwrap_or(DEFAULT_CONFIDENCE),
        comments: BTreeMap::new(),
        fallback: false,
    })
}

fn parse_scores_labeled(response: &str) -> Option<ParsedScores> {
    let mut found: BTreeMap<&str, f64> = BTreeMap::new();
    for line in response.lines() {
        let lower = line.to_lowercase();
        for key in ["soundness", "presentation", "contribution", "confidence"] {
            if let Some(pos) = lower.find(key) {
                if let Some(n) = extract_first_number(&lower[pos + key.len()..]) {
                    found.entry(key).or_insert(n);
                }
            }
        }
    }
    Some(ParsedScores {
        soundness: *found.get("soundness")?,
        presentation: *found.get("presentation")?,
        contribution: *found.get("contribution")?,
        confidence: found.get("confidence").copied().unwrap_or(DEFAULT_CONFIDENCE),
        comments: BTreeMap::new(),
        fallback: false,
    })
}

/// 解析检索词，每个层级一个
///
/// 接受 `benchmarks: ...` 形式；无标签的行依次填补空缺层级；
/// 仍缺失的层级用标题生成
pub fn parse_queries(response: &str, title: &str) -> Vec<SearchQuery> {
    let mut by_level: BTreeMap<usize, String> = BTreeMap::new();
    let mut unlabeled = Vec::new();

    for raw in response.lines() {
        let line = strip_list_marker(raw);
        // 空行和 `Here are the queries:` 这类引导行
        if line.is_empty() || line.ends_with(':') {
            continue;
        }
        match split_label(line) {
            Some((level, text)) => {
                by_level.entry(level_index(level)).or_insert(text);
            }
            None => unlabeled.push(clean_query(line)),
        }
    }

    let mut unlabeled = unlabeled.into_iter().filter(|q| !q.is_empty());
    let mut queries: Vec<SearchQuery> = Vec::with_capacity(3);
    for (idx, level) in SpecificityLevel::ALL.iter().enumerate() {
        let text = by_level
            .remove(&idx)
            .or_else(|| unlabeled.next())
            .unwrap_or_else(|| fallback_query(*level, title));
        if queries.iter().any(|q| q.text.eq_ignore_ascii_case(&text)) {
            continue;
        }
        queries.push(SearchQuery {
            text,
            specificity_level: *level,
        });
    }
    queries
}

/// 按标题生成的兜底检索词
pub fn fallback_query(level: SpecificityLevel, title: &str) -> String {
    match level {
        SpecificityLevel::Benchmarks => format!("{} benchmark datasets evaluation", title),
        SpecificityLevel::RelatedProblems => format!("{} related problems", title),
        SpecificityLevel::RelatedTechniques => format!("{} methods and techniques", title),
    }
}

fn level_index(level: SpecificityLevel) -> usize {
    SpecificityLevel::ALL
        .iter()
        .position(|l| *l == level)
        .unwrap_or(0)
}

fn split_label(line: &str) -> Option<(SpecificityLevel, String)> {
    let (label, rest) = line.split_once(':')?;
    let key: String = label
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect();
    let level = match key.trim_matches('*') {
        "benchmarks" | "benchmark" => SpecificityLevel::Benchmarks,
        "related_problems" | "related_problem" => SpecificityLevel::RelatedProblems,
        "related_techniques" | "related_technique" => SpecificityLevel::RelatedTechniques,
        _ => return None,
    };
    let text = clean_query(rest);
    (!text.is_empty()).then_some((level, text))
}

fn clean_query(text: &str) -> String {
    text.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`').trim().to_string()
}

/// 解析出的评审条目行
#[derive(Debug, Clone, PartialEq)]
pub struct FindingLine {
    pub statement: String,
    pub section: Option<String>,
    pub suggestion: Option<String>,
}

/// 解析 `statement | section | suggestion` 行，后两列可省略
pub fn parse_finding_lines(response: &str) -> Vec<FindingLine> {
    response
        .lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let mut parts = line.split('|').map(str::trim);
            let statement = parts.next().filter(|s| !s.is_empty())?.to_string();
            let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
            let section = parts.next().and_then(non_empty);
            let suggestion = parts.next().and_then(non_empty);
            Some(FindingLine {
                statement,
                section,
                suggestion,
            })
        })
        .collect()
}

/// 去掉列表符号和序号（`- `、`* `、`1. `、`2) `）
pub fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let line = line.trim_start_matches(['-', '*', '•']).trim_start();
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(stripped) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return stripped.trim();
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scores_json() {
        let scores = parse_scores(
            r#"```json
{"soundness": 3, "presentation": "2.5", "contribution": 4, "confidence": 4,
 "comments": {"Soundness": "Proofs are complete."}}
```"#,
        );
        assert!(!scores.fallback);
        assert_eq!(scores.soundness, 3.0);
        assert_eq!(scores.presentation, 2.5);
        assert_eq!(scores.contribution, 4.0);
        assert_eq!(scores.confidence, 4.0);
        assert_eq!(scores.comments["soundness"], "Proofs are complete.");
    }

    #[test]
    fn test_parse_scores_csv() {
        let scores = parse_scores("3, 2, 4");
        assert_eq!(
            (scores.soundness, scores.presentation, scores.contribution),
            (3.0, 2.0, 4.0)
        );
        assert_eq!(scores.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_parse_scores_csv_after_prose_preamble() {
        let scores = parse_scores("Sure, here are the scores:\n3,2,4");
        assert!(!scores.fallback);
        assert_eq!(
            (scores.soundness, scores.presentation, scores.contribution),
            (3.0, 2.0, 4.0)
        );

        let scores = parse_scores("Overall, a solid paper.\n[3, 3, 4, 5]");
        assert_eq!(scores.contribution, 4.0);
        assert_eq!(scores.confidence, 5.0);
    }

    #[test]
    fn test_parse_scores_labeled_lines() {
        let scores = parse_scores("Soundness: 3/4\nPresentation - 2\nContribution: 3.5\nConfidence: 5");
        assert_eq!(scores.soundness, 3.0);
        assert_eq!(scores.presentation, 2.0);
        assert_eq!(scores.contribution, 3.5);
        assert_eq!(scores.confidence, 5.0);
    }

    #[test]
    fn test_parse_scores_fallback_and_clamp() {
        let scores = parse_scores("I cannot score this paper.");
        assert!(scores.fallback);
        assert_eq!(scores.soundness, 2.5);
        assert_eq!(scores.confidence, 3.0);

        let scores = parse_scores(r#"{"soundness": 7, "presentation": 0, "contribution": 4, "confidence": 9}"#);
        assert_eq!(scores.soundness, 4.0);
        assert_eq!(scores.presentation, 1.0);
        assert_eq!(scores.confidence, 5.0);
    }

    #[test]
    fn test_parse_queries_labeled_and_fallback() {
        let queries = parse_queries(
            "1. Benchmarks: \"WMT 2014 translation\"\n- related problems: sequence transduction",
            "Attention Is All You Need",
        );
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[0].text, "WMT 2014 translation");
        assert_eq!(queries[1].specificity_level, SpecificityLevel::RelatedProblems);
        assert_eq!(queries[1].text, "sequence transduction");
        assert_eq!(
            queries[2].text,
            "Attention Is All You Need methods and techniques"
        );
    }

    #[test]
    fn test_parse_queries_unlabeled_lines_fill_in_order() {
        let queries = parse_queries("first query\nsecond query\nthird query\nfourth", "T");
        let texts: Vec<_> = queries.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts, vec!["first query", "second query", "third query"]);
    }

    #[test]
    fn test_parse_queries_skips_intro_lines() {
        let queries = parse_queries(
            "Here are the queries:\nBenchmarks:\nrelated_problems: long context modeling",
            "Sparse Attention",
        );
        let texts: Vec<_> = queries.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Sparse Attention benchmark datasets evaluation",
                "long context modeling",
                "Sparse Attention methods and techniques",
            ]
        );
    }

    #[test]
    fn test_parse_queries_empty_response_uses_title() {
        let queries = parse_queries("", "Deep Learning");
        assert_eq!(queries.len(), 3);
        assert!(queries.iter().all(|q| q.text.starts_with("Deep Learning")));
    }

    #[test]
    fn test_parse_finding_lines() {
        let lines = parse_finding_lines(
            "1. Strong empirical results | Results\n- Limited ablations | Experiments | Add ablations\n\n* Clear writing",
        );
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].section.as_deref(), Some("Results"));
        assert_eq!(lines[1].suggestion.as_deref(), Some("Add ablations"));
        assert_eq!(lines[2].statement, "Clear writing");
        assert!(lines[2].section.is_none());
    }

    #[test]
    fn test_strip_list_marker() {
        assert_eq!(strip_list_marker("  12) item"), "item");
        assert_eq!(strip_list_marker("- item"), "item");
        assert_eq!(strip_list_marker("2014 results"), "2014 results");
    }
}
