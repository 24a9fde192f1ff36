//! 摘要与要点 - 编排层的纯函数
//!
//! 不调用任何外部服务，只从已提取内容（和可选的评审结果）中整理

use crate::models::{ExtractedContent, KeyPoint, PaperSummary, PeerReview};

/// 各摘要字段的最大字符数
const MAX_SUMMARY_CHARS: usize = 500;
/// 要点证据的最大字符数
const MAX_EVIDENCE_CHARS: usize = 200;
/// 从评审中取的优点数
const MAX_REVIEW_POINTS: usize = 3;

const METHOD_KEYWORDS: &[&str] = &["method", "approach", "proposed", "framework"];
const RESULT_KEYWORDS: &[&str] = &["results", "experiments", "evaluation"];
const CONCLUSION_KEYWORDS: &[&str] = &["conclusion"];

/// 生成论文摘要
///
/// 方法 / 结论找不到对应章节时退回摘要，结果退回全文开头
pub fn summarize(content: &ExtractedContent) -> PaperSummary {
    let abstract_head = head(&content.abstract_text, MAX_SUMMARY_CHARS);
    let section_or = |keywords: &[&str], fallback: &str| {
        content
            .find_section(keywords)
            .map(|s| head(&s.body, MAX_SUMMARY_CHARS))
            .unwrap_or_else(|| fallback.to_string())
    };

    PaperSummary {
        one_sentence: format!("Analysis of '{}'", content.title),
        abstract_summary: abstract_head.clone(),
        methodology_summary: section_or(METHOD_KEYWORDS, &abstract_head),
        results_summary: section_or(RESULT_KEYWORDS, &head(&content.full_text(), MAX_SUMMARY_CHARS)),
        conclusions: section_or(CONCLUSION_KEYWORDS, &abstract_head),
    }
}

/// 提取要点：摘要、评审优点（最多 3 条）、首个展示公式
pub fn key_points(content: &ExtractedContent, review: Option<&PeerReview>) -> Vec<KeyPoint> {
    let mut points = Vec::new();

    if !content.abstract_text.trim().is_empty() {
        points.push(KeyPoint {
            point: format!("Paper presents: {}", content.title),
            evidence: head(&content.abstract_text, MAX_EVIDENCE_CHARS),
            section: "Abstract".to_string(),
            importance: "high".to_string(),
        });
    }

    if let Some(review) = review {
        points.extend(review.strengths.iter().take(MAX_REVIEW_POINTS).map(|s| KeyPoint {
            point: s.statement.clone(),
            evidence: if s.evidence.is_empty() {
                "Identified by peer review analysis".to_string()
            } else {
                s.evidence.clone()
            },
            section: s.section.clone(),
            importance: "high".to_string(),
        }));
    }

    let display: Vec<_> = content.display_equations().collect();
    if let Some(first) = display.first() {
        points.push(KeyPoint {
            point: format!("Paper includes {} key equations/formulae", display.len()),
            evidence: format!("First equation: {}", head(&first.latex, 100)),
            section: first.section.clone(),
            importance: "medium".to_string(),
        });
    }

    points
}

fn head(text: &str, max_chars: usize) -> String {
    text.trim().chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Equation, Finding, Section};

    fn content() -> ExtractedContent {
        ExtractedContent {
            title: "Sparse Mixtures".to_string(),
            abstract_text: "We study sparse mixtures of experts.".to_string(),
            sections: vec![
                Section {
                    title: "Proposed Method".to_string(),
                    body: "Route tokens to two experts.".to_string(),
                    level: 1,
                },
                Section {
                    title: "Experiments".to_string(),
                    body: "Perplexity drops by 10%.".to_string(),
                    level: 1,
                },
            ],
            equations: vec![
                Equation {
                    id: "eq1".to_string(),
                    latex: "y = x".to_string(),
                    section: "Proposed Method".to_string(),
                    is_inline: true,
                    ..Default::default()
                },
                Equation {
                    id: "eq2".to_string(),
                    latex: "p = softmax(Wx)".to_string(),
                    section: "Proposed Method".to_string(),
                    is_inline: false,
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_summarize_matches_sections_and_falls_back() {
        let summary = summarize(&content());
        assert_eq!(summary.one_sentence, "Analysis of 'Sparse Mixtures'");
        assert_eq!(summary.methodology_summary, "Route tokens to two experts.");
        assert_eq!(summary.results_summary, "Perplexity drops by 10%.");
        // 没有 Conclusion 章节，退回摘要
        assert_eq!(summary.conclusions, "We study sparse mixtures of experts.");
    }

    #[test]
    fn test_key_points_sources() {
        let review = PeerReview {
            overall_score: 6.0,
            confidence: 3.0,
            dimensions: Default::default(),
            strengths: (0..5)
                .map(|i| Finding {
                    statement: format!("strength {}", i),
                    section: "Results".to_string(),
                    evidence: String::new(),
                })
                .collect(),
            weaknesses: vec![],
            suggestions: vec![],
            related_works: vec![],
            raw_review_text: String::new(),
        };

        let points = key_points(&content(), Some(&review));
        assert_eq!(points.len(), 1 + 3 + 1);
        assert_eq!(points[0].section, "Abstract");
        assert_eq!(points[3].point, "strength 2");
        assert_eq!(points[4].point, "Paper includes 1 key equations/formulae");
        assert_eq!(points[4].importance, "medium");

        assert_eq!(key_points(&content(), None).len(), 2);
    }
}
