//! 语音旁白服务 - 业务能力层
//!
//! - `build_narration`：把分析结果整理成朗读稿
//! - `clean_for_speech`：去掉 LaTeX / Markdown / HTML 标记
//! - `SpeechNarrator`：调用 OpenAI 兼容的 `/audio/speech` 接口生成 mp3

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::TtsConfig;
use crate::models::{AudioHandle, ExtractedContent, KeyPoint, PaperSummary, PeerReview};
use crate::scoring::interpret_score;

/// 单次请求的最大字符数
const MAX_CHUNK_CHARS: usize = 4000;

/// 语音合成能力，独立失败域
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<AudioHandle>;
}

/// OpenAI 兼容的语音合成
pub struct SpeechNarrator {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    voice: String,
    output_path: PathBuf,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

impl SpeechNarrator {
    /// # 参数
    /// - `config`: 语音配置
    /// - `output_dir`: 音频文件写入目录
    pub fn new(config: &TtsConfig, output_dir: impl Into<PathBuf>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("无法创建 HTTP 客户端")?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            voice: config.voice.clone(),
            output_path: output_dir.into().join("narration.mp3"),
        })
    }

    async fn synthesize_chunk(&self, text: &str) -> Result<Vec<u8>> {
        let body = SpeechRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            response_format: "mp3",
        };

        let response = self
            .http
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("语音合成请求失败")?;

        if !response.status().is_success() {
            anyhow::bail!("语音合成返回错误状态: {}", response.status());
        }

        Ok(response.bytes().await.context("无法读取音频数据")?.to_vec())
    }
}

#[async_trait]
impl Narrator for SpeechNarrator {
    async fn synthesize(&self, text: &str) -> Result<AudioHandle> {
        let chunks = chunk_text(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            anyhow::bail!("朗读稿为空");
        }
        debug!("朗读稿 {} 字符，分为 {} 段", text.chars().count(), chunks.len());

        // mp3 帧可以直接拼接
        let mut audio = Vec::new();
        for chunk in &chunks {
            audio.extend(self.synthesize_chunk(chunk).await?);
        }

        if let Some(parent) = self.output_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("无法创建目录: {}", parent.display()))?;
        }
        tokio::fs::write(&self.output_path, &audio)
            .await
            .with_context(|| format!("无法写入音频: {}", self.output_path.display()))?;

        info!("🔊 音频已保存: {}", self.output_path.display());

        Ok(AudioHandle {
            path: self.output_path.clone(),
            bytes: audio.len() as u64,
            format: "mp3".to_string(),
        })
    }
}

/// 生成朗读稿
pub fn build_narration(
    content: &ExtractedContent,
    summary: &PaperSummary,
    key_points: &[KeyPoint],
    review: Option<&PeerReview>,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    parts.push(format!("Analysis report for the paper: {}.", content.title));
    if !content.authors.is_empty() {
        let authors: Vec<&str> = content.authors.iter().take(5).map(String::as_str).collect();
        parts.push(format!("By {}.", authors.join(", ")));
    }

    push_nonempty(&mut parts, &summary.one_sentence);
    push_nonempty(&mut parts, &summary.abstract_summary);

    if !key_points.is_empty() {
        parts.push("Key findings:".to_string());
        for (i, kp) in key_points.iter().enumerate() {
            parts.push(format!("Finding {}: {}. {}.", i + 1, kp.point, kp.evidence));
        }
    }

    for (heading, text) in [
        ("Methodology overview:", &summary.methodology_summary),
        ("Results:", &summary.results_summary),
        ("Conclusions:", &summary.conclusions),
    ] {
        if !text.trim().is_empty() {
            parts.push(heading.to_string());
            parts.push(text.clone());
        }
    }

    if let Some(review) = review {
        parts.push(format!(
            "Peer review score: {:.1} out of 10, corresponding to {}.",
            review.overall_score,
            interpret_score(review.overall_score)
        ));
        if !review.strengths.is_empty() {
            parts.push("Strengths identified by the review:".to_string());
            parts.extend(review.strengths.iter().take(5).map(|f| f.statement.clone()));
        }
        if !review.weaknesses.is_empty() {
            parts.push("Weaknesses identified by the review:".to_string());
            parts.extend(review.weaknesses.iter().take(5).map(|f| f.statement.clone()));
        }
    }

    parts.push(format!(
        "The paper contains {} sections, {} equations, and {} references.",
        content.sections.len(),
        content.equations.len(),
        content.references.len()
    ));

    clean_for_speech(&parts.join("\n"))
}

fn push_nonempty(parts: &mut Vec<String>, text: &str) {
    if !text.trim().is_empty() {
        parts.push(text.to_string());
    }
}

fn speech_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"(?s)\$\$.*?\$\$", ""),
            (r"\$[^$]+\$", ""),
            (r"\*{1,3}([^*]+)\*{1,3}", "$1"),
            (r"\[([^\]]+)\]\([^)]+\)", "$1"),
            (r"#{1,6}\s*", ""),
            (r"<[^>]+>", ""),
            (r"\s+", " "),
        ]
        .into_iter()
        .filter_map(|(pattern, rep)| Regex::new(pattern).ok().map(|re| (re, rep)))
        .collect()
    })
}

/// 去掉不适合朗读的标记并压缩空白
pub fn clean_for_speech(text: &str) -> String {
    let mut cleaned = text.to_string();
    for (re, rep) in speech_patterns() {
        cleaned = re.replace_all(&cleaned, *rep).into_owned();
    }
    cleaned.trim().to_string()
}

/// 按句子切分，每段不超过 max_chars（单句超长时硬切）
fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        let needed = current.chars().count() + sentence.chars().count() + 1;
        if !current.is_empty() && needed > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if sentence.chars().count() > max_chars {
            let chars: Vec<char> = sentence.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(sentence);
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(_, next)) = chars.peek() {
                if next.is_whitespace() {
                    let end = idx + c.len_utf8();
                    sentences.push(text[start..end].trim());
                    start = end;
                }
            }
        }
    }
    sentences.push(text[start..].trim());
    sentences.into_iter().filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Finding;
    use std::collections::BTreeMap;

    #[test]
    fn test_clean_for_speech_strips_markup() {
        let text = "## Results\n**Bold** claim with $x^2$ and $$\\sum_i x_i$$ see [paper](https://arxiv.org) <b>now</b>";
        assert_eq!(clean_for_speech(text), "Results Bold claim with and see paper now");
    }

    #[test]
    fn test_chunk_text_respects_limit() {
        let text = "First sentence. Second sentence! Third one? Fourth.";
        let chunks = chunk_text(text, 20);
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
        assert_eq!(chunks.join(" "), text);

        let long = "a".repeat(45);
        let chunks = chunk_text(&long, 20);
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn test_build_narration_mentions_score_and_caps_lists() {
        let content = ExtractedContent {
            title: "Attention Is All You Need".to_string(),
            authors: (1..=7).map(|i| format!("Author{}", i)).collect(),
            ..Default::default()
        };
        let finding = |s: &str| Finding {
            statement: s.to_string(),
            section: "Intro".to_string(),
            evidence: String::new(),
        };
        let review = PeerReview {
            overall_score: 6.5,
            confidence: 3.0,
            dimensions: BTreeMap::new(),
            strengths: (0..7).map(|i| finding(&format!("strength{}", i))).collect(),
            weaknesses: vec![finding("weak")],
            suggestions: vec![],
            related_works: vec![],
            raw_review_text: String::new(),
        };

        let script = build_narration(&content, &PaperSummary::default(), &[], Some(&review));
        assert!(script.contains("By Author1, Author2, Author3, Author4, Author5."));
        assert!(!script.contains("Author6"));
        assert!(script.contains("6.5 out of 10, corresponding to Weak Accept"));
        assert!(script.contains("strength4"));
        assert!(!script.contains("strength5"));
        assert!(script.contains("0 sections, 0 equations, and 0 references"));
    }
}
