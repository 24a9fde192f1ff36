//! 文章生成服务（STORM 风格）
//!
//! 以论文自身内容为检索语料，生成带引用的百科式文章：
//! 1. LLM 生成大纲（失败时用论文章节标题）
//! 2. 每个标题用 `ContentRanker::rank_multi` 检索片段
//! 3. LLM 按片段写作，正文用 `[n]` 引用
//! 4. 末尾附参考列表（chunk id）

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::config::StormConfig;
use crate::models::{ContentChunk, ExtractedContent};
use crate::ranking::{build_chunks, ContentRanker};
use crate::services::llm_service::TextCompletion;

const SYSTEM_PROMPT: &str = "You write neutral, well-cited encyclopedia articles about research papers. \
Only state facts supported by the numbered sources you are given.";

/// 文章生成器
pub struct ArticleSynthesizer {
    llm: Arc<dyn TextCompletion>,
    max_sections: usize,
    retrieve_top_k: usize,
}

impl ArticleSynthesizer {
    pub fn new(llm: Arc<dyn TextCompletion>, config: &StormConfig) -> Self {
        Self {
            llm,
            max_sections: config.max_sections.max(1),
            retrieve_top_k: config.retrieve_top_k.max(1),
        }
    }

    /// 生成整篇文章（Markdown）
    pub async fn synthesize(&self, content: &ExtractedContent) -> Result<String> {
        let ranker = ContentRanker::build(build_chunks(content));
        let outline = self.outline(content).await;
        info!("📝 文章大纲: {} 个章节", outline.len());

        let mut citations = Citations::default();
        let mut sections = Vec::with_capacity(outline.len());

        for heading in &outline {
            let sources = ranker.rank_multi(&[heading.as_str(), content.title.as_str()], self.retrieve_top_k);
            let numbered: Vec<(usize, &ContentChunk)> =
                sources.iter().map(|c| (citations.number_for(c), c)).collect();

            let body = self.write_section(&content.title, heading, &numbered).await?;
            debug!("章节《{}》: {} 个来源, {} 字符", heading, numbered.len(), body.len());
            sections.push((heading.clone(), body));
        }

        if sections.iter().all(|(_, body)| body.trim().is_empty()) {
            warn!("⚠️ 文章正文为空: {}", content.title);
        }

        Ok(render_article(&content.title, &sections, &citations))
    }

    async fn outline(&self, content: &ExtractedContent) -> Vec<String> {
        let prompt = format!(
            "Propose an outline for an encyclopedia article about the paper below.\n\
             Return at most {} section headings, one per line, without numbering.\n\n\
             Title: {}\nAbstract: {}",
            self.max_sections, content.title, content.abstract_text
        );

        match self.llm.complete(&prompt, Some(SYSTEM_PROMPT)).await {
            Ok(response) => {
                let headings = parse_outline(&response, self.max_sections);
                if !headings.is_empty() {
                    return headings;
                }
                warn!("⚠️ 无法解析大纲，改用论文章节标题");
            }
            Err(e) => warn!("⚠️ 大纲生成失败，改用论文章节标题: {}", e),
        }
        fallback_outline(content, self.max_sections)
    }

    async fn write_section(
        &self,
        title: &str,
        heading: &str,
        sources: &[(usize, &ContentChunk)],
    ) -> Result<String> {
        let source_text: Vec<String> = sources
            .iter()
            .map(|(n, chunk)| format!("[{}] ({}) {}", n, chunk.source_section, chunk.text))
            .collect();

        let prompt = format!(
            "Write the section \"{}\" of an article about \"{}\".\n\
             Cite sources inline as [n]. Do not repeat the heading.\n\n\
             Sources:\n{}",
            heading,
            title,
            source_text.join("\n\n")
        );
        self.llm.complete(&prompt, Some(SYSTEM_PROMPT)).await
    }
}

/// 引用编号：按首次引用顺序从 1 开始
#[derive(Default)]
struct Citations {
    numbers: HashMap<String, usize>,
    ordered: Vec<(String, String)>,
}

impl Citations {
    fn number_for(&mut self, chunk: &ContentChunk) -> usize {
        if let Some(n) = self.numbers.get(&chunk.id) {
            return *n;
        }
        self.ordered.push((chunk.id.clone(), chunk.source_section.clone()));
        let n = self.ordered.len();
        self.numbers.insert(chunk.id.clone(), n);
        n
    }
}

fn parse_outline(response: &str, max_sections: usize) -> Vec<String> {
    response
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| c == '#' || c == '-' || c == '*' || c.is_ascii_digit())
                .trim_start_matches(['.', ')'])
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .take(max_sections)
        .collect()
}

fn fallback_outline(content: &ExtractedContent, max_sections: usize) -> Vec<String> {
    let headings: Vec<String> = content
        .sections
        .iter()
        .filter(|s| s.level <= 1 && !s.body.trim().is_empty())
        .map(|s| s.title.trim().to_string())
        .filter(|t| !t.is_empty())
        .take(max_sections)
        .collect();

    if headings.is_empty() {
        vec!["Overview".to_string()]
    } else {
        headings
    }
}

fn render_article(title: &str, sections: &[(String, String)], citations: &Citations) -> String {
    let mut out = format!("# {}\n\n", title);
    for (heading, body) in sections {
        out.push_str(&format!("## {}\n\n{}\n\n", heading, body.trim()));
    }
    if !citations.ordered.is_empty() {
        out.push_str("## References\n\n");
        for (idx, (id, section)) in citations.ordered.iter().enumerate() {
            out.push_str(&format!("[{}] {} ({})\n", idx + 1, id, section));
        }
    }
    out.trim_end().to_string() + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Section;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedLlm {
        outline: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextCompletion for ScriptedLlm {
        async fn complete(&self, user_message: &str, _system: Option<&str>) -> Result<String> {
            self.prompts.lock().unwrap().push(user_message.to_string());
            if user_message.starts_with("Propose an outline") {
                return self
                    .outline
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("outline unavailable"));
            }
            Ok("Body text [1].".to_string())
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn sample() -> ExtractedContent {
        ExtractedContent {
            title: "Attention Is All You Need".to_string(),
            abstract_text: "We propose the Transformer based on attention.".to_string(),
            sections: vec![
                Section {
                    title: "Introduction".to_string(),
                    body: "Recurrent models are sequential.".to_string(),
                    level: 1,
                },
                Section {
                    title: "Training".to_string(),
                    body: "We trained on WMT 2014.".to_string(),
                    level: 1,
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_outline_strips_numbering() {
        let headings = parse_outline("1. Background\n## Method\n- Results\n\n* Impact", 3);
        assert_eq!(headings, vec!["Background", "Method", "Results"]);
    }

    #[tokio::test]
    async fn test_synthesize_cites_chunks_and_lists_references() {
        let llm = Arc::new(ScriptedLlm {
            outline: Some("Background\nTraining".to_string()),
            prompts: Mutex::new(Vec::new()),
        });
        let synthesizer = ArticleSynthesizer::new(llm.clone(), &StormConfig::default());

        let article = synthesizer.synthesize(&sample()).await.unwrap();
        assert!(article.starts_with("# Attention Is All You Need"));
        assert!(article.contains("## Background"));
        assert!(article.contains("## Training"));
        assert!(article.contains("## References"));
        assert!(article.contains("[1] paper://attention-is-all-you-need/"));
        // 大纲 + 两个章节
        assert_eq!(llm.prompts.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_outline_failure_falls_back_to_section_titles() {
        let llm = Arc::new(ScriptedLlm {
            outline: None,
            prompts: Mutex::new(Vec::new()),
        });
        let synthesizer = ArticleSynthesizer::new(llm, &StormConfig::default());

        let article = synthesizer.synthesize(&sample()).await.unwrap();
        assert!(article.contains("## Introduction"));
        assert!(article.contains("## Training"));
    }

    #[test]
    fn test_fallback_outline_for_empty_paper() {
        let content = ExtractedContent {
            title: "T".to_string(),
            ..Default::default()
        };
        assert_eq!(fallback_outline(&content, 5), vec!["Overview"]);
    }
}
