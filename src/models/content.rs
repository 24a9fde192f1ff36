//! 论文内容模型
//!
//! `ExtractedContent` 由外部提取协作方产生，创建后不再修改；
//! `ContentChunk` 是检索的最小单元。

use serde::{Deserialize, Serialize};

/// 提取出的论文内容（只读）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedContent {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default, alias = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub equations: Vec<Equation>,
    #[serde(default)]
    pub references: Vec<Reference>,
}

impl ExtractedContent {
    /// 是否存在正文（摘要或任意非空章节）
    pub fn has_body(&self) -> bool {
        !self.abstract_text.trim().is_empty()
            || self.sections.iter().any(|s| !s.body.trim().is_empty())
    }

    /// 拼接全文：摘要 + 各章节
    pub fn full_text(&self) -> String {
        let mut parts = Vec::with_capacity(self.sections.len() + 1);
        if !self.abstract_text.trim().is_empty() {
            parts.push(self.abstract_text.clone());
        }
        for section in &self.sections {
            parts.push(format!("## {}\n\n{}", section.title, section.body));
        }
        parts.join("\n\n")
    }

    /// 按标题关键字查找第一个匹配章节
    pub fn find_section(&self, keywords: &[&str]) -> Option<&Section> {
        self.sections.iter().find(|s| {
            let title = s.title.to_lowercase();
            keywords.iter().any(|kw| title.contains(kw))
        })
    }

    /// 用于生成 chunk id 的标题 slug
    pub fn slug(&self) -> String {
        slugify(&self.title)
    }

    /// 非行内公式
    pub fn display_equations(&self) -> impl Iterator<Item = &Equation> {
        self.equations.iter().filter(|eq| !eq.is_inline)
    }
}

/// 章节
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    #[serde(default, alias = "content")]
    pub body: String,
    #[serde(default = "default_level")]
    pub level: u8,
}

fn default_level() -> u8 {
    1
}

/// 公式
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Equation {
    pub id: String,
    pub latex: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub is_inline: bool,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// 参考文献
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default)]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub year: Option<u16>,
}

/// chunk 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Abstract,
    Section,
    EquationDescription,
    Reference,
    /// 评审流程中由候选论文临时构造的 chunk
    Candidate,
}

/// 可检索的文本单元
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentChunk {
    pub id: String,
    pub source_section: String,
    pub text: String,
    pub kind: ChunkKind,
}

impl ContentChunk {
    pub fn new(
        id: impl Into<String>,
        source_section: impl Into<String>,
        text: impl Into<String>,
        kind: ChunkKind,
    ) -> Self {
        Self {
            id: id.into(),
            source_section: source_section.into(),
            text: text.into(),
            kind,
        }
    }
}

/// 小写、非字母数字替换为 `-`
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_dash = true;
    for c in text.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}
