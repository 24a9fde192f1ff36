/// 内容提取服务
///
/// 真正的 OCR / 版面分析在外部完成，这里只读取其产出的 JSON / TOML 文件
use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::models::{load_extracted_content, ExtractedContent};

/// 内容提取能力
///
/// 失败对整次分析是致命的
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, source: &str) -> Result<ExtractedContent>;
}

/// 从本地文件读取已提取的内容
#[derive(Debug, Default, Clone)]
pub struct FileExtractor;

impl FileExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Extractor for FileExtractor {
    async fn extract(&self, source: &str) -> Result<ExtractedContent> {
        let content = load_extracted_content(Path::new(source)).await?;
        if content.title.trim().is_empty() && !content.has_body() {
            anyhow::bail!("内容文件为空: {}", source);
        }
        info!(
            "📄 已提取《{}》: {} 个章节, {} 个公式",
            content.title,
            content.sections.len(),
            content.equations.len()
        );
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_extractor_reads_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.json");
        std::fs::write(&path, r#"{"title": "T", "abstract": "A."}"#).unwrap();

        let content = FileExtractor::new()
            .extract(path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(content.title, "T");
    }

    #[tokio::test]
    async fn test_file_extractor_rejects_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, r#"{"title": ""}"#).unwrap();

        assert!(FileExtractor::new()
            .extract(path.to_str().unwrap())
            .await
            .is_err());
    }

    #[test]
    fn test_file_extractor_missing_file() {
        let result = tokio_test::block_on(FileExtractor::new().extract("/nonexistent/paper.json"));
        assert!(result.is_err());
    }
}
