use crate::models::content::ExtractedContent;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从 JSON 或 TOML 文件加载已提取的论文内容
///
/// 按扩展名选择解析方式，其他扩展名一律按 JSON 处理
pub async fn load_extracted_content(path: &Path) -> Result<ExtractedContent> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取内容文件: {}", path.display()))?;

    let extracted: ExtractedContent = match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("无法解析TOML文件: {}", path.display()))?,
        _ => serde_json::from_str(&content)
            .with_context(|| format!("无法解析JSON文件: {}", path.display()))?,
    };

    tracing::debug!(
        "已加载 {}: {} 个章节, {} 个公式, {} 条参考文献",
        path.file_name().unwrap_or_default().to_string_lossy(),
        extracted.sections.len(),
        extracted.equations.len(),
        extracted.references.len()
    );

    Ok(extracted)
}

/// 列出文件夹中所有可加载的内容文件（.json / .toml），按文件名排序
pub async fn list_content_files(folder_path: &str) -> Result<Vec<PathBuf>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut files = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if matches!(
            path.extension().and_then(|s| s.to_str()),
            Some("json") | Some("toml")
        ) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
