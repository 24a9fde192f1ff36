use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use research_analyser::config::Config;
use research_analyser::error::AnalysisError;
use research_analyser::models::list_content_files;
use research_analyser::orchestrator::StageOrchestrator;
use research_analyser::scoring::{
    interpret_score, load_external_review, load_local_review, render_comparison,
};
use research_analyser::services::ReportWriter;
use research_analyser::utils::logging;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logging::init(config.app.verbose_logging);

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("compare") {
        return compare(&config, &args[1..]).await;
    }

    let source = args.first().cloned().context(
        "用法: research_analyser <已提取内容文件或目录 (.json / .toml)>\n\
         \x20     research_analyser compare <外部评审文件> [本地输出目录] [保存路径]",
    )?;

    logging::log_startup(&source, &config.llm.model_name);

    // 目录：逐篇分析，每篇的报告、图表和音频写到独立子目录
    if Path::new(&source).is_dir() {
        let files = list_content_files(&source).await?;
        info!("📂 找到 {} 个待分析文件", files.len());
        for file in files {
            let name = file
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "paper".to_string());
            let output_dir = PathBuf::from(&config.app.output_dir).join(name);
            if let Err(e) = analyse_one(&config, &file.to_string_lossy(), &output_dir).await {
                error!("❌ {} 分析失败: {}", file.display(), e);
            }
        }
        return Ok(());
    }

    let output_dir = PathBuf::from(&config.app.output_dir);
    analyse_one(&config, &source, &output_dir).await?;
    Ok(())
}

/// 分析一篇论文并写出全部结果
async fn analyse_one(config: &Config, source: &str, output_dir: &Path) -> Result<()> {
    let orchestrator = StageOrchestrator::from_config_in(config, output_dir)?;
    let result = orchestrator.run(source, &config.analysis_options()).await?;

    let writer = ReportWriter::new(output_dir);
    writer
        .save_all(&result)
        .await
        .map_err(|e| AnalysisError::output(output_dir.display().to_string(), e))?;

    let outputs = BTreeMap::from([
        ("review", result.review.is_some()),
        ("diagrams", result.diagrams.is_some()),
        ("article", result.article.is_some()),
        ("audio", result.audio.is_some()),
    ]);
    logging::print_final_stats(
        &outputs,
        result.metadata.total_ms,
        &writer.output_dir().display().to_string(),
    );
    Ok(())
}

/// 对比本地评审和外部评审，写出 Markdown 报告
async fn compare(config: &Config, args: &[String]) -> Result<()> {
    let external_path = PathBuf::from(args.first().context("compare 需要外部评审文件路径")?);
    let local_dir = args
        .get(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&config.app.output_dir));
    let save_path = args
        .get(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&config.app.output_dir).join("review_comparison.md"));

    let local = load_local_review(&local_dir).await?;
    let external = load_external_review(&external_path).await?;
    let markdown = render_comparison(&local, &external);

    if let Some(parent) = save_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("无法创建目录: {}", parent.display()))?;
    }
    tokio::fs::write(&save_path, &markdown)
        .await
        .map_err(|e| AnalysisError::output(save_path.display().to_string(), e.into()))?;

    info!("📊 对比报告已保存: {}", save_path.display());
    for (label, snapshot) in [("本地", &local), ("外部", &external)] {
        match snapshot.overall {
            Some(score) => info!("   {}总分: {:.2} ({})", label, score, interpret_score(score)),
            None => info!("   {}总分: n/a", label),
        }
    }
    Ok(())
}
