/// 日志工具模块
///
/// 提供日志初始化以及格式化输出的辅助函数
use std::collections::BTreeMap;

use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化 tracing 订阅者
///
/// `RUST_LOG` 优先；未设置时 verbose 为 debug，否则为 info。
/// 重复调用不会报错（测试中可能多次初始化）
///
/// # 参数
/// - `verbose`: 是否输出详细日志
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("research_analyser={}", default_level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `source`: 论文来源
/// - `model`: 评审使用的模型名
pub fn log_startup(source: &str, model: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 论文分析模式");
    info!("📄 论文来源: {}", source);
    info!("🤖 评审模型: {}", model);
    info!("{}", "=".repeat(60));
}

/// 记录阶段开始
pub fn log_stage_start(stage: &str) {
    info!("\n{}", "─".repeat(60));
    info!("▶️  开始: {}", stage);
}

/// 记录阶段完成
///
/// # 参数
/// - `stage`: 阶段名
/// - `elapsed_ms`: 耗时（毫秒）
/// - `produced`: 是否产出结果
pub fn log_stage_complete(stage: &str, elapsed_ms: u64, produced: bool) {
    if produced {
        info!("✓ {} 完成 ({} ms)", stage, elapsed_ms);
    } else {
        info!("⚠️ {} 无结果 ({} ms)", stage, elapsed_ms);
    }
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `outputs`: 各输出项是否生成
/// - `total_ms`: 总耗时
/// - `output_dir`: 输出目录
pub fn print_final_stats(outputs: &BTreeMap<&str, bool>, total_ms: u64, output_dir: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 分析完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    for (name, produced) in outputs {
        let mark = if *produced { "✅" } else { "❌" };
        info!("{} {}", mark, name);
    }
    info!("⏱️ 总耗时: {} ms", total_ms);
    info!("{}", "=".repeat(60));
    info!("\n结果已保存至: {}", output_dir);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
