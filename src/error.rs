//! 错误类型
//!
//! 三层错误分类：
//! - `AnalysisError`：致命错误（提取失败、取消等），直接终止本次分析
//! - `StageError`：评审流程 1~9 阶段中的错误，只让评审结果缺失
//! - `CollaboratorUnavailable`：可选阶段（图表 / 评审 / 文章 / 音频）失败，降级为缺省输出

use thiserror::Error;

use crate::workflow::ReviewStage;

/// 致命错误
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// 内容提取失败，没有内容就无法继续
    #[error("内容提取失败 ({source_ref}): {source}")]
    Extraction {
        source_ref: String,
        #[source]
        source: anyhow::Error,
    },

    /// 整次运行被取消（调用方截止时间或主动取消）
    #[error("分析已取消: {reason}")]
    Cancelled { reason: String },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 结果写入失败
    #[error("写入输出失败 ({path}): {source}")]
    Output {
        path: String,
        #[source]
        source: anyhow::Error,
    },
}

/// 评审阶段错误
#[derive(Debug, Error)]
pub enum StageError {
    /// 论文缺少标题或正文
    #[error("论文信息不完整: {0}")]
    Intake(String),

    /// LLM 调用失败
    #[error("阶段 {stage} 调用 LLM 失败: {source}")]
    Llm {
        stage: ReviewStage,
        #[source]
        source: anyhow::Error,
    },

    /// 单写者字段被二次写入
    #[error("字段 {field} 已由阶段 {owner} 写入，不能再次写入")]
    SlotAlreadyWritten {
        field: &'static str,
        owner: ReviewStage,
    },

    /// 读取了尚未写入的字段
    #[error("阶段 {reader} 读取字段 {field} 时该字段尚未写入 (写入者: {owner})")]
    SlotNotWritten {
        field: &'static str,
        owner: ReviewStage,
        reader: ReviewStage,
    },

    /// 非指定阶段尝试写入
    #[error("字段 {field} 只能由阶段 {owner} 写入，实际写入者: {writer}")]
    ForeignWriter {
        field: &'static str,
        owner: ReviewStage,
        writer: ReviewStage,
    },

    /// 阶段顺序错乱
    #[error("阶段顺序错误: 期望 {expected}，实际 {actual}")]
    OutOfOrder {
        expected: ReviewStage,
        actual: ReviewStage,
    },
}

impl StageError {
    /// 包装 LLM 调用错误
    pub fn llm(stage: ReviewStage, source: anyhow::Error) -> Self {
        StageError::Llm { stage, source }
    }
}

/// 可选阶段不可用
#[derive(Debug, Error)]
pub enum CollaboratorUnavailable {
    /// 协作方返回错误
    #[error("{stage} 失败: {source}")]
    Failed {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// 超时
    #[error("{stage} 超时 ({secs} 秒)")]
    TimedOut { stage: &'static str, secs: u64 },

    /// 被取消
    #[error("{stage} 已取消")]
    Cancelled { stage: &'static str },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// TOML 解析失败
    #[error("TOML 解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// 配置值非法
    #[error("配置项 {key} 非法: {reason}")]
    Invalid { key: String, reason: String },
}

// ========== 便捷构造函数 ==========

impl AnalysisError {
    /// 创建提取错误
    pub fn extraction(source_ref: impl Into<String>, source: anyhow::Error) -> Self {
        AnalysisError::Extraction {
            source_ref: source_ref.into(),
            source,
        }
    }

    /// 创建取消错误
    pub fn cancelled(reason: impl Into<String>) -> Self {
        AnalysisError::Cancelled {
            reason: reason.into(),
        }
    }

    /// 创建输出错误
    pub fn output(path: impl Into<String>, source: anyhow::Error) -> Self {
        AnalysisError::Output {
            path: path.into(),
            source,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_display_names_stage() {
        let err = StageError::llm(ReviewStage::Scoring, anyhow::anyhow!("boom"));
        let msg = err.to_string();
        assert!(msg.contains("Scoring"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn test_config_error_converts_into_analysis_error() {
        let err: AnalysisError = ConfigError::Invalid {
            key: "review.top_k".to_string(),
            reason: "必须大于 0".to_string(),
        }
        .into();
        assert!(matches!(err, AnalysisError::Config(_)));
    }
}
