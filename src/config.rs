use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::{AnalysisOptions, DiagramType};

/// 程序配置
///
/// 构造后不可变，通过构造函数显式传给各个组件
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub app: AppConfig,
    pub llm: LlmConfig,
    pub review: ReviewConfig,
    pub search: SearchConfig,
    pub storm: StormConfig,
    pub tts: TtsConfig,
    pub diagrams: DiagramConfig,
    pub pipeline: PipelineConfig,
}

/// 应用配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 输出目录
    pub output_dir: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: "output".to_string(),
            verbose_logging: false,
        }
    }
}

// --- LLM 配置 ---
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: String,
    pub api_base_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base_url: "https://api.openai.com/v1".to_string(),
            model_name: "gpt-4o".to_string(),
            temperature: 0.3,
            max_tokens: 2048,
        }
    }
}

// --- 评审配置 ---
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// 排序阶段保留的相关工作数
    pub top_k: usize,
    /// 目标会议，用于提示词
    pub venue: String,
    /// 为每个评审阶段检索的论文片段数
    pub context_chunks: usize,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            venue: "a top ML venue".to_string(),
            context_chunks: 4,
        }
    }
}

// --- 相关工作搜索配置 ---
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// 为空表示未配置，搜索返回空列表
    pub tavily_api_key: String,
    pub tavily_base_url: String,
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tavily_api_key: String::new(),
            tavily_base_url: "https://api.tavily.com".to_string(),
            max_results: 5,
        }
    }
}

// --- STORM 文章配置 ---
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StormConfig {
    /// 大纲最多章节数
    pub max_sections: usize,
    /// 每个章节检索的片段数
    pub retrieve_top_k: usize,
}

impl Default for StormConfig {
    fn default() -> Self {
        Self {
            max_sections: 5,
            retrieve_top_k: 5,
        }
    }
}

// --- 语音配置 ---
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub enabled: bool,
    pub api_base_url: String,
    pub api_key: String,
    pub model: String,
    pub voice: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
        }
    }
}

// --- 图表配置 ---
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagramConfig {
    pub enabled: bool,
    pub types: Vec<String>,
    /// 为 true 时把 Mermaid 源码写入 `<output_dir>/diagrams`
    pub write_files: bool,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            types: vec!["methodology".to_string()],
            write_files: true,
        }
    }
}

// --- 流程配置 ---
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub generate_review: bool,
    pub generate_article: bool,
    pub diagram_timeout_secs: u64,
    pub review_timeout_secs: u64,
    pub article_timeout_secs: u64,
    pub audio_timeout_secs: u64,
    /// 整次运行的截止时间，0 表示不限
    pub run_deadline_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            generate_review: true,
            generate_article: false,
            diagram_timeout_secs: 300,
            review_timeout_secs: 600,
            article_timeout_secs: 600,
            audio_timeout_secs: 600,
            run_deadline_secs: 0,
        }
    }
}

impl PipelineConfig {
    pub fn run_deadline(&self) -> Option<Duration> {
        (self.run_deadline_secs > 0).then(|| Duration::from_secs(self.run_deadline_secs))
    }
}

impl Config {
    /// 默认配置 + 环境变量覆盖
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 读取 TOML 配置文件，再叠加环境变量
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
                path: path.display().to_string(),
                source,
            })?;
        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// `RESEARCH_ANALYSER_CONFIG` 指向的文件存在则读取，否则只用环境变量
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("RESEARCH_ANALYSER_CONFIG")
            .unwrap_or_else(|_| "research_analyser.toml".to_string());
        if Path::new(&path).exists() {
            Self::from_toml_file(Path::new(&path))
        } else {
            let config = Self::from_env();
            config.validate()?;
            Ok(config)
        }
    }

    fn with_env_overrides(self) -> Self {
        let d = self;
        Self {
            app: AppConfig {
                output_dir: env_or("OUTPUT_DIR", d.app.output_dir),
                verbose_logging: env_parse("VERBOSE_LOGGING", d.app.verbose_logging),
            },
            llm: LlmConfig {
                api_key: env_or("OPENAI_API_KEY", d.llm.api_key),
                api_base_url: env_or("LLM_API_BASE_URL", d.llm.api_base_url),
                model_name: env_or("LLM_MODEL_NAME", d.llm.model_name),
                temperature: env_parse("LLM_TEMPERATURE", d.llm.temperature),
                max_tokens: env_parse("LLM_MAX_TOKENS", d.llm.max_tokens),
            },
            review: ReviewConfig {
                top_k: env_parse("REVIEW_TOP_K", d.review.top_k),
                venue: env_or("REVIEW_VENUE", d.review.venue),
                context_chunks: env_parse("REVIEW_CONTEXT_CHUNKS", d.review.context_chunks),
            },
            search: SearchConfig {
                tavily_api_key: env_or("TAVILY_API_KEY", d.search.tavily_api_key),
                tavily_base_url: env_or("TAVILY_BASE_URL", d.search.tavily_base_url),
                max_results: env_parse("SEARCH_MAX_RESULTS", d.search.max_results),
            },
            storm: d.storm,
            tts: TtsConfig {
                enabled: env_parse("TTS_ENABLED", d.tts.enabled),
                api_base_url: env_or("TTS_API_BASE_URL", d.tts.api_base_url),
                api_key: env_or("TTS_API_KEY", d.tts.api_key),
                model: env_or("TTS_MODEL", d.tts.model),
                voice: env_or("TTS_VOICE", d.tts.voice),
            },
            diagrams: DiagramConfig {
                enabled: env_parse("GENERATE_DIAGRAMS", d.diagrams.enabled),
                ..d.diagrams
            },
            pipeline: PipelineConfig {
                generate_review: env_parse("GENERATE_REVIEW", d.pipeline.generate_review),
                generate_article: env_parse("GENERATE_ARTICLE", d.pipeline.generate_article),
                run_deadline_secs: env_parse("RUN_DEADLINE_SECS", d.pipeline.run_deadline_secs),
                ..d.pipeline
            },
        }
    }

    /// 检查配置值
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.review.top_k == 0 {
            return Err(ConfigError::Invalid {
                key: "review.top_k".to_string(),
                reason: "必须大于 0".to_string(),
            });
        }
        if let Some(bad) = self
            .diagrams
            .types
            .iter()
            .find(|t| DiagramType::parse(t).is_none())
        {
            return Err(ConfigError::Invalid {
                key: "diagrams.types".to_string(),
                reason: format!("未知图表类型: {}", bad),
            });
        }
        Ok(())
    }

    /// 由配置得到单次分析的开关
    pub fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            generate_diagrams: self.diagrams.enabled,
            generate_review: self.pipeline.generate_review,
            generate_article: self.pipeline.generate_article,
            generate_audio: self.tts.enabled,
            diagram_types: self
                .diagrams
                .types
                .iter()
                .filter_map(|t| DiagramType::parse(t))
                .collect(),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
