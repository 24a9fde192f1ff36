//! # Research Analyser
//!
//! 一个用于学术论文自动分析与评审的 Rust 库
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 纯计算层
//! - `ranking/` - `ContentRanker`，关键词重叠检索，评审和文章合成共用
//! - `scoring/` - 三维度分到总分的线性校准，以及分数档位
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每个外部协作方一个 trait
//! - `LlmService` - LLM 文本补全
//! - `TavilySearch` - 相关工作搜索
//! - `MermaidDiagramGenerator` / `SpeechNarrator` - 图表和旁白
//! - `ArticleSynthesizer` / `ReportWriter` - 文章合成与结果落盘
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一篇论文"的评审流程
//! - `ReviewState` - 单写者字段的累加器
//! - `ReviewStateMachine` - 九个阶段严格串行
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/` - 提取 → {图表 ‖ 评审} → 文章 → 旁白 → 组装
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod ranking;
pub mod scoring;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AnalysisError, AppResult, CollaboratorUnavailable, StageError};
pub use models::{AnalysisOptions, AnalysisResult, ExtractedContent, PeerReview};
pub use orchestrator::StageOrchestrator;
pub use ranking::ContentRanker;
pub use scoring::{calibrate, interpret_score};
pub use workflow::{ReviewStage, ReviewStateMachine};
