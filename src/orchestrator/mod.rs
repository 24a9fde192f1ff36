//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责单篇论文分析的调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `stage_orchestrator` - 分析编排器
//! - 内容提取（致命）
//! - 图表生成 ‖ 评审流程 并发执行，各自独立失败
//! - 文章合成、语音旁白（可选）
//! - 超时、取消和结果组装
//!
//! ### `summary` - 摘要与要点
//! - 从已提取内容和评审结果中整理，纯函数
//!
//! ## 层次关系
//!
//! ```text
//! stage_orchestrator (处理一篇论文)
//!     ↓
//! workflow::ReviewStateMachine (九阶段评审)
//!     ↓
//! services (能力层：extract / llm / search / diagrams / narration)
//!     ↓
//! ranking / scoring (纯计算)
//! ```
//!
//! ## 设计原则
//!
//! 1. **失败隔离**：可选阶段失败只让对应字段为空
//! 2. **向下依赖**：编排层 → workflow → services → ranking / scoring
//! 3. **无业务逻辑**：只做调度、计时和组装

pub mod stage_orchestrator;
pub mod summary;

pub use stage_orchestrator::StageOrchestrator;
