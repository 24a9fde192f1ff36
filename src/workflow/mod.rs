//! 流程层（Workflow）
//!
//! 定义"一篇论文"的评审流程：九个阶段按顺序读写 `ReviewState`

pub mod review_flow;
pub mod review_parse;
pub mod review_stage;
pub mod review_state;

pub use review_flow::ReviewStateMachine;
pub use review_stage::ReviewStage;
pub use review_state::{AccessKind, DimensionalScores, PaperMeta, ReviewState, SlotAccess, StageSlot};
