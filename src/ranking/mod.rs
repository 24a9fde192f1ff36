//! 检索层（纯计算，不挂起）
//!
//! 评审流程的相关工作排序和文章合成的内容检索共用同一个 `ContentRanker`。

pub mod chunks;
pub mod content_ranker;

pub use chunks::build_chunks;
pub use content_ranker::{tokenize, ContentRanker, ScoredChunk};
