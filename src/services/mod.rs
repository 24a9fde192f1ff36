//! 业务能力层（Services）
//!
//! 每个服务只描述"我能做什么"，不关心流程顺序：
//! - `Extractor`：读取已提取的论文内容（失败即致命）
//! - `TextCompletion`：LLM 文本补全
//! - `RelatedWorkSearch`：相关工作搜索
//! - `DiagramGenerator` / `Narrator`：可选产出，各自独立失败
//! - `ArticleSynthesizer` / `ReportWriter`：文章合成与结果落盘

pub mod article_service;
pub mod diagram_service;
pub mod extraction_service;
pub mod llm_service;
pub mod narration_service;
pub mod report_writer;
pub mod search_service;

pub use article_service::ArticleSynthesizer;
pub use diagram_service::{DiagramGenerator, MermaidDiagramGenerator};
pub use extraction_service::{Extractor, FileExtractor};
pub use llm_service::{LlmService, TextCompletion};
pub use narration_service::{build_narration, clean_for_speech, Narrator, SpeechNarrator};
pub use report_writer::ReportWriter;
pub use search_service::{RelatedWorkSearch, TavilySearch};
