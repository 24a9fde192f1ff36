pub mod content;
pub mod loaders;
pub mod report;
pub mod review;

pub use content::{ChunkKind, ContentChunk, Equation, ExtractedContent, Reference, Section};
pub use loaders::{list_content_files, load_extracted_content};
pub use report::{
    AnalysisOptions, AnalysisResult, AudioHandle, Diagram, DiagramType, KeyPoint, PaperSummary,
    ResultMetadata,
};
pub use review::{
    CandidateWork, DimensionScore, Finding, PeerReview, RelatedWork, SearchQuery, SpecificityLevel,
};
