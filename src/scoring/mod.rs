//! 评分校准和评审对比（纯计算）

pub mod calibrator;
pub mod comparison;

pub use calibrator::{
    calibrate, interpret_score, Decision, INTERCEPT, MAX_SCORE, MIN_SCORE, WEIGHT_CONTRIBUTION,
    WEIGHT_PRESENTATION, WEIGHT_SOUNDNESS,
};
pub use comparison::{
    load_external_review, load_local_review, parse_external_review, render_comparison,
    ReviewSnapshot,
};
