use std::fmt;

use serde::{Deserialize, Serialize};

/// 评审流程的九个阶段，严格按顺序执行，不跳过、不回退
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReviewStage {
    Intake,
    QueryGeneration,
    RelatedWorkSearch,
    Ranking,
    Summarization,
    StrengthIdentification,
    WeaknessAnalysis,
    ReviewComposition,
    Scoring,
}

impl ReviewStage {
    pub const ALL: [ReviewStage; 9] = [
        ReviewStage::Intake,
        ReviewStage::QueryGeneration,
        ReviewStage::RelatedWorkSearch,
        ReviewStage::Ranking,
        ReviewStage::Summarization,
        ReviewStage::StrengthIdentification,
        ReviewStage::WeaknessAnalysis,
        ReviewStage::ReviewComposition,
        ReviewStage::Scoring,
    ];

    /// 1 起始的序号
    pub fn number(self) -> usize {
        self as usize + 1
    }

    pub fn next(self) -> Option<ReviewStage> {
        Self::ALL.get(self as usize + 1).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            ReviewStage::Intake => "Intake",
            ReviewStage::QueryGeneration => "QueryGeneration",
            ReviewStage::RelatedWorkSearch => "RelatedWorkSearch",
            ReviewStage::Ranking => "Ranking",
            ReviewStage::Summarization => "Summarization",
            ReviewStage::StrengthIdentification => "StrengthIdentification",
            ReviewStage::WeaknessAnalysis => "WeaknessAnalysis",
            ReviewStage::ReviewComposition => "ReviewComposition",
            ReviewStage::Scoring => "Scoring",
        }
    }
}

impl fmt::Display for ReviewStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_sequence() {
        assert_eq!(ReviewStage::Intake.number(), 1);
        assert_eq!(ReviewStage::Scoring.number(), 9);
        assert_eq!(ReviewStage::Intake.next(), Some(ReviewStage::QueryGeneration));
        assert_eq!(ReviewStage::Scoring.next(), None);
        assert!(ReviewStage::Ranking < ReviewStage::Summarization);

        let mut stage = ReviewStage::Intake;
        let mut count = 1;
        while let Some(next) = stage.next() {
            assert!(next > stage);
            stage = next;
            count += 1;
        }
        assert_eq!(count, ReviewStage::ALL.len());
    }
}
