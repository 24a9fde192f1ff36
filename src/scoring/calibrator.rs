//! 评分校准
//!
//! `score = -0.3057 + 0.7134*S + 0.4242*P + 1.0588*C`，结果截断到 [1, 10]。
//! 贡献度权重最大，其次是严谨性，表达最小。置信度不参与计算。

use std::fmt;

use serde::{Deserialize, Serialize};

pub const INTERCEPT: f64 = -0.3057;
pub const WEIGHT_SOUNDNESS: f64 = 0.7134;
pub const WEIGHT_PRESENTATION: f64 = 0.4242;
pub const WEIGHT_CONTRIBUTION: f64 = 1.0588;

pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 10.0;

/// 由三个维度分计算总分
pub fn calibrate(soundness: f64, presentation: f64, contribution: f64) -> f64 {
    let raw = INTERCEPT
        + WEIGHT_SOUNDNESS * soundness
        + WEIGHT_PRESENTATION * presentation
        + WEIGHT_CONTRIBUTION * contribution;
    raw.clamp(MIN_SCORE, MAX_SCORE)
}

/// 评审结论（仅用于展示）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    StrongReject,
    Reject,
    WeakReject,
    Borderline,
    WeakAccept,
    Accept,
    StrongAccept,
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::StrongReject => "Strong Reject",
            Decision::Reject => "Reject",
            Decision::WeakReject => "Weak Reject",
            Decision::Borderline => "Borderline",
            Decision::WeakAccept => "Weak Accept",
            Decision::Accept => "Accept",
            Decision::StrongAccept => "Strong Accept",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 左闭右开的七个区间，[8, 10] 为 Strong Accept
pub fn interpret_score(score: f64) -> Decision {
    match score {
        s if s < 3.0 => Decision::StrongReject,
        s if s < 4.0 => Decision::Reject,
        s if s < 5.0 => Decision::WeakReject,
        s if s < 6.0 => Decision::Borderline,
        s if s < 7.0 => Decision::WeakAccept,
        s if s < 8.0 => Decision::Accept,
        _ => Decision::StrongAccept,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_lowest_inputs() {
        let expected = -0.3057 + 0.7134 + 0.4242 + 1.0588;
        assert!((calibrate(1.0, 1.0, 1.0) - expected).abs() < EPS);
        assert!((calibrate(1.0, 1.0, 1.0) - 1.8907).abs() < 1e-6);
    }

    #[test]
    fn test_highest_inputs() {
        let expected = -0.3057 + 4.0 * (0.7134 + 0.4242 + 1.0588);
        assert!((calibrate(4.0, 4.0, 4.0) - expected).abs() < EPS);
        assert!((calibrate(4.0, 4.0, 4.0) - 8.4799).abs() < 1e-6);
    }

    #[test]
    fn test_formula_midpoint() {
        let expected = -0.3057 + 0.7134 * 3.0 + 0.4242 * 3.0 + 1.0588 * 3.0;
        assert!((calibrate(3.0, 3.0, 3.0) - expected).abs() < EPS);
    }

    #[test]
    fn test_clamped_for_out_of_range_inputs() {
        assert_eq!(calibrate(0.0, 0.0, 0.0), MIN_SCORE);
        assert_eq!(calibrate(10.0, 10.0, 10.0), MAX_SCORE);
    }

    #[test]
    fn test_monotonic_in_each_dimension() {
        let steps = [1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0];
        for &a in &steps {
            for &b in &steps {
                for w in steps.windows(2) {
                    assert!(calibrate(w[1], a, b) > calibrate(w[0], a, b));
                    assert!(calibrate(a, w[1], b) > calibrate(a, w[0], b));
                    assert!(calibrate(a, b, w[1]) > calibrate(a, b, w[0]));
                }
            }
        }
    }

    #[test]
    fn test_contribution_has_highest_weight() {
        let base = calibrate(2.0, 2.0, 2.0);
        let delta_s = calibrate(3.0, 2.0, 2.0) - base;
        let delta_p = calibrate(2.0, 3.0, 2.0) - base;
        let delta_c = calibrate(2.0, 2.0, 3.0) - base;

        assert!((delta_s - WEIGHT_SOUNDNESS).abs() < EPS);
        assert!((delta_p - WEIGHT_PRESENTATION).abs() < EPS);
        assert!((delta_c - WEIGHT_CONTRIBUTION).abs() < EPS);
        assert!(delta_c > delta_s && delta_s > delta_p);
    }

    #[test]
    fn test_interpret_score_bands() {
        assert_eq!(interpret_score(1.0), Decision::StrongReject);
        assert_eq!(interpret_score(2.99), Decision::StrongReject);
        assert_eq!(interpret_score(3.0), Decision::Reject);
        assert_eq!(interpret_score(4.5), Decision::WeakReject);
        assert_eq!(interpret_score(5.5), Decision::Borderline);
        assert_eq!(interpret_score(6.5), Decision::WeakAccept);
        assert_eq!(interpret_score(7.5), Decision::Accept);
        assert_eq!(interpret_score(8.0), Decision::StrongAccept);
        assert_eq!(interpret_score(10.0), Decision::StrongAccept);
        assert_eq!(Decision::WeakAccept.to_string(), "Weak Accept");
    }
}
