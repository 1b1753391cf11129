//! Coarse tumor grading from the labels present in a segmented slice.
//!
//! Grading looks only at which labels occur, never at how many pixels carry
//! them. High grade labels take priority over low grade labels.

use std::fmt;

use serde::Serialize;

use crate::classifier::LabelMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GradeVerdict {
    #[serde(rename = "high grade")]
    HighGrade,
    #[serde(rename = "low grade")]
    LowGrade,
    #[serde(rename = "Tumor Not Detected")]
    NotDetected,
}

impl GradeVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighGrade => "high grade",
            Self::LowGrade => "low grade",
            Self::NotDetected => "Tumor Not Detected",
        }
    }
}

impl fmt::Display for GradeVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct GradeEvaluator {
    high_grade: Vec<String>,
    low_grade: Vec<String>,
}

impl GradeEvaluator {
    pub fn new(high_grade: Vec<String>, low_grade: Vec<String>) -> Self {
        Self {
            high_grade,
            low_grade,
        }
    }

    pub fn evaluate(&self, labels: &LabelMap) -> GradeVerdict {
        self.evaluate_labels(labels.iter())
    }

    pub fn evaluate_labels<'a>(&self, labels: impl IntoIterator<Item = &'a str>) -> GradeVerdict {
        let mut low = false;
        for label in labels {
            if self.high_grade.iter().any(|l| l == label) {
                return GradeVerdict::HighGrade;
            }
            low |= self.low_grade.iter().any(|l| l == label);
        }
        if low {
            GradeVerdict::LowGrade
        } else {
            GradeVerdict::NotDetected
        }
    }

    /// Grade a label map serialised as a JSON array of rows.
    pub fn evaluate_serialized(&self, json: &str) -> serde_json::Result<GradeVerdict> {
        Ok(self.evaluate(&LabelMap::from_json(json)?))
    }
}

impl Default for GradeEvaluator {
    fn default() -> Self {
        Self::new(
            vec!["NECROTIC/CORE".to_string(), "ENHANCING".to_string()],
            vec!["EDEMA".to_string()],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassMap, SegmentClasses};
    use ndarray::{Array2, array};

    fn grade(classes: Array2<usize>) -> GradeVerdict {
        let labels = SegmentClasses::default()
            .map(&ClassMap::new(classes))
            .unwrap();
        GradeEvaluator::default().evaluate(&labels)
    }

    #[test]
    fn high_grade_labels_win() {
        assert_eq!(grade(array![[0, 1], [2, 3]]), GradeVerdict::HighGrade);
        assert_eq!(grade(array![[2, 2], [2, 3]]), GradeVerdict::HighGrade);
        assert_eq!(grade(array![[0, 0], [1, 0]]), GradeVerdict::HighGrade);
    }

    #[test]
    fn edema_alone_is_low_grade() {
        assert_eq!(grade(array![[0, 0], [2, 0]]), GradeVerdict::LowGrade);
    }

    #[test]
    fn background_only_is_not_detected() {
        assert_eq!(grade(array![[0, 0], [0, 0]]), GradeVerdict::NotDetected);
        assert_eq!(
            GradeEvaluator::default().evaluate_labels(std::iter::empty()),
            GradeVerdict::NotDetected
        );
    }

    #[test]
    fn grading_ignores_area() {
        let mut classes = Array2::from_elem((64, 64), 2);
        classes[[10, 10]] = 3;
        assert_eq!(grade(classes), GradeVerdict::HighGrade);
    }

    #[test]
    fn grades_serialized_label_map() {
        let evaluator = GradeEvaluator::default();
        let json = r#"[["NOT tumor","EDEMA"],["NOT tumor","NOT tumor"]]"#;
        assert_eq!(
            evaluator.evaluate_serialized(json).unwrap(),
            GradeVerdict::LowGrade
        );
        assert!(evaluator.evaluate_serialized("not json").is_err());
        assert!(evaluator.evaluate_serialized(r#"[["EDEMA"],[]]"#).is_err());
    }

    #[test]
    fn verdict_strings_are_exact() {
        assert_eq!(GradeVerdict::HighGrade.to_string(), "high grade");
        assert_eq!(GradeVerdict::LowGrade.to_string(), "low grade");
        assert_eq!(GradeVerdict::NotDetected.to_string(), "Tumor Not Detected");
        assert_eq!(
            serde_json::to_string(&GradeVerdict::NotDetected).unwrap(),
            "\"Tumor Not Detected\""
        );
    }
}
