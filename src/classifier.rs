//! Reduction of model probabilities to per-pixel classes and labels.

use std::collections::{BTreeMap, BTreeSet};

use image::{ImageBuffer, Rgb};
use ndarray::{Array2, ArrayView1, Axis, Zip};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ProbabilityMap;

/// Labels of the four BraTS tissue classes, indexed by class.
pub const DEFAULT_LABELS: [&str; 4] = ["NOT tumor", "NECROTIC/CORE", "EDEMA", "ENHANCING"];

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Class index {index} has no label ({count} labels configured)")]
    UnknownClass { index: usize, count: usize },

    #[error("Label map rows have uneven lengths")]
    RaggedLabelMap,
}

/// Per-pixel class indices, shape `(H, W)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMap(Array2<usize>);

impl ClassMap {
    pub fn new(classes: Array2<usize>) -> Self {
        Self(classes)
    }

    pub fn data(&self) -> &Array2<usize> {
        &self.0
    }

    pub fn dim(&self) -> (usize, usize) {
        self.0.dim()
    }

    /// Render the map with one colour per class.
    pub fn to_image(&self) -> ImageBuffer<Rgb<u8>, Vec<u8>> {
        let (height, width) = self.dim();
        ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
            class_colour(self.0[[y as usize, x as usize]])
        })
    }
}

fn class_colour(class: usize) -> Rgb<u8> {
    match class {
        0 => Rgb([0x00, 0x00, 0x00]),
        1 => Rgb([0xFF, 0x00, 0x00]),
        2 => Rgb([0xFF, 0xFF, 0x00]),
        3 => Rgb([0xFF, 0x00, 0xFF]),
        _ => Rgb([0xFF, 0xFF, 0xFF]),
    }
}

pub struct Classifier;

impl Classifier {
    /// Arg-max over the class axis.
    ///
    /// Ties go to the lowest class index and NaN never wins, so the result
    /// is deterministic for any input.
    pub fn argmax(probabilities: &ProbabilityMap) -> ClassMap {
        let (height, width, _) = probabilities.data().dim();
        let mut classes = Array2::<usize>::zeros((height, width));
        Zip::from(&mut classes)
            .and(probabilities.data().lanes(Axis(2)))
            .par_for_each(|class, lane| *class = argmax_lane(lane));
        ClassMap(classes)
    }
}

fn argmax_lane(lane: ArrayView1<'_, f32>) -> usize {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (index, &value) in lane.iter().enumerate() {
        if value > best_value {
            best = index;
            best_value = value;
        }
    }
    best
}

/// Enumeration from class index to human readable label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentClasses {
    labels: Vec<String>,
}

impl SegmentClasses {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn map(&self, classes: &ClassMap) -> Result<LabelMap, ClassifyError> {
        let rows = classes
            .data()
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .map(|&index| {
                        self.label(index)
                            .map(str::to_string)
                            .ok_or(ClassifyError::UnknownClass {
                                index,
                                count: self.len(),
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LabelMap { rows })
    }
}

impl Default for SegmentClasses {
    fn default() -> Self {
        Self::new(DEFAULT_LABELS.iter().map(|l| l.to_string()).collect())
    }
}

/// Per-pixel labels; serialises as a JSON array of rows.
///
/// Rows always have the same length, including after deserialisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<String>>", into = "Vec<Vec<String>>")]
pub struct LabelMap {
    rows: Vec<Vec<String>>,
}

impl TryFrom<Vec<Vec<String>>> for LabelMap {
    type Error = ClassifyError;

    fn try_from(rows: Vec<Vec<String>>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

impl From<LabelMap> for Vec<Vec<String>> {
    fn from(map: LabelMap) -> Self {
        map.rows
    }
}

impl LabelMap {
    pub fn from_rows(rows: Vec<Vec<String>>) -> Result<Self, ClassifyError> {
        if let Some(first) = rows.first()
            && rows.iter().any(|row| row.len() != first.len())
        {
            return Err(ClassifyError::RaggedLabelMap);
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// `(height, width)`
    pub fn dim(&self) -> (usize, usize) {
        (self.rows.len(), self.rows.first().map_or(0, Vec::len))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().map(String::as_str)
    }

    pub fn distinct_labels(&self) -> BTreeSet<&str> {
        self.iter().collect()
    }

    /// Pixel count per label.
    pub fn label_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for label in self.iter() {
            *counts.entry(label.to_string()).or_insert(0) += 1;
        }
        counts
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, array};

    fn probabilities(values: &[[f32; 4]]) -> ProbabilityMap {
        let flat: Vec<f32> = values.iter().flatten().copied().collect();
        ProbabilityMap::new(Array3::from_shape_vec((1, values.len(), 4), flat).unwrap())
    }

    #[test]
    fn labels_are_total_over_default_classes() {
        let classes = SegmentClasses::default();
        assert_eq!(classes.label(0), Some("NOT tumor"));
        assert_eq!(classes.label(1), Some("NECROTIC/CORE"));
        assert_eq!(classes.label(2), Some("EDEMA"));
        assert_eq!(classes.label(3), Some("ENHANCING"));
        for index in 0..4 {
            assert_eq!(classes.label(index), classes.label(index));
        }
        assert_eq!(classes.label(4), None);
    }

    #[test]
    fn argmax_picks_highest_probability() {
        let map = Classifier::argmax(&probabilities(&[
            [0.7, 0.1, 0.1, 0.1],
            [0.1, 0.2, 0.6, 0.1],
            [0.0, 0.0, 0.1, 0.9],
        ]));
        assert_eq!(map.data(), &array![[0, 2, 3]]);
    }

    #[test]
    fn argmax_ties_go_to_lowest_index() {
        let map = Classifier::argmax(&probabilities(&[
            [0.1, 0.4, 0.1, 0.4],
            [0.25, 0.25, 0.25, 0.25],
        ]));
        assert_eq!(map.data(), &array![[1, 0]]);
    }

    #[test]
    fn argmax_ignores_nan() {
        let map = Classifier::argmax(&probabilities(&[[f32::NAN, 0.1, 0.2, f32::NAN]]));
        assert_eq!(map.data(), &array![[2]]);
    }

    #[test]
    fn maps_class_grid_to_labels() {
        let labels = SegmentClasses::default()
            .map(&ClassMap::new(array![[0, 1], [2, 3]]))
            .unwrap();
        assert_eq!(
            labels.rows(),
            &[
                vec!["NOT tumor".to_string(), "NECROTIC/CORE".to_string()],
                vec!["EDEMA".to_string(), "ENHANCING".to_string()],
            ]
        );
    }

    #[test]
    fn unknown_class_is_an_error() {
        let err = SegmentClasses::default()
            .map(&ClassMap::new(array![[0, 7]]))
            .unwrap_err();
        assert!(matches!(err, ClassifyError::UnknownClass { index: 7, count: 4 }));
    }

    #[test]
    fn label_map_json_round_trip() {
        let labels = SegmentClasses::default()
            .map(&ClassMap::new(array![[0, 1, 0], [2, 3, 3]]))
            .unwrap();
        let json = labels.to_json().unwrap();
        assert!(json.starts_with("[[\"NOT tumor\""));
        assert_eq!(LabelMap::from_json(&json).unwrap(), labels);
    }

    #[test]
    fn counts_and_distinct_labels() {
        let labels = SegmentClasses::default()
            .map(&ClassMap::new(array![[0, 0], [2, 0]]))
            .unwrap();
        assert_eq!(labels.dim(), (2, 2));
        assert_eq!(
            labels.distinct_labels().into_iter().collect::<Vec<_>>(),
            vec!["EDEMA", "NOT tumor"]
        );
        assert_eq!(labels.label_counts().get("NOT tumor"), Some(&3));
        assert_eq!(labels.label_counts().get("EDEMA"), Some(&1));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let rows = vec![vec!["EDEMA".to_string()], vec![]];
        assert!(matches!(
            LabelMap::from_rows(rows),
            Err(ClassifyError::RaggedLabelMap)
        ));
    }

    #[test]
    fn ragged_json_is_rejected() {
        assert!(LabelMap::from_json(r#"[["EDEMA","NOT tumor"],[]]"#).is_err());
        assert!(LabelMap::from_json(r#"[["EDEMA"],["EDEMA","EDEMA"]]"#).is_err());

        let empty = LabelMap::from_json("[]").unwrap();
        assert_eq!(empty.dim(), (0, 0));
    }

    #[test]
    fn renders_one_colour_per_class() {
        let image = ClassMap::new(array![[0, 1, 2], [3, 0, 9]]).to_image();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(image.get_pixel(1, 0), &Rgb([0xFF, 0, 0]));
        assert_eq!(image.get_pixel(0, 1), &Rgb([0xFF, 0, 0xFF]));
        assert_eq!(image.get_pixel(2, 1), &Rgb([0xFF, 0xFF, 0xFF]));
    }
}
