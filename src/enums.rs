use std::fmt;

use serde::{Deserialize, Serialize};

/// Axis a 2D slice is taken across.
///
/// Volumes are indexed `(x, y, z)`, so an axial slice fixes `z`, a coronal
/// slice fixes `y` and a sagittal slice fixes `x`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Axial,
    Coronal,
    Sagittal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    #[default]
    Bilinear,
    Nearest,
}

/// Ordering applied to the files of a DICOM series before stacking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortBy {
    #[default]
    ImagePositionPatient,
    TablePosition,
    InstanceNumber,
    None,
}

/// MRI acquisition feeding one input channel of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Flair,
    T1ce,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Flair => f.write_str("Flair"),
            Modality::T1ce => f.write_str("T1ce"),
        }
    }
}
