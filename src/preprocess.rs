//! Slice extraction, resampling and intensity normalisation.

use crate::enums::{Interpolation, Orientation};
use crate::interpolator::Interpolator;
use crate::volume::Volume;

use ndarray::Array2;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Volume is empty")]
    EmptyVolume,

    #[error("Slice index {index} is out of range for a volume {depth} slices deep")]
    SliceOutOfRange { index: usize, depth: usize },
}

/// A normalised 2D slice at the model's input resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    data: Array2<f32>,
    degenerate: bool,
}

impl Slice {
    /// Normalise `data` by its own maximum.
    ///
    /// A slice with no positive finite maximum carries no signal and becomes
    /// all zeros instead of NaN or infinite values.
    pub fn normalized(data: Array2<f32>) -> Self {
        let max = data.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if max > 0.0 && max.is_finite() {
            Self {
                data: data.mapv_into(|v| v / max),
                degenerate: false,
            }
        } else {
            Self {
                data: Array2::zeros(data.dim()),
                degenerate: true,
            }
        }
    }

    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    /// `(height, width)`
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// True when the source slice was blank and normalised to zeros.
    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SlicePreprocessor {
    target_size: usize,
    orientation: Orientation,
    interpolation: Interpolation,
}

impl SlicePreprocessor {
    pub fn new(target_size: usize, orientation: Orientation, interpolation: Interpolation) -> Self {
        Self {
            target_size,
            orientation,
            interpolation,
        }
    }

    pub fn target_size(&self) -> usize {
        self.target_size
    }

    /// Extract the slice at `index`, resize it to the square target
    /// resolution and normalise it into `[0, 1]`.
    pub fn prepare(&self, volume: &Volume, index: usize) -> Result<Slice, PreprocessError> {
        if volume.is_empty() {
            return Err(PreprocessError::EmptyVolume);
        }
        let slice = volume
            .get_slice_from_axis(index, self.orientation)
            .ok_or(PreprocessError::SliceOutOfRange {
                index,
                depth: volume.depth(self.orientation),
            })?;

        let resized = Interpolator::resize(
            &slice,
            (self.target_size, self.target_size),
            self.interpolation,
        );
        let slice = Slice::normalized(resized);
        if slice.is_degenerate() {
            warn!(index, orientation = ?self.orientation, "Slice has no signal, using zeros");
        } else {
            debug!(index, size = self.target_size, "Slice prepared");
        }
        Ok(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, array};

    fn volume(dim: (usize, usize, usize)) -> Volume {
        let data = Array3::from_shape_fn(dim, |(x, y, z)| (x + y + z) as f32);
        Volume::new(data, (1.0, 1.0, 1.0))
    }

    #[test]
    fn normalises_by_slice_maximum() {
        let slice = Slice::normalized(array![[0.0f32, 5.0], [10.0, 2.5]]);
        assert!(!slice.is_degenerate());
        assert_eq!(slice.data(), &array![[0.0f32, 0.5], [1.0, 0.25]]);
    }

    #[test]
    fn all_black_slice_normalises_to_zeros() {
        let slice = Slice::normalized(Array2::zeros((3, 3)));
        assert!(slice.is_degenerate());
        assert!(slice.data().iter().all(|v| *v == 0.0));
        assert!(slice.data().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn prepare_resizes_to_target() {
        let preprocessor = SlicePreprocessor::new(8, Orientation::Axial, Interpolation::Bilinear);
        let slice = preprocessor.prepare(&volume((4, 6, 3)), 2).unwrap();
        assert_eq!(slice.dim(), (8, 8));
        let max = slice.data().iter().copied().fold(f32::MIN, f32::max);
        assert_eq!(max, 1.0);
        assert!(slice.data().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn blank_depth_is_not_an_error() {
        let preprocessor = SlicePreprocessor::new(4, Orientation::Axial, Interpolation::Bilinear);
        let blank = Volume::new(Array3::zeros((5, 5, 2)), (1.0, 1.0, 1.0));
        let slice = preprocessor.prepare(&blank, 1).unwrap();
        assert!(slice.is_degenerate());
        assert_eq!(slice.dim(), (4, 4));
    }

    #[test]
    fn rejects_out_of_range_index() {
        let preprocessor = SlicePreprocessor::new(4, Orientation::Axial, Interpolation::Bilinear);
        let err = preprocessor.prepare(&volume((4, 4, 3)), 75).unwrap_err();
        assert!(matches!(
            err,
            PreprocessError::SliceOutOfRange { index: 75, depth: 3 }
        ));
    }

    #[test]
    fn rejects_empty_volume() {
        let preprocessor = SlicePreprocessor::new(4, Orientation::Axial, Interpolation::Bilinear);
        let err = preprocessor.prepare(&Volume::default(), 0).unwrap_err();
        assert!(matches!(err, PreprocessError::EmptyVolume));
    }
}
