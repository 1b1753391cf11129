use crate::enums::Orientation;

use ndarray::Array3;
use ndarray::ArrayView2;
use ndarray::s;

/// A scanned volume of voxel intensities indexed `(x, y, z)`.
///
/// Volumes are immutable once loaded; every accessor hands out views.
#[derive(Debug, Clone, Default)]
pub struct Volume {
    data: Array3<f32>,
    spacing: (f32, f32, f32),
}

impl Volume {
    pub fn new(data: Array3<f32>, spacing: (f32, f32, f32)) -> Self {
        Self { data, spacing }
    }

    /// Get the dimensions of the volume (x, y, z)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Voxel size in millimetres along (x, y, z)
    pub fn spacing(&self) -> (f32, f32, f32) {
        self.spacing
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of slices available across `orientation`.
    pub fn depth(&self, orientation: Orientation) -> usize {
        let (x, y, z) = self.dim();
        match orientation {
            Orientation::Axial => z,
            Orientation::Coronal => y,
            Orientation::Sagittal => x,
        }
    }

    pub fn is_valid_index(&self, index: usize, orientation: Orientation) -> bool {
        index < self.depth(orientation)
    }

    /// View of the cross-section at `index`, or `None` when out of range.
    ///
    /// Axial slices come back as `(x, y)`, coronal as `(x, z)` and sagittal
    /// as `(y, z)`.
    pub fn get_slice_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
    ) -> Option<ArrayView2<'_, f32>> {
        if !self.is_valid_index(index, orientation) {
            return None;
        }
        let slice = match orientation {
            Orientation::Axial => self.data.slice(s![.., .., index]),
            Orientation::Coronal => self.data.slice(s![.., index, ..]),
            Orientation::Sagittal => self.data.slice(s![index, .., ..]),
        };
        Some(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Volume {
        let data = Array3::from_shape_fn((2, 3, 4), |(x, y, z)| (x * 100 + y * 10 + z) as f32);
        Volume::new(data, (1.0, 1.0, 2.5))
    }

    #[test]
    fn axial_slice_fixes_z() {
        let volume = ramp();
        let slice = volume.get_slice_from_axis(3, Orientation::Axial).unwrap();
        assert_eq!(slice.dim(), (2, 3));
        assert_eq!(slice[[1, 2]], 123.0);
    }

    #[test]
    fn coronal_and_sagittal_slices() {
        let volume = ramp();
        let coronal = volume.get_slice_from_axis(1, Orientation::Coronal).unwrap();
        assert_eq!(coronal.dim(), (2, 4));
        assert_eq!(coronal[[1, 3]], 113.0);

        let sagittal = volume.get_slice_from_axis(0, Orientation::Sagittal).unwrap();
        assert_eq!(sagittal.dim(), (3, 4));
        assert_eq!(sagittal[[2, 1]], 21.0);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let volume = ramp();
        assert_eq!(volume.depth(Orientation::Axial), 4);
        assert!(volume.get_slice_from_axis(4, Orientation::Axial).is_none());
        assert!(volume.get_slice_from_axis(2, Orientation::Sagittal).is_none());
    }
}
