use crate::{enums::SortBy, volume::Volume};

use dicom::{
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::PixelDecoder,
};
use dicom_dictionary_std::tags;
use flate2::read::GzDecoder;
use ndarray::{Array2, Array3, s};
use nifti::{InMemNiftiObject, IntoNdArray, NiftiObject, ReaderOptions};
use rayon::prelude::*;
use std::{
    fs,
    io::{self, Cursor},
    path::Path,
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("Volume input is missing or empty")]
    MissingInput,

    #[error("Unsupported volume shape {0:?}, expected three spatial dimensions")]
    UnsupportedShape(Vec<usize>),

    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("Missing spacing information")]
    MissingSpacing,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("NIfTI error: {0}")]
    Nifti(#[from] nifti::NiftiError),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),

    #[error("Voxel layout error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a volume from a path: a directory is read as a DICOM series,
    /// anything else as a NIfTI file.
    pub fn load(path: impl AsRef<Path>) -> Result<Volume, VolumeLoaderError> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::load_from_directory(path, SortBy::default())
        } else {
            Self::load_nifti(path)
        }
    }

    /// Load a NIfTI-1 volume (`.nii` or `.nii.gz`) from disk.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeLoaderError::MissingInput`] if the file does not exist
    /// or is empty, and a NIfTI error if the file cannot be parsed.
    pub fn load_nifti(path: impl AsRef<Path>) -> Result<Volume, VolumeLoaderError> {
        let path = path.as_ref();
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(VolumeLoaderError::MissingInput);
            }
            Err(e) => return Err(e.into()),
        };
        if metadata.len() == 0 {
            return Err(VolumeLoaderError::MissingInput);
        }

        debug!(path = %path.display(), bytes = metadata.len(), "Reading NIfTI volume");
        let object = ReaderOptions::new().read_file(path)?;
        Self::volume_from_nifti(object)
    }

    /// Load a NIfTI-1 volume from an in-memory byte stream.
    ///
    /// Gzip compression is detected from the stream's magic number.
    pub fn load_nifti_bytes(bytes: &[u8]) -> Result<Volume, VolumeLoaderError> {
        if bytes.is_empty() {
            return Err(VolumeLoaderError::MissingInput);
        }

        let object = if is_gzip(bytes) {
            InMemNiftiObject::from_reader(GzDecoder::new(Cursor::new(bytes)))?
        } else {
            InMemNiftiObject::from_reader(Cursor::new(bytes))?
        };
        Self::volume_from_nifti(object)
    }

    fn volume_from_nifti(object: InMemNiftiObject) -> Result<Volume, VolumeLoaderError> {
        let pixdim = object.header().pixdim;
        let spacing = (pixdim[1], pixdim[2], pixdim[3]);

        // Scaling from the header is applied by the conversion.
        let voxels = object.into_volume().into_ndarray::<f32>()?;
        let shape = voxels.shape().to_vec();
        let dim = match shape.as_slice() {
            [x, y, z] => (*x, *y, *z),
            [x, y, z, rest @ ..] if rest.iter().all(|&d| d == 1) => (*x, *y, *z),
            _ => return Err(VolumeLoaderError::UnsupportedShape(shape)),
        };
        if dim.0 == 0 || dim.1 == 0 || dim.2 == 0 {
            return Err(VolumeLoaderError::MissingInput);
        }

        let data = Array3::from_shape_vec(dim, voxels.iter().copied().collect())?;
        debug!(dim = ?dim, spacing = ?spacing, "Loaded NIfTI volume");
        Ok(Volume::new(data, spacing))
    }

    /// Load a volume from DICOM objects
    ///
    /// # Arguments
    ///
    /// * `dicom_objects` - Slice of DICOM file objects, one per axial image
    /// * `sort_by` - Method to sort the slices
    ///
    /// # Errors
    ///
    /// Returns error if no valid images found or dimensions are inconsistent
    pub fn load_from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let mut ordered_images: Vec<_> = dicom_objects
            .par_iter()
            .filter_map(|dicom_object| Self::extract_image_with_order(dicom_object, sort_by))
            .collect();

        if ordered_images.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }

        Self::sort_images(&mut ordered_images, sort_by);

        let images: Vec<_> = ordered_images.into_iter().map(|(_, image)| image).collect();

        Self::validate_dimensions(&images)?;

        let data = Self::stack_images(&images);
        let spacing = Self::get_spacing(dicom_objects).ok_or(VolumeLoaderError::MissingSpacing)?;

        debug!(dim = ?data.dim(), spacing = ?spacing, "Loaded DICOM series");
        Ok(Volume::new(data, spacing))
    }

    /// Load a volume from DICOM file paths
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path>],
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let objects: Result<Vec<_>, _> =
            paths.iter().map(|path| open_file(path.as_ref())).collect();

        Self::load_from_dicom_objects(&objects?, sort_by)
    }

    /// Load a volume from a directory containing .dcm files
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let paths: Vec<_> = fs::read_dir(path.as_ref())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();

        if paths.is_empty() {
            return Err(VolumeLoaderError::MissingInput);
        }

        Self::load_from_file_paths(&paths, sort_by)
    }

    fn extract_image_with_order(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: SortBy,
    ) -> Option<(Option<f32>, Array2<f32>)> {
        let order = Self::get_sort_order(dicom_object, sort_by)?;
        let image = Self::decode_image(dicom_object)?;
        Some((order, image))
    }

    fn get_sort_order(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: SortBy,
    ) -> Option<Option<f32>> {
        match sort_by {
            SortBy::ImagePositionPatient => {
                let position = dicom_object
                    .element(tags::IMAGE_POSITION_PATIENT)
                    .ok()?
                    .to_multi_float32()
                    .ok()?;
                Some(position.get(2).copied())
            }
            SortBy::TablePosition => {
                let position = dicom_object
                    .element(tags::TABLE_POSITION)
                    .ok()?
                    .to_float32()
                    .ok();
                Some(position)
            }
            SortBy::InstanceNumber => {
                let number = dicom_object
                    .element(tags::INSTANCE_NUMBER)
                    .ok()?
                    .to_int::<i32>()
                    .ok()
                    .map(|n| n as f32);
                Some(number)
            }
            SortBy::None => Some(Some(0.0)),
        }
    }

    /// Decode the first frame as `(rows, columns)` with the modality LUT applied.
    fn decode_image(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<Array2<f32>> {
        let pixel_data = dicom_object.decode_pixel_data().ok()?;
        pixel_data
            .to_ndarray::<f32>()
            .ok()
            .map(|frames| frames.slice_move(s![0, .., .., 0]))
    }

    fn sort_images(ordered_images: &mut [(Option<f32>, Array2<f32>)], sort_by: SortBy) {
        if !matches!(sort_by, SortBy::None) {
            ordered_images
                .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        }

        if matches!(sort_by, SortBy::ImagePositionPatient) {
            ordered_images.reverse();
        }
    }

    fn validate_dimensions(images: &[Array2<f32>]) -> Result<(), VolumeLoaderError> {
        let first_dim = images[0].dim();
        if images.iter().any(|image| image.dim() != first_dim) {
            return Err(VolumeLoaderError::InconsistentDimensions);
        }
        Ok(())
    }

    /// Stack `(rows, columns)` images into an `(x, y, z)` volume.
    fn stack_images(images: &[Array2<f32>]) -> Array3<f32> {
        let (rows, columns) = images[0].dim();
        let mut volume = Array3::<f32>::zeros((columns, rows, images.len()));

        for (z, image) in images.iter().enumerate() {
            volume.slice_mut(s![.., .., z]).assign(&image.t());
        }

        volume
    }

    fn get_spacing(dicom_objects: &[FileDicomObject<InMemDicomObject>]) -> Option<(f32, f32, f32)> {
        dicom_objects.iter().find_map(|dicom_object| {
            let pixel_spacing = dicom_object
                .element(tags::PIXEL_SPACING)
                .ok()?
                .to_multi_float32()
                .ok()?;

            let slice_thickness = dicom_object
                .element(tags::SLICE_THICKNESS)
                .ok()?
                .to_float32()
                .ok()?;

            // Pixel spacing is stored as (row spacing, column spacing).
            let row_spacing = *pixel_spacing.first()?;
            let column_spacing = *pixel_spacing.get(1)?;
            Some((column_spacing, row_spacing, slice_thickness))
        })
    }
}

fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}
