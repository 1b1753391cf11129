use crate::enums::Interpolation;

use ndarray::{Array2, ArrayView2, Zip};

pub(crate) struct Interpolator;

impl Interpolator {
    /// Resample `slice` to `(height, width)`.
    ///
    /// Output pixel centres are mapped back onto the source grid with a
    /// half-pixel offset and clamped to the border, so a resize to the same
    /// shape is the identity.
    pub(crate) fn resize(
        slice: &ArrayView2<'_, f32>,
        (height, width): (usize, usize),
        interpolation: Interpolation,
    ) -> Array2<f32> {
        let (slice_height, slice_width) = slice.dim();
        let scale_y = slice_height as f32 / height as f32;
        let scale_x = slice_width as f32 / width as f32;

        let mut resized = Array2::<f32>::zeros((height, width));
        Zip::indexed(&mut resized).par_for_each(|(y, x), value| {
            let src_y = ((y as f32 + 0.5) * scale_y - 0.5).clamp(0.0, (slice_height - 1) as f32);
            let src_x = ((x as f32 + 0.5) * scale_x - 0.5).clamp(0.0, (slice_width - 1) as f32);

            *value = match interpolation {
                Interpolation::Bilinear => Self::bilinear_interpolate(slice, src_y, src_x),
                Interpolation::Nearest => {
                    slice[[src_y.round() as usize, src_x.round() as usize]]
                }
            };
        });
        resized
    }

    #[inline]
    pub(crate) fn bilinear_interpolate(slice: &ArrayView2<'_, f32>, y: f32, x: f32) -> f32 {
        let (height, width) = slice.dim();

        let y0 = y.floor() as usize;
        let x0 = x.floor() as usize;
        let y1 = (y0 + 1).min(height - 1);
        let x1 = (x0 + 1).min(width - 1);

        let dy = y - y0 as f32;
        let dx = x - x0 as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;

        let v00 = slice[[y0, x0]];
        let v01 = slice[[y0, x1]];
        let v10 = slice[[y1, x0]];
        let v11 = slice[[y1, x1]];

        let v0 = v00.mul_add(one_minus_dx, v01 * dx);
        let v1 = v10.mul_add(one_minus_dx, v11 * dx);

        v0.mul_add(one_minus_dy, v1 * dy)
    }
}
