use alloc::vec::Vec;

use itertools::izip;
use log::debug;
use nalgebra::{ComplexField, SMatrix};

use crate::photo_error::ErrorBackend;
use crate::{project_point, Image, ImageSize, InterpWeights, ScenePoints};

/// Backend that keeps only the projected coordinates and resamples the target
/// like a generic image remap.
///
/// Sampling happens in [`run`](trait.ErrorBackend.html#tymethod.run) with
/// bilinear interpolation and a constant zero border. Points outside the
/// footprint interior are still reported invalid with a residual of 0, so
/// the results agree with [`InterpolationBackend`](struct.InterpolationBackend.html).
#[derive(Debug, Clone, Default)]
pub struct RemapBackend {
    coords: Vec<[f32; 2]>,
    valid: Vec<bool>,
    size: ImageSize,
}

impl RemapBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Projected pixel coordinates from the last `init`. Degenerate
    /// projections are NaN.
    pub fn coords(&self) -> &[[f32; 2]] {
        &self.coords
    }
}

fn sample_zero_border(target: &Image<'_>, xy: [f32; 2]) -> f32 {
    let x0 = ComplexField::floor(xy[0]);
    let y0 = ComplexField::floor(xy[1]);
    let weights = InterpWeights::from_fraction(xy[0] - x0, xy[1] - y0);
    let (c, r) = (x0 as i64, y0 as i64);
    let quad = [
        target.get(c, r).unwrap_or(0.0),
        target.get(c + 1, r).unwrap_or(0.0),
        target.get(c, r + 1).unwrap_or(0.0),
        target.get(c + 1, r + 1).unwrap_or(0.0),
    ];
    weights.dot(quad)
}

impl ErrorBackend for RemapBackend {
    fn init<PTS>(&mut self, p: &SMatrix<f32, 3, 4>, points: &PTS, size: ImageSize, _stride: usize)
    where
        PTS: ScenePoints + ?Sized,
    {
        let n = points.len();
        self.size = size;
        self.coords.clear();
        self.valid.clear();
        for i in 0..n {
            match project_point(p, &points.homogeneous(i)) {
                Some(xy) => {
                    let (xi, yi) = (
                        ComplexField::floor(xy[0]) as i64,
                        ComplexField::floor(xy[1]) as i64,
                    );
                    self.coords.push(xy);
                    self.valid.push(size.contains_footprint(xi, yi));
                }
                None => {
                    self.coords.push([f32::NAN; 2]);
                    self.valid.push(false);
                }
            }
        }
        debug!(
            "remap backend: {} points, {} valid",
            n,
            self.valid.iter().filter(|v| **v).count()
        );
    }

    fn valid(&self) -> &[bool] {
        &self.valid
    }

    fn run(&self, reference: &[f32], target: &Image<'_>, residuals: &mut [f32]) {
        debug_assert_eq!(reference.len(), self.coords.len());
        debug_assert_eq!(residuals.len(), self.coords.len());
        debug_assert_eq!(target.size(), self.size);

        for (r, &i0, &valid, &xy) in izip!(residuals, reference, &self.valid, &self.coords) {
            *r = if valid {
                sample_zero_border(target, xy) - i0
            } else {
                0.0
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::residual_test_utils::{ramp_4x4, scene_with_len, textured_image};
    use crate::{ExecutionPath, PhotoError};

    #[test]
    fn zero_border_sampling() {
        let data = ramp_4x4();
        let image = Image::from_contiguous(&data, 4, 4).unwrap();
        approx::assert_abs_diff_eq!(sample_zero_border(&image, [1.5, 1.5]), 7.5);
        // half of pixel 3, half outside
        approx::assert_abs_diff_eq!(sample_zero_border(&image, [3.5, 0.0]), 1.5);
        approx::assert_abs_diff_eq!(sample_zero_border(&image, [-0.5, 0.0]), 0.0);
    }

    #[test]
    fn agrees_with_interpolation_backend() {
        let size = ImageSize::new(40, 56).unwrap();
        let data = textured_image(size);
        let image = Image::from_contiguous(&data, size.rows, size.cols).unwrap();
        let (p, points) = scene_with_len(333, size);
        let reference: Vec<f32> = (0..333).map(|i| (i % 5) as f32).collect();

        let mut remap = PhotoError::from_backend(RemapBackend::new());
        let mut interp = PhotoError::with_path(ExecutionPath::Scalar);
        let mut valid_remap = Vec::new();
        let mut valid_interp = Vec::new();
        remap.init(&p, &points, &mut valid_remap, size.rows, size.cols);
        interp.init(&p, &points, &mut valid_interp, size.rows, size.cols);
        assert_eq!(valid_remap, valid_interp);
        assert_eq!(remap.backend().coords().len(), 333);

        let mut r_remap = vec![0.0; 333];
        let mut r_interp = vec![0.0; 333];
        remap.run(&reference, &image, &mut r_remap);
        interp.run(&reference, &image, &mut r_interp);
        for (a, b) in r_remap.iter().zip(&r_interp) {
            approx::assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
        }
    }
}
