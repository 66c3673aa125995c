use alloc::vec::Vec;

use nalgebra::SMatrix;

use crate::{Error, ExecutionPath, Image, ImageSize, Projector, ResidualEvaluator, ScenePoints};

/// A way to turn a projection, scene points and a target image into
/// photometric residuals.
pub trait ErrorBackend {
    /// Project `points` with `p` into an image of `size` with row stride
    /// `stride`, replacing any state from a previous call.
    fn init<PTS>(&mut self, p: &SMatrix<f32, 3, 4>, points: &PTS, size: ImageSize, stride: usize)
    where
        PTS: ScenePoints + ?Sized;

    /// Per-point validity from the last `init`.
    fn valid(&self) -> &[bool];

    /// Fill `residuals` with `sample(target) - reference` for valid points and
    /// `0` for the rest.
    fn run(&self, reference: &[f32], target: &Image<'_>, residuals: &mut [f32]);
}

/// Backend which precomputes offsets and bilinear weights at `init`.
#[derive(Debug, Clone, Default)]
pub struct InterpolationBackend {
    projector: Projector,
    evaluator: ResidualEvaluator,
}

impl InterpolationBackend {
    /// Create a backend running the given execution path.
    pub fn new(path: ExecutionPath) -> Self {
        Self {
            projector: Projector::new(),
            evaluator: ResidualEvaluator::new(path),
        }
    }

    /// The cached projection.
    #[inline]
    pub fn projector(&self) -> &Projector {
        &self.projector
    }

    /// The residual evaluator.
    #[inline]
    pub fn evaluator(&self) -> &ResidualEvaluator {
        &self.evaluator
    }
}

impl ErrorBackend for InterpolationBackend {
    fn init<PTS>(&mut self, p: &SMatrix<f32, 3, 4>, points: &PTS, size: ImageSize, stride: usize)
    where
        PTS: ScenePoints + ?Sized,
    {
        self.projector.init_with_stride(p, points, size, stride);
    }

    #[inline]
    fn valid(&self) -> &[bool] {
        self.projector.valid()
    }

    #[inline]
    fn run(&self, reference: &[f32], target: &Image<'_>, residuals: &mut [f32]) {
        self.evaluator.run(&self.projector, reference, target, residuals);
    }
}

/// Photometric error between a reference point set and a target image.
///
/// Call [`init`](#method.init) whenever the projection or the points change,
/// then [`run`](#method.run) for each target image. The cached projection is
/// reused until the next `init`.
///
/// An instance holds scratch buffers and is not meant to be shared across
/// threads while being initialized; give each thread its own.
#[derive(Debug, Clone, Default)]
pub struct PhotoError<B: ErrorBackend = InterpolationBackend> {
    backend: B,
    num_points: usize,
}

impl PhotoError<InterpolationBackend> {
    /// Create a `PhotoError` using the default execution path.
    pub fn new() -> Self {
        Self::with_path(ExecutionPath::default())
    }

    /// Create a `PhotoError` using the given execution path.
    pub fn with_path(path: ExecutionPath) -> Self {
        Self::from_backend(InterpolationBackend::new(path))
    }
}

impl<B: ErrorBackend> PhotoError<B> {
    /// Create a `PhotoError` around a specific backend.
    pub fn from_backend(backend: B) -> Self {
        Self {
            backend,
            num_points: 0,
        }
    }

    /// Return a reference to the backend.
    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Number of points from the last `init`.
    #[inline]
    pub fn len(&self) -> usize {
        self.num_points
    }

    /// Whether the last `init` had no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_points == 0
    }

    /// Project `points` into a contiguous `rows x cols` image and store one
    /// validity flag per point in `valid`.
    ///
    /// `valid` is resized to the number of points.
    pub fn init<PTS>(
        &mut self,
        p: &SMatrix<f32, 3, 4>,
        points: &PTS,
        valid: &mut Vec<bool>,
        rows: usize,
        cols: usize,
    ) where
        PTS: ScenePoints + ?Sized,
    {
        self.init_with_stride(p, points, valid, ImageSize { rows, cols }, cols);
    }

    /// As [`init`](#method.init), for images whose rows are `stride` values
    /// apart.
    pub fn init_with_stride<PTS>(
        &mut self,
        p: &SMatrix<f32, 3, 4>,
        points: &PTS,
        valid: &mut Vec<bool>,
        size: ImageSize,
        stride: usize,
    ) where
        PTS: ScenePoints + ?Sized,
    {
        self.backend.init(p, points, size, stride);
        self.num_points = points.len();
        valid.clear();
        valid.extend_from_slice(self.backend.valid());
    }

    /// Compute residuals for `target` against the per-point `reference`
    /// intensities.
    ///
    /// See [`ResidualEvaluator`](struct.ResidualEvaluator.html#preconditions)
    /// for the preconditions, which are only checked in debug builds.
    #[inline]
    pub fn run(&self, reference: &[f32], target: &Image<'_>, residuals: &mut [f32]) {
        self.backend.run(reference, target, residuals);
    }

    /// As [`run`](#method.run), but check array lengths first.
    pub fn try_run(
        &self,
        reference: &[f32],
        target: &Image<'_>,
        residuals: &mut [f32],
    ) -> Result<(), Error> {
        if reference.len() != self.num_points || residuals.len() != self.num_points {
            return Err(Error::LengthMismatch);
        }
        self.backend.run(reference, target, residuals);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::residual_test_utils::{
        identity_projection, pixel_points, ramp_4x4, reference_residuals, scene_with_len,
        textured_image,
    };
    use crate::RemapBackend;

    #[test]
    fn ramp_scenarios() {
        let data = ramp_4x4();
        let image = Image::from_contiguous(&data, 4, 4).unwrap();
        let points = pixel_points(&[[1.5, 1.5], [3.5, 0.0]]);

        let mut photo_error = PhotoError::new();
        let mut valid = Vec::new();
        photo_error.init(&identity_projection(), &points, &mut valid, 4, 4);
        assert_eq!(valid, vec![true, false]);

        let mut residuals = [f32::NAN; 2];
        photo_error.run(&[7.0, 99.0], &image, &mut residuals);
        assert_eq!(residuals, [0.5, 0.0]);
    }

    #[test]
    fn empty_point_set() {
        let data = ramp_4x4();
        let image = Image::from_contiguous(&data, 4, 4).unwrap();
        let empty: &[[f32; 3]] = &[];

        let mut photo_error = PhotoError::new();
        let mut valid = vec![true; 3];
        photo_error.init(&identity_projection(), empty, &mut valid, 4, 4);
        assert!(valid.is_empty());
        assert!(photo_error.is_empty());

        let mut residuals: [f32; 0] = [];
        photo_error.run(&[], &image, &mut residuals);
        assert!(photo_error.try_run(&[], &image, &mut residuals).is_ok());
    }

    #[test]
    fn try_run_checks_lengths() {
        let data = ramp_4x4();
        let image = Image::from_contiguous(&data, 4, 4).unwrap();
        let mut photo_error = PhotoError::new();
        let mut valid = Vec::new();
        photo_error.init(
            &identity_projection(),
            &pixel_points(&[[1.0, 1.0], [2.0, 2.0]]),
            &mut valid,
            4,
            4,
        );
        assert_eq!(photo_error.len(), 2);

        let mut residuals = [0.0; 2];
        assert_eq!(
            photo_error.try_run(&[1.0], &image, &mut residuals),
            Err(Error::LengthMismatch)
        );
        let mut short = [0.0; 1];
        assert_eq!(
            photo_error.try_run(&[1.0, 2.0], &image, &mut short),
            Err(Error::LengthMismatch)
        );
        assert!(photo_error
            .try_run(&[1.0, 2.0], &image, &mut residuals)
            .is_ok());
        assert_eq!(residuals, [4.0, 8.0]);
    }

    #[test]
    fn padded_target_image() {
        let size = ImageSize::new(20, 30).unwrap();
        let stride = 33;
        let mut data = vec![-1.0e6; size.rows * stride];
        let dense = textured_image(size);
        for r in 0..size.rows {
            data[r * stride..r * stride + size.cols]
                .copy_from_slice(&dense[r * size.cols..(r + 1) * size.cols]);
        }
        let padded = Image::new(&data, size.rows, size.cols, stride).unwrap();
        let contiguous = Image::from_contiguous(&dense, size.rows, size.cols).unwrap();

        let (p, points) = scene_with_len(200, size);
        let reference = vec![1.0; 200];
        let mut valid = Vec::new();

        let mut on_padded = PhotoError::new();
        on_padded.init_with_stride(&p, &points, &mut valid, size, stride);
        let mut r_padded = vec![0.0; 200];
        on_padded.run(&reference, &padded, &mut r_padded);

        let expected = reference_residuals(&p, &points, &reference, &contiguous);
        for (a, b) in r_padded.iter().zip(&expected) {
            approx::assert_abs_diff_eq!(*a, *b, epsilon = 1e-3);
        }
    }

    #[test]
    fn backends_share_contract() {
        fn check<B: ErrorBackend>(mut photo_error: PhotoError<B>) {
            let data = ramp_4x4();
            let image = Image::from_contiguous(&data, 4, 4).unwrap();
            let mut valid = Vec::new();
            photo_error.init(
                &identity_projection(),
                &pixel_points(&[[0.0, 0.0], [2.5, 2.5], [2.5, 3.0], [-0.25, 1.0]]),
                &mut valid,
                4,
                4,
            );
            assert_eq!(valid, vec![true, true, false, false]);
            let mut residuals = [f32::NAN; 4];
            photo_error.run(&[0.0, 12.5, 5.0, 5.0], &image, &mut residuals);
            assert_eq!(residuals, [0.0, 0.0, 0.0, 0.0]);
        }

        check(PhotoError::with_path(ExecutionPath::Scalar));
        check(PhotoError::with_path(ExecutionPath::Wide));
        check(PhotoError::from_backend(RemapBackend::new()));
    }

    #[test]
    fn interpolation_backend_exposes_state() {
        let mut photo_error = PhotoError::with_path(ExecutionPath::Scalar);
        assert_eq!(
            photo_error.backend().evaluator().path(),
            ExecutionPath::Scalar
        );

        let mut valid = Vec::new();
        photo_error.init(
            &identity_projection(),
            &pixel_points(&[[1.5, 1.5], [3.5, 0.0], [0.0, 2.0]]),
            &mut valid,
            4,
            4,
        );
        let projector = photo_error.backend().projector();
        assert_eq!(projector.len(), 3);
        assert_eq!(projector.num_valid(), 2);
        assert_eq!(projector.valid(), valid.as_slice());
        assert_eq!(projector.offsets()[2], 2 * 4);
        assert_eq!(projector.image_size(), ImageSize::new(4, 4).unwrap());
        assert_eq!(projector.stride(), 4);
    }
}
