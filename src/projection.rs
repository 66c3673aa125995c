use alloc::vec::Vec;

use itertools::izip;
use log::{debug, trace};
use nalgebra::{ComplexField, Isometry3, Matrix3, SMatrix, Vector4};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

use crate::{ImageSize, ScenePoints};

/// Parameters defining a pinhole camera.
///
/// These will be used to make the 3x3 intrinsic parameter matrix
/// ```text
/// [[fx, skew, cx],
///  [ 0,   fy, cy],
///  [ 0,    0,  1]]
/// ```
///
/// Combined with a pose by [`projection_matrix`](fn.projection_matrix.html)
/// to give the 3x4 projection consumed by [`Projector`](struct.Projector.html).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct PinholeParams {
    /// Horizontal focal length.
    pub fx: f32,
    /// Vertical focal length.
    pub fy: f32,
    /// Skew between horizontal and vertical axes.
    pub skew: f32,
    /// Horizontal component of the principal point.
    pub cx: f32,
    /// Vertical component of the principal point.
    pub cy: f32,
}

impl PinholeParams {
    /// The 3x3 intrinsic parameter matrix.
    #[rustfmt::skip]
    pub fn intrinsics_matrix(&self) -> Matrix3<f32> {
        Matrix3::new(
            self.fx, self.skew, self.cx,
            0.0,     self.fy,   self.cy,
            0.0,     0.0,       1.0,
        )
    }
}

/// Compose `P = K [R | t]` from intrinsics and the pose taking scene
/// coordinates into the camera frame.
pub fn projection_matrix(params: &PinholeParams, pose: &Isometry3<f32>) -> SMatrix<f32, 3, 4> {
    let rt = pose.to_homogeneous();
    params.intrinsics_matrix() * rt.fixed_view::<3, 4>(0, 0)
}

/// Project a homogeneous scene point to pixel coordinates `(x, y)`.
///
/// Returns `None` when the homogeneous scale is not strictly positive or the
/// result is not finite.
///
/// The scale is compared against `f32::EPSILON` in absolute terms, so `p` is
/// expected to be metrically scaled with the third row yielding depth, as
/// [`projection_matrix`](fn.projection_matrix.html) produces. Multiplying `p`
/// by a tiny factor moves otherwise valid points below the threshold.
#[inline]
pub fn project_point(p: &SMatrix<f32, 3, 4>, x: &Vector4<f32>) -> Option<[f32; 2]> {
    let h = p * x;
    if !(h[2] > f32::EPSILON) {
        return None;
    }
    let w = 1.0 / h[2];
    let xy = [h[0] * w, h[1] * w];
    (xy[0].is_finite() && xy[1].is_finite()).then_some(xy)
}

/// Bilinear interpolation weights `(w00, w10, w01, w11)`.
///
/// The order matches [`Image::quad`](struct.Image.html#method.quad): top-left,
/// top-right, bottom-left, bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C, align(16))]
pub struct InterpWeights(pub [f32; 4]);

impl InterpWeights {
    /// Weights for a sample at fractional offset `(dx, dy)` from the top-left
    /// pixel. Both fractions must be in `[0, 1)`.
    #[inline]
    pub fn from_fraction(dx: f32, dy: f32) -> Self {
        let ex = 1.0 - dx;
        let ey = 1.0 - dy;
        Self([ex * ey, dx * ey, ex * dy, dx * dy])
    }

    /// Sum of the four weights. Equal to 1 up to rounding.
    #[inline]
    pub fn sum(&self) -> f32 {
        self.0.iter().sum()
    }

    /// Weighted sum of a 2x2 neighbourhood.
    ///
    /// Summed strictly left to right; every evaluation path must reproduce
    /// this order.
    #[inline(always)]
    pub fn dot(&self, quad: [f32; 4]) -> f32 {
        let w = &self.0;
        w[0] * quad[0] + w[1] * quad[1] + w[2] * quad[2] + w[3] * quad[3]
    }
}

/// Where and how to sample the target image for one valid point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    /// Flat index of the top-left pixel, `row * stride + col`.
    pub offset: usize,
    /// Bilinear weights.
    pub weights: InterpWeights,
}

/// Locate the sampling footprint of pixel coordinate `xy`.
///
/// Returns `None` unless `floor(x)` is in `[0, cols-1)` and `floor(y)` in
/// `[0, rows-1)`, which keeps all four neighbours inside the image. Non-finite
/// coordinates have no footprint.
#[inline]
pub fn footprint(xy: [f32; 2], size: ImageSize, stride: usize) -> Option<Footprint> {
    let [x, y] = xy;
    if !(x.is_finite() && y.is_finite()) {
        return None;
    }
    let fx = ComplexField::floor(x);
    let fy = ComplexField::floor(y);
    let (xi, yi) = (fx as i64, fy as i64);
    if !size.contains_footprint(xi, yi) {
        return None;
    }
    Some(Footprint {
        offset: yi as usize * stride + xi as usize,
        weights: InterpWeights::from_fraction(x - fx, y - fy),
    })
}

/// Projects scene points into the target image and caches per-point sampling
/// data.
///
/// After [`init`](#method.init) every point has a validity flag, and valid
/// points have a flat pixel offset and bilinear weights. The buffers are
/// reused across calls and are overwritten, never appended to, on each `init`.
/// Entries for invalid points are zero.
#[derive(Debug, Clone, Default)]
pub struct Projector {
    valid: Vec<bool>,
    offsets: Vec<usize>,
    weights: Vec<InterpWeights>,
    size: ImageSize,
    stride: usize,
    num_valid: usize,
}

impl Projector {
    /// Create an empty projector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Project `points` with `p` into an image of `size` whose stride equals
    /// its width.
    pub fn init<PTS>(&mut self, p: &SMatrix<f32, 3, 4>, points: &PTS, size: ImageSize)
    where
        PTS: ScenePoints + ?Sized,
    {
        self.init_with_stride(p, points, size, size.cols)
    }

    /// Project `points` with `p` into an image of `size` with row stride
    /// `stride`.
    pub fn init_with_stride<PTS>(
        &mut self,
        p: &SMatrix<f32, 3, 4>,
        points: &PTS,
        size: ImageSize,
        stride: usize,
    ) where
        PTS: ScenePoints + ?Sized,
    {
        debug_assert!(stride >= size.cols);
        let n = points.len();
        self.size = size;
        self.stride = stride;
        self.reset(n);

        let mut degenerate = 0usize;
        let mut num_valid = 0usize;
        for (i, (valid, offset, weights)) in izip!(
            self.valid.iter_mut(),
            self.offsets.iter_mut(),
            self.weights.iter_mut()
        )
        .enumerate()
        {
            let xy = match project_point(p, &points.homogeneous(i)) {
                Some(xy) => xy,
                None => {
                    degenerate += 1;
                    continue;
                }
            };
            if let Some(fp) = footprint(xy, size, stride) {
                *valid = true;
                *offset = fp.offset;
                *weights = fp.weights;
                num_valid += 1;
            }
        }
        self.num_valid = num_valid;

        if degenerate > 0 {
            trace!("{} of {} points have a degenerate projection", degenerate, n);
        }
        debug!(
            "projected {} points, {} valid in {}x{} image",
            n, num_valid, size.rows, size.cols
        );
    }

    fn reset(&mut self, n: usize) {
        self.valid.clear();
        self.valid.resize(n, false);
        self.offsets.clear();
        self.offsets.resize(n, 0);
        self.weights.clear();
        self.weights.resize(n, InterpWeights::default());
    }

    /// Number of points from the last `init`.
    #[inline]
    pub fn len(&self) -> usize {
        self.valid.len()
    }

    /// Whether the last `init` had no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }

    /// Number of valid points.
    #[inline]
    pub fn num_valid(&self) -> usize {
        self.num_valid
    }

    /// Per-point validity.
    #[inline]
    pub fn valid(&self) -> &[bool] {
        &self.valid
    }

    /// Per-point flat offsets of the top-left footprint pixel.
    #[inline]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Per-point bilinear weights.
    #[inline]
    pub fn weights(&self) -> &[InterpWeights] {
        &self.weights
    }

    /// Image size used by the last `init`.
    #[inline]
    pub fn image_size(&self) -> ImageSize {
        self.size
    }

    /// Row stride used by the last `init`.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }
}
