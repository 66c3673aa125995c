//! Residual evaluation over a projected point set.
//!
//! Two interchangeable kernels implement [`ResidualKernel`]: [`ScalarPath`]
//! visits one point at a time and is the reference; `WidePath` (feature
//! `wide`) evaluates [`LANES`] points per step with `f32x8` arithmetic and
//! hands the remainder to the scalar kernel. Both sum the four bilinear terms
//! in the same order and so agree bit for bit.

use itertools::izip;
use log::trace;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "wide")]
use wide::f32x8;

use crate::{Image, InterpWeights, Projector};

/// Number of points evaluated per step by the wide path.
pub const LANES: usize = 8;

/// Which residual kernel a [`ResidualEvaluator`] dispatches to.
///
/// The default is `Wide` when the `wide` feature is enabled and `Scalar`
/// otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum ExecutionPath {
    /// One point at a time.
    Scalar,
    /// [`LANES`] points at a time, scalar tail.
    Wide,
}

impl Default for ExecutionPath {
    fn default() -> Self {
        if cfg!(feature = "wide") {
            ExecutionPath::Wide
        } else {
            ExecutionPath::Scalar
        }
    }
}

/// Computes `r[i] = sample(I1, i) - I0[i]` for valid points and `0` otherwise.
pub trait ResidualKernel {
    /// Fill `residuals` from the sampling data cached in `projector`.
    ///
    /// `reference` and `residuals` must have `projector.len()` entries and
    /// `target` must have the size and stride `projector` was initialized
    /// with.
    fn evaluate(
        &self,
        projector: &Projector,
        reference: &[f32],
        target: &Image<'_>,
        residuals: &mut [f32],
    );
}

#[inline(always)]
fn residual_at(
    target: &Image<'_>,
    valid: bool,
    offset: usize,
    weights: &InterpWeights,
    reference: f32,
) -> f32 {
    if valid {
        weights.dot(target.quad(offset)) - reference
    } else {
        0.0
    }
}

/// Point-by-point kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarPath;

impl ScalarPath {
    fn evaluate_from(
        start: usize,
        projector: &Projector,
        reference: &[f32],
        target: &Image<'_>,
        residuals: &mut [f32],
    ) {
        for (r, &i0, &valid, &offset, weights) in izip!(
            &mut residuals[start..],
            &reference[start..],
            &projector.valid()[start..],
            &projector.offsets()[start..],
            &projector.weights()[start..]
        ) {
            *r = residual_at(target, valid, offset, weights, i0);
        }
    }
}

impl ResidualKernel for ScalarPath {
    fn evaluate(
        &self,
        projector: &Projector,
        reference: &[f32],
        target: &Image<'_>,
        residuals: &mut [f32],
    ) {
        Self::evaluate_from(0, projector, reference, target, residuals);
    }
}

/// `f32x8` kernel with a scalar tail.
#[cfg(feature = "wide")]
#[derive(Debug, Clone, Copy, Default)]
pub struct WidePath;

#[cfg(feature = "wide")]
impl ResidualKernel for WidePath {
    fn evaluate(
        &self,
        projector: &Projector,
        reference: &[f32],
        target: &Image<'_>,
        residuals: &mut [f32],
    ) {
        let n = projector.len();
        let split = n - n % LANES;
        let valid = projector.valid();
        let offsets = projector.offsets();
        let weights = projector.weights();

        for base in (0..split).step_by(LANES) {
            // Invalid lanes keep zero weights, samples and reference, so
            // their residual is exactly 0.
            let mut w = [[0.0f32; LANES]; 4];
            let mut v = [[0.0f32; LANES]; 4];
            let mut i0 = [0.0f32; LANES];
            for lane in 0..LANES {
                let i = base + lane;
                if !valid[i] {
                    continue;
                }
                let quad = target.quad(offsets[i]);
                for k in 0..4 {
                    w[k][lane] = weights[i].0[k];
                    v[k][lane] = quad[k];
                }
                i0[lane] = reference[i];
            }

            let sampled = f32x8::from(w[0]) * f32x8::from(v[0])
                + f32x8::from(w[1]) * f32x8::from(v[1])
                + f32x8::from(w[2]) * f32x8::from(v[2])
                + f32x8::from(w[3]) * f32x8::from(v[3]);
            let out = (sampled - f32x8::from(i0)).to_array();
            residuals[base..base + LANES].copy_from_slice(&out);
        }

        ScalarPath::evaluate_from(split, projector, reference, target, residuals);
    }
}

/// Produces photometric residuals for the points cached in a
/// [`Projector`](struct.Projector.html).
///
/// # Preconditions
///
/// `run` performs no allocation and no validation beyond `debug_assert!`.
/// Lengths of `reference` and `residuals` must equal the number of projected
/// points and the target image must match the size and stride given to the
/// projector. In release builds a mismatch gives meaningless residuals or a
/// panic from slice indexing; it never reads outside the image buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResidualEvaluator {
    path: ExecutionPath,
}

impl ResidualEvaluator {
    /// Create an evaluator using `path`.
    ///
    /// Without the `wide` feature, `ExecutionPath::Wide` runs the scalar
    /// kernel.
    pub fn new(path: ExecutionPath) -> Self {
        Self { path }
    }

    /// The configured execution path.
    #[inline]
    pub fn path(&self) -> ExecutionPath {
        self.path
    }

    /// Fill `residuals` with `sample(target) - reference` per point.
    pub fn run(
        &self,
        projector: &Projector,
        reference: &[f32],
        target: &Image<'_>,
        residuals: &mut [f32],
    ) {
        let n = projector.len();
        debug_assert_eq!(reference.len(), n, "reference intensities per point");
        debug_assert_eq!(residuals.len(), n, "residual buffer per point");
        debug_assert_eq!(target.size(), projector.image_size());
        debug_assert_eq!(target.stride(), projector.stride());

        if n == 0 {
            return;
        }
        trace!(
            "evaluating {} residuals on {:?} path ({} wide, {} tail)",
            n,
            self.path,
            n - n % LANES,
            n % LANES
        );

        match self.path {
            ExecutionPath::Scalar => ScalarPath.evaluate(projector, reference, target, residuals),
            #[cfg(feature = "wide")]
            ExecutionPath::Wide => WidePath.evaluate(projector, reference, target, residuals),
            #[cfg(not(feature = "wide"))]
            ExecutionPath::Wide => ScalarPath.evaluate(projector, reference, target, residuals),
        }
    }
}
