#![cfg_attr(not(feature = "std"), no_std)]
#![deny(rust_2018_idioms, unsafe_code, missing_docs)]
#![cfg_attr(not(doctest), doc = include_str!("../README.md"))]
#![cfg_attr(doc_cfg, feature(doc_cfg))]

//! # Examples
//!
//! ## Example - residual of a single point
//!
//! ```
//! use photo_error::*;
//! use nalgebra::{Matrix1x3, SMatrix};
//!
//! // Identity projection: a point (x,y,1) lands on pixel (x,y).
//! #[rustfmt::skip]
//! let p = SMatrix::<f32, 3, 4>::new(
//!     1.0, 0.0, 0.0, 0.0,
//!     0.0, 1.0, 0.0, 0.0,
//!     0.0, 0.0, 1.0, 0.0,
//! );
//! let points = Points::new(Matrix1x3::new(1.5, 1.5, 1.0));
//!
//! // A 4x4 ramp image, row-major.
//! let pixels: Vec<f32> = (0..16).map(|v| v as f32).collect();
//! let image = Image::from_contiguous(&pixels, 4, 4).unwrap();
//!
//! let mut photo_error = PhotoError::new();
//! let mut valid = Vec::new();
//! photo_error.init(&p, &points, &mut valid, 4, 4);
//!
//! let mut residuals = [0.0_f32; 1];
//! photo_error.run(&[7.0], &image, &mut residuals);
//!
//! assert_eq!(valid, vec![true]);
//! assert_eq!(residuals[0], 0.5);
//! ```

extern crate alloc;

use nalgebra::{storage::Storage, Dim, Matrix, Vector4, U3, U4};

#[cfg(feature = "std")]
pub mod residual_test_utils;

mod image;
pub use image::{Image, ImageSize};

mod projection;
pub use projection::{
    footprint, project_point, projection_matrix, Footprint, InterpWeights, PinholeParams,
    Projector,
};

mod evaluate;
pub use evaluate::{ExecutionPath, ResidualEvaluator, ResidualKernel, ScalarPath, LANES};
#[cfg(feature = "wide")]
pub use evaluate::WidePath;

mod remap;
pub use remap::RemapBackend;

mod photo_error;
pub use photo_error::{ErrorBackend, InterpolationBackend, PhotoError};

/// All possible errors.
#[cfg_attr(feature = "std", derive(Debug))]
#[derive(Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Image has zero rows or columns, or a stride narrower than a row.
    InvalidImageSize,
    /// Image buffer holds fewer than `rows * stride` values.
    ImageBufferTooSmall,
    /// A per-point array does not have one entry per point.
    LengthMismatch,
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// A set of scene points which can be fed through a 3x4 projection.
pub trait ScenePoints {
    /// Number of points.
    fn len(&self) -> usize;

    /// Whether there are no points.
    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Homogeneous coordinate of point `i`.
    fn homogeneous(&self, i: usize) -> Vector4<f32>;
}

/// 3D points in the scene's reference frame.
///
/// This is a newtype wrapping an `nalgebra::Matrix` with one point per row.
pub struct Points<NPTS: Dim, STORAGE> {
    /// The matrix storing point locations.
    pub data: Matrix<f32, NPTS, U3, STORAGE>,
}

impl<NPTS: Dim, STORAGE> Points<NPTS, STORAGE> {
    /// Create a new Points instance from the underlying storage.
    #[inline]
    pub fn new(data: Matrix<f32, NPTS, U3, STORAGE>) -> Self {
        Self { data }
    }
}

impl<NPTS, STORAGE> ScenePoints for Points<NPTS, STORAGE>
where
    NPTS: Dim,
    STORAGE: Storage<f32, NPTS, U3>,
{
    #[inline]
    fn len(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    fn homogeneous(&self, i: usize) -> Vector4<f32> {
        Vector4::new(self.data[(i, 0)], self.data[(i, 1)], self.data[(i, 2)], 1.0)
    }
}

#[cfg(feature = "std")]
impl<NPTS: Dim, STORAGE: std::fmt::Debug> std::fmt::Debug for Points<NPTS, STORAGE> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Points").field("data", &self.data).finish()
    }
}

/// 3D points given in homogeneous form, one `(x, y, z, w)` per row.
pub struct HomogeneousPoints<NPTS: Dim, STORAGE> {
    /// The matrix storing homogeneous point locations.
    pub data: Matrix<f32, NPTS, U4, STORAGE>,
}

impl<NPTS: Dim, STORAGE> HomogeneousPoints<NPTS, STORAGE> {
    /// Create a new HomogeneousPoints instance from the underlying storage.
    #[inline]
    pub fn new(data: Matrix<f32, NPTS, U4, STORAGE>) -> Self {
        Self { data }
    }
}

impl<NPTS, STORAGE> ScenePoints for HomogeneousPoints<NPTS, STORAGE>
where
    NPTS: Dim,
    STORAGE: Storage<f32, NPTS, U4>,
{
    #[inline]
    fn len(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    fn homogeneous(&self, i: usize) -> Vector4<f32> {
        self.data.row(i).transpose()
    }
}

impl ScenePoints for [[f32; 3]] {
    #[inline]
    fn len(&self) -> usize {
        <[[f32; 3]]>::len(self)
    }

    #[inline]
    fn homogeneous(&self, i: usize) -> Vector4<f32> {
        let [x, y, z] = self[i];
        Vector4::new(x, y, z, 1.0)
    }
}
