//! Utilities for testing `photo_error` implementations.
//!
//! Provides synthetic scenes and images plus a scalar reference computation
//! of the residuals which does not share code with the kernels under test.
use super::*;
use nalgebra::{
    Dyn, Isometry3, OMatrix, Point3, SMatrix, Translation3, UnitQuaternion, VecStorage,
};

/// Points with a runtime length.
pub type DynPoints = Points<Dyn, VecStorage<f32, Dyn, U3>>;

/// `[I | 0]`: maps `(x, y, 1)` to pixel `(x, y)`.
#[rustfmt::skip]
pub fn identity_projection() -> SMatrix<f32, 3, 4> {
    SMatrix::<f32, 3, 4>::new(
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
    )
}

/// Points which land on the given pixels under
/// [`identity_projection`](fn.identity_projection.html).
pub fn pixel_points(pixels: &[[f32; 2]]) -> DynPoints {
    Points::new(OMatrix::<f32, Dyn, U3>::from_fn(pixels.len(), |i, j| {
        match j {
            0 => pixels[i][0],
            1 => pixels[i][1],
            _ => 1.0,
        }
    }))
}

/// The 4x4 image with pixel values `0..16` in row-major order.
pub fn ramp_4x4() -> Vec<f32> {
    (0..16).map(|v| v as f32).collect()
}

/// A deterministic, non-planar test image.
pub fn textured_image(size: ImageSize) -> Vec<f32> {
    let mut data = Vec::with_capacity(size.rows * size.cols);
    for r in 0..size.rows {
        for c in 0..size.cols {
            let smooth = 40.0 * (c as f32 * 0.31).sin() * (r as f32 * 0.17).cos();
            let detail = ((r * 31 + c * 17) % 13) as f32;
            data.push(100.0 + smooth + detail);
        }
    }
    data
}

/// Pixel grid with the given step, starting `border` pixels into the image.
pub fn grid_pixels(size: ImageSize, step: usize, border: usize) -> Vec<[f32; 2]> {
    let mut pixels = Vec::new();
    for row in num_iter::range_step(border, size.rows - border, step) {
        for col in num_iter::range_step(border, size.cols - border, step) {
            pixels.push([col as f32 + 0.25, row as f32 + 0.5]);
        }
    }
    pixels
}

/// Intrinsics and pose used by the synthetic scenes.
pub fn test_camera(size: ImageSize) -> (PinholeParams, Isometry3<f32>) {
    let params = PinholeParams {
        fx: size.cols as f32,
        fy: size.cols as f32,
        skew: 0.0,
        cx: size.cols as f32 * 0.5,
        cy: size.rows as f32 * 0.5,
    };
    let pose = Isometry3::from_parts(
        Translation3::new(0.05, -0.02, 0.1),
        UnitQuaternion::from_euler_angles(0.02, -0.01, 0.03),
    );
    (params, pose)
}

/// Back-project `pixels` at varying depths through the test camera.
///
/// Returns the projection matrix and scene points which project back onto
/// `pixels` up to rounding.
pub fn scene_from_pixels(
    size: ImageSize,
    pixels: &[[f32; 2]],
) -> (SMatrix<f32, 3, 4>, DynPoints) {
    let (params, pose) = test_camera(size);
    let mut data = OMatrix::<f32, Dyn, U3>::zeros(pixels.len());
    for (i, [u, v]) in pixels.iter().enumerate() {
        let depth = 1.0 + (i % 11) as f32 * 0.25;
        let y = (v - params.cy) / params.fy;
        let x = (u - params.skew * y - params.cx) / params.fx;
        let cam = Point3::new(x * depth, y * depth, depth);
        let scene = pose.inverse_transform_point(&cam);
        data[(i, 0)] = scene.x;
        data[(i, 1)] = scene.y;
        data[(i, 2)] = scene.z;
    }
    (projection_matrix(&params, &pose), Points::new(data))
}

/// A scene with exactly `n` points, some of which fall outside the footprint
/// interior of an image of `size`.
pub fn scene_with_len(n: usize, size: ImageSize) -> (SMatrix<f32, 3, 4>, DynPoints) {
    let pixels: Vec<[f32; 2]> = (0..n)
        .map(|i| {
            let frac = ((i * 7) % 10) as f32 * 0.1 + 0.05;
            let u = ((i * 37) % (size.cols + 6)) as f32 - 3.0 + frac;
            let v = ((i * 53) % (size.rows + 6)) as f32 - 3.0 + frac;
            [u, v]
        })
        .collect();
    scene_from_pixels(size, &pixels)
}

/// Straightforward residual computation used as the correctness oracle.
pub fn reference_residuals<PTS>(
    p: &SMatrix<f32, 3, 4>,
    points: &PTS,
    reference: &[f32],
    target: &Image<'_>,
) -> Vec<f32>
where
    PTS: ScenePoints + ?Sized,
{
    assert_eq!(points.len(), reference.len());
    let size = target.size();
    let stride = target.stride();
    let data = target.as_slice();

    (0..points.len())
        .map(|i| {
            let h = p * points.homogeneous(i);
            if h[2] <= f32::EPSILON {
                return 0.0;
            }
            let w = 1.0 / h[2];
            let (x, y) = (h[0] * w, h[1] * w);
            let (x0, y0) = (x.floor(), y.floor());
            let inside = x0 >= 0.0
                && y0 >= 0.0
                && x0 < (size.cols - 1) as f32
                && y0 < (size.rows - 1) as f32;
            if !inside {
                return 0.0;
            }
            let (dx, dy) = (x - x0, y - y0);
            let idx = y0 as usize * stride + x0 as usize;
            let top = (1.0 - dx) * data[idx] + dx * data[idx + 1];
            let bottom = (1.0 - dx) * data[idx + stride] + dx * data[idx + stride + 1];
            (1.0 - dy) * top + dy * bottom - reference[i]
        })
        .collect()
}
