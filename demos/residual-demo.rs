use nalgebra::{Isometry3, Translation3, UnitQuaternion};
use photo_error::residual_test_utils::{
    grid_pixels, scene_from_pixels, test_camera, textured_image,
};
use photo_error::*;

fn main() -> Result<(), Error> {
    let size = ImageSize::new(120, 160)?;
    let data = textured_image(size);
    let image = Image::from_contiguous(&data, size.rows, size.cols)?;

    // Reference intensities are the image itself sampled at the reference
    // pose, so residuals grow as the pose is perturbed.
    let pixels = grid_pixels(size, 8, 4);
    let (p0, points) = scene_from_pixels(size, &pixels);
    let mut photo_error = PhotoError::new();
    let mut valid = Vec::new();
    photo_error.init(&p0, &points, &mut valid, size.rows, size.cols);
    let mut reference = vec![0.0; points.len()];
    let zeros = vec![0.0; points.len()];
    photo_error.try_run(&zeros, &image, &mut reference)?;

    let (params, pose) = test_camera(size);
    for step in 0..5 {
        let shift = step as f32 * 0.01;
        let nudge = Isometry3::from_parts(
            Translation3::new(shift, 0.0, 0.0),
            UnitQuaternion::identity(),
        );
        let perturbed = nudge * pose;
        let p = projection_matrix(&params, &perturbed);
        photo_error.init(&p, &points, &mut valid, size.rows, size.cols);

        let mut residuals = vec![0.0; points.len()];
        photo_error.try_run(&reference, &image, &mut residuals)?;

        let num_valid = valid.iter().filter(|v| **v).count();
        let sse: f32 = residuals.iter().map(|r| r * r).sum();
        println!(
            "shift {:.2}: {} of {} points valid, sum of squared residuals {:.3}",
            shift,
            num_valid,
            points.len(),
            sse
        );
    }
    Ok(())
}
