#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

use crate::Error;

/// Dimensions of a target image, in pixels.
///
/// The interior in which a 2x2 bilinear footprint fits is
/// `[0, cols-1) x [0, rows-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ImageSize {
    /// Number of rows (image height).
    pub rows: usize,
    /// Number of columns (image width).
    pub cols: usize,
}

impl ImageSize {
    /// Create a new `ImageSize`, rejecting empty images.
    pub fn new(rows: usize, cols: usize) -> Result<Self, Error> {
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidImageSize);
        }
        Ok(Self { rows, cols })
    }

    /// Whether the 2x2 footprint with top-left corner `(xi, yi)` lies in the
    /// image.
    #[inline]
    pub fn contains_footprint(&self, xi: i64, yi: i64) -> bool {
        xi >= 0 && xi < self.cols as i64 - 1 && yi >= 0 && yi < self.rows as i64 - 1
    }
}

/// A borrowed, row-major, single channel `f32` image.
///
/// Pixel `(col, row)` lives at `data[row * stride + col]`.
#[derive(Debug, Clone, Copy)]
pub struct Image<'a> {
    data: &'a [f32],
    size: ImageSize,
    stride: usize,
}

impl<'a> Image<'a> {
    /// Wrap `data` as an image of `rows x cols` pixels with the given row stride.
    ///
    /// Fails if the size is empty, `stride < cols`, or `data` holds fewer than
    /// `rows * stride` values.
    pub fn new(data: &'a [f32], rows: usize, cols: usize, stride: usize) -> Result<Self, Error> {
        let size = ImageSize::new(rows, cols)?;
        if stride < cols {
            return Err(Error::InvalidImageSize);
        }
        let needed = rows.checked_mul(stride).ok_or(Error::InvalidImageSize)?;
        if data.len() < needed {
            return Err(Error::ImageBufferTooSmall);
        }
        Ok(Self { data, size, stride })
    }

    /// Wrap `data` as an image whose stride equals its width.
    #[inline]
    pub fn from_contiguous(data: &'a [f32], rows: usize, cols: usize) -> Result<Self, Error> {
        Self::new(data, rows, cols, cols)
    }

    /// Image dimensions.
    #[inline]
    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// Number of `f32` values between the starts of consecutive rows.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// The backing buffer.
    #[inline]
    pub fn as_slice(&self) -> &'a [f32] {
        self.data
    }

    /// Pixel at `(col, row)`, or `None` outside the image.
    #[inline]
    pub fn get(&self, col: i64, row: i64) -> Option<f32> {
        if col < 0 || row < 0 || col >= self.size.cols as i64 || row >= self.size.rows as i64 {
            return None;
        }
        Some(self.data[row as usize * self.stride + col as usize])
    }

    /// The 2x2 neighbourhood whose top-left pixel is at flat index `offset`.
    ///
    /// Returned in the order `[top-left, top-right, bottom-left, bottom-right]`.
    /// `offset` must come from a footprint validated against this image's size
    /// and stride.
    #[inline(always)]
    pub fn quad(&self, offset: usize) -> [f32; 4] {
        debug_assert!(offset + self.stride + 1 < self.data.len());
        let below = offset + self.stride;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[below],
            self.data[below + 1],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> alloc::vec::Vec<f32> {
        (0..16).map(|v| v as f32).collect()
    }

    #[test]
    fn rejects_bad_geometry() {
        let data = ramp();
        assert_eq!(
            Image::new(&data, 0, 4, 4).unwrap_err(),
            Error::InvalidImageSize
        );
        assert_eq!(
            Image::new(&data, 4, 4, 3).unwrap_err(),
            Error::InvalidImageSize
        );
        assert_eq!(
            Image::new(&data[..15], 4, 4, 4).unwrap_err(),
            Error::ImageBufferTooSmall
        );
        assert!(Image::new(&data, 3, 4, 5).is_ok());
    }

    #[test]
    fn footprint_margin() {
        let size = ImageSize::new(4, 4).unwrap();
        assert!(size.contains_footprint(0, 0));
        assert!(size.contains_footprint(2, 2));
        assert!(!size.contains_footprint(3, 0));
        assert!(!size.contains_footprint(0, 3));
        assert!(!size.contains_footprint(-1, 1));
        assert!(!ImageSize { rows: 1, cols: 1 }.contains_footprint(0, 0));
    }

    #[test]
    fn quad_gathers_neighbours() {
        let data = ramp();
        let image = Image::from_contiguous(&data, 4, 4).unwrap();
        assert_eq!(image.quad(5), [5.0, 6.0, 9.0, 10.0]);
        assert_eq!(image.get(3, 3), Some(15.0));
        assert_eq!(image.get(4, 0), None);
        assert_eq!(image.get(0, -1), None);
    }

    #[test]
    fn padded_stride() {
        // 2 rows of 3 pixels, padded to 4
        let data = [1.0, 2.0, 3.0, -1.0, 4.0, 5.0, 6.0, -1.0];
        let image = Image::new(&data, 2, 3, 4).unwrap();
        assert_eq!(image.quad(1), [2.0, 3.0, 5.0, 6.0]);
        assert_eq!(image.get(3, 0), None);
    }
}
