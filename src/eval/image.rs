// eval/image.rs - Built-in single-channel image resource
//
// Pixels are addressed in pixel units with nearest sampling; coordinates
// wrap around both edges so an image tiles across the world.

use crate::eval::error::ImageError;
use crate::eval::interval::Interval;
use crate::eval::resources::ImageSource;

#[derive(Debug, Clone)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Vec<f32>,
    range: Interval,
}

impl Image {
    /// Build an image from row-major pixels. Non-finite pixels are stored
    /// as zero.
    pub fn new(width: u32, height: u32, mut pixels: Vec<f32>) -> Result<Self, ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::Empty);
        }
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(ImageError::SizeMismatch {
                width,
                height,
                expected,
                got: pixels.len(),
            });
        }

        for p in pixels.iter_mut() {
            if !p.is_finite() {
                *p = 0.0;
            }
        }
        let lo = pixels.iter().copied().fold(f32::INFINITY, f32::min);
        let hi = pixels.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        Ok(Image {
            width,
            height,
            pixels,
            range: Interval::new(lo as f64, hi as f64),
        })
    }

    /// Build an image by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> f32) -> Result<Self, ImageError> {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self::new(width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> f32 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }
}

/// Wrap a coordinate into `0..size`. Non-finite coordinates map to 0.
#[inline]
fn wrap(v: f64, size: u32) -> u32 {
    if !v.is_finite() {
        return 0;
    }
    (v.floor() as i64).rem_euclid(size as i64) as u32
}

impl ImageSource for Image {
    fn sample(&self, x: f64, y: f64) -> f64 {
        self.pixel(wrap(x, self.width), wrap(y, self.height)) as f64
    }

    fn range(&self) -> Interval {
        self.range
    }
}
