//! Raster to classifier-input conversion.

use image::RgbaImage;
use image::imageops::{self, FilterType};

use crate::error::{PadError, PadResult};

pub const DEFAULT_INPUT_SIZE: u32 = 28;

/// Row-major `size * size` single-channel values in `[0, 255]`; ink is high.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub size: u32,
    pub values: Vec<f32>,
}

impl Tensor {
    #[cfg(test)]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[(y * self.size + x) as usize]
    }

    pub fn is_blank(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    /// Coarse text rendering, one character per cell.
    pub fn to_ascii(&self) -> String {
        const SHADES: &[u8] = b" .:-=+*#%@";
        let mut out = String::with_capacity(((self.size + 1) * self.size) as usize);
        for row in self.values.chunks(self.size as usize) {
            for v in row {
                let i = ((v / 255.0) * (SHADES.len() - 1) as f32).round() as usize;
                out.push(SHADES[i.min(SHADES.len() - 1)] as char);
            }
            out.push('\n');
        }
        out
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TensorExtractor {
    size: u32,
    filter: FilterType,
}

impl Default for TensorExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_SIZE)
    }
}

impl TensorExtractor {
    /// Nearest-neighbour resampling, no smoothing between samples.
    pub fn new(size: u32) -> Self {
        Self {
            size,
            filter: FilterType::Nearest,
        }
    }

    pub fn extract(&self, raster: Option<&RgbaImage>) -> PadResult<Tensor> {
        let raster = raster.ok_or(PadError::SurfaceNotReady)?;
        if self.size == 0 {
            return Err(PadError::InvalidDimension {
                what: "tensor",
                width: 0.0,
                height: 0.0,
            });
        }

        let scaled = if raster.dimensions() == (self.size, self.size) {
            raster.clone()
        } else {
            imageops::resize(raster, self.size, self.size, self.filter)
        };

        // blue channel only; the brush palette is grey so R == G == B
        let values = scaled.pixels().map(|p| f32::from(255 - p.0[2])).collect();
        Ok(Tensor {
            size: self.size,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn blank_raster_gives_zero_tensor() {
        let img = RgbaImage::from_pixel(280, 280, Rgba([255, 255, 255, 255]));
        let t = TensorExtractor::default().extract(Some(&img)).unwrap();
        assert_eq!(t.values.len(), 28 * 28);
        assert!(t.is_blank());
    }

    #[test]
    fn ink_maps_high_and_only_blue_is_read() {
        let mut img = RgbaImage::from_pixel(28, 28, Rgba([255, 255, 255, 255]));
        img.put_pixel(3, 5, Rgba([0, 0, 0, 255]));
        img.put_pixel(4, 5, Rgba([0, 0, 200, 255]));
        let t = TensorExtractor::new(28).extract(Some(&img)).unwrap();
        assert_eq!(t.get(3, 5), 255.0);
        assert_eq!(t.get(4, 5), 55.0);
        assert_eq!(t.get(0, 0), 0.0);
        assert!(t.values.iter().all(|v| (0.0..=255.0).contains(v)));
    }

    #[test]
    fn downsampling_keeps_filled_blocks() {
        let mut img = RgbaImage::from_pixel(56, 56, Rgba([255, 255, 255, 255]));
        for y in 0..28 {
            for x in 0..28 {
                img.put_pixel(x, y, Rgba([0, 0, 0, 255]));
            }
        }
        let t = TensorExtractor::new(28).extract(Some(&img)).unwrap();
        assert_eq!(t.values.len(), 784);
        assert_eq!(t.get(0, 0), 255.0);
        assert_eq!(t.get(13, 13), 255.0);
        assert_eq!(t.get(14, 14), 0.0);
        assert_eq!(t.get(27, 27), 0.0);
    }

    #[test]
    fn missing_surface_is_reported() {
        let err = TensorExtractor::default().extract(None).unwrap_err();
        assert_eq!(err, PadError::SurfaceNotReady);
    }

    #[test]
    fn ascii_has_one_line_per_row() {
        let t = Tensor {
            size: 2,
            values: vec![0.0, 255.0, 255.0, 0.0],
        };
        assert_eq!(t.to_ascii(), " @\n@ \n");
    }
}
