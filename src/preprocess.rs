use std::io::Cursor;

use image::imageops::FilterType;
use image::io::Reader as ImageReader;
use image::DynamicImage;
use ndarray::Array4;

use crate::errors::PredictError;

pub const CHANNELS: usize = 3;

/// Turns uploaded images into the `(1, H, W, 3)` tensor the classifier reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePreprocessor {
    height: u32,
    width: u32,
}

impl ImagePreprocessor {
    pub fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }

    /// Shape of the tensors produced by [`prepare`](Self::prepare).
    pub fn tensor_shape(&self) -> [usize; 4] {
        [1, self.height as usize, self.width as usize, CHANNELS]
    }

    pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PredictError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PredictError::ImageDecode(e.into()))?;
        reader.decode().map_err(PredictError::ImageDecode)
    }

    /// Converts to RGB (grayscale replicated, alpha dropped), stretches to the
    /// model's input size and scales channel values into `[0, 1]`.
    pub fn prepare(&self, image: &DynamicImage) -> Array4<f32> {
        let rgb = image.to_rgb8();
        let resized = image::imageops::resize(&rgb, self.width, self.height, FilterType::Triangle);

        let mut tensor = Array4::<f32>::zeros(self.tensor_shape());
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..CHANNELS {
                tensor[[0, y as usize, x as usize, c]] = pixel[c] as f32 / 255.0;
            }
        }
        tensor
    }

    pub fn prepare_bytes(&self, bytes: &[u8]) -> Result<Array4<f32>, PredictError> {
        let image = Self::decode(bytes)?;
        Ok(self.prepare(&image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageOutputFormat, Luma, Rgb, RgbImage, Rgba, RgbaImage};

    fn encode(image: DynamicImage, format: ImageOutputFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    fn assert_normalized(tensor: &Array4<f32>) {
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn rgb_of_any_size_gets_model_shape() {
        let pre = ImagePreprocessor::new(32, 48);
        for (w, h) in [(1, 1), (17, 300), (640, 480), (48, 32)] {
            let img = RgbImage::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 200]));
            let tensor = pre.prepare(&DynamicImage::ImageRgb8(img));
            assert_eq!(tensor.shape(), &[1, 32, 48, 3]);
            assert_normalized(&tensor);
        }
    }

    #[test]
    fn grayscale_is_replicated_across_channels() {
        let pre = ImagePreprocessor::new(16, 16);
        let img = GrayImage::from_fn(37, 23, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]));
        let tensor = pre.prepare(&DynamicImage::ImageLuma8(img));

        assert_eq!(tensor.shape(), &[1, 16, 16, 3]);
        assert_normalized(&tensor);
        for y in 0..16 {
            for x in 0..16 {
                let r = tensor[[0, y, x, 0]];
                assert_eq!(r, tensor[[0, y, x, 1]]);
                assert_eq!(r, tensor[[0, y, x, 2]]);
            }
        }
    }

    #[test]
    fn alpha_is_dropped() {
        let pre = ImagePreprocessor::new(4, 4);
        let img = RgbaImage::from_pixel(8, 8, Rgba([255, 0, 51, 0]));
        let tensor = pre.prepare(&DynamicImage::ImageRgba8(img));

        assert_eq!(tensor.shape(), &[1, 4, 4, 3]);
        assert_eq!(tensor[[0, 2, 2, 0]], 1.0);
        assert_eq!(tensor[[0, 2, 2, 1]], 0.0);
        assert!((tensor[[0, 2, 2, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn values_are_divided_by_255() {
        let pre = ImagePreprocessor::new(2, 2);
        let img = RgbImage::from_pixel(2, 2, Rgb([0, 255, 102]));
        let tensor = pre.prepare(&DynamicImage::ImageRgb8(img));

        assert_eq!(tensor[[0, 1, 1, 0]], 0.0);
        assert_eq!(tensor[[0, 1, 1, 1]], 1.0);
        assert!((tensor[[0, 1, 1, 2]] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn decodes_png_and_jpeg() {
        let pre = ImagePreprocessor::new(10, 12);
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(30, 20, Rgb([10, 120, 240])));

        for format in [ImageOutputFormat::Png, ImageOutputFormat::Jpeg(90)] {
            let tensor = pre.prepare_bytes(&encode(img.clone(), format)).unwrap();
            assert_eq!(tensor.shape(), &[1, 10, 12, 3]);
            assert_normalized(&tensor);
        }
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = ImagePreprocessor::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, PredictError::ImageDecode(_)));

        let err = ImagePreprocessor::decode(&[]).unwrap_err();
        assert!(matches!(err, PredictError::ImageDecode(_)));
    }

    #[test]
    fn truncated_png_fails_to_decode() {
        let bytes = encode(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([1, 2, 3]))),
            ImageOutputFormat::Png,
        );
        let err = ImagePreprocessor::decode(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, PredictError::ImageDecode(_)));
    }
}
