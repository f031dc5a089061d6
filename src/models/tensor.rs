use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use ndarray::{Array4, Axis};

use crate::error::{ClarityError, Result};

/// Host image batch in `[batch, height, width, channels]` layout with `f32`
/// samples in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Array4<f32>,
}

impl ImageTensor {
    pub fn from_array(data: Array4<f32>) -> Self {
        Self { data }
    }

    /// Single-image batch with every sample set to `value`.
    pub fn filled(height: usize, width: usize, channels: usize, value: f32) -> Self {
        Self {
            data: Array4::from_elem((1, height, width, channels), value),
        }
    }

    pub fn batch(&self) -> usize {
        self.data.dim().0
    }

    pub fn height(&self) -> usize {
        self.data.dim().1
    }

    pub fn width(&self) -> usize {
        self.data.dim().2
    }

    pub fn channels(&self) -> usize {
        self.data.dim().3
    }

    pub fn as_array(&self) -> &Array4<f32> {
        &self.data
    }

    pub fn into_array(self) -> Array4<f32> {
        self.data
    }

    /// Encodes the single image of the batch as PNG.
    ///
    /// Samples are clamped to `[0, 1]`, scaled by 255 and truncated. Gray,
    /// RGB and RGBA inputs are supported.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let (batch, height, width, channels) = self.data.dim();
        if batch != 1 {
            return Err(ClarityError::Encode(format!(
                "expected a batch of one image, got {}",
                batch
            )));
        }

        let w = u32::try_from(width).map_err(|e| ClarityError::Encode(e.to_string()))?;
        let h = u32::try_from(height).map_err(|e| ClarityError::Encode(e.to_string()))?;

        let pixels: Vec<u8> = self
            .data
            .index_axis(Axis(0), 0)
            .iter()
            .map(|v| to_u8(*v))
            .collect();

        let image = match channels {
            1 => GrayImage::from_raw(w, h, pixels).map(DynamicImage::ImageLuma8),
            3 => RgbImage::from_raw(w, h, pixels).map(DynamicImage::ImageRgb8),
            4 => RgbaImage::from_raw(w, h, pixels).map(DynamicImage::ImageRgba8),
            n => {
                return Err(ClarityError::Encode(format!(
                    "unsupported channel count: {}",
                    n
                )))
            }
        }
        .ok_or_else(|| ClarityError::Encode("pixel buffer does not match dimensions".into()))?;

        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| ClarityError::Encode(e.to_string()))?;

        log::debug!("Encoded {}x{}x{} input as PNG", width, height, channels);
        Ok(buffer.into_inner())
    }

    /// Decodes any supported image format into a single-image RGBA batch.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (w, h) = rgba.dimensions();

        let samples: Vec<f32> = rgba
            .into_raw()
            .into_iter()
            .map(|s| f32::from(s) / 255.0)
            .collect();

        let data = Array4::from_shape_vec((1, h as usize, w as usize, 4), samples)
            .map_err(|e| ClarityError::Decode(e.to_string()))?;

        Ok(Self { data })
    }
}

fn to_u8(sample: f32) -> u8 {
    (sample.clamp(0.0, 1.0) * 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn png_bytes(image: RgbaImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_decode_png_layout() {
        let mut img = RgbaImage::new(3, 2);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        img.put_pixel(2, 1, Rgba([0, 0, 255, 51]));

        let tensor = ImageTensor::decode(&png_bytes(img)).unwrap();
        assert_eq!(tensor.as_array().dim(), (1, 2, 3, 4));

        let data = tensor.as_array();
        assert_eq!(data[[0, 0, 0, 0]], 1.0);
        assert_eq!(data[[0, 0, 0, 1]], 0.0);
        assert_eq!(data[[0, 1, 2, 2]], 1.0);
        assert!((data[[0, 1, 2, 3]] - 0.2).abs() < 1e-6);
        assert!(data.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_decode_rgb_gains_alpha() {
        let rgb = RgbImage::from_pixel(2, 2, image::Rgb([10, 20, 30]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(rgb)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();

        let tensor = ImageTensor::decode(&buffer.into_inner()).unwrap();
        assert_eq!(tensor.channels(), 4);
        assert_eq!(tensor.as_array()[[0, 1, 1, 3]], 1.0);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = ImageTensor::decode(b"not an image").unwrap_err();
        assert!(matches!(err, ClarityError::Decode(_)));
    }

    #[test]
    fn test_encode_rgb_png() {
        let tensor = ImageTensor::filled(4, 5, 3, 0.5);
        let bytes = tensor.encode_png().unwrap();

        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (5, 4));
        assert_eq!(decoded.to_rgb8().get_pixel(0, 0).0, [127, 127, 127]);
    }

    #[test]
    fn test_encode_clamps_out_of_range() {
        let mut data = Array4::<f32>::zeros((1, 1, 2, 1));
        data[[0, 0, 0, 0]] = -0.5;
        data[[0, 0, 1, 0]] = 1.7;

        let bytes = ImageTensor::from_array(data).encode_png().unwrap();
        let gray = image::load_from_memory(&bytes).unwrap().to_luma8();
        assert_eq!(gray.get_pixel(0, 0).0, [0]);
        assert_eq!(gray.get_pixel(1, 0).0, [255]);
    }

    #[test]
    fn test_encode_rejects_batches_and_odd_channels() {
        let batch = ImageTensor::from_array(Array4::zeros((2, 1, 1, 3)));
        assert!(matches!(batch.encode_png(), Err(ClarityError::Encode(_))));

        let two_channels = ImageTensor::filled(1, 1, 2, 0.0);
        assert!(matches!(
            two_channels.encode_png(),
            Err(ClarityError::Encode(_))
        ));
    }
}
