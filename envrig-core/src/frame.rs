use crate::error::{Error, Result};
use derive_more::{Deref, DerefMut};
use image::{Rgb, RgbImage};

/// One rendered picture of an environment, `height x width x 3` RGB.
#[derive(Debug, Clone, PartialEq, Deref, DerefMut)]
pub struct Frame(RgbImage);

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self(image)
    }

    pub fn filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        Self(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    /// Builds a frame from the row-major bytes of an `(height, width, channels)` array, the
    /// layout `rgb_array` renderers hand out. Alpha is dropped when `channels == 4`.
    pub fn from_raw(height: usize, width: usize, channels: usize, bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() != height * width * channels {
            return Err(Error::InvalidFrame(format!(
                "{} bytes do not fit a {height}x{width}x{channels} frame",
                bytes.len()
            )));
        }
        let rgb = match channels {
            3 => bytes,
            4 => bytes
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect(),
            _ => {
                return Err(Error::InvalidFrame(format!(
                    "expected 3 or 4 channels, got {channels}"
                )));
            }
        };
        let image = RgbImage::from_raw(width as u32, height as u32, rgb)
            .ok_or_else(|| Error::InvalidFrame("frame buffer too small".to_owned()))?;
        Ok(Self(image))
    }

    pub fn into_image(self) -> RgbImage {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_drops_alpha() {
        let bytes = vec![1, 2, 3, 255, 4, 5, 6, 255];
        let frame = Frame::from_raw(1, 2, 4, bytes).unwrap();
        assert_eq!(frame.dimensions(), (2, 1));
        assert_eq!(frame.get_pixel(1, 0), &Rgb([4, 5, 6]));
    }

    #[test]
    fn from_raw_checks_length() {
        assert!(Frame::from_raw(2, 2, 3, vec![0; 11]).is_err());
        assert!(Frame::from_raw(1, 1, 2, vec![0; 2]).is_err());
    }
}
