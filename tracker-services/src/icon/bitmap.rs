// SPDX-License-Identifier: LGPL-3.0-only
//! Raster bitmaps held by the icon cache.

use image::RgbaImage;

use crate::icon::error::IconError;

/// Position inside a view or inside an icon.
pub type Point = nalgebra::Point2<f32>;

/// Palette index treated as transparent in 8-bit bitmaps.
pub const TRANSPARENT_8_BIT: u8 = 0xff;

/// Edge length of a square icon, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IconSize(u32);

impl IconSize {
    /// 16x16 list icon.
    pub const MINI: Self = Self(16);
    /// 32x32 icon.
    pub const LARGE: Self = Self(32);

    /// Create a size from an edge length in pixels.
    pub const fn new(pixels: u32) -> Self {
        Self(pixels)
    }

    /// Edge length in pixels.
    pub const fn pixels(self) -> u32 {
        self.0
    }

    /// Sizes at or below 16 pixels are stored in the mini slots.
    pub const fn is_mini(self) -> bool {
        self.0 <= Self::MINI.0
    }
}

/// Pixel layout of a [Bitmap].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    /// 8-bit red, green, blue and alpha.
    Rgba32,
    /// 8-bit red, green and blue with an unused fourth byte.
    Rgb32,
    /// 8-bit index into the system palette.
    Cmap8,
    /// 8-bit grayscale.
    Gray8,
}

impl ColorSpace {
    /// Bytes used by one pixel.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba32 | Self::Rgb32 => 4,
            Self::Cmap8 | Self::Gray8 => 1,
        }
    }
}

/// Owned pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    color_space: ColorSpace,
    bytes_per_row: usize,
    bits: Vec<u8>,
}

impl Bitmap {
    /// Allocate a zeroed bitmap.
    pub fn new(width: u32, height: u32, color_space: ColorSpace) -> Result<Self, IconError> {
        let bytes_per_row = width as usize * color_space.bytes_per_pixel();
        let length = bytes_per_row * height as usize;
        let mut bits = Vec::new();
        bits.try_reserve_exact(length)
            .map_err(|_| IconError::AllocationFailed { width, height })?;
        bits.resize(length, 0);

        Ok(Self {
            width,
            height,
            color_space,
            bytes_per_row,
            bits,
        })
    }

    /// Allocate a zeroed square bitmap of an icon size.
    pub fn square(size: IconSize, color_space: ColorSpace) -> Result<Self, IconError> {
        Self::new(size.pixels(), size.pixels(), color_space)
    }

    /// Wrap existing pixel data.
    pub fn from_bits(
        width: u32,
        height: u32,
        color_space: ColorSpace,
        bits: Vec<u8>,
    ) -> Result<Self, IconError> {
        let bytes_per_row = width as usize * color_space.bytes_per_pixel();
        if bits.len() != bytes_per_row * height as usize {
            return Err(IconError::FormatMismatch(format!(
                "{} bytes for a {}x{} {:?} bitmap",
                bits.len(),
                width,
                height,
                color_space
            )));
        }

        Ok(Self {
            width,
            height,
            color_space,
            bytes_per_row,
            bits,
        })
    }

    /// Square RGBA bitmap filled with one color.
    pub fn solid(size: IconSize, rgba: [u8; 4]) -> Result<Self, IconError> {
        let mut bitmap = Self::square(size, ColorSpace::Rgba32)?;
        for pixel in bitmap.bits.chunks_exact_mut(4) {
            pixel.copy_from_slice(&rgba);
        }
        Ok(bitmap)
    }

    /// Copy an RGBA image.
    pub fn from_rgba_image(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            color_space: ColorSpace::Rgba32,
            bytes_per_row: image.width() as usize * 4,
            bits: image.as_raw().clone(),
        }
    }

    /// Copy into an RGBA image; only RGBA bitmaps convert.
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        if self.color_space != ColorSpace::Rgba32 {
            return None;
        }
        RgbaImage::from_raw(self.width, self.height, self.bits.clone())
    }

    /// Replace this bitmap's pixels with `source`'s.
    ///
    /// Dimensions must agree. The color space is taken over from `source`.
    pub fn copy_from(&mut self, source: &Bitmap) -> Result<(), IconError> {
        if self.width != source.width || self.height != source.height {
            return Err(IconError::FormatMismatch(format!(
                "cannot copy a {}x{} bitmap into {}x{}",
                source.width, source.height, self.width, self.height
            )));
        }
        self.color_space = source.color_space;
        self.bytes_per_row = source.bytes_per_row;
        self.bits.clear();
        self.bits.extend_from_slice(&source.bits);
        Ok(())
    }

    /// Whether both bitmaps share dimensions and color space.
    pub fn same_format(&self, other: &Bitmap) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.color_space == other.color_space
            && self.bits.len() == other.bits.len()
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel layout.
    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    /// Stride in bytes.
    pub fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    /// Raw pixel data.
    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    /// Mutable raw pixel data.
    pub fn bits_mut(&mut self) -> &mut [u8] {
        &mut self.bits
    }

    /// Length of the pixel data in bytes.
    pub fn bits_length(&self) -> usize {
        self.bits.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_bitmaps_are_zeroed() {
        let bitmap = Bitmap::square(IconSize::MINI, ColorSpace::Cmap8).unwrap();
        assert_eq!(bitmap.width(), 16);
        assert_eq!(bitmap.bytes_per_row(), 16);
        assert!(bitmap.bits().iter().all(|&b| b == 0));
    }

    #[test]
    fn from_bits_checks_length() {
        assert!(Bitmap::from_bits(2, 2, ColorSpace::Rgba32, vec![0; 15]).is_err());
        assert!(Bitmap::from_bits(2, 2, ColorSpace::Rgba32, vec![0; 16]).is_ok());
    }

    #[test]
    fn copy_from_requires_same_dimensions() {
        let mut target = Bitmap::square(IconSize::LARGE, ColorSpace::Rgba32).unwrap();
        let small = Bitmap::solid(IconSize::MINI, [1, 2, 3, 4]).unwrap();
        assert!(target.copy_from(&small).is_err());

        let large = Bitmap::solid(IconSize::LARGE, [1, 2, 3, 4]).unwrap();
        target.copy_from(&large).unwrap();
        assert_eq!(target, large);
    }

    #[test]
    fn rgba_image_conversion_keeps_pixels() {
        let bitmap = Bitmap::solid(IconSize::MINI, [10, 20, 30, 40]).unwrap();
        let image = bitmap.to_rgba_image().unwrap();
        assert_eq!(image.get_pixel(3, 5).0, [10, 20, 30, 40]);
        assert_eq!(Bitmap::from_rgba_image(&image), bitmap);

        let gray = Bitmap::square(IconSize::MINI, ColorSpace::Gray8).unwrap();
        assert!(gray.to_rgba_image().is_none());
    }

    #[test]
    fn mini_threshold() {
        assert!(IconSize::MINI.is_mini());
        assert!(IconSize::new(12).is_mini());
        assert!(!IconSize::LARGE.is_mini());
        assert!(!IconSize::new(48).is_mini());
    }
}
