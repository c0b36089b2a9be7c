// SPDX-License-Identifier: LGPL-3.0-only
//! Pixel transform turning a normal icon into its selected variant.

use crate::icon::bitmap::{Bitmap, ColorSpace, TRANSPARENT_8_BIT};

/// Default brightness factor for 32-bit selected icons, out of 256.
pub const DEFAULT_SELECTED_BRIGHTNESS: u16 = 168;

/// Default tint applied to palette colors for 8-bit selected icons.
pub const DEFAULT_HIGHLIGHT_TINT: f32 = 1.3;

/// Produces the selected variant of a bitmap.
pub trait IconTransform: Send + Sync {
    /// Fill `target` with the selected variant of `normal`.
    ///
    /// Returns `false` if the two bitmaps differ in size or color space, in
    /// which case `target` is left untouched.
    fn make_selected(&self, normal: &Bitmap, target: &mut Bitmap) -> bool;
}

/// The 256 color palette 8-bit bitmaps index into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: [[u8; 3]; 256],
}

impl Palette {
    /// Web-safe color cube followed by a gray ramp; the last index is the
    /// transparent color.
    pub fn system() -> Self {
        const LEVELS: [u8; 6] = [0, 51, 102, 153, 204, 255];

        let mut colors = [[0u8; 3]; 256];
        let mut index = 0;
        for red in LEVELS {
            for green in LEVELS {
                for blue in LEVELS {
                    colors[index] = [red, green, blue];
                    index += 1;
                }
            }
        }

        let grays = usize::from(TRANSPARENT_8_BIT) - index;
        for step in 0..grays {
            let level = (step * 255 / (grays - 1)) as u8;
            colors[index] = [level, level, level];
            index += 1;
        }

        colors[usize::from(TRANSPARENT_8_BIT)] = [0x77, 0x74, 0x77];
        Self { colors }
    }

    /// Build from explicit colors.
    pub fn from_colors(colors: [[u8; 3]; 256]) -> Self {
        Self { colors }
    }

    /// Color at `index`.
    pub fn color(&self, index: u8) -> [u8; 3] {
        self.colors[usize::from(index)]
    }

    /// Closest opaque palette entry to `color`.
    pub fn index_for_color(&self, color: [u8; 3]) -> u8 {
        let distance = |candidate: &[u8; 3]| -> u32 {
            candidate
                .iter()
                .zip(color.iter())
                .map(|(&a, &b)| {
                    let delta = i32::from(a) - i32::from(b);
                    (delta * delta) as u32
                })
                .sum()
        };

        self.colors
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != usize::from(TRANSPARENT_8_BIT))
            .min_by_key(|(_, candidate)| distance(candidate))
            .map_or(0, |(index, _)| index as u8)
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::system()
    }
}

/// Lighten (`tint < 1`) or darken (`tint > 1`) a color.
pub fn tint_color(color: [u8; 3], tint: f32) -> [u8; 3] {
    color.map(|channel| {
        let channel = f32::from(channel);
        let tinted = if tint < 1.0 {
            255.0 - (255.0 - channel) * tint
        } else {
            channel * (2.0 - tint)
        };
        tinted.clamp(0.0, 255.0) as u8
    })
}

/// Darkens 32-bit icons and remaps 8-bit icons through a tinted palette.
#[derive(Debug, Clone)]
pub struct HighlightTransform {
    highlight_table: [u8; 256],
    brightness: u32,
}

impl HighlightTransform {
    /// Build the 8-bit highlight table from `palette`.
    pub fn new(palette: &Palette, tint: f32, brightness: u16) -> Self {
        let mut highlight_table = [0u8; 256];
        for (index, slot) in highlight_table.iter_mut().enumerate() {
            let index = index as u8;
            *slot = if index == TRANSPARENT_8_BIT {
                TRANSPARENT_8_BIT
            } else {
                palette.index_for_color(tint_color(palette.color(index), tint))
            };
        }

        Self {
            highlight_table,
            brightness: u32::from(brightness).min(256),
        }
    }

    /// Palette index an 8-bit pixel maps to when selected.
    pub fn highlight_index(&self, index: u8) -> u8 {
        self.highlight_table[usize::from(index)]
    }
}

impl Default for HighlightTransform {
    fn default() -> Self {
        Self::new(
            &Palette::system(),
            DEFAULT_HIGHLIGHT_TINT,
            DEFAULT_SELECTED_BRIGHTNESS,
        )
    }
}

impl IconTransform for HighlightTransform {
    fn make_selected(&self, normal: &Bitmap, target: &mut Bitmap) -> bool {
        if !normal.same_format(target) {
            log::debug!(
                "Cannot build selected icon: {:?} {}x{} into {:?} {}x{}",
                normal.color_space(),
                normal.width(),
                normal.height(),
                target.color_space(),
                target.width(),
                target.height()
            );
            return false;
        }

        match normal.color_space() {
            ColorSpace::Rgba32 | ColorSpace::Rgb32 => {
                for (source, destination) in normal
                    .bits()
                    .chunks_exact(4)
                    .zip(target.bits_mut().chunks_exact_mut(4))
                {
                    for channel in 0..3 {
                        destination[channel] =
                            ((u32::from(source[channel]) * self.brightness) >> 8) as u8;
                    }
                    destination[3] = source[3];
                }
            }
            ColorSpace::Cmap8 => {
                for (source, destination) in normal.bits().iter().zip(target.bits_mut()) {
                    *destination = self.highlight_index(*source);
                }
            }
            ColorSpace::Gray8 => target.bits_mut().fill(0),
        }
        true
    }
}
