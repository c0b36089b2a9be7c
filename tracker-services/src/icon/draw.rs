// SPDX-License-Identifier: LGPL-3.0-only
//! Drawing surface abstraction used by the icon cache.

use crate::icon::bitmap::{Bitmap, ColorSpace, Point};

/// How drawn pixels combine with the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawingMode {
    /// Replace destination pixels.
    #[default]
    Copy,
    /// Replace destination pixels except transparent ones.
    Over,
    /// Blend using alpha.
    Alpha,
}

/// Where blending takes its alpha value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlphaSource {
    /// The view's high color.
    Constant,
    /// Each source pixel.
    Pixel,
}

/// How alpha blending combines colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlphaFunction {
    /// Blend the source over the destination.
    Overlay,
    /// Composite alpha values as well.
    Composite,
}

/// A view icons can be drawn into.
pub trait DrawTarget {
    /// Current drawing mode.
    fn drawing_mode(&self) -> DrawingMode;

    /// Change the drawing mode.
    fn set_drawing_mode(&mut self, mode: DrawingMode);

    /// Configure alpha blending.
    fn set_blending_mode(&mut self, source: AlphaSource, function: AlphaFunction);

    /// Draw and wait for the drawing to finish.
    fn draw_bitmap(&mut self, bitmap: &Bitmap, location: Point);

    /// Queue a draw; `bitmap` may be read after this returns.
    fn draw_bitmap_async(&mut self, bitmap: &Bitmap, location: Point);
}

/// Draw `bitmap`, picking a drawing mode that matches its color space.
///
/// The view's previous drawing mode is restored afterwards.
pub(crate) fn draw_icon(
    bitmap: &Bitmap,
    view: &mut dyn DrawTarget,
    location: Point,
    asynchronous: bool,
) {
    let previous = view.drawing_mode();
    if bitmap.color_space() == ColorSpace::Rgba32 {
        if previous != DrawingMode::Alpha {
            view.set_drawing_mode(DrawingMode::Alpha);
            view.set_blending_mode(AlphaSource::Pixel, AlphaFunction::Overlay);
        }
    } else {
        view.set_drawing_mode(DrawingMode::Over);
    }

    if asynchronous {
        view.draw_bitmap_async(bitmap, location);
    } else {
        view.draw_bitmap(bitmap, location);
    }

    view.set_drawing_mode(previous);
}

/// Recording [DrawTarget] for tests and headless use.
#[derive(Debug, Default)]
pub struct RecordingTarget {
    mode: DrawingMode,
    /// Every draw, in order.
    pub draws: Vec<RecordedDraw>,
}

/// One draw seen by a [RecordingTarget].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    /// Drawn bitmap.
    pub bitmap: Bitmap,
    /// Location in view coordinates.
    pub location: Point,
    /// Drawing mode in effect.
    pub mode: DrawingMode,
    /// Whether the draw was queued.
    pub asynchronous: bool,
}

impl RecordingTarget {
    /// Target starting in `mode`.
    pub fn new(mode: DrawingMode) -> Self {
        Self {
            mode,
            draws: Vec::new(),
        }
    }

    fn record(&mut self, bitmap: &Bitmap, location: Point, asynchronous: bool) {
        self.draws.push(RecordedDraw {
            bitmap: bitmap.clone(),
            location,
            mode: self.mode,
            asynchronous,
        });
    }
}

impl DrawTarget for RecordingTarget {
    fn drawing_mode(&self) -> DrawingMode {
        self.mode
    }

    fn set_drawing_mode(&mut self, mode: DrawingMode) {
        self.mode = mode;
    }

    fn set_blending_mode(&mut self, _source: AlphaSource, _function: AlphaFunction) {}

    fn draw_bitmap(&mut self, bitmap: &Bitmap, location: Point) {
        self.record(bitmap, location, false);
    }

    fn draw_bitmap_async(&mut self, bitmap: &Bitmap, location: Point) {
        self.record(bitmap, location, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icon::bitmap::IconSize;

    #[test]
    fn rgba_draws_in_alpha_mode_and_restores() {
        let bitmap = Bitmap::solid(IconSize::MINI, [1, 2, 3, 255]).unwrap();
        let mut view = RecordingTarget::new(DrawingMode::Copy);

        draw_icon(&bitmap, &mut view, Point::new(4.0, 5.0), true);

        assert_eq!(view.drawing_mode(), DrawingMode::Copy);
        assert_eq!(view.draws.len(), 1);
        assert_eq!(view.draws[0].mode, DrawingMode::Alpha);
        assert!(view.draws[0].asynchronous);
        assert_eq!(view.draws[0].location, Point::new(4.0, 5.0));
    }

    #[test]
    fn palette_bitmaps_draw_over() {
        let bitmap = Bitmap::square(IconSize::MINI, ColorSpace::Cmap8).unwrap();
        let mut view = RecordingTarget::new(DrawingMode::Alpha);

        draw_icon(&bitmap, &mut view, Point::origin(), false);

        assert_eq!(view.draws[0].mode, DrawingMode::Over);
        assert!(!view.draws[0].asynchronous);
        assert_eq!(view.drawing_mode(), DrawingMode::Alpha);
    }
}
