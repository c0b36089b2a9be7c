// SPDX-License-Identifier: LGPL-3.0-only
//! Application-bundled icon resources.

use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;

use crate::icon::bitmap::{Bitmap, ColorSpace, IconSize};
use crate::icon::error::IconError;
use crate::icon::provider::{ResourceIcon, TrackerResources};

#[derive(Clone, Copy)]
enum Glyph {
    Page,
    Folder,
    Disk,
}

fn glyph_for(id: ResourceIcon) -> (Glyph, [u8; 3]) {
    match id {
        ResourceIcon::File => (Glyph::Page, [0xf0, 0xf0, 0xf0]),
        ResourceIcon::Share => (Glyph::Disk, [0x60, 0x90, 0xd0]),
        ResourceIcon::BootVolume => (Glyph::Disk, [0xa0, 0xa0, 0xa8]),
        ResourceIcon::BeosFolder => (Glyph::Folder, [0x50, 0x70, 0xc0]),
        ResourceIcon::HomeDir => (Glyph::Folder, [0xe0, 0x90, 0x40]),
        ResourceIcon::FontDir => (Glyph::Folder, [0xb0, 0x60, 0xb0]),
        ResourceIcon::AppsDir => (Glyph::Folder, [0x40, 0xa0, 0x60]),
        ResourceIcon::PrefsDir => (Glyph::Folder, [0x90, 0x90, 0x40]),
        ResourceIcon::MailDir => (Glyph::Folder, [0xd0, 0x50, 0x50]),
        ResourceIcon::QueryDir => (Glyph::Folder, [0x40, 0x90, 0xa0]),
        ResourceIcon::DevelopDir => (Glyph::Folder, [0x70, 0x70, 0x70]),
        ResourceIcon::ConfigDir => (Glyph::Folder, [0x80, 0x60, 0x40]),
        ResourceIcon::PersonDir => (Glyph::Folder, [0xd0, 0xa0, 0x80]),
        ResourceIcon::DownloadDir => (Glyph::Folder, [0x40, 0x60, 0xe0]),
    }
}

fn inside(glyph: Glyph, x: u32, y: u32, size: u32) -> bool {
    let margin = size / 8;
    let far = size - 1 - margin;
    match glyph {
        Glyph::Page => {
            // Dog-eared sheet.
            let fold = size / 4;
            x >= margin + size / 16
                && x <= far - size / 16
                && y <= far
                && !(x + y > far - size / 16 + fold && y < fold)
        }
        Glyph::Folder => {
            let tab = y >= margin && y < margin + size / 8 && x >= margin && x < size / 2;
            let body = y >= margin + size / 8 && y <= far && x >= margin && x <= far;
            tab || body
        }
        Glyph::Disk => y >= size / 4 && y <= far && x >= margin && x <= far,
    }
}

/// Icons drawn in code; never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinResources;

impl BuiltinResources {
    /// Draw resource `id` at `size`.
    pub fn render(id: ResourceIcon, size: IconSize) -> Result<Bitmap, IconError> {
        let (glyph, color) = glyph_for(id);
        let pixels = size.pixels();
        let border = color.map(|channel| channel / 2);

        let mut bitmap = Bitmap::square(size, ColorSpace::Rgba32)?;
        let row = bitmap.bytes_per_row();
        let bits = bitmap.bits_mut();
        for y in 0..pixels {
            for x in 0..pixels {
                if !inside(glyph, x, y, pixels) {
                    continue;
                }
                let edge = [(1, 0), (0, 1)].iter().any(|&(dx, dy)| {
                    x < dx
                        || y < dy
                        || x + dx >= pixels
                        || y + dy >= pixels
                        || !inside(glyph, x - dx, y - dy, pixels)
                        || !inside(glyph, x + dx, y + dy, pixels)
                });
                let rgb = if edge { border } else { color };
                let offset = y as usize * row + x as usize * 4;
                bits[offset..offset + 3].copy_from_slice(&rgb);
                bits[offset + 3] = 0xff;
            }
        }
        Ok(bitmap)
    }
}

impl TrackerResources for BuiltinResources {
    fn icon_resource(
        &self,
        id: ResourceIcon,
        size: IconSize,
        target: &mut Bitmap,
    ) -> Result<(), IconError> {
        target.copy_from(&Self::render(id, size)?)
    }
}

/// Icons loaded from PNG files named `<name>-<size>.png` or `<name>.png`.
///
/// Files of another size are scaled to the requested size.
#[derive(Debug, Clone)]
pub struct DirectoryResources {
    root: PathBuf,
}

impl DirectoryResources {
    /// Resources under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory icons are looked up in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: ResourceIcon, size: IconSize) -> Option<PathBuf> {
        [
            format!("{}-{}.png", id.name(), size.pixels()),
            format!("{}.png", id.name()),
        ]
        .into_iter()
        .map(|file| self.root.join(file))
        .find(|path| path.is_file())
    }

    /// Load resource `id` at `size`.
    pub fn load(&self, id: ResourceIcon, size: IconSize) -> Result<Bitmap, IconError> {
        let path = self
            .path_for(id, size)
            .ok_or_else(|| IconError::NotFound(id.name().to_string()))?;
        log::debug!("Loading icon resource from {}", path.display());

        let bytes = fs::read(&path)?;
        let mut rgba = image::load_from_memory(&bytes)?.to_rgba8();
        if rgba.dimensions() != (size.pixels(), size.pixels()) {
            rgba = image::imageops::resize(&rgba, size.pixels(), size.pixels(), FilterType::Triangle);
        }
        Ok(Bitmap::from_rgba_image(&rgba))
    }
}

impl TrackerResources for DirectoryResources {
    fn icon_resource(
        &self,
        id: ResourceIcon,
        size: IconSize,
        target: &mut Bitmap,
    ) -> Result<(), IconError> {
        target.copy_from(&self.load(id, size)?)
    }
}
