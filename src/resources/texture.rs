// src/resources/texture.rs
//! Engine-side 2D texture objects.
//!
//! A texture describes its pixel layout and sampling parameters and may or
//! may not hold its pixels in CPU memory ("resident"). Textures backing
//! render targets never hold pixels; loadable textures can re-fetch theirs
//! through a pixel source so the cache can upload without permanently
//! pinning the CPU copy.

use std::cell::RefCell;
use std::rc::Rc;

use crate::event::Event;

use super::{next_id, TextureId};

/// Pixel layout of a texture or canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorFormat {
    Alpha,
    Luminance,
    LuminanceAlpha,
    Rgb,
    Bgr,
    Rgba,
    Bgra,
    Rgb32F,
    Rgba32F,
    Depth,
    RgbCompressed,
    RgbaCompressed,
}

impl ColorFormat {
    pub fn channels(self) -> u32 {
        match self {
            ColorFormat::Alpha | ColorFormat::Luminance | ColorFormat::Depth => 1,
            ColorFormat::LuminanceAlpha => 2,
            ColorFormat::Rgb | ColorFormat::Bgr | ColorFormat::Rgb32F | ColorFormat::RgbCompressed => 3,
            ColorFormat::Rgba
            | ColorFormat::Bgra
            | ColorFormat::Rgba32F
            | ColorFormat::RgbaCompressed => 4,
        }
    }

    /// Bytes per pixel as stored CPU-side. Compressed formats have no
    /// per-pixel size; callers fall back to the four-channel default.
    pub fn bytes_per_pixel(self) -> Option<u32> {
        match self {
            ColorFormat::Alpha | ColorFormat::Luminance => Some(1),
            ColorFormat::LuminanceAlpha => Some(2),
            ColorFormat::Rgb | ColorFormat::Bgr => Some(3),
            ColorFormat::Rgba | ColorFormat::Bgra | ColorFormat::Depth => Some(4),
            ColorFormat::Rgb32F => Some(12),
            ColorFormat::Rgba32F => Some(16),
            ColorFormat::RgbCompressed | ColorFormat::RgbaCompressed => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureWrap {
    Repeat,
    Clamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFilter {
    Nearest,
    Linear,
}

/// Rectangular sub-region of a texture, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Fired after a texture's pixels change; carries the dirty rectangle.
#[derive(Debug, Clone, Copy)]
pub struct TextureChange {
    pub region: Region,
}

pub type TextureRef = Rc<RefCell<Texture2d>>;

pub struct Texture2d {
    id: TextureId,
    width: u32,
    height: u32,
    format: ColorFormat,
    wrap: TextureWrap,
    filter: TextureFilter,
    mipmapping: bool,
    data: Option<Vec<u8>>,
    source: Option<Box<dyn FnMut() -> Vec<u8>>>,
    changed: Event<TextureChange>,
}

impl Texture2d {
    fn base(width: u32, height: u32, format: ColorFormat) -> Self {
        Self {
            id: TextureId(next_id()),
            width,
            height,
            format,
            wrap: TextureWrap::Repeat,
            filter: TextureFilter::Linear,
            mipmapping: false,
            data: None,
            source: None,
            changed: Event::new(),
        }
    }

    /// Texture with resident pixel data.
    pub fn from_pixels(width: u32, height: u32, format: ColorFormat, pixels: Vec<u8>) -> TextureRef {
        let mut tex = Self::base(width, height, format);
        tex.data = Some(pixels);
        Rc::new(RefCell::new(tex))
    }

    /// Texture without pixels, e.g. a render-target attachment. The GPU
    /// side is allocated at the given size; nothing is uploaded.
    pub fn sized(width: u32, height: u32, format: ColorFormat) -> TextureRef {
        Rc::new(RefCell::new(Self::base(width, height, format)))
    }

    /// Texture whose pixels can be (re)fetched on demand. Used by the
    /// cache's load/unload symmetry: if pixels are not resident at upload
    /// time they are pulled from the source and dropped again afterwards.
    pub fn with_source(
        width: u32,
        height: u32,
        format: ColorFormat,
        source: impl FnMut() -> Vec<u8> + 'static,
    ) -> TextureRef {
        let mut tex = Self::base(width, height, format);
        tex.source = Some(Box::new(source));
        Rc::new(RefCell::new(tex))
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn color_format(&self) -> ColorFormat {
        self.format
    }

    pub fn wrap(&self) -> TextureWrap {
        self.wrap
    }

    pub fn set_wrap(&mut self, wrap: TextureWrap) {
        self.wrap = wrap;
    }

    pub fn filter(&self) -> TextureFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: TextureFilter) {
        self.filter = filter;
    }

    pub fn mipmapping(&self) -> bool {
        self.mipmapping
    }

    pub fn set_mipmapping(&mut self, on: bool) {
        self.mipmapping = on;
    }

    pub fn is_resident(&self) -> bool {
        self.data.is_some()
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn pixels(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Pull pixels from the source if they are not already resident.
    pub fn load(&mut self) {
        if self.data.is_none() {
            if let Some(source) = self.source.as_mut() {
                self.data = Some(source());
            }
        }
    }

    /// Drop the CPU-side pixel copy.
    pub fn unload(&mut self) {
        self.data = None;
    }

    /// Overwrite a sub-region of the resident pixels and fire the change
    /// event. The region must lie inside the texture and `pixels` must be
    /// exactly `region.width * region.height` pixels of this format.
    pub fn write_pixels(&mut self, region: Region, pixels: &[u8]) {
        let bpp = self.format.bytes_per_pixel().unwrap_or(4) as usize;
        assert!(region.x + region.width <= self.width && region.y + region.height <= self.height);
        assert_eq!(pixels.len(), region.width as usize * region.height as usize * bpp);
        if let Some(data) = self.data.as_mut() {
            let stride = self.width as usize * bpp;
            let row_len = region.width as usize * bpp;
            for row in 0..region.height as usize {
                let dst = (region.y as usize + row) * stride + region.x as usize * bpp;
                let src = row * row_len;
                data[dst..dst + row_len].copy_from_slice(&pixels[src..src + row_len]);
            }
        }
        self.changed.notify(&TextureChange { region });
    }

    /// Replace the whole pixel buffer and fire a full-surface change.
    pub fn replace_pixels(&mut self, pixels: Vec<u8>) {
        self.data = Some(pixels);
        self.changed
            .notify(&TextureChange { region: Region::full(self.width, self.height) });
    }

    pub fn changed(&self) -> &Event<TextureChange> {
        &self.changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_pixels_patches_region_and_notifies() {
        let tex = Texture2d::from_pixels(4, 4, ColorFormat::Rgba, vec![0; 4 * 4 * 4]);
        let fired = Rc::new(std::cell::Cell::new(None));
        let fired2 = fired.clone();
        let _sub = tex.borrow().changed().attach(move |c| fired2.set(Some(c.region)));

        let region = Region { x: 1, y: 2, width: 2, height: 1 };
        tex.borrow_mut().write_pixels(region, &[255u8; 2 * 4]);

        assert_eq!(fired.get(), Some(region));
        let tex = tex.borrow();
        let data = tex.pixels().unwrap();
        // row 2, columns 1..3 now white
        assert_eq!(&data[(2 * 4 + 1) * 4..(2 * 4 + 3) * 4], &[255u8; 8]);
        assert_eq!(data[2 * 4 * 4], 0);
    }

    #[test]
    fn load_pulls_from_source_and_unload_drops() {
        let tex = Texture2d::with_source(1, 1, ColorFormat::Rgba, || vec![1, 2, 3, 4]);
        assert!(!tex.borrow().is_resident());
        tex.borrow_mut().load();
        assert_eq!(tex.borrow().pixels().unwrap(), &[1, 2, 3, 4]);
        tex.borrow_mut().unload();
        assert!(!tex.borrow().is_resident());
    }
}
