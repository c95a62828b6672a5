// src/canvas/mod.rs
//! Canvas composition model.
//!
//! A canvas is an abstract drawable surface. Three concrete kinds exist:
//! a static image, a 3D viewport over a scene, and a composite that blends
//! other canvases through placements. The set is a closed sum type, so an
//! unhandled canvas kind is a compile error rather than a runtime skip.
//! Stereo pairs and cross-fades are composite-building policies layered on
//! top (see [`stereo`] and [`fade`]).

pub mod composite;
pub mod fade;
pub mod stereo;

pub use composite::{CompositeCanvas, Placement};
pub use fade::FadeCanvas;
pub use stereo::StereoCanvas;

use std::cell::RefCell;
use std::rc::Rc;

use crate::camera::CameraRef;
use crate::color::RgbaColor;
use crate::error::Result;
use crate::resources::{next_id, ColorFormat, CubemapRef, TextureRef};
use crate::scene::NodeRef;

/// Identity of a canvas; keys the render-target cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanvasId(pub(crate) u64);

impl CanvasId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

pub type CanvasRef = Rc<RefCell<Canvas>>;

pub enum Canvas {
    Image(ImageCanvas),
    Scene(Canvas3d),
    Composite(CompositeCanvas),
}

impl Canvas {
    pub fn id(&self) -> CanvasId {
        match self {
            Canvas::Image(c) => c.id,
            Canvas::Scene(c) => c.id,
            Canvas::Composite(c) => c.id(),
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            Canvas::Image(c) => c.width(),
            Canvas::Scene(c) => c.width,
            Canvas::Composite(c) => c.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Canvas::Image(c) => c.height(),
            Canvas::Scene(c) => c.height,
            Canvas::Composite(c) => c.height(),
        }
    }

    pub fn color_format(&self) -> ColorFormat {
        match self {
            Canvas::Image(c) => c.color_format(),
            Canvas::Scene(c) => c.format,
            Canvas::Composite(c) => c.color_format(),
        }
    }

    pub fn as_scene(&self) -> Option<&Canvas3d> {
        match self {
            Canvas::Scene(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_scene_mut(&mut self) -> Option<&mut Canvas3d> {
        match self {
            Canvas::Scene(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_composite(&self) -> Option<&CompositeCanvas> {
        match self {
            Canvas::Composite(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_composite_mut(&mut self) -> Option<&mut CompositeCanvas> {
        match self {
            Canvas::Composite(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageCanvas> {
        match self {
            Canvas::Image(c) => Some(c),
            _ => None,
        }
    }
}

/// Type-directed canvas dispatch. Implemented by the renderer; the
/// dispatch in [`accept`] is exhaustive over the canvas sum type.
pub trait CanvasVisitor {
    fn visit_image(&mut self, canvas: &CanvasRef) -> Result<()>;
    fn visit_scene(&mut self, canvas: &CanvasRef) -> Result<()>;
    fn visit_composite(&mut self, canvas: &CanvasRef) -> Result<()>;
}

enum Kind {
    Image,
    Scene,
    Composite,
}

/// Dispatch a canvas to the visitor hook for its kind. The canvas borrow
/// is released before the hook runs so the visitor may re-borrow.
pub fn accept<V: CanvasVisitor + ?Sized>(canvas: &CanvasRef, visitor: &mut V) -> Result<()> {
    let kind = match &*canvas.borrow() {
        Canvas::Image(_) => Kind::Image,
        Canvas::Scene(_) => Kind::Scene,
        Canvas::Composite(_) => Kind::Composite,
    };
    match kind {
        Kind::Image => visitor.visit_image(canvas),
        Kind::Scene => visitor.visit_scene(canvas),
        Kind::Composite => visitor.visit_composite(canvas),
    }
}

/// Render each distinct child of a composite exactly once, in placement
/// insertion order. Children referenced by several placements are visited
/// on their first placement only (the per-frame visited set).
pub fn accept_children<V: CanvasVisitor + ?Sized>(
    composite: &CanvasRef,
    visitor: &mut V,
) -> Result<()> {
    let children = {
        let mut guard = composite.borrow_mut();
        let comp = guard
            .as_composite_mut()
            .expect("accept_children on a non-composite canvas");
        comp.begin_frame_children()
    };
    for child in children {
        accept(&child, visitor)?;
    }
    Ok(())
}

/// A canvas whose content is a single static texture.
pub struct ImageCanvas {
    id: CanvasId,
    texture: TextureRef,
}

impl ImageCanvas {
    pub fn new(texture: TextureRef) -> CanvasRef {
        Rc::new(RefCell::new(Canvas::Image(Self {
            id: CanvasId(next_id()),
            texture,
        })))
    }

    pub fn width(&self) -> u32 {
        self.texture.borrow().width()
    }

    pub fn height(&self) -> u32 {
        self.texture.borrow().height()
    }

    pub fn color_format(&self) -> ColorFormat {
        self.texture.borrow().color_format()
    }

    pub fn texture(&self) -> &TextureRef {
        &self.texture
    }
}

/// A viewport into a 3D scene: camera, scene root, background color and an
/// optional skybox cubemap. Camera and scene may be rebound at any time.
pub struct Canvas3d {
    id: CanvasId,
    pub width: u32,
    pub height: u32,
    pub format: ColorFormat,
    pub background: RgbaColor,
    camera: Option<CameraRef>,
    scene: Option<NodeRef>,
    skybox: Option<CubemapRef>,
}

impl Canvas3d {
    pub fn new(width: u32, height: u32) -> CanvasRef {
        Rc::new(RefCell::new(Canvas::Scene(Self {
            id: CanvasId(next_id()),
            width,
            height,
            format: ColorFormat::Rgba,
            background: RgbaColor::BLACK,
            camera: None,
            scene: None,
            skybox: None,
        })))
    }

    pub fn id(&self) -> CanvasId {
        self.id
    }

    pub fn camera(&self) -> Option<&CameraRef> {
        self.camera.as_ref()
    }

    pub fn set_camera(&mut self, camera: CameraRef) {
        self.camera = Some(camera);
    }

    pub fn scene(&self) -> Option<&NodeRef> {
        self.scene.as_ref()
    }

    pub fn set_scene(&mut self, scene: NodeRef) {
        self.scene = Some(scene);
    }

    pub fn skybox(&self) -> Option<&CubemapRef> {
        self.skybox.as_ref()
    }

    pub fn set_skybox(&mut self, skybox: CubemapRef) {
        self.skybox = Some(skybox);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::Texture2d;

    #[test]
    fn image_canvas_takes_texture_dimensions() {
        let tex = Texture2d::from_pixels(8, 4, ColorFormat::Rgb, vec![0; 8 * 4 * 3]);
        let canvas = ImageCanvas::new(tex);
        let canvas = canvas.borrow();
        assert_eq!(canvas.width(), 8);
        assert_eq!(canvas.height(), 4);
        assert_eq!(canvas.color_format(), ColorFormat::Rgb);
    }

    #[test]
    fn accept_dispatches_by_kind() {
        struct Tally {
            images: u32,
            scenes: u32,
        }
        impl CanvasVisitor for Tally {
            fn visit_image(&mut self, _: &CanvasRef) -> Result<()> {
                self.images += 1;
                Ok(())
            }
            fn visit_scene(&mut self, _: &CanvasRef) -> Result<()> {
                self.scenes += 1;
                Ok(())
            }
            fn visit_composite(&mut self, _: &CanvasRef) -> Result<()> {
                Ok(())
            }
        }

        let mut tally = Tally { images: 0, scenes: 0 };
        let tex = Texture2d::from_pixels(1, 1, ColorFormat::Rgba, vec![0; 4]);
        accept(&ImageCanvas::new(tex), &mut tally).unwrap();
        accept(&Canvas3d::new(4, 4), &mut tally).unwrap();
        assert_eq!((tally.images, tally.scenes), (1, 1));
    }
}
