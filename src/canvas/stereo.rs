// src/canvas/stereo.rs
//! Stereoscopic canvases.
//!
//! A stereo canvas is a composite of exactly two 3D canvases, one per eye,
//! each bound to one half of a shared [`StereoCamera`]. The concrete
//! layouts are placement policies: side-by-side split for dual projector
//! setups, tinted anaglyph for red/cyan glasses.

use std::cell::RefCell;
use std::rc::Rc;

use crate::camera::{CameraRef, StereoCamera};
use crate::color::RgbaColor;
use crate::resources::CubemapRef;
use crate::scene::NodeRef;

use super::{Canvas3d, CanvasRef, CompositeCanvas};

pub struct StereoCanvas {
    canvas: CanvasRef,
    left: CanvasRef,
    right: CanvasRef,
    camera: Rc<RefCell<StereoCamera>>,
}

impl StereoCanvas {
    /// Side-by-side split: each eye renders at half width, the right eye
    /// placed at the horizontal midpoint.
    pub fn split(width: u32, height: u32, camera: Rc<RefCell<StereoCamera>>) -> Self {
        let stereo = Self::with_eyes(width, height, width / 2, height, camera);
        {
            let mut guard = stereo.canvas.borrow_mut();
            let comp = guard.as_composite_mut().unwrap();
            comp.add_placement(&stereo.left, 0, 0);
            comp.add_placement(&stereo.right, width as i32 / 2, 0);
        }
        stereo
    }

    /// Red/cyan anaglyph: both eyes render full size and blend on top of
    /// each other, the left tinted cyan at full opacity, the right tinted
    /// red at half opacity.
    pub fn anaglyph(width: u32, height: u32, camera: Rc<RefCell<StereoCamera>>) -> Self {
        let stereo = Self::with_eyes(width, height, width, height, camera);
        {
            let mut guard = stereo.canvas.borrow_mut();
            let comp = guard.as_composite_mut().unwrap();
            let left = comp.add_placement(&stereo.left, 0, 0);
            left.color = RgbaColor::CYAN;
            left.opacity = 1.0;
            let right = comp.add_placement(&stereo.right, 0, 0);
            right.color = RgbaColor::RED;
            right.opacity = 0.5;
        }
        stereo
    }

    fn with_eyes(
        width: u32,
        height: u32,
        eye_width: u32,
        eye_height: u32,
        camera: Rc<RefCell<StereoCamera>>,
    ) -> Self {
        let canvas = CompositeCanvas::new(width, height);
        let left = Canvas3d::new(eye_width, eye_height);
        let right = Canvas3d::new(eye_width, eye_height);
        {
            let cam = camera.borrow();
            let left_cam: CameraRef = cam.left();
            let right_cam: CameraRef = cam.right();
            left.borrow_mut().as_scene_mut().unwrap().set_camera(left_cam);
            right.borrow_mut().as_scene_mut().unwrap().set_camera(right_cam);
        }
        Self {
            canvas,
            left,
            right,
            camera,
        }
    }

    /// The composite canvas to hand to the renderer.
    pub fn canvas(&self) -> CanvasRef {
        self.canvas.clone()
    }

    pub fn left(&self) -> CanvasRef {
        self.left.clone()
    }

    pub fn right(&self) -> CanvasRef {
        self.right.clone()
    }

    pub fn camera(&self) -> Rc<RefCell<StereoCamera>> {
        self.camera.clone()
    }

    /// Bind both eyes to the same scene root.
    pub fn set_scene(&self, scene: NodeRef) {
        for eye in [&self.left, &self.right] {
            eye.borrow_mut().as_scene_mut().unwrap().set_scene(scene.clone());
        }
    }

    pub fn set_skybox(&self, skybox: CubemapRef) {
        for eye in [&self.left, &self.right] {
            eye.borrow_mut().as_scene_mut().unwrap().set_skybox(skybox.clone());
        }
    }

    pub fn set_background(&self, color: RgbaColor) {
        for eye in [&self.left, &self.right] {
            eye.borrow_mut().as_scene_mut().unwrap().background = color;
        }
        self.canvas.borrow_mut().as_composite_mut().unwrap().background = color;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_places_eyes_side_by_side() {
        let stereo = StereoCanvas::split(200, 100, StereoCamera::new());
        let canvas = stereo.canvas();
        let guard = canvas.borrow();
        let comp = guard.as_composite().unwrap();
        assert_eq!(comp.placements().len(), 2);
        assert_eq!((comp.placements()[0].x, comp.placements()[0].y), (0, 0));
        assert_eq!((comp.placements()[1].x, comp.placements()[1].y), (100, 0));
        assert_eq!(stereo.left().borrow().width(), 100);
    }

    #[test]
    fn anaglyph_tints_eyes() {
        let stereo = StereoCanvas::anaglyph(100, 100, StereoCamera::new());
        let canvas = stereo.canvas();
        let guard = canvas.borrow();
        let comp = guard.as_composite().unwrap();
        assert_eq!(comp.placements()[0].color, RgbaColor::CYAN);
        assert_eq!(comp.placements()[1].color, RgbaColor::RED);
        assert_eq!(comp.placements()[1].opacity, 0.5);
    }

    #[test]
    fn eyes_share_the_stereo_camera_halves() {
        let camera = StereoCamera::new();
        camera.borrow_mut().set_eye_distance(4.0);
        let stereo = StereoCanvas::split(200, 100, camera.clone());
        let left_canvas = stereo.left();
        let guard = left_canvas.borrow();
        let scene = guard.as_scene().unwrap();
        assert!(scene.camera().is_some());
    }
}
