// src/camera.rs
//! Viewing volumes.
//!
//! The pipeline only needs a view matrix, a projection matrix and a
//! per-frame rendering signal from its camera collaborator, so that is the
//! whole trait. `PerspectiveCamera` is the standard implementation;
//! `StereoCamera` keeps a left/right eye pair offset along the camera's
//! local right axis for the stereo canvases.

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Mat4, Quat, Vec3};

pub type CameraRef = Rc<RefCell<dyn ViewingVolume>>;

pub trait ViewingVolume {
    fn view_matrix(&self) -> Mat4;
    fn projection_matrix(&self) -> Mat4;

    /// Called once per 3D canvas render with the frame's elapsed time in
    /// seconds.
    fn signal_rendering(&mut self, _dt: f32) {}
}

pub struct PerspectiveCamera {
    position: Vec3,
    orientation: Quat,
    fovy: f32,
    aspect: f32,
    znear: f32,
    zfar: f32,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            fovy: std::f32::consts::FRAC_PI_4,
            aspect: 4.0 / 3.0,
            znear: 0.1,
            zfar: 3000.0,
        }
    }
}

impl PerspectiveCamera {
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    pub fn set_orientation(&mut self, orientation: Quat) {
        self.orientation = orientation;
    }

    pub fn set_fov(&mut self, fovy: f32) {
        self.fovy = fovy;
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn set_clip(&mut self, znear: f32, zfar: f32) {
        self.znear = znear;
        self.zfar = zfar;
    }
}

impl ViewingVolume for PerspectiveCamera {
    fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position).inverse()
    }

    fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// A camera pair for stereoscopic rendering. The left and right eye
/// volumes sit at ±half the eye distance along the camera's local right
/// vector and share its orientation; they are recomputed whenever the
/// position, orientation or eye distance changes.
pub struct StereoCamera {
    eye_distance: f32,
    center: PerspectiveCamera,
    left: Rc<RefCell<PerspectiveCamera>>,
    right: Rc<RefCell<PerspectiveCamera>>,
}

impl StereoCamera {
    pub fn new() -> Rc<RefCell<Self>> {
        let cam = Self {
            eye_distance: 5.0,
            center: PerspectiveCamera::default(),
            left: PerspectiveCamera::new(),
            right: PerspectiveCamera::new(),
        };
        let cam = Rc::new(RefCell::new(cam));
        cam.borrow_mut().update_eyes();
        cam
    }

    pub fn left(&self) -> Rc<RefCell<PerspectiveCamera>> {
        self.left.clone()
    }

    pub fn right(&self) -> Rc<RefCell<PerspectiveCamera>> {
        self.right.clone()
    }

    pub fn eye_distance(&self) -> f32 {
        self.eye_distance
    }

    pub fn set_eye_distance(&mut self, distance: f32) {
        self.eye_distance = distance;
        self.update_eyes();
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.center.set_position(position);
        self.update_eyes();
    }

    pub fn set_orientation(&mut self, orientation: Quat) {
        self.center.set_orientation(orientation);
        self.update_eyes();
    }

    pub fn set_fov(&mut self, fovy: f32) {
        self.center.set_fov(fovy);
        self.left.borrow_mut().set_fov(fovy);
        self.right.borrow_mut().set_fov(fovy);
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.center.set_aspect(aspect);
        self.left.borrow_mut().set_aspect(aspect);
        self.right.borrow_mut().set_aspect(aspect);
    }

    fn update_eyes(&mut self) {
        let half = 0.5 * self.eye_distance;
        let pos = self.center.position();
        let rot = self.center.orientation();
        let mut left = self.left.borrow_mut();
        left.set_position(pos + rot * Vec3::new(-half, 0.0, 0.0));
        left.set_orientation(rot);
        let mut right = self.right.borrow_mut();
        right.set_position(pos + rot * Vec3::new(half, 0.0, 0.0));
        right.set_orientation(rot);
    }
}

impl ViewingVolume for StereoCamera {
    fn view_matrix(&self) -> Mat4 {
        self.center.view_matrix()
    }

    fn projection_matrix(&self) -> Mat4 {
        self.center.projection_matrix()
    }

    fn signal_rendering(&mut self, dt: f32) {
        self.left.borrow_mut().signal_rendering(dt);
        self.right.borrow_mut().signal_rendering(dt);
        self.center.signal_rendering(dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_eyes_offset_along_local_right() {
        let cam = StereoCamera::new();
        cam.borrow_mut().set_eye_distance(2.0);
        cam.borrow_mut().set_position(Vec3::new(0.0, 0.0, 10.0));

        let cam = cam.borrow();
        assert_eq!(cam.left().borrow().position(), Vec3::new(-1.0, 0.0, 10.0));
        assert_eq!(cam.right().borrow().position(), Vec3::new(1.0, 0.0, 10.0));
    }

    #[test]
    fn stereo_eyes_follow_orientation() {
        let cam = StereoCamera::new();
        cam.borrow_mut().set_eye_distance(2.0);
        // quarter turn around Y: local right becomes -Z
        cam.borrow_mut()
            .set_orientation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));

        let left = cam.borrow().left().borrow().position();
        assert!((left - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-5);
    }
}
