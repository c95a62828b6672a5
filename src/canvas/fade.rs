// src/canvas/fade.rs
//! Cross-fades between canvases, driven by per-frame ticks that animate
//! placement opacity.

use crate::canvas::{CanvasRef, CompositeCanvas};

pub struct FadeCanvas {
    canvas: CanvasRef,
    duration: f32,
    progress: f32,
    fading: bool,
}

impl FadeCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: CompositeCanvas::new(width, height),
            duration: 0.0,
            progress: 0.0,
            fading: false,
        }
    }

    pub fn canvas(&self) -> CanvasRef {
        self.canvas.clone()
    }

    pub fn is_fading(&self) -> bool {
        self.fading
    }

    /// Fade `canvas` in from fully transparent, replacing whatever was
    /// shown before.
    pub fn fade_in(&mut self, canvas: &CanvasRef, duration: f32) {
        self.progress = 0.0;
        self.duration = duration;
        self.fading = true;
        let mut guard = self.canvas.borrow_mut();
        let comp = guard.as_composite_mut().unwrap();
        comp.clear_placements();
        comp.add_placement(canvas, 0, 0).opacity = 0.0;
    }

    /// Cross-fade from the currently shown canvas to `canvas`.
    pub fn fade_to(&mut self, canvas: &CanvasRef, duration: f32) {
        self.progress = 0.0;
        self.duration = duration;
        self.fading = true;
        let mut guard = self.canvas.borrow_mut();
        let comp = guard.as_composite_mut().unwrap();
        comp.add_placement(canvas, 0, 0).opacity = 0.0;
    }

    /// Advance the fade by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        if !self.fading {
            return;
        }
        self.progress += dt;
        let scale = (self.progress / self.duration).min(1.0);

        let mut guard = self.canvas.borrow_mut();
        let comp = guard.as_composite_mut().unwrap();
        if comp.placements().is_empty() {
            self.fading = false;
            return;
        }
        if comp.placements().len() > 1 {
            comp.placements_mut()[0].opacity = 1.0 - scale;
            comp.placements_mut()[1].opacity = scale;
        } else {
            comp.placements_mut()[0].opacity = scale;
        }

        if self.progress >= self.duration {
            self.fading = false;
            // the faded-out canvas is no longer shown
            if comp.placements().len() > 1 {
                comp.remove_placement(0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas3d;

    #[test]
    fn fade_in_ramps_opacity_to_one() {
        let mut fade = FadeCanvas::new(10, 10);
        let child = Canvas3d::new(10, 10);
        fade.fade_in(&child, 2.0);

        fade.update(1.0);
        {
            let canvas = fade.canvas();
            let guard = canvas.borrow();
            assert_eq!(guard.as_composite().unwrap().placements()[0].opacity, 0.5);
        }
        fade.update(1.0);
        assert!(!fade.is_fading());
        let canvas = fade.canvas();
        let guard = canvas.borrow();
        assert_eq!(guard.as_composite().unwrap().placements()[0].opacity, 1.0);
    }

    #[test]
    fn fade_to_removes_old_canvas_when_done() {
        let mut fade = FadeCanvas::new(10, 10);
        let a = Canvas3d::new(10, 10);
        let b = Canvas3d::new(10, 10);
        fade.fade_in(&a, 0.5);
        fade.update(1.0);

        fade.fade_to(&b, 1.0);
        fade.update(0.5);
        {
            let canvas = fade.canvas();
            let guard = canvas.borrow();
            let comp = guard.as_composite().unwrap();
            assert_eq!(comp.placements().len(), 2);
            assert_eq!(comp.placements()[0].opacity, 0.5);
            assert_eq!(comp.placements()[1].opacity, 0.5);
        }
        fade.update(0.5);
        let canvas = fade.canvas();
        let guard = canvas.borrow();
        let comp = guard.as_composite().unwrap();
        assert_eq!(comp.placements().len(), 1);
        assert_eq!(comp.placements()[0].canvas.borrow().id(), b.borrow().id());
    }
}
