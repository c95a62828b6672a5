// src/effects/fxaa.rs
//! Fast approximate anti-aliasing as a postprocess quad.

use glam::Vec2;

use crate::driver::PrimitiveKind;
use crate::error::Result;
use crate::renderer::{FrameContext, PostEffect, FULLSCREEN_STRIP};
use crate::resources::{DataBuffer, Shader, ShaderRef};

const FULLSCREEN_VERT: &str = include_str!("../shaders/fullscreen.vert");
const FXAA_FRAG: &str = include_str!("../shaders/fxaa.frag");

pub struct FxaaEffect {
    shader: ShaderRef,
    active: bool,
}

impl Default for FxaaEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl FxaaEffect {
    pub fn new() -> Self {
        let shader = Shader::new(FULLSCREEN_VERT, FXAA_FRAG);
        shader
            .borrow_mut()
            .set_attribute("vertex", DataBuffer::from_vec2s(&FULLSCREEN_STRIP));
        Self {
            shader,
            active: true,
        }
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

impl PostEffect for FxaaEffect {
    fn run(&mut self, frame: &mut FrameContext<'_>) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        let (width, height) = {
            let guard = frame.canvas.borrow();
            (guard.width(), guard.height())
        };

        let source = super::flip_color_attachments(frame)?;
        {
            let mut sh = self.shader.borrow_mut();
            sh.set_texture("image", source);
            sh.set_uniform(
                "rcpFrame",
                Vec2::new(1.0 / width as f32, 1.0 / height as f32),
            );
        }

        frame.driver.set_depth_test(false);
        frame.driver.set_depth_write(false);
        frame.cache.apply(frame.driver, &self.shader)?;
        frame.driver.draw_arrays(PrimitiveKind::TriangleStrip, 0, 4);
        frame.cache.release(frame.driver, &self.shader);
        frame.driver.set_depth_write(true);
        frame.driver.set_depth_test(true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::PerspectiveCamera;
    use crate::canvas::{Canvas3d, CompositeCanvas};
    use crate::driver::trace::{TraceCommand, TraceDriver};
    use crate::renderer::Renderer;
    use crate::scene::{add_child, Material, Mesh, PointLight, SceneNode};
    use std::rc::Rc;

    fn nested_scene_canvas() -> (crate::canvas::CanvasRef, crate::canvas::CanvasRef) {
        let scene = SceneNode::group();
        add_child(&scene, SceneNode::point_light(PointLight::default()));
        add_child(&scene, SceneNode::mesh(Mesh::unit_quad(Material::new())));
        let inner = Canvas3d::new(16, 16);
        {
            let mut guard = inner.borrow_mut();
            let c3d = guard.as_scene_mut().unwrap();
            c3d.set_camera(PerspectiveCamera::new());
            c3d.set_scene(scene);
        }
        let outer = CompositeCanvas::new(16, 16);
        outer
            .borrow_mut()
            .as_composite_mut()
            .unwrap()
            .add_placement(&inner, 0, 0);
        (outer, inner)
    }

    #[test]
    fn nested_canvas_ping_pongs_color_attachments() {
        let (outer, inner) = nested_scene_canvas();
        let driver = TraceDriver::new();
        let log = driver.log();
        let mut renderer = Renderer::new(Box::new(driver));
        renderer.add_effect(Box::new(FxaaEffect::new()));
        renderer.set_root(outer);

        renderer.process(0.0).unwrap();
        let first_color0 = renderer
            .cache_mut()
            .cached_attachments(&inner)
            .unwrap()
            .color0
            .clone();
        // the next frame's flip points color0 at what was color1
        renderer.process(0.0).unwrap();
        let second_color0 = renderer
            .cache_mut()
            .cached_attachments(&inner)
            .unwrap()
            .color0
            .clone();
        assert!(!Rc::ptr_eq(&first_color0, &second_color0));

        // the effect drew one extra full-screen quad after the scene pass
        assert!(log.count(|c| matches!(c, TraceCommand::DrawArrays { .. })) >= 2);
    }

    #[test]
    fn inactive_effect_is_a_no_op() {
        let (outer, _) = nested_scene_canvas();
        let driver = TraceDriver::new();
        let log = driver.log();
        let mut renderer = Renderer::new(Box::new(driver));
        let mut fxaa = FxaaEffect::new();
        fxaa.set_active(false);
        renderer.add_effect(Box::new(fxaa));
        renderer.set_root(outer);
        renderer.process(0.0).unwrap();

        // only the composite's placement quad; no effect quad
        assert_eq!(log.count(|c| matches!(c, TraceCommand::DrawArrays { .. })), 1);
    }
}
