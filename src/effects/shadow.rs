// src/effects/shadow.rs
//! Shadow mapping as a postprocess effect.
//!
//! A depth-only pass renders the scene from the light's point of view
//! into a dedicated canvas (color writes off, front faces culled, polygon
//! offset applied), then a composition quad darkens the canvas image
//! where the light's depth map says the point is occluded.

use glam::{Mat4, Vec3};

use crate::camera::CameraRef;
use crate::canvas::{Canvas3d, CanvasRef};
use crate::color::ChannelMask;
use crate::cache::ResourceCache;
use crate::driver::{AttachmentPoint, CullFace, GpuDriver, PrimitiveKind};
use crate::error::{Error, Result};
use crate::renderer::{FrameContext, PostEffect, FULLSCREEN_STRIP};
use crate::resources::{DataBuffer, Shader, ShaderRef};
use crate::scene::{self, MeshRef, NodeRef, SceneVisitor};

const DEPTH_VERT: &str = include_str!("../shaders/shadow_depth.vert");
const DEPTH_FRAG: &str = include_str!("../shaders/shadow_depth.frag");
const FULLSCREEN_VERT: &str = include_str!("../shaders/fullscreen.vert");
const COMPOSE_FRAG: &str = include_str!("../shaders/shadow_compose.frag");

pub struct ShadowMapEffect {
    depth_canvas: CanvasRef,
    depth_shader: ShaderRef,
    compose_shader: ShaderRef,
    light_camera: CameraRef,
    active: bool,
    offset_factor: f32,
    offset_units: f32,
}

impl ShadowMapEffect {
    /// `size` is the shadow map's square resolution; `light_camera` views
    /// the scene from the shadow-casting light.
    pub fn new(size: u32, light_camera: CameraRef) -> Self {
        let compose_shader = Shader::new(FULLSCREEN_VERT, COMPOSE_FRAG);
        compose_shader
            .borrow_mut()
            .set_attribute("vertex", DataBuffer::from_vec2s(&FULLSCREEN_STRIP));
        Self {
            depth_canvas: Canvas3d::new(size, size),
            depth_shader: Shader::new(DEPTH_VERT, DEPTH_FRAG),
            compose_shader,
            light_camera,
            active: true,
            offset_factor: 2.1,
            offset_units: 4.0,
        }
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Depth-bias tuning for the shadow pass.
    pub fn set_polygon_offset(&mut self, factor: f32, units: f32) {
        self.offset_factor = factor;
        self.offset_units = units;
    }
}

impl PostEffect for ShadowMapEffect {
    fn setup(&mut self, driver: &mut dyn GpuDriver, cache: &mut ResourceCache) -> Result<()> {
        if !driver.capabilities().framebuffers {
            return Err(Error::MissingFeature("framebuffer objects"));
        }
        let shadow_depth = cache
            .attachments(driver, &self.depth_canvas)?
            .depth
            .clone()
            .expect("shadow canvas has a depth attachment");
        self.compose_shader
            .borrow_mut()
            .set_texture("shadow", shadow_depth);
        Ok(())
    }

    fn run(&mut self, frame: &mut FrameContext<'_>) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        let scene = {
            let guard = frame.canvas.borrow();
            guard
                .as_scene()
                .and_then(|c3d| c3d.scene().cloned())
                .ok_or(Error::MissingScene)?
        };
        let (light_view, light_projection) = {
            let cam = self.light_camera.borrow();
            (cam.view_matrix(), cam.projection_matrix())
        };

        // depth pass from the light
        let prev = frame.driver.bound_framebuffer();
        let (fbo, color0, depth) = {
            let atts = frame.cache.attachments(frame.driver, &self.depth_canvas)?;
            (
                atts.framebuffer.expect("shadow canvas framebuffer"),
                atts.color0.clone(),
                atts.depth.clone().expect("shadow canvas depth"),
            )
        };
        frame.driver.bind_framebuffer(Some(fbo));
        let color0 = frame.cache.texture(frame.driver, &color0)?;
        frame.driver.attach_texture(AttachmentPoint::Color0, color0);
        let depth = frame.cache.texture(frame.driver, &depth)?;
        frame.driver.attach_texture(AttachmentPoint::Depth, depth);

        let (size_w, size_h) = {
            let guard = self.depth_canvas.borrow();
            (guard.width(), guard.height())
        };
        frame.driver.clear(false, true);
        frame.driver.set_viewport(size_w, size_h);
        frame.driver.set_color_mask(ChannelMask::NONE);
        frame.driver.set_cull_face(Some(CullFace::Front));
        frame
            .driver
            .set_polygon_offset(Some((self.offset_factor, self.offset_units)));

        let mut pass = DepthPass {
            driver: &mut *frame.driver,
            cache: &mut *frame.cache,
            shader: &self.depth_shader,
            model_view: light_view,
            projection: light_projection,
        };
        scene::accept(&scene, &mut pass)?;

        frame.driver.set_polygon_offset(None);
        frame.driver.set_cull_face(Some(CullFace::Back));
        frame.driver.set_color_mask(ChannelMask::ALL);
        frame.driver.bind_framebuffer(prev);

        // composition over the canvas image
        let bias = Mat4::from_translation(Vec3::splat(0.5)) * Mat4::from_scale(Vec3::splat(0.5));
        {
            let mut sh = self.compose_shader.borrow_mut();
            sh.set_uniform("lightMatrix", bias * light_projection * light_view);
            sh.set_uniform(
                "viewProjectionInverse",
                (frame.projection * frame.view).inverse(),
            );
        }
        let source = super::flip_color_attachments(frame)?;
        let canvas_depth = frame
            .cache
            .attachments(frame.driver, frame.canvas)?
            .depth
            .clone();
        {
            let mut sh = self.compose_shader.borrow_mut();
            sh.set_texture("color0", source);
            if let Some(canvas_depth) = canvas_depth {
                sh.set_texture("depth", canvas_depth);
            }
        }

        let (width, height) = {
            let guard = frame.canvas.borrow();
            (guard.width(), guard.height())
        };
        frame.driver.set_viewport(width, height);
        frame.driver.set_depth_test(false);
        frame.driver.set_depth_write(false);
        frame.cache.apply(frame.driver, &self.compose_shader)?;
        frame.driver.draw_arrays(PrimitiveKind::TriangleStrip, 0, 4);
        frame.cache.release(frame.driver, &self.compose_shader);
        frame.driver.set_depth_write(true);
        frame.driver.set_depth_test(true);
        Ok(())
    }
}

/// Minimal depth-only scene pass.
struct DepthPass<'a> {
    driver: &'a mut dyn GpuDriver,
    cache: &'a mut ResourceCache,
    shader: &'a ShaderRef,
    model_view: Mat4,
    projection: Mat4,
}

impl SceneVisitor for DepthPass<'_> {
    fn visit_transform(&mut self, matrix: &Mat4, children: &[NodeRef]) -> Result<()> {
        let previous = self.model_view;
        self.model_view = previous * *matrix;
        self.visit_children(children)?;
        self.model_view = previous;
        Ok(())
    }

    fn visit_mesh(&mut self, mesh: &MeshRef, children: &[NodeRef]) -> Result<()> {
        let (vertices, indices, primitive, count, offset) = {
            let m = mesh.borrow();
            (
                m.geometry.vertices.clone(),
                m.indices.clone(),
                m.primitive,
                m.draw_count,
                m.index_offset,
            )
        };
        {
            let mut sh = self.shader.borrow_mut();
            sh.set_attribute("vertex", vertices);
            sh.set_uniform(
                "modelViewProjectionMatrix",
                self.projection * self.model_view,
            );
        }
        self.cache.apply(self.driver, self.shader)?;
        self.cache
            .draw_indexed(self.driver, &indices, primitive, count, offset)?;
        self.cache.release(self.driver, self.shader);
        self.visit_children(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::PerspectiveCamera;
    use crate::canvas::{Canvas3d, CompositeCanvas};
    use crate::driver::trace::{TraceCommand, TraceDriver};
    use crate::driver::Capabilities;
    use crate::renderer::Renderer;
    use crate::scene::{add_child, Material, Mesh, PointLight, SceneNode};

    fn shadowed_setup() -> (Renderer, crate::driver::trace::TraceLog) {
        let scene = SceneNode::group();
        add_child(&scene, SceneNode::point_light(PointLight::default()));
        add_child(&scene, SceneNode::mesh(Mesh::unit_quad(Material::new())));

        let inner = Canvas3d::new(32, 32);
        {
            let mut guard = inner.borrow_mut();
            let c3d = guard.as_scene_mut().unwrap();
            c3d.set_camera(PerspectiveCamera::new());
            c3d.set_scene(scene);
        }
        let outer = CompositeCanvas::new(32, 32);
        outer
            .borrow_mut()
            .as_composite_mut()
            .unwrap()
            .add_placement(&inner, 0, 0);

        let driver = TraceDriver::new();
        let log = driver.log();
        let mut renderer = Renderer::new(Box::new(driver));
        renderer.add_effect(Box::new(ShadowMapEffect::new(
            64,
            PerspectiveCamera::new(),
        )));
        renderer.set_root(outer);
        (renderer, log)
    }

    #[test]
    fn depth_pass_disables_color_writes_and_culls_front_faces() {
        let (mut renderer, log) = shadowed_setup();
        renderer.process(0.0).unwrap();

        let commands = log.commands();
        let mask_off = commands
            .iter()
            .position(|c| *c == TraceCommand::SetColorMask(ChannelMask::NONE))
            .unwrap();
        let cull_front = commands
            .iter()
            .position(|c| *c == TraceCommand::SetCullFace(Some(CullFace::Front)))
            .unwrap();
        let offset_on = commands
            .iter()
            .position(|c| matches!(c, TraceCommand::SetPolygonOffset(Some(_))))
            .unwrap();
        // some indexed draw happened between enabling and restoring
        let restore = commands
            .iter()
            .position(|c| *c == TraceCommand::SetPolygonOffset(None))
            .unwrap();
        assert!(mask_off < restore && cull_front < restore && offset_on < restore);
        assert!(commands[offset_on..restore]
            .iter()
            .any(|c| matches!(c, TraceCommand::DrawElements { .. })));
        // color writes restored
        assert!(commands[restore..]
            .iter()
            .any(|c| *c == TraceCommand::SetColorMask(ChannelMask::ALL)));
    }

    #[test]
    fn setup_requires_framebuffers() {
        let mut driver = TraceDriver::with_capabilities(Capabilities {
            framebuffers: false,
            ..Capabilities::all()
        });
        let mut cache = ResourceCache::new();
        let mut effect = ShadowMapEffect::new(64, PerspectiveCamera::new());
        assert!(matches!(
            effect.setup(&mut driver, &mut cache),
            Err(Error::MissingFeature("framebuffer objects"))
        ));
    }

    #[test]
    fn framebuffer_binding_is_restored_after_depth_pass() {
        let (mut renderer, log) = shadowed_setup();
        renderer.process(0.0).unwrap();

        // the final binding returns to the default target
        let last_bind = log
            .commands()
            .iter()
            .rev()
            .find_map(|c| match c {
                TraceCommand::BindFramebuffer { handle } => Some(*handle),
                _ => None,
            })
            .unwrap();
        assert_eq!(last_bind, None);
    }
}
