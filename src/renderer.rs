// src/renderer.rs
//! The per-frame rendering pipeline.
//!
//! One `process` tick walks the canvas tree from the root. A 3D canvas
//! runs the three-phase state machine (preprocess collects lights, process
//! draws the scene, postprocess runs the effect list; all three run every
//! frame). A composite first renders its distinct children, then blends
//! one placement quad per child into its own target. A recursion-level
//! counter decides which canvases render into off-screen framebuffers:
//! only nested ones, so the outermost result lands on the display surface.
//! Without framebuffer support the result is captured by a copy instead.

use glam::{Mat4, Vec2};

use crate::cache::ResourceCache;
use crate::canvas::{self, CanvasRef, CanvasVisitor, Placement};
use crate::color::ChannelMask;
use crate::driver::{
    AttachmentPoint, BlendMode, FramebufferHandle, GpuDriver, PrimitiveKind, TextureTarget,
};
use crate::error::{Error, Result};
use crate::lighting::{LightCollector, LightSource};
use crate::resources::{
    BufferRef, ColorFormat, CubemapRef, DataBuffer, Shader, ShaderRef, UpdateMode,
};
use crate::view::RenderingView;

const QUAD_VERT: &str = include_str!("shaders/quad.vert");
const QUAD_FRAG: &str = include_str!("shaders/quad.frag");
const SKYBOX_VERT: &str = include_str!("shaders/skybox.vert");
const SKYBOX_FRAG: &str = include_str!("shaders/skybox.frag");

/// Strip covering clip space, used by the skybox and full-screen passes.
pub const FULLSCREEN_STRIP: [[f32; 2]; 4] = [[-1.0, 1.0], [-1.0, -1.0], [1.0, 1.0], [1.0, -1.0]];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Initialize,
    Preprocess,
    Process,
    Postprocess,
}

/// What a postprocess effect gets to work with: the driver, the cache,
/// the canvas being rendered and the frame's camera matrices.
pub struct FrameContext<'a> {
    pub driver: &'a mut dyn GpuDriver,
    pub cache: &'a mut ResourceCache,
    pub canvas: &'a CanvasRef,
    pub dt: f32,
    pub view: Mat4,
    pub projection: Mat4,
}

/// A full-screen effect run in the postprocess phase. Effects read the
/// canvas's rendered color/depth images and may write back into them
/// through the ping-pong attachments.
pub trait PostEffect {
    fn setup(&mut self, _driver: &mut dyn GpuDriver, _cache: &mut ResourceCache) -> Result<()> {
        Ok(())
    }

    fn run(&mut self, frame: &mut FrameContext<'_>) -> Result<()>;
}

pub struct Renderer {
    driver: Box<dyn GpuDriver>,
    cache: ResourceCache,
    root: Option<CanvasRef>,
    level: u32,
    stage: RenderStage,
    view: RenderingView,
    lights: LightCollector,
    effects: Vec<Box<dyn PostEffect>>,
    quad_shader: ShaderRef,
    quad_vertices: BufferRef,
    skybox_shader: ShaderRef,
    dt: f32,
    initialized: bool,
}

impl Renderer {
    pub fn new(driver: Box<dyn GpuDriver>) -> Self {
        // The quad pass draws one placement at a time: static texture
        // coordinates, a dynamic vertex buffer rewritten per placement.
        let quad_vertices = DataBuffer::from_vec2s(&[[0.0; 2]; 4]);
        quad_vertices.borrow_mut().set_update_mode(UpdateMode::Dynamic);
        let quad_texcoords =
            DataBuffer::from_vec2s(&[[0.0, 1.0], [0.0, 0.0], [1.0, 1.0], [1.0, 0.0]]);
        let quad_shader = Shader::new(QUAD_VERT, QUAD_FRAG);
        {
            let mut sh = quad_shader.borrow_mut();
            sh.set_attribute("vertex", quad_vertices.clone());
            sh.set_attribute("texCoord", quad_texcoords);
        }

        let skybox_shader = Shader::new(SKYBOX_VERT, SKYBOX_FRAG);
        skybox_shader
            .borrow_mut()
            .set_attribute("vertex", DataBuffer::from_vec2s(&FULLSCREEN_STRIP));

        Self {
            driver,
            cache: ResourceCache::new(),
            root: None,
            level: 0,
            stage: RenderStage::Initialize,
            view: RenderingView::new(),
            lights: LightCollector::new(),
            effects: Vec::new(),
            quad_shader,
            quad_vertices,
            skybox_shader,
            dt: 0.0,
            initialized: false,
        }
    }

    pub fn set_root(&mut self, canvas: CanvasRef) {
        self.root = Some(canvas);
    }

    pub fn root(&self) -> Option<&CanvasRef> {
        self.root.as_ref()
    }

    pub fn add_effect(&mut self, effect: Box<dyn PostEffect>) {
        self.effects.push(effect);
    }

    pub fn stage(&self) -> RenderStage {
        self.stage
    }

    pub fn cache_mut(&mut self) -> &mut ResourceCache {
        &mut self.cache
    }

    /// One-time setup: resolve the pipeline-owned shaders and give every
    /// registered effect a chance to allocate its resources.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        self.stage = RenderStage::Initialize;
        self.driver.set_depth_test(true);

        let quad = self.quad_shader.clone();
        self.cache.shader(&mut *self.driver, &quad)?;
        let skybox = self.skybox_shader.clone();
        self.cache.shader(&mut *self.driver, &skybox)?;

        {
            let driver = &mut *self.driver;
            let cache = &mut self.cache;
            for effect in &mut self.effects {
                effect.setup(driver, cache)?;
            }
        }

        self.stage = RenderStage::Preprocess;
        self.initialized = true;
        Ok(())
    }

    /// Render one frame from the root canvas. `dt` is the elapsed time in
    /// seconds handed to each camera's rendering signal.
    pub fn process(&mut self, dt: f32) -> Result<()> {
        self.initialize()?;
        self.dt = dt;
        self.cache.flush_changes(&mut *self.driver);
        let root = self.root.clone().ok_or(Error::NoRootCanvas)?;
        canvas::accept(&root, self)
    }

    /// Drop every cached GPU resource.
    pub fn release_resources(&mut self) {
        self.cache.release_all(&mut *self.driver);
    }

    // ---------- 3D canvases ----------

    fn render_scene_canvas(&mut self, canvas: &CanvasRef) -> Result<()> {
        let (width, height, background, format, camera, scene, skybox) = {
            let guard = canvas.borrow();
            let c3d = guard.as_scene().expect("scene canvas expected");
            (
                c3d.width,
                c3d.height,
                c3d.background,
                c3d.format,
                c3d.camera().cloned(),
                c3d.scene().cloned(),
                c3d.skybox().cloned(),
            )
        };
        let scene = scene.ok_or(Error::MissingScene)?;
        let camera = camera.ok_or(Error::MissingCamera)?;

        let prev_fbo = self.bind_nested_target(canvas, true)?;

        self.driver.set_clear_color(background);
        self.driver.clear(true, true);

        camera.borrow_mut().signal_rendering(self.dt);
        self.driver.set_viewport(width, height);
        let view = camera.borrow().view_matrix();
        let projection = camera.borrow().projection_matrix();

        self.stage = RenderStage::Preprocess;
        let light: LightSource = self.lights.collect(&scene, view)?[0];

        if let Some(skybox) = skybox {
            self.render_skybox(&skybox, view, projection)?;
        }

        self.stage = RenderStage::Process;
        self.view.render(
            &mut *self.driver,
            &mut self.cache,
            &scene,
            view,
            projection,
            &light,
        )?;

        self.stage = RenderStage::Postprocess;
        {
            let mut frame = FrameContext {
                driver: &mut *self.driver,
                cache: &mut self.cache,
                canvas,
                dt: self.dt,
                view,
                projection,
            };
            for effect in &mut self.effects {
                effect.run(&mut frame)?;
            }
        }
        self.stage = RenderStage::Preprocess;

        self.unbind_nested_target(canvas, prev_fbo, format, width, height)?;
        Ok(())
    }

    /// Skybox: a screen-filling quad reconstructing per-pixel view rays
    /// from the inverse view-projection matrix, drawn with depth testing
    /// disabled before the opaque pass.
    fn render_skybox(&mut self, cubemap: &CubemapRef, view: Mat4, projection: Mat4) -> Result<()> {
        {
            let mut sh = self.skybox_shader.borrow_mut();
            sh.set_cubemap("skybox", cubemap.clone());
            sh.set_uniform("viewProjectionInverse", (projection * view).inverse());
        }
        let shader = self.skybox_shader.clone();
        self.driver.set_depth_test(false);
        self.cache.apply(&mut *self.driver, &shader)?;
        self.driver.draw_arrays(PrimitiveKind::TriangleStrip, 0, 4);
        self.cache.release(&mut *self.driver, &shader);
        self.driver.set_depth_test(true);
        Ok(())
    }

    // ---------- Composites ----------

    fn render_composite_canvas(&mut self, canvas: &CanvasRef) -> Result<()> {
        // children first, each into its own backing image
        self.level += 1;
        let children = canvas::accept_children(canvas, self);
        self.level -= 1;
        children?;

        let (width, height, background, format, placements) = {
            let guard = canvas.borrow();
            let comp = guard.as_composite().expect("composite canvas expected");
            (
                comp.width(),
                comp.height(),
                comp.background,
                comp.color_format(),
                comp.placements().to_vec(),
            )
        };

        let prev_fbo = self.bind_nested_target(canvas, false)?;

        self.driver.set_blending(Some(BlendMode::alpha_over()));
        self.driver.set_depth_test(false);
        self.driver.set_depth_write(false);
        self.driver.set_viewport(width, height);
        self.driver.set_clear_color(background);
        self.driver.clear(true, false);

        self.quad_shader
            .borrow_mut()
            .set_uniform("dims", Vec2::new(width as f32, height as f32));

        for placement in &placements {
            self.blend_placement(placement, height)?;
        }

        self.unbind_nested_target(canvas, prev_fbo, format, width, height)?;

        // unconditional cleanup, regardless of nesting depth
        self.driver.set_depth_test(true);
        self.driver.set_depth_write(true);
        self.driver.set_color_mask(ChannelMask::ALL);
        self.driver.set_blending(None);
        Ok(())
    }

    /// Draw one placement: a screen-aligned quad textured with the
    /// child's rendered color image, modulated by tint and opacity,
    /// clipped per channel by the write mask.
    fn blend_placement(&mut self, placement: &Placement, canvas_height: u32) -> Result<()> {
        let child_color = self
            .cache
            .attachments(&mut *self.driver, &placement.canvas)?
            .color0
            .clone();
        {
            let mut sh = self.quad_shader.borrow_mut();
            sh.set_texture("image", child_color);
            sh.set_uniform("color", placement.color.with_alpha(placement.opacity));
        }

        // placement y counts from the top, clip space from the bottom
        let x = placement.x as f32;
        let y = canvas_height as f32 - placement.y as f32;
        let (w, h) = (placement.width, placement.height);
        self.quad_vertices.borrow_mut().set_data(
            bytemuck::cast_slice(&[[x, y], [x, y - h], [x + w, y], [x + w, y - h]]).to_vec(),
        );

        self.driver.set_color_mask(placement.mask);
        let shader = self.quad_shader.clone();
        self.cache.apply(&mut *self.driver, &shader)?;
        self.driver.draw_arrays(PrimitiveKind::TriangleStrip, 0, 4);
        self.cache.release(&mut *self.driver, &shader);
        Ok(())
    }

    // ---------- Framebuffer nesting ----------

    /// When nested (level > 0) and framebuffers are available, redirect
    /// output into the canvas's own framebuffer. Returns the previously
    /// bound framebuffer for the matching unbind.
    fn bind_nested_target(
        &mut self,
        canvas: &CanvasRef,
        with_depth: bool,
    ) -> Result<Option<FramebufferHandle>> {
        if !(self.driver.capabilities().framebuffers && self.level > 0) {
            return Ok(None);
        }
        let prev = self.driver.bound_framebuffer();
        let (fbo, color0, depth) = {
            let atts = self.cache.attachments(&mut *self.driver, canvas)?;
            (
                atts.framebuffer.expect("framebuffer missing despite support"),
                atts.color0.clone(),
                atts.depth.clone(),
            )
        };
        self.driver.bind_framebuffer(Some(fbo));
        let color0 = self.cache.texture(&mut *self.driver, &color0)?;
        self.driver.attach_texture(AttachmentPoint::Color0, color0);
        if with_depth {
            if let Some(depth) = depth {
                let depth = self.cache.texture(&mut *self.driver, &depth)?;
                self.driver.attach_texture(AttachmentPoint::Depth, depth);
            }
        }
        Ok(prev)
    }

    /// Restore the previous binding, or capture the result with a
    /// framebuffer-to-texture copy when framebuffers are unsupported.
    fn unbind_nested_target(
        &mut self,
        canvas: &CanvasRef,
        prev: Option<FramebufferHandle>,
        format: ColorFormat,
        width: u32,
        height: u32,
    ) -> Result<()> {
        if self.driver.capabilities().framebuffers {
            if self.level > 0 {
                self.driver.bind_framebuffer(prev);
            }
        } else {
            let color0 = self
                .cache
                .attachments(&mut *self.driver, canvas)?
                .color0
                .clone();
            let handle = self.cache.texture(&mut *self.driver, &color0)?;
            self.driver.bind_texture(0, TextureTarget::Tex2d, Some(handle));
            self.driver.copy_output_to_texture(handle, format, width, height);
            self.driver.bind_texture(0, TextureTarget::Tex2d, None);
        }
        Ok(())
    }
}

impl CanvasVisitor for Renderer {
    fn visit_image(&mut self, canvas: &CanvasRef) -> Result<()> {
        // nothing to draw: just make sure the backing texture is resident
        // on the GPU for the parent composite to blend
        let color0 = self
            .cache
            .attachments(&mut *self.driver, canvas)?
            .color0
            .clone();
        self.cache.texture(&mut *self.driver, &color0)?;
        Ok(())
    }

    fn visit_scene(&mut self, canvas: &CanvasRef) -> Result<()> {
        self.render_scene_canvas(canvas)
    }

    fn visit_composite(&mut self, canvas: &CanvasRef) -> Result<()> {
        self.render_composite_canvas(canvas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::PerspectiveCamera;
    use crate::canvas::{Canvas3d, CompositeCanvas, ImageCanvas};
    use crate::color::RgbaColor;
    use crate::driver::trace::{TraceCommand, TraceDriver, TraceLog};
    use crate::driver::Capabilities;
    use crate::resources::{Texture2d, UniformValue};
    use crate::scene::{add_child, Material, Mesh, PointLight, SceneNode};

    fn lit_scene() -> crate::scene::NodeRef {
        let root = SceneNode::group();
        add_child(&root, SceneNode::point_light(PointLight::default()));
        add_child(&root, SceneNode::mesh(Mesh::unit_quad(Material::new())));
        root
    }

    fn scene_canvas(width: u32, height: u32) -> CanvasRef {
        let canvas = Canvas3d::new(width, height);
        {
            let mut guard = canvas.borrow_mut();
            let c3d = guard.as_scene_mut().unwrap();
            c3d.set_camera(PerspectiveCamera::new());
            c3d.set_scene(lit_scene());
        }
        canvas
    }

    fn renderer_with_log() -> (Renderer, TraceLog) {
        let driver = TraceDriver::new();
        let log = driver.log();
        (Renderer::new(Box::new(driver)), log)
    }

    #[test]
    fn single_canvas_smoke_test_runs_all_phases() {
        let (mut renderer, log) = renderer_with_log();
        let canvas = scene_canvas(64, 64);
        renderer.set_root(canvas);
        renderer.process(0.016).unwrap();

        let commands = log.commands();
        // the frame cleared color+depth, sized the viewport and drew the
        // quad mesh with a linked program
        assert!(commands.contains(&TraceCommand::Clear { color: true, depth: true }));
        assert!(commands.contains(&TraceCommand::SetViewport { width: 64, height: 64 }));
        let clear = log.position(|c| matches!(c, TraceCommand::Clear { .. })).unwrap();
        let draw = log.position(|c| matches!(c, TraceCommand::DrawElements { .. })).unwrap();
        assert!(clear < draw);
        // at top level with FBO support nothing was redirected off-screen
        assert_eq!(log.count(|c| matches!(c, TraceCommand::BindFramebuffer { .. })), 0);
        // postprocess ran (stage machine returned to preprocess)
        assert_eq!(renderer.stage(), RenderStage::Preprocess);
    }

    #[test]
    fn missing_lights_abort_the_frame_before_drawing() {
        let (mut renderer, log) = renderer_with_log();
        let canvas = Canvas3d::new(8, 8);
        {
            let mut guard = canvas.borrow_mut();
            let c3d = guard.as_scene_mut().unwrap();
            c3d.set_camera(PerspectiveCamera::new());
            c3d.set_scene(SceneNode::group());
        }
        renderer.set_root(canvas);
        let err = renderer.process(0.0).unwrap_err();
        assert!(matches!(err, Error::NoLights));
        assert_eq!(log.count(|c| matches!(c, TraceCommand::DrawElements { .. })), 0);
    }

    #[test]
    fn composite_renders_shared_child_once() {
        let (mut renderer, log) = renderer_with_log();
        let child = scene_canvas(16, 16);
        let composite = CompositeCanvas::new(32, 32);
        {
            let mut guard = composite.borrow_mut();
            let comp = guard.as_composite_mut().unwrap();
            comp.add_placement(&child, 0, 0);
            comp.add_placement(&child, 16, 16);
        }
        renderer.set_root(composite);
        renderer.process(0.0).unwrap();

        // one scene pass for two placements of the same child...
        assert_eq!(log.count(|c| matches!(c, TraceCommand::DrawElements { .. })), 1);
        // ...but two blended quads
        assert_eq!(log.count(|c| matches!(c, TraceCommand::DrawArrays { .. })), 2);
    }

    #[test]
    fn composite_restores_framebuffer_and_draw_state() {
        let (mut renderer, log) = renderer_with_log();
        let inner = CompositeCanvas::new(8, 8);
        {
            let mut guard = inner.borrow_mut();
            guard.as_composite_mut().unwrap().add_placement(&scene_canvas(8, 8), 0, 0);
        }
        let outer = CompositeCanvas::new(16, 16);
        {
            let mut guard = outer.borrow_mut();
            guard.as_composite_mut().unwrap().add_placement(&inner, 0, 0);
        }
        renderer.set_root(outer);
        renderer.process(0.0).unwrap();

        let commands = log.commands();
        // nested canvases bound their own framebuffers and unwound back
        // to the default target
        assert!(log.count(|c| matches!(c, TraceCommand::BindFramebuffer { handle: Some(_) })) >= 2);
        let last_bind = commands
            .iter()
            .rev()
            .find_map(|c| match c {
                TraceCommand::BindFramebuffer { handle } => Some(*handle),
                _ => None,
            })
            .unwrap();
        assert_eq!(last_bind, None);

        // default draw state restored after the last composite pass
        let tail: Vec<_> = commands.iter().rev().take(4).cloned().collect();
        assert!(tail.contains(&TraceCommand::SetDepthTest(true)));
        assert!(tail.contains(&TraceCommand::SetDepthWrite(true)));
        assert!(tail.contains(&TraceCommand::SetColorMask(ChannelMask::ALL)));
        assert!(tail.contains(&TraceCommand::SetBlending(None)));
    }

    #[test]
    fn composite_placement_blends_child_image_at_offset() {
        let (mut renderer, log) = renderer_with_log();
        // solid red 50x50 image canvas placed at (10, 10) on a 100x100
        // composite with a distinct background color
        let red = Texture2d::from_pixels(50, 50, ColorFormat::Rgba, vec![255, 0, 0, 255].repeat(2500));
        let image = ImageCanvas::new(red);
        let composite = CompositeCanvas::new(100, 100);
        {
            let mut guard = composite.borrow_mut();
            let comp = guard.as_composite_mut().unwrap();
            comp.background = RgbaColor::new(0.0, 0.0, 1.0, 1.0);
            comp.add_placement(&image, 10, 10);
        }
        renderer.set_root(composite);
        renderer.process(0.0).unwrap();

        // the composite cleared to its background...
        assert!(log.commands().contains(&TraceCommand::SetClearColor {
            color: RgbaColor::new(0.0, 0.0, 1.0, 1.0)
        }));
        // ...and the placement quad covers (10,10)..(60,60) in composite
        // pixels (bottom-left origin), so pixel (30,30) is inside and
        // (5,5) is outside
        let quad = renderer.quad_vertices.borrow();
        let floats: &[f32] = bytemuck::cast_slice(quad.bytes().unwrap());
        assert_eq!(floats, &[10.0, 90.0, 10.0, 40.0, 60.0, 90.0, 60.0, 40.0]);
        drop(quad);
        // tinted white at full opacity
        let quad_shader = renderer.quad_shader.borrow();
        assert_eq!(
            quad_shader.uniform("color"),
            Some(&UniformValue::Float4([1.0, 1.0, 1.0, 1.0]))
        );
        // blending was source-over while compositing
        assert!(log.commands().contains(&TraceCommand::SetBlending(Some(BlendMode::alpha_over()))));
    }

    #[test]
    fn without_framebuffers_results_are_captured_by_copy() {
        let driver = TraceDriver::with_capabilities(Capabilities {
            framebuffers: false,
            ..Capabilities::all()
        });
        let log = driver.log();
        let mut renderer = Renderer::new(Box::new(driver));

        let composite = CompositeCanvas::new(32, 32);
        {
            let mut guard = composite.borrow_mut();
            guard.as_composite_mut().unwrap().add_placement(&scene_canvas(16, 16), 0, 0);
        }
        renderer.set_root(composite);
        renderer.process(0.0).unwrap();

        // the child scene and the composite each copied their output out
        assert_eq!(log.count(|c| matches!(c, TraceCommand::CopyOutput { .. })), 2);
        assert_eq!(log.count(|c| matches!(c, TraceCommand::BindFramebuffer { .. })), 0);
    }

    #[test]
    fn skybox_draws_before_meshes_with_depth_disabled() {
        let (mut renderer, log) = renderer_with_log();
        let canvas = scene_canvas(32, 32);
        {
            let mut guard = canvas.borrow_mut();
            guard.as_scene_mut().unwrap().set_skybox(crate::resources::Cubemap::from_faces(
                1,
                std::array::from_fn(|_| vec![0; 4]),
            ));
        }
        renderer.set_root(canvas);
        renderer.process(0.0).unwrap();

        let skybox_draw = log
            .position(|c| matches!(c, TraceCommand::DrawArrays { .. }))
            .unwrap();
        let mesh_draw = log
            .position(|c| matches!(c, TraceCommand::DrawElements { .. }))
            .unwrap();
        assert!(skybox_draw < mesh_draw);
        let depth_off = log.position(|c| *c == TraceCommand::SetDepthTest(false)).unwrap();
        assert!(depth_off < skybox_draw);
        // a cubemap was bound for the skybox sampler
        assert!(log.count(|c| {
            matches!(c, TraceCommand::BindTexture { target: TextureTarget::Cubemap, handle: Some(_), .. })
        }) > 0);
    }

    #[test]
    fn nested_scene_canvas_attaches_color_and_depth() {
        let (mut renderer, log) = renderer_with_log();
        let composite = CompositeCanvas::new(32, 32);
        {
            let mut guard = composite.borrow_mut();
            guard.as_composite_mut().unwrap().add_placement(&scene_canvas(16, 16), 0, 0);
        }
        renderer.set_root(composite);
        renderer.process(0.0).unwrap();

        assert!(log.count(|c| matches!(c, TraceCommand::AttachTexture { point: AttachmentPoint::Color0, .. })) >= 1);
        assert_eq!(
            log.count(|c| matches!(c, TraceCommand::AttachTexture { point: AttachmentPoint::Depth, .. })),
            1
        );
    }
}
