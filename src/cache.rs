// src/cache.rs
//! The GPU resource cache.
//!
//! Identity-keyed maps from engine-side objects to lazily created GPU
//! handles. A lookup on an unseen identity always constructs and inserts
//! before returning; a cached entry is reused until explicitly released.
//! The cache subscribes to each object's change events and reacts by
//! re-uploading data or recompiling programs, so a cached handle is never
//! served stale: the invalidation queue is drained at frame start and on
//! every lookup.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::canvas::{Canvas, CanvasId, CanvasRef};
use crate::driver::{
    BufferDesc, BufferHandle, FramebufferHandle, GlslType, GpuDriver, ProgramHandle, ShaderInput,
    TextureDesc, TextureHandle, TextureTarget,
};
use crate::error::{Error, Result};
use crate::event::Subscription;
use crate::resources::{
    BufferId, BufferRef, ColorFormat, CubemapId, CubemapRef, Region, ShaderId, ShaderRef,
    Texture2d, TextureId, TextureRef, UnloadPolicy,
};

enum Invalidation {
    Texture { id: TextureId, region: Region },
    Buffer { id: BufferId },
    Shader { id: ShaderId },
    Uniform { id: ShaderId, name: String },
}

type ChangeQueue = Rc<RefCell<Vec<Invalidation>>>;

struct TextureEntry {
    handle: TextureHandle,
    desc: TextureDesc,
    texture: TextureRef,
    subscription: Subscription,
}

struct BufferEntry {
    handle: BufferHandle,
    desc: BufferDesc,
    buffer: BufferRef,
    subscription: Subscription,
}

struct CubemapEntry {
    handle: TextureHandle,
}

/// One sampler slot of a linked program: reflected location plus the
/// texture unit assigned at resolve time (2D samplers first, then cube).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerBinding {
    pub name: String,
    pub location: i32,
    pub unit: u32,
    pub target: TextureTarget,
}

/// Name → location tables resolved from the driver's active-input
/// reflection after linking, not from the engine's declared sets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BindingTable {
    pub uniforms: Vec<ShaderInput>,
    pub attributes: Vec<ShaderInput>,
    pub samplers: Vec<SamplerBinding>,
}

struct ShaderEntry {
    program: ProgramHandle,
    table: Rc<BindingTable>,
    shader: ShaderRef,
    source_sub: Subscription,
    uniform_sub: Subscription,
}

/// GPU-side backing of a canvas: color image(s), depth image and a
/// framebuffer. 3D canvases get two color images so post effects can
/// ping-pong; an image canvas reuses its own texture as `color0`.
pub struct Attachments {
    pub color0: TextureRef,
    pub color1: Option<TextureRef>,
    pub depth: Option<TextureRef>,
    pub framebuffer: Option<FramebufferHandle>,
}

struct CanvasEntry {
    attachments: Attachments,
}

#[derive(Default)]
pub struct ResourceCache {
    textures: HashMap<TextureId, TextureEntry>,
    buffers: HashMap<BufferId, BufferEntry>,
    cubemaps: HashMap<CubemapId, CubemapEntry>,
    shaders: HashMap<ShaderId, ShaderEntry>,
    canvases: HashMap<CanvasId, CanvasEntry>,
    queue: ChangeQueue,
}

fn texture_desc(tex: &Texture2d) -> TextureDesc {
    TextureDesc {
        width: tex.width(),
        height: tex.height(),
        format: tex.color_format(),
        wrap: tex.wrap(),
        filter: tex.filter(),
        mipmapping: tex.mipmapping(),
    }
}

fn buffer_desc(buffer: &crate::resources::DataBuffer) -> BufferDesc {
    BufferDesc {
        block: buffer.block(),
        byte_len: buffer.byte_len(),
        usage: buffer.usage(),
    }
}

/// Copy the pixels of `region` out of the texture's resident data.
fn region_bytes(tex: &Texture2d, region: Region) -> Option<Vec<u8>> {
    let bpp = tex.color_format().bytes_per_pixel().unwrap_or(4) as usize;
    let data = tex.pixels()?;
    let stride = tex.width() as usize * bpp;
    let row_len = region.width as usize * bpp;
    let mut out = Vec::with_capacity(row_len * region.height as usize);
    for row in 0..region.height as usize {
        let start = (region.y as usize + row) * stride + region.x as usize * bpp;
        out.extend_from_slice(&data[start..start + row_len]);
    }
    Some(out)
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the invalidation queue, pushing every recorded change to the
    /// driver. Called at frame start and before every lookup.
    pub fn flush_changes(&mut self, driver: &mut dyn GpuDriver) {
        loop {
            let pending = std::mem::take(&mut *self.queue.borrow_mut());
            if pending.is_empty() {
                return;
            }
            for change in pending {
                match change {
                    Invalidation::Texture { id, region } => self.reupload_texture(driver, id, region),
                    Invalidation::Buffer { id } => self.reupload_buffer(driver, id),
                    Invalidation::Shader { id } => self.recompile_shader(driver, id),
                    Invalidation::Uniform { id, name } => self.push_uniform(driver, id, &name),
                }
            }
        }
    }

    fn flush_if_dirty(&mut self, driver: &mut dyn GpuDriver) {
        if !self.queue.borrow().is_empty() {
            self.flush_changes(driver);
        }
    }

    // ---------- Textures ----------

    pub fn texture(&mut self, driver: &mut dyn GpuDriver, texture: &TextureRef) -> Result<TextureHandle> {
        self.flush_if_dirty(driver);
        let id = texture.borrow().id();
        if let Some(entry) = self.textures.get(&id) {
            return Ok(entry.handle);
        }

        let (desc, handle) = {
            let mut tex = texture.borrow_mut();
            // Leave the object's residency exactly as found: if we have to
            // load pixels for the upload, unload them again afterwards.
            let was_resident = tex.is_resident();
            if !was_resident {
                tex.load();
            }
            let desc = texture_desc(&tex);
            let handle = driver.create_texture_2d(&desc, tex.pixels());
            if !was_resident {
                tex.unload();
            }
            (desc, handle)
        };

        let queue = self.queue.clone();
        let subscription = texture.borrow().changed().attach(move |change| {
            queue.borrow_mut().push(Invalidation::Texture {
                id,
                region: change.region,
            });
        });

        self.textures.insert(
            id,
            TextureEntry {
                handle,
                desc,
                texture: texture.clone(),
                subscription,
            },
        );
        Ok(handle)
    }

    fn reupload_texture(&mut self, driver: &mut dyn GpuDriver, id: TextureId, region: Region) {
        let Some(entry) = self.textures.get(&id) else {
            return;
        };
        let handle = entry.handle;
        let desc = entry.desc;
        let mut tex = entry.texture.borrow_mut();
        let was_resident = tex.is_resident();
        if !was_resident {
            tex.load();
        }
        match region_bytes(&tex, region) {
            Some(bytes) => driver.update_texture_2d(handle, &desc, region, &bytes),
            None => log::warn!("texture {} changed but holds no pixel data; skipping re-upload", id.raw()),
        }
        if !was_resident {
            tex.unload();
        }
    }

    pub fn release_texture(&mut self, driver: &mut dyn GpuDriver, texture: &TextureRef) {
        let id = texture.borrow().id();
        if let Some(entry) = self.textures.remove(&id) {
            // detach before the handle dies so no notification can fire
            // against freed state
            drop(entry.subscription);
            driver.delete_texture(entry.handle);
        }
    }

    // ---------- Buffers ----------

    pub fn buffer(&mut self, driver: &mut dyn GpuDriver, buffer: &BufferRef) -> Result<BufferHandle> {
        self.flush_if_dirty(driver);
        if !driver.capabilities().vertex_buffers {
            return Err(Error::MissingFeature("vertex buffer objects"));
        }
        let id = buffer.borrow().id();
        if let Some(entry) = self.buffers.get(&id) {
            return Ok(entry.handle);
        }

        let (desc, handle) = {
            let mut buf = buffer.borrow_mut();
            let desc = buffer_desc(&buf);
            let handle = {
                let bytes = buf.bytes().ok_or(Error::EmptyBuffer(id.raw()))?;
                driver.create_buffer(&desc, bytes)
            };
            if buf.unload_policy() == UnloadPolicy::Automatic {
                buf.unload();
            }
            (desc, handle)
        };

        let queue = self.queue.clone();
        let subscription = buffer.borrow().changed().attach(move |_| {
            queue.borrow_mut().push(Invalidation::Buffer { id });
        });

        self.buffers.insert(
            id,
            BufferEntry {
                handle,
                desc,
                buffer: buffer.clone(),
                subscription,
            },
        );
        Ok(handle)
    }

    fn reupload_buffer(&mut self, driver: &mut dyn GpuDriver, id: BufferId) {
        let Some(entry) = self.buffers.get_mut(&id) else {
            return;
        };
        let buffer = entry.buffer.clone();
        let handle = entry.handle;
        let mut buf = buffer.borrow_mut();
        let desc = buffer_desc(&buf);
        match buf.bytes() {
            Some(bytes) => driver.update_buffer(handle, &desc, bytes),
            None => {
                log::warn!("buffer {} changed but holds no data; skipping re-upload", id.raw());
                return;
            }
        }
        entry.desc = desc;
        if buf.unload_policy() == UnloadPolicy::Automatic {
            buf.unload();
        }
    }

    pub fn release_buffer(&mut self, driver: &mut dyn GpuDriver, buffer: &BufferRef) {
        let id = buffer.borrow().id();
        if let Some(entry) = self.buffers.remove(&id) {
            drop(entry.subscription);
            driver.delete_buffer(entry.handle);
        }
    }

    // ---------- Cubemaps ----------

    pub fn cubemap(&mut self, driver: &mut dyn GpuDriver, cubemap: &CubemapRef) -> Result<TextureHandle> {
        self.flush_if_dirty(driver);
        let id = cubemap.borrow().id();
        if let Some(entry) = self.cubemaps.get(&id) {
            return Ok(entry.handle);
        }

        let handle = {
            let cube = cubemap.borrow();
            let levels = cube
                .levels()
                .iter()
                .map(|level| std::array::from_fn(|face| level.faces[face].as_slice()))
                .collect();
            driver.create_cubemap(&crate::driver::CubemapData {
                size: cube.size(),
                levels,
            })
        };
        self.cubemaps.insert(id, CubemapEntry { handle });
        Ok(handle)
    }

    pub fn release_cubemap(&mut self, driver: &mut dyn GpuDriver, cubemap: &CubemapRef) {
        let id = cubemap.borrow().id();
        if let Some(entry) = self.cubemaps.remove(&id) {
            driver.delete_texture(entry.handle);
        }
    }

    // ---------- Shaders ----------

    /// Compile, link and reflect on first sight; afterwards return the
    /// cached program and binding table.
    pub fn shader(
        &mut self,
        driver: &mut dyn GpuDriver,
        shader: &ShaderRef,
    ) -> Result<(ProgramHandle, Rc<BindingTable>)> {
        self.flush_if_dirty(driver);
        if !driver.capabilities().shaders {
            return Err(Error::MissingFeature("shaders"));
        }
        let id = shader.borrow().id();
        if let Some(entry) = self.shaders.get(&id) {
            return Ok((entry.program, entry.table.clone()));
        }

        let (program, table) = Self::build_program(driver, shader)?;

        let queue = self.queue.clone();
        let source_sub = shader.borrow().changed().attach(move |_| {
            queue.borrow_mut().push(Invalidation::Shader { id });
        });
        let queue = self.queue.clone();
        let uniform_sub = shader.borrow().uniform_changed().attach(move |change| {
            queue.borrow_mut().push(Invalidation::Uniform {
                id,
                name: change.name.clone(),
            });
        });

        let table = Rc::new(table);
        self.shaders.insert(
            id,
            ShaderEntry {
                program,
                table: table.clone(),
                shader: shader.clone(),
                source_sub,
                uniform_sub,
            },
        );
        Ok((program, table))
    }

    /// Compile and link both stages, walk the program's active uniform and
    /// attribute tables and bind every uniform whose value is already
    /// known, so first use never appears unset.
    fn build_program(
        driver: &mut dyn GpuDriver,
        shader: &ShaderRef,
    ) -> Result<(ProgramHandle, BindingTable)> {
        let program = {
            let sh = shader.borrow();
            driver.create_program(sh.vertex_source(), sh.fragment_source())?
        };

        let mut table = BindingTable {
            attributes: driver.active_attributes(program),
            ..Default::default()
        };

        let mut cube_samplers = Vec::new();
        let mut unit = 0u32;
        for input in driver.active_uniforms(program) {
            match input.ty {
                GlslType::Sampler2d => {
                    table.samplers.push(SamplerBinding {
                        name: input.name,
                        location: input.location,
                        unit,
                        target: TextureTarget::Tex2d,
                    });
                    unit += 1;
                }
                GlslType::SamplerCube => cube_samplers.push(input),
                _ => table.uniforms.push(input),
            }
        }
        for input in cube_samplers {
            table.samplers.push(SamplerBinding {
                name: input.name,
                location: input.location,
                unit,
                target: TextureTarget::Cubemap,
            });
            unit += 1;
        }

        driver.use_program(Some(program));
        {
            let sh = shader.borrow();
            for uniform in &table.uniforms {
                if let Some(value) = sh.uniform(&uniform.name) {
                    driver.set_uniform(uniform.location, value);
                }
            }
        }
        driver.use_program(None);

        Ok((program, table))
    }

    fn recompile_shader(&mut self, driver: &mut dyn GpuDriver, id: ShaderId) {
        let Some(entry) = self.shaders.get(&id) else {
            return;
        };
        let shader = entry.shader.clone();
        let old_program = entry.program;
        // Compile into a fresh program first; the cached handle stays
        // valid for the whole window. A failed reload keeps the previous
        // working program so the frame never falls back to a broken one.
        match Self::build_program(driver, &shader) {
            Ok((program, table)) => {
                driver.delete_program(old_program);
                let entry = self.shaders.get_mut(&id).expect("entry vanished during reload");
                entry.program = program;
                entry.table = Rc::new(table);
            }
            Err(err) => {
                log::error!("shader hot reload failed, keeping previous program: {err}");
            }
        }
    }

    fn push_uniform(&mut self, driver: &mut dyn GpuDriver, id: ShaderId, name: &str) {
        let Some(entry) = self.shaders.get(&id) else {
            return;
        };
        let Some(uniform) = entry.table.uniforms.iter().find(|u| u.name == name) else {
            return;
        };
        let shader = entry.shader.borrow();
        let Some(value) = shader.uniform(name) else {
            return;
        };
        driver.use_program(Some(entry.program));
        driver.set_uniform(uniform.location, value);
        driver.use_program(None);
    }

    pub fn release_shader(&mut self, driver: &mut dyn GpuDriver, shader: &ShaderRef) {
        let id = shader.borrow().id();
        if let Some(entry) = self.shaders.remove(&id) {
            drop(entry.source_sub);
            drop(entry.uniform_sub);
            driver.delete_program(entry.program);
        }
    }

    pub(crate) fn shader_entry(&self, shader: &ShaderRef) -> Option<(ProgramHandle, Rc<BindingTable>)> {
        let id = shader.borrow().id();
        self.shaders
            .get(&id)
            .map(|entry| (entry.program, entry.table.clone()))
    }

    // ---------- Canvas attachments ----------

    pub fn attachments(&mut self, driver: &mut dyn GpuDriver, canvas: &CanvasRef) -> Result<&Attachments> {
        self.ensure_canvas(driver, canvas)?;
        let id = canvas.borrow().id();
        Ok(&self.canvases[&id].attachments)
    }

    pub fn attachments_mut(
        &mut self,
        driver: &mut dyn GpuDriver,
        canvas: &CanvasRef,
    ) -> Result<&mut Attachments> {
        self.ensure_canvas(driver, canvas)?;
        let id = canvas.borrow().id();
        Ok(&mut self.canvases.get_mut(&id).unwrap().attachments)
    }

    /// Peek at already-created attachments without a driver; `None` if the
    /// canvas has not been seen yet.
    pub fn cached_attachments(&self, canvas: &CanvasRef) -> Option<&Attachments> {
        let id = canvas.borrow().id();
        self.canvases.get(&id).map(|entry| &entry.attachments)
    }

    fn ensure_canvas(&mut self, driver: &mut dyn GpuDriver, canvas: &CanvasRef) -> Result<()> {
        self.flush_if_dirty(driver);
        let id = canvas.borrow().id();
        if self.canvases.contains_key(&id) {
            return Ok(());
        }

        let fbo_support = driver.capabilities().framebuffers;
        let attachments = {
            let guard = canvas.borrow();
            let (width, height, format) = (guard.width(), guard.height(), guard.color_format());
            match &*guard {
                // Zero-copy: the image canvas's own texture is color0.
                Canvas::Image(image) => Attachments {
                    color0: image.texture().clone(),
                    color1: None,
                    depth: None,
                    framebuffer: None,
                },
                Canvas::Scene(_) => Attachments {
                    color0: Texture2d::sized(width, height, format),
                    color1: Some(Texture2d::sized(width, height, format)),
                    depth: Some(Texture2d::sized(width, height, ColorFormat::Depth)),
                    framebuffer: fbo_support.then(|| driver.create_framebuffer()),
                },
                Canvas::Composite(_) => Attachments {
                    color0: Texture2d::sized(width, height, format),
                    color1: None,
                    depth: None,
                    framebuffer: fbo_support.then(|| driver.create_framebuffer()),
                },
            }
        };
        self.canvases.insert(id, CanvasEntry { attachments });
        Ok(())
    }

    pub fn release_canvas(&mut self, driver: &mut dyn GpuDriver, canvas: &CanvasRef) {
        let id = canvas.borrow().id();
        if let Some(entry) = self.canvases.remove(&id) {
            let Attachments {
                color0,
                color1,
                depth,
                framebuffer,
            } = entry.attachments;
            for tex in [Some(color0), color1, depth].into_iter().flatten() {
                self.release_texture(driver, &tex);
            }
            if let Some(fbo) = framebuffer {
                driver.delete_framebuffer(fbo);
            }
        }
    }

    /// Teardown: release every cached entry.
    pub fn release_all(&mut self, driver: &mut dyn GpuDriver) {
        for (_, entry) in self.textures.drain() {
            drop(entry.subscription);
            driver.delete_texture(entry.handle);
        }
        for (_, entry) in self.buffers.drain() {
            drop(entry.subscription);
            driver.delete_buffer(entry.handle);
        }
        for (_, entry) in self.cubemaps.drain() {
            driver.delete_texture(entry.handle);
        }
        for (_, entry) in self.shaders.drain() {
            drop(entry.source_sub);
            drop(entry.uniform_sub);
            driver.delete_program(entry.program);
        }
        let canvases: Vec<CanvasEntry> = self.canvases.drain().map(|(_, e)| e).collect();
        for entry in canvases {
            if let Some(fbo) = entry.attachments.framebuffer {
                driver.delete_framebuffer(fbo);
            }
        }
        self.queue.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::trace::{TraceCommand, TraceDriver};
    use crate::resources::{DataBuffer, Shader};
    use std::cell::Cell;

    #[test]
    fn texture_lookup_is_idempotent() {
        let mut driver = TraceDriver::new();
        let log = driver.log();
        let mut cache = ResourceCache::new();
        let tex = Texture2d::from_pixels(2, 2, ColorFormat::Rgba, vec![0; 16]);

        let first = cache.texture(&mut driver, &tex).unwrap();
        for _ in 0..3 {
            assert_eq!(cache.texture(&mut driver, &tex).unwrap(), first);
        }
        assert_eq!(log.count(|c| matches!(c, TraceCommand::CreateTexture { .. })), 1);
    }

    #[test]
    fn texture_change_reuploads_only_region() {
        let mut driver = TraceDriver::new();
        let log = driver.log();
        let mut cache = ResourceCache::new();
        let tex = Texture2d::from_pixels(4, 4, ColorFormat::Rgba, vec![0; 64]);

        let handle = cache.texture(&mut driver, &tex).unwrap();
        let region = Region { x: 1, y: 1, width: 2, height: 2 };
        tex.borrow_mut().write_pixels(region, &[7u8; 2 * 2 * 4]);

        // the next use drains the queue
        cache.texture(&mut driver, &tex).unwrap();
        assert_eq!(
            log.count(|c| *c == TraceCommand::UpdateTexture { handle: handle.0, region }),
            1
        );
    }

    #[test]
    fn texture_residency_is_left_as_found() {
        let mut driver = TraceDriver::new();
        let mut cache = ResourceCache::new();
        let loads = Rc::new(Cell::new(0u32));
        let loads2 = loads.clone();
        let tex = Texture2d::with_source(1, 1, ColorFormat::Rgba, move || {
            loads2.set(loads2.get() + 1);
            vec![1, 2, 3, 4]
        });

        cache.texture(&mut driver, &tex).unwrap();
        assert_eq!(loads.get(), 1);
        // pixels were loaded for the upload, then unloaded again
        assert!(!tex.borrow().is_resident());

        // a texture that arrives resident stays resident
        let resident = Texture2d::from_pixels(1, 1, ColorFormat::Rgba, vec![0; 4]);
        cache.texture(&mut driver, &resident).unwrap();
        assert!(resident.borrow().is_resident());
    }

    #[test]
    fn buffer_auto_unload_drops_cpu_copy() {
        let mut driver = TraceDriver::new();
        let mut cache = ResourceCache::new();
        let buf = DataBuffer::from_vec3s(&[[0.0; 3]; 4]);
        buf.borrow_mut().set_unload_policy(UnloadPolicy::Automatic);

        cache.buffer(&mut driver, &buf).unwrap();
        assert!(!buf.borrow().is_resident());

        // a change re-uploads the whole buffer and honors the same policy
        buf.borrow_mut().set_data(vec![0u8; 12 * 2]);
        assert!(buf.borrow().is_resident());
        cache.buffer(&mut driver, &buf).unwrap();
        assert!(!buf.borrow().is_resident());
        assert_eq!(driver.log().count(|c| matches!(c, TraceCommand::UpdateBuffer { .. })), 1);
    }

    #[test]
    fn binding_table_resolves_uniform_sampler_attribute() {
        let mut driver = TraceDriver::new();
        let mut cache = ResourceCache::new();
        let shader = Shader::new(
            "attribute vec3 vertex;\nvoid main() {}",
            "uniform vec4 color;\nuniform sampler2D tex;\nvoid main() {}",
        );

        let (_, table) = cache.shader(&mut driver, &shader).unwrap();
        assert_eq!(table.uniforms.len(), 1);
        assert_eq!(table.uniforms[0].name, "color");
        assert_eq!(table.samplers.len(), 1);
        assert_eq!(table.samplers[0].unit, 0);
        assert_eq!(table.attributes.len(), 1);

        // second lookup returns the identical table object
        let (_, again) = cache.shader(&mut driver, &shader).unwrap();
        assert!(Rc::ptr_eq(&table, &again));
    }

    #[test]
    fn known_uniforms_are_pushed_at_resolve_time() {
        let mut driver = TraceDriver::new();
        let log = driver.log();
        let mut cache = ResourceCache::new();
        let shader = Shader::new("void main() {}", "uniform float gain;\nvoid main() {}");
        shader.borrow_mut().set_uniform("gain", 2.0f32);

        cache.shader(&mut driver, &shader).unwrap();
        assert_eq!(
            log.count(|c| {
                *c == TraceCommand::SetUniform {
                    location: 0,
                    value: crate::resources::UniformValue::Float(2.0),
                }
            }),
            1
        );
    }

    #[test]
    fn hot_reload_swaps_program_and_deletes_old() {
        let mut driver = TraceDriver::new();
        let log = driver.log();
        let mut cache = ResourceCache::new();
        let shader = Shader::new("void main() {}", "void main() {}");

        let (old_program, _) = cache.shader(&mut driver, &shader).unwrap();
        shader.borrow_mut().set_sources("void main() { }", "uniform float x;\nvoid main() {}");
        let (new_program, table) = cache.shader(&mut driver, &shader).unwrap();

        assert_ne!(old_program, new_program);
        assert_eq!(table.uniforms.len(), 1);
        // new program exists before the old one dies
        let created = log
            .position(|c| matches!(c, TraceCommand::CreateProgram { handle } if *handle == new_program.0))
            .unwrap();
        let deleted = log
            .position(|c| matches!(c, TraceCommand::DeleteProgram { handle } if *handle == old_program.0))
            .unwrap();
        assert!(created < deleted);
    }

    #[test]
    fn failed_hot_reload_keeps_previous_program() {
        let mut driver = TraceDriver::new();
        let mut cache = ResourceCache::new();
        let shader = Shader::new("void main() {}", "void main() {}");

        let (old_program, _) = cache.shader(&mut driver, &shader).unwrap();
        shader.borrow_mut().set_sources("void main() {}", "#error broken");
        let (program, _) = cache.shader(&mut driver, &shader).unwrap();

        assert_eq!(program, old_program);
        assert_eq!(driver.log().count(|c| matches!(c, TraceCommand::DeleteProgram { .. })), 0);
    }

    #[test]
    fn uniform_change_pushes_single_value() {
        let mut driver = TraceDriver::new();
        let log = driver.log();
        let mut cache = ResourceCache::new();
        let shader = Shader::new("void main() {}", "uniform float gain;\nvoid main() {}");

        cache.shader(&mut driver, &shader).unwrap();
        log.clear();
        shader.borrow_mut().set_uniform("gain", 5.0f32);
        cache.flush_changes(&mut driver);

        let commands = log.commands();
        assert_eq!(
            commands,
            vec![
                TraceCommand::UseProgram { handle: Some(1) },
                TraceCommand::SetUniform {
                    location: 0,
                    value: crate::resources::UniformValue::Float(5.0),
                },
                TraceCommand::UseProgram { handle: None },
            ]
        );
    }

    #[test]
    fn release_detaches_before_delete() {
        let mut driver = TraceDriver::new();
        let log = driver.log();
        let mut cache = ResourceCache::new();
        let tex = Texture2d::from_pixels(2, 2, ColorFormat::Rgba, vec![0; 16]);

        cache.texture(&mut driver, &tex).unwrap();
        cache.release_texture(&mut driver, &tex);
        assert_eq!(log.count(|c| matches!(c, TraceCommand::DeleteTexture { .. })), 1);
        assert_eq!(tex.borrow().changed().listener_count(), 0);

        // a change after release must not reach the driver
        log.clear();
        tex.borrow_mut().replace_pixels(vec![1; 16]);
        cache.flush_changes(&mut driver);
        assert!(log.is_empty());
    }

    #[test]
    fn image_canvas_reuses_its_texture_as_color0() {
        let mut driver = TraceDriver::new();
        let mut cache = ResourceCache::new();
        let tex = Texture2d::from_pixels(8, 8, ColorFormat::Rgba, vec![0; 8 * 8 * 4]);
        let canvas = crate::canvas::ImageCanvas::new(tex.clone());

        let attachments = cache.attachments(&mut driver, &canvas).unwrap();
        assert!(Rc::ptr_eq(&attachments.color0, &tex));
        assert!(attachments.depth.is_none());
    }

    #[test]
    fn scene_canvas_gets_ping_pong_and_depth() {
        let mut driver = TraceDriver::new();
        let mut cache = ResourceCache::new();
        let canvas = crate::canvas::Canvas3d::new(32, 16);

        let attachments = cache.attachments(&mut driver, &canvas).unwrap();
        assert!(attachments.color1.is_some());
        let depth = attachments.depth.as_ref().unwrap();
        assert_eq!(depth.borrow().color_format(), ColorFormat::Depth);
        assert_eq!(depth.borrow().width(), 32);
        assert!(attachments.framebuffer.is_some());
    }
}
