// src/driver/trace.rs
//! Headless recording backend.
//!
//! `TraceDriver` satisfies the full driver contract without a GPU: handles
//! are counters, every call lands in a shared command log, and program
//! reflection is served by scanning the submitted GLSL for `uniform` and
//! `attribute` declarations. Sources containing an `#error` directive fail
//! to compile, which gives tests a handle on the hard-error paths.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::color::{ChannelMask, RgbaColor};
use crate::error::{Error, Result, ShaderStage};
use crate::resources::{ElementKind, Region, UniformValue};

use super::{
    AttachmentPoint, AttributeSource, BlendMode, BufferDesc, BufferHandle, Capabilities,
    CubemapData, CullFace, FramebufferHandle, GlslType, GpuDriver, IndexSource, PrimitiveKind,
    ProgramHandle, ShaderInput, TextureDesc, TextureHandle, TextureTarget,
};

/// Everything the trace backend records, one variant per driver call that
/// matters for verification.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceCommand {
    CreateTexture { handle: u32, width: u32, height: u32 },
    UpdateTexture { handle: u32, region: Region },
    DeleteTexture { handle: u32 },
    CreateCubemap { handle: u32, size: u32, levels: usize },
    CreateBuffer { handle: u32, byte_len: u32 },
    UpdateBuffer { handle: u32, byte_len: u32 },
    DeleteBuffer { handle: u32 },
    CreateProgram { handle: u32 },
    DeleteProgram { handle: u32 },
    UseProgram { handle: Option<u32> },
    SetUniform { location: i32, value: UniformValue },
    BindAttribute { location: u32, dimension: u32, from_buffer: Option<u32> },
    UnbindAttribute { location: u32 },
    BindTexture { unit: u32, target: TextureTarget, handle: Option<u32> },
    CreateFramebuffer { handle: u32 },
    DeleteFramebuffer { handle: u32 },
    BindFramebuffer { handle: Option<u32> },
    AttachTexture { point: AttachmentPoint, handle: u32 },
    CopyOutput { handle: u32, width: u32, height: u32 },
    SetViewport { width: u32, height: u32 },
    SetClearColor { color: RgbaColor },
    Clear { color: bool, depth: bool },
    SetDepthTest(bool),
    SetDepthWrite(bool),
    SetCullFace(Option<CullFace>),
    SetWireframe(bool),
    SetPolygonOffset(Option<(f32, f32)>),
    SetColorMask(ChannelMask),
    SetBlending(Option<BlendMode>),
    DrawArrays { primitive: PrimitiveKind, first: u32, count: u32 },
    DrawElements { primitive: PrimitiveKind, count: u32, offset: u32, from_buffer: Option<u32> },
}

/// Shareable view of the recorded command stream. Clone it before handing
/// the driver to a renderer; it stays live.
#[derive(Clone, Default)]
pub struct TraceLog(Rc<RefCell<Vec<TraceCommand>>>);

impl TraceLog {
    fn push(&self, command: TraceCommand) {
        self.0.borrow_mut().push(command);
    }

    pub fn commands(&self) -> Vec<TraceCommand> {
        self.0.borrow().clone()
    }

    pub fn count(&self, predicate: impl Fn(&TraceCommand) -> bool) -> usize {
        self.0.borrow().iter().filter(|c| predicate(c)).count()
    }

    /// Index of the first command matching the predicate.
    pub fn position(&self, predicate: impl Fn(&TraceCommand) -> bool) -> Option<usize> {
        self.0.borrow().iter().position(predicate)
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

struct Reflection {
    uniforms: Vec<ShaderInput>,
    attributes: Vec<ShaderInput>,
}

pub struct TraceDriver {
    caps: Capabilities,
    log: TraceLog,
    next_handle: u32,
    programs: HashMap<u32, Reflection>,
    bound_framebuffer: Option<FramebufferHandle>,
}

impl Default for TraceDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceDriver {
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::all())
    }

    pub fn with_capabilities(caps: Capabilities) -> Self {
        Self {
            caps,
            log: TraceLog::default(),
            next_handle: 1,
            programs: HashMap::new(),
            bound_framebuffer: None,
        }
    }

    pub fn log(&self) -> TraceLog {
        self.log.clone()
    }

    fn alloc(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

fn parse_glsl_type(word: &str) -> Option<GlslType> {
    match word {
        "int" | "bool" => Some(GlslType::Int),
        "float" => Some(GlslType::Float),
        "vec2" => Some(GlslType::Vec2),
        "vec3" => Some(GlslType::Vec3),
        "vec4" => Some(GlslType::Vec4),
        "mat3" => Some(GlslType::Mat3),
        "mat4" => Some(GlslType::Mat4),
        "sampler2D" => Some(GlslType::Sampler2d),
        "samplerCube" => Some(GlslType::SamplerCube),
        _ => None,
    }
}

/// Resolve `#define`/`#ifdef`/`#ifndef`/`#else`/`#endif` so only lines a
/// compiler would see are scanned; inactive declarations must not appear
/// in the reflected tables.
fn active_lines(source: &str) -> Vec<&str> {
    let mut defined: Vec<&str> = Vec::new();
    let mut stack: Vec<bool> = Vec::new();
    let mut out = Vec::new();
    for line in source.lines() {
        let trimmed = line.trim();
        let active = stack.iter().all(|b| *b);
        if let Some(rest) = trimmed.strip_prefix("#define ") {
            if active {
                if let Some(name) = rest.split_whitespace().next() {
                    defined.push(name);
                }
            }
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("#ifdef ") {
            let name = rest.split_whitespace().next().unwrap_or("");
            stack.push(defined.contains(&name));
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("#ifndef ") {
            let name = rest.split_whitespace().next().unwrap_or("");
            stack.push(!defined.contains(&name));
            continue;
        }
        if trimmed.starts_with("#else") {
            if let Some(last) = stack.last_mut() {
                *last = !*last;
            }
            continue;
        }
        if trimmed.starts_with("#endif") {
            stack.pop();
            continue;
        }
        if active {
            out.push(line);
        }
    }
    out
}

/// Scan source text for `<qualifier> <type> <name>;` declarations. Good
/// enough to stand in for driver reflection on sources this crate emits.
fn scan_declarations(source: &str, qualifier: &str, out: &mut Vec<(String, GlslType)>) {
    for line in active_lines(source) {
        let line = line.trim();
        let Some(rest) = line.strip_prefix(qualifier) else {
            continue;
        };
        let mut words = rest.split_whitespace();
        let Some(ty) = words.next().and_then(parse_glsl_type) else {
            continue;
        };
        let Some(name) = words.next() else { continue };
        let name = name.trim_end_matches(';');
        if name.is_empty() || out.iter().any(|(n, _)| n == name) {
            continue;
        }
        out.push((name.to_string(), ty));
    }
}

impl GpuDriver for TraceDriver {
    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn create_texture_2d(&mut self, desc: &TextureDesc, _pixels: Option<&[u8]>) -> TextureHandle {
        let handle = self.alloc();
        self.log.push(TraceCommand::CreateTexture {
            handle,
            width: desc.width,
            height: desc.height,
        });
        TextureHandle(handle)
    }

    fn update_texture_2d(
        &mut self,
        texture: TextureHandle,
        _desc: &TextureDesc,
        region: Region,
        _pixels: &[u8],
    ) {
        self.log.push(TraceCommand::UpdateTexture {
            handle: texture.0,
            region,
        });
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.log.push(TraceCommand::DeleteTexture { handle: texture.0 });
    }

    fn create_cubemap(&mut self, data: &CubemapData<'_>) -> TextureHandle {
        let handle = self.alloc();
        self.log.push(TraceCommand::CreateCubemap {
            handle,
            size: data.size,
            levels: data.levels.len(),
        });
        TextureHandle(handle)
    }

    fn create_buffer(&mut self, desc: &BufferDesc, _bytes: &[u8]) -> BufferHandle {
        let handle = self.alloc();
        self.log.push(TraceCommand::CreateBuffer {
            handle,
            byte_len: desc.byte_len,
        });
        BufferHandle(handle)
    }

    fn update_buffer(&mut self, buffer: BufferHandle, desc: &BufferDesc, _bytes: &[u8]) {
        self.log.push(TraceCommand::UpdateBuffer {
            handle: buffer.0,
            byte_len: desc.byte_len,
        });
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        self.log.push(TraceCommand::DeleteBuffer { handle: buffer.0 });
    }

    fn create_program(&mut self, vertex_src: &str, fragment_src: &str) -> Result<ProgramHandle> {
        if vertex_src.contains("#error") {
            return Err(Error::ShaderCompile {
                stage: ShaderStage::Vertex,
                log: "explicit #error directive".into(),
                source_text: vertex_src.into(),
            });
        }
        if fragment_src.contains("#error") {
            return Err(Error::ShaderCompile {
                stage: ShaderStage::Fragment,
                log: "explicit #error directive".into(),
                source_text: fragment_src.into(),
            });
        }

        let mut uniform_decls = Vec::new();
        scan_declarations(vertex_src, "uniform ", &mut uniform_decls);
        scan_declarations(fragment_src, "uniform ", &mut uniform_decls);
        let mut attribute_decls = Vec::new();
        scan_declarations(vertex_src, "attribute ", &mut attribute_decls);

        let uniforms = uniform_decls
            .into_iter()
            .enumerate()
            .map(|(i, (name, ty))| ShaderInput {
                name,
                ty,
                location: i as i32,
            })
            .collect();
        let attributes = attribute_decls
            .into_iter()
            .enumerate()
            .map(|(i, (name, ty))| ShaderInput {
                name,
                ty,
                location: i as i32,
            })
            .collect();

        let handle = self.alloc();
        self.programs.insert(
            handle,
            Reflection {
                uniforms,
                attributes,
            },
        );
        self.log.push(TraceCommand::CreateProgram { handle });
        Ok(ProgramHandle(handle))
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program.0);
        self.log.push(TraceCommand::DeleteProgram { handle: program.0 });
    }

    fn active_uniforms(&self, program: ProgramHandle) -> Vec<ShaderInput> {
        self.programs
            .get(&program.0)
            .map(|r| r.uniforms.clone())
            .unwrap_or_default()
    }

    fn active_attributes(&self, program: ProgramHandle) -> Vec<ShaderInput> {
        self.programs
            .get(&program.0)
            .map(|r| r.attributes.clone())
            .unwrap_or_default()
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        self.log.push(TraceCommand::UseProgram {
            handle: program.map(|p| p.0),
        });
    }

    fn set_uniform(&mut self, location: i32, value: &UniformValue) {
        self.log.push(TraceCommand::SetUniform {
            location,
            value: *value,
        });
    }

    fn bind_attribute(
        &mut self,
        location: u32,
        dimension: u32,
        _element: ElementKind,
        source: &AttributeSource<'_>,
    ) {
        let from_buffer = match source {
            AttributeSource::Buffer(b) => Some(b.0),
            AttributeSource::ClientMemory(_) => None,
        };
        self.log.push(TraceCommand::BindAttribute {
            location,
            dimension,
            from_buffer,
        });
    }

    fn unbind_attribute(&mut self, location: u32) {
        self.log.push(TraceCommand::UnbindAttribute { location });
    }

    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: Option<TextureHandle>) {
        self.log.push(TraceCommand::BindTexture {
            unit,
            target,
            handle: texture.map(|t| t.0),
        });
    }

    fn create_framebuffer(&mut self) -> FramebufferHandle {
        let handle = self.alloc();
        self.log.push(TraceCommand::CreateFramebuffer { handle });
        FramebufferHandle(handle)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        self.log.push(TraceCommand::DeleteFramebuffer {
            handle: framebuffer.0,
        });
    }

    fn bound_framebuffer(&self) -> Option<FramebufferHandle> {
        self.bound_framebuffer
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.bound_framebuffer = framebuffer;
        self.log.push(TraceCommand::BindFramebuffer {
            handle: framebuffer.map(|f| f.0),
        });
    }

    fn attach_texture(&mut self, point: AttachmentPoint, texture: TextureHandle) {
        self.log.push(TraceCommand::AttachTexture {
            point,
            handle: texture.0,
        });
    }

    fn copy_output_to_texture(
        &mut self,
        texture: TextureHandle,
        _format: crate::resources::ColorFormat,
        width: u32,
        height: u32,
    ) {
        self.log.push(TraceCommand::CopyOutput {
            handle: texture.0,
            width,
            height,
        });
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.log.push(TraceCommand::SetViewport { width, height });
    }

    fn set_clear_color(&mut self, color: RgbaColor) {
        self.log.push(TraceCommand::SetClearColor { color });
    }

    fn clear(&mut self, color: bool, depth: bool) {
        self.log.push(TraceCommand::Clear { color, depth });
    }

    fn set_depth_test(&mut self, on: bool) {
        self.log.push(TraceCommand::SetDepthTest(on));
    }

    fn set_depth_write(&mut self, on: bool) {
        self.log.push(TraceCommand::SetDepthWrite(on));
    }

    fn set_cull_face(&mut self, face: Option<CullFace>) {
        self.log.push(TraceCommand::SetCullFace(face));
    }

    fn set_wireframe(&mut self, on: bool) {
        self.log.push(TraceCommand::SetWireframe(on));
    }

    fn set_polygon_offset(&mut self, offset: Option<(f32, f32)>) {
        self.log.push(TraceCommand::SetPolygonOffset(offset));
    }

    fn set_color_mask(&mut self, mask: ChannelMask) {
        self.log.push(TraceCommand::SetColorMask(mask));
    }

    fn set_blending(&mut self, blend: Option<BlendMode>) {
        self.log.push(TraceCommand::SetBlending(blend));
    }

    fn draw_arrays(&mut self, primitive: PrimitiveKind, first: u32, count: u32) {
        self.log.push(TraceCommand::DrawArrays {
            primitive,
            first,
            count,
        });
    }

    fn draw_elements(
        &mut self,
        primitive: PrimitiveKind,
        count: u32,
        _element: ElementKind,
        offset: u32,
        source: &IndexSource<'_>,
    ) {
        let from_buffer = match source {
            IndexSource::Buffer(b) => Some(b.0),
            IndexSource::ClientMemory(_) => None,
        };
        self.log.push(TraceCommand::DrawElements {
            primitive,
            count,
            offset,
            from_buffer,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflection_scans_declarations() {
        let mut driver = TraceDriver::new();
        let program = driver
            .create_program(
                "uniform mat4 mvp;\nattribute vec3 vertex;\nvoid main() {}\n",
                "uniform vec4 color;\nuniform sampler2D tex;\nvoid main() {}\n",
            )
            .unwrap();

        let uniforms = driver.active_uniforms(program);
        assert_eq!(uniforms.len(), 3);
        assert_eq!(uniforms[0].name, "mvp");
        assert_eq!(uniforms[0].ty, GlslType::Mat4);
        assert_eq!(uniforms[2].ty, GlslType::Sampler2d);

        let attributes = driver.active_attributes(program);
        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes[0].name, "vertex");
        assert_eq!(attributes[0].ty, GlslType::Vec3);
    }

    #[test]
    fn reflection_honors_preprocessor_conditionals() {
        let mut driver = TraceDriver::new();
        let frag = "#ifdef DIFFUSE_MAP\nuniform sampler2D diffuseMap;\n#endif\n\
                    #ifndef DIFFUSE_MAP\nuniform vec4 materialDiffuse;\n#endif\nvoid main() {}\n";

        let bare = driver.create_program("void main() {}", frag).unwrap();
        let names: Vec<_> = driver.active_uniforms(bare).into_iter().map(|u| u.name).collect();
        assert_eq!(names, vec!["materialDiffuse".to_string()]);

        let with_define = format!("#define DIFFUSE_MAP\n{frag}");
        let mapped = driver.create_program("void main() {}", &with_define).unwrap();
        let names: Vec<_> = driver.active_uniforms(mapped).into_iter().map(|u| u.name).collect();
        assert_eq!(names, vec!["diffuseMap".to_string()]);
    }

    #[test]
    fn error_directive_fails_compilation() {
        let mut driver = TraceDriver::new();
        let err = driver.create_program("void main() {}", "#error broken").unwrap_err();
        assert!(matches!(err, Error::ShaderCompile { stage: ShaderStage::Fragment, .. }));
    }

    #[test]
    fn log_survives_driver_moves() {
        let mut driver = TraceDriver::new();
        let log = driver.log();
        driver.set_depth_test(true);
        let moved = driver;
        drop(moved);
        assert_eq!(log.commands(), vec![TraceCommand::SetDepthTest(true)]);
    }
}
