// src/driver/gl.rs
//! OpenGL backend over `glow`.
//!
//! Maps the driver trait 1:1 onto GL calls. The caller owns context and
//! window creation and hands over a loaded [`glow::Context`]. Handles are
//! small integers mapped to native objects internally; uniform locations
//! are the per-program reflection indices handed out by
//! [`GpuDriver::active_uniforms`].

use std::collections::HashMap;

use glow::HasContext;

use crate::color::{ChannelMask, RgbaColor};
use crate::error::{Error, Result, ShaderStage};
use crate::resources::{
    BlockKind, BufferUsage, ColorFormat, ElementKind, Region, TextureFilter, TextureWrap,
    UniformValue,
};

use super::{
    AttachmentPoint, AttributeSource, BlendFactor, BlendMode, BufferDesc, BufferHandle,
    Capabilities, CubemapData, CullFace, FramebufferHandle, GlslType, GpuDriver, IndexSource,
    PrimitiveKind, ProgramHandle, ShaderInput, TextureDesc, TextureHandle, TextureTarget,
};

struct ProgramRecord {
    native: glow::Program,
    uniforms: Vec<ShaderInput>,
    attributes: Vec<ShaderInput>,
    locations: Vec<glow::UniformLocation>,
}

pub struct GlDriver {
    gl: glow::Context,
    caps: Capabilities,
    next_handle: u32,
    textures: HashMap<u32, glow::Texture>,
    buffers: HashMap<u32, glow::Buffer>,
    programs: HashMap<u32, ProgramRecord>,
    framebuffers: HashMap<u32, glow::Framebuffer>,
    bound_framebuffer: Option<FramebufferHandle>,
    current_program: Option<u32>,
}

fn internal_format(format: ColorFormat) -> i32 {
    (match format {
        ColorFormat::Alpha => glow::ALPHA,
        ColorFormat::Luminance => glow::LUMINANCE,
        ColorFormat::LuminanceAlpha => glow::LUMINANCE_ALPHA,
        ColorFormat::Rgb | ColorFormat::Bgr => glow::RGB,
        ColorFormat::Rgba | ColorFormat::Bgra => glow::RGBA,
        ColorFormat::Rgb32F => glow::RGB32F,
        ColorFormat::Rgba32F => glow::RGBA32F,
        ColorFormat::Depth => glow::DEPTH_COMPONENT,
        ColorFormat::RgbCompressed | ColorFormat::RgbaCompressed => {
            log::warn!("unsupported color format {format:?}, defaulting to RGBA");
            glow::RGBA
        }
    }) as i32
}

fn pixel_format(format: ColorFormat) -> u32 {
    match format {
        ColorFormat::Alpha => glow::ALPHA,
        ColorFormat::Luminance => glow::LUMINANCE,
        ColorFormat::LuminanceAlpha => glow::LUMINANCE_ALPHA,
        ColorFormat::Rgb | ColorFormat::RgbCompressed => glow::RGB,
        ColorFormat::Bgr => glow::BGR,
        ColorFormat::Rgba | ColorFormat::RgbaCompressed => glow::RGBA,
        ColorFormat::Bgra => glow::BGRA,
        ColorFormat::Rgb32F => glow::RGB,
        ColorFormat::Rgba32F => glow::RGBA,
        ColorFormat::Depth => glow::DEPTH_COMPONENT,
    }
}

fn pixel_type(format: ColorFormat) -> u32 {
    match format {
        ColorFormat::Rgb32F | ColorFormat::Rgba32F | ColorFormat::Depth => glow::FLOAT,
        _ => glow::UNSIGNED_BYTE,
    }
}

fn buffer_target(block: BlockKind) -> u32 {
    match block {
        BlockKind::Vertex => glow::ARRAY_BUFFER,
        BlockKind::Index => glow::ELEMENT_ARRAY_BUFFER,
        BlockKind::PixelPack => glow::PIXEL_PACK_BUFFER,
    }
}

fn buffer_usage(usage: BufferUsage) -> u32 {
    match usage {
        BufferUsage::StaticDraw => glow::STATIC_DRAW,
        BufferUsage::DynamicDraw => glow::DYNAMIC_DRAW,
        BufferUsage::StaticCopy => glow::STATIC_COPY,
        BufferUsage::DynamicCopy => glow::DYNAMIC_COPY,
    }
}

fn element_type(element: ElementKind) -> u32 {
    match element {
        ElementKind::U8 => glow::UNSIGNED_BYTE,
        ElementKind::I8 => glow::BYTE,
        ElementKind::U16 => glow::UNSIGNED_SHORT,
        ElementKind::I16 => glow::SHORT,
        ElementKind::U32 => glow::UNSIGNED_INT,
        ElementKind::I32 => glow::INT,
        ElementKind::F32 => glow::FLOAT,
        ElementKind::F64 => glow::DOUBLE,
    }
}

fn primitive_mode(primitive: PrimitiveKind) -> u32 {
    match primitive {
        PrimitiveKind::Points => glow::POINTS,
        PrimitiveKind::Lines => glow::LINES,
        PrimitiveKind::Triangles => glow::TRIANGLES,
        PrimitiveKind::TriangleStrip => glow::TRIANGLE_STRIP,
    }
}

fn blend_factor(factor: BlendFactor) -> u32 {
    match factor {
        BlendFactor::Zero => glow::ZERO,
        BlendFactor::One => glow::ONE,
        BlendFactor::SrcAlpha => glow::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
        BlendFactor::ConstantAlpha => glow::CONSTANT_ALPHA,
        BlendFactor::OneMinusConstantAlpha => glow::ONE_MINUS_CONSTANT_ALPHA,
    }
}

fn attachment_point(point: AttachmentPoint) -> u32 {
    match point {
        AttachmentPoint::Color0 => glow::COLOR_ATTACHMENT0,
        AttachmentPoint::Color1 => glow::COLOR_ATTACHMENT1,
        AttachmentPoint::Depth => glow::DEPTH_ATTACHMENT,
    }
}

fn glsl_type(gl_type: u32) -> Option<GlslType> {
    match gl_type {
        glow::INT | glow::BOOL => Some(GlslType::Int),
        glow::FLOAT => Some(GlslType::Float),
        glow::FLOAT_VEC2 => Some(GlslType::Vec2),
        glow::FLOAT_VEC3 => Some(GlslType::Vec3),
        glow::FLOAT_VEC4 => Some(GlslType::Vec4),
        glow::FLOAT_MAT3 => Some(GlslType::Mat3),
        glow::FLOAT_MAT4 => Some(GlslType::Mat4),
        glow::SAMPLER_2D => Some(GlslType::Sampler2d),
        glow::SAMPLER_CUBE => Some(GlslType::SamplerCube),
        _ => None,
    }
}

impl GlDriver {
    /// Wrap a loaded GL context. Queries the feature set once.
    pub fn new(gl: glow::Context) -> Self {
        // the crate targets GL 2.0 + framebuffer objects; a context that
        // got this far supports all three feature groups
        let caps = Capabilities::all();
        Self {
            gl,
            caps,
            next_handle: 1,
            textures: HashMap::new(),
            buffers: HashMap::new(),
            programs: HashMap::new(),
            framebuffers: HashMap::new(),
            bound_framebuffer: None,
            current_program: None,
        }
    }

    fn alloc(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn setup_tex_parameters(&self, target: u32, desc: &TextureDesc) {
        let gl = &self.gl;
        unsafe {
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            let wrap = match desc.wrap {
                TextureWrap::Repeat => glow::REPEAT,
                TextureWrap::Clamp => glow::CLAMP_TO_EDGE,
            } as i32;
            gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, wrap);
            gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, wrap);
            let filter = match desc.filter {
                TextureFilter::Nearest => glow::NEAREST,
                TextureFilter::Linear => glow::LINEAR,
            } as i32;
            let min_filter = if desc.mipmapping {
                glow::LINEAR_MIPMAP_LINEAR as i32
            } else {
                filter
            };
            gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, min_filter);
            gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, filter);
        }
    }

    fn compile_stage(&self, kind: u32, stage: ShaderStage, source: &str) -> Result<glow::Shader> {
        let gl = &self.gl;
        unsafe {
            let shader = gl
                .create_shader(kind)
                .map_err(|log| Error::ShaderCompile {
                    stage,
                    log,
                    source_text: source.into(),
                })?;
            gl.shader_source(shader, source);
            gl.compile_shader(shader);
            if !gl.get_shader_compile_status(shader) {
                let log = gl.get_shader_info_log(shader);
                gl.delete_shader(shader);
                return Err(Error::ShaderCompile {
                    stage,
                    log,
                    source_text: source.into(),
                });
            }
            Ok(shader)
        }
    }
}

impl GpuDriver for GlDriver {
    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn create_texture_2d(&mut self, desc: &TextureDesc, pixels: Option<&[u8]>) -> TextureHandle {
        let handle = self.alloc();
        let gl = &self.gl;
        let texture = unsafe {
            let texture = gl.create_texture().expect("glGenTextures failed");
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            texture
        };
        self.setup_tex_parameters(glow::TEXTURE_2D, desc);
        unsafe {
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal_format(desc.format),
                desc.width as i32,
                desc.height as i32,
                0,
                pixel_format(desc.format),
                pixel_type(desc.format),
                pixels,
            );
            if desc.mipmapping && pixels.is_some() {
                gl.generate_mipmap(glow::TEXTURE_2D);
            }
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
        self.textures.insert(handle, texture);
        TextureHandle(handle)
    }

    fn update_texture_2d(
        &mut self,
        texture: TextureHandle,
        desc: &TextureDesc,
        region: Region,
        pixels: &[u8],
    ) {
        let Some(&native) = self.textures.get(&texture.0) else {
            return;
        };
        let gl = &self.gl;
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(native));
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                region.x as i32,
                region.y as i32,
                region.width as i32,
                region.height as i32,
                pixel_format(desc.format),
                pixel_type(desc.format),
                glow::PixelUnpackData::Slice(pixels),
            );
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        if let Some(native) = self.textures.remove(&texture.0) {
            unsafe { self.gl.delete_texture(native) };
        }
    }

    fn create_cubemap(&mut self, data: &CubemapData<'_>) -> TextureHandle {
        let handle = self.alloc();
        let gl = &self.gl;
        let texture = unsafe {
            let texture = gl.create_texture().expect("glGenTextures failed");
            gl.bind_texture(glow::TEXTURE_CUBE_MAP, Some(texture));
            gl.tex_parameter_i32(
                glow::TEXTURE_CUBE_MAP,
                glow::TEXTURE_MIN_FILTER,
                if data.levels.len() > 1 {
                    glow::LINEAR_MIPMAP_LINEAR as i32
                } else {
                    glow::LINEAR as i32
                },
            );
            gl.tex_parameter_i32(glow::TEXTURE_CUBE_MAP, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            texture
        };
        for (mip, faces) in data.levels.iter().enumerate() {
            let side = (data.size >> mip).max(1) as i32;
            for (face, bytes) in faces.iter().enumerate() {
                unsafe {
                    gl.tex_image_2d(
                        glow::TEXTURE_CUBE_MAP_POSITIVE_X + face as u32,
                        mip as i32,
                        glow::RGBA as i32,
                        side,
                        side,
                        0,
                        glow::RGBA,
                        glow::UNSIGNED_BYTE,
                        Some(bytes),
                    );
                }
            }
        }
        unsafe { gl.bind_texture(glow::TEXTURE_CUBE_MAP, None) };
        self.textures.insert(handle, texture);
        TextureHandle(handle)
    }

    fn create_buffer(&mut self, desc: &BufferDesc, bytes: &[u8]) -> BufferHandle {
        let handle = self.alloc();
        let gl = &self.gl;
        let target = buffer_target(desc.block);
        let buffer = unsafe {
            let buffer = gl.create_buffer().expect("glGenBuffers failed");
            gl.bind_buffer(target, Some(buffer));
            gl.buffer_data_u8_slice(target, bytes, buffer_usage(desc.usage));
            gl.bind_buffer(target, None);
            buffer
        };
        self.buffers.insert(handle, buffer);
        BufferHandle(handle)
    }

    fn update_buffer(&mut self, buffer: BufferHandle, desc: &BufferDesc, bytes: &[u8]) {
        let Some(&native) = self.buffers.get(&buffer.0) else {
            return;
        };
        let gl = &self.gl;
        let target = buffer_target(desc.block);
        unsafe {
            gl.bind_buffer(target, Some(native));
            gl.buffer_data_u8_slice(target, bytes, buffer_usage(desc.usage));
            gl.bind_buffer(target, None);
        }
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if let Some(native) = self.buffers.remove(&buffer.0) {
            unsafe { self.gl.delete_buffer(native) };
        }
    }

    fn create_program(&mut self, vertex_src: &str, fragment_src: &str) -> Result<ProgramHandle> {
        let vertex = self.compile_stage(glow::VERTEX_SHADER, ShaderStage::Vertex, vertex_src)?;
        let fragment =
            match self.compile_stage(glow::FRAGMENT_SHADER, ShaderStage::Fragment, fragment_src) {
                Ok(fragment) => fragment,
                Err(err) => {
                    unsafe { self.gl.delete_shader(vertex) };
                    return Err(err);
                }
            };

        let gl = &self.gl;
        let native = unsafe {
            let program = gl.create_program().map_err(|log| Error::ShaderLink { log })?;
            gl.attach_shader(program, vertex);
            gl.attach_shader(program, fragment);
            gl.link_program(program);
            gl.detach_shader(program, vertex);
            gl.detach_shader(program, fragment);
            gl.delete_shader(vertex);
            gl.delete_shader(fragment);
            if !gl.get_program_link_status(program) {
                let log = gl.get_program_info_log(program);
                gl.delete_program(program);
                return Err(Error::ShaderLink { log });
            }
            program
        };

        let mut uniforms = Vec::new();
        let mut attributes = Vec::new();
        let mut locations = Vec::new();
        unsafe {
            for index in 0..gl.get_active_uniforms(native) {
                let Some(info) = gl.get_active_uniform(native, index) else {
                    continue;
                };
                let Some(ty) = glsl_type(info.utype) else {
                    log::warn!("uniform {} has an unsupported GLSL type", info.name);
                    continue;
                };
                let Some(location) = gl.get_uniform_location(native, &info.name) else {
                    continue;
                };
                uniforms.push(ShaderInput {
                    name: info.name,
                    ty,
                    location: locations.len() as i32,
                });
                locations.push(location);
            }
            for index in 0..gl.get_active_attributes(native) {
                let Some(info) = gl.get_active_attribute(native, index) else {
                    continue;
                };
                let Some(ty) = glsl_type(info.atype) else {
                    continue;
                };
                let Some(location) = gl.get_attrib_location(native, &info.name) else {
                    continue;
                };
                attributes.push(ShaderInput {
                    name: info.name,
                    ty,
                    location: location as i32,
                });
            }
        }

        let handle = self.alloc();
        self.programs.insert(
            handle,
            ProgramRecord {
                native,
                uniforms,
                attributes,
                locations,
            },
        );
        Ok(ProgramHandle(handle))
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if let Some(record) = self.programs.remove(&program.0) {
            unsafe { self.gl.delete_program(record.native) };
        }
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
        self.current_program = program.map(|p| p.0);
        let native = program.and_then(|p| self.programs.get(&p.0)).map(|r| r.native);
        unsafe { self.gl.use_program(native) };
    }

    fn set_uniform(&mut self, location: i32, value: &UniformValue) {
        let Some(record) = self.current_program.and_then(|p| self.programs.get(&p)) else {
            return;
        };
        let Some(native) = record.locations.get(location as usize) else {
            return;
        };
        let gl = &self.gl;
        unsafe {
            match value {
                UniformValue::Int(v) => gl.uniform_1_i32(Some(native), *v),
                UniformValue::Float(v) => gl.uniform_1_f32(Some(native), *v),
                UniformValue::Float2(v) => gl.uniform_2_f32_slice(Some(native), v),
                UniformValue::Float3(v) => gl.uniform_3_f32_slice(Some(native), v),
                UniformValue::Float4(v) => gl.uniform_4_f32_slice(Some(native), v),
                UniformValue::Mat3(v) => gl.uniform_matrix_3_f32_slice(Some(native), false, v),
                UniformValue::Mat4(v) => gl.uniform_matrix_4_f32_slice(Some(native), false, v),
            }
        }
    }

    fn bind_attribute(
        &mut self,
        location: u32,
        dimension: u32,
        element: ElementKind,
        source: &AttributeSource<'_>,
    ) {
        let AttributeSource::Buffer(buffer) = source else {
            log::error!("client-memory attributes are not supported by the GL backend");
            return;
        };
        let Some(&native) = self.buffers.get(&buffer.0) else {
            return;
        };
        let gl = &self.gl;
        unsafe {
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(native));
            gl.enable_vertex_attrib_array(location);
            gl.vertex_attrib_pointer_f32(
                location,
                dimension as i32,
                element_type(element),
                false,
                0,
                0,
            );
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
    }

    fn unbind_attribute(&mut self, location: u32) {
        unsafe { self.gl.disable_vertex_attrib_array(location) };
    }

    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: Option<TextureHandle>) {
        let target = match target {
            TextureTarget::Tex2d => glow::TEXTURE_2D,
            TextureTarget::Cubemap => glow::TEXTURE_CUBE_MAP,
        };
        let native = texture.and_then(|t| self.textures.get(&t.0)).copied();
        let gl = &self.gl;
        unsafe {
            gl.active_texture(glow::TEXTURE0 + unit);
            gl.bind_texture(target, native);
        }
    }

    fn create_framebuffer(&mut self) -> FramebufferHandle {
        let handle = self.alloc();
        let native = unsafe { self.gl.create_framebuffer().expect("glGenFramebuffers failed") };
        self.framebuffers.insert(handle, native);
        FramebufferHandle(handle)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        if let Some(native) = self.framebuffers.remove(&framebuffer.0) {
            unsafe { self.gl.delete_framebuffer(native) };
        }
    }

    fn bound_framebuffer(&self) -> Option<FramebufferHandle> {
        self.bound_framebuffer
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.bound_framebuffer = framebuffer;
        let native = framebuffer.and_then(|f| self.framebuffers.get(&f.0)).copied();
        unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, native) };
    }

    fn attach_texture(&mut self, point: AttachmentPoint, texture: TextureHandle) {
        let Some(&native) = self.textures.get(&texture.0) else {
            return;
        };
        unsafe {
            self.gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                attachment_point(point),
                glow::TEXTURE_2D,
                Some(native),
                0,
            );
        }
    }

    fn copy_output_to_texture(
        &mut self,
        texture: TextureHandle,
        format: ColorFormat,
        width: u32,
        height: u32,
    ) {
        let Some(&native) = self.textures.get(&texture.0) else {
            return;
        };
        let gl = &self.gl;
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(native));
            gl.copy_tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal_format(format) as u32,
                0,
                0,
                width as i32,
                height as i32,
                0,
            );
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        unsafe { self.gl.viewport(0, 0, width as i32, height as i32) };
    }

    fn set_clear_color(&mut self, color: RgbaColor) {
        unsafe { self.gl.clear_color(color.r, color.g, color.b, color.a) };
    }

    fn clear(&mut self, color: bool, depth: bool) {
        let mut mask = 0;
        if color {
            mask |= glow::COLOR_BUFFER_BIT;
        }
        if depth {
            mask |= glow::DEPTH_BUFFER_BIT;
        }
        unsafe { self.gl.clear(mask) };
    }

    fn set_depth_test(&mut self, on: bool) {
        unsafe {
            if on {
                self.gl.enable(glow::DEPTH_TEST);
            } else {
                self.gl.disable(glow::DEPTH_TEST);
            }
        }
    }

    fn set_depth_write(&mut self, on: bool) {
        unsafe { self.gl.depth_mask(on) };
    }

    fn set_cull_face(&mut self, face: Option<CullFace>) {
        unsafe {
            match face {
                Some(face) => {
                    self.gl.enable(glow::CULL_FACE);
                    self.gl.cull_face(match face {
                        CullFace::Back => glow::BACK,
                        CullFace::Front => glow::FRONT,
                    });
                }
                None => self.gl.disable(glow::CULL_FACE),
            }
        }
    }

    fn set_wireframe(&mut self, on: bool) {
        let mode = if on { glow::LINE } else { glow::FILL };
        unsafe { self.gl.polygon_mode(glow::FRONT_AND_BACK, mode) };
    }

    fn set_polygon_offset(&mut self, offset: Option<(f32, f32)>) {
        unsafe {
            match offset {
                Some((factor, units)) => {
                    self.gl.enable(glow::POLYGON_OFFSET_FILL);
                    self.gl.polygon_offset(factor, units);
                }
                None => self.gl.disable(glow::POLYGON_OFFSET_FILL),
            }
        }
    }

    fn set_color_mask(&mut self, mask: ChannelMask) {
        unsafe { self.gl.color_mask(mask.red, mask.green, mask.blue, mask.alpha) };
    }

    fn set_blending(&mut self, blend: Option<BlendMode>) {
        let gl = &self.gl;
        unsafe {
            match blend {
                Some(blend) => {
                    gl.enable(glow::BLEND);
                    gl.blend_func(blend_factor(blend.src), blend_factor(blend.dst));
                    gl.blend_equation(glow::FUNC_ADD);
                    if let Some(constant) = blend.constant {
                        gl.blend_color(constant.r, constant.g, constant.b, constant.a);
                    }
                }
                None => gl.disable(glow::BLEND),
            }
        }
    }

    fn draw_arrays(&mut self, primitive: PrimitiveKind, first: u32, count: u32) {
        unsafe {
            self.gl
                .draw_arrays(primitive_mode(primitive), first as i32, count as i32)
        };
    }

    fn draw_elements(
        &mut self,
        primitive: PrimitiveKind,
        count: u32,
        element: ElementKind,
        offset: u32,
        source: &IndexSource<'_>,
    ) {
        let IndexSource::Buffer(buffer) = source else {
            log::error!("client-memory index draws are not supported by the GL backend");
            return;
        };
        let Some(&native) = self.buffers.get(&buffer.0) else {
            return;
        };
        let gl = &self.gl;
        unsafe {
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(native));
            gl.draw_elements(
                primitive_mode(primitive),
                count as i32,
                element_type(element),
                (offset * element.size()) as i32,
            );
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, None);
        }
    }
}
