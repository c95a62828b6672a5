// src/driver/mod.rs
//! The narrow interface to the GPU.
//!
//! Everything the pipeline asks of a graphics driver goes through
//! [`GpuDriver`]: resource allocation and upload, program compilation with
//! active-input reflection, framebuffer juggling, fixed-function state and
//! draws. The cache and renderer never talk to a concrete API directly.
//!
//! Backends: [`trace::TraceDriver`] records every call headlessly (tests,
//! debugging); `gl::GlDriver` maps onto OpenGL via `glow` behind the `gl`
//! feature.

pub mod trace;

#[cfg(feature = "gl")]
pub mod gl;

use crate::color::{ChannelMask, RgbaColor};
use crate::error::Result;
use crate::resources::{
    BlockKind, BufferUsage, ColorFormat, ElementKind, Region, TextureFilter, TextureWrap,
    UniformValue,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferHandle(pub u32);

/// Driver feature set queried once at startup.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub framebuffers: bool,
    pub vertex_buffers: bool,
    pub shaders: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            framebuffers: true,
            vertex_buffers: true,
            shaders: true,
        }
    }
}

/// Creation-time texture parameters, snapshotted by the cache.
#[derive(Debug, Clone, Copy)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: ColorFormat,
    pub wrap: TextureWrap,
    pub filter: TextureFilter,
    pub mipmapping: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct BufferDesc {
    pub block: BlockKind,
    pub byte_len: u32,
    pub usage: BufferUsage,
}

/// Borrowed cubemap upload data: six faces per mip level, RGBA8.
pub struct CubemapData<'a> {
    pub size: u32,
    pub levels: Vec<[&'a [u8]; 6]>,
}

/// GLSL types the reflection surface distinguishes. Samplers are told
/// apart from plain uniforms by this reflected type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlslType {
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
    Sampler2d,
    SamplerCube,
}

/// One active uniform or attribute reported by the driver after linking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderInput {
    pub name: String,
    pub ty: GlslType,
    pub location: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureTarget {
    Tex2d,
    Cubemap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentPoint {
    Color0,
    Color1,
    Depth,
}

/// Where a vertex attribute streams from: a GPU buffer (preferred) or
/// client memory (fallback when vertex buffer objects are absent).
pub enum AttributeSource<'a> {
    Buffer(BufferHandle),
    ClientMemory(&'a [u8]),
}

pub enum IndexSource<'a> {
    Buffer(BufferHandle),
    ClientMemory(&'a [u8]),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
    ConstantAlpha,
    OneMinusConstantAlpha,
}

/// Blend configuration; the equation is always additive (`FUNC_ADD`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendMode {
    pub src: BlendFactor,
    pub dst: BlendFactor,
    pub constant: Option<RgbaColor>,
}

impl BlendMode {
    /// Standard source-over compositing.
    pub fn alpha_over() -> Self {
        Self {
            src: BlendFactor::SrcAlpha,
            dst: BlendFactor::OneMinusSrcAlpha,
            constant: None,
        }
    }

    /// Constant-alpha mix used for transparent meshes.
    pub fn constant_alpha(alpha: f32) -> Self {
        Self {
            src: BlendFactor::OneMinusConstantAlpha,
            dst: BlendFactor::ConstantAlpha,
            constant: Some(RgbaColor::new(0.0, 0.0, 0.0, alpha)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullFace {
    Back,
    Front,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Points,
    Lines,
    Triangles,
    TriangleStrip,
}

pub trait GpuDriver {
    fn capabilities(&self) -> Capabilities;

    // ---------- Textures ----------
    fn create_texture_2d(&mut self, desc: &TextureDesc, pixels: Option<&[u8]>) -> TextureHandle;
    fn update_texture_2d(
        &mut self,
        texture: TextureHandle,
        desc: &TextureDesc,
        region: Region,
        pixels: &[u8],
    );
    fn delete_texture(&mut self, texture: TextureHandle);
    fn create_cubemap(&mut self, data: &CubemapData<'_>) -> TextureHandle;

    // ---------- Buffers ----------
    fn create_buffer(&mut self, desc: &BufferDesc, bytes: &[u8]) -> BufferHandle;
    fn update_buffer(&mut self, buffer: BufferHandle, desc: &BufferDesc, bytes: &[u8]);
    fn delete_buffer(&mut self, buffer: BufferHandle);

    // ---------- Programs ----------
    fn create_program(&mut self, vertex_src: &str, fragment_src: &str) -> Result<ProgramHandle>;
    fn delete_program(&mut self, program: ProgramHandle);
    fn active_uniforms(&self, program: ProgramHandle) -> Vec<ShaderInput>;
    fn active_attributes(&self, program: ProgramHandle) -> Vec<ShaderInput>;
    fn use_program(&mut self, program: Option<ProgramHandle>);
    fn set_uniform(&mut self, location: i32, value: &UniformValue);
    fn bind_attribute(
        &mut self,
        location: u32,
        dimension: u32,
        element: ElementKind,
        source: &AttributeSource<'_>,
    );
    fn unbind_attribute(&mut self, location: u32);
    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: Option<TextureHandle>);

    // ---------- Framebuffers ----------
    fn create_framebuffer(&mut self) -> FramebufferHandle;
    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle);
    fn bound_framebuffer(&self) -> Option<FramebufferHandle>;
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>);
    fn attach_texture(&mut self, point: AttachmentPoint, texture: TextureHandle);
    /// Copy the currently bound output into a texture; the capture path
    /// when framebuffer objects are unavailable.
    fn copy_output_to_texture(
        &mut self,
        texture: TextureHandle,
        format: ColorFormat,
        width: u32,
        height: u32,
    );

    // ---------- Fixed-function state ----------
    fn set_viewport(&mut self, width: u32, height: u32);
    fn set_clear_color(&mut self, color: RgbaColor);
    fn clear(&mut self, color: bool, depth: bool);
    fn set_depth_test(&mut self, on: bool);
    fn set_depth_write(&mut self, on: bool);
    fn set_cull_face(&mut self, face: Option<CullFace>);
    fn set_wireframe(&mut self, on: bool);
    fn set_polygon_offset(&mut self, offset: Option<(f32, f32)>);
    fn set_color_mask(&mut self, mask: ChannelMask);
    fn set_blending(&mut self, blend: Option<BlendMode>);

    // ---------- Draws ----------
    fn draw_arrays(&mut self, primitive: PrimitiveKind, first: u32, count: u32);
    fn draw_elements(
        &mut self,
        primitive: PrimitiveKind,
        count: u32,
        element: ElementKind,
        offset: u32,
        source: &IndexSource<'_>,
    );
}
