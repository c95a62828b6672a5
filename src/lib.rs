// src/lib.rs
//! prism_render — a scene-graph rendering pipeline.
//!
//! Turns a tree of drawable canvases (static images, 3D viewports,
//! composites of either) into GPU draw calls while managing the lifetime
//! of the GPU resources that back engine-side objects.
//!
//! The pieces:
//! - [`cache::ResourceCache`] maps textures, buffers, shaders, cubemaps
//!   and canvas render targets to lazily created GPU handles and keeps
//!   them fresh through change notifications.
//! - [`canvas`] is the composition model: a small DAG of render targets
//!   with per-placement blending parameters and per-frame deduplication.
//! - [`renderer::Renderer`] drives the per-frame pipeline: light
//!   collection, opaque/transparent ordering, shader binding, framebuffer
//!   nesting for composites, and postprocess effects.
//! - [`driver::GpuDriver`] is the narrow interface to the GPU; the
//!   `trace` backend runs headless, the `gl` backend (feature `gl`) talks
//!   to OpenGL through `glow`.
//!
//! The whole subsystem is single-threaded and synchronous: one `process`
//! tick renders one frame on the calling thread.

pub mod binding;
pub mod cache;
pub mod camera;
pub mod canvas;
pub mod color;
pub mod driver;
pub mod effects;
pub mod error;
pub mod event;
pub mod lighting;
pub mod phong;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod view;

pub use cache::{Attachments, BindingTable, ResourceCache, SamplerBinding};
pub use camera::{CameraRef, PerspectiveCamera, StereoCamera, ViewingVolume};
pub use canvas::{
    Canvas, Canvas3d, CanvasRef, CompositeCanvas, FadeCanvas, ImageCanvas, Placement, StereoCanvas,
};
pub use color::{ChannelMask, RgbaColor};
pub use driver::GpuDriver;
pub use effects::{FxaaEffect, ShadowMapEffect};
pub use error::{Error, Result};
pub use lighting::{LightCollector, LightSource, MAX_LIGHTS};
pub use renderer::{FrameContext, PostEffect, RenderStage, Renderer};
pub use resources::{
    ColorFormat, Cubemap, DataBuffer, Region, Shader, Texture2d, UniformValue,
};
pub use scene::{Material, Mesh, RenderOption, RenderState, SceneNode, SceneVisitor};
pub use view::RenderingView;
