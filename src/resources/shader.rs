// src/resources/shader.rs
//! Shader effect objects.
//!
//! A shader holds the vertex and fragment source text plus the current
//! values of its inputs: scalar/vector/matrix uniforms, vertex attributes
//! backed by data buffers, and 2D/cube texture slots. The GPU program and
//! its binding table live in the resource cache; replacing the sources at
//! runtime (hot reload) fires the change event and the cache recompiles.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

use crate::color::RgbaColor;
use crate::event::Event;

use super::buffer::BufferRef;
use super::cubemap::CubemapRef;
use super::texture::TextureRef;
use super::{next_id, ShaderId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Float2([f32; 2]),
    Float3([f32; 3]),
    Float4([f32; 4]),
    Mat3([f32; 9]),
    Mat4([f32; 16]),
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        UniformValue::Float2(v.to_array())
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Float3(v.to_array())
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        UniformValue::Float4(v.to_array())
    }
}

impl From<Mat3> for UniformValue {
    fn from(v: Mat3) -> Self {
        UniformValue::Mat3(v.to_cols_array())
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        UniformValue::Mat4(v.to_cols_array())
    }
}

impl From<RgbaColor> for UniformValue {
    fn from(c: RgbaColor) -> Self {
        UniformValue::Float4(c.to_array())
    }
}

/// Fired when the shader's source text is replaced.
#[derive(Debug, Clone, Copy)]
pub struct ShaderChange;

/// Fired when a single uniform value changes.
#[derive(Debug, Clone)]
pub struct UniformChange {
    pub name: String,
}

pub type ShaderRef = Rc<RefCell<Shader>>;

pub struct Shader {
    id: ShaderId,
    vertex_source: String,
    fragment_source: String,
    uniforms: HashMap<String, UniformValue>,
    attributes: HashMap<String, BufferRef>,
    textures: HashMap<String, TextureRef>,
    cubemaps: HashMap<String, CubemapRef>,
    changed: Event<ShaderChange>,
    uniform_changed: Event<UniformChange>,
}

impl Shader {
    pub fn new(vertex_source: impl Into<String>, fragment_source: impl Into<String>) -> ShaderRef {
        Rc::new(RefCell::new(Self {
            id: ShaderId(next_id()),
            vertex_source: vertex_source.into(),
            fragment_source: fragment_source.into(),
            uniforms: HashMap::new(),
            attributes: HashMap::new(),
            textures: HashMap::new(),
            cubemaps: HashMap::new(),
            changed: Event::new(),
            uniform_changed: Event::new(),
        }))
    }

    pub fn id(&self) -> ShaderId {
        self.id
    }

    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    /// Replace the source text (hot reload). The cache recompiles into a
    /// fresh program and only swaps it in if compilation succeeds.
    pub fn set_sources(&mut self, vertex: impl Into<String>, fragment: impl Into<String>) {
        self.vertex_source = vertex.into();
        self.fragment_source = fragment.into();
        self.changed.notify(&ShaderChange);
    }

    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) {
        let value = value.into();
        self.uniforms.insert(name.to_string(), value);
        self.uniform_changed.notify(&UniformChange { name: name.to_string() });
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(name)
    }

    pub fn uniforms(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.uniforms.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn set_attribute(&mut self, name: &str, buffer: BufferRef) {
        self.attributes.insert(name.to_string(), buffer);
    }

    pub fn unset_attribute(&mut self, name: &str) {
        self.attributes.remove(name);
    }

    pub fn attribute(&self, name: &str) -> Option<&BufferRef> {
        self.attributes.get(name)
    }

    pub fn set_texture(&mut self, name: &str, texture: TextureRef) {
        self.textures.insert(name.to_string(), texture);
    }

    pub fn texture(&self, name: &str) -> Option<&TextureRef> {
        self.textures.get(name)
    }

    pub fn set_cubemap(&mut self, name: &str, cubemap: CubemapRef) {
        self.cubemaps.insert(name.to_string(), cubemap);
    }

    pub fn cubemap(&self, name: &str) -> Option<&CubemapRef> {
        self.cubemaps.get(name)
    }

    pub fn changed(&self) -> &Event<ShaderChange> {
        &self.changed
    }

    pub fn uniform_changed(&self) -> &Event<UniformChange> {
        &self.uniform_changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_set_notifies_with_name() {
        let shader = Shader::new("v", "f");
        let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        let _sub = shader
            .borrow()
            .uniform_changed()
            .attach(move |c| seen2.borrow_mut().push(c.name.clone()));

        shader.borrow_mut().set_uniform("color", Vec4::ONE);
        shader.borrow_mut().set_uniform("shininess", 12.0f32);

        assert_eq!(*seen.borrow(), vec!["color".to_string(), "shininess".to_string()]);
        assert_eq!(
            shader.borrow().uniform("shininess"),
            Some(&UniformValue::Float(12.0))
        );
    }

    #[test]
    fn set_sources_fires_changed() {
        let shader = Shader::new("v1", "f1");
        let fired = Rc::new(std::cell::Cell::new(false));
        let fired2 = fired.clone();
        let _sub = shader.borrow().changed().attach(move |_| fired2.set(true));
        shader.borrow_mut().set_sources("v2", "f2");
        assert!(fired.get());
        assert_eq!(shader.borrow().vertex_source(), "v2");
    }
}
