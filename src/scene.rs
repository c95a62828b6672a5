// src/scene.rs
//! Scene-graph collaborator surface.
//!
//! The pipeline does not own scene semantics; it only needs a tree it can
//! traverse with a visitor, where nodes contribute a transform, a render
//! state delta, a light, or a drawable mesh. Mesh and material records
//! expose exactly what drawing needs: geometry buffers, an index range,
//! a transparency scalar, color terms and name-keyed texture slots.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use bitflags::bitflags;
use glam::Mat4;

use crate::color::RgbaColor;
use crate::error::Result;
use crate::resources::{next_id, BufferRef, TextureRef};

bitflags! {
    /// Render options a state node can touch.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RenderOption: u8 {
        const WIREFRAME = 1;
        const BACKFACE_CULLING = 1 << 1;
        const DEPTH_TEST = 1 << 2;
    }
}

/// A render-state delta: options explicitly enabled, options explicitly
/// disabled, everything else untouched. Child states compose over their
/// ancestors, overriding only where set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderState {
    enabled: RenderOption,
    disabled: RenderOption,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            enabled: RenderOption::empty(),
            disabled: RenderOption::empty(),
        }
    }
}

impl RenderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The pipeline's per-frame baseline: backface culling on, depth test
    /// on, wireframe off.
    pub fn pipeline_default() -> Self {
        Self {
            enabled: RenderOption::BACKFACE_CULLING | RenderOption::DEPTH_TEST,
            disabled: RenderOption::WIREFRAME,
        }
    }

    pub fn enable(&mut self, option: RenderOption) {
        self.enabled |= option;
        self.disabled &= !option;
    }

    pub fn disable(&mut self, option: RenderOption) {
        self.disabled |= option;
        self.enabled &= !option;
    }

    pub fn is_enabled(&self, option: RenderOption) -> bool {
        self.enabled.contains(option)
    }

    pub fn is_disabled(&self, option: RenderOption) -> bool {
        self.disabled.contains(option)
    }

    /// Combine with a child delta; the child wins where it is explicit.
    pub fn combined(&self, child: &RenderState) -> RenderState {
        RenderState {
            enabled: (self.enabled & !child.disabled) | child.enabled,
            disabled: (self.disabled & !child.enabled) | child.disabled,
        }
    }
}

// ---------- Lights ----------

#[derive(Debug, Clone, Copy)]
pub struct DirectionalLight {
    pub ambient: RgbaColor,
    pub diffuse: RgbaColor,
    pub specular: RgbaColor,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            ambient: RgbaColor::new(0.1, 0.1, 0.1, 1.0),
            diffuse: RgbaColor::WHITE,
            specular: RgbaColor::WHITE,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PointLight {
    pub ambient: RgbaColor,
    pub diffuse: RgbaColor,
    pub specular: RgbaColor,
    pub constant_attenuation: f32,
    pub linear_attenuation: f32,
    pub quadratic_attenuation: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            ambient: RgbaColor::new(0.1, 0.1, 0.1, 1.0),
            diffuse: RgbaColor::WHITE,
            specular: RgbaColor::WHITE,
            constant_attenuation: 1.0,
            linear_attenuation: 0.0,
            quadratic_attenuation: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SpotLight {
    pub ambient: RgbaColor,
    pub diffuse: RgbaColor,
    pub specular: RgbaColor,
    pub constant_attenuation: f32,
    pub linear_attenuation: f32,
    pub quadratic_attenuation: f32,
    /// Cone half-angle in degrees.
    pub cutoff: f32,
    pub exponent: f32,
}

impl Default for SpotLight {
    fn default() -> Self {
        Self {
            ambient: RgbaColor::new(0.1, 0.1, 0.1, 1.0),
            diffuse: RgbaColor::WHITE,
            specular: RgbaColor::WHITE,
            constant_attenuation: 1.0,
            linear_attenuation: 0.0,
            quadratic_attenuation: 0.0,
            cutoff: 45.0,
            exponent: 1.0,
        }
    }
}

// ---------- Mesh, geometry, material ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(pub(crate) u64);

pub use crate::driver::PrimitiveKind;

/// The buffers one mesh draws from. `texcoords` holds one UV set per
/// texture unit; `attributes` carries named extras such as tangents.
pub struct GeometrySet {
    pub vertices: BufferRef,
    pub normals: Option<BufferRef>,
    pub texcoords: Vec<BufferRef>,
    pub attributes: HashMap<String, BufferRef>,
}

impl GeometrySet {
    pub fn new(vertices: BufferRef) -> Self {
        Self {
            vertices,
            normals: None,
            texcoords: Vec::new(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_normals(mut self, normals: BufferRef) -> Self {
        self.normals = Some(normals);
        self
    }

    pub fn with_texcoords(mut self, texcoords: BufferRef) -> Self {
        self.texcoords.push(texcoords);
        self
    }

    pub fn with_attribute(mut self, name: &str, buffer: BufferRef) -> Self {
        self.attributes.insert(name.to_string(), buffer);
        self
    }
}

pub struct Material {
    pub transparency: f32,
    pub ambient: RgbaColor,
    pub diffuse: RgbaColor,
    pub specular: RgbaColor,
    pub emission: RgbaColor,
    pub shininess: f32,
    pub textures: HashMap<String, TextureRef>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            transparency: 0.0,
            ambient: RgbaColor::new(0.2, 0.2, 0.2, 1.0),
            diffuse: RgbaColor::new(0.8, 0.8, 0.8, 1.0),
            specular: RgbaColor::BLACK,
            emission: RgbaColor::BLACK,
            shininess: 0.0,
            textures: HashMap::new(),
        }
    }
}

pub type MaterialRef = Rc<RefCell<Material>>;

impl Material {
    pub fn new() -> MaterialRef {
        Rc::new(RefCell::new(Self::default()))
    }
}

pub type MeshRef = Rc<RefCell<Mesh>>;

pub struct Mesh {
    id: MeshId,
    pub geometry: GeometrySet,
    pub indices: BufferRef,
    pub primitive: PrimitiveKind,
    /// Number of indices drawn.
    pub draw_count: u32,
    /// Offset into the index buffer, in elements.
    pub index_offset: u32,
    pub material: MaterialRef,
}

impl Mesh {
    pub fn new(geometry: GeometrySet, indices: BufferRef, material: MaterialRef) -> MeshRef {
        let draw_count = indices.borrow().count();
        Rc::new(RefCell::new(Self {
            id: MeshId(next_id()),
            geometry,
            indices,
            primitive: PrimitiveKind::Triangles,
            draw_count,
            index_offset: 0,
            material,
        }))
    }

    /// A unit quad in the XY plane, two triangles, with normals and UVs.
    pub fn unit_quad(material: MaterialRef) -> MeshRef {
        use crate::resources::DataBuffer;
        let vertices = DataBuffer::from_vec3s(&[
            [-0.5, -0.5, 0.0],
            [0.5, -0.5, 0.0],
            [0.5, 0.5, 0.0],
            [-0.5, 0.5, 0.0],
        ]);
        let normals = DataBuffer::from_vec3s(&[[0.0, 0.0, 1.0]; 4]);
        let texcoords =
            DataBuffer::from_vec2s(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
        let indices = DataBuffer::from_indices(&[0, 1, 2, 0, 2, 3]);
        let geometry = GeometrySet::new(vertices)
            .with_normals(normals)
            .with_texcoords(texcoords);
        Self::new(geometry, indices, material)
    }

    pub fn id(&self) -> MeshId {
        self.id
    }
}

// ---------- Scene graph ----------

pub type NodeRef = Rc<RefCell<SceneNode>>;

pub enum NodeKind {
    Group,
    Transform(Mat4),
    RenderState(RenderState),
    DirectionalLight(DirectionalLight),
    PointLight(PointLight),
    SpotLight(SpotLight),
    Mesh(MeshRef),
}

pub struct SceneNode {
    pub kind: NodeKind,
    children: Vec<NodeRef>,
}

impl SceneNode {
    fn make(kind: NodeKind) -> NodeRef {
        Rc::new(RefCell::new(Self {
            kind,
            children: Vec::new(),
        }))
    }

    pub fn group() -> NodeRef {
        Self::make(NodeKind::Group)
    }

    pub fn transform(matrix: Mat4) -> NodeRef {
        Self::make(NodeKind::Transform(matrix))
    }

    pub fn render_state(state: RenderState) -> NodeRef {
        Self::make(NodeKind::RenderState(state))
    }

    pub fn directional_light(light: DirectionalLight) -> NodeRef {
        Self::make(NodeKind::DirectionalLight(light))
    }

    pub fn point_light(light: PointLight) -> NodeRef {
        Self::make(NodeKind::PointLight(light))
    }

    pub fn spot_light(light: SpotLight) -> NodeRef {
        Self::make(NodeKind::SpotLight(light))
    }

    pub fn mesh(mesh: MeshRef) -> NodeRef {
        Self::make(NodeKind::Mesh(mesh))
    }

    pub fn children(&self) -> &[NodeRef] {
        &self.children
    }
}

/// Attach `child` under `parent`.
pub fn add_child(parent: &NodeRef, child: NodeRef) {
    parent.borrow_mut().children.push(child);
}

/// Scene traversal with one hook per node kind. Default implementations
/// descend into sub-nodes, so a visitor only overrides what it cares
/// about.
pub trait SceneVisitor {
    fn visit_group(&mut self, children: &[NodeRef]) -> Result<()> {
        self.visit_children(children)
    }

    fn visit_transform(&mut self, _matrix: &Mat4, children: &[NodeRef]) -> Result<()> {
        self.visit_children(children)
    }

    fn visit_render_state(&mut self, _state: &RenderState, children: &[NodeRef]) -> Result<()> {
        self.visit_children(children)
    }

    fn visit_directional_light(
        &mut self,
        _light: &DirectionalLight,
        children: &[NodeRef],
    ) -> Result<()> {
        self.visit_children(children)
    }

    fn visit_point_light(&mut self, _light: &PointLight, children: &[NodeRef]) -> Result<()> {
        self.visit_children(children)
    }

    fn visit_spot_light(&mut self, _light: &SpotLight, children: &[NodeRef]) -> Result<()> {
        self.visit_children(children)
    }

    fn visit_mesh(&mut self, _mesh: &MeshRef, children: &[NodeRef]) -> Result<()> {
        self.visit_children(children)
    }

    fn visit_children(&mut self, children: &[NodeRef]) -> Result<()> {
        for child in children {
            accept(child, self)?;
        }
        Ok(())
    }
}

/// Dispatch one node to the matching visitor hook.
pub fn accept<V: SceneVisitor + ?Sized>(node: &NodeRef, visitor: &mut V) -> Result<()> {
    let node = node.borrow();
    match &node.kind {
        NodeKind::Group => visitor.visit_group(&node.children),
        NodeKind::Transform(m) => visitor.visit_transform(m, &node.children),
        NodeKind::RenderState(s) => visitor.visit_render_state(s, &node.children),
        NodeKind::DirectionalLight(l) => visitor.visit_directional_light(l, &node.children),
        NodeKind::PointLight(l) => visitor.visit_point_light(l, &node.children),
        NodeKind::SpotLight(l) => visitor.visit_spot_light(l, &node.children),
        NodeKind::Mesh(m) => visitor.visit_mesh(m, &node.children),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_state_child_overrides() {
        let parent = RenderState::pipeline_default();
        let mut child = RenderState::new();
        child.disable(RenderOption::DEPTH_TEST);
        child.enable(RenderOption::WIREFRAME);

        let combined = parent.combined(&child);
        assert!(combined.is_disabled(RenderOption::DEPTH_TEST));
        assert!(combined.is_enabled(RenderOption::WIREFRAME));
        // untouched option survives from the parent
        assert!(combined.is_enabled(RenderOption::BACKFACE_CULLING));
    }

    #[test]
    fn visitor_default_traverses_depth_first() {
        struct MeshCounter(usize);
        impl SceneVisitor for MeshCounter {
            fn visit_mesh(&mut self, _mesh: &MeshRef, children: &[NodeRef]) -> Result<()> {
                self.0 += 1;
                self.visit_children(children)
            }
        }

        let root = SceneNode::group();
        let xform = SceneNode::transform(Mat4::IDENTITY);
        add_child(&xform, SceneNode::mesh(Mesh::unit_quad(Material::new())));
        add_child(&root, xform);
        add_child(&root, SceneNode::mesh(Mesh::unit_quad(Material::new())));

        let mut counter = MeshCounter(0);
        accept(&root, &mut counter).unwrap();
        assert_eq!(counter.0, 2);
    }
}
