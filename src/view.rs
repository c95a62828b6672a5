// src/view.rs
//! Scene drawing, the process phase of the pipeline.
//!
//! Applies the default render state, traverses the scene drawing opaque
//! meshes immediately, defers transparent ones (with their captured
//! model-view transform) into a queue drawn after the traversal, and
//! keeps one synthesized phong shader per mesh across frames.

use std::collections::HashMap;

use glam::Mat4;

use crate::cache::ResourceCache;
use crate::driver::{BlendMode, CullFace, GpuDriver};
use crate::error::Result;
use crate::lighting::LightSource;
use crate::phong::{PhongShader, GLOBAL_AMBIENT};
use crate::scene::{
    accept, MeshId, MeshRef, NodeRef, RenderOption, RenderState, SceneVisitor,
};

pub struct RenderingView {
    shaders: HashMap<MeshId, PhongShader>,
}

impl Default for RenderingView {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderingView {
    pub fn new() -> Self {
        Self {
            shaders: HashMap::new(),
        }
    }

    pub fn render(
        &mut self,
        driver: &mut dyn GpuDriver,
        cache: &mut ResourceCache,
        scene: &NodeRef,
        view: Mat4,
        projection: Mat4,
        light: &LightSource,
    ) -> Result<()> {
        // refresh the light on every shader cached in earlier frames
        for shader in self.shaders.values() {
            shader.set_light(light, GLOBAL_AMBIENT);
        }

        let mut pass = ProcessPass {
            driver,
            cache,
            shaders: &mut self.shaders,
            model_view: view,
            projection,
            state: RenderState::pipeline_default(),
            queue: Vec::new(),
            light: *light,
        };
        pass.apply_state(RenderState::pipeline_default());
        accept(scene, &mut pass)?;

        // Transparent meshes draw after the opaque pass in traversal
        // discovery order; they are not depth-sorted back to front, so
        // overlapping transparency can blend in the wrong order.
        let deferred = std::mem::take(&mut pass.queue);
        for item in deferred {
            pass.render_mesh(&item.mesh, item.model_view)?;
        }
        Ok(())
    }
}

struct Deferred {
    mesh: MeshRef,
    model_view: Mat4,
}

struct ProcessPass<'a> {
    driver: &'a mut dyn GpuDriver,
    cache: &'a mut ResourceCache,
    shaders: &'a mut HashMap<MeshId, PhongShader>,
    model_view: Mat4,
    projection: Mat4,
    state: RenderState,
    queue: Vec<Deferred>,
    light: LightSource,
}

impl ProcessPass<'_> {
    fn apply_state(&mut self, state: RenderState) {
        if state.is_enabled(RenderOption::WIREFRAME) {
            self.driver.set_wireframe(true);
        } else if state.is_disabled(RenderOption::WIREFRAME) {
            self.driver.set_wireframe(false);
        }
        if state.is_enabled(RenderOption::BACKFACE_CULLING) {
            self.driver.set_cull_face(Some(CullFace::Back));
        } else if state.is_disabled(RenderOption::BACKFACE_CULLING) {
            self.driver.set_cull_face(None);
        }
        if state.is_enabled(RenderOption::DEPTH_TEST) {
            self.driver.set_depth_test(true);
        } else if state.is_disabled(RenderOption::DEPTH_TEST) {
            self.driver.set_depth_test(false);
        }
    }

    fn render_mesh(&mut self, mesh: &MeshRef, model_view: Mat4) -> Result<()> {
        let (mesh_id, transparency) = {
            let m = mesh.borrow();
            let result = (m.id(), m.material.borrow().transparency);
            result
        };
        if transparency > 0.0 {
            self.driver
                .set_blending(Some(BlendMode::constant_alpha(transparency)));
        }

        let phong = match self.shaders.entry(mesh_id) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(slot) => {
                let phong = PhongShader::new(mesh);
                phong.set_light(&self.light, GLOBAL_AMBIENT);
                slot.insert(phong)
            }
        };
        phong.set_model_view(model_view);
        phong.set_model_view_projection(self.projection * model_view);
        let shader = phong.shader();

        self.cache.apply(self.driver, &shader)?;
        let (indices, primitive, count, offset) = {
            let m = mesh.borrow();
            (m.indices.clone(), m.primitive, m.draw_count, m.index_offset)
        };
        self.cache
            .draw_indexed(self.driver, &indices, primitive, count, offset)?;
        self.cache.release(self.driver, &shader);

        if transparency > 0.0 {
            self.driver.set_blending(None);
        }
        Ok(())
    }
}

impl SceneVisitor for ProcessPass<'_> {
    fn visit_transform(&mut self, matrix: &Mat4, children: &[NodeRef]) -> Result<()> {
        let previous = self.model_view;
        self.model_view = previous * *matrix;
        self.visit_children(children)?;
        self.model_view = previous;
        Ok(())
    }

    fn visit_render_state(&mut self, state: &RenderState, children: &[NodeRef]) -> Result<()> {
        let previous = self.state;
        self.state = previous.combined(state);
        self.apply_state(self.state);
        self.visit_children(children)?;
        self.state = previous;
        self.apply_state(previous);
        Ok(())
    }

    fn visit_mesh(&mut self, mesh: &MeshRef, children: &[NodeRef]) -> Result<()> {
        let transparency = mesh.borrow().material.borrow().transparency;
        if transparency > 0.0 {
            self.queue.push(Deferred {
                mesh: mesh.clone(),
                model_view: self.model_view,
            });
        } else {
            self.render_mesh(mesh, self.model_view)?;
        }
        self.visit_children(children)
    }
}
