// src/binding.rs
//! Shader binding protocol.
//!
//! `apply` binds a shader's program and pushes everything the program
//! currently knows: uniform values, vertex attributes from their backing
//! buffers (vertex-buffer-object path preferred, client-memory fallback
//! otherwise) and samplers on sequential texture units, 2D first and then
//! cube. `release` unbinds attributes, texture units and the program.
//! Nothing is cached between an apply/release pair beyond what the
//! resource cache already holds, so applying is idempotent.

use crate::cache::ResourceCache;
use crate::driver::{AttributeSource, GpuDriver, IndexSource, ProgramHandle, TextureTarget};
use crate::error::{Error, Result};
use crate::resources::{BufferRef, ShaderRef, UniformValue};

impl ResourceCache {
    pub fn apply(&mut self, driver: &mut dyn GpuDriver, shader: &ShaderRef) -> Result<ProgramHandle> {
        let (program, table) = self.shader(driver, shader)?;
        driver.use_program(Some(program));

        {
            let guard = shader.borrow();
            for uniform in &table.uniforms {
                if let Some(value) = guard.uniform(&uniform.name) {
                    driver.set_uniform(uniform.location, value);
                }
            }
        }

        let vbo = driver.capabilities().vertex_buffers;
        for attribute in &table.attributes {
            let buffer = shader.borrow().attribute(&attribute.name).cloned();
            let Some(buffer) = buffer else {
                continue;
            };
            let (dimension, element) = {
                let buf = buffer.borrow();
                (buf.dimension(), buf.element())
            };
            if vbo {
                let handle = self.buffer(driver, &buffer)?;
                driver.bind_attribute(
                    attribute.location as u32,
                    dimension,
                    element,
                    &AttributeSource::Buffer(handle),
                );
            } else {
                let buf = buffer.borrow();
                let bytes = buf.bytes().ok_or(Error::EmptyBuffer(buf.id().raw()))?;
                driver.bind_attribute(
                    attribute.location as u32,
                    dimension,
                    element,
                    &AttributeSource::ClientMemory(bytes),
                );
            }
        }

        for sampler in &table.samplers {
            let unit_value = UniformValue::Int(sampler.unit as i32);
            match sampler.target {
                TextureTarget::Tex2d => {
                    let texture = shader.borrow().texture(&sampler.name).cloned();
                    if let Some(texture) = texture {
                        let handle = self.texture(driver, &texture)?;
                        driver.bind_texture(sampler.unit, TextureTarget::Tex2d, Some(handle));
                        driver.set_uniform(sampler.location, &unit_value);
                    }
                }
                TextureTarget::Cubemap => {
                    let cubemap = shader.borrow().cubemap(&sampler.name).cloned();
                    if let Some(cubemap) = cubemap {
                        let handle = self.cubemap(driver, &cubemap)?;
                        driver.bind_texture(sampler.unit, TextureTarget::Cubemap, Some(handle));
                        driver.set_uniform(sampler.location, &unit_value);
                    }
                }
            }
        }

        Ok(program)
    }

    pub fn release(&mut self, driver: &mut dyn GpuDriver, shader: &ShaderRef) {
        if let Some((_, table)) = self.shader_entry(shader) {
            for attribute in &table.attributes {
                driver.unbind_attribute(attribute.location as u32);
            }
            for sampler in &table.samplers {
                driver.bind_texture(sampler.unit, sampler.target, None);
            }
        }
        driver.use_program(None);
    }

    /// Issue an indexed draw for `indices`, preferring the buffer-object
    /// path and falling back to client memory.
    pub fn draw_indexed(
        &mut self,
        driver: &mut dyn GpuDriver,
        indices: &BufferRef,
        primitive: crate::driver::PrimitiveKind,
        count: u32,
        offset: u32,
    ) -> Result<()> {
        let element = indices.borrow().element();
        if driver.capabilities().vertex_buffers {
            let handle = self.buffer(driver, indices)?;
            driver.draw_elements(primitive, count, element, offset, &IndexSource::Buffer(handle));
        } else {
            let guard = indices.borrow();
            let bytes = guard.bytes().ok_or(Error::EmptyBuffer(guard.id().raw()))?;
            driver.draw_elements(
                primitive,
                count,
                element,
                offset,
                &IndexSource::ClientMemory(bytes),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::trace::{TraceCommand, TraceDriver};
    use crate::driver::Capabilities;
    use crate::resources::{ColorFormat, Cubemap, DataBuffer, Shader, Texture2d};

    fn textured_shader() -> ShaderRef {
        let shader = Shader::new(
            "uniform mat4 mvp;\nattribute vec3 vertex;\nvoid main() {}",
            "uniform sampler2D tex;\nuniform samplerCube env;\nvoid main() {}",
        );
        {
            let mut sh = shader.borrow_mut();
            sh.set_uniform("mvp", glam::Mat4::IDENTITY);
            sh.set_attribute("vertex", DataBuffer::from_vec3s(&[[0.0; 3]; 3]));
            sh.set_texture(
                "tex",
                Texture2d::from_pixels(1, 1, ColorFormat::Rgba, vec![0; 4]),
            );
            sh.set_cubemap(
                "env",
                Cubemap::from_faces(1, std::array::from_fn(|_| vec![0; 4])),
            );
        }
        shader
    }

    #[test]
    fn apply_binds_program_uniforms_attributes_and_samplers() {
        let mut driver = TraceDriver::new();
        let log = driver.log();
        let mut cache = ResourceCache::new();
        let shader = textured_shader();

        cache.apply(&mut driver, &shader).unwrap();

        assert_eq!(log.count(|c| matches!(c, TraceCommand::UseProgram { handle: Some(_) })), 2); // resolve + apply
        assert_eq!(log.count(|c| matches!(c, TraceCommand::BindAttribute { from_buffer: Some(_), .. })), 1);
        // 2D sampler on unit 0, cubemap on unit 1
        assert_eq!(
            log.count(|c| {
                matches!(
                    c,
                    TraceCommand::BindTexture { unit: 0, target: TextureTarget::Tex2d, handle: Some(_) }
                )
            }),
            1
        );
        assert_eq!(
            log.count(|c| {
                matches!(
                    c,
                    TraceCommand::BindTexture { unit: 1, target: TextureTarget::Cubemap, handle: Some(_) }
                )
            }),
            1
        );
    }

    #[test]
    fn apply_is_stateless_across_calls() {
        let mut driver = TraceDriver::new();
        let log = driver.log();
        let mut cache = ResourceCache::new();
        let shader = textured_shader();

        cache.apply(&mut driver, &shader).unwrap();
        cache.release(&mut driver, &shader);
        log.clear();

        cache.apply(&mut driver, &shader).unwrap();
        let first = log.commands();
        cache.release(&mut driver, &shader);
        log.clear();
        cache.apply(&mut driver, &shader).unwrap();
        assert_eq!(log.commands(), first);
    }

    #[test]
    fn release_unbinds_attributes_units_and_program() {
        let mut driver = TraceDriver::new();
        let log = driver.log();
        let mut cache = ResourceCache::new();
        let shader = textured_shader();

        cache.apply(&mut driver, &shader).unwrap();
        log.clear();
        cache.release(&mut driver, &shader);

        let commands = log.commands();
        assert!(commands.contains(&TraceCommand::UnbindAttribute { location: 0 }));
        assert!(commands.contains(&TraceCommand::BindTexture {
            unit: 0,
            target: TextureTarget::Tex2d,
            handle: None
        }));
        assert!(commands.contains(&TraceCommand::BindTexture {
            unit: 1,
            target: TextureTarget::Cubemap,
            handle: None
        }));
        assert_eq!(commands.last(), Some(&TraceCommand::UseProgram { handle: None }));
    }

    #[test]
    fn attributes_fall_back_to_client_memory_without_vbos() {
        let mut driver = TraceDriver::with_capabilities(Capabilities {
            vertex_buffers: false,
            ..Capabilities::all()
        });
        let log = driver.log();
        let mut cache = ResourceCache::new();
        let shader = Shader::new("attribute vec2 vertex;\nvoid main() {}", "void main() {}");
        shader
            .borrow_mut()
            .set_attribute("vertex", DataBuffer::from_vec2s(&[[0.0; 2]; 3]));

        cache.apply(&mut driver, &shader).unwrap();
        assert_eq!(
            log.count(|c| matches!(c, TraceCommand::BindAttribute { from_buffer: None, .. })),
            1
        );
    }
}
