// src/phong.rs
//! Per-mesh lighting shader.
//!
//! Synthesized from the mesh's material and geometry: texture slots turn
//! into `#define` toggles prepended to the embedded GLSL, geometry buffers
//! are wired as attributes, and material colors are bound as uniforms for
//! every slot without a map. Matrices and the light are pushed through
//! setters each frame.

use glam::{Mat3, Mat4};

use crate::color::RgbaColor;
use crate::lighting::{LightKind, LightSource};
use crate::resources::{Shader, ShaderRef};
use crate::scene::MeshRef;

pub const GLOBAL_AMBIENT: RgbaColor = RgbaColor::new(0.3, 0.3, 0.3, 1.0);

const PHONG_VERT: &str = include_str!("shaders/phong.vert");
const PHONG_FRAG: &str = include_str!("shaders/phong.frag");

pub struct PhongShader {
    shader: ShaderRef,
}

impl PhongShader {
    pub fn new(mesh: &MeshRef) -> Self {
        let mesh_guard = mesh.borrow();
        let material = mesh_guard.material.borrow();
        let geometry = &mesh_guard.geometry;

        let ambient = material.textures.get("ambient").cloned();
        let diffuse = material.textures.get("diffuse").cloned();
        let specular = material.textures.get("specular").cloned();
        let opacity = material.textures.get("opacity").cloned();
        let bump = material
            .textures
            .get("normal")
            .or_else(|| material.textures.get("height"))
            .cloned();
        let tangents = geometry.attributes.get("tangent").cloned();
        let bitangents = geometry.attributes.get("bitangent").cloned();
        let texcoords = geometry.texcoords.first().cloned();

        // maps need UVs to sample; bump additionally needs a tangent frame
        let has_uv = texcoords.is_some();
        let use_ambient = has_uv && ambient.is_some();
        let use_diffuse = has_uv && diffuse.is_some();
        let use_specular = has_uv && specular.is_some();
        let use_opacity = has_uv && opacity.is_some();
        let use_bump = has_uv && bump.is_some() && tangents.is_some() && bitangents.is_some();

        let mut defines = String::new();
        if has_uv {
            defines.push_str("#define USE_TEXCOORD\n");
        }
        if use_ambient {
            defines.push_str("#define AMBIENT_MAP\n");
        }
        if use_diffuse {
            defines.push_str("#define DIFFUSE_MAP\n");
        }
        if use_specular {
            defines.push_str("#define SPECULAR_MAP\n");
        }
        if use_opacity {
            defines.push_str("#define OPACITY_MAP\n");
        }
        if use_bump {
            defines.push_str("#define BUMP_MAP\n");
        }

        let shader = Shader::new(
            format!("{defines}{PHONG_VERT}"),
            format!("{defines}{PHONG_FRAG}"),
        );
        {
            let mut sh = shader.borrow_mut();
            sh.set_attribute("vertex", geometry.vertices.clone());
            if let Some(normals) = &geometry.normals {
                sh.set_attribute("normal", normals.clone());
            }
            if let Some(texcoords) = texcoords {
                sh.set_attribute("texCoord", texcoords);
            }
            if use_bump {
                sh.set_attribute("tangent", tangents.unwrap());
                sh.set_attribute("bitangent", bitangents.unwrap());
                sh.set_texture("bumpMap", bump.unwrap());
            }
            if use_ambient {
                sh.set_texture("ambientMap", ambient.unwrap());
            } else {
                sh.set_uniform("materialAmbient", material.ambient);
            }
            if use_diffuse {
                sh.set_texture("diffuseMap", diffuse.unwrap());
            } else {
                sh.set_uniform("materialDiffuse", material.diffuse);
            }
            if use_specular {
                sh.set_texture("specularMap", specular.unwrap());
            } else {
                sh.set_uniform("materialSpecular", material.specular);
            }
            if use_opacity {
                sh.set_texture("opacityMap", opacity.unwrap());
            }
            sh.set_uniform("materialEmission", material.emission);
            sh.set_uniform("materialShininess", material.shininess);
        }

        Self { shader }
    }

    pub fn shader(&self) -> ShaderRef {
        self.shader.clone()
    }

    pub fn set_light(&self, light: &LightSource, global_ambient: RgbaColor) {
        let mut sh = self.shader.borrow_mut();
        sh.set_uniform("globalAmbient", global_ambient);
        sh.set_uniform("lightPosition", light.position);
        sh.set_uniform("lightAmbient", light.ambient);
        sh.set_uniform("lightDiffuse", light.diffuse);
        sh.set_uniform("lightSpecular", light.specular);
        sh.set_uniform("lightConstantAttenuation", light.constant_attenuation);
        sh.set_uniform("lightLinearAttenuation", light.linear_attenuation);
        sh.set_uniform("lightQuadraticAttenuation", light.quadratic_attenuation);
        let cutoff_cos = if light.kind == LightKind::Spot {
            light.spot_cutoff.to_radians().cos()
        } else {
            -1.0
        };
        sh.set_uniform("lightSpotCutoffCos", cutoff_cos);
        sh.set_uniform("lightSpotDirection", light.spot_direction);
        sh.set_uniform("lightSpotExponent", light.spot_exponent);
    }

    pub fn set_model_view(&self, matrix: Mat4) {
        let mut sh = self.shader.borrow_mut();
        sh.set_uniform("modelViewMatrix", matrix);
        sh.set_uniform("normalMatrix", Mat3::from_mat4(matrix).inverse().transpose());
    }

    pub fn set_model_view_projection(&self, matrix: Mat4) {
        self.shader
            .borrow_mut()
            .set_uniform("modelViewProjectionMatrix", matrix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{ColorFormat, Texture2d, UniformValue};
    use crate::scene::{Material, Mesh};

    #[test]
    fn untextured_material_binds_color_uniforms() {
        let material = Material::new();
        material.borrow_mut().shininess = 16.0;
        let mesh = Mesh::unit_quad(material);
        let phong = PhongShader::new(&mesh);

        let shader = phong.shader();
        let sh = shader.borrow();
        assert!(!sh.vertex_source().contains("#define DIFFUSE_MAP"));
        assert!(sh.uniform("materialDiffuse").is_some());
        assert_eq!(sh.uniform("materialShininess"), Some(&UniformValue::Float(16.0)));
        assert!(sh.attribute("vertex").is_some());
        assert!(sh.attribute("normal").is_some());
    }

    #[test]
    fn diffuse_map_toggles_define_and_texture_slot() {
        let material = Material::new();
        material.borrow_mut().textures.insert(
            "diffuse".into(),
            Texture2d::from_pixels(1, 1, ColorFormat::Rgba, vec![0; 4]),
        );
        let mesh = Mesh::unit_quad(material);
        let phong = PhongShader::new(&mesh);

        let shader = phong.shader();
        let sh = shader.borrow();
        assert!(sh.fragment_source().contains("#define DIFFUSE_MAP"));
        assert!(sh.texture("diffuseMap").is_some());
        assert!(sh.uniform("materialDiffuse").is_none());
    }

    #[test]
    fn spot_cutoff_collapses_for_non_spot_lights() {
        let mesh = Mesh::unit_quad(Material::new());
        let phong = PhongShader::new(&mesh);
        let light = LightSource {
            kind: LightKind::Point,
            position: glam::Vec4::W,
            ambient: RgbaColor::BLACK,
            diffuse: RgbaColor::WHITE,
            specular: RgbaColor::WHITE,
            constant_attenuation: 1.0,
            linear_attenuation: 0.0,
            quadratic_attenuation: 0.0,
            spot_direction: glam::Vec3::NEG_Y,
            spot_cutoff: 45.0,
            spot_exponent: 2.0,
        };
        phong.set_light(&light, GLOBAL_AMBIENT);
        let shader = phong.shader();
        let sh = shader.borrow();
        assert_eq!(sh.uniform("lightSpotCutoffCos"), Some(&UniformValue::Float(-1.0)));
    }
}
