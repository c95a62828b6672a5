// src/lighting.rs
//! Light collection, the preprocess phase of the pipeline.
//!
//! Walks the scene once per frame accumulating the model-view transform
//! and records every light source in view space. The list is reset on
//! every call; nothing carries over between frames.

use glam::{Mat4, Vec3, Vec4};

use crate::color::RgbaColor;
use crate::error::{Error, Result};
use crate::scene::{
    accept, DirectionalLight, NodeRef, PointLight, SceneVisitor, SpotLight,
};

/// Fixed shader-side light limit; exceeding it is a fatal error.
pub const MAX_LIGHTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

/// A light in view space, ready for uniform upload.
#[derive(Debug, Clone, Copy)]
pub struct LightSource {
    pub kind: LightKind,
    /// View-space position; `w == 0` encodes a direction instead
    /// (directional lights).
    pub position: Vec4,
    pub ambient: RgbaColor,
    pub diffuse: RgbaColor,
    pub specular: RgbaColor,
    pub constant_attenuation: f32,
    pub linear_attenuation: f32,
    pub quadratic_attenuation: f32,
    /// View-space cone axis; meaningful for spot lights only.
    pub spot_direction: Vec3,
    /// Cone half-angle in degrees; 180 disables the cone.
    pub spot_cutoff: f32,
    pub spot_exponent: f32,
}

impl LightSource {
    fn base(kind: LightKind, ambient: RgbaColor, diffuse: RgbaColor, specular: RgbaColor) -> Self {
        Self {
            kind,
            position: Vec4::ZERO,
            ambient,
            diffuse,
            specular,
            constant_attenuation: 1.0,
            linear_attenuation: 0.0,
            quadratic_attenuation: 0.0,
            spot_direction: Vec3::NEG_Y,
            spot_cutoff: 180.0,
            spot_exponent: 0.0,
        }
    }
}

pub struct LightCollector {
    lights: Vec<LightSource>,
    model_view: Mat4,
}

impl Default for LightCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl LightCollector {
    pub fn new() -> Self {
        Self {
            lights: Vec::new(),
            model_view: Mat4::IDENTITY,
        }
    }

    /// Collect every light in the scene into view space. Fails when the
    /// scene has no lights (the lighting shader has no usable default) or
    /// more than [`MAX_LIGHTS`].
    pub fn collect(&mut self, scene: &NodeRef, view: Mat4) -> Result<&[LightSource]> {
        self.lights.clear();
        self.model_view = view;
        accept(scene, self)?;
        if self.lights.is_empty() {
            return Err(Error::NoLights);
        }
        if self.lights.len() > MAX_LIGHTS {
            return Err(Error::TooManyLights {
                count: self.lights.len(),
                max: MAX_LIGHTS,
            });
        }
        Ok(&self.lights)
    }

    pub fn lights(&self) -> &[LightSource] {
        &self.lights
    }
}

impl SceneVisitor for LightCollector {
    fn visit_transform(&mut self, matrix: &Mat4, children: &[NodeRef]) -> Result<()> {
        let previous = self.model_view;
        self.model_view = previous * *matrix;
        self.visit_children(children)?;
        self.model_view = previous;
        Ok(())
    }

    fn visit_directional_light(
        &mut self,
        light: &DirectionalLight,
        children: &[NodeRef],
    ) -> Result<()> {
        let mut source = LightSource::base(
            LightKind::Directional,
            light.ambient,
            light.diffuse,
            light.specular,
        );
        // lights shine down their local -Y axis
        source.position = (self.model_view * Vec4::new(0.0, -1.0, 0.0, 0.0)).normalize();
        self.lights.push(source);
        self.visit_children(children)
    }

    fn visit_point_light(&mut self, light: &PointLight, children: &[NodeRef]) -> Result<()> {
        let mut source = LightSource::base(
            LightKind::Point,
            light.ambient,
            light.diffuse,
            light.specular,
        );
        source.position = self.model_view * Vec4::new(0.0, 0.0, 0.0, 1.0);
        source.constant_attenuation = light.constant_attenuation;
        source.linear_attenuation = light.linear_attenuation;
        source.quadratic_attenuation = light.quadratic_attenuation;
        self.lights.push(source);
        self.visit_children(children)
    }

    fn visit_spot_light(&mut self, light: &SpotLight, children: &[NodeRef]) -> Result<()> {
        let mut source = LightSource::base(
            LightKind::Spot,
            light.ambient,
            light.diffuse,
            light.specular,
        );
        source.position = self.model_view * Vec4::new(0.0, 0.0, 0.0, 1.0);
        source.constant_attenuation = light.constant_attenuation;
        source.linear_attenuation = light.linear_attenuation;
        source.quadratic_attenuation = light.quadratic_attenuation;
        source.spot_direction =
            (glam::Mat3::from_mat4(self.model_view) * Vec3::NEG_Y).normalize();
        source.spot_cutoff = light.cutoff;
        source.spot_exponent = light.exponent;
        self.lights.push(source);
        self.visit_children(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{add_child, SceneNode};

    #[test]
    fn point_light_position_accumulates_transforms() {
        let root = SceneNode::group();
        let xform = SceneNode::transform(Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0)));
        add_child(&xform, SceneNode::point_light(PointLight::default()));
        add_child(&root, xform);

        let mut collector = LightCollector::new();
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -10.0));
        let lights = collector.collect(&root, view).unwrap();
        assert_eq!(lights.len(), 1);
        let pos = lights[0].position;
        assert!((pos - Vec4::new(3.0, 0.0, -10.0, 1.0)).length() < 1e-5);
    }

    #[test]
    fn list_resets_between_calls() {
        let root = SceneNode::group();
        add_child(&root, SceneNode::point_light(PointLight::default()));

        let mut collector = LightCollector::new();
        collector.collect(&root, Mat4::IDENTITY).unwrap();
        let lights = collector.collect(&root, Mat4::IDENTITY).unwrap();
        assert_eq!(lights.len(), 1);
    }

    #[test]
    fn empty_scene_is_fatal() {
        let root = SceneNode::group();
        let mut collector = LightCollector::new();
        assert!(matches!(
            collector.collect(&root, Mat4::IDENTITY),
            Err(Error::NoLights)
        ));
    }

    #[test]
    fn too_many_lights_is_fatal() {
        let root = SceneNode::group();
        for _ in 0..MAX_LIGHTS + 1 {
            add_child(&root, SceneNode::point_light(PointLight::default()));
        }
        let mut collector = LightCollector::new();
        assert!(matches!(
            collector.collect(&root, Mat4::IDENTITY),
            Err(Error::TooManyLights { .. })
        ));
    }

    #[test]
    fn directional_light_is_a_view_space_direction() {
        let root = SceneNode::group();
        add_child(&root, SceneNode::directional_light(DirectionalLight::default()));

        let mut collector = LightCollector::new();
        let lights = collector.collect(&root, Mat4::IDENTITY).unwrap();
        assert_eq!(lights[0].position.w, 0.0);
        assert!((lights[0].position.truncate() - Vec3::NEG_Y).length() < 1e-5);
    }
}
